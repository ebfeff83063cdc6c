use log::debug;

use super::GroundProgram;
use crate::basic_types::AtomAddress;
use crate::basic_types::Interpretation;
use crate::containers::HashMap;
use crate::external::ExternalAtomEvaluator;
use crate::registry::ExternalAtomId;
use crate::registry::Substitution;

/// The ground atoms belonging to one inner external atom.
#[derive(Clone, Debug)]
pub struct ExternalAtomMask {
    pub atom: ExternalAtomId,
    /// The positive and negative replacement atoms of the atom occurring in the program.
    pub replacements: Interpretation,
    /// The positive replacement atoms among `replacements`.
    pub positive_replacements: Interpretation,
    /// The atoms whose truth value the atom's evaluation depends on.
    pub inputs: Interpretation,
}

/// A ground program annotated with the external atoms it contains and its cyclic structure.
///
/// A head cycle is a disjunctive rule with two head atoms in the same strongly connected
/// component of the positive dependency graph; an external cycle is a dependency of a
/// replacement atom on one of its inputs within such a component. Programs with neither always
/// have minimal compatible models.
#[derive(Clone, Debug)]
pub struct AnnotatedGroundProgram {
    ground_program: GroundProgram,
    program_mask: Interpretation,
    external_masks: Vec<ExternalAtomMask>,
    replacement_owners: HashMap<AtomAddress, Vec<usize>>,
    head_cycles: bool,
    external_cycles: bool,
}

impl AnnotatedGroundProgram {
    pub fn new(
        evaluator: &ExternalAtomEvaluator,
        ground_program: GroundProgram,
        external_atoms: &[ExternalAtomId],
    ) -> AnnotatedGroundProgram {
        let registry = evaluator.registry();
        let program_mask = ground_program.atoms();

        let mut external_masks = Vec::with_capacity(external_atoms.len());
        let mut replacement_owners: HashMap<AtomAddress, Vec<usize>> = HashMap::default();
        for (index, &atom) in external_atoms.iter().enumerate() {
            let external = registry.external_atom(atom);
            let pattern = external.replacement_tuple(external.replacement_positive);
            let replacements = program_mask
                .intersection(evaluator.replacement_mask(atom))
                .atoms()
                .filter(|&address| {
                    let tuple = registry.ground_atom(address).tuple;
                    Substitution::default()
                        .matched(registry, &pattern[1..], &tuple[1..])
                        .is_some()
                })
                .collect::<Interpretation>();
            let positive_replacements = replacements
                .atoms()
                .filter(|&address| registry.ground_atom_predicate(address) == external.replacement_positive)
                .collect::<Interpretation>();
            for address in replacements.atoms() {
                replacement_owners.entry(address).or_default().push(index);
            }
            external_masks.push(ExternalAtomMask {
                atom,
                replacements,
                positive_replacements,
                inputs: evaluator.input_mask(atom).clone(),
            });
        }

        let mut annotated = AnnotatedGroundProgram {
            ground_program,
            program_mask,
            external_masks,
            replacement_owners,
            head_cycles: false,
            external_cycles: false,
        };
        annotated.compute_cycles();
        annotated
    }

    pub fn ground_program(&self) -> &GroundProgram {
        &self.ground_program
    }

    pub fn program_mask(&self) -> &Interpretation {
        &self.program_mask
    }

    pub fn external_masks(&self) -> &[ExternalAtomMask] {
        &self.external_masks
    }

    pub fn external_mask(&self, index: usize) -> &ExternalAtomMask {
        &self.external_masks[index]
    }

    /// All replacement atoms of the inner external atoms occurring in the program.
    pub fn replacement_atoms(&self) -> Interpretation {
        let mut atoms = Interpretation::new();
        for mask in &self.external_masks {
            atoms.union_with(&mask.replacements);
        }
        atoms
    }

    /// The indices of the external atoms which `address` is a replacement atom of.
    pub fn owners_of_replacement(&self, address: AtomAddress) -> &[usize] {
        self.replacement_owners
            .get(&address)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has_head_cycles(&self) -> bool {
        self.head_cycles
    }

    pub fn has_external_cycles(&self) -> bool {
        self.external_cycles
    }

    /// Whether compatible models of this program may fail to be minimal.
    pub fn needs_minimality_check(&self) -> bool {
        self.head_cycles || self.external_cycles
    }

    /// Whether a rule with this head guesses the truth values of replacement atoms.
    pub fn is_guessing_rule(&self, head: &[AtomAddress]) -> bool {
        !head.is_empty()
            && head
                .iter()
                .all(|address| self.replacement_owners.contains_key(address))
    }

    fn compute_cycles(&mut self) {
        let atoms = self.program_mask.atoms().collect::<Vec<_>>();
        let node_of = atoms
            .iter()
            .enumerate()
            .map(|(node, &address)| (address, node))
            .collect::<HashMap<_, _>>();

        let mut graph = DependencyGraph::new(atoms.len());
        for rule in &self.ground_program.rules {
            if self.is_guessing_rule(&rule.head) {
                continue;
            }
            for &head in &rule.head {
                for literal in &rule.body {
                    let is_replacement = self.replacement_owners.contains_key(&literal.address);
                    if literal.value || is_replacement {
                        graph.add_edge(node_of[&head], node_of[&literal.address]);
                    }
                }
            }
        }

        let mut external_edges = Vec::new();
        for mask in &self.external_masks {
            for replacement in mask.replacements.atoms() {
                for input in mask.inputs.intersection(&self.program_mask).atoms() {
                    let edge = (node_of[&replacement], node_of[&input]);
                    graph.add_edge(edge.0, edge.1);
                    external_edges.push(edge);
                }
            }
        }

        let component = graph.strongly_connected_components();

        self.head_cycles = self.ground_program.rules.iter().any(|rule| {
            rule.head.iter().enumerate().any(|(i, first)| {
                rule.head[i + 1..]
                    .iter()
                    .any(|second| component[node_of[first]] == component[node_of[second]])
            })
        });
        self.external_cycles = external_edges
            .iter()
            .any(|&(from, to)| component[from] == component[to]);

        debug!(
            "annotated ground program with {} atoms: head cycles {}, external cycles {}",
            atoms.len(),
            self.head_cycles,
            self.external_cycles
        );
    }
}

/// Adjacency lists over dense node indices.
#[derive(Debug)]
struct DependencyGraph {
    edges: Vec<Vec<usize>>,
}

#[derive(Debug, Default)]
struct TarjanState {
    index: usize,
    dfs_num: Vec<Option<usize>>,
    low_link: Vec<usize>,
    stack: Vec<usize>,
    on_stack: Vec<bool>,
    component: Vec<usize>,
    num_components: usize,
}

impl DependencyGraph {
    fn new(num_nodes: usize) -> DependencyGraph {
        DependencyGraph {
            edges: vec![Vec::new(); num_nodes],
        }
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        if !self.edges[from].contains(&to) {
            self.edges[from].push(to);
        }
    }

    /// Returns the component number of every node.
    fn strongly_connected_components(&self) -> Vec<usize> {
        let num_nodes = self.edges.len();
        let mut state = TarjanState {
            dfs_num: vec![None; num_nodes],
            low_link: vec![0; num_nodes],
            on_stack: vec![false; num_nodes],
            component: vec![0; num_nodes],
            ..Default::default()
        };
        for node in 0..num_nodes {
            if state.dfs_num[node].is_none() {
                self.tarjan(node, &mut state);
            }
        }
        state.component
    }

    /// Tarjan's algorithm from `root`, with an explicit stack of nodes and the position of the
    /// next edge to follow.
    fn tarjan(&self, root: usize, state: &mut TarjanState) {
        let mut calls = vec![(root, 0_usize)];
        state.visit(root);

        while let Some(frame) = calls.last_mut() {
            let node = frame.0;
            if let Some(&neighbour) = self.edges[node].get(frame.1) {
                frame.1 += 1;
                match state.dfs_num[neighbour] {
                    None => {
                        state.visit(neighbour);
                        calls.push((neighbour, 0));
                    }
                    Some(number) if state.on_stack[neighbour] => {
                        state.low_link[node] = state.low_link[node].min(number);
                    }
                    Some(_) => {}
                }
                continue;
            }

            let _ = calls.pop();
            if let Some(&(parent, _)) = calls.last() {
                state.low_link[parent] = state.low_link[parent].min(state.low_link[node]);
            }
            if Some(state.low_link[node]) == state.dfs_num[node] {
                while let Some(top) = state.stack.pop() {
                    state.on_stack[top] = false;
                    state.component[top] = state.num_components;
                    if top == node {
                        break;
                    }
                }
                state.num_components += 1;
            }
        }
    }
}

impl TarjanState {
    fn visit(&mut self, node: usize) {
        self.dfs_num[node] = Some(self.index);
        self.low_link[node] = self.index;
        self.index += 1;
        self.stack.push(node);
        self.on_stack[node] = true;
    }
}

impl ExternalAtomMask {
    /// Whether `address` is one of the replacement atoms of this external atom.
    pub fn is_replacement(&self, address: AtomAddress) -> bool {
        self.replacements.get_fact(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tarjan_separates_cycles_from_chains() {
        let mut graph = DependencyGraph::new(4);
        graph.add_edge(0, 1);
        graph.add_edge(1, 0);
        graph.add_edge(1, 2);
        graph.add_edge(2, 3);

        let component = graph.strongly_connected_components();

        assert_eq!(component[0], component[1]);
        assert_ne!(component[1], component[2]);
        assert_ne!(component[2], component[3]);
    }

    #[test]
    fn long_chains_do_not_exhaust_the_stack() {
        let length = 200_000;
        let mut graph = DependencyGraph::new(length);
        for node in 1..length {
            graph.add_edge(node - 1, node);
        }
        graph.add_edge(length - 1, length - 2);

        let component = graph.strongly_connected_components();

        assert_eq!(component[length - 1], component[length - 2]);
        assert_ne!(component[length - 2], component[length - 3]);
        let mut distinct = component.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), length - 1);
    }
}
