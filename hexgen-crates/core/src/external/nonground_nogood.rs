use std::sync::Arc;

use crate::basic_types::AtomAddress;
use crate::basic_types::Interpretation;
use crate::basic_types::Literal;
use crate::basic_types::Nogood;
use crate::basic_types::NogoodSet;
use crate::basic_types::NogoodSink;
use crate::containers::HashMap;
use crate::containers::HashSet;
use crate::registry::Registry;
use crate::registry::Substitution;
use crate::registry::TermId;

/// A literal over an atom tuple which may contain variables.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NongroundLiteral {
    pub tuple: Vec<TermId>,
    pub value: bool,
}

/// A nogood which holds for every instance of its variables.
///
/// Every variable must occur in a positive literal; instances are found by matching the
/// positive literals against ground atoms.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NongroundNogood {
    pub literals: Vec<NongroundLiteral>,
}

impl NongroundNogood {
    pub fn new(literals: Vec<NongroundLiteral>) -> NongroundNogood {
        NongroundNogood { literals }
    }
}

/// Nogoods collected during one verification step.
#[derive(Clone, Debug, Default)]
pub struct LearnedNogoods {
    pub ground: NogoodSet,
    pub nonground: Vec<NongroundNogood>,
}

impl LearnedNogoods {
    pub fn is_empty(&self) -> bool {
        self.ground.is_empty() && self.nonground.is_empty()
    }

    pub fn merge(&mut self, other: LearnedNogoods) {
        self.ground.extend_from(other.ground);
        self.nonground.extend(other.nonground);
    }
}

impl NogoodSink for LearnedNogoods {
    fn add_nogood(&mut self, nogood: Nogood) {
        let _ = self.ground.add(nogood);
    }

    fn add_nonground_nogood(&mut self, nogood: NongroundNogood) {
        self.nonground.push(nogood);
    }
}

/// Instantiates nonground nogoods over the atoms of a ground program.
#[derive(Debug)]
pub struct NogoodGrounder {
    registry: Arc<Registry>,
    nogoods: Vec<NongroundNogood>,
    known: HashSet<NongroundNogood>,
    emitted: HashSet<Nogood>,
}

impl NogoodGrounder {
    pub fn new(registry: Arc<Registry>) -> NogoodGrounder {
        NogoodGrounder {
            registry,
            nogoods: Vec::new(),
            known: HashSet::default(),
            emitted: HashSet::default(),
        }
    }

    pub fn add(&mut self, nogood: NongroundNogood) {
        if self.known.insert(nogood.clone()) {
            self.nogoods.push(nogood);
        }
    }

    pub fn len(&self) -> usize {
        self.nogoods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nogoods.is_empty()
    }

    /// Writes every instance over `atoms` which was not emitted before to `sink`, returning the
    /// number of new instances.
    pub fn instantiate(&mut self, atoms: &Interpretation, sink: &mut dyn NogoodSink) -> usize {
        let mut by_predicate: HashMap<TermId, Vec<(AtomAddress, Vec<TermId>)>> =
            HashMap::default();
        for address in atoms.atoms() {
            let atom = self.registry.ground_atom(address);
            by_predicate
                .entry(atom.predicate())
                .or_default()
                .push((address, atom.tuple));
        }

        let mut instances = Vec::new();
        for nogood in &self.nogoods {
            let positive = nogood
                .literals
                .iter()
                .filter(|literal| literal.value)
                .collect::<Vec<_>>();
            let negative = nogood
                .literals
                .iter()
                .filter(|literal| !literal.value)
                .collect::<Vec<_>>();

            let mut partial = Vec::new();
            self.extend(
                &positive,
                &negative,
                &by_predicate,
                atoms,
                Substitution::default(),
                &mut partial,
                &mut instances,
            );
        }

        let mut count = 0;
        for instance in instances {
            if self.emitted.insert(instance.clone()) {
                sink.add_nogood(instance);
                count += 1;
            }
        }
        count
    }

    #[allow(clippy::too_many_arguments, reason = "recursive helper threading its state")]
    fn extend(
        &self,
        positive: &[&NongroundLiteral],
        negative: &[&NongroundLiteral],
        by_predicate: &HashMap<TermId, Vec<(AtomAddress, Vec<TermId>)>>,
        atoms: &Interpretation,
        substitution: Substitution,
        partial: &mut Vec<Literal>,
        instances: &mut Vec<Nogood>,
    ) {
        let Some((first, rest)) = positive.split_first() else {
            let mut literals = partial.clone();
            for literal in negative {
                let tuple = substitution.apply(&self.registry, &literal.tuple);
                if tuple.iter().any(|&term| self.registry.is_variable(term)) {
                    return;
                }
                // An atom outside the program is always false, so the literal always holds.
                if let Some(address) = self.registry.lookup_ground_atom(&tuple) {
                    if atoms.get_fact(address) {
                        literals.push(Literal::negative(address));
                    }
                }
            }
            instances.push(Nogood::new(literals));
            return;
        };

        let Some(candidates) = by_predicate.get(&first.tuple[0]) else {
            return;
        };
        for (address, tuple) in candidates {
            if let Some(extended) = substitution.matched(&self.registry, &first.tuple, tuple) {
                partial.push(Literal::positive(*address));
                self.extend(rest, negative, by_predicate, atoms, extended, partial, instances);
                let _ = partial.pop();
            }
        }
    }
}
