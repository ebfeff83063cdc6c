use std::fmt::Debug;
use std::sync::Arc;

use log::debug;
use log::trace;

use super::ClauseLiteral;
use super::ClauseSearch;
use crate::basic_types::AtomAddress;
use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::basic_types::Literal;
use crate::basic_types::Nogood;
use crate::basic_types::NogoodSink;
use crate::basic_types::reborrow_sink;
use crate::containers::HashMap;
use crate::external::ExternalAtomEvaluator;
use crate::program::AnnotatedGroundProgram;
use crate::program::GroundRule;

/// Searches for sets of atoms which are true in an interpretation without being supported by
/// any rule from outside the set.
pub trait UnfoundedSetChecker: Send + Debug {
    /// Returns a nonempty unfounded set of the true atoms of `interpretation`, or an empty vector
    /// if there is none.
    ///
    /// Only atoms in `assigned` are considered; rules mentioning unassigned atoms are treated as
    /// supporting wherever their unassigned atoms could make them so. Nogoods learned while
    /// evaluating external atoms are written to `nogoods`.
    fn unfounded_set(
        &mut self,
        evaluator: &ExternalAtomEvaluator,
        interpretation: &Interpretation,
        assigned: &Interpretation,
        nogoods: Option<&mut dyn NogoodSink>,
    ) -> Result<Vec<AtomAddress>, HexError>;

    /// A nogood excluding the unfounded set found by the last call, if it found one.
    fn last_unfounded_set_nogood(&self) -> Option<&Nogood>;

    /// Hands over nogoods learned by the main search, which restrict the guesses for the values
    /// of external atoms in subsequent checks.
    fn learn_nogoods_from_main_search(&mut self, nogoods: &[Nogood]);
}

/// Finds unfounded sets by solving a clause encoding over the true atoms of the interpretation.
///
/// Every atom which may be unfounded gets a variable `u`, and every replacement atom whose value
/// under the reduced interpretation matters gets a variable `e` holding a guess for that value.
/// For each rule with a head atom in the set, the encoding requires that the rule does not
/// support it: a positive body atom is in the set as well, another head atom stays true, or an
/// external atom in the body is false in the interpretation without the set. Guesses for `e`
/// are verified by evaluating the external atoms; wrong guesses are excluded and the search
/// repeated.
#[derive(Debug)]
pub struct EncodingBasedUnfoundedSetChecker {
    program: Arc<AnnotatedGroundProgram>,
    replacements: Interpretation,
    learned: Vec<Nogood>,
    last_nogood: Option<Nogood>,
}

/// The variables of one encoding.
#[derive(Debug, Default)]
struct Encoding {
    search: ClauseSearch,
    candidates: Vec<AtomAddress>,
    unfounded_variable: HashMap<AtomAddress, usize>,
    /// Replacement atom and variable, in the order of creation.
    external_variables: Vec<(AtomAddress, usize)>,
    external_variable: HashMap<AtomAddress, usize>,
}

impl EncodingBasedUnfoundedSetChecker {
    pub fn new(program: Arc<AnnotatedGroundProgram>) -> EncodingBasedUnfoundedSetChecker {
        let replacements = program.replacement_atoms();
        EncodingBasedUnfoundedSetChecker {
            program,
            replacements,
            learned: Vec::new(),
            last_nogood: None,
        }
    }

    fn is_relevant(&self, rule: &GroundRule) -> bool {
        !rule.is_constraint() && !self.program.is_guessing_rule(&rule.head)
    }

    /// Whether the value of the positive replacement atom `address` can be computed from assigned
    /// inputs only.
    fn is_verifiable(&self, address: AtomAddress, assigned: &Interpretation) -> bool {
        let owners = self.program.owners_of_replacement(address);
        !owners.is_empty()
            && owners.iter().all(|&owner| {
                let mask = self.program.external_mask(owner);
                mask.positive_replacements.get_fact(address)
                    && mask
                        .inputs
                        .intersection(self.program.program_mask())
                        .is_subset_of(assigned)
            })
    }

    fn encode(&self, interpretation: &Interpretation, assigned: &Interpretation) -> Encoding {
        let program = self.program.ground_program();
        let candidates = interpretation
            .intersection(assigned)
            .intersection(self.program.program_mask())
            .difference(&program.edb)
            .difference(&self.replacements)
            .atoms()
            .collect::<Vec<_>>();

        let mut encoding = Encoding {
            search: ClauseSearch::new(candidates.len()),
            unfounded_variable: candidates
                .iter()
                .enumerate()
                .map(|(variable, &address)| (address, variable))
                .collect(),
            candidates,
            ..Default::default()
        };

        for rule in program.rules.iter().filter(|rule| self.is_relevant(rule)) {
            if !rule
                .head
                .iter()
                .any(|head| encoding.unfounded_variable.contains_key(head))
            {
                continue;
            }
            let body_false = rule.body.iter().any(|literal| {
                assigned.get_fact(literal.address) && !literal.holds_in(interpretation)
            });
            if body_false {
                continue;
            }

            let mut reasons = Vec::new();
            for literal in &rule.body {
                if literal.value {
                    if let Some(&variable) = encoding.unfounded_variable.get(&literal.address) {
                        reasons.push(ClauseLiteral::positive(variable));
                        continue;
                    }
                }
                if assigned.get_fact(literal.address)
                    && self.is_verifiable(literal.address, assigned)
                {
                    let variable = match encoding.external_variable.get(&literal.address) {
                        Some(&variable) => variable,
                        None => {
                            let variable = encoding.search.new_variable();
                            let _ = encoding
                                .external_variable
                                .insert(literal.address, variable);
                            encoding
                                .external_variables
                                .push((literal.address, variable));
                            variable
                        }
                    };
                    reasons.push(ClauseLiteral {
                        variable,
                        positive: !literal.value,
                    });
                }
            }

            let fixed_other_head = |head: AtomAddress| {
                rule.head.iter().any(|&other| {
                    other != head
                        && interpretation.get_fact(other)
                        && assigned.get_fact(other)
                        && !encoding.unfounded_variable.contains_key(&other)
                })
            };
            for &head in &rule.head {
                let Some(&variable) = encoding.unfounded_variable.get(&head) else {
                    continue;
                };
                if fixed_other_head(head) {
                    continue;
                }
                let other_heads = rule
                    .head
                    .iter()
                    .filter(|&&other| other != head)
                    .filter_map(|other| encoding.unfounded_variable.get(other))
                    .map(|&other| ClauseLiteral::negative(other));
                let clause = std::iter::once(ClauseLiteral::negative(variable))
                    .chain(reasons.iter().copied())
                    .chain(other_heads)
                    .collect::<Vec<_>>();
                encoding.search.add_clause(clause);
            }
        }

        encoding
            .search
            .add_clause((0..encoding.candidates.len()).map(ClauseLiteral::positive));

        for nogood in &self.learned {
            if let Some(clause) = self.translate_learned(nogood, &encoding, interpretation, assigned) {
                encoding.search.add_clause(clause);
            }
        }
        encoding
    }

    /// The clause stating that `nogood` is not violated by the interpretation without the set.
    fn translate_learned(
        &self,
        nogood: &Nogood,
        encoding: &Encoding,
        interpretation: &Interpretation,
        assigned: &Interpretation,
    ) -> Option<Vec<ClauseLiteral>> {
        let mut clause = Vec::new();
        for literal in nogood.literals() {
            if let Some(&variable) = encoding.unfounded_variable.get(&literal.address) {
                // The atom is true without the set iff it is not in the set.
                clause.push(ClauseLiteral {
                    variable,
                    positive: literal.value,
                });
            } else if let Some(&variable) = encoding.external_variable.get(&literal.address) {
                clause.push(ClauseLiteral {
                    variable,
                    positive: !literal.value,
                });
            } else if assigned.get_fact(literal.address)
                && !self.replacements.get_fact(literal.address)
            {
                if !literal.holds_in(interpretation) {
                    return None;
                }
            } else {
                return None;
            }
        }
        (!clause.is_empty()).then_some(clause)
    }

    /// Whether the guessed values of the replacement atoms agree with the evaluation of their
    /// external atoms under `reduced`.
    fn guesses_hold(
        &self,
        evaluator: &ExternalAtomEvaluator,
        encoding: &Encoding,
        solution: &[bool],
        reduced: &Interpretation,
        mut nogoods: Option<&mut dyn NogoodSink>,
    ) -> Result<bool, HexError> {
        let mut produced: HashMap<usize, Interpretation> = HashMap::default();
        for &(address, variable) in &encoding.external_variables {
            let mut actual = false;
            for &owner in self.program.owners_of_replacement(address) {
                if !produced.contains_key(&owner) {
                    let mut outputs = Interpretation::new();
                    let _ = evaluator.evaluate(
                        self.program.external_mask(owner).atom,
                        reduced,
                        self.program.program_mask(),
                        &mut |output| {
                            outputs.set_fact(output.positive);
                            true
                        },
                        reborrow_sink(&mut nogoods),
                    )?;
                    let _ = produced.insert(owner, outputs);
                }
                actual |= produced[&owner].get_fact(address);
            }
            if actual != solution[variable] {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// A nogood which is violated by every interpretation containing an atom of `unfounded`
    /// while agreeing with `interpretation` on the reasons why no rule supports the set.
    fn unfounded_set_nogood(
        &self,
        unfounded: &Interpretation,
        interpretation: &Interpretation,
        assigned: &Interpretation,
        encoding: &Encoding,
        solution: &[bool],
    ) -> Nogood {
        let mut nogood = Nogood::default();
        if let Some(first) = unfounded.atoms().next() {
            nogood.insert(Literal::positive(first));
        }

        for rule in &self.program.ground_program().rules {
            if !self.is_relevant(rule) || !rule.head.iter().any(|&head| unfounded.get_fact(head)) {
                continue;
            }
            if rule
                .body
                .iter()
                .any(|literal| literal.value && unfounded.get_fact(literal.address))
            {
                continue;
            }

            if let Some(literal) = rule.body.iter().find(|literal| {
                assigned.get_fact(literal.address) && !literal.holds_in(interpretation)
            }) {
                nogood.insert(Literal::from_interpretation(literal.address, interpretation));
                continue;
            }
            if let Some(&head) = rule.head.iter().find(|&&head| {
                interpretation.get_fact(head) && assigned.get_fact(head) && !unfounded.get_fact(head)
            }) {
                nogood.insert(Literal::positive(head));
                continue;
            }

            let external = rule.body.iter().find(|literal| {
                encoding
                    .external_variable
                    .get(&literal.address)
                    .is_some_and(|&variable| solution[variable] != literal.value)
            });
            match external {
                Some(literal) => {
                    for &owner in self.program.owners_of_replacement(literal.address) {
                        let inputs = self
                            .program
                            .external_mask(owner)
                            .inputs
                            .intersection(self.program.program_mask());
                        for input in inputs.atoms() {
                            nogood.insert(Literal::from_interpretation(input, interpretation));
                        }
                    }
                }
                None => {
                    // No specific reason; exclude the whole assignment.
                    return assigned
                        .intersection(self.program.program_mask())
                        .atoms()
                        .map(|address| Literal::from_interpretation(address, interpretation))
                        .collect();
                }
            }
        }
        nogood
    }
}

impl UnfoundedSetChecker for EncodingBasedUnfoundedSetChecker {
    fn unfounded_set(
        &mut self,
        evaluator: &ExternalAtomEvaluator,
        interpretation: &Interpretation,
        assigned: &Interpretation,
        mut nogoods: Option<&mut dyn NogoodSink>,
    ) -> Result<Vec<AtomAddress>, HexError> {
        self.last_nogood = None;
        let mut encoding = self.encode(interpretation, assigned);
        if encoding.candidates.is_empty() {
            return Ok(Vec::new());
        }

        loop {
            let Some(solution) = encoding.search.solve() else {
                trace!("no unfounded set among {} atoms", encoding.candidates.len());
                return Ok(Vec::new());
            };

            let unfounded = encoding
                .candidates
                .iter()
                .enumerate()
                .filter(|&(variable, _)| solution[variable])
                .map(|(_, &address)| address)
                .collect::<Interpretation>();
            let reduced = interpretation.difference(&unfounded);

            if self.guesses_hold(evaluator, &encoding, &solution, &reduced, reborrow_sink(&mut nogoods))? {
                let nogood =
                    self.unfounded_set_nogood(&unfounded, interpretation, assigned, &encoding, &solution);
                debug!("found unfounded set of {} atoms", unfounded.count());
                self.last_nogood = Some(nogood);
                return Ok(unfounded.atoms().collect());
            }

            let blocking = solution
                .iter()
                .enumerate()
                .map(|(variable, &value)| ClauseLiteral {
                    variable,
                    positive: !value,
                })
                .collect::<Vec<_>>();
            encoding.search.add_clause(blocking);
        }
    }

    fn last_unfounded_set_nogood(&self) -> Option<&Nogood> {
        self.last_nogood.as_ref()
    }

    fn learn_nogoods_from_main_search(&mut self, nogoods: &[Nogood]) {
        self.learned.extend_from_slice(nogoods);
    }
}

#[cfg(test)]
mod tests {
    use enumset::EnumSet;

    use super::*;
    use crate::external::test_sources::IdentitySource;
    use crate::external::SourceTable;
    use crate::program::GroundProgram;
    use crate::registry::Registry;

    fn atom(registry: &Registry, name: &str) -> AtomAddress {
        registry.store_ground_atom(vec![registry.constant(name)])
    }

    #[test]
    fn positive_loop_is_unfounded() {
        let registry = Arc::new(Registry::default());
        let a = atom(&registry, "a");
        let b = atom(&registry, "b");
        let program = GroundProgram {
            edb: Interpretation::new(),
            rules: vec![
                GroundRule {
                    head: vec![a],
                    body: vec![Literal::positive(b)],
                },
                GroundRule {
                    head: vec![b],
                    body: vec![Literal::positive(a)],
                },
            ],
        };
        let evaluator =
            ExternalAtomEvaluator::new(Arc::clone(&registry), Arc::default(), [], EnumSet::empty())
                .expect("no external atoms");
        let program = Arc::new(AnnotatedGroundProgram::new(&evaluator, program, &[]));
        let mut checker = EncodingBasedUnfoundedSetChecker::new(Arc::clone(&program));
        let candidate = Interpretation::from_atoms([a, b]);

        let unfounded = checker
            .unfounded_set(&evaluator, &candidate, program.program_mask(), None)
            .expect("no external atoms");

        assert!(!unfounded.is_empty());
        let nogood = checker.last_unfounded_set_nogood().expect("an unfounded set was found");
        assert!(nogood.is_violated_by(&candidate));
    }

    #[test]
    fn supported_atoms_are_founded() {
        let registry = Arc::new(Registry::default());
        let a = atom(&registry, "a");
        let b = atom(&registry, "b");
        let program = GroundProgram {
            edb: Interpretation::from_atoms([a]),
            rules: vec![GroundRule {
                head: vec![b],
                body: vec![Literal::positive(a)],
            }],
        };
        let evaluator =
            ExternalAtomEvaluator::new(Arc::clone(&registry), Arc::default(), [], EnumSet::empty())
                .expect("no external atoms");
        let program = Arc::new(AnnotatedGroundProgram::new(&evaluator, program, &[]));
        let mut checker = EncodingBasedUnfoundedSetChecker::new(Arc::clone(&program));

        let unfounded = checker
            .unfounded_set(&evaluator, &Interpretation::from_atoms([a, b]), program.program_mask(), None)
            .expect("no external atoms");

        assert!(unfounded.is_empty());
        assert!(checker.last_unfounded_set_nogood().is_none());
    }

    #[test]
    fn cyclic_support_through_external_atom_is_unfounded() {
        let registry = Arc::new(Registry::default());
        let mut sources = SourceTable::default();
        sources.register(&registry, Arc::new(IdentitySource));
        let p = registry.constant("p");
        let a = registry.constant("a");
        let id = registry
            .store_external_atom(registry.constant("id"), vec![p], vec![a])
            .as_external()
            .expect("stored as external atom");
        let external = registry.external_atom(id);
        let p_a = registry.store_ground_atom(vec![p, a]);
        let positive = registry.store_ground_atom(vec![external.replacement_positive, p, a]);
        let negative = registry.store_ground_atom(vec![external.replacement_negative, p, a]);

        // p(a) :- &id[p](a).
        let program = GroundProgram {
            edb: Interpretation::new(),
            rules: vec![
                GroundRule {
                    head: vec![positive, negative],
                    body: vec![],
                },
                GroundRule {
                    head: vec![p_a],
                    body: vec![Literal::positive(positive)],
                },
            ],
        };
        let evaluator = ExternalAtomEvaluator::new(
            Arc::clone(&registry),
            Arc::new(sources),
            [id],
            EnumSet::empty(),
        )
        .expect("id is registered");
        let program = Arc::new(AnnotatedGroundProgram::new(&evaluator, program, &[id]));
        let mut checker = EncodingBasedUnfoundedSetChecker::new(Arc::clone(&program));
        let candidate = Interpretation::from_atoms([p_a, positive]);

        let unfounded = checker
            .unfounded_set(&evaluator, &candidate, program.program_mask(), None)
            .expect("id never fails");

        assert_eq!(unfounded, vec![p_a]);
        assert_eq!(
            checker.last_unfounded_set_nogood(),
            Some(&Nogood::new([Literal::positive(p_a)]))
        );
    }
}
