use std::sync::Arc;

use fixedbitset::FixedBitSet;
use log::trace;

use super::nogood_transfer::NogoodTransfer;
use super::GenerationContext;
use crate::basic_types::AtomAddress;
use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::basic_types::NogoodSink;
use crate::checkers::EncodingBasedUnfoundedSetChecker;
use crate::checkers::UnfoundedSetChecker;
use crate::containers::HashMap;
use crate::hexgen_assert_simple;
use crate::options::EvaluationHeuristic;
use crate::options::UfsCheckHeuristic;
use crate::oracle::ExternalPropagator;
use crate::oracle::PartialAssignment;

/// Which inner external atoms had been evaluated during the search when a candidate was
/// reported, and whether the evaluation confirmed the guess.
///
/// Indices are positions in the list of inner external atoms of the unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationSnapshot {
    evaluated: FixedBitSet,
    verified: FixedBitSet,
}

impl VerificationSnapshot {
    /// A snapshot in which no atom was evaluated.
    pub fn unevaluated(num_atoms: usize) -> VerificationSnapshot {
        VerificationSnapshot {
            evaluated: FixedBitSet::with_capacity(num_atoms),
            verified: FixedBitSet::with_capacity(num_atoms),
        }
    }

    pub fn num_atoms(&self) -> usize {
        self.evaluated.len()
    }

    pub fn is_evaluated(&self, index: usize) -> bool {
        self.evaluated.contains(index)
    }

    /// Whether the atom was evaluated and its guess confirmed.
    pub fn is_verified(&self, index: usize) -> bool {
        self.evaluated.contains(index) && self.verified.contains(index)
    }

    /// Whether the atom was evaluated and its guess found to be wrong.
    pub fn is_falsified(&self, index: usize) -> bool {
        self.evaluated.contains(index) && !self.verified.contains(index)
    }

    /// The atoms which still have to be evaluated.
    pub fn pending(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_atoms()).filter(|&index| !self.evaluated.contains(index))
    }

    pub(crate) fn set(&mut self, index: usize, evaluated: bool, verified: bool) {
        hexgen_assert_simple!(evaluated || !verified, "only evaluated atoms can be verified");
        self.evaluated.set(index, evaluated);
        self.verified.set(index, verified);
    }
}

/// The outputs of one evaluation, restricted to the replacement atoms of the program.
#[derive(Clone, Debug)]
struct CachedOutputs {
    input: Interpretation,
    positive: Interpretation,
    negative: Interpretation,
}

/// Verifies the guesses for inner external atoms while the oracle searches.
///
/// An atom becomes verifiable once all of its relevant atoms, its inputs and its replacement
/// atoms, are assigned. Each unevaluated atom watches one unassigned relevant atom; when the
/// watched atom is assigned, another unassigned one is watched or, if there is none, the atom is
/// evaluated. Every relevant atom of an evaluated atom watches it, so that any change to those
/// atoms withdraws the verification again. With [`EvaluationHeuristic::Always`] an atom is also
/// evaluated whenever its watch moves on, for the nogoods alone.
///
/// Nogoods learned from the evaluations are handed to the oracle at the end of each call. If
/// configured, partial assignments are also checked for unfounded sets.
#[derive(Debug)]
pub struct ExternalAtomVerifier {
    context: Arc<GenerationContext>,
    relevant: Vec<Interpretation>,
    inputs: Vec<Interpretation>,
    verify_watches: HashMap<AtomAddress, Vec<usize>>,
    unverify_watches: HashMap<AtomAddress, Vec<usize>>,
    status: VerificationSnapshot,
    cache: Vec<Option<CachedOutputs>>,
    nogoods: NogoodTransfer,
    unfounded_sets: Option<EncodingBasedUnfoundedSetChecker>,
    num_calls: usize,
    num_learned_nogoods: usize,
}

impl ExternalAtomVerifier {
    pub(crate) fn new(context: Arc<GenerationContext>) -> ExternalAtomVerifier {
        let program = Arc::clone(&context.program);

        let mut relevant = Vec::new();
        let mut inputs = Vec::new();
        let mut verify_watches: HashMap<AtomAddress, Vec<usize>> = HashMap::default();
        let mut unverify_watches: HashMap<AtomAddress, Vec<usize>> = HashMap::default();
        for (index, mask) in program.external_masks().iter().enumerate() {
            let atom_inputs = mask.inputs.intersection(program.program_mask());
            let atom_relevant = atom_inputs.union(&mask.replacements);
            for address in atom_relevant.atoms() {
                unverify_watches.entry(address).or_default().push(index);
            }
            if let Some(first) = atom_relevant.atoms().next() {
                verify_watches.entry(first).or_default().push(index);
            }
            relevant.push(atom_relevant);
            inputs.push(atom_inputs);
        }

        let partial_unfounded_set_check = checks_partial_unfounded_sets(&context);
        let nogoods = NogoodTransfer::for_context(&context);

        ExternalAtomVerifier {
            status: VerificationSnapshot::unevaluated(relevant.len()),
            cache: vec![None; relevant.len()],
            relevant,
            inputs,
            verify_watches,
            unverify_watches,
            nogoods,
            unfounded_sets: partial_unfounded_set_check
                .then(|| EncodingBasedUnfoundedSetChecker::new(Arc::clone(&program))),
            num_calls: 0,
            num_learned_nogoods: 0,
            context,
        }
    }

    /// Whether the search of the oracle has anything to verify or check at all.
    pub(crate) fn is_needed(context: &GenerationContext) -> bool {
        context.options.evaluation_heuristic != EvaluationHeuristic::Never
            || checks_partial_unfounded_sets(context)
    }

    /// The evaluation status of every inner external atom under the current assignment.
    pub fn snapshot(&self) -> VerificationSnapshot {
        self.status.clone()
    }

    /// The nogoods handed to the oracle so far.
    pub fn num_learned_nogoods(&self) -> usize {
        self.num_learned_nogoods
    }

    /// Evaluates the atoms which became verifiable. Returns whether a guess was found wrong.
    fn verify_external_atoms(&mut self, assignment: PartialAssignment<'_>) -> Result<bool, HexError> {
        let changed = assignment.changed;

        let mut withdrawn = Vec::new();
        for address in changed.atoms() {
            if let Some(watchers) = self.unverify_watches.get(&address) {
                withdrawn.extend(
                    watchers
                        .iter()
                        .copied()
                        .filter(|&index| self.status.is_evaluated(index)),
                );
            }
        }
        withdrawn.sort_unstable();
        withdrawn.dedup();
        for index in withdrawn {
            trace!("withdrawing the verification of external atom {index}");
            self.status.set(index, false, false);
            let watch = self.relevant[index]
                .atoms()
                .find(|&address| !assignment.assigned.get_fact(address))
                .or_else(|| self.relevant[index].intersection(changed).atoms().next());
            if let Some(watch) = watch {
                self.verify_watches.entry(watch).or_default().push(index);
            }
        }

        let mut conflict = false;
        for address in changed.atoms() {
            if !assignment.assigned.get_fact(address) {
                continue;
            }
            let Some(watchers) = self.verify_watches.remove(&address) else {
                continue;
            };
            for index in watchers {
                if self.status.is_evaluated(index) {
                    continue;
                }
                let unassigned = self.relevant[index]
                    .atoms()
                    .find(|&address| !assignment.assigned.get_fact(address));
                if let Some(unassigned) = unassigned {
                    self.verify_watches.entry(unassigned).or_default().push(index);
                    if self.context.options.evaluation_heuristic == EvaluationHeuristic::Always {
                        let outputs = self.evaluate(index, assignment.partial)?;
                        trace!(
                            "external atom {index} produced {} outputs on a partial input",
                            outputs.positive.count()
                        );
                    }
                    continue;
                }
                if let Some(verified) = self.verify(index, assignment.partial)? {
                    self.status.set(index, true, verified);
                    conflict |= !verified;
                }
            }
        }
        Ok(conflict)
    }

    /// Whether the guess for atom `index` agrees with its evaluation under `partial`, on which
    /// all relevant atoms are assigned. `None` if the heuristic defers the evaluation.
    fn verify(&mut self, index: usize, partial: &Interpretation) -> Result<Option<bool>, HexError> {
        let heuristic = self.context.options.evaluation_heuristic;
        if heuristic == EvaluationHeuristic::Never {
            return Ok(None);
        }

        let input = partial.intersection(&self.inputs[index]);
        let reusable = heuristic == EvaluationHeuristic::InputComplete
            && self.cache[index]
                .as_ref()
                .is_some_and(|cached| cached.input == input);
        if !reusable {
            let outputs = self.evaluate(index, partial)?;
            self.cache[index] = Some(outputs);
        }

        let Some(outputs) = self.cache[index].as_ref() else {
            return Ok(None);
        };
        let mask = self.context.program.external_mask(index);
        let guessed_true = partial.intersection(&mask.positive_replacements);
        let verified = guessed_true == outputs.positive && partial.is_disjoint(&outputs.negative);
        trace!("external atom {index} verified during search: {verified}");
        Ok(Some(verified))
    }

    /// Evaluates atom `index` under `partial`, where unassigned input atoms count as false.
    /// Learned nogoods are collected for the next transfer.
    fn evaluate(&mut self, index: usize, partial: &Interpretation) -> Result<CachedOutputs, HexError> {
        let context = Arc::clone(&self.context);
        let mask = context.program.external_mask(index);
        let mut outputs = CachedOutputs {
            input: partial.intersection(&self.inputs[index]),
            positive: Interpretation::new(),
            negative: Interpretation::new(),
        };
        let completed = context.evaluator.evaluate(
            mask.atom,
            partial,
            context.program.program_mask(),
            &mut |output| {
                outputs.positive.set_fact(output.positive);
                if let Some(negative) = output.negative {
                    outputs.negative.set_fact(negative);
                }
                true
            },
            self.nogoods.sink(),
        )?;
        hexgen_assert_simple!(completed, "the evaluation callback never aborts");
        outputs.positive.intersect_with(&mask.positive_replacements);
        outputs.negative.intersect_with(&mask.replacements);
        Ok(outputs)
    }

    fn check_unfounded_sets(
        &mut self,
        assignment: PartialAssignment<'_>,
        oracle: &mut dyn NogoodSink,
    ) -> Result<(), HexError> {
        let Some(checker) = self.unfounded_sets.as_mut() else {
            return Ok(());
        };
        let due = match self.context.options.ufs_check_heuristic {
            UfsCheckHeuristic::Post => false,
            UfsCheckHeuristic::Max => true,
            UfsCheckHeuristic::Periodic => self.num_calls % 10 == 0,
        };
        if !due {
            return Ok(());
        }

        let unfounded = checker.unfounded_set(
            &self.context.evaluator,
            assignment.partial,
            assignment.assigned,
            self.nogoods.sink(),
        )?;
        if !unfounded.is_empty() {
            if let Some(nogood) = checker.last_unfounded_set_nogood() {
                trace!("partial assignment has an unfounded set of {} atoms", unfounded.len());
                oracle.add_nogood(nogood.clone());
                self.num_learned_nogoods += 1;
            }
        }
        Ok(())
    }
}

fn checks_partial_unfounded_sets(context: &GenerationContext) -> bool {
    let options = &context.options;
    options.ufs_check
        && !options.flp_check
        && !options.well_justified
        && options.ufs_check_heuristic != UfsCheckHeuristic::Post
        && context.check_minimality
}

impl ExternalPropagator for ExternalAtomVerifier {
    fn name(&self) -> &str {
        "ExternalAtomVerifier"
    }

    fn propagate(
        &mut self,
        assignment: PartialAssignment<'_>,
        nogoods: &mut dyn NogoodSink,
    ) -> Result<(), HexError> {
        self.num_calls += 1;
        let conflict = self.verify_external_atoms(assignment)?;
        // Unfounded sets are only meaningful for assignments without wrong guesses.
        if !conflict {
            self.check_unfounded_sets(assignment, nogoods)?;
        }

        let checker = self
            .unfounded_sets
            .as_mut()
            .map(|checker| checker as &mut dyn UnfoundedSetChecker);
        self.num_learned_nogoods += self.nogoods.transfer(nogoods, checker);
        Ok(())
    }
}
