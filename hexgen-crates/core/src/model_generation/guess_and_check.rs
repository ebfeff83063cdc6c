use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;
use log::trace;

use super::minimality::MinimalityChecker;
use super::nogood_transfer::NogoodTransfer;
use super::GenerationContext;
use super::GeneratorStatistics;
use super::ModelGenerator;
use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::basic_types::NogoodSink;
use crate::checkers::is_compatible_set;
use crate::hexgen_assert_simple;
use crate::options::GeneratorKind;
use crate::options::LearningMode;
use crate::oracle::ExternalPropagator;
use crate::oracle::Indefinite;
use crate::oracle::ModelSearchResult;
use crate::oracle::NogoodInbox;
use crate::oracle::PartialAssignment;
use crate::oracle::PropagatorHandle;
use crate::oracle::SolverOracle;

/// Generates the models of a unit on the calling thread.
///
/// Every answer set of the guessing program is checked for compatibility after the oracle
/// reported it, and then for minimality if the unit requires it. With
/// [`LearningMode::Partial`], external atoms are additionally evaluated during the search as soon
/// as their inputs are assigned.
#[derive(Debug)]
pub struct GuessAndCheckModelGenerator {
    context: Arc<GenerationContext>,
    oracle: Box<dyn SolverOracle>,
    learner: Option<PropagatorHandle<PartialEvaluationLearner>>,
    inbox: NogoodInbox,
    minimality: MinimalityChecker,
    nogoods: NogoodTransfer,
    statistics: GeneratorStatistics,
    finished: bool,
    /// The minimal models, once they were collected for the minimality check.
    minimal_models: Option<VecDeque<Interpretation>>,
}

impl GuessAndCheckModelGenerator {
    pub(crate) fn new(context: Arc<GenerationContext>) -> GuessAndCheckModelGenerator {
        let mut oracle = context.create_oracle();
        let learner = context
            .options
            .external_learning
            .contains(LearningMode::Partial)
            .then(|| oracle.add_typed_propagator(PartialEvaluationLearner::new(Arc::clone(&context))));

        GuessAndCheckModelGenerator {
            inbox: oracle.nogood_inbox(),
            oracle,
            learner,
            minimality: MinimalityChecker::new(Arc::clone(&context)),
            nogoods: NogoodTransfer::for_context(&context),
            statistics: GeneratorStatistics::default(),
            finished: false,
            minimal_models: None,
            context,
        }
    }

    /// Searches for the next answer set of the guessing program which is an answer set of the
    /// unit. Returns the complete candidate, including hidden atoms.
    fn next_answer_set(&mut self) -> Result<Option<Interpretation>, HexError> {
        loop {
            let candidate = match self.oracle.next_model(&mut Indefinite)? {
                ModelSearchResult::Model(candidate) => candidate,
                ModelSearchResult::Exhausted => return Ok(None),
                ModelSearchResult::Unknown => {
                    debug!("oracle gave up without a conclusion");
                    return Ok(None);
                }
            };
            self.statistics.num_candidates += 1;
            trace!("candidate {}", self.context.registry.format_interpretation(&candidate));

            self.statistics.num_compatibility_checks += 1;
            let compatible = is_compatible_set(
                &self.context.evaluator,
                &self.context.program,
                &candidate,
                self.nogoods.sink(),
            )?;
            self.statistics.num_learned_nogoods += self
                .nogoods
                .transfer(&mut self.inbox, self.minimality.unfounded_set_checker());
            if !compatible {
                self.statistics.num_incompatible_candidates += 1;
                continue;
            }

            let is_model = self.minimality.is_model(
                &candidate,
                &mut self.nogoods,
                &mut self.inbox,
                &mut self.statistics,
            )?;
            if is_model {
                return Ok(Some(candidate));
            }
        }
    }

    fn next_minimal_model(&mut self) -> Result<Option<Interpretation>, HexError> {
        if self.minimal_models.is_none() {
            let mut models = Vec::new();
            while let Some(candidate) = self.next_answer_set()? {
                models.push(self.context.to_model(&candidate));
            }
            let minimal = retain_minimal(models);
            debug!("{} models remain after the minimality check", minimal.len());
            self.minimal_models = Some(minimal);
        }
        Ok(self.minimal_models.as_mut().and_then(VecDeque::pop_front))
    }

    fn search(&mut self) -> Result<Option<Interpretation>, HexError> {
        if self.context.options.min_check {
            return self.next_minimal_model();
        }
        let model = self.next_answer_set()?;
        Ok(model.map(|candidate| self.context.to_model(&candidate)))
    }
}

impl ModelGenerator for GuessAndCheckModelGenerator {
    fn next_model(&mut self) -> Result<Option<Interpretation>, HexError> {
        if self.finished {
            return Ok(None);
        }

        let result = self.search();
        self.statistics.num_external_evaluations = self.context.evaluator.num_evaluations();
        if let Some(learner) = self
            .learner
            .and_then(|handle| self.oracle.get_propagator(handle))
        {
            self.statistics.num_nogoods_learned_during_search = learner.num_learned_nogoods;
        }
        match &result {
            Ok(Some(_)) => self.statistics.num_models += 1,
            Ok(None) => {
                self.finished = true;
                debug!("model generation finished: {}", self.oracle.statistics());
            }
            Err(error) => {
                self.finished = true;
                debug!("model generation failed: {error}");
            }
        }
        result
    }

    fn statistics(&self) -> GeneratorStatistics {
        self.statistics
    }

    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Synchronous
    }
}

/// Drops every model which has another model as a subset. Of equal models only the first is
/// kept.
fn retain_minimal(models: Vec<Interpretation>) -> VecDeque<Interpretation> {
    models
        .iter()
        .enumerate()
        .filter(|&(index, model)| {
            !models.iter().enumerate().any(|(other_index, other)| {
                other_index != index
                    && other.is_subset_of(model)
                    && (other != model || other_index < index)
            })
        })
        .map(|(_, model)| model.clone())
        .collect()
}

/// Evaluates external atoms during the search once all of their inputs are assigned and hands
/// the learned nogoods to the oracle. Guesses are not verified, that is left to the check of the
/// complete candidate.
#[derive(Debug)]
struct PartialEvaluationLearner {
    context: Arc<GenerationContext>,
    inputs: Vec<Interpretation>,
    last_inputs: Vec<Option<Interpretation>>,
    nogoods: NogoodTransfer,
    num_learned_nogoods: usize,
}

impl PartialEvaluationLearner {
    fn new(context: Arc<GenerationContext>) -> PartialEvaluationLearner {
        let program_mask = context.program.program_mask();
        let inputs = context
            .program
            .external_masks()
            .iter()
            .map(|mask| mask.inputs.intersection(program_mask))
            .collect::<Vec<_>>();

        PartialEvaluationLearner {
            last_inputs: vec![None; inputs.len()],
            inputs,
            nogoods: NogoodTransfer::for_context(&context),
            num_learned_nogoods: 0,
            context,
        }
    }
}

impl ExternalPropagator for PartialEvaluationLearner {
    fn name(&self) -> &str {
        "PartialEvaluationLearner"
    }

    fn propagate(
        &mut self,
        assignment: PartialAssignment<'_>,
        nogoods: &mut dyn NogoodSink,
    ) -> Result<(), HexError> {
        let context = Arc::clone(&self.context);
        for (index, mask) in context.program.external_masks().iter().enumerate() {
            if !assignment.is_complete_on(&self.inputs[index]) {
                continue;
            }
            let input = assignment.partial.intersection(&self.inputs[index]);
            if self.last_inputs[index].as_ref() == Some(&input) {
                continue;
            }

            trace!("learning from external atom {index} on its complete input");
            let completed = context.evaluator.evaluate(
                mask.atom,
                assignment.partial,
                context.program.program_mask(),
                &mut |_| true,
                self.nogoods.sink(),
            )?;
            hexgen_assert_simple!(completed, "the evaluation callback never aborts");
            self.last_inputs[index] = Some(input);
        }

        self.num_learned_nogoods += self.nogoods.transfer(nogoods, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use enumset::EnumSet;

    use super::*;
    use crate::basic_types::AtomAddress;
    use crate::model_generation::test_units;
    use crate::options::GeneratorKind;
    use crate::options::ModelGeneratorOptions;

    fn synchronous() -> ModelGeneratorOptions {
        ModelGeneratorOptions {
            generator_kind: GeneratorKind::Synchronous,
            ..Default::default()
        }
    }

    fn interpretation(atoms: &[u32]) -> Interpretation {
        atoms.iter().map(|&atom| AtomAddress(atom)).collect()
    }

    #[test]
    fn compatible_guess_is_the_only_model() {
        let unit = test_units::even_unit();

        assert_eq!(unit.models(synchronous()), vec!["{dom(1), dom(2), p(1)}"]);
    }

    #[test]
    fn models_do_not_depend_on_learning() {
        let unit = test_units::even_unit();
        let options = ModelGeneratorOptions {
            external_learning: EnumSet::empty(),
            ..synchronous()
        };

        assert_eq!(unit.models(options), vec!["{dom(1), dom(2), p(1)}"]);
    }

    #[test]
    fn partial_learning_finds_the_same_models() {
        let unit = test_units::even_unit();
        let options = ModelGeneratorOptions {
            external_learning: LearningMode::InputOutput | LearningMode::Partial,
            ..synchronous()
        };

        assert_eq!(unit.models(options), vec!["{dom(1), dom(2), p(1)}"]);
    }

    #[test]
    fn nogoods_learned_during_search_are_counted() {
        let unit = test_units::even_unit();
        let count = |external_learning: EnumSet<LearningMode>| {
            let options = ModelGeneratorOptions {
                external_learning,
                ..synchronous()
            };
            let mut generator = unit
                .factory(options)
                .create_model_generator(&Interpretation::new())
                .expect("test units can be grounded");
            let _ = test_units::collect_models(generator.as_mut());
            generator.statistics().num_nogoods_learned_during_search
        };

        assert!(count(LearningMode::InputOutput | LearningMode::Partial) > 0);
        assert_eq!(count(LearningMode::InputOutput.into()), 0);
    }

    #[test]
    fn self_supporting_atom_is_rejected_by_the_flp_check() {
        let unit = test_units::self_support_unit();

        assert_eq!(unit.models(synchronous()), vec!["{}"]);
    }

    #[test]
    fn self_supporting_atom_is_rejected_by_the_unfounded_set_check() {
        let unit = test_units::self_support_unit();
        let options = ModelGeneratorOptions {
            flp_check: false,
            ufs_check: true,
            ..synchronous()
        };

        assert_eq!(unit.models(options), vec!["{}"]);
    }

    #[test]
    fn self_supporting_atom_is_not_well_justified() {
        let unit = test_units::self_support_unit();
        let options = ModelGeneratorOptions {
            well_justified: true,
            ..synchronous()
        };

        assert_eq!(unit.models(options), vec!["{}"]);
    }

    #[test]
    fn exhausted_generator_stays_exhausted() {
        let unit = test_units::even_unit();
        let mut generator = unit
            .factory(synchronous())
            .create_model_generator(&Interpretation::new())
            .expect("even unit can be grounded");

        assert!(generator.next_model().expect("even never fails").is_some());
        assert!(generator.next_model().expect("even never fails").is_none());
        assert!(generator.next_model().expect("even never fails").is_none());

        let statistics = generator.statistics();
        assert_eq!(statistics.num_models, 1);
        assert!(statistics.num_candidates >= 1);
        assert!(statistics.num_external_evaluations >= 1);
    }

    #[test]
    fn collected_models_are_reduced_to_the_minimal_ones() {
        let unit = test_units::even_unit();
        let options = ModelGeneratorOptions {
            min_check: true,
            ..synchronous()
        };

        assert_eq!(unit.models(options), vec!["{dom(1), dom(2), p(1)}"]);
    }

    #[test]
    fn supersets_and_repeated_models_are_dropped() {
        let models = vec![
            interpretation(&[1, 2]),
            interpretation(&[1]),
            interpretation(&[3]),
            interpretation(&[1]),
            interpretation(&[2, 3, 4]),
        ];

        let minimal = retain_minimal(models);

        assert_eq!(minimal, VecDeque::from(vec![interpretation(&[1]), interpretation(&[3])]));
    }
}
