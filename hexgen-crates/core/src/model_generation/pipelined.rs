use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use log::debug;
use log::trace;
use log::warn;
use parking_lot::Mutex;

use super::minimality::MinimalityChecker;
use super::nogood_transfer::NogoodTransfer;
use super::ExternalAtomVerifier;
use super::GenerationContext;
use super::GeneratorStatistics;
use super::ModelGenerator;
use super::ModelQueue;
use super::VerificationSnapshot;
use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::basic_types::NogoodSink;
use crate::checkers::is_compatible_set;
use crate::checkers::verify_external_atom;
use crate::external::LearnedNogoods;
use crate::hexgen_assert_advanced;
use crate::options::GeneratorKind;
use crate::oracle::ModelSearchResult;
use crate::oracle::NogoodInbox;
use crate::oracle::PropagatorHandle;
use crate::oracle::SolverOracle;
use crate::oracle::StopFlag;

/// An answer set of the guessing program together with what the search already verified.
#[derive(Debug)]
struct Candidate {
    interpretation: Interpretation,
    snapshot: VerificationSnapshot,
    /// Nogoods the search had learned from external atoms when the candidate was found.
    nogoods_learned_during_search: usize,
}

type CandidateMessage = Result<Option<Candidate>, HexError>;
type ModelMessage = Result<Option<Interpretation>, HexError>;

/// Generates the models of a unit on two background threads.
///
/// The oracle thread enumerates answer sets of the guessing program, verifying external atoms
/// during its search with an [`ExternalAtomVerifier`], and queues them as candidates. The
/// verification thread evaluates the atoms the search left unverified, checks minimality and
/// queues the resulting models, which [`ModelGenerator::next_model`] takes from the queue. Each
/// queue ends with `Ok(None)` or an error; nogoods learned during verification flow back to the
/// oracle through its [`NogoodInbox`].
///
/// Dropping the generator stops both threads and waits for them.
#[derive(Debug)]
pub struct PipelinedModelGenerator {
    candidates: Arc<ModelQueue<CandidateMessage>>,
    models: Arc<ModelQueue<ModelMessage>>,
    stop: StopFlag,
    statistics: Arc<Mutex<GeneratorStatistics>>,
    oracle_thread: Option<JoinHandle<()>>,
    verification_thread: Option<JoinHandle<()>>,
    finished: bool,
}

impl PipelinedModelGenerator {
    pub(crate) fn new(context: Arc<GenerationContext>) -> Result<PipelinedModelGenerator, HexError> {
        let capacity = context.options.model_queue_size;
        let mut generator = PipelinedModelGenerator {
            candidates: Arc::new(ModelQueue::new(capacity)),
            models: Arc::new(ModelQueue::new(capacity)),
            stop: StopFlag::new(),
            statistics: Arc::new(Mutex::new(GeneratorStatistics::default())),
            oracle_thread: None,
            verification_thread: None,
            finished: false,
        };

        let mut oracle = context.create_oracle();
        let inbox = oracle.nogood_inbox();
        let verifier = ExternalAtomVerifier::is_needed(&context)
            .then(|| oracle.add_typed_propagator(ExternalAtomVerifier::new(Arc::clone(&context))));
        debug!(
            "starting pipelined model generation with queues of size {capacity}, search-time verification: {}",
            verifier.is_some()
        );

        let producer = OracleStage {
            oracle,
            verifier,
            num_external_atoms: context.program.external_masks().len(),
            stop: generator.stop.clone(),
            candidates: Arc::clone(&generator.candidates),
        };
        generator.oracle_thread = Some(spawn("hexgen-oracle", move || producer.run())?);

        let consumer = VerificationStage::new(
            context,
            inbox,
            Arc::clone(&generator.candidates),
            Arc::clone(&generator.models),
            Arc::clone(&generator.statistics),
        );
        generator.verification_thread = Some(spawn("hexgen-verifier", move || consumer.run())?);

        Ok(generator)
    }

    fn shut_down(&mut self) {
        self.stop.raise();
        self.candidates.close();
        self.models.close();
        for handle in [self.oracle_thread.take(), self.verification_thread.take()]
            .into_iter()
            .flatten()
        {
            let name = handle.thread().name().unwrap_or("worker").to_owned();
            if handle.join().is_err() {
                warn!("{name} thread panicked");
            }
        }
    }
}

impl ModelGenerator for PipelinedModelGenerator {
    fn next_model(&mut self) -> Result<Option<Interpretation>, HexError> {
        if self.finished {
            return Ok(None);
        }

        let message = self.models.pop().unwrap_or_else(|| {
            Err(HexError::PipelineTerminated(
                "the model queue was closed before the last model".to_owned(),
            ))
        });
        if !matches!(message, Ok(Some(_))) {
            self.finished = true;
            self.shut_down();
        }
        message
    }

    fn statistics(&self) -> GeneratorStatistics {
        *self.statistics.lock()
    }

    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Pipelined
    }
}

impl Drop for PipelinedModelGenerator {
    fn drop(&mut self) {
        self.shut_down();
    }
}

fn spawn(name: &str, work: impl FnOnce() + Send + 'static) -> Result<JoinHandle<()>, HexError> {
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(work)
        .map_err(|error| HexError::PipelineTerminated(format!("cannot start {name}: {error}")))
}

/// Closes a queue when its writer stops, however it stops.
struct CloseOnDrop<T>(Arc<ModelQueue<T>>);

impl<T> Drop for CloseOnDrop<T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

struct OracleStage {
    oracle: Box<dyn SolverOracle>,
    verifier: Option<PropagatorHandle<ExternalAtomVerifier>>,
    num_external_atoms: usize,
    stop: StopFlag,
    candidates: Arc<ModelQueue<CandidateMessage>>,
}

impl OracleStage {
    fn run(mut self) {
        let _close = CloseOnDrop(Arc::clone(&self.candidates));
        loop {
            let message = match self.oracle.next_model(&mut self.stop) {
                Ok(ModelSearchResult::Model(interpretation)) => {
                    let verifier = self
                        .verifier
                        .and_then(|handle| self.oracle.get_propagator(handle));
                    let snapshot = verifier
                        .map(ExternalAtomVerifier::snapshot)
                        .unwrap_or_else(|| VerificationSnapshot::unevaluated(self.num_external_atoms));
                    Ok(Some(Candidate {
                        interpretation,
                        snapshot,
                        nogoods_learned_during_search: verifier
                            .map_or(0, ExternalAtomVerifier::num_learned_nogoods),
                    }))
                }
                Ok(ModelSearchResult::Exhausted) => Ok(None),
                Ok(ModelSearchResult::Unknown) => {
                    trace!("oracle stopped on request");
                    return;
                }
                Err(error) => Err(error),
            };

            let last = !matches!(message, Ok(Some(_)));
            if self.candidates.push(message).is_err() || last {
                debug!("oracle finished: {}", self.oracle.statistics());
                return;
            }
        }
    }
}

struct VerificationStage {
    context: Arc<GenerationContext>,
    inbox: NogoodInbox,
    candidates: Arc<ModelQueue<CandidateMessage>>,
    models: Arc<ModelQueue<ModelMessage>>,
    shared_statistics: Arc<Mutex<GeneratorStatistics>>,
    statistics: GeneratorStatistics,
    minimality: MinimalityChecker,
    nogoods: NogoodTransfer,
}

impl VerificationStage {
    fn new(
        context: Arc<GenerationContext>,
        inbox: NogoodInbox,
        candidates: Arc<ModelQueue<CandidateMessage>>,
        models: Arc<ModelQueue<ModelMessage>>,
        shared_statistics: Arc<Mutex<GeneratorStatistics>>,
    ) -> VerificationStage {
        VerificationStage {
            minimality: MinimalityChecker::new(Arc::clone(&context)),
            nogoods: NogoodTransfer::for_context(&context),
            context,
            inbox,
            candidates,
            models,
            shared_statistics,
            statistics: GeneratorStatistics::default(),
        }
    }

    fn run(mut self) {
        let _close_models = CloseOnDrop(Arc::clone(&self.models));
        // A blocked oracle thread has to notice when verification stops early.
        let _close_candidates = CloseOnDrop(Arc::clone(&self.candidates));

        while let Some(message) = self.candidates.pop() {
            self.statistics.max_queued_candidates = self
                .statistics
                .max_queued_candidates
                .max(self.candidates.len() + 1);
            let outcome = match message {
                Ok(Some(candidate)) => {
                    self.statistics.num_nogoods_learned_during_search =
                        candidate.nogoods_learned_during_search;
                    match self.check(&candidate.interpretation, &candidate.snapshot) {
                        Ok(true) => Ok(Some(self.context.to_model(&candidate.interpretation))),
                        Ok(false) => continue,
                        Err(error) => Err(error),
                    }
                }
                Ok(None) => Ok(None),
                Err(error) => Err(error),
            };

            let last = !matches!(outcome, Ok(Some(_)));
            if !last {
                self.statistics.num_models += 1;
                self.publish_statistics();
            }
            if self.models.push(outcome).is_err() || last {
                return;
            }
        }
    }

    fn publish_statistics(&mut self) {
        self.statistics.num_external_evaluations = self.context.evaluator.num_evaluations();
        *self.shared_statistics.lock() = self.statistics;
    }

    fn check(
        &mut self,
        candidate: &Interpretation,
        snapshot: &VerificationSnapshot,
    ) -> Result<bool, HexError> {
        self.statistics.num_candidates += 1;
        self.statistics.num_compatibility_checks += 1;
        let compatible = self.is_compatible(candidate, snapshot)?;
        self.statistics.num_learned_nogoods += self
            .nogoods
            .transfer(&mut self.inbox, self.minimality.unfounded_set_checker());

        let accepted = if compatible {
            self.minimality.is_model(
                candidate,
                &mut self.nogoods,
                &mut self.inbox,
                &mut self.statistics,
            )?
        } else {
            self.statistics.num_incompatible_candidates += 1;
            false
        };
        self.publish_statistics();
        Ok(accepted)
    }

    /// Evaluates the external atoms the search did not verify, spread over the final check
    /// workers.
    fn is_compatible(
        &mut self,
        candidate: &Interpretation,
        snapshot: &VerificationSnapshot,
    ) -> Result<bool, HexError> {
        if (0..snapshot.num_atoms()).any(|index| snapshot.is_falsified(index)) {
            trace!("candidate contains a guess falsified during search");
            return Ok(false);
        }
        let pending = snapshot.pending().collect::<Vec<_>>();
        self.statistics.num_atoms_verified_during_search += snapshot.num_atoms() - pending.len();
        if pending.is_empty() {
            hexgen_assert_advanced!(
                is_compatible_set(&self.context.evaluator, &self.context.program, candidate, None)
                    .unwrap_or(false),
                "a candidate verified during search is not compatible"
            );
            return Ok(true);
        }

        let num_workers = self.context.options.final_check_workers.clamp(1, pending.len());
        let chunk_size = pending.len().div_ceil(num_workers);
        let context = self.context.as_ref();
        let learning = context.learning_enabled();
        trace!("evaluating {} external atoms on {num_workers} workers", pending.len());

        let outcomes = thread::scope(|scope| {
            let workers = pending
                .chunks(chunk_size)
                .map(|indices| {
                    scope.spawn(move || -> Result<(bool, LearnedNogoods), HexError> {
                        let mut learned = LearnedNogoods::default();
                        for &index in indices {
                            let sink = learning.then_some(&mut learned as &mut dyn NogoodSink);
                            let verified = verify_external_atom(
                                &context.evaluator,
                                context.program.external_mask(index),
                                candidate,
                                context.program.program_mask(),
                                sink,
                            )?;
                            if !verified {
                                return Ok((false, learned));
                            }
                        }
                        Ok((true, learned))
                    })
                })
                .collect::<Vec<_>>();

            workers
                .into_iter()
                .map(|worker| {
                    worker.join().unwrap_or_else(|_| {
                        Err(HexError::PipelineTerminated(
                            "a final check worker panicked".to_owned(),
                        ))
                    })
                })
                .collect::<Vec<_>>()
        });

        let mut compatible = true;
        for outcome in outcomes {
            let (verified, learned) = outcome?;
            self.nogoods.merge(learned);
            compatible &= verified;
        }
        Ok(compatible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_generation::test_units;
    use crate::options::EvaluationHeuristic;
    use crate::options::GeneratorKind;
    use crate::options::ModelGeneratorOptions;

    fn pipelined() -> ModelGeneratorOptions {
        ModelGeneratorOptions {
            generator_kind: GeneratorKind::Pipelined,
            ..Default::default()
        }
    }

    #[test]
    fn pipeline_finds_the_compatible_guess() {
        let unit = test_units::even_unit();

        assert_eq!(unit.models(pipelined()), vec!["{dom(1), dom(2), p(1)}"]);
    }

    #[test]
    fn final_check_alone_finds_the_same_models() {
        let unit = test_units::even_unit();
        for evaluation_heuristic in [
            EvaluationHeuristic::Never,
            EvaluationHeuristic::Always,
            EvaluationHeuristic::InputComplete,
        ] {
            let options = ModelGeneratorOptions {
                evaluation_heuristic,
                final_check_workers: 1,
                ..pipelined()
            };

            assert_eq!(unit.models(options), vec!["{dom(1), dom(2), p(1)}"]);
        }
    }

    #[test]
    fn pipeline_rejects_self_supporting_atoms() {
        let unit = test_units::self_support_unit();

        assert_eq!(unit.models(pipelined()), vec!["{}"]);
    }

    #[test]
    fn dropping_an_unfinished_generator_stops_its_threads() {
        let unit = test_units::even_unit();
        let options = ModelGeneratorOptions {
            model_queue_size: 0,
            ..pipelined()
        };
        let generator = unit
            .factory(options)
            .create_model_generator(&Interpretation::new())
            .expect("even unit can be grounded");

        drop(generator);
    }

    #[test]
    fn exhausted_pipeline_stays_exhausted() {
        let unit = test_units::even_unit();
        let mut generator = unit
            .factory(pipelined())
            .create_model_generator(&Interpretation::new())
            .expect("even unit can be grounded");

        assert!(generator.next_model().expect("even never fails").is_some());
        assert!(generator.next_model().expect("even never fails").is_none());
        assert!(generator.next_model().expect("even never fails").is_none());
        assert_eq!(generator.statistics().num_models, 1);
    }
}
