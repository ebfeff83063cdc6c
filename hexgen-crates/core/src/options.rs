//! The options which control how models of an evaluation unit are generated.
use enumset::EnumSet;
use enumset::EnumSetType;

/// Options of the guess-and-check model generators.
#[derive(Debug, Clone)]
pub struct ModelGeneratorOptions {
    /// Collect all compatible models before yielding any and drop those which have a compatible
    /// subset. Only used by the synchronous generator.
    pub min_check: bool,
    /// Check candidates for minimality with respect to the FLP reduct.
    pub flp_check: bool,
    /// Check candidates for unfounded sets.
    pub ufs_check: bool,
    /// Hand learned nogoods to the unfounded set checker and clear them after every transfer,
    /// instead of retaining the frequently added ones.
    pub ufs_check_assumption_based: bool,
    /// Which kinds of nogoods are learned from external sources; an empty set disables learning.
    pub external_learning: EnumSet<LearningMode>,
    /// Instantiate nonground nogoods produced by [`LearningMode::Generalize`] over the ground
    /// program.
    pub nonground_nogood_instantiation: bool,
    /// Use the well-justified FLP semantics, i.e. check candidates with a fixpoint iteration.
    pub well_justified: bool,
    /// Capacity of the queues of the pipelined generator; `0` behaves like `1`.
    pub model_queue_size: usize,
    /// Extend guessing rules with domain predicates computed by evaluating external atoms
    /// whose outputs are not bound otherwise.
    pub auto_strong_safety: bool,
    /// The semantics of disjunctive heads in the backend solver.
    pub oracle_backend: OracleBackend,
    /// Decide minimality with a single solve of the reduct extended with shadow predicates,
    /// instead of enumerating its models and comparing.
    pub encode_minimality_check_into_reduct: bool,
    /// When the propagator evaluates external atoms during search.
    pub evaluation_heuristic: EvaluationHeuristic,
    /// When the propagator checks partial assignments for unfounded sets.
    pub ufs_check_heuristic: UfsCheckHeuristic,
    pub generator_kind: GeneratorKind,
    /// Upper bound on the threads evaluating external atoms concurrently in the final
    /// compatibility check.
    pub final_check_workers: usize,
    /// Number of retained learned nogoods after which the least frequently added ones are
    /// forgotten.
    pub forget_threshold: usize,
}

impl Default for ModelGeneratorOptions {
    fn default() -> Self {
        Self {
            min_check: false,
            flp_check: true,
            ufs_check: false,
            ufs_check_assumption_based: false,
            external_learning: LearningMode::InputOutput | LearningMode::Negative,
            nonground_nogood_instantiation: false,
            well_justified: false,
            model_queue_size: 5,
            auto_strong_safety: false,
            oracle_backend: OracleBackend::default(),
            encode_minimality_check_into_reduct: true,
            evaluation_heuristic: EvaluationHeuristic::default(),
            ufs_check_heuristic: UfsCheckHeuristic::default(),
            generator_kind: GeneratorKind::default(),
            final_check_workers: 4,
            forget_threshold: 10000,
        }
    }
}

/// The kinds of nogoods which can be learned from external sources.
#[derive(Debug, EnumSetType)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum LearningMode {
    /// The input of an external atom implies each output tuple it produced.
    InputOutput,
    /// Evaluate external atoms during the search of the synchronous generator, as soon as all
    /// of their inputs are assigned, and learn from the results.
    Partial,
    /// Let sources lift learned nogoods to nonground ones.
    Generalize,
    /// The input of an external atom implies that guessed tuples it did not produce are false.
    Negative,
}

/// How the backend solver treats disjunctive rule heads.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OracleBackend {
    /// Disjunctive heads are minimal; models are answer sets of the guessing program.
    #[default]
    Minimal,
    /// Disjunctive heads behave like choices with an at-least-one constraint, so models may be
    /// non-minimal and minimality must always be checked for disjunctive units.
    ChoiceDisjunction,
}

/// When external atoms are evaluated during the search of the backend solver.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum EvaluationHeuristic {
    /// Evaluate an atom whenever one of its watched atoms is assigned, on a partial input if
    /// need be. Evaluations on a partial input only yield nogoods; the guess is verified once
    /// all relevant atoms are assigned.
    Always,
    /// Never evaluate during search; the final check evaluates everything.
    Never,
    /// Evaluate an atom once its inputs and replacement atoms are completely assigned, reusing
    /// the previous outputs while its input is unchanged.
    #[default]
    InputComplete,
}

/// When partial assignments are checked for unfounded sets.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum UfsCheckHeuristic {
    /// Only check complete candidates.
    #[default]
    Post,
    /// Check after every propagation.
    Max,
    /// Check after every tenth propagation.
    Periodic,
}

/// Which model generator the factory creates.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum GeneratorKind {
    /// Solve, check and emit on the calling thread.
    Synchronous,
    /// Solve and verify on two background threads connected by bounded queues.
    #[default]
    Pipelined,
}
