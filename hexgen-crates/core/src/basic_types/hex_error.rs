use thiserror::Error;

#[cfg(doc)]
use crate::external::ExternalSource;

/// Errors which abort model generation for an evaluation unit.
///
/// Expected negative outcomes (an incompatible guess, a non-minimal candidate, a found unfounded
/// set) are never reported through this type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    /// A rule shape which cannot be rewritten, e.g. a weak constraint inside an evaluation unit
    /// which requires the FLP transformation.
    #[error("unsupported rule `{rule}`: {reason}")]
    UnsupportedRule { rule: String, reason: String },
    /// A rule containing a variable which is neither bound by a positive ordinary body atom nor
    /// by an assignment.
    #[error("rule `{rule}` is not safe: variable {variable} cannot be bound")]
    UnsafeRule { rule: String, variable: String },
    /// No evaluation procedure was registered for the external predicate.
    #[error("no external source registered for &{0}")]
    UnknownExternalSource(String),
    /// An external atom was used with the wrong number of input or output terms.
    #[error("&{predicate} expects {expected} {position} terms but got {actual}")]
    ArityMismatch {
        predicate: String,
        position: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The evaluation procedure of an external atom failed.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    /// Solving the FLP-head program under a compatible candidate did not produce exactly one
    /// answer set, which cannot happen for a correctly constructed program.
    #[error("the FLP head program has {0} answer sets under a compatible candidate")]
    InconsistentFlpHead(usize),
    /// A worker thread of the pipelined model generator stopped without delivering a result.
    #[error("model generation pipeline terminated unexpectedly: {0}")]
    PipelineTerminated(String),
}

/// Error reported by an [`ExternalSource`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("evaluation of &{source_name} failed: {message}")]
pub struct EvaluationError {
    pub source_name: String,
    pub message: String,
}

impl EvaluationError {
    pub fn new(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        EvaluationError {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}
