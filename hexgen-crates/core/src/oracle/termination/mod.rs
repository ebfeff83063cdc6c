//! A [`TerminationCondition`] is a condition which is polled by an oracle during its search. It
//! indicates when the oracle should stop, even if no definitive conclusion has been reached.
mod decision_budget;
mod indefinite;
mod stop_flag;

pub use decision_budget::DecisionBudget;
pub use indefinite::Indefinite;
pub use stop_flag::StopFlag;

/// The central trait that defines a termination condition. A termination condition determines when
/// the oracle should give up searching for models.
pub trait TerminationCondition {
    /// Returns `true` when the oracle should stop, `false` otherwise.
    fn should_stop(&mut self) -> bool;
    fn decision_has_been_made(&mut self) {}
}

impl<T: TerminationCondition> TerminationCondition for Option<T> {
    fn should_stop(&mut self) -> bool {
        match self {
            Some(t) => t.should_stop(),
            None => false,
        }
    }

    fn decision_has_been_made(&mut self) {
        if let Some(t) = self {
            t.decision_has_been_made()
        }
    }
}
