//! Generates the models of one evaluation unit.
//!
//! The program of the unit is rewritten into a guessing program over the truth values of its
//! external atoms. An oracle enumerates the answer sets of the guessing program; each answer set
//! is checked for compatibility with the actual outputs of the external atoms and, where the
//! unit requires it, for minimality. Two generators implement this: the
//! [`GuessAndCheckModelGenerator`] does everything on the calling thread, the
//! [`PipelinedModelGenerator`] solves and verifies on two threads connected by bounded queues.
mod factory;
mod guess_and_check;
mod minimality;
mod model_queue;
mod nogood_transfer;
mod pipelined;
#[cfg(test)]
mod test_units;
mod verification;

use std::fmt::Debug;

pub use factory::*;
pub use guess_and_check::*;
pub use model_queue::*;
pub use pipelined::*;
pub use verification::*;

use convert_case::Case;
use convert_case::Casing;

use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::create_statistics_struct;
use crate::options::GeneratorKind;
use crate::statistics::log_statistic_postfix;
use crate::statistics::should_log_statistics;
use crate::statistics::Statistic;
use crate::statistics::StatisticLogger;

create_statistics_struct!(
    /// Counters of one model generator.
    GeneratorStatistics {
        /// Answer sets of the guessing program received from the oracle.
        num_candidates: usize,
        num_compatibility_checks: usize,
        num_incompatible_candidates: usize,
        num_flp_checks: usize,
        num_flp_rejections: usize,
        num_ufs_checks: usize,
        num_ufs_rejections: usize,
        num_models: usize,
        /// Nogoods handed to the oracle after it reported a candidate.
        num_learned_nogoods: usize,
        /// Nogoods handed to the oracle by its propagator while it searched.
        num_nogoods_learned_during_search: usize,
        num_external_evaluations: usize,
        /// External atoms of accepted or rejected candidates whose guess the oracle thread had
        /// already confirmed. Only counted by the pipelined generator.
        num_atoms_verified_during_search: usize,
        /// The most candidates waiting for verification at once. Only counted by the pipelined
        /// generator.
        max_queued_candidates: usize,
    }
);

/// Produces the models of one evaluation unit, one at a time.
pub trait ModelGenerator: Send + Debug {
    /// Returns the next model with the input of the unit removed, or `None` once every model was
    /// returned. Once `None` was returned, every further call returns `None` as well.
    ///
    /// An error terminates the generator; subsequent calls return `None`.
    fn next_model(&mut self) -> Result<Option<Interpretation>, HexError>;

    fn statistics(&self) -> GeneratorStatistics;

    fn kind(&self) -> GeneratorKind;

    /// Logs the counters below `logger`, prefixed with the kind of the generator, and then the
    /// closing line. Does nothing unless statistic logging was configured.
    fn log_statistics(&self, logger: StatisticLogger) {
        if !should_log_statistics() {
            return;
        }
        let kind = format!("{:?}", self.kind()).to_case(Case::Snake);
        self.statistics().log(logger.attach_to_prefix(kind));
        log_statistic_postfix();
    }
}
