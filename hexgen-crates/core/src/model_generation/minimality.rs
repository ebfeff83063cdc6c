use std::sync::Arc;

use log::debug;
use log::trace;

use super::nogood_transfer::NogoodTransfer;
use super::GenerationContext;
use super::GeneratorStatistics;
use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::basic_types::NogoodSink;
use crate::checkers::is_well_justified;
use crate::checkers::EncodingBasedUnfoundedSetChecker;
use crate::checkers::FlpChecker;
use crate::checkers::UnfoundedSetChecker;

/// Decides whether a compatible set is an answer set of the unit.
///
/// With the well-justified semantics every compatible set is checked by a fixpoint iteration.
/// Otherwise units without head cycles and external cycles need no check at all; the others are
/// checked by the FLP check if it is enabled, or else by the unfounded set check.
#[derive(Debug)]
pub(crate) struct MinimalityChecker {
    context: Arc<GenerationContext>,
    flp: Option<FlpChecker>,
    unfounded_sets: Option<EncodingBasedUnfoundedSetChecker>,
}

impl MinimalityChecker {
    pub(crate) fn new(context: Arc<GenerationContext>) -> MinimalityChecker {
        let options = &context.options;
        let flp = options.flp_check.then(|| {
            FlpChecker::new(
                Arc::clone(&context.registry),
                Arc::clone(&context.rewritten),
                Arc::clone(&context.oracles),
                context.inner_external_atoms.clone(),
                &context.input,
                options.encode_minimality_check_into_reduct,
            )
        });
        let unfounded_sets = (options.ufs_check && !options.flp_check)
            .then(|| EncodingBasedUnfoundedSetChecker::new(Arc::clone(&context.program)));

        MinimalityChecker {
            context,
            flp,
            unfounded_sets,
        }
    }

    pub(crate) fn unfounded_set_checker(&mut self) -> Option<&mut dyn UnfoundedSetChecker> {
        self.unfounded_sets
            .as_mut()
            .map(|checker| checker as &mut dyn UnfoundedSetChecker)
    }

    /// Whether the compatible set `candidate` is an answer set. Nogoods learned on the way, and
    /// the nogood of a found unfounded set, are written to `oracle`.
    pub(crate) fn is_model(
        &mut self,
        candidate: &Interpretation,
        nogoods: &mut NogoodTransfer,
        oracle: &mut dyn NogoodSink,
        statistics: &mut GeneratorStatistics,
    ) -> Result<bool, HexError> {
        let context = Arc::clone(&self.context);

        if context.options.well_justified {
            statistics.num_flp_checks += 1;
            let justified = is_well_justified(&context.evaluator, &context.program, candidate)?;
            if !justified {
                debug!("candidate is not well-justified");
                statistics.num_flp_rejections += 1;
            }
            return Ok(justified);
        }

        if !context.check_minimality {
            trace!("no head or external cycles, the compatible set is minimal");
            return Ok(true);
        }

        if let Some(flp) = &self.flp {
            statistics.num_flp_checks += 1;
            let minimal = flp.is_subset_minimal_flp_model(
                &context.evaluator,
                candidate,
                &context.input,
                nogoods.sink(),
            )?;
            statistics.num_learned_nogoods += nogoods.transfer(oracle, self.unfounded_set_checker());
            if !minimal {
                statistics.num_flp_rejections += 1;
            }
            return Ok(minimal);
        }

        if let Some(checker) = self.unfounded_sets.as_mut() {
            statistics.num_ufs_checks += 1;
            let unfounded = checker.unfounded_set(
                &context.evaluator,
                candidate,
                context.program.program_mask(),
                nogoods.sink(),
            )?;
            if let Some(nogood) = checker.last_unfounded_set_nogood() {
                oracle.add_nogood(nogood.clone());
                statistics.num_learned_nogoods += 1;
            }
            statistics.num_learned_nogoods += nogoods.transfer(oracle, self.unfounded_set_checker());
            if !unfounded.is_empty() {
                debug!("candidate has an unfounded set of {} atoms", unfounded.len());
                statistics.num_ufs_rejections += 1;
                return Ok(false);
            }
        }

        Ok(true)
    }
}
