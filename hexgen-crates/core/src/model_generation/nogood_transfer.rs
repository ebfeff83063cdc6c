use std::sync::Arc;

use log::trace;

use super::GenerationContext;
use crate::basic_types::Interpretation;
use crate::basic_types::NogoodSink;
use crate::checkers::UnfoundedSetChecker;
use crate::external::LearnedNogoods;
use crate::external::NogoodGrounder;
use crate::registry::Registry;

/// Collects the nogoods learned from external atoms and hands new ones to the oracle.
///
/// Ground nogoods are forwarded once. Afterwards they are either dropped from the container
/// (assumption-based unfounded set checking, where the checker keeps its own copy) or retained
/// until the container grows beyond the forget threshold, at which point the least frequently
/// added ones are forgotten. Nonground nogoods are collected by a [`NogoodGrounder`] and
/// instantiated over the atoms of the program if instantiation is enabled.
#[derive(Debug)]
pub(crate) struct NogoodTransfer {
    learned: LearnedNogoods,
    learning_enabled: bool,
    num_transferred: usize,
    grounder: Option<NogoodGrounder>,
    program_atoms: Interpretation,
    assumption_based: bool,
    forget_threshold: usize,
}

impl NogoodTransfer {
    pub(crate) fn new(
        registry: Arc<Registry>,
        program_atoms: Interpretation,
        learning_enabled: bool,
        instantiate_nonground: bool,
        assumption_based: bool,
        forget_threshold: usize,
    ) -> NogoodTransfer {
        NogoodTransfer {
            learned: LearnedNogoods::default(),
            learning_enabled,
            num_transferred: 0,
            grounder: instantiate_nonground.then(|| NogoodGrounder::new(registry)),
            program_atoms,
            assumption_based,
            forget_threshold,
        }
    }

    /// A transfer into the oracle of the ground program of `context`.
    pub(crate) fn for_context(context: &GenerationContext) -> NogoodTransfer {
        let options = &context.options;
        NogoodTransfer::new(
            Arc::clone(&context.registry),
            context.program.program_mask().clone(),
            context.learning_enabled(),
            options.nonground_nogood_instantiation,
            options.ufs_check_assumption_based,
            options.forget_threshold,
        )
    }

    /// The container learning call sites write to; `None` if learning is disabled.
    pub(crate) fn sink(&mut self) -> Option<&mut dyn NogoodSink> {
        if self.learning_enabled {
            Some(&mut self.learned)
        } else {
            None
        }
    }

    /// Merges nogoods collected elsewhere, e.g. by a worker thread.
    pub(crate) fn merge(&mut self, other: LearnedNogoods) {
        self.learned.merge(other);
    }

    /// Writes the nogoods learned since the previous transfer to `oracle` and returns their
    /// number.
    pub(crate) fn transfer(
        &mut self,
        oracle: &mut dyn NogoodSink,
        unfounded_set_checker: Option<&mut dyn UnfoundedSetChecker>,
    ) -> usize {
        let fresh = self.learned.ground.nogoods_from(self.num_transferred).to_vec();
        for nogood in &fresh {
            oracle.add_nogood(nogood.clone());
        }
        if let Some(checker) = unfounded_set_checker {
            checker.learn_nogoods_from_main_search(&fresh);
        }

        let mut count = fresh.len();
        let nonground = std::mem::take(&mut self.learned.nonground);
        if let Some(grounder) = self.grounder.as_mut() {
            for nogood in nonground {
                grounder.add(nogood);
            }
            if !grounder.is_empty() {
                count += grounder.instantiate(&self.program_atoms, oracle);
            }
        }

        if self.assumption_based {
            self.learned.ground.clear();
        } else if self.learned.ground.len() > self.forget_threshold {
            self.learned.ground.forget_least_frequently_added();
        }
        self.num_transferred = self.learned.ground.len();

        if count > 0 {
            trace!("transferred {count} learned nogoods");
        }
        count
    }

    #[cfg(test)]
    pub(crate) fn num_retained(&self) -> usize {
        self.learned.ground.len()
    }
}
