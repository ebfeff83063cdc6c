//! Evaluation of external atoms and learning from their answers.
mod evaluator;
mod input_masks;
mod nonground_nogood;
mod source;
#[cfg(test)]
pub(crate) mod test_sources;

pub use evaluator::*;
pub use input_masks::*;
pub use nonground_nogood::*;
pub use source::*;
