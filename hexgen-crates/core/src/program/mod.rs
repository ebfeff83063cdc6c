//! Evaluation units and the programs derived from them.
mod annotated_ground_program;
mod component;
mod domain_exploration;
mod ground_program;
mod grounder;
mod rewriter;

pub use annotated_ground_program::*;
pub use component::*;
pub use domain_exploration::*;
pub use ground_program::*;
pub use grounder::*;
pub use rewriter::*;
