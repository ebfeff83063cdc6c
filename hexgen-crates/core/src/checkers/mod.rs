//! Checks applied to the candidates produced by the oracle: compatibility with the external
//! atoms, minimality with respect to the FLP reduct, unfounded sets and well-justification.
mod clause_search;
mod compatibility;
mod fixpoint;
mod flp;
mod unfounded_set;

pub use clause_search::*;
pub use compatibility::*;
pub use fixpoint::*;
pub use flp::*;
pub use unfounded_set::*;
