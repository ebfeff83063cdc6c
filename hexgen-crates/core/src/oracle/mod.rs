//! The backend which enumerates the answer sets of ground programs.
//!
//! Model generators talk to it through [`SolverOracle`]; external atoms are verified during its
//! search by [`ExternalPropagator`]s, and nogoods learned elsewhere reach it through a
//! [`NogoodInbox`].
mod ground_solver;
mod nogood_inbox;
mod propagator;
mod solver_oracle;
pub mod termination;

pub use ground_solver::*;
pub use nogood_inbox::*;
pub use propagator::*;
pub use solver_oracle::*;
pub use termination::*;
