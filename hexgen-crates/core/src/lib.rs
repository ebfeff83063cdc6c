//! Guess-and-check model generation for answer-set programs with external atoms.
//!
//! An evaluation unit is rewritten into a guessing program in which every external atom is
//! replaced by guessed replacement atoms. The answer sets of the guessing program, enumerated by
//! a [`SolverOracle`](oracle::SolverOracle), are candidates; a candidate is a model of the unit if
//! the guesses agree with the actual outputs of the external sources and, where the unit needs
//! it, the candidate passes a minimality check.
//!
//! Models are produced by the generators created through a
//! [`GuessAndCheckModelGeneratorFactory`].
#[doc(hidden)]
pub mod asserts;
pub mod basic_types;
pub mod checkers;
pub mod containers;
pub mod external;
pub mod model_generation;
pub mod options;
pub mod oracle;
pub mod program;
pub mod registry;
pub mod statistics;

pub use convert_case;

pub use crate::basic_types::HexError;
pub use crate::basic_types::Interpretation;
pub use crate::model_generation::GuessAndCheckModelGeneratorFactory;
pub use crate::model_generation::ModelGenerator;
pub use crate::options::ModelGeneratorOptions;
