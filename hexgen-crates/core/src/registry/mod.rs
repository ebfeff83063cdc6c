//! The shared store of terms, atoms and rules.
//!
//! The [`Registry`] is shared between the threads of a model generator through an `Arc`; every
//! table is append-only, so ids and [`AtomAddress`](crate::basic_types::AtomAddress)es handed
//! out remain valid for the lifetime of the registry.
mod atom_registry;
mod atoms;
mod predicate_mask;
mod rule;
mod substitution;
mod term;

pub use atom_registry::*;
pub use atoms::*;
pub use predicate_mask::*;
pub use rule::*;
pub use substitution::*;
pub use term::*;
