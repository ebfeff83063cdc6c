use std::fmt::Display;
use std::fmt::Formatter;

use crate::storage_key;

storage_key!(
    /// Interned [`Term`].
    TermId
);

/// A constant symbol, an integer or a variable.
///
/// Predicates are constant symbols occupying the first position of an atom tuple.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    Constant(String),
    Integer(i64),
    Variable(String),
}

impl Term {
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Constant(name) | Term::Variable(name) => write!(f, "{name}"),
            Term::Integer(value) => write!(f, "{value}"),
        }
    }
}
