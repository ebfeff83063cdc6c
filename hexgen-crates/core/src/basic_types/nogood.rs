use std::fmt::Display;
use std::fmt::Formatter;

use super::AtomAddress;
use super::Interpretation;
use crate::external::NongroundNogood;

/// A signed ground atom: the atom at `address` has truth value `value`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    pub address: AtomAddress,
    pub value: bool,
}

impl Literal {
    pub fn positive(address: AtomAddress) -> Literal {
        Literal {
            address,
            value: true,
        }
    }

    pub fn negative(address: AtomAddress) -> Literal {
        Literal {
            address,
            value: false,
        }
    }

    /// The literal with the same value `interpretation` assigns to `address`.
    pub fn from_interpretation(address: AtomAddress, interpretation: &Interpretation) -> Literal {
        Literal {
            address,
            value: interpretation.get_fact(address),
        }
    }

    pub fn negated(self) -> Literal {
        Literal {
            address: self.address,
            value: !self.value,
        }
    }

    /// Whether the literal holds in a total interpretation.
    pub fn holds_in(&self, interpretation: &Interpretation) -> bool {
        interpretation.get_fact(self.address) == self.value
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.value {
            write!(f, "+{}", self.address.0)
        } else {
            write!(f, "-{}", self.address.0)
        }
    }
}

/// A set of literals which must never hold simultaneously.
///
/// The literals are kept sorted and free of duplicates, so structurally equal nogoods compare
/// and hash equal regardless of the order in which they were built.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Nogood {
    literals: Vec<Literal>,
}

impl Nogood {
    pub fn new(literals: impl IntoIterator<Item = Literal>) -> Nogood {
        let mut literals = literals.into_iter().collect::<Vec<_>>();
        literals.sort();
        literals.dedup();
        Nogood { literals }
    }

    pub fn insert(&mut self, literal: Literal) {
        if let Err(position) = self.literals.binary_search(&literal) {
            self.literals.insert(position, literal);
        }
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Whether the nogood contains both polarities of some atom, i.e. can never be violated.
    pub fn is_contradictory(&self) -> bool {
        self.literals
            .windows(2)
            .any(|pair| pair[0].address == pair[1].address)
    }

    /// Whether every literal of the nogood holds in the total `interpretation`.
    pub fn is_violated_by(&self, interpretation: &Interpretation) -> bool {
        !self.is_contradictory()
            && self
                .literals
                .iter()
                .all(|literal| literal.holds_in(interpretation))
    }

    pub fn atoms(&self) -> impl Iterator<Item = AtomAddress> + '_ {
        self.literals.iter().map(|literal| literal.address)
    }
}

impl Display for Nogood {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (index, literal) in self.literals.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{literal}")?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<Literal> for Nogood {
    fn from_iter<T: IntoIterator<Item = Literal>>(iter: T) -> Self {
        Nogood::new(iter)
    }
}

/// Something which accepts learned nogoods.
///
/// Learning call sites take an `Option<&mut dyn NogoodSink>`; when it is absent nothing is
/// learned and the behaviour is otherwise unchanged.
pub trait NogoodSink {
    fn add_nogood(&mut self, nogood: Nogood);

    /// Accepts a nogood lifted by an external source. Sinks which cannot make use of nonground
    /// nogoods drop them.
    fn add_nonground_nogood(&mut self, _nogood: NongroundNogood) {}
}

impl NogoodSink for Vec<Nogood> {
    fn add_nogood(&mut self, nogood: Nogood) {
        self.push(nogood);
    }
}

/// Reborrows an optional sink for a single call, so that it can be handed out repeatedly.
pub fn reborrow_sink<'a>(
    sink: &'a mut Option<&mut dyn NogoodSink>,
) -> Option<&'a mut dyn NogoodSink> {
    sink.as_mut().map(|sink| &mut **sink as &mut dyn NogoodSink)
}
