use super::TermId;
use crate::basic_types::AtomAddress;
use crate::storage_key;

storage_key!(
    /// Id of an ordinary atom which contains variables.
    NongroundAtomId
);
storage_key!(
    /// Id of a builtin comparison atom.
    BuiltinAtomId
);
storage_key!(
    /// Id of an external atom occurrence.
    ExternalAtomId
);

/// Reference to any atom stored in the [`Registry`](super::Registry).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AtomId {
    Ground(AtomAddress),
    Nonground(NongroundAtomId),
    Builtin(BuiltinAtomId),
    External(ExternalAtomId),
}

impl AtomId {
    pub fn is_ordinary(&self) -> bool {
        matches!(self, AtomId::Ground(_) | AtomId::Nonground(_))
    }

    pub fn is_ground_ordinary(&self) -> bool {
        matches!(self, AtomId::Ground(_))
    }

    pub fn as_external(&self) -> Option<ExternalAtomId> {
        match self {
            AtomId::External(id) => Some(*id),
            _ => None,
        }
    }
}

/// An atom `p(t1, ..., tn)` stored as the tuple `[p, t1, ..., tn]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OrdinaryAtom {
    pub tuple: Vec<TermId>,
}

impl OrdinaryAtom {
    pub fn new(tuple: Vec<TermId>) -> OrdinaryAtom {
        OrdinaryAtom { tuple }
    }

    pub fn predicate(&self) -> TermId {
        self.tuple[0]
    }

    pub fn arguments(&self) -> &[TermId] {
        &self.tuple[1..]
    }

    pub fn arity(&self) -> usize {
        self.tuple.len() - 1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinOperator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BuiltinOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BuiltinOperator::Equal => "=",
            BuiltinOperator::NotEqual => "!=",
            BuiltinOperator::Less => "<",
            BuiltinOperator::LessEqual => "<=",
            BuiltinOperator::Greater => ">",
            BuiltinOperator::GreaterEqual => ">=",
        }
    }

    pub fn holds(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering;
        match self {
            BuiltinOperator::Equal => ordering == Ordering::Equal,
            BuiltinOperator::NotEqual => ordering != Ordering::Equal,
            BuiltinOperator::Less => ordering == Ordering::Less,
            BuiltinOperator::LessEqual => ordering != Ordering::Greater,
            BuiltinOperator::Greater => ordering == Ordering::Greater,
            BuiltinOperator::GreaterEqual => ordering != Ordering::Less,
        }
    }
}

/// A comparison `left op right`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BuiltinAtom {
    pub operator: BuiltinOperator,
    pub left: TermId,
    pub right: TermId,
}

/// An occurrence `&predicate[inputs](outputs)` of an external atom.
///
/// The replacement predicates are shared by every occurrence of the same external predicate:
/// `replacement_positive(inputs, outputs)` stands for "the output tuple is produced" and
/// `replacement_negative(inputs, outputs)` for its complement.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExternalAtom {
    pub predicate: TermId,
    pub inputs: Vec<TermId>,
    pub outputs: Vec<TermId>,
    pub replacement_positive: TermId,
    pub replacement_negative: TermId,
}

impl ExternalAtom {
    /// The tuple of the replacement atom with predicate `replacement`.
    pub fn replacement_tuple(&self, replacement: TermId) -> Vec<TermId> {
        let mut tuple = Vec::with_capacity(1 + self.inputs.len() + self.outputs.len());
        tuple.push(replacement);
        tuple.extend_from_slice(&self.inputs);
        tuple.extend_from_slice(&self.outputs);
        tuple
    }
}
