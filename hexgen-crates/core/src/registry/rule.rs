use super::AtomId;
use crate::storage_key;

storage_key!(
    /// Id of a stored [`Rule`].
    RuleId
);

/// A possibly default-negated body atom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyLiteral {
    pub atom: AtomId,
    pub naf: bool,
}

impl BodyLiteral {
    pub fn positive(atom: AtomId) -> BodyLiteral {
        BodyLiteral { atom, naf: false }
    }

    pub fn negative(atom: AtomId) -> BodyLiteral {
        BodyLiteral { atom, naf: true }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Regular,
    Constraint,
    /// A weak constraint `:~ body. [weight@level]`.
    Weak { weight: i64, level: i64 },
}

/// `head1 v ... v headn :- body`. An empty head with kind [`RuleKind::Constraint`] is an
/// integrity constraint, an empty body a (disjunctive) fact.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rule {
    pub kind: RuleKind,
    pub head: Vec<AtomId>,
    pub body: Vec<BodyLiteral>,
}

impl Rule {
    pub fn regular(head: Vec<AtomId>, body: Vec<BodyLiteral>) -> Rule {
        Rule {
            kind: RuleKind::Regular,
            head,
            body,
        }
    }

    pub fn constraint(body: Vec<BodyLiteral>) -> Rule {
        Rule {
            kind: RuleKind::Constraint,
            head: Vec::new(),
            body,
        }
    }

    pub fn is_disjunctive(&self) -> bool {
        self.head.len() > 1
    }

    pub fn is_constraint(&self) -> bool {
        self.kind == RuleKind::Constraint
    }

    pub fn external_atoms(&self) -> impl Iterator<Item = (super::ExternalAtomId, bool)> + '_ {
        self.body
            .iter()
            .filter_map(|literal| literal.atom.as_external().map(|id| (id, literal.naf)))
    }
}
