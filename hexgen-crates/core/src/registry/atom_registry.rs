use std::ops::Range;

use itertools::Itertools;
use parking_lot::RwLock;

use super::AtomId;
use super::BuiltinAtom;
use super::BuiltinAtomId;
use super::ExternalAtom;
use super::ExternalAtomId;
use super::NongroundAtomId;
use super::OrdinaryAtom;
use super::Rule;
use super::RuleId;
use super::RuleKind;
use super::Term;
use super::TermId;
use crate::basic_types::AtomAddress;
use crate::basic_types::Interpretation;
use crate::containers::HashMap;
use crate::containers::KeyedVec;
use crate::containers::StorageKey;

/// The kinds of predicates the engine invents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuxiliaryKind {
    /// `r⁺`: the external atom is true for the tuple.
    ReplacementPositive,
    /// `r⁻`: the external atom is false for the tuple.
    ReplacementNegative,
    /// Domain predicate used to make guessing rules strongly safe.
    Domain,
}

impl AuxiliaryKind {
    fn prefix(&self) -> &'static str {
        match self {
            AuxiliaryKind::ReplacementPositive => "aux_r",
            AuxiliaryKind::ReplacementNegative => "aux_n",
            AuxiliaryKind::Domain => "aux_d",
        }
    }
}

#[derive(Debug, Default)]
struct TermTable {
    terms: KeyedVec<TermId, Term>,
    index: HashMap<Term, TermId>,
}

#[derive(Debug, Default)]
struct GroundAtomTable {
    atoms: KeyedVec<AtomAddress, OrdinaryAtom>,
    index: HashMap<Vec<TermId>, AtomAddress>,
}

#[derive(Debug, Default)]
struct NongroundAtomTable {
    atoms: KeyedVec<NongroundAtomId, OrdinaryAtom>,
    index: HashMap<Vec<TermId>, NongroundAtomId>,
}

#[derive(Debug, Default)]
struct AuxiliaryTable {
    by_origin: HashMap<(AuxiliaryKind, TermId), TermId>,
    by_predicate: HashMap<TermId, (AuxiliaryKind, TermId)>,
}

/// Stores terms, atoms and rules and hands out stable ids for them.
///
/// All methods take `&self`; every table sits behind its own lock so that verification threads
/// may register new ground atoms (e.g. replacement atoms of external atom outputs) while other
/// threads read.
#[derive(Debug, Default)]
pub struct Registry {
    terms: RwLock<TermTable>,
    ground_atoms: RwLock<GroundAtomTable>,
    nonground_atoms: RwLock<NongroundAtomTable>,
    builtin_atoms: RwLock<KeyedVec<BuiltinAtomId, BuiltinAtom>>,
    external_atoms: RwLock<KeyedVec<ExternalAtomId, ExternalAtom>>,
    rules: RwLock<KeyedVec<RuleId, Rule>>,
    auxiliaries: RwLock<AuxiliaryTable>,
}

impl Registry {
    pub fn store_term(&self, term: Term) -> TermId {
        if let Some(&id) = self.terms.read().index.get(&term) {
            return id;
        }

        let mut table = self.terms.write();
        if let Some(&id) = table.index.get(&term) {
            return id;
        }
        let id = table.terms.push(term.clone());
        let _ = table.index.insert(term, id);
        id
    }

    pub fn constant(&self, name: &str) -> TermId {
        self.store_term(Term::Constant(name.to_owned()))
    }

    pub fn integer(&self, value: i64) -> TermId {
        self.store_term(Term::Integer(value))
    }

    pub fn variable(&self, name: &str) -> TermId {
        self.store_term(Term::Variable(name.to_owned()))
    }

    pub fn term(&self, id: TermId) -> Term {
        self.terms.read().terms[id].clone()
    }

    pub fn is_variable(&self, id: TermId) -> bool {
        self.terms.read().terms[id].is_variable()
    }

    pub fn lookup_term(&self, term: &Term) -> Option<TermId> {
        self.terms.read().index.get(term).copied()
    }

    /// Stores an ordinary atom; ground atoms receive an address, the others a nonground id. Equal
    /// tuples always yield the same id.
    pub fn store_ordinary_atom(&self, tuple: Vec<TermId>) -> AtomId {
        let is_ground = {
            let terms = self.terms.read();
            tuple.iter().all(|&term| !terms.terms[term].is_variable())
        };

        if is_ground {
            return AtomId::Ground(self.store_ground_atom(tuple));
        }

        let mut table = self.nonground_atoms.write();
        if let Some(&id) = table.index.get(&tuple) {
            return AtomId::Nonground(id);
        }
        let id = table.atoms.push(OrdinaryAtom::new(tuple.clone()));
        let _ = table.index.insert(tuple, id);
        AtomId::Nonground(id)
    }

    /// Stores a variable-free atom, or returns the address it already has.
    pub fn store_ground_atom(&self, tuple: Vec<TermId>) -> AtomAddress {
        if let Some(&address) = self.ground_atoms.read().index.get(&tuple) {
            return address;
        }

        let mut table = self.ground_atoms.write();
        if let Some(&address) = table.index.get(&tuple) {
            return address;
        }
        let address = table.atoms.push(OrdinaryAtom::new(tuple.clone()));
        let _ = table.index.insert(tuple, address);
        address
    }

    pub fn lookup_ground_atom(&self, tuple: &[TermId]) -> Option<AtomAddress> {
        self.ground_atoms.read().index.get(tuple).copied()
    }

    pub fn ground_atom(&self, address: AtomAddress) -> OrdinaryAtom {
        self.ground_atoms.read().atoms[address].clone()
    }

    pub fn ground_atom_predicate(&self, address: AtomAddress) -> TermId {
        self.ground_atoms.read().atoms[address].predicate()
    }

    /// The number of ground atoms, which is also the next address to be handed out.
    pub fn num_ground_atoms(&self) -> usize {
        self.ground_atoms.read().atoms.len()
    }

    /// Calls `visit` for every ground atom with an address in `addresses`.
    pub fn visit_ground_atoms(&self, addresses: Range<usize>, mut visit: impl FnMut(AtomAddress, &OrdinaryAtom)) {
        let table = self.ground_atoms.read();
        for (address, atom) in table.atoms.iter_from(addresses.start).take(addresses.len()) {
            visit(address, atom);
        }
    }

    /// Collects the addresses of all ground atoms whose predicate satisfies `filter`.
    pub fn ground_atoms_where(&self, mut filter: impl FnMut(&OrdinaryAtom) -> bool) -> Interpretation {
        let table = self.ground_atoms.read();
        table
            .atoms
            .iter_with_keys()
            .filter(|(_, atom)| filter(atom))
            .map(|(address, _)| address)
            .collect()
    }

    pub fn nonground_atom(&self, id: NongroundAtomId) -> OrdinaryAtom {
        self.nonground_atoms.read().atoms[id].clone()
    }

    /// The tuple of an ordinary atom, or `None` for builtin and external atoms.
    pub fn ordinary_atom(&self, atom: AtomId) -> Option<OrdinaryAtom> {
        match atom {
            AtomId::Ground(address) => Some(self.ground_atom(address)),
            AtomId::Nonground(id) => Some(self.nonground_atom(id)),
            AtomId::Builtin(_) | AtomId::External(_) => None,
        }
    }

    pub fn store_builtin_atom(&self, builtin: BuiltinAtom) -> AtomId {
        AtomId::Builtin(self.builtin_atoms.write().push(builtin))
    }

    pub fn builtin_atom(&self, id: BuiltinAtomId) -> BuiltinAtom {
        self.builtin_atoms.read()[id]
    }

    /// Stores an occurrence of `&predicate[inputs](outputs)` together with its replacement
    /// predicates.
    pub fn store_external_atom(
        &self,
        predicate: TermId,
        inputs: Vec<TermId>,
        outputs: Vec<TermId>,
    ) -> AtomId {
        let replacement_positive =
            self.auxiliary_predicate(AuxiliaryKind::ReplacementPositive, predicate);
        let replacement_negative =
            self.auxiliary_predicate(AuxiliaryKind::ReplacementNegative, predicate);

        AtomId::External(self.external_atoms.write().push(ExternalAtom {
            predicate,
            inputs,
            outputs,
            replacement_positive,
            replacement_negative,
        }))
    }

    pub fn external_atom(&self, id: ExternalAtomId) -> ExternalAtom {
        self.external_atoms.read()[id].clone()
    }

    pub fn store_rule(&self, rule: Rule) -> RuleId {
        self.rules.write().push(rule)
    }

    pub fn rule(&self, id: RuleId) -> Rule {
        self.rules.read()[id].clone()
    }

    /// Returns the invented predicate of `kind` for `origin`, creating it on first use.
    pub fn auxiliary_predicate(&self, kind: AuxiliaryKind, origin: TermId) -> TermId {
        if let Some(&predicate) = self.auxiliaries.read().by_origin.get(&(kind, origin)) {
            return predicate;
        }

        let mut auxiliaries = self.auxiliaries.write();
        if let Some(&predicate) = auxiliaries.by_origin.get(&(kind, origin)) {
            return predicate;
        }

        let base = format!("{}_{}", kind.prefix(), self.term(origin));
        let predicate = self.fresh_constant(&base);
        let _ = auxiliaries.by_origin.insert((kind, origin), predicate);
        let _ = auxiliaries.by_predicate.insert(predicate, (kind, origin));
        predicate
    }

    /// For an invented predicate, its kind and the symbol it was invented for.
    pub fn auxiliary_origin(&self, predicate: TermId) -> Option<(AuxiliaryKind, TermId)> {
        self.auxiliaries.read().by_predicate.get(&predicate).copied()
    }

    /// Whether `predicate` is a positive or negative replacement predicate.
    pub fn is_replacement_predicate(&self, predicate: TermId) -> bool {
        matches!(
            self.auxiliary_origin(predicate),
            Some((AuxiliaryKind::ReplacementPositive | AuxiliaryKind::ReplacementNegative, _))
        )
    }

    /// Creates a constant named `base`, or `base_<n>` for the smallest `n` not yet in use.
    pub fn fresh_constant(&self, base: &str) -> TermId {
        let mut candidate = base.to_owned();
        let mut counter = 0_usize;
        while self
            .lookup_term(&Term::Constant(candidate.clone()))
            .is_some()
        {
            counter += 1;
            candidate = format!("{base}_{counter}");
        }
        self.constant(&candidate)
    }

    pub fn format_tuple(&self, tuple: &[TermId]) -> String {
        let terms = self.terms.read();
        let predicate = &terms.terms[tuple[0]];
        if tuple.len() == 1 {
            format!("{predicate}")
        } else {
            format!(
                "{predicate}({})",
                tuple[1..].iter().map(|&term| &terms.terms[term]).join(",")
            )
        }
    }

    pub fn format_atom(&self, atom: AtomId) -> String {
        match atom {
            AtomId::Ground(_) | AtomId::Nonground(_) => self
                .ordinary_atom(atom)
                .map(|atom| self.format_tuple(&atom.tuple))
                .unwrap_or_default(),
            AtomId::Builtin(id) => {
                let builtin = self.builtin_atom(id);
                format!(
                    "{}{}{}",
                    self.term(builtin.left),
                    builtin.operator.symbol(),
                    self.term(builtin.right)
                )
            }
            AtomId::External(id) => {
                let external = self.external_atom(id);
                format!(
                    "&{}[{}]({})",
                    self.term(external.predicate),
                    external.inputs.iter().map(|&term| self.term(term)).join(","),
                    external.outputs.iter().map(|&term| self.term(term)).join(",")
                )
            }
        }
    }

    pub fn format_rule(&self, rule: &Rule) -> String {
        let head = rule.head.iter().map(|&atom| self.format_atom(atom)).join(" v ");
        let body = rule
            .body
            .iter()
            .map(|literal| {
                let atom = self.format_atom(literal.atom);
                if literal.naf {
                    format!("not {atom}")
                } else {
                    atom
                }
            })
            .join(", ");

        match (rule.kind, rule.body.is_empty()) {
            (RuleKind::Weak { weight, level }, _) => format!(":~ {body}. [{weight}@{level}]"),
            (_, true) => format!("{head}."),
            (_, false) => format!("{head} :- {body}."),
        }
    }

    /// Renders the atoms of `interpretation` as `{p(1), q}`, sorted textually.
    pub fn format_interpretation(&self, interpretation: &Interpretation) -> String {
        let atoms = interpretation
            .atoms()
            .filter(|address| address.index() < self.num_ground_atoms())
            .map(|address| self.format_tuple(&self.ground_atom(address).tuple))
            .sorted()
            .join(", ");
        format!("{{{atoms}}}")
    }
}
