use std::cmp::Ordering;

use log::trace;

use super::GroundProgram;
use super::GroundRule;
use crate::basic_types::AtomAddress;
use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::basic_types::Literal;
use crate::containers::HashMap;
use crate::containers::HashSet;
use crate::registry::collect_variables;
use crate::registry::AtomId;
use crate::registry::BodyLiteral;
use crate::registry::BuiltinAtom;
use crate::registry::BuiltinOperator;
use crate::registry::Registry;
use crate::registry::Rule;
use crate::registry::RuleId;
use crate::registry::RuleKind;
use crate::registry::Substitution;
use crate::registry::Term;
use crate::registry::TermId;

/// The ground atoms which may become true, indexed by predicate.
#[derive(Debug, Default)]
struct PredicateIndex {
    atoms: HashMap<TermId, Vec<(AtomAddress, Vec<TermId>)>>,
}

impl PredicateIndex {
    fn new(registry: &Registry, possible: &Interpretation) -> PredicateIndex {
        let mut index = PredicateIndex::default();
        for address in possible.atoms() {
            let atom = registry.ground_atom(address);
            index
                .atoms
                .entry(atom.predicate())
                .or_default()
                .push((address, atom.tuple));
        }
        index
    }
}

/// Instantiates rules bottom-up over the atoms which may become true.
///
/// Positive ordinary body atoms are matched against the set of possibly true atoms, builtins
/// filter or bind, and default-negated literals never prevent an instance. Negated atoms which
/// can never become true are removed from the instances.
#[derive(Clone, Copy, Debug)]
pub struct Grounder<'a> {
    registry: &'a Registry,
}

impl<'a> Grounder<'a> {
    pub fn new(registry: &'a Registry) -> Grounder<'a> {
        Grounder { registry }
    }

    pub fn ground(&self, rules: &[RuleId], edb: &Interpretation) -> Result<GroundProgram, HexError> {
        let rules = rules
            .iter()
            .map(|&id| self.registry.rule(id))
            .collect::<Vec<_>>();
        for rule in &rules {
            self.check_rule(rule)?;
        }

        let mut possible = edb.clone();
        let mut ground_rules: Vec<GroundRule> = Vec::new();
        let mut known: HashSet<GroundRule> = HashSet::default();

        loop {
            let index = PredicateIndex::new(self.registry, &possible);
            let mut changed = false;

            for rule in rules.iter().filter(|rule| !rule.head.is_empty()) {
                for substitution in self.enumerate(&rule.body, &index, &possible) {
                    let instance = self.instantiate(rule, &substitution)?;
                    for &head in &instance.head {
                        if !possible.get_fact(head) {
                            possible.set_fact(head);
                            changed = true;
                        }
                    }
                    if known.insert(instance.clone()) {
                        ground_rules.push(instance);
                    }
                }
            }

            if !changed {
                for rule in rules.iter().filter(|rule| rule.head.is_empty()) {
                    for substitution in self.enumerate(&rule.body, &index, &possible) {
                        let instance = self.instantiate(rule, &substitution)?;
                        if known.insert(instance.clone()) {
                            ground_rules.push(instance);
                        }
                    }
                }
                break;
            }
        }

        for rule in &mut ground_rules {
            rule.body
                .retain(|literal| literal.value || possible.get_fact(literal.address));
        }

        trace!("grounded {} rules into {} instances", rules.len(), ground_rules.len());

        Ok(GroundProgram {
            edb: edb.clone(),
            rules: ground_rules,
        })
    }

    /// All substitutions which make the positive ordinary and builtin literals of `body` true
    /// over `possible`. Default-negated literals are ignored.
    pub fn substitutions(&self, body: &[BodyLiteral], possible: &Interpretation) -> Vec<Substitution> {
        let index = PredicateIndex::new(self.registry, possible);
        self.enumerate(body, &index, possible)
    }

    fn enumerate(
        &self,
        body: &[BodyLiteral],
        index: &PredicateIndex,
        possible: &Interpretation,
    ) -> Vec<Substitution> {
        let positive = body
            .iter()
            .filter(|literal| !literal.naf && literal.atom.is_ordinary())
            .map(|literal| literal.atom)
            .collect::<Vec<_>>();
        let builtins = body
            .iter()
            .filter(|literal| !literal.naf)
            .filter_map(|literal| match literal.atom {
                AtomId::Builtin(id) => Some(self.registry.builtin_atom(id)),
                _ => None,
            })
            .collect::<Vec<_>>();

        let mut result = Vec::new();
        self.match_positive(&positive, &builtins, index, possible, Substitution::default(), &mut result);
        result
    }

    fn match_positive(
        &self,
        positive: &[AtomId],
        builtins: &[BuiltinAtom],
        index: &PredicateIndex,
        possible: &Interpretation,
        substitution: Substitution,
        result: &mut Vec<Substitution>,
    ) {
        let Some((&first, rest)) = positive.split_first() else {
            if let Some(complete) = self.apply_builtins(builtins, substitution) {
                result.push(complete);
            }
            return;
        };

        match first {
            AtomId::Ground(address) => {
                if possible.get_fact(address) {
                    self.match_positive(rest, builtins, index, possible, substitution, result);
                }
            }
            AtomId::Nonground(id) => {
                let pattern = self.registry.nonground_atom(id).tuple;
                let Some(candidates) = index.atoms.get(&pattern[0]) else {
                    return;
                };
                for (_, tuple) in candidates {
                    if let Some(extended) = substitution.matched(self.registry, &pattern, tuple) {
                        self.match_positive(rest, builtins, index, possible, extended, result);
                    }
                }
            }
            AtomId::Builtin(_) | AtomId::External(_) => {
                self.match_positive(rest, builtins, index, possible, substitution, result);
            }
        }
    }

    /// Evaluates the builtins under `substitution`, binding variables through `=` where one side
    /// is still unbound.
    fn apply_builtins(&self, builtins: &[BuiltinAtom], mut substitution: Substitution) -> Option<Substitution> {
        let mut pending = builtins.to_vec();
        while !pending.is_empty() {
            let mut progress = false;
            let mut remaining = Vec::new();
            for builtin in pending {
                let left = substitution.apply_term(self.registry, builtin.left);
                let right = substitution.apply_term(self.registry, builtin.right);
                let left_bound = !self.registry.is_variable(left);
                let right_bound = !self.registry.is_variable(right);

                match (left_bound, right_bound) {
                    (true, true) => {
                        if !builtin.operator.holds(self.compare_terms(left, right)) {
                            return None;
                        }
                        progress = true;
                    }
                    (false, true) if builtin.operator == BuiltinOperator::Equal => {
                        let _ = substitution.bind(left, right);
                        progress = true;
                    }
                    (true, false) if builtin.operator == BuiltinOperator::Equal => {
                        let _ = substitution.bind(right, left);
                        progress = true;
                    }
                    _ => remaining.push(builtin),
                }
            }
            if !progress {
                return None;
            }
            pending = remaining;
        }
        Some(substitution)
    }

    /// Integers are ordered numerically and before all constants, which are ordered by name.
    fn compare_terms(&self, left: TermId, right: TermId) -> Ordering {
        match (self.registry.term(left), self.registry.term(right)) {
            (Term::Integer(a), Term::Integer(b)) => a.cmp(&b),
            (Term::Integer(_), _) => Ordering::Less,
            (_, Term::Integer(_)) => Ordering::Greater,
            (a, b) => a.cmp(&b),
        }
    }

    fn instantiate(&self, rule: &Rule, substitution: &Substitution) -> Result<GroundRule, HexError> {
        let mut head = Vec::with_capacity(rule.head.len());
        for &atom in &rule.head {
            head.push(self.ground_atom(rule, atom, substitution)?);
        }

        let mut body = Vec::with_capacity(rule.body.len());
        for literal in &rule.body {
            if !literal.atom.is_ordinary() {
                continue;
            }
            let address = self.ground_atom(rule, literal.atom, substitution)?;
            body.push(Literal {
                address,
                value: !literal.naf,
            });
        }

        Ok(GroundRule { head, body })
    }

    fn ground_atom(&self, rule: &Rule, atom: AtomId, substitution: &Substitution) -> Result<AtomAddress, HexError> {
        match atom {
            AtomId::Ground(address) => Ok(address),
            AtomId::Nonground(id) => {
                let tuple = substitution.apply(self.registry, &self.registry.nonground_atom(id).tuple);
                if let Some(&variable) = tuple.iter().find(|&&term| self.registry.is_variable(term)) {
                    return Err(self.unsafe_rule(rule, variable));
                }
                Ok(self.registry.store_ground_atom(tuple))
            }
            AtomId::Builtin(_) | AtomId::External(_) => Err(HexError::UnsupportedRule {
                rule: self.registry.format_rule(rule),
                reason: "only ordinary atoms can be instantiated".to_owned(),
            }),
        }
    }

    /// Rejects rules which cannot be instantiated: weak constraints, external atoms and unsafe
    /// variables.
    fn check_rule(&self, rule: &Rule) -> Result<(), HexError> {
        if matches!(rule.kind, RuleKind::Weak { .. }) {
            return Err(HexError::UnsupportedRule {
                rule: self.registry.format_rule(rule),
                reason: "weak constraints are not supported".to_owned(),
            });
        }
        if rule.external_atoms().next().is_some() {
            return Err(HexError::UnsupportedRule {
                rule: self.registry.format_rule(rule),
                reason: "external atoms must be replaced before grounding".to_owned(),
            });
        }

        let mut bound = Vec::new();
        for literal in rule.body.iter().filter(|literal| !literal.naf) {
            if let Some(atom) = self.registry.ordinary_atom(literal.atom) {
                collect_variables(self.registry, &atom.tuple, &mut bound);
            }
        }

        let builtins = rule
            .body
            .iter()
            .filter_map(|literal| match literal.atom {
                AtomId::Builtin(id) => Some(self.registry.builtin_atom(id)),
                _ => None,
            })
            .collect::<Vec<_>>();
        let is_bound = |term: TermId, bound: &[TermId]| !self.registry.is_variable(term) || bound.contains(&term);
        loop {
            let mut progress = false;
            for builtin in builtins.iter().filter(|builtin| builtin.operator == BuiltinOperator::Equal) {
                let left = is_bound(builtin.left, &bound);
                let right = is_bound(builtin.right, &bound);
                if left && !right {
                    bound.push(builtin.right);
                    progress = true;
                } else if right && !left {
                    bound.push(builtin.left);
                    progress = true;
                }
            }
            if !progress {
                break;
            }
        }

        let mut required = Vec::new();
        for &atom in &rule.head {
            if let Some(atom) = self.registry.ordinary_atom(atom) {
                collect_variables(self.registry, &atom.tuple, &mut required);
            }
        }
        for literal in &rule.body {
            match literal.atom {
                AtomId::Builtin(id) => {
                    let builtin = self.registry.builtin_atom(id);
                    collect_variables(self.registry, &[builtin.left, builtin.right], &mut required);
                }
                atom if literal.naf => {
                    if let Some(atom) = self.registry.ordinary_atom(atom) {
                        collect_variables(self.registry, &atom.tuple, &mut required);
                    }
                }
                _ => {}
            }
        }

        match required.into_iter().find(|&variable| !bound.contains(&variable)) {
            Some(variable) => Err(self.unsafe_rule(rule, variable)),
            None => Ok(()),
        }
    }

    fn unsafe_rule(&self, rule: &Rule, variable: TermId) -> HexError {
        HexError::UnsafeRule {
            rule: self.registry.format_rule(rule),
            variable: self.registry.term(variable).to_string(),
        }
    }
}
