use crate::containers::HashSet;
use crate::registry::ExternalAtomId;
use crate::registry::Registry;
use crate::registry::RuleId;
use crate::registry::TermId;

/// One evaluation unit: the rules solved together and the external atoms they contain.
///
/// Inner external atoms take input from predicates defined inside the unit and must be guessed;
/// outer ones only depend on the unit's input and are evaluated once up front.
#[derive(Clone, Debug, Default)]
pub struct ComponentInfo {
    pub rules: Vec<RuleId>,
    pub inner_external_atoms: Vec<ExternalAtomId>,
    pub outer_external_atoms: Vec<ExternalAtomId>,
    pub has_disjunctive_rules: bool,
}

impl ComponentInfo {
    /// Classifies the external atoms of `rules`. An atom is outer iff its input tuple is ground
    /// and none of its input terms is a predicate defined by a rule head of the unit.
    pub fn from_rules(registry: &Registry, rules: Vec<RuleId>) -> ComponentInfo {
        let mut defined: HashSet<TermId> = HashSet::default();
        let mut has_disjunctive_rules = false;
        for &id in &rules {
            let rule = registry.rule(id);
            has_disjunctive_rules |= rule.is_disjunctive();
            for &head in &rule.head {
                if let Some(atom) = registry.ordinary_atom(head) {
                    let _ = defined.insert(atom.predicate());
                }
            }
        }

        let mut inner_external_atoms = Vec::new();
        let mut outer_external_atoms = Vec::new();
        for &id in &rules {
            for (atom, _) in registry.rule(id).external_atoms() {
                if inner_external_atoms.contains(&atom) || outer_external_atoms.contains(&atom) {
                    continue;
                }
                let external = registry.external_atom(atom);
                let is_outer = external
                    .inputs
                    .iter()
                    .all(|&term| !registry.is_variable(term) && !defined.contains(&term));
                if is_outer {
                    outer_external_atoms.push(atom);
                } else {
                    inner_external_atoms.push(atom);
                }
            }
        }

        ComponentInfo {
            rules,
            inner_external_atoms,
            outer_external_atoms,
            has_disjunctive_rules,
        }
    }

    pub fn external_atoms(&self) -> impl Iterator<Item = ExternalAtomId> + '_ {
        self.inner_external_atoms
            .iter()
            .chain(&self.outer_external_atoms)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BodyLiteral;
    use crate::registry::Rule;

    #[test]
    fn atoms_reading_unit_predicates_are_inner() {
        let registry = Registry::default();
        let p = registry.constant("p");
        let a = registry.constant("a");
        let id = registry.constant("id");

        // p(a) :- &id[p](a).
        let inner = registry.store_external_atom(id, vec![p], vec![a]);
        let rule_p = registry.store_rule(Rule::regular(
            vec![registry.store_ordinary_atom(vec![p, a])],
            vec![BodyLiteral::positive(inner)],
        ));
        // r :- &id[s](a).
        let r = registry.constant("r");
        let s = registry.constant("s");
        let outer = registry.store_external_atom(id, vec![s], vec![a]);
        let rule_r = registry.store_rule(Rule::regular(
            vec![registry.store_ordinary_atom(vec![r])],
            vec![BodyLiteral::positive(outer)],
        ));
        let component = ComponentInfo::from_rules(&registry, vec![rule_p, rule_r]);

        assert_eq!(component.inner_external_atoms, vec![inner.as_external().unwrap()]);
        assert_eq!(component.outer_external_atoms, vec![outer.as_external().unwrap()]);
        assert!(!component.has_disjunctive_rules);
    }
}
