use log::debug;
use log::warn;

use super::ComponentInfo;
use crate::basic_types::HexError;
use crate::registry::collect_variables;
use crate::registry::AtomId;
use crate::registry::AuxiliaryKind;
use crate::registry::BodyLiteral;
use crate::registry::ExternalAtomId;
use crate::registry::Registry;
use crate::registry::Rule;
use crate::registry::RuleId;
use crate::registry::RuleKind;
use crate::registry::TermId;

/// The rule sets derived from one evaluation unit.
#[derive(Clone, Debug, Default)]
pub struct RewrittenProgram {
    /// The rules of the unit as given.
    pub idb: Vec<RuleId>,
    /// `idb` with every external atom replaced by its positive replacement atom.
    pub xidb: Vec<RuleId>,
    /// One guessing rule `r⁺(V) v r⁻(V) :- B` per inner external atom occurrence.
    pub gidb: Vec<RuleId>,
    /// `xidb ∪ gidb`, the program handed to the oracle.
    pub xgidb: Vec<RuleId>,
    /// `flp(V) :- B` for every rule with a body.
    pub flp_head: Vec<RuleId>,
    /// `H :- flp(V), B` for every rule with a body, plus the facts of `xidb`.
    pub flp_body: Vec<RuleId>,
    pub flp_predicates: Vec<TermId>,
    /// Replacement predicates of the inner external atoms.
    pub positive_replacements: Vec<TermId>,
    pub negative_replacements: Vec<TermId>,
    /// Inner external atoms whose guessing rules received a domain atom, with its predicate.
    pub domain_predicates: Vec<(ExternalAtomId, TermId)>,
}

/// Turns the rules of a unit into a guessing program and the FLP reduct programs.
#[derive(Clone, Copy, Debug)]
pub struct ProgramRewriter<'a> {
    registry: &'a Registry,
    auto_strong_safety: bool,
    flp_rewriting: bool,
}

impl<'a> ProgramRewriter<'a> {
    pub fn new(registry: &'a Registry) -> ProgramRewriter<'a> {
        ProgramRewriter {
            registry,
            auto_strong_safety: false,
            flp_rewriting: true,
        }
    }

    pub fn with_auto_strong_safety(mut self, enabled: bool) -> Self {
        self.auto_strong_safety = enabled;
        self
    }

    pub fn with_flp_rewriting(mut self, enabled: bool) -> Self {
        self.flp_rewriting = enabled;
        self
    }

    pub fn rewrite(&self, component: &ComponentInfo) -> Result<RewrittenProgram, HexError> {
        let mut program = RewrittenProgram {
            idb: component.rules.clone(),
            ..Default::default()
        };

        for &atom in &component.inner_external_atoms {
            let external = self.registry.external_atom(atom);
            if !program
                .positive_replacements
                .contains(&external.replacement_positive)
            {
                program.positive_replacements.push(external.replacement_positive);
                program.negative_replacements.push(external.replacement_negative);
            }
        }

        for &id in &component.rules {
            let rule = self.registry.rule(id);
            if matches!(rule.kind, RuleKind::Weak { .. }) {
                return Err(self.unsupported(&rule, "weak constraints cannot be rewritten"));
            }

            for (atom, _) in rule.external_atoms() {
                if component.inner_external_atoms.contains(&atom) {
                    let guessing_rule = self.guessing_rule(&rule, atom, &mut program);
                    program.gidb.push(self.registry.store_rule(guessing_rule));
                }
            }

            program.xidb.push(self.registry.store_rule(self.replace_external_atoms(&rule)));
        }

        program.xgidb = program.xidb.iter().chain(&program.gidb).copied().collect();

        if self.flp_rewriting {
            self.flp_rewrite(&mut program)?;
        }

        debug!(
            "rewrote {} rules into {} guessing rules and {} FLP rules",
            program.idb.len(),
            program.gidb.len(),
            program.flp_head.len()
        );

        Ok(program)
    }

    /// Builds `r⁺(V) v r⁻(V) :- B` where `B` holds the positive nonground ordinary body atoms of
    /// `rule` sharing a variable with the external atom. Builtins are not harvested.
    fn guessing_rule(&self, rule: &Rule, atom: ExternalAtomId, program: &mut RewrittenProgram) -> Rule {
        let external = self.registry.external_atom(atom);
        let mut variables = Vec::new();
        collect_variables(self.registry, &external.inputs, &mut variables);
        collect_variables(self.registry, &external.outputs, &mut variables);

        let head = vec![
            self.registry
                .store_ordinary_atom(external.replacement_tuple(external.replacement_positive)),
            self.registry
                .store_ordinary_atom(external.replacement_tuple(external.replacement_negative)),
        ];

        let mut body = Vec::new();
        let mut bound = Vec::new();
        for literal in &rule.body {
            match literal.atom {
                AtomId::Nonground(id) if !literal.naf => {
                    let tuple = self.registry.nonground_atom(id).tuple;
                    if tuple.iter().any(|term| variables.contains(term)) {
                        body.push(*literal);
                        collect_variables(self.registry, &tuple, &mut bound);
                    }
                }
                AtomId::Builtin(id) => {
                    let builtin = self.registry.builtin_atom(id);
                    if variables.contains(&builtin.left) || variables.contains(&builtin.right) {
                        warn!(
                            "guessing rule for {} ignores builtin {}",
                            self.registry.format_atom(AtomId::External(atom)),
                            self.registry.format_atom(literal.atom)
                        );
                    }
                }
                _ => {}
            }
        }

        let unbound = variables.iter().any(|variable| !bound.contains(variable));
        if unbound && self.auto_strong_safety {
            let domain = self
                .registry
                .auxiliary_predicate(AuxiliaryKind::Domain, external.predicate);
            body.push(BodyLiteral::positive(
                self.registry.store_ordinary_atom(external.replacement_tuple(domain)),
            ));
            if !program.domain_predicates.contains(&(atom, domain)) {
                program.domain_predicates.push((atom, domain));
            }
        }

        Rule::regular(head, body)
    }

    fn replace_external_atoms(&self, rule: &Rule) -> Rule {
        let body = rule
            .body
            .iter()
            .map(|literal| match literal.atom {
                AtomId::External(id) => {
                    let external = self.registry.external_atom(id);
                    BodyLiteral {
                        atom: self.registry.store_ordinary_atom(
                            external.replacement_tuple(external.replacement_positive),
                        ),
                        naf: literal.naf,
                    }
                }
                _ => *literal,
            })
            .collect();

        Rule {
            kind: rule.kind,
            head: rule.head.clone(),
            body,
        }
    }

    fn flp_rewrite(&self, program: &mut RewrittenProgram) -> Result<(), HexError> {
        for &id in &program.xidb {
            let rule = self.registry.rule(id);
            // The candidate is given to the head program as facts, so facts only matter in the
            // reduct. Disjunctive facts would make the head program ambiguous.
            if rule.body.is_empty() {
                program.flp_body.push(id);
                continue;
            }
            if matches!(rule.kind, RuleKind::Weak { .. }) {
                return Err(self.unsupported(&rule, "weak constraints have no FLP reduct"));
            }

            let mut variables = Vec::new();
            for literal in &rule.body {
                match literal.atom {
                    AtomId::Ground(_) => {}
                    AtomId::Nonground(atom) => {
                        let tuple = self.registry.nonground_atom(atom).tuple;
                        collect_variables(self.registry, &tuple, &mut variables);
                    }
                    AtomId::Builtin(atom) => {
                        let builtin = self.registry.builtin_atom(atom);
                        collect_variables(self.registry, &[builtin.left, builtin.right], &mut variables);
                    }
                    AtomId::External(_) => {
                        return Err(self.unsupported(&rule, "external atom left in the FLP input"));
                    }
                }
            }

            let predicate = self.registry.fresh_constant(&format!("flp_{}", id.0));
            program.flp_predicates.push(predicate);
            let mut tuple = vec![predicate];
            tuple.extend(variables);
            let flp_atom = self.registry.store_ordinary_atom(tuple);

            program
                .flp_head
                .push(self.registry.store_rule(Rule::regular(vec![flp_atom], rule.body.clone())));

            let mut body = Vec::with_capacity(rule.body.len() + 1);
            body.push(BodyLiteral::positive(flp_atom));
            body.extend_from_slice(&rule.body);
            let body_rule = if rule.head.is_empty() {
                Rule::constraint(body)
            } else {
                Rule::regular(rule.head.clone(), body)
            };
            program.flp_body.push(self.registry.store_rule(body_rule));
        }
        Ok(())
    }

    fn unsupported(&self, rule: &Rule, reason: &str) -> HexError {
        HexError::UnsupportedRule {
            rule: self.registry.format_rule(rule),
            reason: reason.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn even_unit(registry: &Registry) -> ComponentInfo {
        let dom = registry.constant("dom");
        let p = registry.constant("p");
        let even = registry.constant("even");
        let x = registry.variable("X");

        // p(X) :- dom(X), not &even[X]().
        let external = registry.store_external_atom(even, vec![x], vec![]);
        let rule = registry.store_rule(Rule::regular(
            vec![registry.store_ordinary_atom(vec![p, x])],
            vec![
                BodyLiteral::positive(registry.store_ordinary_atom(vec![dom, x])),
                BodyLiteral::negative(external),
            ],
        ));
        ComponentInfo::from_rules(registry, vec![rule])
    }

    #[test]
    fn guessing_rule_is_grounded_by_shared_body_atoms() {
        let registry = Registry::default();
        let component = even_unit(&registry);

        let program = ProgramRewriter::new(&registry)
            .rewrite(&component)
            .expect("rewritable");

        assert_eq!(program.gidb.len(), 1);
        assert_eq!(
            registry.format_rule(&registry.rule(program.gidb[0])),
            "aux_r_even(X) v aux_n_even(X) :- dom(X)."
        );
        assert_eq!(
            registry.format_rule(&registry.rule(program.xidb[0])),
            "p(X) :- dom(X), not aux_r_even(X)."
        );
        assert_eq!(program.xgidb.len(), 2);
    }

    #[test]
    fn flp_rules_carry_body_variables() {
        let registry = Registry::default();
        let component = even_unit(&registry);

        let program = ProgramRewriter::new(&registry)
            .rewrite(&component)
            .expect("rewritable");

        assert_eq!(program.flp_predicates.len(), 1);
        let flp = registry.term(program.flp_predicates[0]).to_string();
        assert_eq!(
            registry.format_rule(&registry.rule(program.flp_head[0])),
            format!("{flp}(X) :- dom(X), not aux_r_even(X).")
        );
        assert_eq!(
            registry.format_rule(&registry.rule(program.flp_body[0])),
            format!("p(X) :- {flp}(X), dom(X), not aux_r_even(X).")
        );
    }

    #[test]
    fn facts_only_enter_the_flp_body_program() {
        let registry = Registry::default();
        let a = registry.store_ordinary_atom(vec![registry.constant("a")]);
        let b = registry.store_ordinary_atom(vec![registry.constant("b")]);
        // a v b.
        let fact = registry.store_rule(Rule::regular(vec![a, b], vec![]));
        let component = ComponentInfo::from_rules(&registry, vec![fact]);

        let program = ProgramRewriter::new(&registry)
            .rewrite(&component)
            .expect("rewritable");

        assert!(program.flp_head.is_empty());
        assert_eq!(program.flp_body, program.xidb);
        assert!(program.flp_predicates.is_empty());
    }

    #[test]
    fn weak_constraints_are_rejected() {
        let registry = Registry::default();
        let a = registry.constant("a");
        let rule = registry.store_rule(Rule {
            kind: RuleKind::Weak { weight: 1, level: 0 },
            head: vec![],
            body: vec![BodyLiteral::positive(registry.store_ordinary_atom(vec![a]))],
        });
        let component = ComponentInfo::from_rules(&registry, vec![rule]);

        let result = ProgramRewriter::new(&registry).rewrite(&component);

        assert!(matches!(result, Err(HexError::UnsupportedRule { .. })));
    }

    #[test]
    fn strong_safety_adds_a_domain_atom() {
        let registry = Registry::default();
        let q = registry.constant("q");
        let p = registry.constant("p");
        let succ = registry.constant("succ");
        let x = registry.variable("X");
        let y = registry.variable("Y");

        // q(Y) :- p(X), &succ[X](Y).
        let external = registry.store_external_atom(succ, vec![x], vec![y]);
        let rule = registry.store_rule(Rule::regular(
            vec![registry.store_ordinary_atom(vec![q, y])],
            vec![
                BodyLiteral::positive(registry.store_ordinary_atom(vec![p, x])),
                BodyLiteral::positive(external),
            ],
        ));
        let component = ComponentInfo::from_rules(&registry, vec![rule]);

        let program = ProgramRewriter::new(&registry)
            .with_auto_strong_safety(true)
            .rewrite(&component)
            .expect("rewritable");

        assert_eq!(program.domain_predicates.len(), 1);
        assert_eq!(
            registry.format_rule(&registry.rule(program.gidb[0])),
            "aux_r_succ(X,Y) v aux_n_succ(X,Y) :- p(X), aux_d_succ(X,Y)."
        );
    }
}
