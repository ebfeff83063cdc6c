use crate::basic_types::AtomAddress;
use crate::basic_types::Interpretation;
use crate::basic_types::Literal;
use crate::registry::Registry;

/// A variable-free rule; body literals with value `false` are default-negated.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroundRule {
    pub head: Vec<AtomAddress>,
    pub body: Vec<Literal>,
}

impl GroundRule {
    pub fn is_constraint(&self) -> bool {
        self.head.is_empty()
    }

    pub fn is_disjunctive(&self) -> bool {
        self.head.len() > 1
    }

    /// Whether every body literal holds in the total `interpretation`.
    pub fn body_holds_in(&self, interpretation: &Interpretation) -> bool {
        self.body
            .iter()
            .all(|literal| literal.holds_in(interpretation))
    }

    pub fn atoms(&self) -> impl Iterator<Item = AtomAddress> + '_ {
        self.head
            .iter()
            .copied()
            .chain(self.body.iter().map(|literal| literal.address))
    }
}

/// Facts plus ground rules.
#[derive(Clone, Debug, Default)]
pub struct GroundProgram {
    pub edb: Interpretation,
    pub rules: Vec<GroundRule>,
}

impl GroundProgram {
    /// All atoms occurring in the facts or rules.
    pub fn atoms(&self) -> Interpretation {
        let mut atoms = self.edb.clone();
        for rule in &self.rules {
            for atom in rule.atoms() {
                atoms.set_fact(atom);
            }
        }
        atoms
    }

    pub fn format(&self, registry: &Registry) -> String {
        let mut lines = self
            .edb
            .atoms()
            .map(|atom| format!("{}.", registry.format_tuple(&registry.ground_atom(atom).tuple)))
            .collect::<Vec<_>>();
        for rule in &self.rules {
            let head = rule
                .head
                .iter()
                .map(|&atom| registry.format_tuple(&registry.ground_atom(atom).tuple))
                .collect::<Vec<_>>()
                .join(" v ");
            let body = rule
                .body
                .iter()
                .map(|literal| {
                    let atom = registry.format_tuple(&registry.ground_atom(literal.address).tuple);
                    if literal.value {
                        atom
                    } else {
                        format!("not {atom}")
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            if body.is_empty() {
                lines.push(format!("{head}."));
            } else {
                lines.push(format!("{head} :- {body}."));
            }
        }
        lines.join("\n")
    }
}
