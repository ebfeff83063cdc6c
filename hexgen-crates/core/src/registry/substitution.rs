use super::Registry;
use super::TermId;

/// A mapping from variables to ground terms.
///
/// Bindings are kept in insertion order, which keeps grounding deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Substitution {
    bindings: Vec<(TermId, TermId)>,
}

impl Substitution {
    pub fn get(&self, variable: TermId) -> Option<TermId> {
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == variable)
            .map(|(_, value)| *value)
    }

    /// Binds `variable` to `value`; returns `false` if it is bound to a different value already.
    pub fn bind(&mut self, variable: TermId, value: TermId) -> bool {
        match self.get(variable) {
            Some(existing) => existing == value,
            None => {
                self.bindings.push((variable, value));
                true
            }
        }
    }

    pub fn is_bound(&self, variable: TermId) -> bool {
        self.get(variable).is_some()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn apply_term(&self, registry: &Registry, term: TermId) -> TermId {
        if registry.is_variable(term) {
            self.get(term).unwrap_or(term)
        } else {
            term
        }
    }

    pub fn apply(&self, registry: &Registry, tuple: &[TermId]) -> Vec<TermId> {
        tuple
            .iter()
            .map(|&term| self.apply_term(registry, term))
            .collect()
    }

    /// Extends this substitution such that `pattern` becomes `ground`, if possible.
    pub fn matched(
        &self,
        registry: &Registry,
        pattern: &[TermId],
        ground: &[TermId],
    ) -> Option<Substitution> {
        if pattern.len() != ground.len() {
            return None;
        }

        let mut extended = self.clone();
        for (&pattern_term, &ground_term) in pattern.iter().zip(ground) {
            if registry.is_variable(pattern_term) {
                if !extended.bind(pattern_term, ground_term) {
                    return None;
                }
            } else if pattern_term != ground_term {
                return None;
            }
        }
        Some(extended)
    }
}

/// Appends the variables of `tuple` to `variables`, skipping those already present.
pub fn collect_variables(registry: &Registry, tuple: &[TermId], variables: &mut Vec<TermId>) {
    for &term in tuple {
        if registry.is_variable(term) && !variables.contains(&term) {
            variables.push(term);
        }
    }
}
