/// A literal over the variables `0..num_variables` of a [`ClauseSearch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClauseLiteral {
    pub variable: usize,
    pub positive: bool,
}

impl ClauseLiteral {
    pub fn positive(variable: usize) -> ClauseLiteral {
        ClauseLiteral {
            variable,
            positive: true,
        }
    }

    pub fn negative(variable: usize) -> ClauseLiteral {
        ClauseLiteral {
            variable,
            positive: false,
        }
    }
}

/// A small complete search for satisfying assignments of a set of clauses.
///
/// Used for the auxiliary problems of the stability and unfounded set checks, which range over
/// the atoms of one candidate model only.
#[derive(Clone, Debug, Default)]
pub struct ClauseSearch {
    num_variables: usize,
    clauses: Vec<Vec<ClauseLiteral>>,
}

impl ClauseSearch {
    pub fn new(num_variables: usize) -> ClauseSearch {
        ClauseSearch {
            num_variables,
            clauses: Vec::new(),
        }
    }

    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    pub fn new_variable(&mut self) -> usize {
        self.num_variables += 1;
        self.num_variables - 1
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn add_clause(&mut self, clause: impl IntoIterator<Item = ClauseLiteral>) {
        let mut clause = clause.into_iter().collect::<Vec<_>>();
        clause.sort_by_key(|literal| (literal.variable, literal.positive));
        clause.dedup();
        let is_tautology = clause
            .windows(2)
            .any(|pair| pair[0].variable == pair[1].variable);
        if !is_tautology {
            self.clauses.push(clause);
        }
    }

    /// Returns a satisfying assignment, or `None` if the clauses are unsatisfiable.
    pub fn solve(&self) -> Option<Vec<bool>> {
        let mut assignment = vec![None; self.num_variables];
        if self.search(&mut assignment) {
            Some(
                assignment
                    .into_iter()
                    .map(|value| value.unwrap_or(false))
                    .collect(),
            )
        } else {
            None
        }
    }

    fn search(&self, assignment: &mut [Option<bool>]) -> bool {
        let mut trail = Vec::new();
        if !self.propagate(assignment, &mut trail) {
            Self::undo(assignment, &trail);
            return false;
        }

        let Some(variable) = assignment.iter().position(Option::is_none) else {
            return true;
        };

        for value in [false, true] {
            assignment[variable] = Some(value);
            if self.search(assignment) {
                return true;
            }
            assignment[variable] = None;
        }

        Self::undo(assignment, &trail);
        false
    }

    /// Unit propagation to fixpoint; returns `false` on a falsified clause.
    fn propagate(&self, assignment: &mut [Option<bool>], trail: &mut Vec<usize>) -> bool {
        loop {
            let mut changed = false;
            for clause in &self.clauses {
                let mut unassigned = None;
                let mut num_unassigned = 0;
                let mut satisfied = false;
                for literal in clause {
                    match assignment[literal.variable] {
                        Some(value) if value == literal.positive => {
                            satisfied = true;
                            break;
                        }
                        Some(_) => {}
                        None => {
                            num_unassigned += 1;
                            unassigned = Some(*literal);
                        }
                    }
                }
                if satisfied {
                    continue;
                }
                match (num_unassigned, unassigned) {
                    (0, _) => return false,
                    (1, Some(literal)) => {
                        assignment[literal.variable] = Some(literal.positive);
                        trail.push(literal.variable);
                        changed = true;
                    }
                    _ => {}
                }
            }
            if !changed {
                return true;
            }
        }
    }

    fn undo(assignment: &mut [Option<bool>], trail: &[usize]) {
        for &variable in trail {
            assignment[variable] = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_models_of_satisfiable_clauses() {
        let mut search = ClauseSearch::new(3);
        // (x0 v x1) & (-x0 v x2) & -x1
        search.add_clause([ClauseLiteral::positive(0), ClauseLiteral::positive(1)]);
        search.add_clause([ClauseLiteral::negative(0), ClauseLiteral::positive(2)]);
        search.add_clause([ClauseLiteral::negative(1)]);

        let model = search.solve().expect("satisfiable");

        assert_eq!(model, vec![true, false, true]);
    }

    #[test]
    fn detects_unsatisfiability() {
        let mut search = ClauseSearch::new(2);
        for (a, b) in [(true, true), (true, false), (false, true), (false, false)] {
            search.add_clause([
                ClauseLiteral { variable: 0, positive: a },
                ClauseLiteral { variable: 1, positive: b },
            ]);
        }

        assert!(search.solve().is_none());
    }

    #[test]
    fn tautologies_are_ignored() {
        let mut search = ClauseSearch::new(1);
        search.add_clause([ClauseLiteral::positive(0), ClauseLiteral::negative(0)]);

        assert_eq!(search.num_clauses(), 0);
        assert!(search.solve().is_some());
    }
}
