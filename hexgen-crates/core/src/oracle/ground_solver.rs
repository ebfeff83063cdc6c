use std::sync::Arc;

use log::trace;

use super::ExternalPropagator;
use super::ModelSearchResult;
use super::NogoodInbox;
use super::PartialAssignment;
use super::PropagatorId;
use super::SolverOracle;
use super::TerminationCondition;
use crate::basic_types::AtomAddress;
use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::basic_types::Nogood;
use crate::checkers::ClauseLiteral;
use crate::checkers::ClauseSearch;
use crate::containers::HashMap;
use crate::containers::HashSet;
use crate::containers::KeyedVec;
use crate::create_statistics_struct;
use crate::options::OracleBackend;
use crate::program::GroundProgram;
use crate::registry::Registry;

create_statistics_struct!(
    /// The search effort of a [`GroundSolver`].
    GroundSolverStatistics {
        num_decisions: u64,
        num_conflicts: u64,
        num_models: u64,
        num_added_nogoods: u64,
        num_propagator_calls: u64,
    }
);

/// A literal over the solver's dense variable indices; `(variable, value)`.
type SolverLiteral = (usize, bool);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Reason {
    Fact,
    Decision { flipped: bool },
    Propagated,
}

#[derive(Clone, Copy, Debug)]
struct TrailEntry {
    variable: usize,
    value: bool,
    reason: Reason,
}

#[derive(Clone, Debug)]
struct SolverRule {
    head: Vec<usize>,
    body: Vec<SolverLiteral>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SearchState {
    Fresh,
    /// The current total assignment was reported (or rejected) and must be left.
    Backtracking,
    Searching,
    Exhausted,
}

/// A reference oracle: chronological backtracking search over the atoms of a ground program.
///
/// Rules and added nogoods are propagated by unit propagation, atoms without a possible
/// supporting rule are set to false, and every total assignment is checked for stability by
/// searching for a smaller model of its reduct. Reported models are blocked by a nogood and the
/// search continues from the reported assignment on the next call.
#[derive(Debug)]
pub struct GroundSolver {
    backend: OracleBackend,
    atoms: Vec<AtomAddress>,
    variable_of: HashMap<AtomAddress, usize>,
    is_fact: Vec<bool>,
    rules: Vec<SolverRule>,
    rules_with_head: Vec<Vec<usize>>,
    nogoods: Vec<Vec<SolverLiteral>>,
    known_nogoods: HashSet<Vec<SolverLiteral>>,
    values: Vec<Option<bool>>,
    trail: Vec<TrailEntry>,
    state: SearchState,
    propagators: KeyedVec<PropagatorId, Option<Box<dyn ExternalPropagator>>>,
    inbox: NogoodInbox,
    last_partial: Interpretation,
    last_assigned: Interpretation,
    statistics: GroundSolverStatistics,
}

impl GroundSolver {
    pub fn new(registry: Arc<Registry>, program: &GroundProgram, backend: OracleBackend) -> GroundSolver {
        let atoms = program.atoms().atoms().collect::<Vec<_>>();
        let variable_of = atoms
            .iter()
            .enumerate()
            .map(|(variable, &address)| (address, variable))
            .collect::<HashMap<_, _>>();
        let is_fact = atoms
            .iter()
            .map(|&address| program.edb.get_fact(address))
            .collect();

        let mut solver = GroundSolver {
            backend,
            rules_with_head: vec![Vec::new(); atoms.len()],
            values: vec![None; atoms.len()],
            atoms,
            variable_of,
            is_fact,
            rules: Vec::new(),
            nogoods: Vec::new(),
            known_nogoods: HashSet::default(),
            trail: Vec::new(),
            state: SearchState::Fresh,
            propagators: KeyedVec::default(),
            inbox: NogoodInbox::default(),
            last_partial: Interpretation::new(),
            last_assigned: Interpretation::new(),
            statistics: GroundSolverStatistics::default(),
        };

        for rule in &program.rules {
            let head = rule
                .head
                .iter()
                .map(|address| solver.variable_of[address])
                .collect::<Vec<_>>();
            let body = rule
                .body
                .iter()
                .map(|literal| (solver.variable_of[&literal.address], literal.value))
                .collect::<Vec<_>>();

            // The body together with all head atoms being false is forbidden.
            let rule_nogood = body
                .iter()
                .copied()
                .chain(head.iter().map(|&variable| (variable, false)))
                .collect();
            let _ = solver.add_internal_nogood(rule_nogood);

            let index = solver.rules.len();
            for &variable in &head {
                solver.rules_with_head[variable].push(index);
            }
            solver.rules.push(SolverRule { head, body });
        }

        trace!(
            "created ground solver over {} atoms with {} rules for {} ground atoms in the registry",
            solver.atoms.len(),
            solver.rules.len(),
            registry.num_ground_atoms()
        );
        solver
    }

    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// Translates a nogood over atom addresses. Atoms unknown to the program are always false, so
    /// a positive literal over one makes the nogood irrelevant and a negative one always holds.
    fn translate(&self, nogood: &Nogood) -> Option<Vec<SolverLiteral>> {
        let mut literals = Vec::with_capacity(nogood.len());
        for literal in nogood.literals() {
            match self.variable_of.get(&literal.address) {
                Some(&variable) => literals.push((variable, literal.value)),
                None if literal.value => return None,
                None => {}
            }
        }
        Some(literals)
    }

    fn add_internal_nogood(&mut self, mut nogood: Vec<SolverLiteral>) -> bool {
        nogood.sort_unstable();
        nogood.dedup();
        if self.known_nogoods.contains(&nogood) {
            return false;
        }
        let _ = self.known_nogoods.insert(nogood.clone());
        self.nogoods.push(nogood);
        true
    }

    fn add_translated(&mut self, nogood: &Nogood) -> bool {
        match self.translate(nogood) {
            Some(literals) => {
                let added = self.add_internal_nogood(literals);
                if added {
                    self.statistics.num_added_nogoods += 1;
                }
                added
            }
            None => false,
        }
    }

    fn assign(&mut self, variable: usize, value: bool, reason: Reason) {
        self.values[variable] = Some(value);
        self.trail.push(TrailEntry {
            variable,
            value,
            reason,
        });
    }

    fn start(&mut self) {
        self.values.iter_mut().for_each(|value| *value = None);
        self.trail.clear();
        for variable in 0..self.atoms.len() {
            if self.is_fact[variable] {
                self.assign(variable, true, Reason::Fact);
            }
        }
    }

    /// Undoes assignments up to the most recent decision whose other branch is unexplored and
    /// takes that branch. Returns `false` if there is none.
    fn backtrack(&mut self) -> bool {
        while let Some(entry) = self.trail.pop() {
            self.values[entry.variable] = None;
            if entry.reason == (Reason::Decision { flipped: false }) {
                self.assign(entry.variable, !entry.value, Reason::Decision { flipped: true });
                return true;
            }
        }
        false
    }

    /// Propagates to fixpoint, including the external propagators. Returns `Ok(false)` on a
    /// conflict.
    fn propagate(&mut self) -> Result<bool, HexError> {
        loop {
            for nogood in self.inbox.drain() {
                let _ = self.add_translated(&nogood);
            }

            loop {
                let Some(nogoods_changed) = self.propagate_nogoods() else {
                    return Ok(false);
                };
                let Some(support_changed) = self.propagate_support() else {
                    return Ok(false);
                };
                if !nogoods_changed && !support_changed {
                    break;
                }
            }

            if !self.call_propagators()? && self.inbox.is_empty() {
                return Ok(true);
            }
        }
    }

    /// Returns `None` on a violated nogood, otherwise whether anything was assigned.
    fn propagate_nogoods(&mut self) -> Option<bool> {
        let mut changed = false;
        loop {
            let mut round_changed = false;
            for index in 0..self.nogoods.len() {
                let mut unassigned = None;
                let mut num_unassigned = 0;
                let mut satisfied = false;
                for &(variable, value) in &self.nogoods[index] {
                    match self.values[variable] {
                        Some(assigned) if assigned != value => {
                            satisfied = true;
                            break;
                        }
                        Some(_) => {}
                        None => {
                            num_unassigned += 1;
                            unassigned = Some((variable, value));
                        }
                    }
                }
                if satisfied {
                    continue;
                }
                match (num_unassigned, unassigned) {
                    (0, _) => return None,
                    (1, Some((variable, value))) => {
                        self.assign(variable, !value, Reason::Propagated);
                        round_changed = true;
                    }
                    _ => {}
                }
            }
            if !round_changed {
                return Some(changed);
            }
            changed = true;
        }
    }

    /// Atoms without a rule which could still support them are false.
    fn propagate_support(&mut self) -> Option<bool> {
        let mut changed = false;
        for variable in 0..self.atoms.len() {
            if self.is_fact[variable] || self.values[variable] == Some(false) {
                continue;
            }
            let supported = self.rules_with_head[variable]
                .iter()
                .any(|&rule| self.can_support(rule, variable));
            if supported {
                continue;
            }
            match self.values[variable] {
                Some(true) => return None,
                _ => {
                    self.assign(variable, false, Reason::Propagated);
                    changed = true;
                }
            }
        }
        Some(changed)
    }

    fn can_support(&self, rule: usize, variable: usize) -> bool {
        let rule = &self.rules[rule];
        let body_possible = rule
            .body
            .iter()
            .all(|&(atom, value)| self.values[atom] != Some(!value));
        if !body_possible {
            return false;
        }
        match self.backend {
            OracleBackend::Minimal => rule
                .head
                .iter()
                .all(|&head| head == variable || self.values[head] != Some(true)),
            OracleBackend::ChoiceDisjunction => true,
        }
    }

    /// Calls every registered propagator with the current assignment. Returns whether a new
    /// nogood was added.
    fn call_propagators(&mut self) -> Result<bool, HexError> {
        if self.propagators.iter().all(Option::is_none) {
            return Ok(false);
        }

        let mut partial = Interpretation::new();
        let mut assigned = Interpretation::new();
        for (variable, value) in self.values.iter().enumerate() {
            if let Some(value) = value {
                assigned.set_fact(self.atoms[variable]);
                partial.set_value(self.atoms[variable], *value);
            }
        }
        let mut changed = partial.difference(&self.last_partial);
        changed.union_with(&self.last_partial.difference(&partial));
        changed.union_with(&assigned.difference(&self.last_assigned));
        changed.union_with(&self.last_assigned.difference(&assigned));

        let mut learned: Vec<Nogood> = Vec::new();
        let ids = self.propagators.keys().collect::<Vec<_>>();
        for id in ids {
            if let Some(propagator) = self.propagators[id].as_mut() {
                self.statistics.num_propagator_calls += 1;
                propagator.propagate(
                    PartialAssignment {
                        partial: &partial,
                        assigned: &assigned,
                        changed: &changed,
                    },
                    &mut learned,
                )?;
            }
        }

        self.last_partial = partial;
        self.last_assigned = assigned;

        let mut added = false;
        for nogood in &learned {
            added |= self.add_translated(nogood);
        }
        Ok(added)
    }

    fn current_model(&self) -> Interpretation {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, value)| **value == Some(true))
            .map(|(variable, _)| self.atoms[variable])
            .collect()
    }

    /// Whether no proper subset of the true atoms is a model of the reduct.
    fn is_stable(&self) -> bool {
        let true_atoms = (0..self.atoms.len())
            .filter(|&variable| self.values[variable] == Some(true))
            .collect::<Vec<_>>();
        let clause_variable = true_atoms
            .iter()
            .enumerate()
            .map(|(index, &variable)| (variable, index))
            .collect::<HashMap<_, _>>();

        let mut search = ClauseSearch::new(true_atoms.len());
        for (index, &variable) in true_atoms.iter().enumerate() {
            if self.is_fact[variable] {
                search.add_clause([ClauseLiteral::positive(index)]);
            }
        }

        for rule in &self.rules {
            let applicable = rule.body.iter().all(|&(atom, value)| {
                if value {
                    self.values[atom] == Some(true)
                } else {
                    self.values[atom] != Some(true)
                }
            });
            if !applicable {
                continue;
            }
            let positive_body = rule
                .body
                .iter()
                .filter(|(_, value)| *value)
                .map(|(atom, _)| ClauseLiteral::negative(clause_variable[atom]))
                .collect::<Vec<_>>();
            let true_heads = rule
                .head
                .iter()
                .filter_map(|head| clause_variable.get(head))
                .map(|&index| ClauseLiteral::positive(index));

            match self.backend {
                OracleBackend::Minimal => {
                    search.add_clause(positive_body.iter().copied().chain(true_heads));
                }
                OracleBackend::ChoiceDisjunction => {
                    for head in true_heads {
                        search.add_clause(positive_body.iter().copied().chain([head]));
                    }
                }
            }
        }

        search.add_clause((0..true_atoms.len()).map(ClauseLiteral::negative));
        search.solve().is_none()
    }

    fn blocking_nogood(&self) -> Vec<SolverLiteral> {
        self.values
            .iter()
            .enumerate()
            .filter(|&(variable, _)| !self.is_fact[variable])
            .filter_map(|(variable, value)| value.map(|value| (variable, value)))
            .collect()
    }
}

impl SolverOracle for GroundSolver {
    fn next_model(
        &mut self,
        termination: &mut dyn TerminationCondition,
    ) -> Result<ModelSearchResult, HexError> {
        let mut consistent = match self.state {
            SearchState::Exhausted => return Ok(ModelSearchResult::Exhausted),
            SearchState::Fresh => {
                self.start();
                self.propagate()?
            }
            SearchState::Backtracking => false,
            SearchState::Searching => self.propagate()?,
        };
        self.state = SearchState::Searching;

        loop {
            if !consistent {
                self.statistics.num_conflicts += 1;
                if !self.backtrack() {
                    self.state = SearchState::Exhausted;
                    return Ok(ModelSearchResult::Exhausted);
                }
                consistent = self.propagate()?;
                continue;
            }

            match self.values.iter().position(Option::is_none) {
                Some(variable) => {
                    if termination.should_stop() {
                        return Ok(ModelSearchResult::Unknown);
                    }
                    termination.decision_has_been_made();
                    self.statistics.num_decisions += 1;
                    self.assign(variable, false, Reason::Decision { flipped: false });
                    consistent = self.propagate()?;
                }
                None => {
                    let blocking = self.blocking_nogood();
                    let _ = self.add_internal_nogood(blocking);
                    if self.is_stable() {
                        self.statistics.num_models += 1;
                        self.state = SearchState::Backtracking;
                        return Ok(ModelSearchResult::Model(self.current_model()));
                    }
                    consistent = false;
                }
            }
        }
    }

    fn add_nogood(&mut self, nogood: Nogood) {
        let _ = self.add_translated(&nogood);
    }

    fn nogood_inbox(&self) -> NogoodInbox {
        self.inbox.clone()
    }

    fn add_propagator(&mut self, propagator: Box<dyn ExternalPropagator>) -> PropagatorId {
        self.propagators.push(Some(propagator))
    }

    fn remove_propagator(&mut self, id: PropagatorId) -> Option<Box<dyn ExternalPropagator>> {
        self.propagators.get_mut(id)?.take()
    }

    fn propagator(&self, id: PropagatorId) -> Option<&dyn ExternalPropagator> {
        self.propagators.get(id)?.as_deref()
    }

    fn propagator_mut(&mut self, id: PropagatorId) -> Option<&mut dyn ExternalPropagator> {
        let propagator: &mut dyn ExternalPropagator = self.propagators.get_mut(id)?.as_mut()?.as_mut();
        Some(propagator)
    }

    fn statistics(&self) -> String {
        format!(
            "decisions={} conflicts={} models={} nogoods={} propagator_calls={}",
            self.statistics.num_decisions,
            self.statistics.num_conflicts,
            self.statistics.num_models,
            self.statistics.num_added_nogoods,
            self.statistics.num_propagator_calls
        )
    }
}
