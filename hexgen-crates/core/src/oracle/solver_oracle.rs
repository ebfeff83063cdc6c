use std::fmt::Debug;
use std::sync::Arc;

use super::ExternalPropagator;
use super::GroundSolver;
use super::NogoodInbox;
use super::PropagatorHandle;
use super::PropagatorId;
use super::TerminationCondition;
use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::basic_types::Nogood;
use crate::options::OracleBackend;
use crate::program::GroundProgram;
use crate::registry::Registry;

/// The outcome of asking an oracle for its next model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelSearchResult {
    Model(Interpretation),
    /// There are no further models.
    Exhausted,
    /// The termination condition triggered before a conclusion was reached.
    Unknown,
}

/// An incremental enumerator of the answer sets of a ground program.
///
/// `next_model` is only ever called from one thread at a time; nogoods from other threads are
/// handed over through the [`NogoodInbox`].
pub trait SolverOracle: Send + Debug {
    /// Searches for the next answer set which has not been reported before.
    fn next_model(
        &mut self,
        termination: &mut dyn TerminationCondition,
    ) -> Result<ModelSearchResult, HexError>;

    /// Adds a constraint which holds from the next propagation on.
    fn add_nogood(&mut self, nogood: Nogood);

    /// A handle through which nogoods can be added concurrently to the search.
    fn nogood_inbox(&self) -> NogoodInbox;

    fn add_propagator(&mut self, propagator: Box<dyn ExternalPropagator>) -> PropagatorId;

    fn remove_propagator(&mut self, id: PropagatorId) -> Option<Box<dyn ExternalPropagator>>;

    fn propagator(&self, id: PropagatorId) -> Option<&dyn ExternalPropagator>;

    fn propagator_mut(&mut self, id: PropagatorId) -> Option<&mut dyn ExternalPropagator>;

    /// A human readable summary of the search effort so far.
    fn statistics(&self) -> String;
}

impl dyn SolverOracle {
    pub fn add_typed_propagator<P: ExternalPropagator>(&mut self, propagator: P) -> PropagatorHandle<P> {
        PropagatorHandle::new(self.add_propagator(Box::new(propagator)))
    }

    /// Get a reference to the propagator identified by the given handle.
    pub fn get_propagator<P: ExternalPropagator>(&self, handle: PropagatorHandle<P>) -> Option<&P> {
        self.propagator(handle.untyped())?.downcast_ref()
    }

    pub fn get_propagator_mut<P: ExternalPropagator>(
        &mut self,
        handle: PropagatorHandle<P>,
    ) -> Option<&mut P> {
        self.propagator_mut(handle.untyped())?.downcast_mut()
    }
}

/// Creates oracles for ground programs.
pub trait OracleFactory: Send + Sync + Debug {
    fn create_oracle(&self, registry: Arc<Registry>, program: &GroundProgram) -> Box<dyn SolverOracle>;

    /// Whether the oracle may report non-minimal models of programs with disjunctive rules.
    fn treats_disjunctions_as_choices(&self) -> bool {
        false
    }
}

/// Creates [`GroundSolver`]s with a fixed backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct GroundSolverFactory {
    backend: OracleBackend,
}

impl GroundSolverFactory {
    pub fn new(backend: OracleBackend) -> GroundSolverFactory {
        GroundSolverFactory { backend }
    }
}

impl OracleFactory for GroundSolverFactory {
    fn create_oracle(&self, registry: Arc<Registry>, program: &GroundProgram) -> Box<dyn SolverOracle> {
        Box::new(GroundSolver::new(registry, program, self.backend))
    }

    fn treats_disjunctions_as_choices(&self) -> bool {
        self.backend == OracleBackend::ChoiceDisjunction
    }
}
