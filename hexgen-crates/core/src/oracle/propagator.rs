use std::fmt::Debug;
use std::marker::PhantomData;

use downcast_rs::impl_downcast;
use downcast_rs::Downcast;

use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::basic_types::NogoodSink;
use crate::storage_key;

storage_key!(
    /// Identifies an [`ExternalPropagator`] registered with an oracle.
    PropagatorId
);

/// The state of the oracle's search handed to an [`ExternalPropagator`].
#[derive(Clone, Copy, Debug)]
pub struct PartialAssignment<'a> {
    /// The atoms currently assigned true.
    pub partial: &'a Interpretation,
    /// The atoms currently assigned a value.
    pub assigned: &'a Interpretation,
    /// The atoms whose value changed since the previous call.
    pub changed: &'a Interpretation,
}

impl PartialAssignment<'_> {
    /// Whether every atom of `mask` is assigned.
    pub fn is_complete_on(&self, mask: &Interpretation) -> bool {
        mask.is_subset_of(self.assigned)
    }
}

// We need this to cast from `Box<dyn ExternalPropagator>` to a concrete propagator; rust does
// not allow downcasting from the trait definition to its concrete type.
impl_downcast!(ExternalPropagator);

/// A callback fired synchronously by the oracle after each propagation fixpoint.
///
/// Nogoods written to the sink are added to the oracle before it continues its search.
pub trait ExternalPropagator: Downcast + Send + Debug {
    /// Return the name of the propagator.
    fn name(&self) -> &str;

    fn propagate(
        &mut self,
        assignment: PartialAssignment<'_>,
        nogoods: &mut dyn NogoodSink,
    ) -> Result<(), HexError>;
}

/// A typed wrapper around a [`PropagatorId`] that allows retrieving the concrete propagator from
/// an oracle.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct PropagatorHandle<P> {
    id: PropagatorId,
    propagator: PhantomData<P>,
}

impl<P> PropagatorHandle<P> {
    pub(crate) fn new(id: PropagatorId) -> PropagatorHandle<P> {
        PropagatorHandle {
            id,
            propagator: PhantomData,
        }
    }

    /// Get a type-erased handle to the propagator.
    pub fn untyped(self) -> PropagatorId {
        self.id
    }
}

impl<P> Clone for PropagatorHandle<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for PropagatorHandle<P> {}
