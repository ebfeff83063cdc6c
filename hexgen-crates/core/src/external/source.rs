use std::fmt::Debug;
use std::sync::Arc;

use super::NongroundNogood;
use crate::basic_types::EvaluationError;
use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::basic_types::Nogood;
use crate::containers::HashMap;
use crate::registry::Registry;
use crate::registry::TermId;

/// How an input position of an external atom is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputType {
    /// The input term names a predicate whose extension in the interpretation is passed on.
    Predicate,
    /// The input term is passed on as a value.
    Constant,
}

/// A single call of an external source: one ground input tuple under one interpretation.
#[derive(Clone, Copy, Debug)]
pub struct Query<'a> {
    pub registry: &'a Registry,
    /// The ground input tuple.
    pub input: &'a [TermId],
    /// The interpretation restricted to the atoms of the predicate inputs.
    pub interpretation: &'a Interpretation,
}

impl Query<'_> {
    /// The argument tuples of the true atoms of the predicate at input position `position`.
    pub fn predicate_extension(&self, position: usize) -> Vec<Vec<TermId>> {
        let predicate = self.input[position];
        self.interpretation
            .atoms()
            .map(|address| self.registry.ground_atom(address))
            .filter(|atom| atom.predicate() == predicate)
            .map(|atom| atom.arguments().to_vec())
            .collect()
    }
}

/// The evaluation procedure behind an external predicate.
///
/// Sources must be safe to call concurrently: the final compatibility check of the pipelined
/// model generator evaluates distinct atoms on several threads at once.
pub trait ExternalSource: Send + Sync + Debug {
    /// The predicate symbol, without the leading `&`.
    fn name(&self) -> &str;

    fn input_types(&self) -> &[InputType];

    fn output_arity(&self) -> usize;

    /// Returns the output tuples which are true for `query`.
    fn retrieve(&self, query: &Query<'_>) -> Result<Vec<Vec<TermId>>, EvaluationError>;

    /// Lifts a ground input/output nogood learned for this source to a nonground one which holds
    /// for all instances. Sources which cannot generalise return `None`.
    fn generalize_nogood(&self, _registry: &Registry, _nogood: &Nogood) -> Option<NongroundNogood> {
        None
    }
}

/// Maps external predicate symbols to their evaluation procedures.
///
/// Atoms refer to their source only through their predicate symbol; the table owns the sources.
#[derive(Debug, Default, Clone)]
pub struct SourceTable {
    sources: HashMap<TermId, Arc<dyn ExternalSource>>,
}

impl SourceTable {
    pub fn register(&mut self, registry: &Registry, source: Arc<dyn ExternalSource>) {
        let predicate = registry.constant(source.name());
        let _ = self.sources.insert(predicate, source);
    }

    pub fn get(&self, predicate: TermId) -> Option<&Arc<dyn ExternalSource>> {
        self.sources.get(&predicate)
    }

    pub fn source(&self, registry: &Registry, predicate: TermId) -> Result<&Arc<dyn ExternalSource>, HexError> {
        self.get(predicate)
            .ok_or_else(|| HexError::UnknownExternalSource(registry.term(predicate).to_string()))
    }
}
