//! Small external sources shared by the unit tests.
use super::ExternalSource;
use super::InputType;
use super::Query;
use crate::basic_types::EvaluationError;
use crate::registry::Term;
use crate::registry::TermId;

/// `&even[N]()` holds for even integers `N`.
#[derive(Debug)]
pub(crate) struct EvenSource;

impl ExternalSource for EvenSource {
    fn name(&self) -> &str {
        "even"
    }

    fn input_types(&self) -> &[InputType] {
        &[InputType::Constant]
    }

    fn output_arity(&self) -> usize {
        0
    }

    fn retrieve(&self, query: &Query<'_>) -> Result<Vec<Vec<TermId>>, EvaluationError> {
        match query.registry.term(query.input[0]) {
            Term::Integer(value) if value % 2 == 0 => Ok(vec![vec![]]),
            _ => Ok(vec![]),
        }
    }
}

/// `&id[p](X)` holds for every `X` with `p(X)` true.
#[derive(Debug)]
pub(crate) struct IdentitySource;

impl ExternalSource for IdentitySource {
    fn name(&self) -> &str {
        "id"
    }

    fn input_types(&self) -> &[InputType] {
        &[InputType::Predicate]
    }

    fn output_arity(&self) -> usize {
        1
    }

    fn retrieve(&self, query: &Query<'_>) -> Result<Vec<Vec<TermId>>, EvaluationError> {
        Ok(query.predicate_extension(0))
    }
}
