use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use enumset::EnumSet;
use log::trace;

use super::InputMaskCache;
use super::Query;
use super::SourceTable;
use crate::basic_types::AtomAddress;
use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::basic_types::Literal;
use crate::basic_types::Nogood;
use crate::basic_types::NogoodSink;
use crate::basic_types::reborrow_sink;
use crate::options::LearningMode;
use crate::registry::ExternalAtom;
use crate::registry::ExternalAtomId;
use crate::registry::Registry;
use crate::registry::Substitution;
use crate::registry::TermId;

/// One output tuple produced by an external atom for one input tuple.
#[derive(Clone, Copy, Debug)]
pub struct ExternalOutput<'a> {
    pub atom: ExternalAtomId,
    pub input: &'a [TermId],
    pub output: &'a [TermId],
    /// The positive replacement atom `r⁺(input, output)`.
    pub positive: AtomAddress,
    /// The negative replacement atom `r⁻(input, output)`, if it was ever registered.
    pub negative: Option<AtomAddress>,
}

/// Evaluates external atoms against interpretations and learns nogoods from the answers.
///
/// The masks are refreshed through `&mut self`; evaluation itself only needs `&self`, which
/// allows several atoms to be evaluated concurrently on scoped threads.
#[derive(Debug)]
pub struct ExternalAtomEvaluator {
    registry: Arc<Registry>,
    sources: Arc<SourceTable>,
    masks: InputMaskCache,
    learning: EnumSet<LearningMode>,
    num_evaluations: AtomicUsize,
}

impl ExternalAtomEvaluator {
    pub fn new(
        registry: Arc<Registry>,
        sources: Arc<SourceTable>,
        atoms: impl IntoIterator<Item = ExternalAtomId>,
        learning: EnumSet<LearningMode>,
    ) -> Result<ExternalAtomEvaluator, HexError> {
        let mut masks = InputMaskCache::new(Arc::clone(&registry));
        for atom in atoms {
            masks.register(atom, &sources)?;
        }
        masks.refresh();

        Ok(ExternalAtomEvaluator {
            registry,
            sources,
            masks,
            learning,
            num_evaluations: AtomicUsize::new(0),
        })
    }

    pub fn refresh(&mut self) {
        self.masks.refresh();
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn learning(&self) -> EnumSet<LearningMode> {
        self.learning
    }

    pub fn input_mask(&self, atom: ExternalAtomId) -> &Interpretation {
        self.masks.input_mask(atom)
    }

    pub fn replacement_mask(&self, atom: ExternalAtomId) -> &Interpretation {
        self.masks.replacement_mask(atom)
    }

    pub fn num_evaluations(&self) -> usize {
        self.num_evaluations.load(Ordering::Relaxed)
    }

    /// The ground input tuples of `atom`. Ground inputs yield exactly one tuple; otherwise the
    /// tuples are read off the replacement atoms contained in `domain`.
    pub fn input_tuples(&self, atom: ExternalAtomId, domain: &Interpretation) -> Vec<Vec<TermId>> {
        let external = self.registry.external_atom(atom);
        if external
            .inputs
            .iter()
            .all(|&term| !self.registry.is_variable(term))
        {
            return vec![external.inputs];
        }

        let num_inputs = external.inputs.len();
        let mut tuples = domain
            .intersection(self.replacement_mask(atom))
            .atoms()
            .filter_map(|address| {
                self.registry
                    .ground_atom(address)
                    .arguments()
                    .get(..num_inputs)
                    .map(<[TermId]>::to_vec)
            })
            .filter(|input| {
                Substitution::default()
                    .matched(&self.registry, &external.inputs, input)
                    .is_some()
            })
            .collect::<Vec<_>>();
        tuples.sort();
        tuples.dedup();
        tuples
    }

    /// Evaluates `atom` under `interpretation` for every input tuple found in `domain`.
    ///
    /// `callback` is invoked for every output tuple; returning `false` aborts the evaluation, in
    /// which case `Ok(false)` is returned. Learned nogoods are written to `nogoods` if present.
    pub fn evaluate(
        &self,
        atom: ExternalAtomId,
        interpretation: &Interpretation,
        domain: &Interpretation,
        callback: &mut dyn FnMut(&ExternalOutput<'_>) -> bool,
        mut nogoods: Option<&mut dyn NogoodSink>,
    ) -> Result<bool, HexError> {
        let external = self.registry.external_atom(atom);
        for input in self.input_tuples(atom, domain) {
            let completed = self.evaluate_tuple(
                atom,
                &external,
                &input,
                interpretation,
                domain,
                callback,
                reborrow_sink(&mut nogoods),
            )?;
            if !completed {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Evaluates `atom` for the single ground `input` tuple.
    #[allow(clippy::too_many_arguments, reason = "mirrors the evaluation call of the source")]
    pub fn evaluate_tuple(
        &self,
        atom: ExternalAtomId,
        external: &ExternalAtom,
        input: &[TermId],
        interpretation: &Interpretation,
        domain: &Interpretation,
        callback: &mut dyn FnMut(&ExternalOutput<'_>) -> bool,
        mut nogoods: Option<&mut dyn NogoodSink>,
    ) -> Result<bool, HexError> {
        let source = self.sources.source(&self.registry, external.predicate)?;
        let Some(binding) = Substitution::default().matched(&self.registry, &external.inputs, input)
        else {
            return Ok(true);
        };

        let input_mask = self.input_mask(atom);
        let projected = interpretation.intersection(input_mask);
        let query = Query {
            registry: &self.registry,
            input,
            interpretation: &projected,
        };
        let answer = source.retrieve(&query)?;
        let _ = self.num_evaluations.fetch_add(1, Ordering::Relaxed);
        trace!(
            "&{}[{}] produced {} tuples",
            source.name(),
            input.len(),
            answer.len()
        );

        let input_literals = if nogoods.is_some() && !self.learning.is_empty() {
            input_mask
                .atoms()
                .map(|address| Literal::from_interpretation(address, interpretation))
                .collect::<Vec<_>>()
        } else {
            Vec::new()
        };

        let mut produced = Interpretation::new();
        for output in &answer {
            if output.len() != external.outputs.len() {
                return Err(HexError::ArityMismatch {
                    predicate: source.name().to_owned(),
                    position: "output",
                    expected: external.outputs.len(),
                    actual: output.len(),
                });
            }
            if binding
                .matched(&self.registry, &external.outputs, output)
                .is_none()
            {
                continue;
            }

            let mut tuple = Vec::with_capacity(1 + input.len() + output.len());
            tuple.push(external.replacement_positive);
            tuple.extend_from_slice(input);
            tuple.extend_from_slice(output);
            let positive = self.registry.store_ground_atom(tuple.clone());
            tuple[0] = external.replacement_negative;
            let negative = self.registry.lookup_ground_atom(&tuple);
            produced.set_fact(positive);

            if let Some(sink) = reborrow_sink(&mut nogoods) {
                if self.learning.contains(LearningMode::InputOutput) {
                    let nogood = input_literals
                        .iter()
                        .copied()
                        .chain(std::iter::once(Literal::negative(positive)))
                        .collect::<Nogood>();
                    self.learn(source.as_ref(), nogood, sink);
                }
            }

            let keep_going = callback(&ExternalOutput {
                atom,
                input,
                output,
                positive,
                negative,
            });
            if !keep_going {
                return Ok(false);
            }
        }

        if let Some(sink) = nogoods {
            if self.learning.contains(LearningMode::Negative) {
                let candidates = domain.intersection(self.replacement_mask(atom));
                self.learn_negative(external, input, &produced, &input_literals, &candidates, sink);
            }
        }

        Ok(true)
    }

    /// The positive replacement atoms which `atom` makes true under `interpretation`.
    pub fn true_replacements(
        &self,
        atom: ExternalAtomId,
        interpretation: &Interpretation,
        domain: &Interpretation,
    ) -> Result<Interpretation, HexError> {
        let mut result = Interpretation::new();
        let _ = self.evaluate(
            atom,
            interpretation,
            domain,
            &mut |output| {
                result.set_fact(output.positive);
                true
            },
            None,
        )?;
        Ok(result)
    }

    fn learn(
        &self,
        source: &dyn super::ExternalSource,
        nogood: Nogood,
        sink: &mut dyn NogoodSink,
    ) {
        if self.learning.contains(LearningMode::Generalize) {
            if let Some(general) = source.generalize_nogood(&self.registry, &nogood) {
                sink.add_nonground_nogood(general);
            }
        }
        sink.add_nogood(nogood);
    }

    /// Learns that positive replacement atoms in `candidates` which were not produced for
    /// `input` must be false under the current input.
    fn learn_negative(
        &self,
        external: &ExternalAtom,
        input: &[TermId],
        produced: &Interpretation,
        input_literals: &[Literal],
        candidates: &Interpretation,
        sink: &mut dyn NogoodSink,
    ) {
        let num_inputs = input.len();
        for address in candidates.atoms() {
            if produced.get_fact(address) {
                continue;
            }
            let atom = self.registry.ground_atom(address);
            if atom.predicate() != external.replacement_positive
                || atom.arguments().get(..num_inputs) != Some(input)
            {
                continue;
            }

            let nogood = input_literals
                .iter()
                .copied()
                .chain(std::iter::once(Literal::positive(address)))
                .collect::<Nogood>();
            sink.add_nogood(nogood);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::test_sources::IdentitySource;
    use crate::registry::AtomId;

    /// `&id[p](X)` over the facts `p(a). p(b).`
    fn identity_atom(registry: &Arc<Registry>) -> (ExternalAtomId, Interpretation) {
        let p = registry.constant("p");
        let facts = ["a", "b"]
            .iter()
            .map(|name| registry.store_ground_atom(vec![p, registry.constant(name)]))
            .collect::<Interpretation>();
        let AtomId::External(atom) =
            registry.store_external_atom(registry.constant("id"), vec![p], vec![registry.variable("X")])
        else {
            panic!("external atoms are stored as external atoms");
        };
        (atom, facts)
    }

    fn sources(registry: &Registry) -> Arc<SourceTable> {
        let mut sources = SourceTable::default();
        sources.register(registry, Arc::new(IdentitySource));
        Arc::new(sources)
    }

    #[test]
    fn true_replacements_follow_the_input_extension() {
        let registry = Arc::new(Registry::default());
        let (atom, facts) = identity_atom(&registry);
        let evaluator =
            ExternalAtomEvaluator::new(Arc::clone(&registry), sources(&registry), [atom], EnumSet::empty())
                .expect("id is registered");

        let replacements = evaluator
            .true_replacements(atom, &facts, &facts)
            .expect("id never fails");

        assert_eq!(
            registry.format_interpretation(&replacements),
            "{aux_r_id(p,a), aux_r_id(p,b)}"
        );
        assert_eq!(evaluator.num_evaluations(), 1);
    }

    #[test]
    fn learned_nogoods_forbid_dropping_a_true_output() {
        let registry = Arc::new(Registry::default());
        let (atom, facts) = identity_atom(&registry);
        let evaluator = ExternalAtomEvaluator::new(
            Arc::clone(&registry),
            sources(&registry),
            [atom],
            LearningMode::InputOutput.into(),
        )
        .expect("id is registered");

        let mut learned: Vec<Nogood> = Vec::new();
        let completed = evaluator
            .evaluate(atom, &facts, &facts, &mut |_| true, Some(&mut learned))
            .expect("id never fails");

        assert!(completed);
        assert!(!learned.is_empty());
        assert!(learned.iter().any(|nogood| nogood.is_violated_by(&facts)));
    }

    #[test]
    fn aborting_callback_stops_the_evaluation() {
        let registry = Arc::new(Registry::default());
        let (atom, facts) = identity_atom(&registry);
        let evaluator =
            ExternalAtomEvaluator::new(Arc::clone(&registry), sources(&registry), [atom], EnumSet::empty())
                .expect("id is registered");

        let mut seen = 0;
        let completed = evaluator
            .evaluate(
                atom,
                &facts,
                &facts,
                &mut |_| {
                    seen += 1;
                    false
                },
                None,
            )
            .expect("id never fails");

        assert!(!completed);
        assert_eq!(seen, 1);
    }

    #[test]
    fn unregistered_source_is_reported() {
        let registry = Arc::new(Registry::default());
        let (atom, _) = identity_atom(&registry);

        let result = ExternalAtomEvaluator::new(
            Arc::clone(&registry),
            Arc::new(SourceTable::default()),
            [atom],
            EnumSet::empty(),
        );

        assert!(matches!(result, Err(HexError::UnknownExternalSource(_))));
    }
}
