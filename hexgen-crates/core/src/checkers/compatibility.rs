use log::trace;

use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::basic_types::NogoodSink;
use crate::basic_types::reborrow_sink;
use crate::external::ExternalAtomEvaluator;
use crate::program::AnnotatedGroundProgram;
use crate::program::ExternalAtomMask;
use crate::registry::ExternalAtomId;

/// Whether the replacement atoms guessed in `candidate` agree with the actual outputs of all inner
/// external atoms of `program` under `candidate`.
///
/// A candidate fails if an output was guessed false, or if a replacement atom was guessed true
/// without being confirmed by any output. Nogoods learned during the evaluations are written to
/// `nogoods`.
pub fn is_compatible_set(
    evaluator: &ExternalAtomEvaluator,
    program: &AnnotatedGroundProgram,
    candidate: &Interpretation,
    mut nogoods: Option<&mut dyn NogoodSink>,
) -> Result<bool, HexError> {
    let mut positive_guess = Interpretation::new();
    let mut replacements = Interpretation::new();
    for mask in program.external_masks() {
        positive_guess.union_with(&mask.positive_replacements);
        replacements.union_with(&mask.replacements);
    }
    positive_guess.intersect_with(candidate);
    let negative_guess = candidate
        .intersection(&replacements)
        .difference(&positive_guess);

    for mask in program.external_masks() {
        let confirmed = check_outputs(
            evaluator,
            mask.atom,
            candidate,
            program.program_mask(),
            &mut positive_guess,
            &negative_guess,
            reborrow_sink(&mut nogoods),
        )?;
        if !confirmed {
            trace!("candidate guessed a true output of {:?} false", mask.atom);
            return Ok(false);
        }
    }

    if !positive_guess.is_empty() {
        trace!("{} replacement atoms were guessed true without support", positive_guess.count());
        return Ok(false);
    }
    Ok(true)
}

/// Verifies a single external atom: its replacement atoms in `candidate` must be exactly the
/// outputs it produces under `candidate`.
pub fn verify_external_atom(
    evaluator: &ExternalAtomEvaluator,
    mask: &ExternalAtomMask,
    candidate: &Interpretation,
    domain: &Interpretation,
    nogoods: Option<&mut dyn NogoodSink>,
) -> Result<bool, HexError> {
    let mut positive_guess = candidate.intersection(&mask.positive_replacements);
    let negative_guess = candidate
        .intersection(&mask.replacements)
        .difference(&positive_guess);

    let confirmed = check_outputs(
        evaluator,
        mask.atom,
        candidate,
        domain,
        &mut positive_guess,
        &negative_guess,
        nogoods,
    )?;
    Ok(confirmed && positive_guess.is_empty())
}

/// Evaluates `atom` and removes every confirmed output from `positive_guess`. Returns `false` as
/// soon as an output is found in `negative_guess`, even if it was guessed true as well.
fn check_outputs(
    evaluator: &ExternalAtomEvaluator,
    atom: ExternalAtomId,
    candidate: &Interpretation,
    domain: &Interpretation,
    positive_guess: &mut Interpretation,
    negative_guess: &Interpretation,
    nogoods: Option<&mut dyn NogoodSink>,
) -> Result<bool, HexError> {
    evaluator.evaluate(
        atom,
        candidate,
        domain,
        &mut |output| {
            if output
                .negative
                .is_some_and(|negative| negative_guess.get_fact(negative))
            {
                return false;
            }
            positive_guess.clear_fact(output.positive);
            true
        },
        nogoods,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::basic_types::Literal;
    use crate::basic_types::Nogood;
    use crate::external::test_sources::EvenSource;
    use crate::external::SourceTable;
    use crate::options::LearningMode;
    use crate::program::GroundProgram;
    use crate::program::GroundRule;
    use crate::registry::Registry;

    struct Fixture {
        registry: Arc<Registry>,
        evaluator: ExternalAtomEvaluator,
        program: AnnotatedGroundProgram,
    }

    impl Fixture {
        /// `dom(1). dom(2).` with the guessing rules of `&even[X]()` for both inputs.
        fn new() -> Fixture {
            let registry = Arc::new(Registry::default());
            let mut sources = SourceTable::default();
            sources.register(&registry, Arc::new(EvenSource));

            let x = registry.variable("X");
            let atom = registry
                .store_external_atom(registry.constant("even"), vec![x], vec![])
                .as_external()
                .expect("stored as external atom");
            let external = registry.external_atom(atom);

            let mut program = GroundProgram::default();
            for value in [1, 2] {
                let dom = registry.store_ground_atom(vec![registry.constant("dom"), registry.integer(value)]);
                let positive =
                    registry.store_ground_atom(vec![external.replacement_positive, registry.integer(value)]);
                let negative =
                    registry.store_ground_atom(vec![external.replacement_negative, registry.integer(value)]);
                program.edb.set_fact(dom);
                program.rules.push(GroundRule {
                    head: vec![positive, negative],
                    body: vec![Literal::positive(dom)],
                });
            }

            let evaluator = ExternalAtomEvaluator::new(
                Arc::clone(&registry),
                Arc::new(sources),
                [atom],
                LearningMode::InputOutput | LearningMode::Negative,
            )
            .expect("even is registered");
            let program = AnnotatedGroundProgram::new(&evaluator, program, &[atom]);

            Fixture {
                registry,
                evaluator,
                program,
            }
        }

        fn candidate(&self, atoms: &[(&str, i64)]) -> Interpretation {
            atoms
                .iter()
                .map(|&(predicate, value)| {
                    self.registry
                        .store_ground_atom(vec![self.registry.constant(predicate), self.registry.integer(value)])
                })
                .collect()
        }
    }

    #[test]
    fn correct_guess_is_compatible() {
        let fixture = Fixture::new();
        let candidate = fixture.candidate(&[("dom", 1), ("dom", 2), ("aux_n_even", 1), ("aux_r_even", 2)]);

        assert!(is_compatible_set(&fixture.evaluator, &fixture.program, &candidate, None).expect("even never fails"));
    }

    #[test]
    fn true_output_guessed_false_is_rejected() {
        let fixture = Fixture::new();
        let candidate = fixture.candidate(&[("dom", 1), ("dom", 2), ("aux_n_even", 1), ("aux_n_even", 2)]);

        assert!(!is_compatible_set(&fixture.evaluator, &fixture.program, &candidate, None).expect("even never fails"));
    }

    #[test]
    fn unsupported_positive_guess_is_rejected() {
        let fixture = Fixture::new();
        let candidate = fixture.candidate(&[("dom", 1), ("dom", 2), ("aux_r_even", 1), ("aux_r_even", 2)]);

        assert!(!is_compatible_set(&fixture.evaluator, &fixture.program, &candidate, None).expect("even never fails"));

        let mask = fixture.program.external_mask(0);
        assert!(!verify_external_atom(
            &fixture.evaluator,
            mask,
            &candidate,
            fixture.program.program_mask(),
            None
        )
        .expect("even never fails"));
    }

    #[test]
    fn output_guessed_both_true_and_false_is_rejected() {
        let fixture = Fixture::new();
        let candidate = fixture.candidate(&[
            ("dom", 1),
            ("dom", 2),
            ("aux_n_even", 1),
            ("aux_r_even", 2),
            ("aux_n_even", 2),
        ]);

        assert!(!is_compatible_set(&fixture.evaluator, &fixture.program, &candidate, None).expect("even never fails"));
    }

    #[test]
    fn evaluation_learns_nogoods() {
        let fixture = Fixture::new();
        let candidate = fixture.candidate(&[("dom", 1), ("dom", 2), ("aux_n_even", 1), ("aux_r_even", 2)]);
        let mut learned: Vec<Nogood> = Vec::new();

        let compatible = is_compatible_set(&fixture.evaluator, &fixture.program, &candidate, Some(&mut learned))
            .expect("even never fails");

        assert!(compatible);
        // One input/output nogood for even(2) and a negative one for even(1).
        assert_eq!(learned.len(), 2);
    }
}
