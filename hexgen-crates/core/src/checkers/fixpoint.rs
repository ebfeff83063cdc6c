use log::trace;

use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::external::ExternalAtomEvaluator;
use crate::program::AnnotatedGroundProgram;

/// Derives the atoms of `candidate` which are well-justified by the program.
///
/// Starting from the facts, a rule fires once its positive ordinary atoms are derived, its
/// default-negated atoms are false in `candidate`, and its positive replacement atoms are produced
/// by evaluating the external atoms on the atoms derived so far. A firing rule derives those of
/// its head atoms which are true in `candidate`. Guessing rules never fire.
pub fn compute_fixpoint(
    evaluator: &ExternalAtomEvaluator,
    program: &AnnotatedGroundProgram,
    candidate: &Interpretation,
) -> Result<Interpretation, HexError> {
    let replacements = program.replacement_atoms();
    let ground_program = program.ground_program();
    let mut fixpoint = ground_program.edb.clone();

    loop {
        let mut produced = Interpretation::new();
        for mask in program.external_masks() {
            produced.union_with(&evaluator.true_replacements(
                mask.atom,
                &fixpoint,
                program.program_mask(),
            )?);
        }

        let mut changed = false;
        for rule in &ground_program.rules {
            if rule.is_constraint() || program.is_guessing_rule(&rule.head) {
                continue;
            }
            let fires = rule.body.iter().all(|literal| {
                if !literal.value {
                    !candidate.get_fact(literal.address)
                } else if replacements.get_fact(literal.address) {
                    produced.get_fact(literal.address)
                } else {
                    fixpoint.get_fact(literal.address)
                }
            });
            if !fires {
                continue;
            }
            for &head in &rule.head {
                if candidate.get_fact(head) && !fixpoint.get_fact(head) {
                    fixpoint.set_fact(head);
                    changed = true;
                }
            }
        }

        if !changed {
            trace!("fixpoint reached with {} atoms", fixpoint.count());
            return Ok(fixpoint);
        }
    }
}

/// Whether every atom of `candidate` outside the replacement atoms is well-justified.
pub fn is_well_justified(
    evaluator: &ExternalAtomEvaluator,
    program: &AnnotatedGroundProgram,
    candidate: &Interpretation,
) -> Result<bool, HexError> {
    let fixpoint = compute_fixpoint(evaluator, program, candidate)?;
    let reference = candidate.difference(&program.replacement_atoms());
    Ok(reference.is_subset_of(&fixpoint))
}
