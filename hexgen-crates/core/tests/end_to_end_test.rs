#![cfg(test)]
//! Complete enumerations of small units, with every generator and the main option combinations.
mod helpers;

use hexgen_core::options::EvaluationHeuristic;
use hexgen_core::options::OracleBackend;
use hexgen_core::options::UfsCheckHeuristic;
use hexgen_core::registry::BuiltinOperator;
use hexgen_core::ModelGeneratorOptions;

use crate::helpers::even_program;
use crate::helpers::pipelined;
use crate::helpers::pos;
use crate::helpers::self_support_program;
use crate::helpers::synchronous;
use crate::helpers::EvenSource;
use crate::helpers::ProgramBuilder;
use crate::helpers::SuccessorSource;

fn both_kinds() -> [ModelGeneratorOptions; 2] {
    [synchronous(), pipelined()]
}

#[test]
fn even_program_has_a_single_answer_set() {
    let builder = even_program();

    for base in both_kinds() {
        for evaluation_heuristic in [
            EvaluationHeuristic::Always,
            EvaluationHeuristic::Never,
            EvaluationHeuristic::InputComplete,
        ] {
            let options = ModelGeneratorOptions {
                evaluation_heuristic,
                ..base.clone()
            };
            assert_eq!(
                builder.models(options),
                vec!["{dom(1), dom(2), p(1)}"],
                "{:?} with {evaluation_heuristic:?}",
                base.generator_kind
            );
        }
    }
}

#[test]
fn constraint_can_remove_every_answer_set() {
    let mut builder = even_program();
    let p_1 = builder.atom("p", &["1"]);
    let _ = builder.constraint(vec![pos(p_1)]);

    for options in both_kinds() {
        assert!(builder.models(options).is_empty());
    }
}

#[test]
fn disjunction_is_minimal_with_every_backend() {
    let mut builder = ProgramBuilder::new();
    let a = builder.atom("a", &[]);
    let b = builder.atom("b", &[]);
    let _ = builder.rule(vec![a, b], vec![]);

    for base in both_kinds() {
        for oracle_backend in [OracleBackend::Minimal, OracleBackend::ChoiceDisjunction] {
            let options = ModelGeneratorOptions {
                oracle_backend,
                ..base.clone()
            };
            assert_eq!(builder.models(options), vec!["{a}", "{b}"], "{oracle_backend:?}");
        }
    }
}

#[test]
fn outer_external_atom_is_evaluated_up_front() {
    // q(X) :- &succ[1](X).
    let mut builder = ProgramBuilder::new().with_source(SuccessorSource);
    let q = builder.atom("q", &["X"]);
    let succ = builder.external("succ", &["1"], &["X"]);
    let _ = builder.rule(vec![q], vec![pos(succ)]);

    for options in both_kinds() {
        assert_eq!(builder.models(options), vec!["{q(2)}"]);
    }
}

#[test]
fn self_support_is_rejected_by_the_flp_check() {
    let builder = self_support_program();

    for base in both_kinds() {
        for encode_minimality_check_into_reduct in [true, false] {
            let options = ModelGeneratorOptions {
                encode_minimality_check_into_reduct,
                ..base.clone()
            };
            assert_eq!(builder.models(options), vec!["{}"]);
        }
    }
}

#[test]
fn self_support_is_rejected_by_the_unfounded_set_check() {
    let builder = self_support_program();

    for base in both_kinds() {
        for ufs_check_heuristic in [UfsCheckHeuristic::Post, UfsCheckHeuristic::Max, UfsCheckHeuristic::Periodic] {
            let options = ModelGeneratorOptions {
                flp_check: false,
                ufs_check: true,
                ufs_check_heuristic,
                ..base.clone()
            };
            assert_eq!(builder.models(options), vec!["{}"], "{ufs_check_heuristic:?}");
        }
    }
}

#[test]
fn builtins_next_to_external_atoms_restrict_the_rule_only() {
    // dom(1..4). p(X) :- dom(X), X != 2, &even[X]().
    let mut builder = ProgramBuilder::new().with_source(EvenSource);
    for value in ["1", "2", "3", "4"] {
        let _ = builder.fact("dom", &[value]);
    }
    let p = builder.atom("p", &["X"]);
    let dom = builder.atom("dom", &["X"]);
    let different = builder.builtin("X", BuiltinOperator::NotEqual, "2");
    let even = builder.external("even", &["X"], &[]);
    let _ = builder.rule(vec![p], vec![pos(dom), pos(different), pos(even)]);

    for options in both_kinds() {
        assert_eq!(
            builder.models(options),
            vec!["{dom(1), dom(2), dom(3), dom(4), p(4)}"]
        );
    }
}
