use std::sync::Arc;

use log::debug;
use log::trace;

use super::Grounder;
use super::RewrittenProgram;
use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::external::ExternalAtomEvaluator;
use crate::registry::collect_variables;
use crate::registry::AtomId;
use crate::registry::BodyLiteral;
use crate::registry::Registry;

/// Computes the extension of the domain predicates which make guessing rules strongly safe.
///
/// The positive part of the unit is grounded over `input` and the domain facts found so far;
/// every external atom with a domain predicate is evaluated on that over-approximation and each
/// output tuple yields a domain fact. This repeats until no new domain fact appears.
pub fn explore_domains(
    evaluator: &mut ExternalAtomEvaluator,
    program: &RewrittenProgram,
    input: &Interpretation,
) -> Result<Interpretation, HexError> {
    let registry = Arc::clone(evaluator.registry());
    let registry: &Registry = &registry;
    let grounder = Grounder::new(registry);
    let mut domain = Interpretation::new();

    if program.domain_predicates.is_empty() {
        return Ok(domain);
    }

    let mut iterations = 0_usize;
    loop {
        iterations += 1;
        let edb = input.union(&domain);
        let possible = grounder.ground(&program.xgidb, &edb)?.atoms();
        evaluator.refresh();

        let mut changed = false;
        for &(atom, domain_predicate) in &program.domain_predicates {
            let external = registry.external_atom(atom);
            for &id in &program.idb {
                let rule = registry.rule(id);
                if !rule.body.iter().any(|literal| literal.atom.as_external() == Some(atom)) {
                    continue;
                }
                let binding_body = binding_body(registry, &rule.body);

                for substitution in grounder.substitutions(&binding_body, &possible) {
                    let input_tuple = substitution.apply(registry, &external.inputs);
                    if input_tuple.iter().any(|&term| registry.is_variable(term)) {
                        continue;
                    }
                    let mut found = Vec::new();
                    let _ = evaluator.evaluate_tuple(
                        atom,
                        &external,
                        &input_tuple,
                        &possible,
                        &domain,
                        &mut |output| {
                            found.push(output.output.to_vec());
                            true
                        },
                        None,
                    )?;
                    for output in found {
                        let mut tuple = Vec::with_capacity(1 + input_tuple.len() + output.len());
                        tuple.push(domain_predicate);
                        tuple.extend_from_slice(&input_tuple);
                        tuple.extend(output);
                        let address = registry.store_ground_atom(tuple);
                        if !domain.get_fact(address) {
                            domain.set_fact(address);
                            changed = true;
                        }
                    }
                }
            }
        }

        if !changed {
            break;
        }
    }

    debug!(
        "domain exploration found {} domain atoms in {iterations} iterations",
        domain.count()
    );
    Ok(domain)
}

/// The positive ordinary literals of `body`, and the builtins over variables those bind. A builtin
/// over an output variable cannot be decided before the evaluation and is left out.
fn binding_body(registry: &Registry, body: &[BodyLiteral]) -> Vec<BodyLiteral> {
    let mut binding = body
        .iter()
        .filter(|literal| !literal.naf && literal.atom.is_ordinary())
        .copied()
        .collect::<Vec<_>>();

    let mut bound = Vec::new();
    for literal in &binding {
        if let Some(atom) = registry.ordinary_atom(literal.atom) {
            collect_variables(registry, &atom.tuple, &mut bound);
        }
    }

    for literal in body.iter().filter(|literal| !literal.naf) {
        let AtomId::Builtin(id) = literal.atom else {
            continue;
        };
        let builtin = registry.builtin_atom(id);
        let mut variables = Vec::new();
        collect_variables(registry, &[builtin.left, builtin.right], &mut variables);
        if variables.iter().all(|variable| bound.contains(variable)) {
            binding.push(*literal);
        } else {
            trace!(
                "domain exploration ignores builtin {}",
                registry.format_atom(literal.atom)
            );
        }
    }
    binding
}

#[cfg(test)]
mod tests {
    use enumset::EnumSet;

    use super::*;
    use crate::basic_types::EvaluationError;
    use crate::external::ExternalSource;
    use crate::external::InputType;
    use crate::external::Query;
    use crate::external::SourceTable;
    use crate::program::ComponentInfo;
    use crate::program::ProgramRewriter;
    use crate::registry::BuiltinAtom;
    use crate::registry::BuiltinOperator;
    use crate::registry::Rule;
    use crate::registry::Term;
    use crate::registry::TermId;

    /// `&succ[N](M)` holds for `M = N + 1` as long as `M < 3`.
    #[derive(Debug)]
    struct BoundedSuccessor;

    impl ExternalSource for BoundedSuccessor {
        fn name(&self) -> &str {
            "succ"
        }

        fn input_types(&self) -> &[InputType] {
            &[InputType::Constant]
        }

        fn output_arity(&self) -> usize {
            1
        }

        fn retrieve(&self, query: &Query<'_>) -> Result<Vec<Vec<TermId>>, EvaluationError> {
            match query.registry.term(query.input[0]) {
                Term::Integer(value) if value + 1 < 3 => {
                    Ok(vec![vec![query.registry.integer(value + 1)]])
                }
                _ => Ok(vec![]),
            }
        }
    }

    /// Explores `num(Y) :- num(X), &succ[X](Y).` over `num(0)`, with `extra` added to the body.
    fn explore_successors(extra: impl FnOnce(&Registry, TermId, TermId) -> Vec<BodyLiteral>) -> String {
        let registry = Arc::new(Registry::default());
        let num = registry.constant("num");
        let succ = registry.constant("succ");
        let x = registry.variable("X");
        let y = registry.variable("Y");

        let external = registry.store_external_atom(succ, vec![x], vec![y]);
        let mut body = vec![BodyLiteral::positive(registry.store_ordinary_atom(vec![num, x]))];
        body.extend(extra(&*registry, x, y));
        body.push(BodyLiteral::positive(external));
        let rule = registry.store_rule(Rule::regular(vec![registry.store_ordinary_atom(vec![num, y])], body));
        let component = ComponentInfo::from_rules(&registry, vec![rule]);
        let program = ProgramRewriter::new(&registry)
            .with_auto_strong_safety(true)
            .rewrite(&component)
            .expect("rewritable");

        let mut sources = SourceTable::default();
        sources.register(&registry, Arc::new(BoundedSuccessor));
        let mut evaluator = ExternalAtomEvaluator::new(
            Arc::clone(&registry),
            Arc::new(sources),
            component.inner_external_atoms.clone(),
            EnumSet::empty(),
        )
        .expect("valid external atoms");

        let input = Interpretation::from_atoms([registry.store_ground_atom(vec![num, registry.integer(0)])]);
        let domain = explore_domains(&mut evaluator, &program, &input).expect("evaluable");
        registry.format_interpretation(&domain)
    }

    fn not_equal(registry: &Registry, left: TermId, right: TermId) -> BodyLiteral {
        BodyLiteral::positive(registry.store_builtin_atom(BuiltinAtom {
            operator: BuiltinOperator::NotEqual,
            left,
            right,
        }))
    }

    #[test]
    fn domain_facts_follow_the_outputs() {
        assert_eq!(
            explore_successors(|_, _, _| vec![]),
            "{aux_d_succ(0,1), aux_d_succ(1,2)}"
        );
    }

    #[test]
    fn builtins_over_bound_variables_restrict_the_inputs() {
        // num(Y) :- num(X), X != 1, &succ[X](Y).
        let domain = explore_successors(|registry, x, _| vec![not_equal(registry, x, registry.integer(1))]);

        assert_eq!(domain, "{aux_d_succ(0,1)}");
    }

    #[test]
    fn builtins_over_outputs_are_ignored() {
        // num(Y) :- num(X), Y != 1, &succ[X](Y).
        let domain = explore_successors(|registry, _, y| vec![not_equal(registry, y, registry.integer(1))]);

        assert_eq!(domain, "{aux_d_succ(0,1)}");
    }
}
