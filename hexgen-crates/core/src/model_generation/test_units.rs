//! Small evaluation units shared by the unit tests of the model generators.
use std::sync::Arc;

use super::GenerationContext;
use super::GuessAndCheckModelGeneratorFactory;
use super::ModelGenerator;
use crate::basic_types::Interpretation;
use crate::external::test_sources::EvenSource;
use crate::external::test_sources::IdentitySource;
use crate::external::SourceTable;
use crate::options::ModelGeneratorOptions;
use crate::program::ComponentInfo;
use crate::registry::BodyLiteral;
use crate::registry::Registry;
use crate::registry::Rule;

pub(crate) struct TestUnit {
    pub(crate) registry: Arc<Registry>,
    pub(crate) sources: Arc<SourceTable>,
    pub(crate) component: ComponentInfo,
}

impl TestUnit {
    pub(crate) fn factory(&self, options: ModelGeneratorOptions) -> GuessAndCheckModelGeneratorFactory {
        GuessAndCheckModelGeneratorFactory::with_ground_solver(
            Arc::clone(&self.registry),
            Arc::clone(&self.sources),
            self.component.clone(),
            options,
        )
        .expect("test units can be rewritten")
    }

    pub(crate) fn prepare_context(&self) -> GenerationContext {
        self.factory(ModelGeneratorOptions::default())
            .prepare(&Interpretation::new())
            .expect("test units can be grounded")
    }

    /// Ground atoms with a single integer or constant argument.
    pub(crate) fn atoms(&self, atoms: &[(&str, i64)]) -> Interpretation {
        atoms
            .iter()
            .map(|&(predicate, value)| {
                self.registry
                    .store_ground_atom(vec![self.registry.constant(predicate), self.registry.integer(value)])
            })
            .collect()
    }

    /// All models of the unit without input, formatted and sorted.
    pub(crate) fn models(&self, options: ModelGeneratorOptions) -> Vec<String> {
        let mut generator = self
            .factory(options)
            .create_model_generator(&Interpretation::new())
            .expect("test units can be grounded");
        let mut models = collect_models(generator.as_mut())
            .into_iter()
            .map(|model| self.registry.format_interpretation(&model))
            .collect::<Vec<_>>();
        models.sort();
        models
    }
}

pub(crate) fn collect_models(generator: &mut dyn ModelGenerator) -> Vec<Interpretation> {
    let mut models = Vec::new();
    while let Some(model) = generator.next_model().expect("test sources never fail") {
        models.push(model);
    }
    models
}

/// `dom(1). dom(2). p(X) :- dom(X), not &even[X]().`
pub(crate) fn even_unit() -> TestUnit {
    let registry = Arc::new(Registry::default());
    let mut sources = SourceTable::default();
    sources.register(&registry, Arc::new(EvenSource));

    let dom = registry.constant("dom");
    let x = registry.variable("X");
    let mut rules = Vec::new();
    for value in [1, 2] {
        let fact = registry.store_ordinary_atom(vec![dom, registry.integer(value)]);
        rules.push(registry.store_rule(Rule::regular(vec![fact], vec![])));
    }
    let even = registry.store_external_atom(registry.constant("even"), vec![x], vec![]);
    let head = registry.store_ordinary_atom(vec![registry.constant("p"), x]);
    let body = registry.store_ordinary_atom(vec![dom, x]);
    rules.push(registry.store_rule(Rule::regular(
        vec![head],
        vec![BodyLiteral::positive(body), BodyLiteral::negative(even)],
    )));

    TestUnit {
        component: ComponentInfo::from_rules(&registry, rules),
        registry,
        sources: Arc::new(sources),
    }
}

/// `p(a) :- &id[p](a).`, whose only answer set is empty.
pub(crate) fn self_support_unit() -> TestUnit {
    let registry = Arc::new(Registry::default());
    let mut sources = SourceTable::default();
    sources.register(&registry, Arc::new(IdentitySource));

    let p = registry.constant("p");
    let a = registry.constant("a");
    let id = registry.store_external_atom(registry.constant("id"), vec![p], vec![a]);
    let head = registry.store_ordinary_atom(vec![p, a]);
    let rules = vec![registry.store_rule(Rule::regular(vec![head], vec![BodyLiteral::positive(id)]))];

    TestUnit {
        component: ComponentInfo::from_rules(&registry, rules),
        registry,
        sources: Arc::new(sources),
    }
}
