#![allow(dead_code, reason = "every test binary uses a different part of the helpers")]
//! A small DSL for building evaluation units, the external sources used by the integration tests
//! and a scripted oracle.
use std::collections::VecDeque;
use std::sync::Arc;

use enumset::EnumSet;
use hexgen_core::basic_types::AtomAddress;
use hexgen_core::basic_types::EvaluationError;
use hexgen_core::basic_types::Nogood;
use hexgen_core::external::ExternalAtomEvaluator;
use hexgen_core::external::ExternalSource;
use hexgen_core::external::InputType;
use hexgen_core::external::Query;
use hexgen_core::external::SourceTable;
use hexgen_core::options::GeneratorKind;
use hexgen_core::oracle::ExternalPropagator;
use hexgen_core::oracle::ModelSearchResult;
use hexgen_core::oracle::NogoodInbox;
use hexgen_core::oracle::OracleFactory;
use hexgen_core::oracle::PropagatorId;
use hexgen_core::oracle::SolverOracle;
use hexgen_core::oracle::TerminationCondition;
use hexgen_core::program::AnnotatedGroundProgram;
use hexgen_core::program::ComponentInfo;
use hexgen_core::program::GroundProgram;
use hexgen_core::program::Grounder;
use hexgen_core::program::ProgramRewriter;
use hexgen_core::program::RewrittenProgram;
use hexgen_core::registry::AtomId;
use hexgen_core::registry::BodyLiteral;
use hexgen_core::registry::BuiltinAtom;
use hexgen_core::registry::BuiltinOperator;
use hexgen_core::registry::ExternalAtomId;
use hexgen_core::registry::Registry;
use hexgen_core::registry::Rule;
use hexgen_core::registry::RuleId;
use hexgen_core::registry::Term;
use hexgen_core::registry::TermId;
use hexgen_core::GuessAndCheckModelGeneratorFactory;
use hexgen_core::HexError;
use hexgen_core::Interpretation;
use hexgen_core::ModelGenerator;
use hexgen_core::ModelGeneratorOptions;

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn synchronous() -> ModelGeneratorOptions {
    ModelGeneratorOptions {
        generator_kind: GeneratorKind::Synchronous,
        ..Default::default()
    }
}

pub(crate) fn pipelined() -> ModelGeneratorOptions {
    ModelGeneratorOptions {
        generator_kind: GeneratorKind::Pipelined,
        ..Default::default()
    }
}

pub(crate) fn pos(atom: AtomId) -> BodyLiteral {
    BodyLiteral::positive(atom)
}

pub(crate) fn neg(atom: AtomId) -> BodyLiteral {
    BodyLiteral::negative(atom)
}

/// Collects the models of `generator` until it is exhausted or fails.
pub(crate) fn collect_models(generator: &mut dyn ModelGenerator) -> Result<Vec<Interpretation>, HexError> {
    let mut models = Vec::new();
    while let Some(model) = generator.next_model()? {
        models.push(model);
    }
    Ok(models)
}

/// Builds the rules of one evaluation unit.
///
/// Arguments are parsed like in the usual concrete syntax: integers, variables starting with an
/// upper case letter, and constants otherwise.
#[derive(Debug)]
pub(crate) struct ProgramBuilder {
    pub(crate) registry: Arc<Registry>,
    sources: SourceTable,
    rules: Vec<RuleId>,
}

impl ProgramBuilder {
    pub(crate) fn new() -> ProgramBuilder {
        init_logging();
        ProgramBuilder {
            registry: Arc::new(Registry::default()),
            sources: SourceTable::default(),
            rules: Vec::new(),
        }
    }

    pub(crate) fn with_source(mut self, source: impl ExternalSource + 'static) -> ProgramBuilder {
        self.sources.register(&self.registry, Arc::new(source));
        self
    }

    pub(crate) fn term(&self, text: &str) -> TermId {
        if let Ok(value) = text.parse::<i64>() {
            self.registry.integer(value)
        } else if text.starts_with(|c: char| c.is_ascii_uppercase()) {
            self.registry.variable(text)
        } else {
            self.registry.constant(text)
        }
    }

    fn terms(&self, texts: &[&str]) -> Vec<TermId> {
        texts.iter().map(|text| self.term(text)).collect()
    }

    pub(crate) fn atom(&self, predicate: &str, arguments: &[&str]) -> AtomId {
        let mut tuple = vec![self.registry.constant(predicate)];
        tuple.extend(self.terms(arguments));
        self.registry.store_ordinary_atom(tuple)
    }

    pub(crate) fn external(&self, predicate: &str, inputs: &[&str], outputs: &[&str]) -> AtomId {
        self.registry.store_external_atom(
            self.registry.constant(predicate),
            self.terms(inputs),
            self.terms(outputs),
        )
    }

    pub(crate) fn builtin(&self, left: &str, operator: BuiltinOperator, right: &str) -> AtomId {
        self.registry.store_builtin_atom(BuiltinAtom {
            operator,
            left: self.term(left),
            right: self.term(right),
        })
    }

    pub(crate) fn fact(&mut self, predicate: &str, arguments: &[&str]) -> &mut ProgramBuilder {
        let head = self.atom(predicate, arguments);
        self.rule(vec![head], vec![])
    }

    pub(crate) fn rule(&mut self, head: Vec<AtomId>, body: Vec<BodyLiteral>) -> &mut ProgramBuilder {
        self.rules.push(self.registry.store_rule(Rule::regular(head, body)));
        self
    }

    pub(crate) fn constraint(&mut self, body: Vec<BodyLiteral>) -> &mut ProgramBuilder {
        self.rules.push(self.registry.store_rule(Rule::constraint(body)));
        self
    }

    pub(crate) fn component(&self) -> ComponentInfo {
        ComponentInfo::from_rules(&self.registry, self.rules.clone())
    }

    pub(crate) fn sources(&self) -> Arc<SourceTable> {
        Arc::new(self.sources.clone())
    }

    pub(crate) fn factory(&self, options: ModelGeneratorOptions) -> GuessAndCheckModelGeneratorFactory {
        GuessAndCheckModelGeneratorFactory::with_ground_solver(
            Arc::clone(&self.registry),
            self.sources(),
            self.component(),
            options,
        )
        .expect("test programs can be rewritten")
    }

    pub(crate) fn factory_with_oracle(
        &self,
        oracles: Arc<dyn OracleFactory>,
        options: ModelGeneratorOptions,
    ) -> GuessAndCheckModelGeneratorFactory {
        GuessAndCheckModelGeneratorFactory::new(
            Arc::clone(&self.registry),
            self.sources(),
            oracles,
            self.component(),
            options,
        )
        .expect("test programs can be rewritten")
    }

    pub(crate) fn generator(&self, options: ModelGeneratorOptions) -> Box<dyn ModelGenerator> {
        self.factory(options)
            .create_model_generator(&Interpretation::new())
            .expect("test programs can be grounded")
    }

    /// The models of the unit without input, formatted and sorted.
    pub(crate) fn models(&self, options: ModelGeneratorOptions) -> Vec<String> {
        let mut generator = self.generator(options);
        let mut models = collect_models(generator.as_mut())
            .expect("test sources never fail")
            .iter()
            .map(|model| self.registry.format_interpretation(model))
            .collect::<Vec<_>>();
        models.sort();
        models
    }

    pub(crate) fn ground(&self, predicate: &str, arguments: &[&str]) -> AtomAddress {
        let mut tuple = vec![self.registry.constant(predicate)];
        tuple.extend(self.terms(arguments));
        self.registry.store_ground_atom(tuple)
    }

    pub(crate) fn interpretation(&self, atoms: &[(&str, &[&str])]) -> Interpretation {
        atoms
            .iter()
            .map(|&(predicate, arguments)| self.ground(predicate, arguments))
            .collect()
    }

    /// Rewrites and grounds the unit without input, the way a model generator prepares it.
    pub(crate) fn ground_unit(&self) -> GroundUnit {
        let component = self.component();
        let rewritten = ProgramRewriter::new(&self.registry)
            .rewrite(&component)
            .expect("test programs can be rewritten");
        let mut evaluator = ExternalAtomEvaluator::new(
            Arc::clone(&self.registry),
            self.sources(),
            component.external_atoms(),
            EnumSet::empty(),
        )
        .expect("all sources are registered");
        let ground_program = Grounder::new(&self.registry)
            .ground(&rewritten.xgidb, &Interpretation::new())
            .expect("test programs can be grounded");
        evaluator.refresh();
        let program = AnnotatedGroundProgram::new(&evaluator, ground_program, &component.inner_external_atoms);

        GroundUnit {
            rewritten: Arc::new(rewritten),
            evaluator,
            program,
            inner_external_atoms: component.inner_external_atoms,
        }
    }
}

#[derive(Debug)]
pub(crate) struct GroundUnit {
    pub(crate) rewritten: Arc<RewrittenProgram>,
    pub(crate) evaluator: ExternalAtomEvaluator,
    pub(crate) program: AnnotatedGroundProgram,
    pub(crate) inner_external_atoms: Vec<ExternalAtomId>,
}

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

/// `&succ[N](M)` holds for `M = N + 1`.
#[derive(Debug)]
pub(crate) struct SuccessorSource;

impl ExternalSource for SuccessorSource {
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
            Term::Integer(value) => Ok(vec![vec![query.registry.integer(value + 1)]]),
            _ => Ok(vec![]),
        }
    }
}

/// `&fail[X]()` fails on every call.
#[derive(Debug)]
pub(crate) struct FailingSource;

impl ExternalSource for FailingSource {
    fn name(&self) -> &str {
        "fail"
    }

    fn input_types(&self) -> &[InputType] {
        &[InputType::Constant]
    }

    fn output_arity(&self) -> usize {
        0
    }

    fn retrieve(&self, _query: &Query<'_>) -> Result<Vec<Vec<TermId>>, EvaluationError> {
        Err(EvaluationError::new("fail", "source unavailable"))
    }
}

/// Creates [`ScriptedOracle`]s reporting a fixed sequence of candidates.
#[derive(Debug)]
pub(crate) struct ScriptedOracleFactory {
    pub(crate) candidates: Vec<Interpretation>,
    /// Repeat the sequence forever instead of exhausting after it.
    pub(crate) endless: bool,
}

impl OracleFactory for ScriptedOracleFactory {
    fn create_oracle(&self, _registry: Arc<Registry>, _program: &GroundProgram) -> Box<dyn SolverOracle> {
        Box::new(ScriptedOracle {
            script: self.candidates.clone(),
            pending: self.candidates.iter().cloned().collect(),
            endless: self.endless,
            inbox: NogoodInbox::default(),
            nogoods: Vec::new(),
            propagators: Vec::new(),
        })
    }
}

/// An oracle which ignores its program and reports the candidates of its script in order. It
/// honours the termination condition before every candidate.
#[derive(Debug)]
pub(crate) struct ScriptedOracle {
    script: Vec<Interpretation>,
    pending: VecDeque<Interpretation>,
    endless: bool,
    inbox: NogoodInbox,
    nogoods: Vec<Nogood>,
    propagators: Vec<Option<Box<dyn ExternalPropagator>>>,
}

impl SolverOracle for ScriptedOracle {
    fn next_model(
        &mut self,
        termination: &mut dyn TerminationCondition,
    ) -> Result<ModelSearchResult, HexError> {
        self.nogoods.extend(self.inbox.drain());
        if termination.should_stop() {
            return Ok(ModelSearchResult::Unknown);
        }
        if self.pending.is_empty() && self.endless {
            self.pending = self.script.iter().cloned().collect();
        }
        Ok(self
            .pending
            .pop_front()
            .map_or(ModelSearchResult::Exhausted, ModelSearchResult::Model))
    }

    fn add_nogood(&mut self, nogood: Nogood) {
        self.nogoods.push(nogood);
    }

    fn nogood_inbox(&self) -> NogoodInbox {
        self.inbox.clone()
    }

    fn add_propagator(&mut self, propagator: Box<dyn ExternalPropagator>) -> PropagatorId {
        self.propagators.push(Some(propagator));
        PropagatorId(self.propagators.len() as u32 - 1)
    }

    fn remove_propagator(&mut self, id: PropagatorId) -> Option<Box<dyn ExternalPropagator>> {
        self.propagators.get_mut(id.0 as usize)?.take()
    }

    fn propagator(&self, id: PropagatorId) -> Option<&dyn ExternalPropagator> {
        self.propagators.get(id.0 as usize)?.as_deref()
    }

    fn propagator_mut(&mut self, id: PropagatorId) -> Option<&mut dyn ExternalPropagator> {
        let propagator: &mut dyn ExternalPropagator = self.propagators.get_mut(id.0 as usize)?.as_mut()?.as_mut();
        Some(propagator)
    }

    fn statistics(&self) -> String {
        format!("{} nogoods received", self.nogoods.len())
    }
}

/// `dom(1). dom(2). p(X) :- dom(X), not &even[X]().`
pub(crate) fn even_program() -> ProgramBuilder {
    let mut builder = ProgramBuilder::new().with_source(EvenSource);
    let _ = builder.fact("dom", &["1"]).fact("dom", &["2"]);
    let head = builder.atom("p", &["X"]);
    let dom = builder.atom("dom", &["X"]);
    let even = builder.external("even", &["X"], &[]);
    let _ = builder.rule(vec![head], vec![pos(dom), neg(even)]);
    builder
}

/// `p(a) :- &id[p](a).`
pub(crate) fn self_support_program() -> ProgramBuilder {
    let mut builder = ProgramBuilder::new().with_source(IdentitySource);
    let head = builder.atom("p", &["a"]);
    let id = builder.external("id", &["p"], &["a"]);
    let _ = builder.rule(vec![head], vec![pos(id)]);
    builder
}
