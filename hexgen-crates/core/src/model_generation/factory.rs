use std::sync::Arc;

use log::debug;
use log::info;
use log::warn;

use super::GuessAndCheckModelGenerator;
use super::ModelGenerator;
use super::PipelinedModelGenerator;
use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::external::ExternalAtomEvaluator;
use crate::external::SourceTable;
use crate::options::GeneratorKind;
use crate::options::ModelGeneratorOptions;
use crate::oracle::GroundSolverFactory;
use crate::oracle::OracleFactory;
use crate::oracle::SolverOracle;
use crate::program::explore_domains;
use crate::program::AnnotatedGroundProgram;
use crate::program::ComponentInfo;
use crate::program::Grounder;
use crate::program::ProgramRewriter;
use crate::program::RewrittenProgram;
use crate::registry::ExternalAtomId;
use crate::registry::Registry;

/// Creates model generators for one evaluation unit.
///
/// The rules of the unit are rewritten once, when the factory is created; every model generator
/// grounds the rewritten program over its own input.
#[derive(Debug)]
pub struct GuessAndCheckModelGeneratorFactory {
    registry: Arc<Registry>,
    sources: Arc<SourceTable>,
    oracles: Arc<dyn OracleFactory>,
    component: ComponentInfo,
    program: Arc<RewrittenProgram>,
    options: ModelGeneratorOptions,
}

impl GuessAndCheckModelGeneratorFactory {
    pub fn new(
        registry: Arc<Registry>,
        sources: Arc<SourceTable>,
        oracles: Arc<dyn OracleFactory>,
        component: ComponentInfo,
        options: ModelGeneratorOptions,
    ) -> Result<GuessAndCheckModelGeneratorFactory, HexError> {
        if options.flp_check && options.ufs_check {
            warn!("both the FLP and the unfounded set check are enabled; only the FLP check is used");
        }
        if options.min_check && options.generator_kind == GeneratorKind::Pipelined {
            warn!("the pipelined generator does not support collecting all models for the minimality check");
        }

        let program = ProgramRewriter::new(&registry)
            .with_auto_strong_safety(options.auto_strong_safety)
            .with_flp_rewriting(options.flp_check)
            .rewrite(&component)?;

        info!(
            "guess-and-check unit with {} rules, {} inner and {} outer external atoms",
            component.rules.len(),
            component.inner_external_atoms.len(),
            component.outer_external_atoms.len()
        );

        Ok(GuessAndCheckModelGeneratorFactory {
            registry,
            sources,
            oracles,
            component,
            program: Arc::new(program),
            options,
        })
    }

    /// A factory whose generators solve with the [`crate::oracle::GroundSolver`] configured by
    /// `options.oracle_backend`.
    pub fn with_ground_solver(
        registry: Arc<Registry>,
        sources: Arc<SourceTable>,
        component: ComponentInfo,
        options: ModelGeneratorOptions,
    ) -> Result<GuessAndCheckModelGeneratorFactory, HexError> {
        let oracles = Arc::new(GroundSolverFactory::new(options.oracle_backend));
        GuessAndCheckModelGeneratorFactory::new(registry, sources, oracles, component, options)
    }

    pub fn component(&self) -> &ComponentInfo {
        &self.component
    }

    pub fn rewritten_program(&self) -> &RewrittenProgram {
        &self.program
    }

    pub fn options(&self) -> &ModelGeneratorOptions {
        &self.options
    }

    /// Creates a generator for the models of the unit extending `input`.
    pub fn create_model_generator(
        &self,
        input: &Interpretation,
    ) -> Result<Box<dyn ModelGenerator>, HexError> {
        let context = Arc::new(self.prepare(input)?);
        match self.options.generator_kind {
            GeneratorKind::Synchronous => Ok(Box::new(GuessAndCheckModelGenerator::new(context))),
            GeneratorKind::Pipelined => Ok(Box::new(PipelinedModelGenerator::new(context)?)),
        }
    }

    /// Evaluates the outer external atoms, explores the domains of strongly safe guessing rules
    /// and grounds the guessing program over the resulting input.
    pub(crate) fn prepare(&self, input: &Interpretation) -> Result<GenerationContext, HexError> {
        let mut evaluator = ExternalAtomEvaluator::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.sources),
            self.component.external_atoms(),
            self.options.external_learning,
        )?;

        let mut postprocessed = input.clone();
        for &atom in &self.component.outer_external_atoms {
            postprocessed.union_with(&evaluator.true_replacements(atom, input, input)?);
        }
        if self.options.auto_strong_safety {
            let domain = explore_domains(&mut evaluator, &self.program, &postprocessed)?;
            postprocessed.union_with(&domain);
        }

        let ground_program = Grounder::new(&self.registry).ground(&self.program.xgidb, &postprocessed)?;
        evaluator.refresh();
        let program = AnnotatedGroundProgram::new(
            &evaluator,
            ground_program,
            &self.component.inner_external_atoms,
        );

        let mut hidden = postprocessed.clone();
        hidden.union_with(&program.replacement_atoms());
        let check_minimality = program.needs_minimality_check()
            || (self.oracles.treats_disjunctions_as_choices() && self.component.has_disjunctive_rules);
        debug!(
            "ground guessing program has {} rules over {} atoms; head cycles: {}, external cycles: {}",
            program.ground_program().rules.len(),
            program.program_mask().count(),
            program.has_head_cycles(),
            program.has_external_cycles()
        );

        Ok(GenerationContext {
            registry: Arc::clone(&self.registry),
            evaluator: Arc::new(evaluator),
            rewritten: Arc::clone(&self.program),
            program: Arc::new(program),
            oracles: Arc::clone(&self.oracles),
            options: self.options.clone(),
            inner_external_atoms: self.component.inner_external_atoms.clone(),
            input: postprocessed,
            hidden,
            check_minimality,
        })
    }
}

/// The state shared by everything a single model generator runs.
#[derive(Debug)]
pub(crate) struct GenerationContext {
    pub(crate) registry: Arc<Registry>,
    pub(crate) evaluator: Arc<ExternalAtomEvaluator>,
    pub(crate) rewritten: Arc<RewrittenProgram>,
    /// The ground guessing program.
    pub(crate) program: Arc<AnnotatedGroundProgram>,
    pub(crate) oracles: Arc<dyn OracleFactory>,
    pub(crate) options: ModelGeneratorOptions,
    pub(crate) inner_external_atoms: Vec<ExternalAtomId>,
    /// The input of the generator, extended with the outputs of the outer external atoms and the
    /// domain facts.
    pub(crate) input: Interpretation,
    /// The input and the replacement atoms, which are removed from every model.
    pub(crate) hidden: Interpretation,
    /// Whether compatible sets may fail to be minimal.
    pub(crate) check_minimality: bool,
}

impl GenerationContext {
    pub(crate) fn learning_enabled(&self) -> bool {
        !self.options.external_learning.is_empty()
    }

    pub(crate) fn create_oracle(&self) -> Box<dyn SolverOracle> {
        self.oracles
            .create_oracle(Arc::clone(&self.registry), self.program.ground_program())
    }

    /// Removes the input and the replacement atoms from a verified candidate.
    pub(crate) fn to_model(&self, candidate: &Interpretation) -> Interpretation {
        candidate.difference(&self.hidden)
    }
}
