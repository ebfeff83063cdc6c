use std::sync::Arc;

use log::debug;
use log::trace;

use super::is_compatible_set;
use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::basic_types::NogoodSink;
use crate::basic_types::reborrow_sink;
use crate::containers::HashMap;
use crate::containers::HashSet;
use crate::external::ExternalAtomEvaluator;
use crate::hexgen_assert_moderate;
use crate::oracle::Indefinite;
use crate::oracle::ModelSearchResult;
use crate::oracle::OracleFactory;
use crate::program::AnnotatedGroundProgram;
use crate::program::Grounder;
use crate::program::RewrittenProgram;
use crate::registry::BodyLiteral;
use crate::registry::ExternalAtomId;
use crate::registry::Registry;
use crate::registry::Rule;
use crate::registry::RuleId;
use crate::registry::Term;
use crate::registry::TermId;

/// Rules which restrict the models of the reduct to proper subsets of the candidate.
///
/// Every predicate `p` of the unit gets a shadow predicate `p_s` holding a copy of the
/// candidate, together with `:- p(X), not p_s(X).`, `smaller :- p_s(X), not p(X).` and
/// `:- not smaller.`
#[derive(Clone, Debug)]
struct ShadowEncoding {
    shadows: HashMap<TermId, TermId>,
    rules: Vec<RuleId>,
}

impl ShadowEncoding {
    fn new(registry: &Registry, predicates: &[(TermId, usize)]) -> ShadowEncoding {
        let names = predicates
            .iter()
            .map(|&(predicate, _)| registry.term(predicate).to_string())
            .collect::<Vec<_>>();
        let postfix = Self::unique_postfix(registry, &names);

        let smaller = registry.store_ordinary_atom(vec![registry.fresh_constant("smaller")]);
        let mut shadows = HashMap::default();
        let mut rules = Vec::new();
        for (&(predicate, arity), name) in predicates.iter().zip(&names) {
            let shadow = *shadows
                .entry(predicate)
                .or_insert_with(|| registry.constant(&format!("{name}{postfix}")));
            let variables = (0..arity)
                .map(|index| registry.variable(&format!("X{index}")))
                .collect::<Vec<_>>();

            let original = registry.store_ordinary_atom(
                std::iter::once(predicate)
                    .chain(variables.iter().copied())
                    .collect(),
            );
            let copy = registry.store_ordinary_atom(
                std::iter::once(shadow)
                    .chain(variables.iter().copied())
                    .collect(),
            );

            rules.push(registry.store_rule(Rule::constraint(vec![
                BodyLiteral::positive(original),
                BodyLiteral::negative(copy),
            ])));
            rules.push(registry.store_rule(Rule::regular(
                vec![smaller],
                vec![BodyLiteral::positive(copy), BodyLiteral::negative(original)],
            )));
        }
        rules.push(registry.store_rule(Rule::constraint(vec![BodyLiteral::negative(smaller)])));

        ShadowEncoding { shadows, rules }
    }

    /// `_shadow`, or `_shadow<n>` for the smallest `n` such that no predicate name ends with the
    /// postfix and no shadow name is taken.
    fn unique_postfix(registry: &Registry, names: &[String]) -> String {
        let is_free = |postfix: &str| {
            names.iter().all(|name| {
                !name.ends_with(postfix)
                    && registry
                        .lookup_term(&Term::Constant(format!("{name}{postfix}")))
                        .is_none()
            })
        };

        let mut postfix = "_shadow".to_owned();
        let mut counter = 0_usize;
        while !is_free(&postfix) {
            postfix = format!("_shadow{counter}");
            counter += 1;
        }
        postfix
    }

    fn shadow_facts(&self, registry: &Registry, candidate: &Interpretation) -> Interpretation {
        candidate
            .atoms()
            .filter_map(|address| {
                let mut tuple = registry.ground_atom(address).tuple;
                let shadow = *self.shadows.get(&tuple[0])?;
                tuple[0] = shadow;
                Some(registry.store_ground_atom(tuple))
            })
            .collect()
    }
}

/// Decides whether compatible candidates are subset-minimal models of their FLP reduct.
///
/// The FLP-head program determines which rule bodies the candidate satisfies; the FLP-body
/// program together with the guessing rules then simulates the reduct. A compatible model of
/// the reduct which is a proper subset of the candidate rejects it. With the shadow encoding
/// the subset test is part of the reduct program and a single compatible model suffices;
/// otherwise all models of the reduct are enumerated and compared.
#[derive(Debug)]
pub struct FlpChecker {
    registry: Arc<Registry>,
    program: Arc<RewrittenProgram>,
    oracles: Arc<dyn OracleFactory>,
    external_atoms: Vec<ExternalAtomId>,
    flp_predicates: HashSet<TermId>,
    shadow: Option<ShadowEncoding>,
}

impl FlpChecker {
    /// `input` is the input of the unit, whose predicates are shadowed as well.
    pub fn new(
        registry: Arc<Registry>,
        program: Arc<RewrittenProgram>,
        oracles: Arc<dyn OracleFactory>,
        external_atoms: Vec<ExternalAtomId>,
        input: &Interpretation,
        encode_minimality_check: bool,
    ) -> FlpChecker {
        let flp_predicates = program.flp_predicates.iter().copied().collect::<HashSet<_>>();
        let shadow = encode_minimality_check.then(|| {
            let predicates = Self::shadowed_predicates(&registry, &program, &flp_predicates, input);
            ShadowEncoding::new(&registry, &predicates)
        });

        FlpChecker {
            registry,
            program,
            oracles,
            external_atoms,
            flp_predicates,
            shadow,
        }
    }

    pub fn encodes_minimality_check(&self) -> bool {
        self.shadow.is_some()
    }

    /// The ordinary predicates, with their arities, of the input and of the reduct program.
    fn shadowed_predicates(
        registry: &Registry,
        program: &RewrittenProgram,
        flp_predicates: &HashSet<TermId>,
        input: &Interpretation,
    ) -> Vec<(TermId, usize)> {
        let is_plain =
            |predicate: TermId| registry.auxiliary_origin(predicate).is_none() && !flp_predicates.contains(&predicate);

        let mut predicates = input
            .atoms()
            .map(|address| registry.ground_atom(address))
            .filter(|atom| is_plain(atom.predicate()))
            .map(|atom| (atom.predicate(), atom.arity()))
            .collect::<Vec<_>>();
        for &id in &program.flp_body {
            let rule = registry.rule(id);
            let atoms = rule
                .head
                .iter()
                .copied()
                .chain(rule.body.iter().map(|literal| literal.atom));
            for atom in atoms.filter_map(|atom| registry.ordinary_atom(atom)) {
                if is_plain(atom.predicate()) {
                    predicates.push((atom.predicate(), atom.arity()));
                }
            }
        }
        predicates.sort();
        predicates.dedup();
        predicates
    }

    fn is_plain_atom(&self, predicate: TermId) -> bool {
        self.registry.auxiliary_origin(predicate).is_none() && !self.flp_predicates.contains(&predicate)
    }

    /// Whether `candidate`, a compatible set extending `input`, is a subset-minimal model of its
    /// FLP reduct. Nogoods learned while checking models of the reduct for compatibility are
    /// written to `nogoods`.
    pub fn is_subset_minimal_flp_model(
        &self,
        evaluator: &ExternalAtomEvaluator,
        candidate: &Interpretation,
        input: &Interpretation,
        mut nogoods: Option<&mut dyn NogoodSink>,
    ) -> Result<bool, HexError> {
        let grounder = Grounder::new(&self.registry);
        let satisfied_bodies = self.satisfied_bodies(&grounder, candidate)?;

        let mut edb = input.union(&satisfied_bodies);
        let mut rules = self
            .program
            .flp_body
            .iter()
            .chain(&self.program.gidb)
            .copied()
            .collect::<Vec<_>>();
        if let Some(shadow) = &self.shadow {
            edb.union_with(&shadow.shadow_facts(&self.registry, candidate));
            rules.extend_from_slice(&shadow.rules);
        }

        let reduct = grounder.ground(&rules, &edb)?;
        let reduct = AnnotatedGroundProgram::new(evaluator, reduct, &self.external_atoms);
        let mut oracle = self
            .oracles
            .create_oracle(Arc::clone(&self.registry), reduct.ground_program());

        let plain_candidate = self.project(candidate, input);
        loop {
            let model = match oracle.next_model(&mut Indefinite)? {
                ModelSearchResult::Model(model) => model,
                ModelSearchResult::Exhausted | ModelSearchResult::Unknown => {
                    trace!("candidate is a minimal model of its reduct");
                    return Ok(true);
                }
            };

            if !is_compatible_set(evaluator, &reduct, &model, reborrow_sink(&mut nogoods))? {
                continue;
            }
            if self.shadow.is_some() || self.project(&model, input).is_proper_subset_of(&plain_candidate) {
                debug!("candidate rejected: its reduct has a smaller compatible model");
                return Ok(false);
            }
        }
    }

    /// Solves the FLP-head program with `candidate` as facts and returns the derived `flp`
    /// atoms. All answer sets of the program agree on them.
    fn satisfied_bodies(&self, grounder: &Grounder<'_>, candidate: &Interpretation) -> Result<Interpretation, HexError> {
        let head_program = grounder.ground(&self.program.flp_head, candidate)?;
        let mut oracle = self
            .oracles
            .create_oracle(Arc::clone(&self.registry), &head_program);

        let satisfied = match oracle.next_model(&mut Indefinite)? {
            ModelSearchResult::Model(model) => self.flp_atoms(&model),
            ModelSearchResult::Exhausted | ModelSearchResult::Unknown => {
                hexgen_assert_moderate!(false, "the FLP head program has no answer set");
                return Err(HexError::InconsistentFlpHead(0));
            }
        };
        while let ModelSearchResult::Model(model) = oracle.next_model(&mut Indefinite)? {
            if self.flp_atoms(&model) != satisfied {
                hexgen_assert_moderate!(false, "the FLP head program derives different bodies");
                return Err(HexError::InconsistentFlpHead(2));
            }
        }

        Ok(satisfied)
    }

    fn flp_atoms(&self, model: &Interpretation) -> Interpretation {
        model
            .atoms()
            .filter(|&address| {
                self.flp_predicates
                    .contains(&self.registry.ground_atom_predicate(address))
            })
            .collect()
    }

    /// Removes replacement, `flp` and input atoms.
    fn project(&self, interpretation: &Interpretation, input: &Interpretation) -> Interpretation {
        interpretation
            .difference(input)
            .atoms()
            .filter(|&address| self.is_plain_atom(self.registry.ground_atom_predicate(address)))
            .collect()
    }
}
