use std::sync::Arc;

use super::InputType;
use super::SourceTable;
use crate::basic_types::HexError;
use crate::basic_types::Interpretation;
use crate::containers::HashMap;
use crate::registry::AtomId;
use crate::registry::ExternalAtomId;
use crate::registry::PredicateMask;
use crate::registry::Registry;

/// The masks of one external atom occurrence.
#[derive(Clone, Debug)]
struct ExternalAtomMasks {
    /// Atoms of the predicates passed as predicate inputs.
    input: PredicateMask,
    /// Atoms of the positive and negative replacement predicates.
    replacements: PredicateMask,
}

/// Owns the lazily computed masks of external atoms.
///
/// The atom descriptors in the [`Registry`] are immutable; everything that grows as new ground
/// atoms appear lives here and is only brought up to date by an explicit
/// [`InputMaskCache::refresh`].
#[derive(Clone, Debug)]
pub struct InputMaskCache {
    registry: Arc<Registry>,
    masks: HashMap<ExternalAtomId, ExternalAtomMasks>,
}

impl InputMaskCache {
    pub fn new(registry: Arc<Registry>) -> InputMaskCache {
        InputMaskCache {
            registry,
            masks: HashMap::default(),
        }
    }

    /// Starts tracking `id`, checking its arities against the registered source.
    pub fn register(&mut self, id: ExternalAtomId, sources: &SourceTable) -> Result<(), HexError> {
        if self.masks.contains_key(&id) {
            return Ok(());
        }

        let atom = self.registry.external_atom(id);
        let source = sources.source(&self.registry, atom.predicate)?;
        let name = self.registry.term(atom.predicate).to_string();

        if source.input_types().len() != atom.inputs.len() {
            return Err(HexError::ArityMismatch {
                predicate: name,
                position: "input",
                expected: source.input_types().len(),
                actual: atom.inputs.len(),
            });
        }
        if source.output_arity() != atom.outputs.len() {
            return Err(HexError::ArityMismatch {
                predicate: name,
                position: "output",
                expected: source.output_arity(),
                actual: atom.outputs.len(),
            });
        }

        let mut input = PredicateMask::new(Arc::clone(&self.registry));
        for (&term, input_type) in atom.inputs.iter().zip(source.input_types()) {
            if *input_type != InputType::Predicate {
                continue;
            }
            if self.registry.is_variable(term) {
                return Err(HexError::UnsupportedRule {
                    rule: self.registry.format_atom(AtomId::External(id)),
                    reason: "predicate inputs must be constants".to_owned(),
                });
            }
            input.add_predicate(term);
        }

        let mut replacements = PredicateMask::new(Arc::clone(&self.registry));
        replacements.add_predicate(atom.replacement_positive);
        replacements.add_predicate(atom.replacement_negative);

        let _ = self.masks.insert(id, ExternalAtomMasks { input, replacements });
        Ok(())
    }

    /// Brings every mask up to date with the ground atoms currently in the registry.
    pub fn refresh(&mut self) {
        for masks in self.masks.values_mut() {
            masks.input.update_mask();
            masks.replacements.update_mask();
        }
    }

    /// The predicate input atoms of `id` as of the last refresh.
    pub fn input_mask(&self, id: ExternalAtomId) -> &Interpretation {
        self.masks[&id].input.mask()
    }

    /// The replacement atoms of `id` as of the last refresh.
    pub fn replacement_mask(&self, id: ExternalAtomId) -> &Interpretation {
        self.masks[&id].replacements.mask()
    }
}
