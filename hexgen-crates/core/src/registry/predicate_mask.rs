use std::sync::Arc;

use super::Registry;
use super::TermId;
use crate::basic_types::Interpretation;
use crate::containers::HashSet;

/// The set of ground atoms whose predicate is one of a registered set of predicates.
///
/// The mask is updated lazily: [`PredicateMask::update_mask`] only inspects the ground atoms
/// registered since the previous update. Registering a new predicate scans the atoms below that
/// high-water mark for the new predicate alone.
///
/// Updating needs `&mut self`; each mask therefore has a single writer, which is the component
/// owning it for the current solving episode. Readers receive the bitset through
/// [`PredicateMask::mask`] after the writer has updated it.
#[derive(Clone, Debug)]
pub struct PredicateMask {
    registry: Arc<Registry>,
    predicates: HashSet<TermId>,
    mask: Interpretation,
    known_addresses: usize,
}

impl PredicateMask {
    pub fn new(registry: Arc<Registry>) -> PredicateMask {
        PredicateMask {
            registry,
            predicates: HashSet::default(),
            mask: Interpretation::new(),
            known_addresses: 0,
        }
    }

    pub fn add_predicate(&mut self, predicate: TermId) {
        if !self.predicates.insert(predicate) {
            return;
        }
        let mask = &mut self.mask;
        self.registry
            .visit_ground_atoms(0..self.known_addresses, |address, atom| {
                if atom.predicate() == predicate {
                    mask.set_fact(address);
                }
            });
    }

    pub fn contains_predicate(&self, predicate: TermId) -> bool {
        self.predicates.contains(&predicate)
    }

    /// Sets the bits of all ground atoms of registered predicates which were stored since the
    /// last update.
    pub fn update_mask(&mut self) {
        let from = self.known_addresses;
        if from >= self.registry.num_ground_atoms() || self.predicates.is_empty() {
            self.known_addresses = from.max(self.registry.num_ground_atoms());
            return;
        }

        let mut seen = from;
        let predicates = &self.predicates;
        let mask = &mut self.mask;
        self.registry.visit_ground_atoms(from..usize::MAX, |address, atom| {
            if predicates.contains(&atom.predicate()) {
                mask.set_fact(address);
            }
            seen += 1;
        });
        self.known_addresses = seen;
    }

    pub fn mask(&self) -> &Interpretation {
        &self.mask
    }

    /// Updates the mask and projects `interpretation` onto it.
    pub fn project(&mut self, interpretation: &Interpretation) -> Interpretation {
        self.update_mask();
        interpretation.intersection(&self.mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_only_covers_registered_predicates() {
        let registry = Arc::new(Registry::default());
        let p = registry.constant("p");
        let q = registry.constant("q");
        let one = registry.integer(1);
        let p1 = registry.store_ground_atom(vec![p, one]);
        let _q1 = registry.store_ground_atom(vec![q, one]);

        let mut mask = PredicateMask::new(Arc::clone(&registry));
        mask.add_predicate(p);
        mask.update_mask();

        assert_eq!(mask.mask(), &Interpretation::from_atoms([p1]));
    }

    #[test]
    fn atoms_stored_after_an_update_are_picked_up() {
        let registry = Arc::new(Registry::default());
        let p = registry.constant("p");
        let mut mask = PredicateMask::new(Arc::clone(&registry));
        mask.add_predicate(p);
        mask.update_mask();
        assert!(mask.mask().is_empty());

        let p2 = registry.store_ground_atom(vec![p, registry.integer(2)]);
        mask.update_mask();

        assert_eq!(mask.mask(), &Interpretation::from_atoms([p2]));
    }

    #[test]
    fn late_predicates_cover_earlier_atoms() {
        let registry = Arc::new(Registry::default());
        let p = registry.constant("p");
        let q = registry.constant("q");
        let q1 = registry.store_ground_atom(vec![q, registry.integer(1)]);

        let mut mask = PredicateMask::new(Arc::clone(&registry));
        mask.add_predicate(p);
        mask.update_mask();
        mask.add_predicate(q);
        mask.update_mask();

        assert_eq!(mask.mask(), &Interpretation::from_atoms([q1]));
    }

    #[test]
    fn adding_a_predicate_keeps_the_high_water_mark() {
        let registry = Arc::new(Registry::default());
        let p = registry.constant("p");
        let q = registry.constant("q");
        let p1 = registry.store_ground_atom(vec![p, registry.integer(1)]);
        let q1 = registry.store_ground_atom(vec![q, registry.integer(1)]);

        let mut mask = PredicateMask::new(Arc::clone(&registry));
        mask.add_predicate(p);
        mask.update_mask();
        let known = mask.known_addresses;
        mask.add_predicate(q);

        assert_eq!(mask.known_addresses, known);
        assert_eq!(mask.mask(), &Interpretation::from_atoms([p1, q1]));
    }
}
