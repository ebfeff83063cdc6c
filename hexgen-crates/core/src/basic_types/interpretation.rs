use std::fmt::Debug;
use std::fmt::Formatter;
use std::hash::Hash;
use std::hash::Hasher;

use fixedbitset::FixedBitSet;

use crate::containers::StorageKey;
use crate::storage_key;

storage_key!(
    /// The stable address of a ground atom in the [`Registry`](crate::registry::Registry).
    AtomAddress
);

/// A set of ground atoms, represented as a bitset indexed by [`AtomAddress`].
///
/// The bitset grows on demand when atoms beyond its current length are set; reading an address
/// beyond the length yields `false`. Equality and hashing only consider the set bits, so two
/// interpretations with different capacities but the same atoms are equal.
#[derive(Clone, Default)]
pub struct Interpretation {
    bits: FixedBitSet,
}

impl Interpretation {
    pub fn new() -> Self {
        Interpretation::default()
    }

    pub fn with_capacity(num_atoms: usize) -> Self {
        Interpretation {
            bits: FixedBitSet::with_capacity(num_atoms),
        }
    }

    pub fn from_atoms(atoms: impl IntoIterator<Item = AtomAddress>) -> Self {
        let mut interpretation = Interpretation::new();
        for atom in atoms {
            interpretation.set_fact(atom);
        }
        interpretation
    }

    pub fn set_fact(&mut self, atom: AtomAddress) {
        let index = atom.index();
        if index >= self.bits.len() {
            self.bits.grow(index + 1);
        }
        self.bits.insert(index);
    }

    pub fn clear_fact(&mut self, atom: AtomAddress) {
        let index = atom.index();
        if index < self.bits.len() {
            self.bits.set(index, false);
        }
    }

    pub fn set_value(&mut self, atom: AtomAddress, value: bool) {
        if value {
            self.set_fact(atom);
        } else {
            self.clear_fact(atom);
        }
    }

    pub fn get_fact(&self, atom: AtomAddress) -> bool {
        self.bits.contains(atom.index())
    }

    pub fn clear(&mut self) {
        self.bits.clear();
    }

    pub fn union_with(&mut self, other: &Interpretation) {
        self.bits.union_with(&other.bits);
    }

    pub fn difference_with(&mut self, other: &Interpretation) {
        self.bits.difference_with(&other.bits);
    }

    pub fn intersect_with(&mut self, other: &Interpretation) {
        self.bits.intersect_with(&other.bits);
    }

    /// Returns `self ∩ other` as a new interpretation.
    pub fn intersection(&self, other: &Interpretation) -> Interpretation {
        let mut result = self.clone();
        result.intersect_with(other);
        result
    }

    /// Returns `self \ other` as a new interpretation.
    pub fn difference(&self, other: &Interpretation) -> Interpretation {
        let mut result = self.clone();
        result.difference_with(other);
        result
    }

    pub fn union(&self, other: &Interpretation) -> Interpretation {
        let mut result = self.clone();
        result.union_with(other);
        result
    }

    pub fn is_subset_of(&self, other: &Interpretation) -> bool {
        self.bits.is_subset(&other.bits)
    }

    pub fn is_proper_subset_of(&self, other: &Interpretation) -> bool {
        self.is_subset_of(other) && !other.is_subset_of(self)
    }

    pub fn is_disjoint(&self, other: &Interpretation) -> bool {
        self.bits.is_disjoint(&other.bits)
    }

    pub fn count(&self) -> usize {
        self.bits.count_ones(..)
    }

    pub fn is_empty(&self) -> bool {
        self.bits.ones().next().is_none()
    }

    /// Iterates over the true atoms in increasing address order.
    pub fn atoms(&self) -> impl Iterator<Item = AtomAddress> + '_ {
        self.bits.ones().map(AtomAddress::create_from_index)
    }
}

impl PartialEq for Interpretation {
    fn eq(&self, other: &Self) -> bool {
        self.is_subset_of(other) && other.is_subset_of(self)
    }
}

impl Eq for Interpretation {}

impl Hash for Interpretation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for index in self.bits.ones() {
            index.hash(state);
        }
    }
}

impl Debug for Interpretation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.bits.ones()).finish()
    }
}

impl FromIterator<AtomAddress> for Interpretation {
    fn from_iter<T: IntoIterator<Item = AtomAddress>>(iter: T) -> Self {
        Interpretation::from_atoms(iter)
    }
}
