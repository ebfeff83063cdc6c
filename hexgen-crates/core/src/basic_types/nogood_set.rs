use super::Nogood;
use super::NogoodSink;
use crate::containers::HashMap;

/// A duplicate-free collection of nogoods which remembers how often each nogood was added.
///
/// The add counts drive [`NogoodSet::forget_least_frequently_added`], which is used to bound
/// the memory held by nogoods learned from external sources.
#[derive(Clone, Debug, Default)]
pub struct NogoodSet {
    nogoods: Vec<Nogood>,
    add_counts: Vec<usize>,
    index: HashMap<Nogood, usize>,
}

impl NogoodSet {
    /// Adds `nogood` and returns its position. Adding a nogood which is already present only
    /// increments its add count.
    pub fn add(&mut self, nogood: Nogood) -> usize {
        if let Some(&position) = self.index.get(&nogood) {
            self.add_counts[position] += 1;
            return position;
        }

        let position = self.nogoods.len();
        let _ = self.index.insert(nogood.clone(), position);
        self.nogoods.push(nogood);
        self.add_counts.push(1);
        position
    }

    pub fn contains(&self, nogood: &Nogood) -> bool {
        self.index.contains_key(nogood)
    }

    pub fn len(&self) -> usize {
        self.nogoods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nogoods.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Nogood> {
        self.nogoods.iter()
    }

    pub fn nogoods_from(&self, position: usize) -> &[Nogood] {
        &self.nogoods[position.min(self.nogoods.len())..]
    }

    pub fn add_count(&self, position: usize) -> usize {
        self.add_counts[position]
    }

    pub fn clear(&mut self) {
        self.nogoods.clear();
        self.add_counts.clear();
        self.index.clear();
    }

    /// Merges all nogoods of `other` into this set, accumulating add counts.
    pub fn extend_from(&mut self, other: NogoodSet) {
        for (nogood, count) in other.nogoods.into_iter().zip(other.add_counts) {
            let position = self.add(nogood);
            self.add_counts[position] += count - 1;
        }
    }

    /// Removes every nogood which was added less often than the average and resets the counts of
    /// the survivors. The relative order of the survivors is preserved.
    pub fn forget_least_frequently_added(&mut self) {
        if self.nogoods.is_empty() {
            return;
        }

        let total: usize = self.add_counts.iter().sum();
        let average = total / self.nogoods.len();

        let nogoods = std::mem::take(&mut self.nogoods);
        let counts = std::mem::take(&mut self.add_counts);
        self.index.clear();

        for (nogood, count) in nogoods.into_iter().zip(counts) {
            if count >= average {
                let _ = self.index.insert(nogood.clone(), self.nogoods.len());
                self.nogoods.push(nogood);
                self.add_counts.push(0);
            }
        }
    }
}

impl NogoodSink for NogoodSet {
    fn add_nogood(&mut self, nogood: Nogood) {
        let _ = self.add(nogood);
    }
}
