//! Weighted random selection: P(item) = weight(item) / total weight.

use rand::seq::SliceRandom;
use rand::Rng;
use wasp_core::WeightTable;

#[derive(Debug, Clone)]
pub struct WeightedList<T> {
    items: Vec<(T, u32)>,
}

impl<T> WeightedList<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn from_items(items: Vec<(T, u32)>) -> Self {
        Self { items }
    }

    pub fn push(&mut self, item: T, weight: u32) {
        self.items.push((item, weight));
    }

    /// Replace every weight with the table's weight for the item's name
    pub fn reweighted(mut self, table: &WeightTable, name_of: impl Fn(&T) -> &str) -> Self {
        for (item, weight) in self.items.iter_mut() {
            if let Some(configured) = table.weight(name_of(item)) {
                *weight = configured;
            }
        }
        self
    }

    /// Draw an element. `None` when the list is empty or all weights are zero.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&T> {
        self.items
            .choose_weighted(rng, |(_, weight)| *weight)
            .ok()
            .map(|(item, _)| item)
    }

    /// Draw an index among the items accepted by `filter`, which sees each index and item
    pub fn choose_index_where<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        filter: impl Fn(usize, &T) -> bool,
    ) -> Option<usize> {
        let eligible: Vec<(usize, u32)> = self
            .items
            .iter()
            .enumerate()
            .filter(|(idx, (item, weight))| *weight > 0 && filter(*idx, item))
            .map(|(idx, (_, weight))| (idx, *weight))
            .collect();
        eligible
            .choose_weighted(rng, |(_, weight)| *weight)
            .ok()
            .map(|(idx, _)| *idx)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index).map(|(item, _)| item)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index).map(|(item, _)| item)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T, u32)> {
        self.items.iter().map(|(item, weight)| (item, *weight))
    }

    pub fn filtered(&self, keep: impl Fn(&T) -> bool) -> Self
    where
        T: Clone,
    {
        Self {
            items: self
                .items
                .iter()
                .filter(|(item, _)| keep(item))
                .cloned()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for WeightedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_zero_weight_never_chosen() {
        let list = WeightedList::from_items(vec![("a", 0), ("b", 3)]);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..100 {
            assert_eq!(list.choose(&mut rng), Some(&"b"));
        }
    }

    #[test]
    fn test_all_zero_yields_none() {
        let list = WeightedList::from_items(vec![("a", 0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!(list.choose(&mut rng).is_none());
        assert!(list.choose_index_where(&mut rng, |_, _| true).is_none());
    }

    #[test]
    fn test_frequencies_follow_weights() {
        let list = WeightedList::from_items(vec![("rare", 1), ("common", 9)]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let common = (0..10_000)
            .filter(|_| list.choose(&mut rng) == Some(&"common"))
            .count();
        assert!((8_500..9_500).contains(&common), "common drawn {} times", common);
    }

    #[test]
    fn test_reweighting_from_table() {
        let table = WeightTable::new("test", &[("a", 5), ("b", 0)]);
        let list = WeightedList::from_items(vec![("a", 1), ("b", 1)]).reweighted(&table, |s| *s);
        let weights: Vec<u32> = list.iter().map(|(_, w)| w).collect();
        assert_eq!(weights, vec![5, 0]);
    }
}
