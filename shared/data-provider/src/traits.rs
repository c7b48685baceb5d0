use anyhow::Result;
use rand::Rng;

/// A map-style dataset: a known number of items, each built on demand.
pub trait IndexedDataset {
    type Item;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds item `idx`. Noise and span draws come from `rng`, so the same
    /// index can yield a different corruption each epoch.
    fn get<R: Rng + ?Sized>(&self, idx: usize, rng: &mut R) -> Result<Self::Item>;
}
