use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Shuffle {
    #[default]
    DontShuffle,
    Seeded([u8; 32]),
}

impl Shuffle {
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => {
                let mut bytes = [0u8; 32];
                bytes[..8].copy_from_slice(&seed.to_le_bytes());
                Self::Seeded(bytes)
            }
            None => Self::DontShuffle,
        }
    }

    /// Shuffles in place; the same seed always produces the same order, so
    /// processes that shuffle independently agree.
    pub fn apply<T>(&self, items: &mut [T]) {
        if let Shuffle::Seeded(seed) = self {
            items.shuffle(&mut ChaCha8Rng::from_seed(*seed));
        }
    }
}
