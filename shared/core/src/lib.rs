mod barrier;
mod checkpoint;
mod local_rank;
mod sequence;
mod shuffle;

pub use barrier::{Barrier, CancellableBarrier, CancelledBarrier, NoBarrier};
pub use checkpoint::{get_max_epoch_model, CheckpointError, CheckpointPaths};
pub use local_rank::LocalRank;
pub use sequence::{noise, pad, span_ids, truncate, NoiseConfig, SequenceError, TokenId};
pub use shuffle::Shuffle;
