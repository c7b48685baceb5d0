use rand::Rng;
use thiserror::Error;

/// A single vocabulary id, as produced by the tokenizer and consumed by the model.
pub type TokenId = i32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("max_len must be at least 1 to leave room for the separator")]
    ZeroMaxLen,

    #[error("sequence of {len} tokens is longer than max_len {max_len}")]
    ExceedsMaxLen { len: usize, max_len: usize },
}

/// Keeps at most `max_len - 1` leading ids and always terminates with `sep_id`,
/// so the result is never longer than `max_len`.
pub fn truncate(
    ids: &[TokenId],
    max_len: usize,
    sep_id: TokenId,
) -> Result<Vec<TokenId>, SequenceError> {
    if max_len == 0 {
        return Err(SequenceError::ZeroMaxLen);
    }
    let keep = ids.len().min(max_len - 1);
    let mut truncated = Vec::with_capacity(keep + 1);
    truncated.extend_from_slice(&ids[..keep]);
    truncated.push(sep_id);
    Ok(truncated)
}

/// Right-pads `ids` with `pad_id` to exactly `max_len`.
pub fn pad(
    mut ids: Vec<TokenId>,
    max_len: usize,
    pad_id: TokenId,
) -> Result<Vec<TokenId>, SequenceError> {
    if ids.len() > max_len {
        return Err(SequenceError::ExceedsMaxLen {
            len: ids.len(),
            max_len,
        });
    }
    ids.resize(max_len, pad_id);
    Ok(ids)
}

/// Decides the fate of one token with a single uniform draw `p`:
/// `p < keep_prob` keeps it, `p < keep_prob + random_prob` replaces it with a
/// uniformly random id in `[0, vocab_size)`, anything else becomes `mask_id`.
///
/// `vocab_size` must be non-zero whenever `random_prob` is non-zero.
pub fn noise<R: Rng + ?Sized>(
    token_id: TokenId,
    keep_prob: f64,
    random_prob: f64,
    mask_id: TokenId,
    vocab_size: usize,
    rng: &mut R,
) -> TokenId {
    let p: f64 = rng.gen();
    if p < keep_prob {
        token_id
    } else if p < keep_prob + random_prob {
        rng.gen_range(0..vocab_size) as TokenId
    } else {
        mask_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseConfig {
    pub keep_prob: f64,
    pub random_prob: f64,
    pub mask_id: TokenId,
    pub vocab_size: usize,
}

impl NoiseConfig {
    pub fn apply<R: Rng + ?Sized>(&self, token_id: TokenId, rng: &mut R) -> TokenId {
        noise(
            token_id,
            self.keep_prob,
            self.random_prob,
            self.mask_id,
            self.vocab_size,
            rng,
        )
    }

    /// The noised copy of `target` fed to the decoder.
    pub fn pseudo_ids<R: Rng + ?Sized>(&self, target: &[TokenId], rng: &mut R) -> Vec<TokenId> {
        target.iter().map(|&id| self.apply(id, rng)).collect()
    }
}

/// Groups `num_target_tokens` consecutive positions into spans numbered from 1.
///
/// Each span is, with probability `span_prob`, between 2 and `span_len` long
/// (clipped to what is left), and a single position otherwise. With
/// `span_len < 2` every position is its own span.
pub fn span_ids<R: Rng + ?Sized>(
    num_target_tokens: usize,
    span_len: usize,
    span_prob: f64,
    rng: &mut R,
) -> Vec<TokenId> {
    let mut ids = Vec::with_capacity(num_target_tokens);
    let mut span_id: TokenId = 1;
    while ids.len() < num_target_tokens {
        let len = if span_len >= 2 && rng.gen::<f64>() < span_prob {
            rng.gen_range(2..=span_len).min(num_target_tokens - ids.len())
        } else {
            1
        };
        ids.extend(std::iter::repeat(span_id).take(len));
        span_id += 1;
    }
    ids
}
