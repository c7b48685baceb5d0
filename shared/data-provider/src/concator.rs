use anyhow::{anyhow, bail, Result};
use rand::Rng;
use s2s_core::TokenId;
use tracing::{debug, info};

use crate::collator::{Collate, RetrievalBatch, Seq2SeqBatch};
use crate::config::DatasetConfig;
use crate::dataset::Seq2SeqExample;
use crate::transform::ExampleTransform;

/// Joins query features with the documents retrieved for them, producing
/// training batches for the generator.
pub struct Concator {
    transform: ExampleTransform,
}

/// The ids of `row` between the special tokens added when it was built:
/// `[CLS]` (if `framed`) at the front, `[SEP]` at position `count - 1`.
fn body(row: &[TokenId], count: i64, framed: bool) -> Result<&[TokenId]> {
    let count = usize::try_from(count).map_err(|_| anyhow!("negative token count {count}"))?;
    let start = usize::from(framed);
    if count <= start || count > row.len() {
        bail!(
            "token count {count} doesn't fit a row of {} ids",
            row.len()
        );
    }
    Ok(&row[start..count - 1])
}

impl Concator {
    pub fn new(config: DatasetConfig) -> Result<Self> {
        let transform = ExampleTransform::new(config)?;
        if transform.config().offset > 0 {
            info!("Set offset {} in Concator", transform.config().offset);
        }
        Ok(Self { transform })
    }

    /// For every query row of `queries` and every document in the matching
    /// entry of `documents`, builds `[CLS] query document [SEP]` as the source
    /// and the query's target, noised and padded like a training example.
    ///
    /// With no documents at all the result is an empty batch.
    pub fn concat<R: Rng + ?Sized>(
        &self,
        queries: &RetrievalBatch,
        documents: &[Vec<Vec<TokenId>>],
        rng: &mut R,
    ) -> Result<Seq2SeqBatch> {
        let rows = queries.source_ids.len();
        for (column, len) in [
            ("target_ids", queries.target_ids.len()),
            ("num_source_tokens", queries.num_source_tokens.len()),
            ("num_target_tokens", queries.num_target_tokens.len()),
            ("documents", documents.len()),
        ] {
            if len != rows {
                bail!("{column} has {len} rows but there are {rows} queries");
            }
        }

        let mut examples: Vec<Seq2SeqExample> = Vec::new();
        for (row, docs) in documents.iter().enumerate() {
            let query = body(&queries.source_ids[row], queries.num_source_tokens[row], true)?;
            let target = body(&queries.target_ids[row], queries.num_target_tokens[row], false)?;
            for doc in docs {
                examples.push(self.transform.seq2seq(&[query, doc.as_slice()], target, rng)?);
            }
        }
        debug!(
            "concatenated {rows} queries with {} documents",
            examples.len()
        );
        if examples.is_empty() {
            return Ok(Seq2SeqBatch {
                source_ids: Vec::new(),
                target_ids: Vec::new(),
                pseudo_ids: Vec::new(),
                num_source_tokens: Vec::new(),
                num_target_tokens: Vec::new(),
                span_ids: self.transform.config().uses_spans().then(Vec::new),
            });
        }
        Seq2SeqExample::collate(examples)
    }
}
