use anyhow::{bail, Result};
use rand::Rng;
use s2s_core::TokenId;
use serde::Serialize;

use crate::dataset::{DocExample, RetrievalExample, Seq2SeqExample};
use crate::traits::IndexedDataset;

/// Stacks per-example values column-wise into one batch.
pub trait Collate: Sized {
    type Batch;

    fn collate(items: Vec<Self>) -> Result<Self::Batch>;
}

fn stack(rows: Vec<Vec<TokenId>>, column: &str) -> Result<Vec<Vec<TokenId>>> {
    let Some(width) = rows.first().map(Vec::len) else {
        return Ok(rows);
    };
    if let Some(ragged) = rows.iter().position(|row| row.len() != width) {
        bail!(
            "can't stack {column}: row {ragged} has {} ids but row 0 has {width}",
            rows[ragged].len()
        );
    }
    Ok(rows)
}

fn ensure_not_empty<T>(items: &[T]) -> Result<()> {
    if items.is_empty() {
        bail!("can't collate an empty batch");
    }
    Ok(())
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Seq2SeqBatch {
    pub source_ids: Vec<Vec<TokenId>>,
    pub target_ids: Vec<Vec<TokenId>>,
    pub pseudo_ids: Vec<Vec<TokenId>>,
    pub num_source_tokens: Vec<i64>,
    pub num_target_tokens: Vec<i64>,
    pub span_ids: Option<Vec<Vec<TokenId>>>,
}

impl Seq2SeqBatch {
    pub fn len(&self) -> usize {
        self.source_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source_ids.is_empty()
    }
}

impl Collate for Seq2SeqExample {
    type Batch = Seq2SeqBatch;

    fn collate(items: Vec<Self>) -> Result<Seq2SeqBatch> {
        ensure_not_empty(&items)?;
        let n = items.len();
        let mut source_ids = Vec::with_capacity(n);
        let mut target_ids = Vec::with_capacity(n);
        let mut pseudo_ids = Vec::with_capacity(n);
        let mut num_source_tokens = Vec::with_capacity(n);
        let mut num_target_tokens = Vec::with_capacity(n);
        let mut span_ids = items[0].span_ids.is_some().then(|| Vec::with_capacity(n));

        for (i, item) in items.into_iter().enumerate() {
            source_ids.push(item.source_ids);
            target_ids.push(item.target_ids);
            pseudo_ids.push(item.pseudo_ids);
            num_source_tokens.push(item.num_source_tokens as i64);
            num_target_tokens.push(item.num_target_tokens as i64);
            match (&mut span_ids, item.span_ids) {
                (Some(column), Some(spans)) => column.push(spans),
                (None, None) => {}
                _ => bail!("example {i} disagrees with example 0 about span ids"),
            }
        }

        Ok(Seq2SeqBatch {
            source_ids: stack(source_ids, "source_ids")?,
            target_ids: stack(target_ids, "target_ids")?,
            pseudo_ids: stack(pseudo_ids, "pseudo_ids")?,
            num_source_tokens,
            num_target_tokens,
            span_ids: span_ids
                .map(|column| stack(column, "span_ids"))
                .transpose()?,
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RetrievalBatch {
    pub source_ids: Vec<Vec<TokenId>>,
    pub target_ids: Vec<Vec<TokenId>>,
    pub num_source_tokens: Vec<i64>,
    pub num_target_tokens: Vec<i64>,
}

impl Collate for RetrievalExample {
    type Batch = RetrievalBatch;

    fn collate(items: Vec<Self>) -> Result<RetrievalBatch> {
        ensure_not_empty(&items)?;
        let (mut source_ids, mut target_ids) = (Vec::new(), Vec::new());
        let (mut num_source_tokens, mut num_target_tokens) = (Vec::new(), Vec::new());
        for item in items {
            source_ids.push(item.source_ids);
            target_ids.push(item.target_ids);
            num_source_tokens.push(item.num_source_tokens as i64);
            num_target_tokens.push(item.num_target_tokens as i64);
        }
        Ok(RetrievalBatch {
            source_ids: stack(source_ids, "source_ids")?,
            target_ids: stack(target_ids, "target_ids")?,
            num_source_tokens,
            num_target_tokens,
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DocBatch {
    pub source_ids: Vec<Vec<TokenId>>,
    pub target_ids: Vec<Vec<TokenId>>,
}

impl Collate for DocExample {
    type Batch = DocBatch;

    fn collate(items: Vec<Self>) -> Result<DocBatch> {
        ensure_not_empty(&items)?;
        let (source_ids, target_ids): (Vec<_>, Vec<_>) = items
            .into_iter()
            .map(|item| (item.source_ids, item.target_ids))
            .unzip();
        Ok(DocBatch {
            source_ids: stack(source_ids, "source_ids")?,
            target_ids: stack(target_ids, "target_ids")?,
        })
    }
}

/// Builds the items at `indices` and collates them into one batch.
pub fn collate_indices<D, R>(
    dataset: &D,
    indices: &[usize],
    rng: &mut R,
) -> Result<<D::Item as Collate>::Batch>
where
    D: IndexedDataset,
    D::Item: Collate,
    R: Rng + ?Sized,
{
    let items = indices
        .iter()
        .map(|&idx| dataset.get(idx, &mut *rng))
        .collect::<Result<Vec<_>>>()?;
    <D::Item as Collate>::collate(items)
}

/// Walks a dataset in order, `batch_size` items at a time. The last batch
/// holds whatever is left over.
pub struct BatchIter<'a, D, R> {
    dataset: &'a D,
    rng: R,
    batch_size: usize,
    next: usize,
}

impl<'a, D: IndexedDataset, R: Rng> BatchIter<'a, D, R> {
    pub fn new(dataset: &'a D, batch_size: usize, rng: R) -> Result<Self> {
        if batch_size == 0 {
            bail!("batch size must be at least 1");
        }
        Ok(Self {
            dataset,
            rng,
            batch_size,
            next: 0,
        })
    }
}

impl<D, R> Iterator for BatchIter<'_, D, R>
where
    D: IndexedDataset,
    D::Item: Collate,
    R: Rng,
{
    type Item = Result<<D::Item as Collate>::Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.dataset.len();
        if self.next >= len {
            return None;
        }
        let end = (self.next + self.batch_size).min(len);
        let indices: Vec<usize> = (self.next..end).collect();
        self.next = end;
        Some(collate_indices(self.dataset, &indices, &mut self.rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn example(fill: TokenId, spans: Option<Vec<TokenId>>) -> Seq2SeqExample {
        Seq2SeqExample {
            source_ids: vec![fill; 4],
            target_ids: vec![fill + 1; 3],
            pseudo_ids: vec![fill + 2; 3],
            num_source_tokens: 2,
            num_target_tokens: 1,
            span_ids: spans,
        }
    }

    #[test]
    fn stacks_columns_in_item_order() {
        let batch = Seq2SeqExample::collate(vec![example(10, None), example(20, None)]).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.source_ids, vec![vec![10; 4], vec![20; 4]]);
        assert_eq!(batch.target_ids, vec![vec![11; 3], vec![21; 3]]);
        assert_eq!(batch.pseudo_ids, vec![vec![12; 3], vec![22; 3]]);
        assert_eq!(batch.num_source_tokens, vec![2, 2]);
        assert_eq!(batch.num_target_tokens, vec![1, 1]);
        assert_eq!(batch.span_ids, None);
    }

    #[test]
    fn stacks_span_column_when_present() {
        let batch = Seq2SeqExample::collate(vec![
            example(1, Some(vec![1, 1, 2])),
            example(2, Some(vec![1, 2, 0])),
        ])
        .unwrap();
        assert_eq!(batch.span_ids, Some(vec![vec![1, 1, 2], vec![1, 2, 0]]));
    }

    #[test]
    fn rejects_mixed_span_columns() {
        let err = Seq2SeqExample::collate(vec![example(1, Some(vec![1, 1, 2])), example(2, None)])
            .unwrap_err();
        assert!(err.to_string().contains("span ids"), "{err}");
    }

    #[test]
    fn rejects_ragged_rows() {
        let mut short = example(2, None);
        short.source_ids.pop();
        let err = Seq2SeqExample::collate(vec![example(1, None), short]).unwrap_err();
        assert!(err.to_string().contains("source_ids"), "{err}");
    }

    #[test]
    fn rejects_empty_batches() {
        assert!(Seq2SeqExample::collate(vec![]).is_err());
        assert!(DocExample::collate(vec![]).is_err());
        assert!(RetrievalExample::collate(vec![]).is_err());
    }

    #[test]
    fn collates_documents() {
        let batch = DocExample::collate(vec![
            DocExample {
                source_ids: vec![1, 2],
                target_ids: vec![3],
            },
            DocExample {
                source_ids: vec![4, 5],
                target_ids: vec![6],
            },
        ])
        .unwrap();
        assert_eq!(batch.source_ids, vec![vec![1, 2], vec![4, 5]]);
        assert_eq!(batch.target_ids, vec![vec![3], vec![6]]);
    }
}
