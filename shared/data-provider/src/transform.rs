use rand::Rng;
use s2s_core::{pad, span_ids, truncate, SequenceError, TokenId};

use crate::config::{ConfigError, DatasetConfig};
use crate::dataset::{DocExample, RetrievalExample, Seq2SeqExample};

/// Per-example truncation, padding and noising, shared by every dataset and
/// by the retrieval [`Concator`](crate::Concator).
#[derive(Debug, Clone)]
pub struct ExampleTransform {
    config: DatasetConfig,
}

impl ExampleTransform {
    pub fn new(config: DatasetConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn feature_index(&self, idx: usize, num_features: usize) -> usize {
        (self.config.offset % num_features + idx % num_features) % num_features
    }

    /// `[CLS]` followed by every part, truncated to `max_source_len`.
    pub fn source(&self, parts: &[&[TokenId]]) -> Result<Vec<TokenId>, SequenceError> {
        let special = self.config.special;
        let mut ids = Vec::with_capacity(1 + parts.iter().map(|part| part.len()).sum::<usize>());
        ids.push(special.cls_id);
        for part in parts {
            ids.extend_from_slice(part);
        }
        truncate(&ids, self.config.max_source_len, special.sep_id)
    }

    pub fn target(&self, ids: &[TokenId]) -> Result<Vec<TokenId>, SequenceError> {
        truncate(ids, self.config.max_target_len, self.config.special.sep_id)
    }

    fn pad_source(&self, ids: Vec<TokenId>) -> Result<Vec<TokenId>, SequenceError> {
        pad(ids, self.config.max_source_len, self.config.special.pad_id)
    }

    fn pad_target(&self, ids: Vec<TokenId>) -> Result<Vec<TokenId>, SequenceError> {
        pad(ids, self.config.max_target_len, self.config.special.pad_id)
    }

    /// Builds a training example: truncated and padded source and target, the
    /// noised target as pseudo ids, and span ids when spans are enabled.
    pub fn seq2seq<R: Rng + ?Sized>(
        &self,
        source_parts: &[&[TokenId]],
        target_ids: &[TokenId],
        rng: &mut R,
    ) -> Result<Seq2SeqExample, SequenceError> {
        let source = self.source(source_parts)?;
        let target = self.target(target_ids)?;
        let pseudo = self.config.noise().pseudo_ids(&target, rng);

        let num_source_tokens = source.len();
        let num_target_tokens = target.len();

        let spans = match self.config.uses_spans() {
            true => Some(self.pad_target(span_ids(
                num_target_tokens,
                self.config.span_len,
                self.config.span_prob,
                rng,
            ))?),
            false => None,
        };

        Ok(Seq2SeqExample {
            source_ids: self.pad_source(source)?,
            target_ids: self.pad_target(target)?,
            pseudo_ids: self.pad_target(pseudo)?,
            num_source_tokens,
            num_target_tokens,
            span_ids: spans,
        })
    }

    pub fn retrieval(
        &self,
        source_ids: &[TokenId],
        target_ids: &[TokenId],
    ) -> Result<RetrievalExample, SequenceError> {
        let source = self.source(&[source_ids])?;
        let target = self.target(target_ids)?;
        Ok(RetrievalExample {
            num_source_tokens: source.len(),
            num_target_tokens: target.len(),
            source_ids: self.pad_source(source)?,
            target_ids: self.pad_target(target)?,
        })
    }

    /// The document side of retrieval training. The target is a `[CLS] 0`
    /// placeholder cut to the source length limit and padded to the target length.
    pub fn document(&self, input_ids: &[TokenId]) -> Result<DocExample, SequenceError> {
        let special = self.config.special;
        let source = self.source(&[input_ids])?;
        let target = truncate(&[special.cls_id, 0], self.config.max_source_len, special.sep_id)?;
        Ok(DocExample {
            source_ids: self.pad_source(source)?,
            target_ids: self.pad_target(target)?,
        })
    }
}
