use anyhow::{bail, Result};
use rand::Rng;
use s2s_core::TokenId;
use serde::Serialize;
use tracing::info;

use crate::config::DatasetConfig;
use crate::features::{DocFeature, Seq2SeqFeature};
use crate::traits::IndexedDataset;
use crate::transform::ExampleTransform;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Seq2SeqExample {
    pub source_ids: Vec<TokenId>,
    pub target_ids: Vec<TokenId>,
    pub pseudo_ids: Vec<TokenId>,
    pub num_source_tokens: usize,
    pub num_target_tokens: usize,
    pub span_ids: Option<Vec<TokenId>>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RetrievalExample {
    pub source_ids: Vec<TokenId>,
    pub target_ids: Vec<TokenId>,
    pub num_source_tokens: usize,
    pub num_target_tokens: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DocExample {
    pub source_ids: Vec<TokenId>,
    pub target_ids: Vec<TokenId>,
}

fn prepare(name: &str, num_features: usize, config: DatasetConfig) -> Result<ExampleTransform> {
    if num_features == 0 {
        bail!("{name} needs at least one feature");
    }
    let transform = ExampleTransform::new(config)?;
    if transform.config().offset > 0 {
        info!("Set offset {} in {name}", transform.config().offset);
    }
    Ok(transform)
}

/// Training examples with noised decoder inputs. Indices past the end of the
/// features wrap around, so an epoch can be longer than the feature list.
pub struct Seq2SeqDataset {
    features: Vec<Seq2SeqFeature>,
    transform: ExampleTransform,
    num_training_instances: usize,
}

impl Seq2SeqDataset {
    pub fn new(features: Vec<Seq2SeqFeature>, config: DatasetConfig) -> Result<Self> {
        let transform = prepare("Seq2SeqDataset", features.len(), config)?;
        let num_training_instances = transform
            .config()
            .num_training_instances
            .unwrap_or(features.len());
        Ok(Self {
            features,
            transform,
            num_training_instances,
        })
    }

    pub fn features(&self) -> &[Seq2SeqFeature] {
        &self.features
    }
}

impl IndexedDataset for Seq2SeqDataset {
    type Item = Seq2SeqExample;

    fn len(&self) -> usize {
        self.num_training_instances
    }

    fn get<R: Rng + ?Sized>(&self, idx: usize, rng: &mut R) -> Result<Seq2SeqExample> {
        let feature = &self.features[self.transform.feature_index(idx, self.features.len())];
        Ok(self
            .transform
            .seq2seq(&[feature.source_ids.as_slice()], &feature.target_ids, rng)?)
    }
}

/// Query side of retrieval training: padded sources and targets without noise.
pub struct RetrievalSeq2SeqDataset {
    features: Vec<Seq2SeqFeature>,
    transform: ExampleTransform,
    num_training_instances: usize,
}

impl RetrievalSeq2SeqDataset {
    pub fn new(features: Vec<Seq2SeqFeature>, config: DatasetConfig) -> Result<Self> {
        let transform = prepare("RetrievalSeq2SeqDataset", features.len(), config)?;
        let num_training_instances = transform
            .config()
            .num_training_instances
            .unwrap_or(features.len());
        Ok(Self {
            features,
            transform,
            num_training_instances,
        })
    }
}

impl IndexedDataset for RetrievalSeq2SeqDataset {
    type Item = RetrievalExample;

    fn len(&self) -> usize {
        self.num_training_instances
    }

    fn get<R: Rng + ?Sized>(&self, idx: usize, _rng: &mut R) -> Result<RetrievalExample> {
        let feature = &self.features[self.transform.feature_index(idx, self.features.len())];
        Ok(self
            .transform
            .retrieval(&feature.source_ids, &feature.target_ids)?)
    }
}

/// Documents to be retrieved; one item per document.
pub struct RetrievalDocDataset {
    features: Vec<DocFeature>,
    transform: ExampleTransform,
}

impl RetrievalDocDataset {
    pub fn new(features: Vec<DocFeature>, config: DatasetConfig) -> Result<Self> {
        let transform = prepare("RetrievalDocDataset", features.len(), config)?;
        Ok(Self {
            features,
            transform,
        })
    }
}

impl IndexedDataset for RetrievalDocDataset {
    type Item = DocExample;

    fn len(&self) -> usize {
        self.features.len()
    }

    fn get<R: Rng + ?Sized>(&self, idx: usize, _rng: &mut R) -> Result<DocExample> {
        let feature = &self.features[self.transform.feature_index(idx, self.features.len())];
        Ok(self.transform.document(&feature.input_ids)?)
    }
}
