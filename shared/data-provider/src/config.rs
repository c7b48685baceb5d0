use anyhow::{anyhow, Result};
use s2s_core::{NoiseConfig, TokenId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::tokenizer::TextTokenizer;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be at least 1, got {value}")]
    TooSmall { field: &'static str, value: usize },

    #[error("{field} must be a probability in [0, 1], got {value}")]
    NotAProbability { field: &'static str, value: f64 },

    #[error("keep_prob + random_prob must not exceed 1, got {0}")]
    ProbabilitiesExceedOne(f64),
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpecialTokenIds {
    pub cls_id: TokenId,
    pub sep_id: TokenId,
    pub pad_id: TokenId,
    pub mask_id: TokenId,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SpecialTokenNames {
    pub cls: String,
    pub sep: String,
    pub pad: String,
    pub mask: String,
}

impl Default for SpecialTokenNames {
    fn default() -> Self {
        Self {
            cls: "[CLS]".to_string(),
            sep: "[SEP]".to_string(),
            pad: "[PAD]".to_string(),
            mask: "[MASK]".to_string(),
        }
    }
}

impl SpecialTokenIds {
    pub fn from_tokenizer<T: TextTokenizer + ?Sized>(tokenizer: &T) -> Result<Self> {
        Self::from_tokenizer_with_names(tokenizer, &SpecialTokenNames::default())
    }

    pub fn from_tokenizer_with_names<T: TextTokenizer + ?Sized>(
        tokenizer: &T,
        names: &SpecialTokenNames,
    ) -> Result<Self> {
        let lookup = |token: &str| {
            tokenizer
                .token_to_id(token)
                .ok_or_else(|| anyhow!("tokenizer has no {token} token"))
        };
        Ok(Self {
            cls_id: lookup(&names.cls)?,
            sep_id: lookup(&names.sep)?,
            pad_id: lookup(&names.pad)?,
            mask_id: lookup(&names.mask)?,
        })
    }
}

fn default_span_len() -> usize {
    1
}

fn default_span_prob() -> f64 {
    1.0
}

/// Everything the example transformers need to turn features into fixed-size examples.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DatasetConfig {
    pub max_source_len: usize,
    pub max_target_len: usize,
    pub special: SpecialTokenIds,
    pub vocab_size: usize,
    pub random_prob: f64,
    pub keep_prob: f64,
    #[serde(default)]
    pub offset: usize,
    /// Number of items a training epoch yields; defaults to the number of features.
    #[serde(default)]
    pub num_training_instances: Option<usize>,
    #[serde(default = "default_span_len")]
    pub span_len: usize,
    #[serde(default = "default_span_prob")]
    pub span_prob: f64,
}

impl DatasetConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Self = toml::from_str(&std::fs::read_to_string(path)?)
            .map_err(|e| anyhow!("invalid dataset config {}: {e}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("max_source_len", self.max_source_len),
            ("max_target_len", self.max_target_len),
            ("vocab_size", self.vocab_size),
            ("span_len", self.span_len),
        ] {
            if value < 1 {
                return Err(ConfigError::TooSmall { field, value });
            }
        }
        for (field, value) in [
            ("keep_prob", self.keep_prob),
            ("random_prob", self.random_prob),
            ("span_prob", self.span_prob),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::NotAProbability { field, value });
            }
        }
        let total = self.keep_prob + self.random_prob;
        if total > 1.0 {
            return Err(ConfigError::ProbabilitiesExceedOne(total));
        }
        Ok(())
    }

    pub fn noise(&self) -> NoiseConfig {
        NoiseConfig {
            keep_prob: self.keep_prob,
            random_prob: self.random_prob,
            mask_id: self.special.mask_id,
            vocab_size: self.vocab_size,
        }
    }

    pub fn uses_spans(&self) -> bool {
        self.span_len > 1
    }
}
