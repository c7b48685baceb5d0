#![allow(dead_code)]

use anyhow::{anyhow, Result};
use s2s_core::TokenId;
use s2s_data_provider::{DatasetConfig, SpecialTokenIds, TextTokenizer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

pub const SPECIAL_TOKENS: [&str; 4] = ["[PAD]", "[CLS]", "[SEP]", "[MASK]"];

/// Splits on whitespace and looks words up in a fixed vocabulary, counting how
/// often it's asked to tokenize.
pub struct WhitespaceTokenizer {
    vocab: HashMap<String, TokenId>,
    tokenize_calls: AtomicUsize,
}

impl WhitespaceTokenizer {
    pub fn new(words: &[&str]) -> Self {
        let vocab = SPECIAL_TOKENS
            .iter()
            .chain(words)
            .enumerate()
            .map(|(id, word)| (word.to_string(), id as TokenId))
            .collect();
        Self {
            vocab,
            tokenize_calls: AtomicUsize::new(0),
        }
    }

    pub fn tokenize_calls(&self) -> usize {
        self.tokenize_calls.load(Ordering::SeqCst)
    }

    pub fn ids(&self, text: &str) -> Vec<TokenId> {
        text.split_whitespace()
            .map(|word| self.vocab[&word.to_lowercase()])
            .collect()
    }
}

impl TextTokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        self.tokenize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(text.split_whitespace().map(str::to_lowercase).collect())
    }

    fn convert_tokens_to_ids(&self, tokens: &[String]) -> Result<Vec<TokenId>> {
        tokens
            .iter()
            .map(|token| {
                self.token_to_id(token)
                    .ok_or_else(|| anyhow!("unknown token {token:?}"))
            })
            .collect()
    }

    fn token_to_id(&self, token: &str) -> Option<TokenId> {
        self.vocab.get(token).copied()
    }

    fn vocab_size(&self) -> usize {
        self.vocab.len()
    }
}

pub const WORDS: [&str; 12] = [
    "the", "cat", "sat", "on", "mat", "a", "dog", "ran", "far", "away", "short", "summary",
];

pub fn tokenizer() -> WhitespaceTokenizer {
    WhitespaceTokenizer::new(&WORDS)
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn dataset_config(tokenizer: &WhitespaceTokenizer) -> DatasetConfig {
    DatasetConfig {
        max_source_len: 8,
        max_target_len: 5,
        special: SpecialTokenIds::from_tokenizer(tokenizer).unwrap(),
        vocab_size: tokenizer.vocab_size(),
        random_prob: 0.0,
        keep_prob: 1.0,
        offset: 0,
        num_training_instances: None,
        span_len: 1,
        span_prob: 1.0,
    }
}
