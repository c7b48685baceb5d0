use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use s2s_core::TokenId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::tokenizer::TextTokenizer;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Seq2SeqFeature {
    pub source_ids: Vec<TokenId>,
    pub target_ids: Vec<TokenId>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DocFeature {
    pub input_ids: Vec<TokenId>,
}

/// Either raw text, or text that was tokenized ahead of time.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum TextOrTokens {
    Tokens(Vec<String>),
    Text(String),
}

impl TextOrTokens {
    fn into_ids<T: TextTokenizer + ?Sized>(self, tokenizer: &T) -> Result<Vec<TokenId>> {
        let tokens = match self {
            TextOrTokens::Tokens(tokens) => tokens,
            TextOrTokens::Text(text) => tokenizer.tokenize(&text)?,
        };
        tokenizer.convert_tokens_to_ids(&tokens)
    }
}

#[derive(Deserialize, Debug)]
struct RawExample {
    src: TextOrTokens,
    tgt: TextOrTokens,
}

fn progress_bar(len: usize, show: bool) -> Result<ProgressBar> {
    if !show {
        return Ok(ProgressBar::hidden());
    }
    let pbar = ProgressBar::new(len as u64);
    pbar.set_style(
        ProgressStyle::with_template(
            "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
        )?
        .progress_chars("#>-"),
    );
    pbar.set_message("tokenizing");
    Ok(pbar)
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("couldn't read examples from {}: {e}", path.display()))?;
    Ok(contents.lines().map(str::to_owned).collect())
}

/// Tokenizes every `{"src": ..., "tgt": ...}` line of a JSONL file.
pub fn build_seq2seq_features<T: TextTokenizer + ?Sized>(
    example_file: &Path,
    tokenizer: &T,
    show_progress: bool,
) -> Result<Vec<Seq2SeqFeature>> {
    let lines = read_lines(example_file)?;
    let mut examples = Vec::with_capacity(lines.len());
    for (line_no, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let example: RawExample = serde_json::from_str(line).map_err(|e| {
            anyhow!(
                "malformed example on line {} of {}: {e}",
                line_no + 1,
                example_file.display()
            )
        })?;
        examples.push(example);
    }
    debug!("read {} examples from {}", examples.len(), example_file.display());

    let pbar = progress_bar(examples.len(), show_progress)?;
    let mut features = Vec::with_capacity(examples.len());
    for example in examples {
        features.push(Seq2SeqFeature {
            source_ids: example.src.into_ids(tokenizer)?,
            target_ids: example.tgt.into_ids(tokenizer)?,
        });
        pbar.inc(1);
    }
    pbar.finish_and_clear();
    Ok(features)
}

/// Tokenizes every line of a plain text file as one document.
pub fn build_doc_features<T: TextTokenizer + ?Sized>(
    example_file: &Path,
    tokenizer: &T,
    show_progress: bool,
) -> Result<Vec<DocFeature>> {
    let lines = read_lines(example_file)?;
    debug!("read {} documents from {}", lines.len(), example_file.display());

    let pbar = progress_bar(lines.len(), show_progress)?;
    let mut features = Vec::with_capacity(lines.len());
    for line in &lines {
        let tokens = tokenizer.tokenize(line.trim())?;
        features.push(DocFeature {
            input_ids: tokenizer.convert_tokens_to_ids(&tokens)?,
        });
        pbar.inc(1);
    }
    pbar.finish_and_clear();
    Ok(features)
}
