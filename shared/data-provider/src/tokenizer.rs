use anyhow::{anyhow, Error, Result};
use s2s_core::TokenId;
use std::borrow::Cow;
use std::path::Path;
use tokenizers::Tokenizer;

/// The two services the pipeline needs from a pretrained tokenizer.
pub trait TextTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>>;

    fn convert_tokens_to_ids(&self, tokens: &[String]) -> Result<Vec<TokenId>>;

    fn token_to_id(&self, token: &str) -> Option<TokenId>;

    fn vocab_size(&self) -> usize;
}

/// Drops any padding or truncation stored in a tokenizer.json. Sequence
/// lengths are the pipeline's job, not the tokenizer's.
fn clear_length_limits(tokenizer: &mut Tokenizer) -> Result<()> {
    tokenizer.with_padding(None);
    tokenizer.with_truncation(None).map_err(Error::msg)?;
    Ok(())
}

impl TextTokenizer for Tokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let tokenizer = match self.get_padding().is_some() || self.get_truncation().is_some() {
            true => {
                let mut unlimited = self.clone();
                clear_length_limits(&mut unlimited)?;
                Cow::Owned(unlimited)
            }
            false => Cow::Borrowed(self),
        };
        let encoding = tokenizer.encode(text, false).map_err(Error::msg)?;
        Ok(encoding.get_tokens().to_vec())
    }

    fn convert_tokens_to_ids(&self, tokens: &[String]) -> Result<Vec<TokenId>> {
        tokens
            .iter()
            .map(|token| {
                TextTokenizer::token_to_id(self, token)
                    .ok_or_else(|| anyhow!("token {token:?} is not in the vocabulary"))
            })
            .collect()
    }

    fn token_to_id(&self, token: &str) -> Option<TokenId> {
        (**self).token_to_id(token).map(|id| id as TokenId)
    }

    fn vocab_size(&self) -> usize {
        self.get_vocab_size(true)
    }
}

pub fn load_tokenizer(path: impl AsRef<Path>) -> Result<Tokenizer> {
    let path = path.as_ref();
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| anyhow!("couldn't load tokenizer from {}: {e}", path.display()))?;
    clear_length_limits(&mut tokenizer)?;
    Ok(tokenizer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;
    use tempfile::TempDir;
    use tokenizers::{PaddingParams, PaddingStrategy, TruncationParams};

    const WORD_LEVEL: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": { "[PAD]": 0, "[UNK]": 1, "a": 2, "b": 3, "c": 4 },
            "unk_token": "[UNK]"
        }
    }"#;

    fn word_level() -> Tokenizer {
        Tokenizer::from_str(WORD_LEVEL).unwrap()
    }

    fn padded(tokenizer: &mut Tokenizer) {
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(6),
            pad_id: 0,
            pad_token: "[PAD]".to_string(),
            ..Default::default()
        }));
    }

    fn strings(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|token| token.to_string()).collect()
    }

    #[test]
    fn tokenizes_and_converts_to_ids() {
        let tokenizer = word_level();
        let tokens = TextTokenizer::tokenize(&tokenizer, "a b c a").unwrap();
        assert_eq!(tokens, strings(&["a", "b", "c", "a"]));
        assert_eq!(
            tokenizer.convert_tokens_to_ids(&tokens).unwrap(),
            vec![2, 3, 4, 2]
        );
    }

    #[test]
    fn unknown_tokens_are_an_error() {
        let tokenizer = word_level();
        let err = tokenizer
            .convert_tokens_to_ids(&strings(&["a", "zebra"]))
            .unwrap_err();
        assert!(err.to_string().contains("zebra"), "{err}");
    }

    #[test]
    fn looks_up_ids_and_vocab_size() {
        let tokenizer = word_level();
        assert_eq!(TextTokenizer::vocab_size(&tokenizer), 5);
        assert_eq!(TextTokenizer::token_to_id(&tokenizer, "b"), Some(3));
        assert_eq!(TextTokenizer::token_to_id(&tokenizer, "[PAD]"), Some(0));
        assert_eq!(TextTokenizer::token_to_id(&tokenizer, "zebra"), None);
    }

    #[test]
    fn ignores_configured_padding_and_truncation() {
        let mut tokenizer = word_level();
        padded(&mut tokenizer);
        assert_eq!(
            TextTokenizer::tokenize(&tokenizer, "a b").unwrap(),
            strings(&["a", "b"])
        );

        let mut tokenizer = word_level();
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: 2,
                ..Default::default()
            }))
            .unwrap();
        assert_eq!(
            TextTokenizer::tokenize(&tokenizer, "a b c").unwrap(),
            strings(&["a", "b", "c"])
        );
    }

    #[test]
    fn loading_clears_length_limits_from_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokenizer.json");
        let mut tokenizer = word_level();
        padded(&mut tokenizer);
        tokenizer.save(&path, false).unwrap();

        let loaded = load_tokenizer(&path).unwrap();
        assert!(loaded.get_padding().is_none());
        assert!(loaded.get_truncation().is_none());
        assert_eq!(
            TextTokenizer::tokenize(&loaded, "c b").unwrap(),
            strings(&["c", "b"])
        );
    }

    #[test]
    fn missing_tokenizer_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = load_tokenizer(dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("nope.json"), "{err}");
    }
}
