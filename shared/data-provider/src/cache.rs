use anyhow::Result;
use s2s_core::{Barrier, LocalRank, Shuffle};
use serde::{de::DeserializeOwned, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::features::{build_doc_features, build_seq2seq_features, DocFeature, Seq2SeqFeature};
use crate::tokenizer::TextTokenizer;

const CACHE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("couldn't read feature cache {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("couldn't write feature cache {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("feature cache {path:?} is corrupt: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: postcard::Error,
    },

    #[error("couldn't encode features: {0}")]
    Encode(#[from] postcard::Error),

    #[error("feature cache {path:?} has version {found}, expected {expected}", expected = CACHE_VERSION)]
    Version { path: PathBuf, found: u32 },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureLoadOptions {
    pub shuffle: Shuffle,
    pub show_progress: bool,
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Writes `features` behind a version header. The file is written next to
/// `path` and renamed into place, so readers see either nothing or the whole cache.
pub fn save_features<T: Serialize>(path: &Path, features: &[T]) -> Result<(), CacheError> {
    let bytes = postcard::to_stdvec(&(CACHE_VERSION, features))?;
    let tmp = temporary_path(path);
    let write_err = |source| CacheError::Write {
        path: path.to_path_buf(),
        source,
    };
    std::fs::write(&tmp, &bytes).map_err(write_err)?;
    std::fs::rename(&tmp, path).map_err(write_err)?;
    debug!("wrote {} bytes of features to {}", bytes.len(), path.display());
    Ok(())
}

pub fn load_features<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, CacheError> {
    let bytes = std::fs::read(path).map_err(|source| CacheError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let decode_err = |source| CacheError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let (version, rest) = postcard::take_from_bytes::<u32>(&bytes).map_err(decode_err)?;
    if version != CACHE_VERSION {
        return Err(CacheError::Version {
            path: path.to_path_buf(),
            found: version,
        });
    }
    postcard::from_bytes(rest).map_err(decode_err)
}

/// One designated process builds and caches; the others wait for it and read
/// the cache.
///
/// Followers wait at `barrier` before touching the cache, the leader waits
/// after writing it, which releases them. If the leader fails it aborts the
/// barrier instead of leaving the followers blocked.
fn load_or_build<T, B, F>(
    example_file: &Path,
    local_rank: LocalRank,
    barrier: &B,
    cached_features_file: Option<&Path>,
    build: F,
) -> Result<Vec<T>>
where
    T: Serialize + DeserializeOwned,
    B: Barrier + ?Sized,
    F: FnOnce() -> Result<Vec<T>>,
{
    if local_rank.waits_before_build() {
        debug!("{local_rank} waiting for the feature cache");
        barrier.wait()?;
    }

    let features = (|| -> Result<Vec<T>> {
        if let Some(path) = cached_features_file.filter(|path| path.exists()) {
            info!("Loading features from cached file {}", path.display());
            return Ok(load_features(path)?);
        }

        info!("Creating features from dataset file at {}", example_file.display());
        let features = build()?;

        if let Some(path) = cached_features_file.filter(|_| local_rank.is_designated()) {
            info!("Saving features into cached file {}", path.display());
            save_features(path, &features)?;
        }
        Ok(features)
    })();

    if local_rank.waits_after_build() {
        match &features {
            Ok(_) => barrier.wait()?,
            Err(err) => {
                error!("{local_rank} failed to prepare features, releasing waiting ranks: {err:#}");
                barrier.abort();
            }
        }
    }

    features
}

/// Loads the `{source_ids, target_ids}` features of a JSONL file of
/// `{"src": ..., "tgt": ...}` examples, building and caching them on first use.
pub fn load_and_cache_examples<T, B>(
    example_file: impl AsRef<Path>,
    tokenizer: &T,
    local_rank: LocalRank,
    barrier: &B,
    cached_features_file: Option<&Path>,
    options: FeatureLoadOptions,
) -> Result<Vec<Seq2SeqFeature>>
where
    T: TextTokenizer + ?Sized,
    B: Barrier + ?Sized,
{
    let example_file = example_file.as_ref();
    let features = load_or_build(
        example_file,
        local_rank,
        barrier,
        cached_features_file,
        || {
            let mut features =
                build_seq2seq_features(example_file, tokenizer, options.show_progress)?;
            options.shuffle.apply(&mut features);
            Ok(features)
        },
    )?;
    info!("{} seq2seq features ready", features.len());
    Ok(features)
}

/// Loads the `{input_ids}` features of a file with one document per line.
/// Documents keep their file order.
pub fn load_and_cache_doc_examples<T, B>(
    example_file: impl AsRef<Path>,
    tokenizer: &T,
    local_rank: LocalRank,
    barrier: &B,
    cached_doc_features_file: Option<&Path>,
    options: FeatureLoadOptions,
) -> Result<Vec<DocFeature>>
where
    T: TextTokenizer + ?Sized,
    B: Barrier + ?Sized,
{
    let example_file = example_file.as_ref();
    let features = load_or_build(
        example_file,
        local_rank,
        barrier,
        cached_doc_features_file,
        || build_doc_features(example_file, tokenizer, options.show_progress),
    )?;
    info!("{} document features ready", features.len());
    Ok(features)
}
