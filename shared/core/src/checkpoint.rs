use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const MODEL_PREFIX: &str = "model";
const OPTIMIZER_PREFIX: &str = "optim";
const EXTENSION: &str = "bin";

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("couldn't scan checkpoint directory {path:?}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The model and optimizer state files written for one epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointPaths {
    pub model: PathBuf,
    pub optimizer: PathBuf,
}

impl CheckpointPaths {
    pub fn for_epoch(output_dir: impl AsRef<Path>, epoch: u64) -> Self {
        let dir = output_dir.as_ref();
        Self {
            model: dir.join(format!("{MODEL_PREFIX}.{epoch}.{EXTENSION}")),
            optimizer: dir.join(format!("{OPTIMIZER_PREFIX}.{epoch}.{EXTENSION}")),
        }
    }
}

fn epoch_of(file_name: &str, prefix: &str) -> Option<u64> {
    file_name
        .strip_prefix(prefix)?
        .strip_prefix('.')?
        .strip_suffix(EXTENSION)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

/// Finds the newest epoch for which both `model.<N>.bin` and `optim.<N>.bin`
/// exist in `output_dir`, i.e. the epoch training can resume from.
///
/// A directory that doesn't exist yet has no checkpoints.
pub fn get_max_epoch_model(
    output_dir: impl AsRef<Path>,
) -> Result<Option<u64>, CheckpointError> {
    let dir = output_dir.as_ref();
    let read_dir_err = |source| CheckpointError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(read_dir_err(source)),
    };

    let mut model_epochs = BTreeSet::new();
    let mut optimizer_epochs = BTreeSet::new();
    for entry in entries {
        let file_name = entry.map_err(read_dir_err)?.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if let Some(epoch) = epoch_of(file_name, MODEL_PREFIX) {
            model_epochs.insert(epoch);
        } else if let Some(epoch) = epoch_of(file_name, OPTIMIZER_PREFIX) {
            optimizer_epochs.insert(epoch);
        }
    }
    debug!(
        "found {} model and {} optimizer checkpoints in {}",
        model_epochs.len(),
        optimizer_epochs.len(),
        dir.display()
    );

    Ok(model_epochs.intersection(&optimizer_epochs).max().copied())
}
