use anyhow::{bail, Error};
use std::fmt;

/// Role of this process in the one-writer / many-readers feature cache protocol,
/// derived from the launcher's local rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalRank {
    /// `-1`: not a distributed run.
    Standalone,
    /// `0`: builds and writes the shared cache.
    Leader,
    /// `n > 0`: waits for the leader, then reads the cache.
    Follower(usize),
}

impl LocalRank {
    /// Whether this process may build the features and write the cache.
    pub fn is_designated(&self) -> bool {
        matches!(self, LocalRank::Standalone | LocalRank::Leader)
    }

    pub fn waits_before_build(&self) -> bool {
        matches!(self, LocalRank::Follower(_))
    }

    pub fn waits_after_build(&self) -> bool {
        matches!(self, LocalRank::Leader)
    }
}

impl TryFrom<i64> for LocalRank {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Standalone),
            0 => Ok(Self::Leader),
            n if n > 0 => Ok(Self::Follower(n as usize)),
            n => bail!("Invalid local rank {n}, expected -1 or a non-negative rank"),
        }
    }
}

impl fmt::Display for LocalRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalRank::Standalone => write!(f, "standalone"),
            LocalRank::Leader => write!(f, "rank 0"),
            LocalRank::Follower(n) => write!(f, "rank {n}"),
        }
    }
}
