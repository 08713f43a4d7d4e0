//! Freshness tokens for cached classes
//!
//! A freshness token snapshots the state of the archive or class file a
//! class was loaded from. Entries whose recorded token no longer matches
//! the current one are stale and must not be served.

use crate::source::SourceUrl;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Snapshot of a class source's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Freshness {
    /// Modification time and length of the backing file
    Metadata { modified: DateTime<Utc>, len: u64 },
    /// SHA256 of the backing file contents (first 16 bytes, hex)
    Digest { sha256: String },
    /// Entries stored by token carry no freshness information
    Untracked,
}

impl Freshness {
    /// Whether an entry recorded with `self` may be served given `current`
    pub fn matches(&self, current: &Freshness) -> bool {
        match (self, current) {
            (Self::Untracked, _) => true,
            (recorded, current) => recorded == current,
        }
    }
}

/// How freshness tokens are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshnessMode {
    /// Compare modification time and size
    #[default]
    Metadata,
    /// Compare content digests
    Digest,
}

impl fmt::Display for FreshnessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata => write!(f, "metadata"),
            Self::Digest => write!(f, "digest"),
        }
    }
}

/// Collaborator that inspects a source URL's current content
pub trait FreshnessProbe: Send + Sync {
    /// Current token for `class_name` loaded from `source`, or `None` when the
    /// backing file cannot be inspected.
    fn probe(&self, source: &SourceUrl, class_name: &str) -> Option<Freshness>;
}

/// Probe backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe {
    mode: FreshnessMode,
}

impl FsProbe {
    pub fn new(mode: FreshnessMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> FreshnessMode {
        self.mode
    }
}

impl FreshnessProbe for FsProbe {
    fn probe(&self, source: &SourceUrl, class_name: &str) -> Option<Freshness> {
        let location = source.class_location(class_name)?;
        let result = match self.mode {
            FreshnessMode::Metadata => metadata_token(&location),
            FreshnessMode::Digest => digest_token(&location),
        };

        match result {
            Ok(token) => Some(token),
            Err(e) => {
                debug!("Cannot probe {}: {}", location.display(), e);
                None
            }
        }
    }
}

fn metadata_token(path: &Path) -> std::io::Result<Freshness> {
    let meta = fs::metadata(path)?;
    Ok(Freshness::Metadata {
        modified: DateTime::<Utc>::from(meta.modified()?),
        len: meta.len(),
    })
}

fn digest_token(path: &Path) -> std::io::Result<Freshness> {
    let contents = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&contents);
    let result = hasher.finalize();

    Ok(Freshness::Digest {
        sha256: hex::encode(&result[..16]),
    })
}
