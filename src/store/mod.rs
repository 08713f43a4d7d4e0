//! Cache store boundary
//!
//! Helpers talk to the shared cache only through [`CacheStore`]: keyed
//! puts and gets of class bytes plus their freshness token, and a per-class
//! key listing used to make URL and classpath entries mutually visible.
//!
//! # Keys
//!
//! | Key | Written by | Identity |
//! |-----|------------|----------|
//! | `Token` | token helper | caller-chosen string |
//! | `Url` | URL helper | source URL + class name |
//! | `Classpath` | classpath helper | digest of URLs `0..=index` + class name |

pub mod dir;
pub mod memory;

pub use dir::DirStore;
pub use memory::MemoryStore;

use crate::error::StoreResult;
use crate::freshness::Freshness;
use crate::source::SourceUrl;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Address of a cached class
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheKey {
    Token {
        token: String,
    },
    Url {
        url: SourceUrl,
        class_name: String,
    },
    Classpath {
        /// Digest of the classpath up to and including `index`
        prefix: String,
        index: usize,
        /// The URL at `index`, i.e. the one the class came from
        url: SourceUrl,
        class_name: String,
    },
}

impl CacheKey {
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token {
            token: token.into(),
        }
    }

    pub fn url(url: SourceUrl, class_name: impl Into<String>) -> Self {
        Self::Url {
            url,
            class_name: class_name.into(),
        }
    }

    /// Key for a class found at `index` of `classpath`
    ///
    /// Panics if `index` is out of bounds; callers resolve the index
    /// against the same classpath.
    pub fn classpath(classpath: &[SourceUrl], index: usize, class_name: impl Into<String>) -> Self {
        Self::Classpath {
            prefix: prefix_digest(&classpath[..=index]),
            index,
            url: classpath[index].clone(),
            class_name: class_name.into(),
        }
    }

    /// Source URL a URL-addressed key points at
    pub fn source(&self) -> Option<&SourceUrl> {
        match self {
            Self::Token { .. } => None,
            Self::Url { url, .. } | Self::Classpath { url, .. } => Some(url),
        }
    }

    /// Stable hex digest of the key, usable as a file name
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        match self {
            Self::Token { token } => {
                hasher.update(b"token\0");
                hasher.update(token.as_bytes());
            }
            Self::Url { url, class_name } => {
                hasher.update(b"url\0");
                hasher.update(url.as_str().as_bytes());
                hasher.update(b"\0");
                hasher.update(class_name.as_bytes());
            }
            Self::Classpath {
                prefix,
                index,
                class_name,
                ..
            } => {
                hasher.update(b"classpath\0");
                hasher.update(prefix.as_bytes());
                hasher.update(index.to_le_bytes());
                hasher.update(class_name.as_bytes());
            }
        }
        hex::encode(&hasher.finalize()[..16])
    }
}

/// Digest identifying an ordered run of classpath URLs
pub fn prefix_digest(urls: &[SourceUrl]) -> String {
    let mut hasher = Sha256::new();
    for url in urls {
        hasher.update(url.as_str().as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(&hasher.finalize()[..12])
}

/// A cached class as held by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredClass {
    pub class_name: String,
    pub bytes: Vec<u8>,
    pub freshness: Freshness,
    pub stored_at: DateTime<Utc>,
}

impl StoredClass {
    pub fn new(class_name: impl Into<String>, bytes: Vec<u8>, freshness: Freshness) -> Self {
        Self {
            class_name: class_name.into(),
            bytes,
            freshness,
            stored_at: Utc::now(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Keyed class store shared between helpers and processes
///
/// Implementations provide their own synchronization; helpers call them
/// concurrently without additional locking.
pub trait CacheStore: Send + Sync {
    /// Insert or overwrite the entry for `key`
    fn put(&self, key: &CacheKey, entry: StoredClass) -> StoreResult<()>;

    /// Fetch the entry for `key`, if any
    fn get(&self, key: &CacheKey) -> StoreResult<Option<StoredClass>>;

    /// Every URL or classpath key currently holding an entry for `class_name`
    ///
    /// Token keys are always addressed directly and may be left out.
    fn keys_for_class(&self, class_name: &str) -> StoreResult<Vec<CacheKey>>;
}
