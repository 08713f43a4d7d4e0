//! Error types for sharedclasses
//!
//! All modules use `SharedClassResult<T>` as their return type. Store
//! collaborators report `StoreError`, which converts into
//! `SharedClassError::Store` unchanged.

use crate::filter::Operation;
use crate::helper::HelperKind;
use crate::loader::LoaderId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sharedclasses operations
pub type SharedClassResult<T> = Result<T, SharedClassError>;

/// Result type alias for cache store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// All errors that can occur in sharedclasses
#[derive(Error, Debug)]
pub enum SharedClassError {
    // Registry errors
    #[error("Loader {loader} already owns a {existing} helper, cannot provide a {requested} helper")]
    ConflictingHelperKind {
        loader: LoaderId,
        existing: HelperKind,
        requested: HelperKind,
    },

    #[error("Loader {loader} owns {count} helpers, a single helper was requested")]
    MultipleHelpersPresent { loader: LoaderId, count: usize },

    #[error("Loader {0} has been finalized")]
    LoaderFinalized(LoaderId),

    // Classpath errors
    #[error("URL is not on the helper classpath: {url}")]
    NotOnClasspath { url: String },

    #[error("Classpath change at index {index} would alter the resolution of {class_name}")]
    IncompatibleClasspathChange { index: usize, class_name: String },

    #[error("Unsupported URL {url}: {reason}")]
    UnsupportedUrl { url: String, reason: String },

    // Filter errors
    #[error("Filter denied {operation} of {class_name}")]
    DeniedByFilter {
        class_name: String,
        operation: Operation,
    },

    // Store errors
    #[error("Cache store error: {0}")]
    Store(#[from] StoreError),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // Programmer errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Errors reported by a cache store collaborator
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cache is full: {needed} bytes needed, capacity {capacity} bytes")]
    Full { needed: u64, capacity: u64 },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt entry {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl StoreError {
    /// Create a store IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

impl SharedClassError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a filter denial error
    pub fn denied(class_name: impl Into<String>, operation: Operation) -> Self {
        Self::DeniedByFilter {
            class_name: class_name.into(),
            operation,
        }
    }

    /// Whether the caller should carry on with normal, uncached class loading
    pub fn is_cache_bypass(&self) -> bool {
        matches!(
            self,
            Self::DeniedByFilter { .. } | Self::Store(_) | Self::UnsupportedUrl { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConflictingHelperKind { .. } => {
                Some("Use the helper kind the loader already owns, or a separate loader")
            }
            Self::MultipleHelpersPresent { .. } => {
                Some("Look up all helpers for the loader instead of a single one")
            }
            Self::NotOnClasspath { .. } => Some("Append the URL to the classpath before storing"),
            Self::Store(StoreError::Full { .. }) => {
                Some("Raise cache.capacity_bytes or clear the cache directory")
            }
            Self::UnsupportedUrl { .. } => {
                Some("Only file: URLs to jars, zips or directories can be cached")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SharedClassError::NotOnClasspath {
            url: "file:/tmp/a.jar".to_string(),
        };
        assert!(err.to_string().contains("not on the helper classpath"));
    }

    #[test]
    fn error_hint() {
        let err = SharedClassError::NotOnClasspath {
            url: "file:/tmp/a.jar".to_string(),
        };
        assert!(err.hint().is_some());
        assert_eq!(SharedClassError::InvalidArgument("x".into()).hint(), None);
    }

    #[test]
    fn store_errors_bypass_cache() {
        let err: SharedClassError = StoreError::Full {
            needed: 10,
            capacity: 5,
        }
        .into();
        assert!(err.is_cache_bypass());
        assert!(SharedClassError::denied("com.Foo", Operation::Find).is_cache_bypass());
        assert!(!SharedClassError::InvalidArgument("empty".into()).is_cache_bypass());
    }
}
