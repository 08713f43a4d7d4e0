//! Class loader identity
//!
//! A `LoaderId` is an opaque, never-reused handle compared by value only.
//! The registry is keyed by `LoaderId` and never owns a `ClassLoader`;
//! the `ClassLoader` handle instead keeps a weak back-reference to the
//! registry and drops its entry when it is finalized.

use crate::registry::HelperRegistry;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;
use tracing::debug;

static NEXT_LOADER_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a class loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoaderId(u64);

impl LoaderId {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        Self(NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loader#{}", self.0)
    }
}

/// Handle representing a live class loader
///
/// Dropping the handle is the loader's finalization: its helpers are
/// removed from the registry it was attached to.
#[derive(Debug)]
pub struct ClassLoader {
    id: LoaderId,
    name: String,
    registry: Weak<HelperRegistry>,
}

impl ClassLoader {
    pub(crate) fn attached(name: impl Into<String>, registry: Weak<HelperRegistry>) -> Self {
        let loader = Self {
            id: LoaderId::next(),
            name: name.into(),
            registry,
        };
        debug!("Registered class loader {} ({})", loader.id, loader.name);
        loader
    }

    /// Identity used for registry lookups
    pub fn id(&self) -> LoaderId {
        self.id
    }

    /// Human-readable loader name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finalize the loader now instead of waiting for it to go out of scope
    pub fn finalize(self) {}
}

impl Drop for ClassLoader {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}
