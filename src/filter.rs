//! Sharing filters
//!
//! A filter is attached to a helper when the helper is created and vetoes
//! individual store or find operations by class name. Filters must not
//! touch the cache; they may consult their own inputs (a deny-list file,
//! for example) when constructed.

use crate::error::{SharedClassError, SharedClassResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Cache operation a filter is asked about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Store,
    Find,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store => write!(f, "store"),
            Self::Find => write!(f, "find"),
        }
    }
}

/// Filter verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Per-helper predicate restricting which classes are shared
pub trait ClassFilter: Send + Sync + fmt::Debug {
    fn decide(&self, class_name: &str, operation: Operation) -> Decision;
}

/// Return `DeniedByFilter` when `filter` vetoes the operation
pub(crate) fn check(
    filter: Option<&dyn ClassFilter>,
    class_name: &str,
    operation: Operation,
) -> SharedClassResult<()> {
    match filter.map(|f| f.decide(class_name, operation)) {
        Some(Decision::Deny) => {
            debug!("Filter denied {} of {}", operation, class_name);
            Err(SharedClassError::denied(class_name, operation))
        }
        _ => Ok(()),
    }
}

/// Denies classes by exact name or package prefix, per operation
///
/// A pattern ending in `.` or `*` matches every class under that prefix;
/// any other pattern matches one class exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixFilter {
    deny_store: Vec<String>,
    deny_find: Vec<String>,
}

impl PrefixFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deny both store and find for `pattern`
    pub fn deny(self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        self.deny_store(pattern.clone()).deny_find(pattern)
    }

    pub fn deny_store(mut self, pattern: impl Into<String>) -> Self {
        self.deny_store.push(pattern.into());
        self
    }

    pub fn deny_find(mut self, pattern: impl Into<String>) -> Self {
        self.deny_find.push(pattern.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.deny_store.is_empty() && self.deny_find.is_empty()
    }

    fn matches(pattern: &str, class_name: &str) -> bool {
        if let Some(prefix) = pattern.strip_suffix('*') {
            class_name.starts_with(prefix)
        } else if pattern.ends_with('.') {
            class_name.starts_with(pattern)
        } else {
            pattern == class_name
        }
    }
}

impl ClassFilter for PrefixFilter {
    fn decide(&self, class_name: &str, operation: Operation) -> Decision {
        let patterns = match operation {
            Operation::Store => &self.deny_store,
            Operation::Find => &self.deny_find,
        };
        if patterns.iter().any(|p| Self::matches(p, class_name)) {
            Decision::Deny
        } else {
            Decision::Allow
        }
    }
}

/// Prefix filter loaded from a deny-list file
///
/// One pattern per line; blank lines and `#` comments are ignored. A line
/// may be prefixed with `store:` or `find:` to restrict it to one operation.
#[derive(Debug, Clone)]
pub struct DenyListFilter {
    inner: PrefixFilter,
}

impl DenyListFilter {
    pub fn from_file(path: &Path) -> SharedClassResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SharedClassError::io(format!("reading deny list {}", path.display()), e)
        })?;
        let filter = Self::parse(&content);
        debug!(
            "Loaded deny list {} ({} store, {} find patterns)",
            path.display(),
            filter.inner.deny_store.len(),
            filter.inner.deny_find.len()
        );
        Ok(filter)
    }

    pub fn parse(content: &str) -> Self {
        let mut inner = PrefixFilter::new();
        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            inner = if let Some(p) = line.strip_prefix("store:") {
                inner.deny_store(p.trim())
            } else if let Some(p) = line.strip_prefix("find:") {
                inner.deny_find(p.trim())
            } else {
                inner.deny(line)
            };
        }
        Self { inner }
    }

    /// Fold the loaded patterns into `filter`
    pub fn merge_into(self, mut filter: PrefixFilter) -> PrefixFilter {
        filter.deny_store.extend(self.inner.deny_store);
        filter.deny_find.extend(self.inner.deny_find);
        filter
    }
}

impl ClassFilter for DenyListFilter {
    fn decide(&self, class_name: &str, operation: Operation) -> Decision {
        self.inner.decide(class_name, operation)
    }
}

/// Filter backed by a closure
pub struct FnFilter<F>(pub F);

impl<F> fmt::Debug for FnFilter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnFilter")
    }
}

impl<F> ClassFilter for FnFilter<F>
where
    F: Fn(&str, Operation) -> Decision + Send + Sync,
{
    fn decide(&self, class_name: &str, operation: Operation) -> Decision {
        (self.0)(class_name, operation)
    }
}
