//! Per-loader helpers
//!
//! Each class loader talks to the shared cache through helpers. There are
//! three kinds, differing only in how entries are addressed:
//!
//! | Kind | Addressing | Freshness checked |
//! |------|------------|-------------------|
//! | Token | caller-chosen string | no |
//! | URL | one jar/zip/directory URL | yes |
//! | URL classpath | ordered URL list, first match wins | yes |
//!
//! URL and classpath helpers see each other's entries.

pub mod classpath;
pub mod token;
pub mod url_helper;

pub use classpath::{ClasspathHelper, ClasspathHit};
pub use token::TokenHelper;
pub use url_helper::UrlHelper;

use crate::error::{SharedClassError, SharedClassResult};
use crate::filter::{self, ClassFilter, Operation};
use crate::freshness::{Freshness, FreshnessProbe};
use crate::loader::LoaderId;
use crate::store::{CacheKey, CacheStore, StoredClass};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// The addressing scheme of a helper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HelperKind {
    Token,
    Url,
    UrlClasspath,
}

impl fmt::Display for HelperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token => write!(f, "token"),
            Self::Url => write!(f, "url"),
            Self::UrlClasspath => write!(f, "url-classpath"),
        }
    }
}

/// Result of a freshness-checked lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Fresh entry
    Hit(Vec<u8>),
    /// No entry
    Miss,
    /// Entries exist but their source has changed since they were stored
    Stale,
}

impl Lookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// Bytes for a hit; stale entries count as misses
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Self::Hit(bytes) => Some(bytes),
            Self::Miss | Self::Stale => None,
        }
    }
}

/// A loader's helper, whichever kind it is
#[derive(Debug, Clone)]
pub enum Helper {
    Token(Arc<TokenHelper>),
    Url(Arc<UrlHelper>),
    UrlClasspath(Arc<ClasspathHelper>),
}

impl Helper {
    pub fn kind(&self) -> HelperKind {
        match self {
            Self::Token(_) => HelperKind::Token,
            Self::Url(_) => HelperKind::Url,
            Self::UrlClasspath(_) => HelperKind::UrlClasspath,
        }
    }

    pub fn owner(&self) -> LoaderId {
        self.core().owner
    }

    /// The sharing filter attached at creation, if any
    pub fn filter(&self) -> Option<&Arc<dyn ClassFilter>> {
        self.core().filter.as_ref()
    }

    /// Whether both handles refer to the same helper instance
    pub fn same_as(&self, other: &Helper) -> bool {
        match (self, other) {
            (Self::Token(a), Self::Token(b)) => Arc::ptr_eq(a, b),
            (Self::Url(a), Self::Url(b)) => Arc::ptr_eq(a, b),
            (Self::UrlClasspath(a), Self::UrlClasspath(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_token(&self) -> Option<&Arc<TokenHelper>> {
        match self {
            Self::Token(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_url(&self) -> Option<&Arc<UrlHelper>> {
        match self {
            Self::Url(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_classpath(&self) -> Option<&Arc<ClasspathHelper>> {
        match self {
            Self::UrlClasspath(h) => Some(h),
            _ => None,
        }
    }

    fn core(&self) -> &HelperCore {
        match self {
            Self::Token(h) => &h.core,
            Self::Url(h) => &h.core,
            Self::UrlClasspath(h) => &h.core,
        }
    }
}

/// Collaborators shared by every helper kind
pub(crate) struct HelperCore {
    pub(crate) owner: LoaderId,
    pub(crate) filter: Option<Arc<dyn ClassFilter>>,
    pub(crate) store: Arc<dyn CacheStore>,
    pub(crate) probe: Arc<dyn FreshnessProbe>,
}

impl fmt::Debug for HelperCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperCore")
            .field("owner", &self.owner)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl HelperCore {
    pub(crate) fn new(
        owner: LoaderId,
        filter: Option<Arc<dyn ClassFilter>>,
        store: Arc<dyn CacheStore>,
        probe: Arc<dyn FreshnessProbe>,
    ) -> Self {
        Self {
            owner,
            filter,
            store,
            probe,
        }
    }

    /// Validate the class name and consult the filter
    pub(crate) fn admit(&self, class_name: &str, operation: Operation) -> SharedClassResult<()> {
        if class_name.trim().is_empty() {
            return Err(SharedClassError::InvalidArgument(
                "class name must not be empty".to_string(),
            ));
        }
        filter::check(self.filter.as_deref(), class_name, operation)
    }

    pub(crate) fn put(
        &self,
        key: &CacheKey,
        class_name: &str,
        bytes: &[u8],
        freshness: Freshness,
    ) -> SharedClassResult<()> {
        let entry = StoredClass::new(class_name, bytes.to_vec(), freshness);
        self.store.put(key, entry).map_err(|e| {
            warn!("{} could not store {}: {}", self.owner, class_name, e);
            SharedClassError::from(e)
        })?;
        debug!("{} stored {} ({} bytes)", self.owner, class_name, bytes.len());
        Ok(())
    }

    /// Fetch `key` and classify it against the current freshness token
    pub(crate) fn fetch(&self, key: &CacheKey, current: &Freshness) -> SharedClassResult<Lookup> {
        match self.store.get(key)? {
            None => Ok(Lookup::Miss),
            Some(entry) if entry.freshness.matches(current) => Ok(Lookup::Hit(entry.bytes)),
            Some(entry) => {
                debug!(
                    "{} found stale {} stored at {}",
                    self.owner, entry.class_name, entry.stored_at
                );
                Ok(Lookup::Stale)
            }
        }
    }

    /// `fetch` for one of several candidates: an unreadable entry is
    /// logged and counts as a miss so the scan can move on
    pub(crate) fn fetch_candidate(&self, key: &CacheKey, current: &Freshness) -> Lookup {
        self.fetch(key, current).unwrap_or_else(|e| {
            warn!("{} skipping unreadable cache entry {}: {}", self.owner, key.digest(), e);
            Lookup::Miss
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn kind_display() {
        assert_eq!(HelperKind::Token.to_string(), "token");
        assert_eq!(HelperKind::UrlClasspath.to_string(), "url-classpath");
    }

    #[test]
    fn lookup_stale_is_a_miss() {
        assert_eq!(Lookup::Stale.into_bytes(), None);
        assert!(Lookup::Hit(vec![1]).is_hit());
    }

    #[test]
    fn same_as_compares_identity() {
        let store = Arc::new(MemoryStore::new());
        let a = Helper::Token(Arc::new(TokenHelper::new(testing::core_with(store.clone(), None))));
        let b = Helper::Token(Arc::new(TokenHelper::new(testing::core_with(store, None))));

        assert!(a.same_as(&a.clone()));
        assert!(!a.same_as(&b));
        assert_eq!(a.kind(), HelperKind::Token);
        assert!(a.as_url().is_none());
    }

    #[test]
    fn empty_class_name_is_rejected() {
        let core = testing::core_with(Arc::new(MemoryStore::new()), None);
        assert!(matches!(
            core.admit("", Operation::Find),
            Err(SharedClassError::InvalidArgument(_))
        ));
    }
}
