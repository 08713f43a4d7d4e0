//! Loader to helper registry
//!
//! The registry is the single record of which helpers each class loader
//! owns. It never holds a loader, only its `LoaderId`; loaders drop their
//! own entry when finalized.
//!
//! # Locking
//!
//! The map lock is held only to find or insert a loader's slot. Creation
//! and reuse decisions happen under that slot's own mutex, so requests
//! for different loaders proceed in parallel while requests for the same
//! loader are serialized.
//!
//! # Modes
//!
//! | Mode | Invariant |
//! |------|-----------|
//! | `PerKind` | at most one helper of each kind per loader |
//! | `Single` | at most one helper per loader |

use crate::error::{SharedClassError, SharedClassResult};
use crate::filter::ClassFilter;
use crate::freshness::FreshnessProbe;
use crate::helper::{
    ClasspathHelper, Helper, HelperCore, HelperKind, TokenHelper, UrlHelper,
};
use crate::loader::{ClassLoader, LoaderId};
use crate::source::SourceUrl;
use crate::store::CacheStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// How many helpers a loader may own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HelperMode {
    /// One helper in total, of any kind
    #[default]
    Single,
    /// One helper per kind
    PerKind,
}

impl fmt::Display for HelperMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerKind => write!(f, "per-kind"),
            Self::Single => write!(f, "single"),
        }
    }
}

/// Kind-specific arguments for creating a helper
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperRequest {
    Token,
    Url,
    UrlClasspath(Vec<SourceUrl>),
}

impl HelperRequest {
    pub fn kind(&self) -> HelperKind {
        match self {
            Self::Token => HelperKind::Token,
            Self::Url => HelperKind::Url,
            Self::UrlClasspath(_) => HelperKind::UrlClasspath,
        }
    }
}

#[derive(Debug, Default)]
struct LoaderSlot {
    token: Option<Arc<TokenHelper>>,
    url: Option<Arc<UrlHelper>>,
    classpath: Option<Arc<ClasspathHelper>>,
    removed: bool,
}

impl LoaderSlot {
    fn get(&self, kind: HelperKind) -> Option<Helper> {
        match kind {
            HelperKind::Token => self.token.clone().map(Helper::Token),
            HelperKind::Url => self.url.clone().map(Helper::Url),
            HelperKind::UrlClasspath => self.classpath.clone().map(Helper::UrlClasspath),
        }
    }

    fn helpers(&self) -> Vec<Helper> {
        [HelperKind::Token, HelperKind::Url, HelperKind::UrlClasspath]
            .into_iter()
            .filter_map(|kind| self.get(kind))
            .collect()
    }

    fn insert(&mut self, helper: Helper) {
        match helper {
            Helper::Token(h) => self.token = Some(h),
            Helper::Url(h) => self.url = Some(h),
            Helper::UrlClasspath(h) => self.classpath = Some(h),
        }
    }

    fn clear(&mut self) -> usize {
        let count = self.helpers().len();
        self.token = None;
        self.url = None;
        self.classpath = None;
        self.removed = true;
        count
    }
}

/// Process-wide record of the helpers each loader owns
pub struct HelperRegistry {
    mode: HelperMode,
    store: Arc<dyn CacheStore>,
    probe: Arc<dyn FreshnessProbe>,
    slots: RwLock<HashMap<LoaderId, Arc<Mutex<LoaderSlot>>>>,
}

impl fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperRegistry")
            .field("mode", &self.mode)
            .field("loaders", &self.loader_count())
            .finish_non_exhaustive()
    }
}

impl HelperRegistry {
    pub fn new(
        mode: HelperMode,
        store: Arc<dyn CacheStore>,
        probe: Arc<dyn FreshnessProbe>,
    ) -> Arc<Self> {
        Arc::new(Self {
            mode,
            store,
            probe,
            slots: RwLock::default(),
        })
    }

    pub fn mode(&self) -> HelperMode {
        self.mode
    }

    /// Create a loader whose finalization removes its helpers from `self`
    pub fn loader(self: &Arc<Self>, name: impl Into<String>) -> ClassLoader {
        ClassLoader::attached(name, Arc::downgrade(self))
    }

    /// Number of loaders currently owning a registry entry
    pub fn loader_count(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Return the loader's helper of the requested kind, creating it if needed
    pub fn get_or_create(
        &self,
        loader: LoaderId,
        request: HelperRequest,
        filter: Option<Arc<dyn ClassFilter>>,
    ) -> SharedClassResult<Helper> {
        let slot = self.slot(loader);
        let mut slot = lock(&slot);
        if slot.removed {
            return Err(SharedClassError::LoaderFinalized(loader));
        }

        let requested = request.kind();
        if self.mode == HelperMode::Single {
            if let Some(existing) = slot.helpers().into_iter().find(|h| h.kind() != requested) {
                warn!(
                    "{} requested a {} helper but owns a {} helper",
                    loader,
                    requested,
                    existing.kind()
                );
                return Err(SharedClassError::ConflictingHelperKind {
                    loader,
                    existing: existing.kind(),
                    requested,
                });
            }
        }

        if let Some(existing) = slot.get(requested) {
            return Self::reuse(loader, existing, &request, filter.is_some());
        }

        let core = HelperCore::new(loader, filter, self.store.clone(), self.probe.clone());
        let helper = match request {
            HelperRequest::Token => Helper::Token(Arc::new(TokenHelper::new(core))),
            HelperRequest::Url => Helper::Url(Arc::new(UrlHelper::new(core))),
            HelperRequest::UrlClasspath(classpath) => {
                Helper::UrlClasspath(Arc::new(ClasspathHelper::new(core, classpath)))
            }
        };
        slot.insert(helper.clone());
        info!("Created {} helper for {}", requested, loader);
        Ok(helper)
    }

    fn reuse(
        loader: LoaderId,
        existing: Helper,
        request: &HelperRequest,
        filter_given: bool,
    ) -> SharedClassResult<Helper> {
        if let (Helper::UrlClasspath(helper), HelperRequest::UrlClasspath(classpath)) =
            (&existing, request)
        {
            if !helper.extend_to(classpath) {
                warn!("{} requested a classpath helper with a different classpath", loader);
                return Err(SharedClassError::ConflictingHelperKind {
                    loader,
                    existing: HelperKind::UrlClasspath,
                    requested: HelperKind::UrlClasspath,
                });
            }
        }
        if filter_given {
            debug!("{} already has a {} helper, ignoring new filter", loader, existing.kind());
        }
        debug!("Reusing {} helper for {}", existing.kind(), loader);
        Ok(existing)
    }

    /// The loader's only helper
    ///
    /// Fails with `MultipleHelpersPresent` when the loader owns more than one.
    pub fn find(&self, loader: LoaderId) -> SharedClassResult<Option<Helper>> {
        let mut helpers = self.find_all(loader);
        match helpers.len() {
            0 => Ok(None),
            1 => Ok(helpers.pop()),
            count => Err(SharedClassError::MultipleHelpersPresent { loader, count }),
        }
    }

    /// Every helper the loader owns, ordered token, URL, classpath
    pub fn find_all(&self, loader: LoaderId) -> Vec<Helper> {
        let slot = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&loader)
            .cloned();
        slot.map(|s| lock(&s).helpers()).unwrap_or_default()
    }

    /// Drop the loader's entry
    ///
    /// Helpers already handed out stay usable by callers holding them, so
    /// calls in progress complete normally.
    pub fn remove(&self, loader: LoaderId) {
        let slot = self
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&loader);
        if let Some(slot) = slot {
            let count = lock(&slot).clear();
            info!("Removed {} helpers for finalized {}", count, loader);
        }
    }

    fn slot(&self, loader: LoaderId) -> Arc<Mutex<LoaderSlot>> {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&loader)
        {
            return slot.clone();
        }
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(loader)
            .or_default()
            .clone()
    }
}

fn lock(slot: &Mutex<LoaderSlot>) -> MutexGuard<'_, LoaderSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
