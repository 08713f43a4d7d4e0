//! Helper factory
//!
//! Public entry point for class loaders. Each getter returns the loader's
//! existing helper of that kind or creates one; asking for a kind the
//! loader may not own fails instead of returning a partial helper.

use crate::config::{Config, ConfigManager};
use crate::error::{SharedClassError, SharedClassResult};
use crate::filter::ClassFilter;
use crate::freshness::{FreshnessProbe, FsProbe};
use crate::helper::{ClasspathHelper, Helper, HelperKind, TokenHelper, UrlHelper};
use crate::loader::ClassLoader;
use crate::registry::{HelperMode, HelperRegistry, HelperRequest};
use crate::source::SourceUrl;
use crate::store::{CacheStore, DirStore, MemoryStore};
use std::sync::Arc;
use tracing::debug;

/// Creates and looks up helpers for class loaders
#[derive(Debug, Clone)]
pub struct HelperFactory {
    registry: Arc<HelperRegistry>,
}

impl HelperFactory {
    pub fn new(
        mode: HelperMode,
        store: Arc<dyn CacheStore>,
        probe: Arc<dyn FreshnessProbe>,
    ) -> Self {
        Self {
            registry: HelperRegistry::new(mode, store, probe),
        }
    }

    /// Factory over an in-process store with default settings
    pub fn in_memory() -> Self {
        Self::new(
            HelperMode::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(FsProbe::default()),
        )
    }

    /// Factory over the directory store described by `config`
    pub fn from_config(config: &Config) -> SharedClassResult<Self> {
        let dir = ConfigManager::cache_dir(config);
        let mut store = DirStore::open(&dir)?;
        if let Some(capacity) = config.cache.capacity_bytes {
            store = store.with_capacity(capacity)?;
        }
        debug!(
            "Helper factory using {} ({} mode, {} freshness)",
            dir.display(),
            config.cache.helper_mode,
            config.cache.freshness
        );
        Ok(Self::new(
            config.cache.helper_mode,
            Arc::new(store),
            Arc::new(config.probe()),
        ))
    }

    pub fn mode(&self) -> HelperMode {
        self.registry.mode()
    }

    pub fn registry(&self) -> &Arc<HelperRegistry> {
        &self.registry
    }

    /// Register a new class loader; dropping it removes its helpers
    pub fn new_loader(&self, name: impl Into<String>) -> ClassLoader {
        self.registry.loader(name)
    }

    pub fn get_token_helper(&self, loader: &ClassLoader) -> SharedClassResult<Arc<TokenHelper>> {
        self.token_helper(loader, None)
    }

    pub fn get_token_helper_with_filter(
        &self,
        loader: &ClassLoader,
        filter: Arc<dyn ClassFilter>,
    ) -> SharedClassResult<Arc<TokenHelper>> {
        self.token_helper(loader, Some(filter))
    }

    pub fn get_url_helper(&self, loader: &ClassLoader) -> SharedClassResult<Arc<UrlHelper>> {
        self.url_helper(loader, None)
    }

    pub fn get_url_helper_with_filter(
        &self,
        loader: &ClassLoader,
        filter: Arc<dyn ClassFilter>,
    ) -> SharedClassResult<Arc<UrlHelper>> {
        self.url_helper(loader, Some(filter))
    }

    /// Get the loader's classpath helper
    ///
    /// An existing helper is returned when `classpath` equals its classpath
    /// or appends to it (the helper's classpath is extended). Any other
    /// classpath fails with `ConflictingHelperKind`.
    pub fn get_url_classpath_helper(
        &self,
        loader: &ClassLoader,
        classpath: &[SourceUrl],
    ) -> SharedClassResult<Arc<ClasspathHelper>> {
        self.classpath_helper(loader, classpath, None)
    }

    pub fn get_url_classpath_helper_with_filter(
        &self,
        loader: &ClassLoader,
        classpath: &[SourceUrl],
        filter: Arc<dyn ClassFilter>,
    ) -> SharedClassResult<Arc<ClasspathHelper>> {
        self.classpath_helper(loader, classpath, Some(filter))
    }

    /// The loader's helper, if it has exactly one
    ///
    /// Fails with `MultipleHelpersPresent` when the helper is ambiguous.
    pub fn find_helper_for_loader(
        &self,
        loader: &ClassLoader,
    ) -> SharedClassResult<Option<Helper>> {
        self.registry.find(loader.id())
    }

    pub fn find_all_helpers_for_loader(&self, loader: &ClassLoader) -> Vec<Helper> {
        self.registry.find_all(loader.id())
    }

    fn token_helper(
        &self,
        loader: &ClassLoader,
        filter: Option<Arc<dyn ClassFilter>>,
    ) -> SharedClassResult<Arc<TokenHelper>> {
        match self
            .registry
            .get_or_create(loader.id(), HelperRequest::Token, filter)?
        {
            Helper::Token(helper) => Ok(helper),
            other => Err(mismatch(loader, &other, HelperKind::Token)),
        }
    }

    fn url_helper(
        &self,
        loader: &ClassLoader,
        filter: Option<Arc<dyn ClassFilter>>,
    ) -> SharedClassResult<Arc<UrlHelper>> {
        match self
            .registry
            .get_or_create(loader.id(), HelperRequest::Url, filter)?
        {
            Helper::Url(helper) => Ok(helper),
            other => Err(mismatch(loader, &other, HelperKind::Url)),
        }
    }

    fn classpath_helper(
        &self,
        loader: &ClassLoader,
        classpath: &[SourceUrl],
        filter: Option<Arc<dyn ClassFilter>>,
    ) -> SharedClassResult<Arc<ClasspathHelper>> {
        let request = HelperRequest::UrlClasspath(classpath.to_vec());
        match self.registry.get_or_create(loader.id(), request, filter)? {
            Helper::UrlClasspath(helper) => Ok(helper),
            other => Err(mismatch(loader, &other, HelperKind::UrlClasspath)),
        }
    }
}

fn mismatch(loader: &ClassLoader, found: &Helper, requested: HelperKind) -> SharedClassError {
    SharedClassError::ConflictingHelperKind {
        loader: loader.id(),
        existing: found.kind(),
        requested,
    }
}
