//! Single-URL helper

use crate::error::{SharedClassError, SharedClassResult};
use crate::filter::Operation;
use crate::freshness::Freshness;
use crate::helper::{HelperCore, Lookup};
use crate::loader::LoaderId;
use crate::source::SourceUrl;
use crate::store::CacheKey;
use tracing::debug;

/// Helper for loaders that load classes from arbitrary URLs
///
/// Every find re-checks the source's freshness. Entries stored by
/// classpath helpers against the same URL are visible here too.
#[derive(Debug)]
pub struct UrlHelper {
    pub(crate) core: HelperCore,
}

impl UrlHelper {
    pub(crate) fn new(core: HelperCore) -> Self {
        Self { core }
    }

    pub fn owner(&self) -> LoaderId {
        self.core.owner
    }

    /// Store `bytes` for `class_name` as loaded from `url`
    pub fn store(&self, url: &SourceUrl, class_name: &str, bytes: &[u8]) -> SharedClassResult<()> {
        self.core.admit(class_name, Operation::Store)?;
        url.ensure_cacheable()?;
        let freshness = current_freshness(&self.core, url, class_name)?;
        self.core
            .put(&CacheKey::url(url.clone(), class_name), class_name, bytes, freshness)
    }

    /// Find `class_name` as loaded from `url`
    pub fn find(&self, url: &SourceUrl, class_name: &str) -> SharedClassResult<Lookup> {
        self.core.admit(class_name, Operation::Find)?;
        let Some(current) = self.core.probe.probe(url, class_name) else {
            debug!("No freshness for {} in {}, treating as miss", class_name, url);
            return Ok(Lookup::Miss);
        };

        let own = CacheKey::url(url.clone(), class_name);
        let mut candidates = vec![own.clone()];
        candidates.extend(
            self.core
                .store
                .keys_for_class(class_name)?
                .into_iter()
                .filter(|k| matches!(k, CacheKey::Classpath { .. }) && k.source() == Some(url)),
        );

        let mut outcome = Lookup::Miss;
        for key in &candidates {
            match self.core.fetch_candidate(key, &current) {
                Lookup::Hit(bytes) => {
                    debug!("{} hit {} from {}", self.core.owner, class_name, url);
                    return Ok(Lookup::Hit(bytes));
                }
                Lookup::Stale => outcome = Lookup::Stale,
                Lookup::Miss => {}
            }
        }
        Ok(outcome)
    }
}

/// Freshness token required to store against `url`
pub(crate) fn current_freshness(
    core: &HelperCore,
    url: &SourceUrl,
    class_name: &str,
) -> SharedClassResult<Freshness> {
    core.probe
        .probe(url, class_name)
        .ok_or_else(|| SharedClassError::UnsupportedUrl {
            url: url.to_string(),
            reason: format!("cannot read the source of {}", class_name),
        })
}
