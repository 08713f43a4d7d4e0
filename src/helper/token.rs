//! Token-addressed helper

use crate::error::{SharedClassError, SharedClassResult};
use crate::filter::Operation;
use crate::freshness::Freshness;
use crate::helper::HelperCore;
use crate::loader::LoaderId;
use crate::store::CacheKey;
use tracing::debug;

/// Helper for loaders that fully control cache keys
///
/// Entries are never checked for freshness; keeping tokens unique is the
/// loader's responsibility.
#[derive(Debug)]
pub struct TokenHelper {
    pub(crate) core: HelperCore,
}

impl TokenHelper {
    pub(crate) fn new(core: HelperCore) -> Self {
        Self { core }
    }

    pub fn owner(&self) -> LoaderId {
        self.core.owner
    }

    /// Store `bytes` for `class_name` under `token`, replacing any entry
    /// already held by that token
    pub fn store(&self, class_name: &str, token: &str, bytes: &[u8]) -> SharedClassResult<()> {
        self.core.admit(class_name, Operation::Store)?;
        let key = Self::key(token)?;
        self.core.put(&key, class_name, bytes, Freshness::Untracked)
    }

    /// Find the bytes stored for `class_name` under `token`
    pub fn find(&self, class_name: &str, token: &str) -> SharedClassResult<Option<Vec<u8>>> {
        self.core.admit(class_name, Operation::Find)?;
        let key = Self::key(token)?;

        match self.core.store.get(&key)? {
            Some(entry) if entry.class_name == class_name => Ok(Some(entry.bytes)),
            Some(entry) => {
                debug!(
                    "Token {} holds {}, not {}",
                    token, entry.class_name, class_name
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn key(token: &str) -> SharedClassResult<CacheKey> {
        if token.is_empty() {
            return Err(SharedClassError::InvalidArgument(
                "token must not be empty".to_string(),
            ));
        }
        Ok(CacheKey::token(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ClassFilter, PrefixFilter};
    use crate::helper::testing::core_with;
    use crate::store::{CacheStore, MemoryStore};
    use std::sync::Arc;

    #[test]
    fn store_then_find_is_byte_exact() {
        let helper = TokenHelper::new(core_with(Arc::new(MemoryStore::new()), None));
        let bytes: Vec<u8> = (0..=255).collect();

        helper.store("com.example.Foo", "v1", &bytes).unwrap();
        assert_eq!(helper.find("com.example.Foo", "v1").unwrap(), Some(bytes));
        assert_eq!(helper.find("com.example.Foo", "v2").unwrap(), None);
    }

    #[test]
    fn store_overwrites_token() {
        let helper = TokenHelper::new(core_with(Arc::new(MemoryStore::new()), None));
        helper.store("a.B", "t", b"old").unwrap();
        helper.store("a.B", "t", b"new").unwrap();
        assert_eq!(helper.find("a.B", "t").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn token_reused_for_other_class_misses() {
        let helper = TokenHelper::new(core_with(Arc::new(MemoryStore::new()), None));
        helper.store("a.B", "t", b"bytes").unwrap();
        assert_eq!(helper.find("a.C", "t").unwrap(), None);
    }

    #[test]
    fn filter_short_circuits_store() {
        let store = Arc::new(MemoryStore::new());
        let filter: Arc<dyn ClassFilter> = Arc::new(PrefixFilter::new().deny("com.blocked.Foo"));
        let helper = TokenHelper::new(core_with(store.clone(), Some(filter)));

        let err = helper.store("com.blocked.Foo", "t", b"x").unwrap_err();
        assert!(matches!(err, SharedClassError::DeniedByFilter { .. }));
        assert!(store.get(&CacheKey::token("t")).unwrap().is_none());

        helper.store("com.blocked.Bar", "t2", b"x").unwrap();
        assert!(matches!(
            helper.find("com.blocked.Foo", "t2"),
            Err(SharedClassError::DeniedByFilter { .. })
        ));
    }

    #[test]
    fn empty_token_is_rejected() {
        let helper = TokenHelper::new(core_with(Arc::new(MemoryStore::new()), None));
        assert!(matches!(
            helper.store("a.B", "", b"x"),
            Err(SharedClassError::InvalidArgument(_))
        ));
    }
}
