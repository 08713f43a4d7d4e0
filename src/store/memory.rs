//! In-process cache store

use crate::error::{StoreError, StoreResult};
use crate::store::{CacheKey, CacheStore, StoredClass};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheKey, StoredClass>,
    by_class: HashMap<String, Vec<CacheKey>>,
    used: u64,
}

/// Store holding entries in memory, optionally bounded by total class bytes
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    capacity: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject puts that would grow the stored class bytes past `capacity`
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            inner: RwLock::default(),
            capacity: Some(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes of class data currently held
    pub fn used_bytes(&self) -> u64 {
        self.read().used
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheStore for MemoryStore {
    fn put(&self, key: &CacheKey, entry: StoredClass) -> StoreResult<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let replaced = inner.entries.get(key).map(StoredClass::size).unwrap_or(0);
        let needed = inner.used - replaced + entry.size();
        if let Some(capacity) = self.capacity {
            if needed > capacity {
                return Err(StoreError::Full { needed, capacity });
            }
        }
        inner.used = needed;

        let previous_class = inner
            .entries
            .get(key)
            .filter(|old| old.class_name != entry.class_name)
            .map(|old| old.class_name.clone());
        if let Some(previous) = previous_class {
            if let Some(keys) = inner.by_class.get_mut(&previous) {
                keys.retain(|k| k != key);
            }
        }

        let keys = inner.by_class.entry(entry.class_name.clone()).or_default();
        if !keys.contains(key) {
            keys.push(key.clone());
        }
        inner.entries.insert(key.clone(), entry);
        Ok(())
    }

    fn get(&self, key: &CacheKey) -> StoreResult<Option<StoredClass>> {
        Ok(self.read().entries.get(key).cloned())
    }

    fn keys_for_class(&self, class_name: &str) -> StoreResult<Vec<CacheKey>> {
        Ok(self.read().by_class.get(class_name).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freshness::Freshness;

    fn entry(name: &str, bytes: &[u8]) -> StoredClass {
        StoredClass::new(name, bytes.to_vec(), Freshness::Untracked)
    }

    #[test]
    fn put_then_get() {
        let store = MemoryStore::new();
        let key = CacheKey::token("t1");
        store.put(&key, entry("a.B", b"bytes")).unwrap();

        let found = store.get(&key).unwrap().unwrap();
        assert_eq!(found.bytes, b"bytes");
        assert_eq!(store.keys_for_class("a.B").unwrap(), vec![key]);
    }

    #[test]
    fn overwrite_replaces_and_reaccounts() {
        let store = MemoryStore::new();
        let key = CacheKey::token("t1");
        store.put(&key, entry("a.B", b"0123456789")).unwrap();
        store.put(&key, entry("a.B", b"abc")).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.used_bytes(), 3);
        assert_eq!(store.get(&key).unwrap().unwrap().bytes, b"abc");
        assert_eq!(store.keys_for_class("a.B").unwrap().len(), 1);
    }

    #[test]
    fn capacity_is_enforced() {
        let store = MemoryStore::with_capacity(8);
        store.put(&CacheKey::token("a"), entry("a.A", b"12345")).unwrap();

        let err = store
            .put(&CacheKey::token("b"), entry("a.B", b"12345"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Full { needed: 10, capacity: 8 }));
        assert!(store.get(&CacheKey::token("b")).unwrap().is_none());
    }

    #[test]
    fn missing_class_has_no_keys() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert!(store.keys_for_class("nope").unwrap().is_empty());
    }
}
