//! Classpath helper
//!
//! Resolves classes left to right over an ordered list of URLs, the way a
//! URL class loader does. The classpath can grow at any time. Any other
//! change is accepted only while no class has been served from the part
//! of the classpath that would change.

use crate::error::{SharedClassError, SharedClassResult};
use crate::filter::Operation;
use crate::helper::url_helper::current_freshness;
use crate::helper::{HelperCore, Lookup};
use crate::loader::LoaderId;
use crate::source::{SourceKind, SourceUrl};
use crate::store::CacheKey;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info};

/// A classpath lookup that found fresh bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClasspathHit {
    /// Classpath position the bytes were resolved from
    pub index: usize,
    pub bytes: Vec<u8>,
}

/// Classes resolved through this helper, by lowest classpath index
#[derive(Debug, Default)]
struct ServedLog {
    classes: HashMap<String, usize>,
    /// Entries `0..confirmed` are treated as served for every class
    confirmed: usize,
}

impl ServedLog {
    fn record(&mut self, class_name: &str, index: usize) {
        self.classes
            .entry(class_name.to_string())
            .and_modify(|i| *i = (*i).min(index))
            .or_insert(index);
    }

    /// First served class that a change starting at `from` would affect
    fn conflict_at(&self, from: usize) -> Option<(usize, String)> {
        if from < self.confirmed {
            return Some((from, "<confirmed entries>".to_string()));
        }
        self.classes
            .iter()
            .filter(|(_, &index)| index >= from)
            .map(|(name, &index)| (index, name.clone()))
            .min()
    }
}

/// Helper bound to an ordered URL classpath
#[derive(Debug)]
pub struct ClasspathHelper {
    pub(crate) core: HelperCore,
    classpath: RwLock<Vec<SourceUrl>>,
    served: Mutex<ServedLog>,
}

impl ClasspathHelper {
    pub(crate) fn new(core: HelperCore, classpath: Vec<SourceUrl>) -> Self {
        Self {
            core,
            classpath: RwLock::new(classpath),
            served: Mutex::default(),
        }
    }

    pub fn owner(&self) -> LoaderId {
        self.core.owner
    }

    /// Snapshot of the current classpath
    pub fn classpath(&self) -> Vec<SourceUrl> {
        self.classpath
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Store `bytes` for `class_name`, loaded from `origin` on the classpath
    pub fn store(
        &self,
        class_name: &str,
        bytes: &[u8],
        origin: &SourceUrl,
    ) -> SharedClassResult<()> {
        self.core.admit(class_name, Operation::Store)?;
        let classpath = self.classpath.read().unwrap_or_else(PoisonError::into_inner);

        let index = classpath
            .iter()
            .position(|url| url == origin)
            .ok_or_else(|| SharedClassError::NotOnClasspath {
                url: origin.to_string(),
            })?;
        origin.ensure_cacheable()?;
        let freshness = current_freshness(&self.core, origin, class_name)?;

        let key = CacheKey::classpath(&classpath, index, class_name);
        self.core.put(&key, class_name, bytes, freshness)?;
        self.served().record(class_name, index);
        Ok(())
    }

    /// Find `class_name` on the classpath
    pub fn find(&self, class_name: &str) -> SharedClassResult<Option<Vec<u8>>> {
        Ok(self.find_with_index(class_name)?.map(|hit| hit.bytes))
    }

    /// Find `class_name`, reporting which classpath entry satisfied it
    ///
    /// Entries are tried in classpath order. At each position the entry
    /// stored through this classpath wins, then an entry stored through a
    /// URL helper, then entries stored through other classpaths sharing the
    /// URL. Stale entries are skipped.
    pub fn find_with_index(&self, class_name: &str) -> SharedClassResult<Option<ClasspathHit>> {
        self.core.admit(class_name, Operation::Find)?;
        let classpath = self.classpath.read().unwrap_or_else(PoisonError::into_inner);
        let known = self.core.store.keys_for_class(class_name)?;

        for (index, url) in classpath.iter().enumerate() {
            if url.kind() == SourceKind::Unsupported {
                continue;
            }
            let candidates = candidates_at(&classpath, index, class_name, &known);
            if candidates.is_empty() {
                continue;
            }
            let Some(current) = self.core.probe.probe(url, class_name) else {
                continue;
            };

            for key in &candidates {
                if let Lookup::Hit(bytes) = self.core.fetch_candidate(key, &current) {
                    debug!(
                        "{} resolved {} at classpath index {}",
                        self.core.owner, class_name, index
                    );
                    self.served().record(class_name, index);
                    return Ok(Some(ClasspathHit { index, bytes }));
                }
            }
        }

        Ok(None)
    }

    /// Replace the classpath
    ///
    /// Appending is always allowed. Any other change fails with
    /// `IncompatibleClasspathChange` if a class has already been served
    /// from the first position that differs or later.
    pub fn update_classpath(&self, new_classpath: Vec<SourceUrl>) -> SharedClassResult<()> {
        let mut classpath = self.classpath.write().unwrap_or_else(PoisonError::into_inner);

        let diverge = classpath
            .iter()
            .zip(new_classpath.iter())
            .position(|(old, new)| old != new)
            .unwrap_or_else(|| classpath.len().min(new_classpath.len()));

        if diverge == classpath.len() {
            if new_classpath.len() > classpath.len() {
                info!(
                    "{} appended {} classpath entries",
                    self.core.owner,
                    new_classpath.len() - classpath.len()
                );
            }
            *classpath = new_classpath;
            return Ok(());
        }

        if let Some((index, class_name)) = self.served().conflict_at(diverge) {
            debug!(
                "{} rejected classpath change at {}: {} served from {}",
                self.core.owner, diverge, class_name, index
            );
            return Err(SharedClassError::IncompatibleClasspathChange {
                index: diverge,
                class_name,
            });
        }

        info!(
            "{} replaced classpath from index {} ({} -> {} entries)",
            self.core.owner,
            diverge,
            classpath.len(),
            new_classpath.len()
        );
        *classpath = new_classpath;
        Ok(())
    }

    /// Grow the classpath to `requested` if it extends the current one
    ///
    /// Returns `false`, leaving the classpath untouched, when `requested` is
    /// not the current classpath or an append to it.
    pub(crate) fn extend_to(&self, requested: &[SourceUrl]) -> bool {
        let mut classpath = self.classpath.write().unwrap_or_else(PoisonError::into_inner);
        if !requested.starts_with(&classpath) {
            return false;
        }
        let current = classpath.len();
        if requested.len() > current {
            classpath.extend_from_slice(&requested[current..]);
            debug!("{} classpath extended to {} entries", self.core.owner, classpath.len());
        }
        true
    }

    /// Treat the whole current classpath as served, forbidding any later
    /// change other than appending
    pub fn confirm_all_entries(&self) {
        let len = self.classpath.read().unwrap_or_else(PoisonError::into_inner).len();
        self.served().confirmed = len;
    }

    fn served(&self) -> MutexGuard<'_, ServedLog> {
        self.served.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keys that may satisfy `class_name` at `index`, in preference order
fn candidates_at(
    classpath: &[SourceUrl],
    index: usize,
    class_name: &str,
    known: &[CacheKey],
) -> Vec<CacheKey> {
    let url = &classpath[index];
    let own = CacheKey::classpath(classpath, index, class_name);

    let mut candidates = Vec::new();
    if known.contains(&own) {
        candidates.push(own.clone());
    }
    candidates.extend(
        known
            .iter()
            .filter(|k| matches!(k, CacheKey::Url { .. }) && k.source() == Some(url))
            .cloned(),
    );
    candidates.extend(
        known
            .iter()
            .filter(|k| {
                matches!(k, CacheKey::Classpath { .. }) && **k != own && k.source() == Some(url)
            })
            .cloned(),
    );
    candidates
}
