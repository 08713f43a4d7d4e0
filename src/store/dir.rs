//! Directory-backed cache store shared between processes
//!
//! Layout:
//!
//! ```text
//! {root}/classes/{class digest}/{key digest}.entry   # URL and classpath entries
//! {root}/tokens/{key digest}.entry                   # token entries
//! ```
//!
//! An entry file is one line of JSON metadata followed by the class bytes.
//! Every put writes a fresh temporary file next to the entry and renames it
//! into place, so a reader sees the old entry or the new one, never a mix.

use crate::error::{StoreError, StoreResult};
use crate::freshness::Freshness;
use crate::store::{CacheKey, CacheStore, StoredClass};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const ENTRY_EXT: &str = "entry";

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: CacheKey,
    class_name: String,
    freshness: Freshness,
    stored_at: DateTime<Utc>,
    len: u64,
}

/// Store persisting entries under a root directory
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
    capacity: Option<u64>,
    /// Class bytes under the root, tracked once a capacity is set
    used: Arc<Mutex<u64>>,
}

impl DirStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        for dir in [root.join("classes"), root.join("tokens")] {
            fs::create_dir_all(&dir)
                .map_err(|e| StoreError::io(format!("creating cache dir {}", dir.display()), e))?;
        }
        debug!("Opened cache store at {}", root.display());
        Ok(Self {
            root,
            capacity: None,
            used: Arc::default(),
        })
    }

    /// Bound the total class bytes held under the root
    ///
    /// The current usage is read from disk once; later puts through this
    /// store keep the count up to date.
    pub fn with_capacity(mut self, capacity: u64) -> StoreResult<Self> {
        let used = self.used_bytes()?;
        *self.lock_used() = used;
        self.capacity = Some(capacity);
        debug!("Cache store holds {} of {} bytes", used, capacity);
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Total bytes of class data under the root, read from disk
    pub fn used_bytes(&self) -> StoreResult<u64> {
        let mut dirs = vec![self.root.join("tokens")];
        let classes = self.root.join("classes");
        let class_dirs = fs::read_dir(&classes)
            .map_err(|e| StoreError::io(format!("reading {}", classes.display()), e))?;
        dirs.extend(class_dirs.flatten().map(|e| e.path()).filter(|p| p.is_dir()));

        let mut total = 0;
        for dir in dirs {
            for path in entry_files(&dir)? {
                match read_header(&path) {
                    Ok(Some(meta)) => total += meta.len,
                    Ok(None) => {}
                    Err(e) => warn!("Skipping unreadable cache entry: {}", e),
                }
            }
        }
        Ok(total)
    }

    fn class_dir(&self, class_name: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(class_name.as_bytes());
        self.root
            .join("classes")
            .join(hex::encode(&hasher.finalize()[..10]))
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let file = format!("{}.{}", key.digest(), ENTRY_EXT);
        match key {
            CacheKey::Token { .. } => self.root.join("tokens").join(file),
            CacheKey::Url { class_name, .. } | CacheKey::Classpath { class_name, .. } => {
                self.class_dir(class_name).join(file)
            }
        }
    }

    fn lock_used(&self) -> MutexGuard<'_, u64> {
        self.used.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entry(path: &Path, meta: &EntryMeta, bytes: &[u8]) -> StoreResult<()> {
        let dir = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)
            .map_err(|e| StoreError::io(format!("creating {}", dir.display()), e))?;

        let mut contents = serde_json::to_vec(meta).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        contents.push(b'\n');
        contents.extend_from_slice(bytes);

        let mut tmp = NamedTempFile::new_in(dir)
            .map_err(|e| StoreError::io(format!("creating temp file in {}", dir.display()), e))?;
        if let Err(e) = tmp.write_all(&contents) {
            return Err(StoreError::io(format!("writing {}", tmp.path().display()), e));
        }
        tmp.persist(path)
            .map_err(|e| StoreError::io(format!("publishing {}", path.display()), e.error))?;
        Ok(())
    }
}

impl CacheStore for DirStore {
    fn put(&self, key: &CacheKey, entry: StoredClass) -> StoreResult<()> {
        let path = self.entry_path(key);

        // The counter guard is held across the write
        let reserved = match self.capacity {
            Some(capacity) => {
                let used = self.lock_used();
                let replaced = match read_header(&path) {
                    Ok(Some(meta)) => meta.len,
                    _ => 0,
                };
                let needed = used.saturating_sub(replaced) + entry.size();
                if needed > capacity {
                    return Err(StoreError::Full { needed, capacity });
                }
                Some((used, needed))
            }
            None => None,
        };

        let meta = EntryMeta {
            key: key.clone(),
            class_name: entry.class_name,
            freshness: entry.freshness,
            stored_at: entry.stored_at,
            len: entry.bytes.len() as u64,
        };
        Self::write_entry(&path, &meta, &entry.bytes)?;

        if let Some((mut used, needed)) = reserved {
            *used = needed;
        }
        debug!("Stored {} ({} bytes) at {}", meta.class_name, meta.len, path.display());
        Ok(())
    }

    fn get(&self, key: &CacheKey) -> StoreResult<Option<StoredClass>> {
        let path = self.entry_path(key);
        let Some((meta, bytes)) = read_entry(&path)? else {
            return Ok(None);
        };
        if &meta.key != key {
            warn!("Key digest collision at {}", path.display());
            return Ok(None);
        }

        Ok(Some(StoredClass {
            class_name: meta.class_name,
            bytes,
            freshness: meta.freshness,
            stored_at: meta.stored_at,
        }))
    }

    /// URL and classpath keys for `class_name`; token entries are not indexed
    fn keys_for_class(&self, class_name: &str) -> StoreResult<Vec<CacheKey>> {
        let mut metas: Vec<EntryMeta> = Vec::new();
        for path in entry_files(&self.class_dir(class_name))? {
            match read_header(&path) {
                Ok(Some(meta)) if meta.class_name == class_name => metas.push(meta),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable cache entry: {}", e),
            }
        }

        metas.sort_by(|a, b| a.stored_at.cmp(&b.stored_at));
        Ok(metas.into_iter().map(|m| m.key).collect())
    }
}

/// Entry files directly under `dir`; a missing directory has none
fn entry_files(dir: &Path) -> StoreResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(StoreError::io(format!("reading {}", dir.display()), e)),
    };
    Ok(entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == ENTRY_EXT))
        .collect())
}

fn parse_header(path: &Path, line: &[u8]) -> StoreResult<EntryMeta> {
    serde_json::from_slice(line).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Read only the metadata line of an entry
fn read_header(path: &Path) -> StoreResult<Option<EntryMeta>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(format!("opening {}", path.display()), e)),
    };
    let mut line = Vec::new();
    BufReader::new(file)
        .read_until(b'\n', &mut line)
        .map_err(|e| StoreError::io(format!("reading {}", path.display()), e))?;
    if line.pop() != Some(b'\n') {
        return Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: "missing metadata line".to_string(),
        });
    }
    parse_header(path, &line).map(Some)
}

fn read_entry(path: &Path) -> StoreResult<Option<(EntryMeta, Vec<u8>)>> {
    let mut contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(format!("reading {}", path.display()), e)),
    };
    let Some(split) = contents.iter().position(|&b| b == b'\n') else {
        return Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: "missing metadata line".to_string(),
        });
    };

    let bytes = contents.split_off(split + 1);
    let meta = parse_header(path, &contents[..split])?;
    if bytes.len() as u64 != meta.len {
        return Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("expected {} bytes, found {}", meta.len, bytes.len()),
        });
    }
    Ok(Some((meta, bytes)))
}
