//! Named cache stores
//!
//! A store maps request keys to responses. Writes go through a
//! `PrecacheBatch`, which a storage backend commits all at once or not at
//! all: readers never observe a half-installed store.

use crate::error::{AssetCacheError, AssetCacheResult};
use crate::worker::fetch::Response;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// Index file inside each on-disk store
const INDEX_FILE: &str = "index.json";
/// Directory of content-addressed bodies inside each on-disk store
const BODIES_DIR: &str = "bodies";

/// Format bytes as human-readable size (e.g., "1.5 MB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Responses staged for a single atomic write
#[derive(Debug, Default, Clone)]
pub struct PrecacheBatch {
    entries: Vec<(String, Response)>,
}

impl PrecacheBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a response. A later entry for the same key wins.
    pub fn stage(&mut self, key: impl Into<String>, response: Response) {
        self.entries.push((key.into(), response));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total body bytes staged
    pub fn bytes(&self) -> u64 {
        self.entries.iter().map(|(_, r)| r.body.len() as u64).sum()
    }

    pub fn into_entries(self) -> Vec<(String, Response)> {
        self.entries
    }
}

/// Summary of one store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreInfo {
    pub name: String,
    pub entries: usize,
    pub bytes: u64,
    pub created_at: Option<DateTime<Utc>>,
}

/// Backend holding named cache stores
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the store if it does not exist
    async fn open(&self, store: &str) -> AssetCacheResult<()>;

    /// Whether the store exists
    async fn has(&self, store: &str) -> AssetCacheResult<bool>;

    /// All store names, sorted
    async fn store_names(&self) -> AssetCacheResult<Vec<String>>;

    /// Look up a stored response by key
    async fn lookup(&self, store: &str, key: &str) -> AssetCacheResult<Option<Response>>;

    /// Keys in the store, sorted. Empty if the store does not exist.
    async fn keys(&self, store: &str) -> AssetCacheResult<Vec<String>>;

    /// Add every entry of the batch, or none of them on failure
    async fn commit(&self, store: &str, batch: PrecacheBatch) -> AssetCacheResult<()>;

    /// Delete a store. Returns whether it existed.
    async fn delete(&self, store: &str) -> AssetCacheResult<bool>;

    /// Size and age of a store
    async fn info(&self, store: &str) -> AssetCacheResult<Option<StoreInfo>>;
}

/// Store names become directory names; keep them to a safe alphabet
pub fn validate_store_name(store: &str) -> AssetCacheResult<()> {
    let valid = !store.is_empty()
        && !store.starts_with('.')
        && store
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(AssetCacheError::InvalidStoreName(store.to_string()))
    }
}

/// In-process storage, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStorage {
    stores: RwLock<BTreeMap<String, MemoryStore>>,
}

#[derive(Debug, Clone)]
struct MemoryStore {
    created_at: DateTime<Utc>,
    entries: BTreeMap<String, Response>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, store: &str) -> AssetCacheResult<()> {
        validate_store_name(store)?;
        self.stores
            .write()
            .await
            .entry(store.to_string())
            .or_insert_with(|| MemoryStore {
                created_at: Utc::now(),
                entries: BTreeMap::new(),
            });
        Ok(())
    }

    async fn has(&self, store: &str) -> AssetCacheResult<bool> {
        Ok(self.stores.read().await.contains_key(store))
    }

    async fn store_names(&self) -> AssetCacheResult<Vec<String>> {
        Ok(self.stores.read().await.keys().cloned().collect())
    }

    async fn lookup(&self, store: &str, key: &str) -> AssetCacheResult<Option<Response>> {
        Ok(self
            .stores
            .read()
            .await
            .get(store)
            .and_then(|s| s.entries.get(key).cloned()))
    }

    async fn keys(&self, store: &str) -> AssetCacheResult<Vec<String>> {
        Ok(self
            .stores
            .read()
            .await
            .get(store)
            .map(|s| s.entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn commit(&self, store: &str, batch: PrecacheBatch) -> AssetCacheResult<()> {
        validate_store_name(store)?;
        // One write lock for the whole batch
        let mut stores = self.stores.write().await;
        let target = stores
            .entry(store.to_string())
            .or_insert_with(|| MemoryStore {
                created_at: Utc::now(),
                entries: BTreeMap::new(),
            });
        target.entries.extend(batch.into_entries());
        Ok(())
    }

    async fn delete(&self, store: &str) -> AssetCacheResult<bool> {
        Ok(self.stores.write().await.remove(store).is_some())
    }

    async fn info(&self, store: &str) -> AssetCacheResult<Option<StoreInfo>> {
        Ok(self.stores.read().await.get(store).map(|s| StoreInfo {
            name: store.to_string(),
            entries: s.entries.len(),
            bytes: s.entries.values().map(|r| r.body.len() as u64).sum(),
            created_at: Some(s.created_at),
        }))
    }
}

/// Persisted index of one store
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreIndex {
    created_at: DateTime<Utc>,
    entries: BTreeMap<String, StoredEntry>,
}

impl StoreIndex {
    fn new() -> Self {
        Self {
            created_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    status: u16,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    /// SHA256 of the body, naming the file under `bodies/`
    body: String,
    size: u64,
}

/// Storage persisted under a directory
///
/// ```text
/// {root}/{store}/index.json
/// {root}/{store}/bodies/{sha256}
/// ```
///
/// Bodies are written first, then the index is replaced with a rename. The
/// rename is the commit point: a crash before it leaves the previous index
/// in place and at worst some unreferenced bodies.
#[derive(Debug)]
pub struct DiskStorage {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, store: &str) -> AssetCacheResult<PathBuf> {
        validate_store_name(store)?;
        Ok(self.root.join(store))
    }

    async fn exists(path: &Path) -> AssetCacheResult<bool> {
        fs::try_exists(path)
            .await
            .map_err(|e| AssetCacheError::io(format!("checking {}", path.display()), e))
    }

    async fn is_file(path: &Path) -> bool {
        fs::metadata(path).await.is_ok_and(|m| m.is_file())
    }

    async fn read_index(&self, store: &str) -> AssetCacheResult<Option<StoreIndex>> {
        let path = self.store_dir(store)?.join(INDEX_FILE);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AssetCacheError::io(
                    format!("reading cache index {}", path.display()),
                    e,
                ))
            }
        };

        let index = serde_json::from_str(&content).map_err(|e| {
            AssetCacheError::CacheIndexCorrupt {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Some(index))
    }

    async fn write_index(&self, dir: &Path, index: &StoreIndex) -> AssetCacheResult<()> {
        let content = serde_json::to_vec_pretty(index)?;
        let staging = dir.join(format!(".{}.{}.tmp", INDEX_FILE, Uuid::new_v4()));
        let path = dir.join(INDEX_FILE);

        fs::write(&staging, content)
            .await
            .map_err(|e| AssetCacheError::io(format!("writing {}", staging.display()), e))?;

        if let Err(e) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(AssetCacheError::io(
                format!("replacing cache index {}", path.display()),
                e,
            ));
        }
        Ok(())
    }

    /// Write one body if not already present. Returns the path when a new
    /// file was created.
    async fn write_body(&self, bodies: &Path, hash: &str, body: &[u8]) -> AssetCacheResult<Option<PathBuf>> {
        let path = bodies.join(hash);
        if Self::is_file(&path).await {
            return Ok(None);
        }

        let staging = bodies.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&staging, body)
            .await
            .map_err(|e| AssetCacheError::io(format!("writing {}", staging.display()), e))?;
        if let Err(e) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(AssetCacheError::io(
                format!("storing body {}", path.display()),
                e,
            ));
        }
        Ok(Some(path))
    }

    async fn commit_inner(
        &self,
        dir: &Path,
        mut index: StoreIndex,
        batch: PrecacheBatch,
        written: &mut Vec<PathBuf>,
    ) -> AssetCacheResult<()> {
        let bodies = dir.join(BODIES_DIR);
        fs::create_dir_all(&bodies)
            .await
            .map_err(|e| AssetCacheError::io(format!("creating {}", bodies.display()), e))?;

        for (key, response) in batch.into_entries() {
            let hash = hex::encode(Sha256::digest(&response.body));
            if let Some(path) = self.write_body(&bodies, &hash, &response.body).await? {
                written.push(path);
            }
            index.entries.insert(
                key,
                StoredEntry {
                    status: response.status,
                    headers: response.headers,
                    body: hash,
                    size: response.body.len() as u64,
                },
            );
        }

        self.write_index(dir, &index).await
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, store: &str) -> AssetCacheResult<()> {
        let dir = self.store_dir(store)?;
        let _guard = self.write_lock.lock().await;

        if self.read_index(store).await?.is_some() {
            return Ok(());
        }

        fs::create_dir_all(dir.join(BODIES_DIR))
            .await
            .map_err(|e| AssetCacheError::io(format!("creating cache store {}", dir.display()), e))?;
        self.write_index(&dir, &StoreIndex::new()).await?;
        debug!("Created cache store {}", store);
        Ok(())
    }

    async fn has(&self, store: &str) -> AssetCacheResult<bool> {
        Self::exists(&self.store_dir(store)?.join(INDEX_FILE)).await
    }

    async fn store_names(&self) -> AssetCacheResult<Vec<String>> {
        if !Self::exists(&self.root).await? {
            return Ok(vec![]);
        }

        let mut names = vec![];
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| AssetCacheError::io("reading cache directory", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AssetCacheError::io("reading cache entry", e))?
        {
            let path = entry.path();
            if !Self::is_file(&path.join(INDEX_FILE)).await {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if validate_store_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn lookup(&self, store: &str, key: &str) -> AssetCacheResult<Option<Response>> {
        let Some(index) = self.read_index(store).await? else {
            return Ok(None);
        };
        let Some(entry) = index.entries.get(key) else {
            return Ok(None);
        };

        let path = self.store_dir(store)?.join(BODIES_DIR).join(&entry.body);
        let body = fs::read(&path)
            .await
            .map_err(|e| AssetCacheError::io(format!("reading cached body {}", path.display()), e))?;

        Ok(Some(Response {
            status: entry.status,
            headers: entry.headers.clone(),
            body,
        }))
    }

    async fn keys(&self, store: &str) -> AssetCacheResult<Vec<String>> {
        Ok(self
            .read_index(store)
            .await?
            .map(|index| index.entries.into_keys().collect())
            .unwrap_or_default())
    }

    async fn commit(&self, store: &str, batch: PrecacheBatch) -> AssetCacheResult<()> {
        let dir = self.store_dir(store)?;
        let _guard = self.write_lock.lock().await;

        let previous = self.read_index(store).await?;
        let created = previous.is_none();
        let index = previous.unwrap_or_else(StoreIndex::new);
        let count = batch.len();
        let mut written = Vec::new();

        if let Err(e) = self.commit_inner(&dir, index, batch, &mut written).await {
            if created {
                // No index was ever published, so nothing can reference the directory
                if let Err(cleanup) = fs::remove_dir_all(&dir).await {
                    warn!("Failed to remove {}: {}", dir.display(), cleanup);
                }
                return Err(e);
            }
            // Index untouched; drop bodies nothing references
            for path in written {
                if let Err(cleanup) = fs::remove_file(&path).await {
                    warn!("Failed to remove {}: {}", path.display(), cleanup);
                }
            }
            return Err(e);
        }

        debug!("Committed {} entries to {}", count, store);
        Ok(())
    }

    async fn delete(&self, store: &str) -> AssetCacheResult<bool> {
        let dir = self.store_dir(store)?;
        let _guard = self.write_lock.lock().await;

        if !Self::exists(&dir).await? {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)
            .await
            .map_err(|e| AssetCacheError::io(format!("deleting cache store {}", dir.display()), e))?;
        Ok(true)
    }

    async fn info(&self, store: &str) -> AssetCacheResult<Option<StoreInfo>> {
        Ok(self.read_index(store).await?.map(|index| StoreInfo {
            name: store.to_string(),
            entries: index.entries.len(),
            bytes: index.entries.values().map(|e| e.size).sum(),
            created_at: Some(index.created_at),
        }))
    }
}
