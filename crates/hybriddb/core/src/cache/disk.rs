// HybridDB
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Disk-backed cache level.
//!
//! Every entry is stored as two sibling files in the cache directory:
//! `<key>` holds the payload and `<key>.meta` holds the JSON encoded
//! creation time, expiry and size. An entry exists only while both files
//! are present and readable; anything else is a miss and the leftovers are
//! removed.

use super::item::{CacheItem, CacheOptions, LevelStats};
use super::Cache;
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const META_SUFFIX: &str = ".meta";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct EntryMeta {
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    size: u64,
}

impl EntryMeta {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

#[derive(Debug)]
struct IndexEntry {
    meta: EntryMeta,
    seq: u64,
}

#[derive(Debug, Default)]
struct DiskIndex {
    entries: HashMap<String, IndexEntry>,
    size: u64,
    next_seq: u64,
}

impl DiskIndex {
    fn insert(&mut self, key: String, meta: EntryMeta) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.size += meta.size;
        if let Some(previous) = self.entries.insert(key, IndexEntry { meta, seq }) {
            self.size = self.size.saturating_sub(previous.meta.size);
        }
    }

    fn remove(&mut self, key: &str) -> Option<IndexEntry> {
        let entry = self.entries.remove(key)?;
        self.size = self.size.saturating_sub(entry.meta.size);
        Some(entry)
    }

    fn oldest_key(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| (entry.meta.created_at, entry.seq))
            .map(|(key, _)| key.clone())
    }
}

/// Cache level persisted under a directory, bounded by total payload bytes.
#[derive(Debug)]
pub struct DiskCache {
    name: String,
    dir: PathBuf,
    options: CacheOptions,
    index: Mutex<DiskIndex>,
}

impl DiskCache {
    /// Opens (creating if needed) the cache directory named by `options.disk_path`.
    ///
    /// Existing entries are re-indexed. Expired entries and cache metadata
    /// without a matching payload are removed; files the cache cannot
    /// recognise as its own are left untouched.
    pub async fn open(name: impl Into<String>, options: CacheOptions) -> CacheResult<Self> {
        let name = name.into();
        let dir = options
            .disk_path
            .clone()
            .ok_or_else(|| CacheError::InvalidConfiguration("disk cache requires disk_path".to_string()))?;
        if options.max_size == 0 {
            return Err(CacheError::InvalidConfiguration("disk cache max_size must be positive".to_string()));
        }

        fs::create_dir_all(&dir).await?;
        let cache = Self {
            name,
            dir,
            options,
            index: Mutex::new(DiskIndex::default()),
        };

        let recovered = cache.rebuild_index().await?;
        info!(cache = %cache.name, dir = %cache.dir.display(), recovered, "opened disk cache");
        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Read-only census of a cache directory. Nothing is created or removed.
    pub async fn scan(dir: impl AsRef<Path>) -> CacheResult<DirectoryScan> {
        let now = Utc::now();
        let mut scan = DirectoryScan::default();
        for file in scan_directory(dir.as_ref()).await? {
            match file {
                ScannedFile::Entry { meta, .. } if meta.is_expired_at(now) => scan.expired += 1,
                ScannedFile::Entry { meta, .. } => {
                    scan.live.item_count += 1;
                    scan.live.size += meta.size;
                }
                ScannedFile::Stale { .. } => scan.stale += 1,
                ScannedFile::Unrecognized { .. } => scan.unrecognized += 1,
            }
        }
        Ok(scan)
    }

    async fn rebuild_index(&self) -> CacheResult<usize> {
        let now = Utc::now();
        let mut recovered: Vec<(String, EntryMeta)> = Vec::new();
        for file in scan_directory(&self.dir).await? {
            match file {
                ScannedFile::Entry { key, meta } if !meta.is_expired_at(now) => recovered.push((key, meta)),
                ScannedFile::Entry { key, .. } | ScannedFile::Stale { key } => {
                    debug!(cache = %self.name, key = %key, "removing stale cache entry");
                    self.remove_files_quietly(&key).await;
                }
                ScannedFile::Unrecognized { file_name } => {
                    debug!(cache = %self.name, file = %file_name, "leaving unrecognized file in place");
                }
            }
        }

        recovered.sort_by_key(|(_, meta)| meta.created_at);
        let count = recovered.len();
        let mut index = self.index.lock().await;
        for (key, meta) in recovered {
            index.insert(key, meta);
        }
        self.evict_until_fits(&mut index, 0).await;
        Ok(count)
    }

    fn payload_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}{META_SUFFIX}"))
    }

    async fn read_meta(&self, key: &str) -> CacheResult<EntryMeta> {
        read_meta_at(&self.meta_path(key)).await
    }

    async fn remove_files(&self, key: &str) -> io::Result<bool> {
        let mut removed = false;
        for path in [self.payload_path(key), self.meta_path(key)] {
            match fs::remove_file(&path).await {
                Ok(()) => removed = true,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    async fn remove_files_quietly(&self, key: &str) {
        if let Err(e) = self.remove_files(key).await {
            warn!(cache = %self.name, key, error = %e, "failed to remove cache files");
        }
    }

    async fn evict_until_fits(&self, index: &mut DiskIndex, incoming: u64) {
        while index.size + incoming > self.options.max_size {
            let Some(victim) = index.oldest_key() else { break };
            index.remove(&victim);
            self.remove_files_quietly(&victim).await;
            counter!("hybriddb_cache_evictions_total", 1, "level" => self.name.clone());
            debug!(cache = %self.name, key = %victim, "evicted oldest entry");
        }
    }

    async fn write_entry(&self, key: &str, value: &[u8], meta: &EntryMeta) -> CacheResult<()> {
        let encoded = serde_json::to_vec(meta)?;
        fs::write(self.payload_path(key), value).await?;
        fs::write(self.meta_path(key), encoded).await?;
        Ok(())
    }
}

/// Occupancy of a cache directory as seen by [`DiskCache::scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryScan {
    pub live: LevelStats,     // complete, unexpired entries
    pub expired: usize,       // complete entries past their expiry
    pub stale: usize,         // cache metadata whose payload is missing or has the wrong size
    pub unrecognized: usize,  // files that are not part of a cache entry
}

#[derive(Debug)]
enum ScannedFile {
    Entry { key: String, meta: EntryMeta },
    Stale { key: String },
    Unrecognized { file_name: String },
}

async fn read_meta_at(path: &Path) -> CacheResult<EntryMeta> {
    let raw = fs::read(path).await?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Classifies every regular file of `dir`. A payload belongs to the cache
/// only through a sibling `.meta` file that decodes as entry metadata.
async fn scan_directory(dir: &Path) -> CacheResult<Vec<ScannedFile>> {
    let mut names = Vec::new();
    let mut listing = fs::read_dir(dir).await?;
    while let Some(entry) = listing.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(file_name) = entry.file_name().to_str() {
            names.push(file_name.to_string());
        }
    }
    let present: HashSet<&str> = names.iter().map(String::as_str).collect();

    let mut scanned = Vec::new();
    for file_name in &names {
        let Some(key) = file_name.strip_suffix(META_SUFFIX).filter(|key| validate_key(key).is_ok()) else {
            if !present.contains(format!("{file_name}{META_SUFFIX}").as_str()) {
                scanned.push(ScannedFile::Unrecognized { file_name: file_name.clone() });
            }
            continue;
        };

        let meta = match read_meta_at(&dir.join(file_name)).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(dir = %dir.display(), file = %file_name, error = %e, "metadata file is not a cache entry");
                scanned.push(ScannedFile::Unrecognized { file_name: file_name.clone() });
                continue;
            }
        };
        let payload_len = if present.contains(key) {
            fs::metadata(dir.join(key)).await.ok().map(|metadata| metadata.len())
        } else {
            None
        };
        if payload_len == Some(meta.size) {
            scanned.push(ScannedFile::Entry { key: key.to_string(), meta });
        } else {
            scanned.push(ScannedFile::Stale { key: key.to_string() });
        }
    }
    Ok(scanned)
}

fn validate_key(key: &str) -> CacheResult<()> {
    let invalid = key.is_empty() || key == "." || key == ".." || key.ends_with(META_SUFFIX) || key.contains(['/', '\\', '\0']);
    if invalid { Err(CacheError::InvalidKey(key.to_string())) } else { Ok(()) }
}

#[async_trait]
impl Cache for DiskCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> CacheResult<Option<CacheItem<Vec<u8>>>> {
        validate_key(key)?;
        let mut index = self.index.lock().await;
        let now = Utc::now();

        match index.entries.get(key) {
            None => return Ok(None),
            Some(entry) if entry.meta.is_expired_at(now) => {
                index.remove(key);
                self.remove_files_quietly(key).await;
                debug!(cache = %self.name, key, "dropped expired entry");
                return Ok(None);
            }
            Some(_) => {}
        }

        let meta = self.read_meta(key).await;
        let payload = fs::read(self.payload_path(key)).await;
        match (meta, payload) {
            (Ok(meta), Ok(value)) if !meta.is_expired_at(now) => Ok(Some(CacheItem {
                key: key.to_string(),
                value,
                created_at: meta.created_at,
                expires_at: meta.expires_at,
                size: meta.size,
            })),
            (Ok(_), Ok(_)) => {
                index.remove(key);
                self.remove_files_quietly(key).await;
                Ok(None)
            }
            (meta, payload) => {
                let reason = meta.err().map(|e| e.to_string()).or_else(|| payload.err().map(|e| e.to_string())).unwrap_or_default();
                warn!(cache = %self.name, key, reason = %reason, "treating unreadable entry as a miss");
                index.remove(key);
                self.remove_files_quietly(key).await;
                Ok(None)
            }
        }
    }

    async fn put(&self, item: CacheItem<Vec<u8>>) -> CacheResult<()> {
        validate_key(&item.key)?;
        let size = item.value.len() as u64;
        if size > self.options.max_size {
            return Err(CacheError::ItemTooLarge {
                size,
                max: self.options.max_size,
            });
        }

        let meta = EntryMeta {
            created_at: item.created_at,
            expires_at: item.expires_at,
            size,
        };

        let mut index = self.index.lock().await;
        index.remove(&item.key);
        self.evict_until_fits(&mut index, size).await;

        if let Err(e) = self.write_entry(&item.key, &item.value, &meta).await {
            self.remove_files_quietly(&item.key).await;
            warn!(cache = %self.name, key = %item.key, error = %e, "rolled back partial write");
            return Err(e);
        }

        index.insert(item.key, meta);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        validate_key(key)?;
        let mut index = self.index.lock().await;
        let indexed = index.remove(key).is_some();
        let removed = self.remove_files(key).await?;
        Ok(indexed || removed)
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut index = self.index.lock().await;
        let mut listing = fs::read_dir(&self.dir).await?;
        while let Some(entry) = listing.next_entry().await? {
            if entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
            }
        }
        *index = DiskIndex::default();
        Ok(())
    }

    async fn stats(&self) -> LevelStats {
        let index = self.index.lock().await;
        LevelStats {
            size: index.size,
            item_count: index.entries.len(),
        }
    }

    async fn prune_expired(&self) -> CacheResult<usize> {
        let now = Utc::now();
        let mut index = self.index.lock().await;
        let expired: Vec<String> = index
            .entries
            .iter()
            .filter(|(_, entry)| entry.meta.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove_files(key).await?;
            index.remove(key);
        }
        Ok(expired.len())
    }

    fn default_ttl(&self) -> Option<Duration> {
        self.options.default_ttl()
    }
}
