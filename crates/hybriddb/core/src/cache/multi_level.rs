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

use super::item::{CacheItem, LevelStats};
use super::Cache;
use crate::error::{CacheError, CacheResult};
use metrics::counter;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Ordered stack of cache levels, fastest first.
///
/// Reads scan the levels in order and, with `warm_upper_levels`, copy a hit
/// found below the first level into every faster level before returning.
/// Writes, deletes and clears go to every level.
pub struct MultiLevelCache {
    levels: Vec<Arc<dyn Cache>>,
    warm_upper_levels: bool,
    // Promotions run under the shared guard; fan-out writes hold it exclusively.
    gate: RwLock<()>,
}

impl MultiLevelCache {
    pub fn new(levels: Vec<Arc<dyn Cache>>, warm_upper_levels: bool) -> CacheResult<Self> {
        if levels.is_empty() {
            return Err(CacheError::InvalidConfiguration("multi-level cache needs at least one level".to_string()));
        }
        let mut names = HashSet::new();
        for level in &levels {
            if !names.insert(level.name().to_string()) {
                return Err(CacheError::InvalidConfiguration(format!("duplicate cache level name `{}`", level.name())));
            }
        }
        Ok(Self {
            levels,
            warm_upper_levels,
            gate: RwLock::new(()),
        })
    }

    pub fn levels(&self) -> &[Arc<dyn Cache>] {
        &self.levels
    }

    pub fn warm_upper_levels(&self) -> bool {
        self.warm_upper_levels
    }

    /// First hit in level order. A failing level is logged and skipped.
    pub async fn get(&self, key: &str) -> Option<CacheItem<Vec<u8>>> {
        let _read = self.gate.read().await;

        for (depth, level) in self.levels.iter().enumerate() {
            let item = match level.get(key).await {
                Ok(Some(item)) => item,
                Ok(None) => continue,
                Err(e) => {
                    warn!(level = level.name(), key, error = %e, "cache level read failed");
                    continue;
                }
            };

            debug!(level = level.name(), depth, key, "multi-level cache hit");
            if self.warm_upper_levels && depth > 0 {
                self.promote(&self.levels[..depth], &item).await;
            }
            return Some(item);
        }

        debug!(key, "multi-level cache miss");
        None
    }

    async fn promote(&self, upper: &[Arc<dyn Cache>], item: &CacheItem<Vec<u8>>) {
        for level in upper {
            match level.put(item.clone()).await {
                Ok(()) => {
                    counter!("hybriddb_cache_promotions_total", 1, "level" => level.name().to_string());
                }
                Err(e) => warn!(level = level.name(), key = %item.key, error = %e, "promotion failed"),
            }
        }
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// Writes to every level. All levels are attempted; the first failure is returned.
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let _write = self.gate.write().await;
        let mut first_error = None;
        for level in &self.levels {
            if let Err(e) = level.set(key, value.clone(), ttl).await {
                warn!(level = level.name(), key, error = %e, "cache level write failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub async fn delete(&self, key: &str) -> CacheResult<bool> {
        let _write = self.gate.write().await;
        let mut removed = false;
        let mut first_error = None;
        for level in &self.levels {
            match level.delete(key).await {
                Ok(deleted) => removed |= deleted,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(removed), Err)
    }

    pub async fn clear(&self) -> CacheResult<()> {
        let _write = self.gate.write().await;
        let mut first_error = None;
        for level in &self.levels {
            if let Err(e) = level.clear().await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Per-level occupancy keyed by level name.
    pub async fn stats(&self) -> HashMap<String, LevelStats> {
        let mut stats = HashMap::with_capacity(self.levels.len());
        for level in &self.levels {
            stats.insert(level.name().to_string(), level.stats().await);
        }
        stats
    }

    pub async fn prune_expired(&self) -> CacheResult<usize> {
        let _write = self.gate.write().await;
        let mut pruned = 0;
        for level in &self.levels {
            pruned += level.prune_expired().await?;
        }
        Ok(pruned)
    }
}
