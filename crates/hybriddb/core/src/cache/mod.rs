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

//! Result and payload caches.
//!
//! `QueryCache` holds routed query results. `MemoryCache` and `DiskCache`
//! store raw byte payloads and can be stacked into a `MultiLevelCache`.
//! All of them expire entries by TTL and evict by insertion order.

pub mod disk;
pub mod item;
pub mod memory;
pub mod multi_level;
pub mod pruner;
pub mod query_cache;

pub use disk::{DirectoryScan, DiskCache};
pub use item::{CacheItem, CacheOptions, EvictionPolicy, LevelStats};
pub use memory::MemoryCache;
pub use multi_level::MultiLevelCache;
pub use pruner::{CachePruner, Prunable, PrunerHandle};
pub use query_cache::{QueryCache, QueryCacheStats};

use crate::error::CacheResult;
use async_trait::async_trait;
use std::time::Duration;

/// A single cache level holding byte payloads.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Identifier of this level, unique within a `MultiLevelCache`.
    fn name(&self) -> &str;

    /// Returns the live item for `key`. Expired items are removed and reported as a miss.
    async fn get(&self, key: &str) -> CacheResult<Option<CacheItem<Vec<u8>>>>;

    /// Stores `item` as-is, keeping its timestamps. Evicts before returning if over capacity.
    async fn put(&self, item: CacheItem<Vec<u8>>) -> CacheResult<()>;

    /// Stores `value` under `key`, falling back to the level's default TTL when `ttl` is `None`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let ttl = ttl.or_else(|| self.default_ttl());
        self.put(CacheItem::bytes(key, value, ttl)).await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool>;

    async fn contains(&self, key: &str) -> CacheResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn clear(&self) -> CacheResult<()>;

    async fn stats(&self) -> LevelStats;

    /// Removes every expired item, returning how many were dropped.
    async fn prune_expired(&self) -> CacheResult<usize>;

    fn default_ttl(&self) -> Option<Duration> {
        None
    }
}
