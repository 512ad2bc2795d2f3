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

use super::item::{CacheItem, CacheOptions, LevelStats};
use super::Cache;
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
struct Slot {
    item: CacheItem<Vec<u8>>,
    seq: u64, // insertion sequence, breaks created_at ties
}

#[derive(Debug, Default)]
struct MemoryState {
    slots: HashMap<String, Slot>,
    size: u64,
    next_seq: u64,
}

impl MemoryState {
    fn remove(&mut self, key: &str) -> Option<Slot> {
        let slot = self.slots.remove(key)?;
        self.size = self.size.saturating_sub(slot.item.size);
        Some(slot)
    }

    fn oldest_key(&self) -> Option<String> {
        self.slots
            .iter()
            .min_by_key(|(_, slot)| (slot.item.created_at, slot.seq))
            .map(|(key, _)| key.clone())
    }
}

/// In-process cache level bounded by item count.
#[derive(Debug)]
pub struct MemoryCache {
    name: String,
    options: CacheOptions,
    state: Mutex<MemoryState>,
}

impl MemoryCache {
    pub fn new(name: impl Into<String>, options: CacheOptions) -> CacheResult<Self> {
        if options.max_size == 0 {
            return Err(CacheError::InvalidConfiguration("memory cache max_size must be at least one item".to_string()));
        }
        Ok(Self {
            name: name.into(),
            options,
            state: Mutex::new(MemoryState::default()),
        })
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> CacheResult<Option<CacheItem<Vec<u8>>>> {
        let mut state = self.state.lock();
        let expired = match state.slots.get(key) {
            None => return Ok(None),
            Some(slot) => slot.item.is_expired(),
        };
        if expired {
            state.remove(key);
            debug!(cache = %self.name, key, "dropped expired entry");
            return Ok(None);
        }
        Ok(state.slots.get(key).map(|slot| slot.item.clone()))
    }

    async fn put(&self, item: CacheItem<Vec<u8>>) -> CacheResult<()> {
        let mut state = self.state.lock();
        let replaced = state.remove(&item.key).is_some();

        if !replaced {
            while state.slots.len() as u64 >= self.options.max_size {
                let Some(victim) = state.oldest_key() else { break };
                state.remove(&victim);
                counter!("hybriddb_cache_evictions_total", 1, "level" => self.name.clone());
                debug!(cache = %self.name, key = %victim, "evicted oldest entry");
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.size += item.size;
        state.slots.insert(item.key.clone(), Slot { item, seq });
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        Ok(self.state.lock().remove(key).is_some())
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut state = self.state.lock();
        state.slots.clear();
        state.size = 0;
        Ok(())
    }

    async fn stats(&self) -> LevelStats {
        let state = self.state.lock();
        LevelStats {
            size: state.size,
            item_count: state.slots.len(),
        }
    }

    async fn prune_expired(&self) -> CacheResult<usize> {
        let now = Utc::now();
        let mut state = self.state.lock();
        let expired: Vec<String> = state
            .slots
            .iter()
            .filter(|(_, slot)| slot.item.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        Ok(expired.len())
    }

    fn default_ttl(&self) -> Option<Duration> {
        self.options.default_ttl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max_items: u64, ttl: Duration) -> MemoryCache {
        MemoryCache::new("memory", CacheOptions::memory(max_items, ttl)).unwrap()
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let cache = cache(4, Duration::from_secs(60));
        cache.set("a", b"alpha".to_vec(), None).await.unwrap();

        let item = cache.get("a").await.unwrap().unwrap();
        assert_eq!(item.value, b"alpha");
        assert!(item.expires_at.is_some());
        assert!(cache.contains("a").await.unwrap());
        assert_eq!(cache.stats().await, LevelStats { size: 5, item_count: 1 });
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss_and_removed() {
        let cache = cache(4, Duration::ZERO);
        cache.set("a", vec![1], Some(Duration::from_millis(20))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(cache.get("a").await.unwrap().is_none());
        assert_eq!(cache.stats().await.item_count, 0);
    }

    #[tokio::test]
    async fn test_full_cache_evicts_oldest_insert() {
        let cache = cache(3, Duration::ZERO);
        for key in ["a", "b", "c"] {
            cache.set(key, vec![0], None).await.unwrap();
        }
        // Reading "a" does not protect it.
        assert!(cache.get("a").await.unwrap().is_some());

        cache.set("d", vec![0], None).await.unwrap();

        assert!(cache.get("a").await.unwrap().is_none());
        for key in ["b", "c", "d"] {
            assert!(cache.get(key).await.unwrap().is_some(), "{key} should survive");
        }
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn test_overwrite_at_capacity_does_not_evict() {
        let cache = cache(2, Duration::ZERO);
        cache.set("a", vec![0], None).await.unwrap();
        cache.set("b", vec![0], None).await.unwrap();
        cache.set("a", vec![1, 2], None).await.unwrap();

        assert!(cache.get("b").await.unwrap().is_some());
        assert_eq!(cache.get("a").await.unwrap().unwrap().value, vec![1, 2]);
        assert_eq!(cache.stats().await, LevelStats { size: 3, item_count: 2 });
    }

    #[tokio::test]
    async fn test_delete_clear_and_prune() {
        let cache = cache(8, Duration::ZERO);
        cache.set("keep", vec![0], None).await.unwrap();
        cache.set("gone", vec![0], Some(Duration::from_millis(10))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.prune_expired().await.unwrap(), 1);
        assert!(cache.delete("keep").await.unwrap());
        assert!(!cache.delete("keep").await.unwrap());

        cache.set("x", vec![0; 4], None).await.unwrap();
        cache.clear().await.unwrap();
        assert_eq!(cache.stats().await, LevelStats::default());
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let err = MemoryCache::new("memory", CacheOptions::memory(0, Duration::ZERO)).unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfiguration(_)));
    }
}
