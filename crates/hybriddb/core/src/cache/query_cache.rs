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

use super::item::CacheItem;
use crate::error::{CacheError, CacheResult};
use crate::query::types::QueryResult;
use chrono::Utc;
use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Snapshot of query cache occupancy and effectiveness
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryCacheStats {
    pub entries: usize,   // live entries
    pub size: u64,        // sum of stored entry costs
    pub max_size: usize,  // entry capacity
    pub hits: u64,        // lookups served since the last clear
    pub misses: u64,      // lookups not served since the last clear
    pub hit_rate: f64,    // hits / (hits + misses), 0 before any lookup
}

#[derive(Debug)]
struct Entry {
    item: CacheItem<QueryResult>,
    seq: u64,
}

#[derive(Debug, Default)]
struct QueryCacheState {
    entries: HashMap<String, Entry>,
    size: u64,
    next_seq: u64,
    hits: u64,
    misses: u64,
}

impl QueryCacheState {
    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.size = self.size.saturating_sub(entry.item.size);
        Some(entry)
    }
}

/// Bounded, TTL'd cache of routed query results.
#[derive(Debug)]
pub struct QueryCache {
    max_entries: usize,
    ttl: Option<Duration>,
    state: Mutex<QueryCacheState>,
}

impl QueryCache {
    /// `ttl` of zero keeps entries until they are evicted.
    pub fn new(max_entries: usize, ttl: Duration) -> CacheResult<Self> {
        if max_entries == 0 {
            return Err(CacheError::InvalidConfiguration("query cache max_entries must be positive".to_string()));
        }
        Ok(Self {
            max_entries,
            ttl: if ttl.is_zero() { None } else { Some(ttl) },
            state: Mutex::new(QueryCacheState::default()),
        })
    }

    pub fn get(&self, key: &str) -> Option<QueryResult> {
        let mut state = self.state.lock();

        let lookup = state.entries.get(key).map(|entry| (entry.item.is_expired(), entry.item.value.clone()));
        let found = match lookup {
            Some((true, _)) => {
                state.remove(key);
                debug!(key, "query cache entry expired");
                None
            }
            Some((false, value)) => Some(value),
            None => None,
        };

        if found.is_some() {
            state.hits += 1;
            counter!("hybriddb_query_cache_hits_total", 1);
        } else {
            state.misses += 1;
            counter!("hybriddb_query_cache_misses_total", 1);
        }
        found
    }

    /// Stores `value` with the given cost, evicting the oldest entry when full and `key` is new.
    pub fn put(&self, key: &str, value: QueryResult, cost: u64) {
        let mut state = self.state.lock();

        if state.remove(key).is_none() {
            while state.entries.len() >= self.max_entries {
                let victim = state
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| (entry.item.created_at, entry.seq))
                    .map(|(key, _)| key.clone());
                let Some(victim) = victim else { break };
                state.remove(&victim);
                counter!("hybriddb_query_cache_evictions_total", 1);
                debug!(key = %victim, "evicted oldest query result");
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.size += cost;
        state.entries.insert(
            key.to_string(),
            Entry {
                item: CacheItem::new(key, value, cost, self.ttl),
                seq,
            },
        );
    }

    pub fn stats(&self) -> QueryCacheStats {
        let state = self.state.lock();
        let lookups = state.hits + state.misses;
        QueryCacheStats {
            entries: state.entries.len(),
            size: state.size,
            max_size: self.max_entries,
            hits: state.hits,
            misses: state.misses,
            hit_rate: if lookups == 0 { 0.0 } else { state.hits as f64 / lookups as f64 },
        }
    }

    /// Drops every entry and resets the hit and miss counters.
    pub fn clear(&self) {
        *self.state.lock() = QueryCacheState::default();
    }

    pub fn prune_expired(&self) -> usize {
        let now = Utc::now();
        let mut state = self.state.lock();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.item.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(n: i64) -> QueryResult {
        QueryResult::new(vec!["n".to_string()], vec![vec![json!(n)]])
    }

    #[test]
    fn test_put_then_get_is_a_hit() {
        let cache = QueryCache::new(4, Duration::from_secs(60)).unwrap();
        cache.put("q1", result(1), 10);

        assert_eq!(cache.get("q1"), Some(result(1)));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 0));
        assert_eq!(stats.size, 10);
    }

    #[test]
    fn test_ttl_expiry_is_a_miss() {
        let cache = QueryCache::new(4, Duration::from_millis(20)).unwrap();
        cache.put("q1", result(1), 1);
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.get("q1"), None);
        assert_eq!(cache.stats().entries, 0);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_capacity_evicts_earliest_insert() {
        let cache = QueryCache::new(3, Duration::ZERO).unwrap();
        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            cache.put(key, result(i as i64), 1);
        }
        assert!(cache.get("a").is_some());

        cache.put("d", result(3), 1);

        assert_eq!(cache.get("a"), None);
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
        assert!(cache.get("d").is_some());
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_hit_rate_matches_counters_and_clear_resets() {
        let cache = QueryCache::new(4, Duration::ZERO).unwrap();
        assert_eq!(cache.stats().hit_rate, 0.0);

        cache.put("k", result(1), 1);
        cache.get("k");
        cache.get("k");
        cache.get("k");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 4);
        assert_eq!(stats.hit_rate, 0.75);

        cache.clear();
        let stats = cache.stats();
        assert_eq!((stats.entries, stats.hits, stats.misses, stats.size), (0, 0, 0, 0));
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[test]
    fn test_prune_expired_keeps_counters() {
        let cache = QueryCache::new(4, Duration::from_millis(10)).unwrap();
        cache.put("a", result(1), 1);
        cache.put("b", result(2), 1);
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(cache.prune_expired(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        assert!(QueryCache::new(0, Duration::ZERO).is_err());
    }
}
