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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Victim selection for bounded caches.
///
/// Entries are evicted oldest `created_at` first. Reads never refresh an
/// entry's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvictionPolicy {
    #[default]
    InsertionOrder,
}

/// A cached value and its bookkeeping. Read-only once stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheItem<T> {
    pub key: String,
    pub value: T,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub size: u64,
}

impl<T> CacheItem<T> {
    pub fn new(key: impl Into<String>, value: T, size: u64, ttl: Option<Duration>) -> Self {
        let created_at = Utc::now();
        Self {
            key: key.into(),
            value,
            created_at,
            expires_at: expiry_from(created_at, ttl),
            size,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

impl CacheItem<Vec<u8>> {
    /// A byte payload whose cost is its length.
    pub fn bytes(key: impl Into<String>, value: Vec<u8>, ttl: Option<Duration>) -> Self {
        let size = value.len() as u64;
        Self::new(key, value, size, ttl)
    }
}

pub(crate) fn expiry_from(created_at: DateTime<Utc>, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    // Zero TTL means "no expiry", mirroring an unset TTL.
    let ttl = ttl.filter(|ttl| !ttl.is_zero())?;
    let ttl = chrono::Duration::from_std(ttl).ok()?;
    created_at.checked_add_signed(ttl)
}

/// Configuration shared by the memory and disk levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheOptions {
    #[serde(with = "crate::query::types::duration_millis")]
    pub ttl: Duration, // default time-to-live, zero disables expiry
    pub max_size: u64, // item count for memory levels, bytes for disk levels
    pub eviction_policy: EvictionPolicy,
    pub disk_path: Option<PathBuf>, // directory for disk-backed levels
}

impl CacheOptions {
    pub fn memory(max_items: u64, ttl: Duration) -> Self {
        Self {
            ttl,
            max_size: max_items,
            eviction_policy: EvictionPolicy::InsertionOrder,
            disk_path: None,
        }
    }

    pub fn disk(path: impl Into<PathBuf>, max_bytes: u64, ttl: Duration) -> Self {
        Self {
            ttl,
            max_size: max_bytes,
            eviction_policy: EvictionPolicy::InsertionOrder,
            disk_path: Some(path.into()),
        }
    }

    pub(crate) fn default_ttl(&self) -> Option<Duration> {
        if self.ttl.is_zero() { None } else { Some(self.ttl) }
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::memory(10_000, Duration::from_secs(600))
    }
}

/// Occupancy of a single cache level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelStats {
    pub size: u64,
    pub item_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_without_ttl_never_expires() {
        let item = CacheItem::bytes("k", vec![1, 2, 3], None);
        assert_eq!(item.size, 3);
        assert!(item.expires_at.is_none());
        assert!(!item.is_expired_at(Utc::now() + chrono::Duration::days(365)));
    }

    #[test]
    fn test_item_expires_at_deadline() {
        let item = CacheItem::new("k", 7u32, 1, Some(Duration::from_secs(10)));
        let expires_at = item.expires_at.unwrap();

        assert!(!item.is_expired_at(expires_at - chrono::Duration::milliseconds(1)));
        assert!(item.is_expired_at(expires_at));
    }

    #[test]
    fn test_zero_ttl_disables_expiry() {
        let item = CacheItem::new("k", (), 0, Some(Duration::ZERO));
        assert!(item.expires_at.is_none());
        assert_eq!(CacheOptions::memory(1, Duration::ZERO).default_ttl(), None);
    }

    #[test]
    fn test_options_serialize_ttl_as_millis() {
        let options = CacheOptions::disk("/tmp/cache", 1024, Duration::from_secs(2));
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["ttl"], 2000);
        assert_eq!(json["eviction_policy"], "InsertionOrder");
    }
}
