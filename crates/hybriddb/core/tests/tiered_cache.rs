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

mod common;

use common::CountingLevel;
use hybriddb_core::cache::{Cache, CacheOptions, DiskCache, MemoryCache, MultiLevelCache};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn tiers(dir: &TempDir, warm: bool) -> (Arc<CountingLevel<MemoryCache>>, Arc<CountingLevel<DiskCache>>, MultiLevelCache) {
    let memory = CountingLevel::new(MemoryCache::new("memory", CacheOptions::memory(64, Duration::from_secs(60))).unwrap());
    let disk = CountingLevel::new(
        DiskCache::open("disk", CacheOptions::disk(dir.path(), 1024 * 1024, Duration::from_secs(600)))
            .await
            .unwrap(),
    );
    let cache = MultiLevelCache::new(vec![memory.clone() as Arc<dyn Cache>, disk.clone() as Arc<dyn Cache>], warm).unwrap();
    (memory, disk, cache)
}

#[tokio::test]
async fn test_hit_in_slowest_level_is_promoted() {
    let dir = TempDir::new().unwrap();
    let (memory, disk, cache) = tiers(&dir, true).await;
    disk.set("report", b"quarterly".to_vec(), None).await.unwrap();

    let first = cache.get("report").await.unwrap();
    assert_eq!(first.value, b"quarterly");
    assert_eq!(disk.reads(), 1);

    let second = cache.get("report").await.unwrap();
    assert_eq!(second.value, b"quarterly");
    assert_eq!(disk.reads(), 1, "second read must be served by the memory tier");
    assert_eq!(memory.reads(), 2);
}

#[tokio::test]
async fn test_without_warming_every_read_reaches_disk() {
    let dir = TempDir::new().unwrap();
    let (_memory, disk, cache) = tiers(&dir, false).await;
    disk.set("report", b"q".to_vec(), None).await.unwrap();

    cache.get("report").await.unwrap();
    cache.get("report").await.unwrap();
    assert_eq!(disk.reads(), 2);
}

#[tokio::test]
async fn test_disk_tier_survives_reopen_and_rewarms_memory() {
    let dir = TempDir::new().unwrap();
    {
        let (_memory, _disk, cache) = tiers(&dir, true).await;
        cache.set("session", b"token".to_vec(), None).await.unwrap();
    }

    let (memory, disk, cache) = tiers(&dir, true).await;
    assert_eq!(memory.stats().await.item_count, 0);

    assert_eq!(cache.get("session").await.unwrap().value, b"token");
    assert_eq!(memory.stats().await.item_count, 1);
    assert_eq!(disk.reads(), 1);

    let stats = cache.stats().await;
    assert_eq!(stats["memory"].item_count, 1);
    assert_eq!(stats["disk"].size, 5);
}

#[tokio::test]
async fn test_delete_reaches_every_tier() {
    let dir = TempDir::new().unwrap();
    let (memory, disk, cache) = tiers(&dir, true).await;
    cache.set("k", vec![1, 2, 3], None).await.unwrap();

    assert!(cache.delete("k").await.unwrap());
    assert!(memory.get("k").await.unwrap().is_none());
    assert!(disk.get("k").await.unwrap().is_none());
    assert!(!dir.path().join("k").exists());
}

#[tokio::test]
async fn test_concurrent_reads_and_writes_stay_consistent() {
    let dir = TempDir::new().unwrap();
    let (_memory, _disk, cache) = tiers(&dir, true).await;
    let cache = Arc::new(cache);

    let mut tasks = Vec::new();
    for i in 0..16 {
        let cache = cache.clone();
        tasks.push(tokio::spawn(async move {
            let key = format!("key-{}", i % 4);
            cache.set(&key, vec![i as u8], None).await.unwrap();
            cache.get(&key).await.is_some()
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap());
    }

    let stats = cache.stats().await;
    assert_eq!(stats["memory"].item_count, 4);
    assert_eq!(stats["disk"].item_count, 4);
}
