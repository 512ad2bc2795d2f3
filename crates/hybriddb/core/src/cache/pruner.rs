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

//! Background removal of expired cache entries.
//!
//! The pruner runs on its own Tokio task with its own shutdown signal, so it
//! is never tied to the lifetime or cancellation of a caller's request. Each
//! target gets at most `pass_timeout` per pass.

use super::disk::DiskCache;
use super::memory::MemoryCache;
use super::multi_level::MultiLevelCache;
use super::query_cache::QueryCache;
use super::Cache;
use crate::error::CacheResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Anything the pruner can sweep.
#[async_trait]
pub trait Prunable: Send + Sync {
    fn label(&self) -> String;

    async fn prune_expired(&self) -> CacheResult<usize>;
}

#[async_trait]
impl Prunable for QueryCache {
    fn label(&self) -> String {
        "query-cache".to_string()
    }

    async fn prune_expired(&self) -> CacheResult<usize> {
        Ok(QueryCache::prune_expired(self))
    }
}

#[async_trait]
impl Prunable for MemoryCache {
    fn label(&self) -> String {
        Cache::name(self).to_string()
    }

    async fn prune_expired(&self) -> CacheResult<usize> {
        Cache::prune_expired(self).await
    }
}

#[async_trait]
impl Prunable for DiskCache {
    fn label(&self) -> String {
        Cache::name(self).to_string()
    }

    async fn prune_expired(&self) -> CacheResult<usize> {
        Cache::prune_expired(self).await
    }
}

#[async_trait]
impl Prunable for MultiLevelCache {
    fn label(&self) -> String {
        let names: Vec<&str> = self.levels().iter().map(|level| level.name()).collect();
        format!("multi-level[{}]", names.join(","))
    }

    async fn prune_expired(&self) -> CacheResult<usize> {
        MultiLevelCache::prune_expired(self).await
    }
}

pub struct CachePruner {
    targets: Vec<Arc<dyn Prunable>>,
    interval: Duration,
    pass_timeout: Duration,
}

impl CachePruner {
    pub fn new(interval: Duration, pass_timeout: Duration) -> Self {
        Self {
            targets: Vec::new(),
            interval,
            pass_timeout,
        }
    }

    pub fn with_target(mut self, target: Arc<dyn Prunable>) -> Self {
        self.targets.push(target);
        self
    }

    pub fn add_target(&mut self, target: Arc<dyn Prunable>) {
        self.targets.push(target);
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Sweeps every target once and returns the number of entries removed.
    pub async fn run_once(&self) -> usize {
        let mut total = 0;
        for target in &self.targets {
            match tokio::time::timeout(self.pass_timeout, target.prune_expired()).await {
                Ok(Ok(pruned)) => {
                    if pruned > 0 {
                        debug!(cache = %target.label(), pruned, "pruned expired entries");
                    }
                    total += pruned;
                }
                Ok(Err(e)) => warn!(cache = %target.label(), error = %e, "pruning pass failed"),
                Err(_) => warn!(cache = %target.label(), timeout_ms = self.pass_timeout.as_millis() as u64, "pruning pass timed out"),
            }
        }
        total
    }

    /// Starts the periodic sweep. Must be called from within a Tokio runtime.
    pub fn spawn(self) -> PrunerHandle {
        let (shutdown, mut signal) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            info!(targets = self.targets.len(), interval_ms = self.interval.as_millis() as u64, "cache pruner started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.run_once().await;
                    }
                    _ = signal.changed() => break,
                }
            }
            info!("cache pruner stopped");
        });
        PrunerHandle { shutdown, task }
    }
}

/// Owner of a running pruner task.
pub struct PrunerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PrunerHandle {
    /// Signals the task and waits for the pass in progress, if any, to finish.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "cache pruner task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::item::CacheOptions;
    use crate::query::types::QueryResult;

    struct StuckTarget;

    #[async_trait]
    impl Prunable for StuckTarget {
        fn label(&self) -> String {
            "stuck".to_string()
        }

        async fn prune_expired(&self) -> CacheResult<usize> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_run_once_sweeps_every_target() {
        let results = Arc::new(QueryCache::new(8, Duration::from_millis(10)).unwrap());
        let memory = Arc::new(MemoryCache::new("memory", CacheOptions::memory(8, Duration::from_millis(10))).unwrap());
        results.put("q", QueryResult::default(), 1);
        memory.set("k", vec![1], None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let pruner = CachePruner::new(Duration::from_secs(60), Duration::from_secs(1))
            .with_target(results.clone())
            .with_target(memory.clone());

        assert_eq!(pruner.run_once().await, 2);
        assert!(results.is_empty());
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_slow_target_is_bounded_by_pass_timeout() {
        let results = Arc::new(QueryCache::new(8, Duration::from_millis(5)).unwrap());
        results.put("q", QueryResult::default(), 1);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let pruner = CachePruner::new(Duration::from_secs(60), Duration::from_millis(20))
            .with_target(Arc::new(StuckTarget))
            .with_target(results.clone());

        let started = std::time::Instant::now();
        assert_eq!(pruner.run_once().await, 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_spawned_pruner_runs_and_shuts_down() {
        let results = Arc::new(QueryCache::new(8, Duration::from_millis(5)).unwrap());
        results.put("q", QueryResult::default(), 1);

        let handle = CachePruner::new(Duration::from_millis(20), Duration::from_secs(1))
            .with_target(results.clone())
            .spawn();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(results.is_empty());

        handle.shutdown().await;
    }
}
