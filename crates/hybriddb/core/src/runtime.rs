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

//! Explicit wiring of the router, caches, monitor and pruner.

use crate::cache::disk::DiskCache;
use crate::cache::memory::MemoryCache;
use crate::cache::multi_level::MultiLevelCache;
use crate::cache::pruner::{CachePruner, PrunerHandle};
use crate::cache::query_cache::QueryCache;
use crate::cache::Cache;
use crate::config::HybridConfig;
use crate::error::HybridResult;
use crate::performance::monitor::PerformanceMonitor;
use crate::performance::optimizer::PerformanceOptimizer;
use crate::query::context::QueryContext;
use crate::query::engine::QueryEngine;
use crate::query::router::QueryRouter;
use crate::query::types::{QueryResult, Value};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

pub const MEMORY_TIER: &str = "memory";
pub const DISK_TIER: &str = "disk";

/// Every long-lived component of the hybrid core, built once from a `HybridConfig`.
pub struct HybridRuntime {
    config: HybridConfig,
    query_cache: Arc<QueryCache>,
    monitor: Arc<PerformanceMonitor>,
    optimizer: PerformanceOptimizer,
    payload_cache: Arc<MultiLevelCache>,
    pruner: Mutex<Option<PrunerHandle>>,
}

impl HybridRuntime {
    pub async fn new(config: HybridConfig, transactional: Arc<dyn QueryEngine>, analytical: Arc<dyn QueryEngine>) -> HybridResult<Self> {
        config.validate()?;

        let router = Arc::new(QueryRouter::new(transactional, analytical));
        let query_cache = Arc::new(QueryCache::new(config.query_cache.max_entries, config.query_cache.ttl)?);
        let monitor = Arc::new(PerformanceMonitor::new(config.monitor.clone()));
        let optimizer = PerformanceOptimizer::new(router, query_cache.clone(), monitor.clone());

        let mut levels: Vec<Arc<dyn Cache>> = vec![Arc::new(MemoryCache::new(MEMORY_TIER, config.memory_tier.clone())?)];
        if config.disk_tier.disk_path.is_some() {
            levels.push(Arc::new(DiskCache::open(DISK_TIER, config.disk_tier.clone()).await?));
        }
        let payload_cache = Arc::new(MultiLevelCache::new(levels, config.warm_upper_levels)?);

        info!(
            query_cache_entries = config.query_cache.max_entries,
            tiers = payload_cache.levels().len(),
            slow_query_ms = config.monitor.slow_query_threshold.as_millis() as u64,
            "hybrid runtime initialized"
        );

        Ok(Self {
            config,
            query_cache,
            monitor,
            optimizer,
            payload_cache,
            pruner: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    pub fn optimizer(&self) -> &PerformanceOptimizer {
        &self.optimizer
    }

    pub fn router(&self) -> &Arc<QueryRouter> {
        self.optimizer.router()
    }

    pub fn query_cache(&self) -> &Arc<QueryCache> {
        &self.query_cache
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    /// Tiered cache for arbitrary payloads (memory, then disk when configured).
    pub fn payload_cache(&self) -> &Arc<MultiLevelCache> {
        &self.payload_cache
    }

    pub async fn execute_query(&self, ctx: &QueryContext, query: &str, args: &[Value]) -> HybridResult<QueryResult> {
        self.optimizer.execute_query(ctx, query, args).await
    }

    /// Starts background pruning of every cache. Returns false when pruning
    /// is disabled or already running. Requires a Tokio runtime.
    pub fn start_pruning(&self) -> bool {
        if !self.config.pruning.enabled {
            return false;
        }
        let mut slot = self.pruner.lock();
        if slot.is_some() {
            return false;
        }

        let pruner = CachePruner::new(self.config.pruning.interval, self.config.pruning.pass_timeout)
            .with_target(self.query_cache.clone())
            .with_target(self.payload_cache.clone());
        *slot = Some(pruner.spawn());
        true
    }

    pub fn is_pruning(&self) -> bool {
        self.pruner.lock().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stops background pruning, waiting for a pass in progress.
    pub async fn shutdown(&self) {
        let handle = self.pruner.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
        info!("hybrid runtime stopped");
    }
}
