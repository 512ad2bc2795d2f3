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

#![allow(dead_code)]

use async_trait::async_trait;
use hybriddb_core::cache::{Cache, CacheItem, LevelStats};
use hybriddb_core::query::{EngineError, PlanNode, QueryContext, QueryEngine, QueryResult, Value};
use hybriddb_core::CacheResult;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Engine that answers every call with one row and counts how often it was reached.
pub struct CountingEngine {
    name: &'static str,
    pub executes: AtomicUsize,
    pub plan_executes: AtomicUsize,
    latency: Duration,
    cancel_before_answer: bool,
}

impl CountingEngine {
    fn build(name: &'static str, latency: Duration, cancel_before_answer: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            executes: AtomicUsize::new(0),
            plan_executes: AtomicUsize::new(0),
            latency,
            cancel_before_answer,
        })
    }

    pub fn new(name: &'static str) -> Arc<Self> {
        Self::build(name, Duration::ZERO, false)
    }

    /// Sleeps for `latency` on every call while reporting one millisecond.
    pub fn sleeping(name: &'static str, latency: Duration) -> Arc<Self> {
        Self::build(name, latency, false)
    }

    /// Cancels the caller's context right before answering.
    pub fn cancelling(name: &'static str) -> Arc<Self> {
        Self::build(name, Duration::ZERO, true)
    }

    pub fn calls(&self) -> usize {
        self.executes.load(Ordering::SeqCst) + self.plan_executes.load(Ordering::SeqCst)
    }

    async fn answer(&self, ctx: &QueryContext) -> QueryResult {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.cancel_before_answer {
            ctx.cancel(Some("client disconnected"));
        }
        QueryResult {
            execution_time: if self.latency.is_zero() { Duration::ZERO } else { Duration::from_millis(1) },
            ..QueryResult::new(vec!["value".to_string()], vec![vec![json!(self.name)]])
        }
    }
}

#[async_trait]
impl QueryEngine for CountingEngine {
    async fn execute(&self, ctx: &QueryContext, _query: &str, _args: &[Value]) -> Result<QueryResult, EngineError> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer(ctx).await)
    }

    async fn execute_with_plan(&self, ctx: &QueryContext, _plan: PlanNode) -> Result<QueryResult, EngineError> {
        self.plan_executes.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer(ctx).await)
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Cache level wrapper counting reads that reach the inner level.
pub struct CountingLevel<C> {
    pub inner: C,
    pub reads: AtomicUsize,
}

impl<C> CountingLevel<C> {
    pub fn new(inner: C) -> Arc<Self> {
        Arc::new(Self {
            inner,
            reads: AtomicUsize::new(0),
        })
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: Cache> Cache for CountingLevel<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(&self, key: &str) -> CacheResult<Option<CacheItem<Vec<u8>>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put(&self, item: CacheItem<Vec<u8>>) -> CacheResult<()> {
        self.inner.put(item).await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.inner.delete(key).await
    }

    async fn clear(&self) -> CacheResult<()> {
        self.inner.clear().await
    }

    async fn stats(&self) -> LevelStats {
        self.inner.stats().await
    }

    async fn prune_expired(&self) -> CacheResult<usize> {
        self.inner.prune_expired().await
    }

    fn default_ttl(&self) -> Option<Duration> {
        self.inner.default_ttl()
    }
}
