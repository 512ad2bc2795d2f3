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

//! Cache-aware execution front end.
//!
//! `execute_query` checks the result cache, routes on a miss, records the
//! execution and stores cacheable results. Once the engine has answered,
//! the remaining bookkeeping has no suspension point, so a caller dropping
//! or cancelling the request cannot leave the cache and the monitor
//! disagreeing about an execution.

use super::monitor::{PerformanceMonitor, QueryPerformance};
use crate::cache::query_cache::{QueryCache, QueryCacheStats};
use crate::error::HybridResult;
use crate::query::context::QueryContext;
use crate::query::optimizer::collapse_whitespace;
use crate::query::router::QueryRouter;
use crate::query::types::{QueryResult, QueryType, Value};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Instant;
use tracing::{debug, instrument};

static MUTATING_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(INSERT|UPDATE|DELETE|MERGE|UPSERT|REPLACE|DROP|CREATE|ALTER|TRUNCATE|RENAME|GRANT|REVOKE)\b").expect("static regex")
});

const SELECT_STAR_SUGGESTION: &str = "Avoid SELECT *: list only the needed columns and add a WHERE clause to limit the rows read.";
const PRE_AGGREGATE_SUGGESTION: &str = "Consider pre-aggregating this GROUP BY (materialized summary table) or indexing the grouping columns.";
const SPLIT_SUGGESTION: &str = "Consider splitting the query: run the JOIN on the transactional engine and the GROUP BY aggregation on the analytical engine.";

/// True when results of `query` may be cached: a plain `SELECT` without any
/// data-modifying or schema keyword anywhere in the text.
pub fn is_cacheable(query: &str) -> bool {
    let trimmed = query.trim_start();
    let starts_with_select = trimmed.get(..6).is_some_and(|prefix| prefix.eq_ignore_ascii_case("SELECT"));
    starts_with_select && !MUTATING_KEYWORD.is_match(trimmed)
}

/// Deterministic cache key for a statement and its arguments.
///
/// Whitespace runs outside string literals are collapsed. Literal text and
/// letter case are kept as written since both are significant to the result.
pub fn cache_key(query: &str, args: &[Value]) -> String {
    let normalized = collapse_whitespace(query);
    let mut hasher = blake3::Hasher::new();
    hasher.update(normalized.as_bytes());
    for arg in args {
        hasher.update(&[0x1f]);
        hasher.update(arg.to_string().as_bytes());
    }
    format!("q:{}", hasher.finalize().to_hex())
}

pub struct PerformanceOptimizer {
    router: Arc<QueryRouter>,
    cache: Arc<QueryCache>,
    monitor: Arc<PerformanceMonitor>,
}

impl PerformanceOptimizer {
    pub fn new(router: Arc<QueryRouter>, cache: Arc<QueryCache>, monitor: Arc<PerformanceMonitor>) -> Self {
        Self { router, cache, monitor }
    }

    pub fn router(&self) -> &Arc<QueryRouter> {
        &self.router
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    pub fn get_cache_stats(&self) -> QueryCacheStats {
        self.cache.stats()
    }

    /// Serve `query` from the result cache or route it, recording the execution.
    ///
    /// A cache hit touches neither the router nor the monitor. Failed
    /// executions are neither recorded nor cached. The monitor receives the
    /// wall-clock time of the routed call, whatever the engine reports.
    #[instrument(skip(self, ctx, args), fields(arg_count = args.len()))]
    pub async fn execute_query(&self, ctx: &QueryContext, query: &str, args: &[Value]) -> HybridResult<QueryResult> {
        let key = cache_key(query, args);
        if let Some(result) = self.cache.get(&key) {
            debug!(%key, "served from query cache");
            return Ok(result);
        }

        let started = Instant::now();
        let outcome = self.router.route_with_details(ctx, query, args).await?;
        let elapsed = started.elapsed();

        self.monitor.record_query_performance(QueryPerformance::new(
            query,
            elapsed,
            outcome.result.rows_processed(),
            outcome.engine.as_str(),
            outcome.query_type,
        ));

        if is_cacheable(query) {
            let cost = outcome.result.estimated_size();
            self.cache.put(&key, outcome.result.clone(), cost);
            debug!(%key, cost, "cached query result");
        }

        Ok(outcome.result)
    }

    /// Tuning hints for recorded slow queries, keyed by query text.
    pub fn get_query_suggestions(&self) -> HashMap<String, String> {
        let mut suggestions = HashMap::new();

        for slow in self.monitor.get_slow_queries() {
            let upper = slow.query.to_uppercase();
            let suggestion = match slow.query_type {
                QueryType::Transactional if upper.contains("SELECT *") => Some(SELECT_STAR_SUGGESTION),
                QueryType::Analytical if upper.contains("GROUP BY") => Some(PRE_AGGREGATE_SUGGESTION),
                // Advisory only: hybrid statements are always executed whole.
                QueryType::Hybrid if upper.contains("JOIN") && upper.contains("GROUP BY") => Some(SPLIT_SUGGESTION),
                _ => None,
            };
            if let Some(suggestion) = suggestion {
                suggestions.insert(slow.query, suggestion.to_string());
            }
        }

        suggestions
    }
}
