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

use crate::config::MonitorConfig;
use crate::query::types::{QueryType, duration_millis};
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::warn;

/// One recorded execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPerformance {
    pub query: String,
    #[serde(with = "duration_millis")]
    pub execution_time: Duration,
    pub rows_processed: u64,
    pub engine: String,
    pub timestamp: DateTime<Utc>,
    pub query_type: QueryType,
}

impl QueryPerformance {
    pub fn new(query: impl Into<String>, execution_time: Duration, rows_processed: u64, engine: impl Into<String>, query_type: QueryType) -> Self {
        Self {
            query: query.into(),
            execution_time,
            rows_processed,
            engine: engine.into(),
            timestamp: Utc::now(),
            query_type,
        }
    }
}

/// Running aggregate for one exact query text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStatistics {
    pub query: String,
    pub count: u64,
    #[serde(with = "duration_millis")]
    pub total_time: Duration,
    #[serde(with = "duration_millis")]
    pub min_time: Duration,
    #[serde(with = "duration_millis")]
    pub max_time: Duration,
    #[serde(with = "duration_millis")]
    pub avg_time: Duration,
    pub total_rows_processed: u64,
}

impl QueryStatistics {
    fn first(entry: &QueryPerformance) -> Self {
        Self {
            query: entry.query.clone(),
            count: 1,
            total_time: entry.execution_time,
            min_time: entry.execution_time,
            max_time: entry.execution_time,
            avg_time: entry.execution_time,
            total_rows_processed: entry.rows_processed,
        }
    }

    fn record(&mut self, entry: &QueryPerformance) {
        self.count += 1;
        self.total_time += entry.execution_time;
        self.min_time = self.min_time.min(entry.execution_time);
        self.max_time = self.max_time.max(entry.execution_time);
        self.avg_time = Duration::from_nanos((self.total_time.as_nanos() / u128::from(self.count)) as u64);
        self.total_rows_processed += entry.rows_processed;
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    history: VecDeque<QueryPerformance>,
    statistics: HashMap<String, QueryStatistics>,
    slow: HashMap<String, QueryPerformance>,
}

/// Bounded execution history with per-query aggregates and slow-query tracking.
#[derive(Debug)]
pub struct PerformanceMonitor {
    config: MonitorConfig,
    state: Mutex<MonitorState>,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(MonitorState::default()),
        }
    }

    pub fn slow_query_threshold(&self) -> Duration {
        self.config.slow_query_threshold
    }

    pub fn record_query_performance(&self, entry: QueryPerformance) {
        histogram!("hybriddb_query_execution_seconds", entry.execution_time.as_secs_f64(), "type" => entry.query_type.as_str());
        let slow = entry.execution_time > self.config.slow_query_threshold;

        let mut state = self.state.lock();
        state
            .statistics
            .entry(entry.query.clone())
            .and_modify(|stats| stats.record(&entry))
            .or_insert_with(|| QueryStatistics::first(&entry));

        if slow {
            counter!("hybriddb_slow_queries_total", 1);
            warn!(
                query = %entry.query,
                engine = %entry.engine,
                elapsed_ms = entry.execution_time.as_millis() as u64,
                threshold_ms = self.config.slow_query_threshold.as_millis() as u64,
                "slow query"
            );
            state.slow.insert(entry.query.clone(), entry.clone());
        }

        state.history.push_back(entry);
        while state.history.len() > self.config.history_size {
            state.history.pop_front();
        }
    }

    pub fn get_query_statistics(&self, query: &str) -> Option<QueryStatistics> {
        self.state.lock().statistics.get(query).cloned()
    }

    pub fn get_all_query_statistics(&self) -> HashMap<String, QueryStatistics> {
        self.state.lock().statistics.clone()
    }

    /// Latest slow occurrence of each query text, oldest first.
    pub fn get_slow_queries(&self) -> Vec<QueryPerformance> {
        let mut slow: Vec<QueryPerformance> = self.state.lock().slow.values().cloned().collect();
        slow.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.query.cmp(&b.query)));
        slow
    }

    /// Bounded history in insertion order.
    pub fn get_query_history(&self) -> Vec<QueryPerformance> {
        self.state.lock().history.iter().cloned().collect()
    }

    pub fn reset(&self) {
        *self.state.lock() = MonitorState::default();
    }
}
