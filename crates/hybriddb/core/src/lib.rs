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

//! # HybridDB core
//!
//! Routing of SQL-like statements between a transactional (row) engine and
//! an analytical (columnar) engine, plus the caches and statistics around it.
//!
//! ## Modules
//!
//! - `query`: classification, rewrite, planning and routing
//! - `cache`: result cache, memory/disk payload tiers and background pruning
//! - `performance`: execution history, slow-query tracking and the cache-aware front end
//! - `runtime`: wires everything together from a `HybridConfig`
//!
//! ## Flow
//!
//! 1. **Lookup**: the result cache is checked by a key derived from text and arguments
//! 2. **Routing**: on a miss the statement is classified and sent to its engine
//! 3. **Bookkeeping**: the execution is recorded and cacheable results are stored

pub mod cache;
pub mod config;
pub mod error;
pub mod performance;
pub mod query;
pub mod runtime;

pub use cache::{Cache, CacheItem, CacheOptions, DiskCache, LevelStats, MemoryCache, MultiLevelCache, QueryCache, QueryCacheStats};
pub use config::{HybridConfig, MonitorConfig, PruningConfig, QueryCacheConfig};
pub use error::{CacheError, CacheResult, ExecutionPhase, HybridError, HybridResult};
pub use performance::{PerformanceMonitor, PerformanceOptimizer, QueryPerformance, QueryStatistics};
pub use query::{PlanNode, QueryClassifier, QueryContext, QueryEngine, QueryResult, QueryRouter, QueryType, Value};
pub use runtime::HybridRuntime;
