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

pub mod classifier;
pub mod context;
pub mod engine;
pub mod optimizer;
pub mod planner;
pub mod router;
pub mod types;

pub use classifier::QueryClassifier;
pub use context::{Interrupted, QueryContext};
pub use engine::{EngineError, QueryEngine};
pub use optimizer::{OptimizerError, QueryOptimizer, RewriteRule, RuleApplication};
pub use planner::{JoinType, PlanNode, PlanOperation, PlannerError, QueryPlanner, SetOperator, SortKey};
pub use router::{QueryRouter, RouteOutcome};
pub use types::{QueryResult, QueryType, Value};
