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

use super::context::QueryContext;
use super::planner::PlanNode;
use super::types::{QueryResult, Value};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("execution failed: {0}")]
    Execution(String),
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// A backend able to execute statements.
///
/// Two engines are wired into the router: a transactional one for point
/// lookups and writes, and an analytical one that also accepts plan trees.
/// Implementations are shared across tasks and must tolerate concurrent calls.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Execute raw statement text with positional arguments.
    async fn execute(&self, ctx: &QueryContext, query: &str, args: &[Value]) -> Result<QueryResult, EngineError>;

    /// Execute a plan produced by the planner.
    async fn execute_with_plan(&self, ctx: &QueryContext, plan: PlanNode) -> Result<QueryResult, EngineError>;

    fn name(&self) -> &str;
}
