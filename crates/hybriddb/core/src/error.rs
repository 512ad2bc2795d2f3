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

//! Error types shared across the hybrid query core.

use std::fmt;
use thiserror::Error;

use crate::query::engine::EngineError;
use crate::query::optimizer::OptimizerError;
use crate::query::planner::PlannerError;

/// Stage of the routing pipeline in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Optimize,
    Plan,
    Execute,
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPhase::Optimize => write!(f, "optimize"),
            ExecutionPhase::Plan => write!(f, "plan"),
            ExecutionPhase::Execute => write!(f, "execute"),
        }
    }
}

/// Errors raised by the router, the performance optimizer and the runtime.
#[derive(Debug, Error)]
pub enum HybridError {
    #[error("unknown query type: {query}")]
    UnknownQueryType { query: String },

    #[error("{phase} phase failed for query `{query}`: {source}")]
    Optimize {
        phase: ExecutionPhase,
        query: String,
        #[source]
        source: OptimizerError,
    },

    #[error("{phase} phase failed for query `{query}`: {source}")]
    Plan {
        phase: ExecutionPhase,
        query: String,
        #[source]
        source: PlannerError,
    },

    #[error("{phase} phase failed on engine `{engine}` for query `{query}`: {source}")]
    Engine {
        phase: ExecutionPhase,
        engine: String,
        query: String,
        #[source]
        source: EngineError,
    },

    #[error("query cancelled on engine `{engine}`: {reason}")]
    Cancelled { engine: String, reason: String },

    #[error("deadline exceeded on engine `{engine}`")]
    DeadlineExceeded { engine: String },

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl HybridError {
    pub(crate) fn optimize(query: &str, source: OptimizerError) -> Self {
        HybridError::Optimize {
            phase: ExecutionPhase::Optimize,
            query: query.to_string(),
            source,
        }
    }

    pub(crate) fn plan(query: &str, source: PlannerError) -> Self {
        HybridError::Plan {
            phase: ExecutionPhase::Plan,
            query: query.to_string(),
            source,
        }
    }

    pub(crate) fn execute(engine: &str, query: &str, source: EngineError) -> Self {
        HybridError::Engine {
            phase: ExecutionPhase::Execute,
            engine: engine.to_string(),
            query: query.to_string(),
            source,
        }
    }

    /// Phase of the pipeline that failed, when the error came from one.
    pub fn phase(&self) -> Option<ExecutionPhase> {
        match self {
            HybridError::Optimize { phase, .. } | HybridError::Plan { phase, .. } | HybridError::Engine { phase, .. } => Some(*phase),
            HybridError::Cancelled { .. } | HybridError::DeadlineExceeded { .. } => Some(ExecutionPhase::Execute),
            _ => None,
        }
    }
}

pub type HybridResult<T> = Result<T, HybridError>;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata encoding error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("invalid cache key `{0}`")]
    InvalidKey(String),

    #[error("item of {size} bytes exceeds cache capacity of {max} bytes")]
    ItemTooLarge { size: u64, max: u64 },

    #[error("invalid cache configuration: {0}")]
    InvalidConfiguration(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_names_phase_and_engine() {
        let err = HybridError::execute("columnar", "SELECT 1", EngineError::Execution("boom".to_string()));
        let message = err.to_string();

        assert!(message.contains("execute"));
        assert!(message.contains("columnar"));
        assert!(message.contains("SELECT 1"));
        assert_eq!(err.phase(), Some(ExecutionPhase::Execute));
    }

    #[test]
    fn test_optimize_error_keeps_query_text() {
        let err = HybridError::optimize("SELECT (", OptimizerError::UnbalancedParentheses);
        assert!(err.to_string().contains("SELECT ("));
        assert_eq!(err.phase(), Some(ExecutionPhase::Optimize));
    }

    #[test]
    fn test_unknown_type_has_no_phase() {
        let err = HybridError::UnknownQueryType { query: "VACUUM".to_string() };
        assert_eq!(err.phase(), None);
        assert_eq!(err.to_string(), "unknown query type: VACUUM");
    }
}
