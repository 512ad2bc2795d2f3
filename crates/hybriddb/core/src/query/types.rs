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

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Dynamically-typed cell value carried in result rows and query arguments.
pub type Value = serde_json::Value;

/// Workload class assigned to a statement by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryType {
    Unknown,
    Transactional,
    Analytical,
    Hybrid,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Unknown => "unknown",
            QueryType::Transactional => "transactional",
            QueryType::Analytical => "analytical",
            QueryType::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a single statement execution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub rows_affected: u64,
    #[serde(with = "duration_millis")]
    pub execution_time: Duration,
    pub query_plan: String,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            ..Self::default()
        }
    }

    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }

    /// Rows returned, or rows touched for statements that return nothing.
    pub fn rows_processed(&self) -> u64 {
        if self.rows.is_empty() { self.rows_affected } else { self.rows.len() as u64 }
    }

    /// Approximate in-memory footprint, used as the cost of a cache entry.
    pub fn estimated_size(&self) -> u64 {
        match serde_json::to_vec(self) {
            Ok(encoded) => encoded.len() as u64,
            Err(_) => {
                let header: usize = self.columns.iter().map(String::len).sum();
                (header + self.rows.len() * self.columns.len().max(1) * 16 + self.query_plan.len()) as u64
            }
        }
    }
}

/// Serde adapter storing a `Duration` as whole milliseconds.
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rows_processed_prefers_returned_rows() {
        let result = QueryResult::new(vec!["id".to_string()], vec![vec![json!(1)], vec![json!(2)]]);
        assert_eq!(result.rows_processed(), 2);

        let write = QueryResult::affected(7);
        assert_eq!(write.rows_processed(), 7);
    }

    #[test]
    fn test_estimated_size_grows_with_rows() {
        let small = QueryResult::new(vec!["id".to_string()], vec![vec![json!(1)]]);
        let large = QueryResult::new(vec!["id".to_string()], (0..100).map(|i| vec![json!(i)]).collect());
        assert!(large.estimated_size() > small.estimated_size());
    }

    #[test]
    fn test_query_type_display() {
        assert_eq!(QueryType::Hybrid.to_string(), "hybrid");
        assert_eq!(QueryType::Unknown.as_str(), "unknown");
    }
}
