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

//! Keyword-based workload classification.
//!
//! Rules are evaluated against the upper-cased statement, first match wins:
//!
//! 1. `GROUP BY` / `ORDER BY`, or an aggregate call in a statement without
//!    relational composition, is analytical.
//! 2. `INSERT`, `UPDATE`, `DELETE`, `BEGIN`, `COMMIT`, `ROLLBACK` are
//!    transactional.
//! 3. `SELECT` with `JOIN`, `UNION`, `INTERSECT` or `EXCEPT` is hybrid.
//! 4. Any other `SELECT` is transactional.
//! 5. Everything else is unknown.

use super::types::QueryType;

const ORDERING_INDICATORS: [&str; 2] = ["GROUP BY", "ORDER BY"];
const AGGREGATE_INDICATORS: [&str; 5] = ["SUM(", "AVG(", "MIN(", "MAX(", "COUNT("];
const TRANSACTIONAL_INDICATORS: [&str; 6] = ["INSERT", "UPDATE", "DELETE", "BEGIN", "COMMIT", "ROLLBACK"];
const COMPOSITION_INDICATORS: [&str; 4] = ["JOIN", "UNION", "INTERSECT", "EXCEPT"];

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryClassifier;

impl QueryClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, query: &str) -> QueryType {
        let upper = query.to_uppercase();
        let contains_any = |needles: &[&str]| needles.iter().any(|needle| upper.contains(needle));

        let composed = contains_any(&COMPOSITION_INDICATORS);

        if contains_any(&ORDERING_INDICATORS) || (contains_any(&AGGREGATE_INDICATORS) && !composed) {
            return QueryType::Analytical;
        }

        if contains_any(&TRANSACTIONAL_INDICATORS) {
            return QueryType::Transactional;
        }

        let is_select = upper.contains("SELECT");
        if is_select && composed {
            return QueryType::Hybrid;
        }

        if is_select { QueryType::Transactional } else { QueryType::Unknown }
    }
}
