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

//! Fixed in-memory tables and two toy engines over them.

use async_trait::async_trait;
use hybriddb_core::query::{EngineError, PlanNode, PlanOperation, QueryContext, QueryEngine, QueryResult, Value};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

pub struct Table {
    columns: Vec<&'static str>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.rsplit('.').next().unwrap_or(name);
        self.columns.iter().position(|column| column.eq_ignore_ascii_case(name))
    }

    fn to_result(&self) -> QueryResult {
        QueryResult::new(self.columns.iter().map(|c| c.to_string()).collect(), self.rows.clone())
    }
}

pub struct Catalog {
    tables: HashMap<&'static str, Table>,
}

impl Catalog {
    pub fn sample() -> Arc<Self> {
        let mut tables = HashMap::new();
        tables.insert(
            "users",
            Table {
                columns: vec!["id", "name", "dept"],
                rows: vec![
                    vec![json!(1), json!("ada"), json!("eng")],
                    vec![json!(2), json!("grace"), json!("eng")],
                    vec![json!(3), json!("linus"), json!("ops")],
                    vec![json!(4), json!("barbara"), json!("research")],
                ],
            },
        );
        tables.insert(
            "orders",
            Table {
                columns: vec!["id", "user_id", "total"],
                rows: vec![
                    vec![json!(10), json!(1), json!(120.5)],
                    vec![json!(11), json!(1), json!(80.0)],
                    vec![json!(12), json!(3), json!(42.0)],
                ],
            },
        );
        Arc::new(Self { tables })
    }

    fn table(&self, reference: &str) -> Result<&Table, EngineError> {
        let name = reference.split_whitespace().next().unwrap_or_default().to_ascii_lowercase();
        self.tables
            .get(name.as_str())
            .ok_or_else(|| EngineError::Execution(format!("unknown table `{name}`")))
    }

    fn table_in_text(&self, query: &str) -> Result<&Table, EngineError> {
        let mut words = query.split_whitespace();
        while let Some(word) = words.next() {
            if word.eq_ignore_ascii_case("FROM") {
                let reference = words.next().unwrap_or_default().trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
                return self.table(reference);
            }
        }
        Err(EngineError::Execution("statement names no table".to_string()))
    }
}

fn leading_keyword(query: &str) -> String {
    query.split_whitespace().next().unwrap_or_default().to_ascii_uppercase()
}

/// Row-store stand-in: point reads return the whole table, writes report one row.
pub struct RowEngine {
    catalog: Arc<Catalog>,
    latency: Duration,
}

impl RowEngine {
    pub fn new(catalog: Arc<Catalog>, latency: Duration) -> Self {
        Self { catalog, latency }
    }
}

#[async_trait]
impl QueryEngine for RowEngine {
    async fn execute(&self, _ctx: &QueryContext, query: &str, _args: &[Value]) -> Result<QueryResult, EngineError> {
        tokio::time::sleep(self.latency).await;
        match leading_keyword(query).as_str() {
            "INSERT" | "UPDATE" | "DELETE" => Ok(QueryResult::affected(1)),
            "BEGIN" | "COMMIT" | "ROLLBACK" => Ok(QueryResult::affected(0)),
            _ => Ok(self.catalog.table_in_text(query)?.to_result()),
        }
    }

    async fn execute_with_plan(&self, _ctx: &QueryContext, _plan: PlanNode) -> Result<QueryResult, EngineError> {
        Err(EngineError::InvalidPlan("row engine executes statement text only".to_string()))
    }

    fn name(&self) -> &str {
        "row"
    }
}

/// Column-store stand-in: evaluates single-column `GROUP BY` counts, or a total count.
pub struct ColumnEngine {
    catalog: Arc<Catalog>,
    latency: Duration,
}

impl ColumnEngine {
    pub fn new(catalog: Arc<Catalog>, latency: Duration) -> Self {
        Self { catalog, latency }
    }
}

fn first_scan(node: &PlanNode) -> Option<&str> {
    if let PlanOperation::Scan { table } = &node.operation {
        return Some(table);
    }
    node.children.iter().find_map(first_scan)
}

fn group_columns(node: &PlanNode) -> Option<&[String]> {
    if let PlanOperation::Aggregate { group_by, .. } = &node.operation {
        return Some(group_by);
    }
    node.children.iter().find_map(group_columns)
}

#[async_trait]
impl QueryEngine for ColumnEngine {
    async fn execute(&self, _ctx: &QueryContext, query: &str, _args: &[Value]) -> Result<QueryResult, EngineError> {
        tokio::time::sleep(self.latency).await;
        Ok(self.catalog.table_in_text(query)?.to_result())
    }

    async fn execute_with_plan(&self, _ctx: &QueryContext, plan: PlanNode) -> Result<QueryResult, EngineError> {
        tokio::time::sleep(self.latency).await;
        let reference = first_scan(&plan).ok_or_else(|| EngineError::InvalidPlan("plan has no scan".to_string()))?;
        let table = self.catalog.table(reference)?;

        let group_by = group_columns(&plan).unwrap_or_default();
        let Some(index) = group_by.first().and_then(|column| table.column_index(column)) else {
            return Ok(QueryResult::new(vec!["count".to_string()], vec![vec![json!(table.rows.len())]]));
        };

        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for row in &table.rows {
            let key = match &row[index] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            *counts.entry(key).or_default() += 1;
        }
        let rows = counts.into_iter().map(|(key, count)| vec![json!(key), json!(count)]).collect();
        Ok(QueryResult::new(vec![group_by[0].clone(), "count".to_string()], rows))
    }

    fn name(&self) -> &str {
        "columnar"
    }
}
