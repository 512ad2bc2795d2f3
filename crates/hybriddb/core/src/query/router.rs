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

//! Dispatch of classified statements to the transactional or analytical engine.

use super::classifier::QueryClassifier;
use super::context::{Interrupted, QueryContext};
use super::engine::{EngineError, QueryEngine};
use super::optimizer::QueryOptimizer;
use super::planner::QueryPlanner;
use super::types::{QueryResult, QueryType, Value};
use crate::error::{HybridError, HybridResult};
use metrics::{counter, histogram};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// A routed result together with the routing decision that produced it.
#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub result: QueryResult,
    pub query_type: QueryType,
    pub engine: String,
}

pub struct QueryRouter {
    classifier: QueryClassifier,
    optimizer: QueryOptimizer,
    planner: QueryPlanner,
    transactional: Arc<dyn QueryEngine>,
    analytical: Arc<dyn QueryEngine>,
}

impl QueryRouter {
    pub fn new(transactional: Arc<dyn QueryEngine>, analytical: Arc<dyn QueryEngine>) -> Self {
        Self::with_optimizer(transactional, analytical, QueryOptimizer::new())
    }

    pub fn with_optimizer(transactional: Arc<dyn QueryEngine>, analytical: Arc<dyn QueryEngine>, optimizer: QueryOptimizer) -> Self {
        Self {
            classifier: QueryClassifier::new(),
            optimizer,
            planner: QueryPlanner::new(),
            transactional,
            analytical,
        }
    }

    pub fn classifier(&self) -> &QueryClassifier {
        &self.classifier
    }

    pub fn classify(&self, query: &str) -> QueryType {
        self.classifier.classify(query)
    }

    /// Engine that would serve a statement of `query_type`, if any.
    pub fn engine_for(&self, query_type: QueryType) -> Option<&Arc<dyn QueryEngine>> {
        match query_type {
            QueryType::Transactional => Some(&self.transactional),
            QueryType::Analytical | QueryType::Hybrid => Some(&self.analytical),
            QueryType::Unknown => None,
        }
    }

    pub async fn route_query(&self, ctx: &QueryContext, query: &str, args: &[Value]) -> HybridResult<QueryResult> {
        self.route_with_details(ctx, query, args).await.map(|outcome| outcome.result)
    }

    /// Classify `query` and execute it on the engine suited to its type.
    ///
    /// Analytical statements are optimized and planned first and the
    /// rendered plan replaces `query_plan` on the result. Hybrid statements
    /// go to the analytical engine as a whole.
    #[instrument(skip(self, ctx, args), fields(arg_count = args.len()))]
    pub async fn route_with_details(&self, ctx: &QueryContext, query: &str, args: &[Value]) -> HybridResult<RouteOutcome> {
        let query_type = self.classifier.classify(query);
        debug!(%query_type, "classified query");
        counter!("hybriddb_router_queries_total", 1, "type" => query_type.as_str());

        let started = Instant::now();
        let (engine, mut result) = match query_type {
            QueryType::Unknown => {
                warn!("rejecting query of unknown type");
                return Err(HybridError::UnknownQueryType { query: query.to_string() });
            }
            QueryType::Analytical => {
                let optimized = self.optimizer.optimize(query).map_err(|e| HybridError::optimize(query, e))?;
                let plan = self.planner.plan(&optimized).map_err(|e| HybridError::plan(query, e))?;
                let explanation = self.planner.explain_plan(&plan, 0);
                debug!(optimized = %optimized, nodes = plan.node_count(), "planned analytical query");

                let engine = &self.analytical;
                let mut result = self.guarded(ctx, engine.as_ref(), query, engine.execute_with_plan(ctx, plan)).await?;
                result.query_plan = explanation;
                (engine, result)
            }
            QueryType::Transactional => {
                let engine = &self.transactional;
                let result = self.guarded(ctx, engine.as_ref(), query, engine.execute(ctx, query, args)).await?;
                (engine, result)
            }
            QueryType::Hybrid => {
                let engine = &self.analytical;
                let result = self.guarded(ctx, engine.as_ref(), query, engine.execute(ctx, query, args)).await?;
                (engine, result)
            }
        };

        let elapsed = started.elapsed();
        if result.execution_time.is_zero() {
            result.execution_time = elapsed;
        }
        histogram!("hybriddb_router_execution_seconds", elapsed.as_secs_f64(), "engine" => engine.name().to_string());

        Ok(RouteOutcome {
            result,
            query_type,
            engine: engine.name().to_string(),
        })
    }

    async fn guarded<F>(&self, ctx: &QueryContext, engine: &dyn QueryEngine, query: &str, call: F) -> HybridResult<QueryResult>
    where
        F: Future<Output = Result<QueryResult, EngineError>>,
    {
        match ctx.guard(call).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                counter!("hybriddb_router_engine_errors_total", 1, "engine" => engine.name().to_string());
                Err(HybridError::execute(engine.name(), query, e))
            }
            Err(Interrupted::Cancelled(reason)) => Err(HybridError::Cancelled {
                engine: engine.name().to_string(),
                reason,
            }),
            Err(Interrupted::DeadlineExceeded) => Err(HybridError::DeadlineExceeded {
                engine: engine.name().to_string(),
            }),
        }
    }

    /// Describe how `query` would be routed without executing it.
    pub fn explain_query(&self, query: &str) -> HybridResult<String> {
        let query_type = self.classifier.classify(query);
        let mut output = String::new();
        output.push_str(&format!("Query type: {query_type}\n"));

        let Some(engine) = self.engine_for(query_type) else {
            output.push_str("Routing: rejected (unknown query type)\n");
            return Ok(output);
        };
        output.push_str(&format!("Routing: {} engine ({})\n", engine.name(), routing_label(query_type)));

        if query_type != QueryType::Analytical {
            output.push_str("Optimization: not applied (direct execution)\n");
            return Ok(output);
        }

        let optimized = self.optimizer.optimize(query).map_err(|e| HybridError::optimize(query, e))?;
        let plan = self.planner.plan(&optimized).map_err(|e| HybridError::plan(query, e))?;

        output.push('\n');
        output.push_str(&self.optimizer.get_optimization_explanation(query, &optimized));
        output.push_str("\nExecution plan:\n");
        output.push_str(&self.planner.explain_plan(&plan, 1));
        Ok(output)
    }
}

fn routing_label(query_type: QueryType) -> &'static str {
    match query_type {
        QueryType::Transactional => "direct execution",
        QueryType::Analytical => "optimized plan",
        QueryType::Hybrid => "whole statement, not split",
        QueryType::Unknown => "rejected",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionPhase;
    use crate::query::planner::{PlanNode, PlanOperation, PlannerError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingEngine {
        name: &'static str,
        texts: Mutex<Vec<String>>,
        plans: Mutex<Vec<PlanNode>>,
        fail: bool,
        delay: Option<Duration>,
    }

    impl RecordingEngine {
        fn named(name: &'static str) -> Arc<Self> {
            Arc::new(Self { name, ..Self::default() })
        }
    }

    #[async_trait]
    impl QueryEngine for RecordingEngine {
        async fn execute(&self, _ctx: &QueryContext, query: &str, _args: &[Value]) -> Result<QueryResult, EngineError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(EngineError::Execution("disk on fire".to_string()));
            }
            self.texts.lock().push(query.to_string());
            Ok(QueryResult::new(vec!["id".to_string()], vec![vec![json!(1)]]))
        }

        async fn execute_with_plan(&self, _ctx: &QueryContext, plan: PlanNode) -> Result<QueryResult, EngineError> {
            if self.fail {
                return Err(EngineError::InvalidPlan("unsupported".to_string()));
            }
            self.plans.lock().push(plan);
            Ok(QueryResult {
                query_plan: "engine plan".to_string(),
                ..QueryResult::new(vec!["count".to_string()], vec![vec![json!(3)]])
            })
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn router(oltp: &Arc<RecordingEngine>, olap: &Arc<RecordingEngine>) -> QueryRouter {
        QueryRouter::new(oltp.clone(), olap.clone())
    }

    #[tokio::test]
    async fn test_transactional_goes_straight_to_row_engine() {
        let oltp = RecordingEngine::named("row");
        let olap = RecordingEngine::named("columnar");
        let router = router(&oltp, &olap);

        let outcome = router.route_with_details(&QueryContext::background(), "SELECT * FROM users", &[]).await.unwrap();

        assert_eq!(outcome.query_type, QueryType::Transactional);
        assert_eq!(outcome.engine, "row");
        assert_eq!(oltp.texts.lock().as_slice(), ["SELECT * FROM users"]);
        assert!(olap.texts.lock().is_empty());
        assert!(olap.plans.lock().is_empty());
    }

    #[tokio::test]
    async fn test_analytical_is_planned_and_explained() {
        let oltp = RecordingEngine::named("row");
        let olap = RecordingEngine::named("columnar");
        let router = router(&oltp, &olap);

        let result = router
            .route_query(&QueryContext::background(), "select dept, count(1) from emp group by dept", &[])
            .await
            .unwrap();

        assert_eq!(olap.plans.lock().len(), 1);
        assert!(olap.texts.lock().is_empty());
        assert!(result.query_plan.contains("Aggregate"));
        assert!(result.query_plan.contains("Scan: emp"));
        assert!(result.query_plan.contains("COUNT(*)"));
    }

    #[tokio::test]
    async fn test_aggregating_insert_and_cte_are_planned() {
        let oltp = RecordingEngine::named("row");
        let olap = RecordingEngine::named("columnar");
        let router = router(&oltp, &olap);
        let ctx = QueryContext::background();

        router
            .route_query(&ctx, "INSERT INTO summary SELECT dept, COUNT(*) FROM emp GROUP BY dept", &[])
            .await
            .unwrap();
        router
            .route_query(&ctx, "WITH d AS (SELECT dept, COUNT(*) AS n FROM emp GROUP BY dept) SELECT MAX(n) FROM d", &[])
            .await
            .unwrap();

        let plans = olap.plans.lock();
        assert_eq!(plans.len(), 2);
        assert!(matches!(&plans[0].operation, PlanOperation::Insert { table, .. } if table == "summary"));
        assert!(matches!(plans[1].operation, PlanOperation::Project { .. }));
        assert!(oltp.texts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_hybrid_runs_whole_statement_on_analytical_engine() {
        let oltp = RecordingEngine::named("row");
        let olap = RecordingEngine::named("columnar");
        let router = router(&oltp, &olap);
        let query = "SELECT a.x FROM a JOIN b ON a.id = b.id";

        let outcome = router.route_with_details(&QueryContext::background(), query, &[json!(1)]).await.unwrap();

        assert_eq!(outcome.query_type, QueryType::Hybrid);
        assert_eq!(olap.texts.lock().as_slice(), [query]);
        assert!(oltp.texts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_is_rejected_without_engine_calls() {
        let oltp = RecordingEngine::named("row");
        let olap = RecordingEngine::named("columnar");
        let router = router(&oltp, &olap);

        let err = router.route_query(&QueryContext::background(), "VACUUM", &[]).await.unwrap_err();
        assert!(matches!(err, HybridError::UnknownQueryType { .. }));
        assert!(oltp.texts.lock().is_empty());
        assert!(olap.texts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_optimizer_failure_reports_phase() {
        let oltp = RecordingEngine::named("row");
        let olap = RecordingEngine::named("columnar");
        let router = router(&oltp, &olap);

        let err = router
            .route_query(&QueryContext::background(), "SELECT COUNT(* FROM t GROUP BY a", &[])
            .await
            .unwrap_err();
        assert_eq!(err.phase(), Some(ExecutionPhase::Optimize));
        assert!(olap.plans.lock().is_empty());

        let original = "select  count(1)";
        let err = router.route_query(&QueryContext::background(), original, &[]).await.unwrap_err();
        assert_eq!(err.phase(), Some(ExecutionPhase::Plan));
        assert!(matches!(&err, HybridError::Plan { query, source: PlannerError::MissingFrom, .. } if query == original));
        assert!(olap.plans.lock().is_empty());
    }

    #[tokio::test]
    async fn test_engine_failure_carries_submitted_text() {
        let oltp = RecordingEngine::named("row");
        let olap = Arc::new(RecordingEngine {
            name: "columnar",
            fail: true,
            ..RecordingEngine::default()
        });
        let router = router(&oltp, &olap);

        let original = "select dept,  count(1) from emp group by dept";
        let err = router.route_query(&QueryContext::background(), original, &[]).await.unwrap_err();
        assert!(matches!(&err, HybridError::Engine { query, .. } if query == original));
    }

    #[tokio::test]
    async fn test_engine_failure_names_engine() {
        let oltp = Arc::new(RecordingEngine {
            name: "row",
            fail: true,
            ..RecordingEngine::default()
        });
        let olap = RecordingEngine::named("columnar");
        let router = router(&oltp, &olap);

        let err = router.route_query(&QueryContext::background(), "DELETE FROM t", &[]).await.unwrap_err();
        assert_eq!(err.phase(), Some(ExecutionPhase::Execute));
        assert!(err.to_string().contains("row"));
    }

    #[tokio::test]
    async fn test_deadline_interrupts_engine_call() {
        let oltp = Arc::new(RecordingEngine {
            name: "row",
            delay: Some(Duration::from_secs(5)),
            ..RecordingEngine::default()
        });
        let olap = RecordingEngine::named("columnar");
        let router = router(&oltp, &olap);

        let ctx = QueryContext::with_timeout(Duration::from_millis(20));
        let err = router.route_query(&ctx, "SELECT * FROM t", &[]).await.unwrap_err();
        assert!(matches!(err, HybridError::DeadlineExceeded { ref engine } if engine == "row"));
    }

    #[test]
    fn test_explain_query_per_type() {
        let oltp = RecordingEngine::named("row");
        let olap = RecordingEngine::named("columnar");
        let router = router(&oltp, &olap);

        let analytical = router.explain_query("select sum(x) from t where 1=1").unwrap();
        assert!(analytical.contains("Query type: analytical"));
        assert!(analytical.contains("Execution plan:"));
        assert!(analytical.contains("Applied optimizations:"));

        let transactional = router.explain_query("SELECT * FROM t WHERE id = 1").unwrap();
        assert!(transactional.contains("Routing: row engine"));
        assert!(transactional.contains("not applied"));

        let unknown = router.explain_query("VACUUM").unwrap();
        assert!(unknown.contains("rejected"));

        assert!(router.explain_query("SELECT SUM(x FROM t").is_err());
    }
}
