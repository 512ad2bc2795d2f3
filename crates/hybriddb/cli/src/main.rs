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

//! HybridDB CLI
//!
//! Command-line front end for classifying, explaining and running statements
//! through the hybrid router against built-in demo engines.

mod demo;

use clap::{Parser, Subcommand};
use demo::{Catalog, ColumnEngine, RowEngine};
use hybriddb_core::cache::DiskCache;
use hybriddb_core::query::{QueryClassifier, QueryContext, QueryResult};
use hybriddb_core::{HybridConfig, HybridRuntime};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "hybriddb")]
#[command(about = "Hybrid transactional/analytical query router")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the workload class of a statement
    Classify {
        /// SQL statement
        query: String,
    },
    /// Show routing, rewrites and the execution plan of a statement
    Explain {
        /// SQL statement
        query: String,
    },
    /// Execute a statement against the demo engines
    Run {
        /// SQL statement
        query: String,
        /// Number of times to execute the statement
        #[arg(short = 'n', long, default_value_t = 1)]
        repeat: usize,
        /// Simulated engine latency in milliseconds
        #[arg(long, default_value_t = 0)]
        latency_ms: u64,
        /// Per-execution timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Show statistics of an on-disk cache directory without modifying it
    CacheStats {
        /// Cache directory
        #[arg(long)]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Classify { query } => handle_classify(&query),
        Commands::Explain { query } => handle_explain(&query).await,
        Commands::Run { query, repeat, latency_ms, timeout_ms } => handle_run(&query, repeat, Duration::from_millis(latency_ms), timeout_ms.map(Duration::from_millis)).await,
        Commands::CacheStats { dir } => handle_cache_stats(dir).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

async fn demo_runtime(latency: Duration) -> anyhow::Result<HybridRuntime> {
    let catalog = Catalog::sample();
    let runtime = HybridRuntime::new(
        HybridConfig::from_env(),
        Arc::new(RowEngine::new(catalog.clone(), latency)),
        Arc::new(ColumnEngine::new(catalog, latency)),
    )
    .await?;
    Ok(runtime)
}

fn handle_classify(query: &str) -> anyhow::Result<()> {
    println!("{}", QueryClassifier::new().classify(query));
    Ok(())
}

async fn handle_explain(query: &str) -> anyhow::Result<()> {
    let runtime = demo_runtime(Duration::ZERO).await?;
    print!("{}", runtime.router().explain_query(query)?);
    Ok(())
}

async fn handle_run(query: &str, repeat: usize, latency: Duration, timeout: Option<Duration>) -> anyhow::Result<()> {
    let runtime = demo_runtime(latency).await?;
    info!("Executing statement {} time(s)", repeat);

    let mut last = None;
    for _ in 0..repeat.max(1) {
        let ctx = match timeout {
            Some(timeout) => QueryContext::with_timeout(timeout),
            None => QueryContext::background(),
        };
        last = Some(runtime.execute_query(&ctx, query, &[]).await?);
    }
    if let Some(result) = last {
        print_result(&result);
    }

    println!();
    println!("Query cache:");
    println!("{}", serde_json::to_string_pretty(&runtime.optimizer().get_cache_stats())?);

    if let Some(stats) = runtime.monitor().get_query_statistics(query) {
        println!("Statistics:");
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    let suggestions = runtime.optimizer().get_query_suggestions();
    if let Some(suggestion) = suggestions.get(query) {
        println!("Suggestion: {}", suggestion);
    }

    runtime.shutdown().await;
    Ok(())
}

fn print_result(result: &QueryResult) {
    if result.columns.is_empty() {
        println!("{} row(s) affected", result.rows_affected);
        return;
    }
    println!("{}", result.columns.join(" | "));
    for row in &result.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| match cell {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        println!("{}", cells.join(" | "));
    }
    if !result.query_plan.is_empty() {
        println!();
        println!("Plan:");
        print!("{}", result.query_plan);
    }
}

async fn handle_cache_stats(dir: PathBuf) -> anyhow::Result<()> {
    let scan = DiskCache::scan(&dir).await?;
    println!("{}", serde_json::to_string_pretty(&scan)?);
    Ok(())
}
