mod logging;
mod remote;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use heddle_core::app::JsonAccumulator;
use heddle_core::{
    Dependency, EngineConfig, Event, InMemoryTaskStore, TaskGraph, TaskGraphEngine, Vertex,
};
use serde_json::json;
use tokio::time::{Duration, sleep};
use tracing::{debug, info};

use crate::remote::RemoteExecutor;

const TICK_INTERVAL: Duration = Duration::from_millis(50);
const MAX_TICKS: u64 = 100;

/// build <- test <- compare
fn demo_graph() -> TaskGraph {
    TaskGraph::new(
        vec![
            Vertex::new("build", "find_isolate", json!({ "ticks": 2 })),
            Vertex::new("test", "run_test", json!({ "ticks": 3 })),
            Vertex::new("compare", "read_value", json!({ "ticks": 1 })),
        ],
        vec![
            Dependency::new("test", "build"),
            Dependency::new("compare", "test"),
        ],
    )
}

fn load_config() -> Result<EngineConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    EngineConfig::from_json(&text).with_context(|| format!("parsing {path}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging()?;

    let store = Arc::new(InMemoryTaskStore::new());
    let engine = TaskGraphEngine::builder(store.clone())
        .config(load_config()?)
        .build()?;

    let job = store.create_job().await?;
    engine.populate_task_graph(&job, &demo_graph()).await?;
    info!(job_id = %job, "job populated");

    let registry = remote::evaluators(Arc::new(RemoteExecutor::new()))?;

    // (A) tick ごとに評価し、全タスクが落ち着くまで待つ
    let mut result = JsonAccumulator::new();
    let mut status = engine.job_status(&job).await?;
    for tick in 1..=MAX_TICKS {
        let event = Event::new("tick").with_payload(json!({ "tick": tick }));
        result = engine.evaluate(&job, &event, &registry).await?;
        status = engine.job_status(&job).await?;
        debug!(tick, ?status, "tick evaluated");
        if status.is_settled() {
            break;
        }
        sleep(TICK_INTERVAL).await;
    }

    // (B) 結果とタスクログを出力
    println!("{}", serde_json::to_string_pretty(&result)?);
    let snapshot = engine.load_task_graph(&job).await?;
    for task_id in snapshot.tasks().keys() {
        for log in engine.task_logs(&job, task_id).await? {
            println!("{} {task_id}: {}", log.timestamp.to_rfc3339(), log.message);
        }
    }
    println!("status: {}", serde_json::to_string(&status)?);

    if !status.is_settled() {
        bail!("job {job} did not settle within {MAX_TICKS} ticks");
    }
    Ok(())
}
