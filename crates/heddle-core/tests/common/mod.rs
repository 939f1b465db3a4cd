#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use heddle_core::app::{Actions, UpdateTaskAction};
use heddle_core::graph::TaskUpdate;
use heddle_core::{
    Action, Dependency, InMemoryTask, InMemoryTaskStore, JobId, TaskGraph, TaskGraphEngine,
    TaskStatus, Vertex, evaluator_fn, Evaluator,
};
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Logs are captured per-test and only shown for failing tests.
/// Enable levels with e.g. `RUST_LOG=debug`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt().with_env_filter(filter).with_test_writer().init();
    });
}

pub struct Harness {
    pub store: Arc<InMemoryTaskStore>,
    pub engine: TaskGraphEngine,
    pub job: JobId,
}

pub async fn harness() -> Harness {
    init_tracing();
    let store = Arc::new(InMemoryTaskStore::new());
    let job = store.create_job().await.unwrap();
    let engine = TaskGraphEngine::builder(store.clone())
        .max_passes(1_000)
        .build()
        .unwrap();
    Harness { store, engine, job }
}

pub fn vertex(id: &str, vertex_type: &str) -> Vertex {
    Vertex::new(id, vertex_type, json!({}))
}

/// build <- test <- compare
pub fn build_test_compare() -> TaskGraph {
    TaskGraph::new(
        vec![
            vertex("build", "find_isolate"),
            vertex("test", "run_test"),
            vertex("compare", "read_value"),
        ],
        vec![
            Dependency::new("compare", "test"),
            Dependency::new("test", "build"),
        ],
    )
}

/// Shared call log, written from inside evaluators.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Marks every task completed on its first visit; returns nothing once a
/// task is completed. The accumulator collects the visit order of each pass.
pub fn completing_evaluator<E: 'static>(log: CallLog) -> impl Evaluator<E, Vec<String>> {
    evaluator_fn(move |task: &InMemoryTask, _event: &E, acc: &mut Vec<String>| {
        log.lock().unwrap().push(task.id.to_string());
        acc.push(task.id.to_string());
        let actions: Actions<Vec<String>> = if task.status == TaskStatus::Completed {
            Vec::new()
        } else {
            vec![UpdateTaskAction::new(task.id.clone(), TaskUpdate::status(TaskStatus::Completed)).boxed()]
        };
        Ok(actions)
    })
}
