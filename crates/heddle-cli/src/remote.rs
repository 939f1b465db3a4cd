//! Remote - シミュレートされたリモート実行環境
//!
//! 本物のビルド/テスト基盤の代わりに、数 tick ポーリングすると終わるジョブを返します。
//! Evaluator はタスクごとに「開始」「ポーリング」「キャンセル」の Action を選ぶだけで、
//! 実際の呼び出しは Action の中で行います。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use heddle_core::app::{
    Actions, JsonAccumulator, PayloadLiftingEvaluator, RegistryError, SequenceEvaluator,
    UpdateTaskAction,
};
use heddle_core::graph::TaskUpdate;
use heddle_core::{
    Action, ActionContext, EngineError, Evaluator, EvaluatorRegistry, Event, InMemoryTask,
    TaskId, TaskStatus,
};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Task types the demo knows how to run.
pub const TASK_TYPES: [&str; 3] = ["find_isolate", "run_test", "read_value"];

const DEFAULT_TICKS: u64 = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteState {
    Running,
    Succeeded(Value),
    Failed(String),
}

#[derive(Debug)]
struct RemoteJob {
    kind: String,
    remaining: u64,
    fail: bool,
}

/// In-process stand-in for a remote executor.
#[derive(Debug, Default)]
pub struct RemoteExecutor {
    next_id: AtomicU64,
    jobs: Mutex<HashMap<String, RemoteJob>>,
}

impl RemoteExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a job that finishes after `ticks` polls.
    pub async fn start(&self, kind: &str, ticks: u64, fail: bool) -> String {
        let remote_id = format!("remote-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.jobs.lock().await.insert(
            remote_id.clone(),
            RemoteJob {
                kind: kind.to_string(),
                remaining: ticks,
                fail,
            },
        );
        debug!(remote_id = %remote_id, kind, ticks, "remote job started");
        remote_id
    }

    pub async fn poll(&self, remote_id: &str) -> Result<RemoteState, EngineError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .get_mut(remote_id)
            .ok_or_else(|| EngineError::evaluator(format!("unknown remote job {remote_id}")))?;

        job.remaining = job.remaining.saturating_sub(1);
        if job.remaining > 0 {
            return Ok(RemoteState::Running);
        }
        if job.fail {
            Ok(RemoteState::Failed(format!("{} failed remotely", job.kind)))
        } else {
            Ok(RemoteState::Succeeded(json!({ "output": format!("{} ok", job.kind) })))
        }
    }
}

/// Start the remote job of a pending task and mark it ongoing.
pub struct StartRemoteJob {
    task_id: TaskId,
    kind: String,
    ticks: u64,
    fail: bool,
    executor: Arc<RemoteExecutor>,
}

#[async_trait]
impl Action<JsonAccumulator> for StartRemoteJob {
    async fn run(
        self: Box<Self>,
        ctx: &mut ActionContext<'_>,
        _accumulator: &mut JsonAccumulator,
    ) -> Result<(), EngineError> {
        // Transition first so a task that already moved on never starts a job.
        // A conflict at commit still leaves the job running; this executor
        // never reaps jobs.
        ctx.update_task(&self.task_id, TaskUpdate::status(TaskStatus::Ongoing))
            .await?;
        let remote_id = self.executor.start(&self.kind, self.ticks, self.fail).await;
        ctx.update_task(
            &self.task_id,
            TaskUpdate::payload(json!({ "remote_id": remote_id })),
        )
        .await?;
        ctx.append_tasklog(
            &self.task_id,
            "remote job started",
            Some(json!({ "remote_id": remote_id })),
        )
        .await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("start {} ({})", self.task_id, self.kind)
    }
}

/// Poll the remote job of an ongoing task once for the given tick.
pub struct PollRemoteJob {
    task_id: TaskId,
    remote_id: String,
    tick: u64,
    executor: Arc<RemoteExecutor>,
}

#[async_trait]
impl Action<JsonAccumulator> for PollRemoteJob {
    async fn run(
        self: Box<Self>,
        ctx: &mut ActionContext<'_>,
        _accumulator: &mut JsonAccumulator,
    ) -> Result<(), EngineError> {
        let mut payload = json!({ "remote_id": self.remote_id, "last_tick": self.tick });
        let update = match self.executor.poll(&self.remote_id).await? {
            RemoteState::Running => TaskUpdate::payload(payload),
            RemoteState::Succeeded(result) => {
                payload["result"] = result;
                ctx.append_tasklog(&self.task_id, "remote job succeeded", None)
                    .await?;
                TaskUpdate::status(TaskStatus::Completed).with_payload(payload)
            }
            RemoteState::Failed(reason) => {
                ctx.append_tasklog(
                    &self.task_id,
                    "remote job failed",
                    Some(json!({ "reason": reason })),
                )
                .await?;
                payload["error"] = Value::String(reason);
                TaskUpdate::status(TaskStatus::Failed).with_payload(payload)
            }
        };
        ctx.update_task(&self.task_id, update).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("poll {} at tick {}", self.task_id, self.tick)
    }
}

/// Decides the next step of one remote-backed task.
///
/// Relies on the dependencies' payloads having been lifted into the
/// accumulator earlier in the same pass.
pub struct RemoteWorkEvaluator {
    executor: Arc<RemoteExecutor>,
}

impl RemoteWorkEvaluator {
    pub fn new(executor: Arc<RemoteExecutor>) -> Self {
        Self { executor }
    }

    fn dependency_status<'a>(accumulator: &'a JsonAccumulator, dep: &TaskId) -> Option<&'a str> {
        accumulator
            .get(dep.as_str())
            .and_then(|lifted| lifted.get("status"))
            .and_then(Value::as_str)
    }

    fn on_pending(
        &self,
        task: &InMemoryTask,
        accumulator: &JsonAccumulator,
    ) -> Actions<JsonAccumulator> {
        let statuses: Vec<Option<&str>> = task
            .dependencies
            .iter()
            .map(|dep| Self::dependency_status(accumulator, dep))
            .collect();

        if statuses
            .iter()
            .any(|s| matches!(s, Some("failed") | Some("cancelled")))
        {
            info!(task_id = %task.id, "dependency did not succeed, cancelling");
            return vec![UpdateTaskAction::new(
                task.id.clone(),
                TaskUpdate::status(TaskStatus::Cancelled),
            )
            .boxed()];
        }
        if !statuses.iter().all(|s| *s == Some("completed")) {
            return Vec::new();
        }

        let ticks = task
            .payload
            .get("ticks")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TICKS);
        let fail = task
            .payload
            .get("fail")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        vec![StartRemoteJob {
            task_id: task.id.clone(),
            kind: task.task_type.to_string(),
            ticks,
            fail,
            executor: Arc::clone(&self.executor),
        }
        .boxed()]
    }

    fn on_ongoing(&self, task: &InMemoryTask, event: &Event) -> Actions<JsonAccumulator> {
        let Some(tick) = event.payload.get("tick").and_then(Value::as_u64) else {
            return Vec::new();
        };
        // one poll per tick, however many passes the tick takes
        if task.payload.get("last_tick").and_then(Value::as_u64) == Some(tick) {
            return Vec::new();
        }
        let Some(remote_id) = task.payload.get("remote_id").and_then(Value::as_str) else {
            return Vec::new();
        };
        vec![PollRemoteJob {
            task_id: task.id.clone(),
            remote_id: remote_id.to_string(),
            tick,
            executor: Arc::clone(&self.executor),
        }
        .boxed()]
    }
}

impl Evaluator<Event, JsonAccumulator> for RemoteWorkEvaluator {
    fn evaluate(
        &self,
        task: &InMemoryTask,
        event: &Event,
        accumulator: &mut JsonAccumulator,
    ) -> Result<Actions<JsonAccumulator>, EngineError> {
        Ok(match task.status {
            TaskStatus::Pending => self.on_pending(task, accumulator),
            TaskStatus::Ongoing => self.on_ongoing(task, event),
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => Vec::new(),
        })
    }
}

/// One lifting + remote-work evaluator per known task type.
pub fn evaluators(
    executor: Arc<RemoteExecutor>,
) -> Result<EvaluatorRegistry<Event, JsonAccumulator>, RegistryError> {
    let mut registry = EvaluatorRegistry::new();
    for task_type in TASK_TYPES {
        registry.register(
            task_type,
            SequenceEvaluator::new()
                .then(PayloadLiftingEvaluator::new())
                .then(RemoteWorkEvaluator::new(Arc::clone(&executor))),
        )?;
    }
    Ok(registry)
}
