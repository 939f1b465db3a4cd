//! TaskGraphEngine - グラフ操作と評価ループの入口
//!
//! # 評価ループ
//! 1. 前回の走査で集めた Action を 1 つずつ、独立したトランザクションで実行・commit
//! 2. アキュムレータをリセットし、グラフを読み直す
//! 3. 依存順に走査して Evaluator を呼び、Action を集める
//! 4. Action が無ければ収束。最後のアキュムレータを返す
//!
//! 最初のパスは no-op Action 1 つから始まります。

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use super::action::{Action, ActionContext, NoopAction};
use super::builder::EngineBuilder;
use super::config::EngineConfig;
use super::evaluator::{Actions, Evaluator};
use super::retry::with_retry;
use super::status::StatusCounts;
use crate::domain::{Dependency, EngineError, JobId, Task, TaskGraph, TaskId, TaskLog, Vertex};
use crate::graph::{self, ReconstitutedTaskGraph, TaskUpdate};
use crate::ports::{Clock, IdGenerator, TaskStore};

pub struct TaskGraphEngine {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: EngineConfig,
}

impl TaskGraphEngine {
    pub(crate) fn from_parts(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            clock,
            ids,
            config,
        }
    }

    pub fn builder(store: Arc<dyn TaskStore>) -> EngineBuilder {
        EngineBuilder::new(store)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create the initial graph of `job_id` in one transaction.
    pub async fn populate_task_graph(
        &self,
        job_id: &JobId,
        task_graph: &TaskGraph,
    ) -> Result<(), EngineError> {
        with_retry(&self.config.transaction_retry, "populate_task_graph", || async move {
            let mut tx = self.store.begin().await?;
            graph::populate(tx.as_mut(), self.clock.as_ref(), job_id, task_graph).await?;
            tx.commit().await?;
            Ok(())
        })
        .await?;
        info!(%job_id, vertices = task_graph.vertices.len(), "task graph populated");
        Ok(())
    }

    pub async fn extend_task_graph(
        &self,
        job_id: &JobId,
        vertices: &[Vertex],
        dependencies: &[Dependency],
    ) -> Result<(), EngineError> {
        with_retry(&self.config.transaction_retry, "extend_task_graph", || async move {
            let mut tx = self.store.begin().await?;
            graph::extend(tx.as_mut(), self.clock.as_ref(), job_id, vertices, dependencies).await?;
            tx.commit().await?;
            Ok(())
        })
        .await
    }

    pub async fn update_task(
        &self,
        job_id: &JobId,
        task_id: &TaskId,
        update: TaskUpdate,
    ) -> Result<Task, EngineError> {
        let update = &update;
        with_retry(&self.config.transaction_retry, "update_task", || async move {
            let mut tx = self.store.begin().await?;
            let task = graph::update_task(
                tx.as_mut(),
                self.clock.as_ref(),
                job_id,
                task_id,
                update.clone(),
            )
            .await?;
            tx.commit().await?;
            Ok(task)
        })
        .await
    }

    pub async fn append_tasklog(
        &self,
        job_id: &JobId,
        task_id: &TaskId,
        message: &str,
        payload: Option<Value>,
    ) -> Result<TaskLog, EngineError> {
        let payload = &payload;
        with_retry(&self.config.transaction_retry, "append_tasklog", || async move {
            let mut tx = self.store.begin().await?;
            let log = graph::append_tasklog(
                tx.as_mut(),
                self.clock.as_ref(),
                self.ids.as_ref(),
                job_id,
                task_id,
                message,
                payload.clone(),
            )
            .await?;
            tx.commit().await?;
            Ok(log)
        })
        .await
    }

    /// Logs of one task, oldest first.
    pub async fn task_logs(
        &self,
        job_id: &JobId,
        task_id: &TaskId,
    ) -> Result<Vec<TaskLog>, EngineError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.query_logs(job_id, task_id).await?)
    }

    pub async fn load_task_graph(
        &self,
        job_id: &JobId,
    ) -> Result<ReconstitutedTaskGraph, EngineError> {
        with_retry(&self.config.transaction_retry, "load_task_graph", || async move {
            let mut tx = self.store.begin().await?;
            graph::load_task_graph(tx.as_mut(), job_id).await
        })
        .await
    }

    pub async fn job_status(&self, job_id: &JobId) -> Result<StatusCounts, EngineError> {
        let snapshot = self.load_task_graph(job_id).await?;
        Ok(StatusCounts::from_tasks(snapshot.tasks().values()))
    }

    /// Drive `job_id` to a fixed point for one event.
    ///
    /// Returns the accumulator of the final traversal (the one that produced
    /// no actions). The first failing action or evaluator aborts the call;
    /// actions that already committed stay committed.
    pub async fn evaluate<E, A, V>(
        &self,
        job_id: &JobId,
        event: &E,
        evaluator: &V,
    ) -> Result<A, EngineError>
    where
        E: Sync,
        A: Default + Send,
        V: Evaluator<E, A> + ?Sized,
    {
        let mut accumulator = A::default();
        let mut actions: Actions<A> = vec![NoopAction.boxed()];
        let mut passes = 0;

        loop {
            self.run_actions(job_id, std::mem::take(&mut actions), &mut accumulator)
                .await?;

            accumulator = A::default();
            let snapshot = self.load_task_graph(job_id).await?;
            if snapshot.is_empty() {
                debug!(%job_id, "empty task graph, nothing to evaluate");
                return Ok(accumulator);
            }

            passes += 1;
            if let Some(limit) = self.config.max_passes
                && passes > limit
            {
                return Err(EngineError::PassLimitExceeded {
                    job_id: *job_id,
                    passes: limit,
                });
            }

            let visited = graph::post_order(&snapshot, |task| {
                let produced = evaluator.evaluate(&task.to_in_memory(), event, &mut accumulator)?;
                actions.extend(produced);
                Ok(())
            })?;
            debug!(%job_id, pass = passes, visited, actions = actions.len(), "traversal finished");

            if actions.is_empty() {
                info!(%job_id, passes, "evaluation converged");
                return Ok(accumulator);
            }
        }
    }

    async fn run_actions<A: Send>(
        &self,
        job_id: &JobId,
        actions: Actions<A>,
        accumulator: &mut A,
    ) -> Result<(), EngineError> {
        for action in actions {
            debug!(%job_id, action = %action.describe(), "running action");
            let mut tx = self.store.begin().await?;
            let mut ctx = ActionContext::new(
                job_id,
                tx.as_mut(),
                self.clock.as_ref(),
                self.ids.as_ref(),
            );
            action.run(&mut ctx, accumulator).await?;
            tx.commit().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::action::UpdateTaskAction;
    use crate::app::evaluator::evaluator_fn;
    use crate::domain::{Event, InMemoryTask, TaskStatus};
    use crate::impls::InMemoryTaskStore;
    use serde_json::json;

    async fn engine_with_job() -> (TaskGraphEngine, JobId) {
        let store = InMemoryTaskStore::new();
        let job = store.create_job().await.unwrap();
        let engine = TaskGraphEngine::builder(Arc::new(store)).build().unwrap();
        (engine, job)
    }

    fn single(id: &str) -> TaskGraph {
        TaskGraph::new(vec![Vertex::new(id, "t", json!({}))], vec![])
    }

    #[tokio::test]
    async fn evaluate_empty_graph_returns_default_accumulator() {
        let (engine, job) = engine_with_job().await;
        let calls = std::sync::atomic::AtomicUsize::new(0);

        let acc: Vec<String> = engine
            .evaluate(
                &job,
                &Event::new("poll"),
                &evaluator_fn(|_task, _event: &Event, _acc: &mut Vec<String>| {
                    calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(Vec::new())
                }),
            )
            .await
            .unwrap();

        assert!(acc.is_empty());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn evaluate_unknown_job_is_invalid_argument() {
        let (engine, _) = engine_with_job().await;
        let ghost = JobId::from(ulid::Ulid::new());

        let err = engine
            .evaluate(
                &ghost,
                &(),
                &evaluator_fn(|_task, _event: &(), _acc: &mut ()| Ok(Vec::new())),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn pass_limit_stops_runaway_evaluators() {
        let (engine, job) = engine_with_job().await;
        let engine = TaskGraphEngine::builder(engine.store.clone())
            .max_passes(3)
            .build()
            .unwrap();
        engine.populate_task_graph(&job, &single("a")).await.unwrap();

        // Keeps asking for a payload rewrite forever.
        let runaway = evaluator_fn(|task: &InMemoryTask, _event: &(), _acc: &mut ()| {
            Ok(vec![
                UpdateTaskAction::new(task.id.clone(), TaskUpdate::payload(json!({"again": true})))
                    .boxed(),
            ])
        });

        let err = engine.evaluate(&job, &(), &runaway).await.unwrap_err();
        assert!(matches!(err, EngineError::PassLimitExceeded { passes: 3, .. }));
    }

    #[tokio::test]
    async fn standalone_operations_round_trip() {
        let (engine, job) = engine_with_job().await;
        engine.populate_task_graph(&job, &single("a")).await.unwrap();

        let task = engine
            .update_task(&job, &TaskId::new("a"), TaskUpdate::status(TaskStatus::Ongoing))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Ongoing);

        engine
            .append_tasklog(&job, &TaskId::new("a"), "hello", None)
            .await
            .unwrap();
        let logs = engine.task_logs(&job, &TaskId::new("a")).await.unwrap();
        assert_eq!(logs.len(), 1);

        let status = engine.job_status(&job).await.unwrap();
        assert_eq!(status.ongoing, 1);
        assert!(!status.is_settled());
    }
}
