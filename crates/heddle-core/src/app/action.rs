//! Actions - 評価の副作用
//!
//! Evaluator は副作用を直接起こさず、Action を返します。
//! エンジンは Action を 1 つずつ、それぞれ独立したトランザクションの中で実行し、
//! 成功したものから順に commit します。

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{Dependency, EngineError, JobId, Task, TaskId, TaskLog, Vertex};
use crate::graph::{self, TaskUpdate};
use crate::ports::{Clock, IdGenerator, Transaction};

/// What an action can touch: the job it belongs to and its own transaction.
pub struct ActionContext<'a> {
    job_id: &'a JobId,
    tx: &'a mut dyn Transaction,
    clock: &'a dyn Clock,
    ids: &'a dyn IdGenerator,
}

impl<'a> ActionContext<'a> {
    pub fn new(
        job_id: &'a JobId,
        tx: &'a mut dyn Transaction,
        clock: &'a dyn Clock,
        ids: &'a dyn IdGenerator,
    ) -> Self {
        Self {
            job_id,
            tx,
            clock,
            ids,
        }
    }

    pub fn job_id(&self) -> &JobId {
        self.job_id
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    pub async fn update_task(
        &mut self,
        task_id: &TaskId,
        update: TaskUpdate,
    ) -> Result<Task, EngineError> {
        graph::update_task(&mut *self.tx, self.clock, self.job_id, task_id, update).await
    }

    pub async fn extend_task_graph(
        &mut self,
        vertices: &[Vertex],
        dependencies: &[Dependency],
    ) -> Result<(), EngineError> {
        graph::extend(&mut *self.tx, self.clock, self.job_id, vertices, dependencies).await
    }

    pub async fn append_tasklog(
        &mut self,
        task_id: &TaskId,
        message: &str,
        payload: Option<Value>,
    ) -> Result<TaskLog, EngineError> {
        graph::append_tasklog(
            &mut *self.tx,
            self.clock,
            self.ids,
            self.job_id,
            task_id,
            message,
            payload,
        )
        .await
    }
}

/// Deferred side effect produced by an evaluator.
///
/// `A` is the accumulator type of the evaluation that produced the action.
/// An error aborts the whole evaluation; actions already committed stay
/// committed.
#[async_trait]
pub trait Action<A: Send>: Send {
    async fn run(
        self: Box<Self>,
        ctx: &mut ActionContext<'_>,
        accumulator: &mut A,
    ) -> Result<(), EngineError>;

    /// Short label for logs.
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    fn boxed(self) -> BoxedAction<A>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

pub type BoxedAction<A> = Box<dyn Action<A>>;

/// Does nothing. Seeds the first evaluation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAction;

#[async_trait]
impl<A: Send> Action<A> for NoopAction {
    async fn run(
        self: Box<Self>,
        _ctx: &mut ActionContext<'_>,
        _accumulator: &mut A,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "noop".to_string()
    }
}

/// Change one task's status and/or payload.
#[derive(Debug, Clone)]
pub struct UpdateTaskAction {
    task_id: TaskId,
    update: TaskUpdate,
}

impl UpdateTaskAction {
    pub fn new(task_id: impl Into<TaskId>, update: TaskUpdate) -> Self {
        Self {
            task_id: task_id.into(),
            update,
        }
    }
}

#[async_trait]
impl<A: Send> Action<A> for UpdateTaskAction {
    async fn run(
        self: Box<Self>,
        ctx: &mut ActionContext<'_>,
        _accumulator: &mut A,
    ) -> Result<(), EngineError> {
        ctx.update_task(&self.task_id, self.update).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        match self.update.new_state {
            Some(state) => format!("update {} -> {}", self.task_id, state),
            None => format!("update {} payload", self.task_id),
        }
    }
}

/// Grow the graph from inside an evaluation.
#[derive(Debug, Clone, Default)]
pub struct ExtendGraphAction {
    vertices: Vec<Vertex>,
    dependencies: Vec<Dependency>,
}

impl ExtendGraphAction {
    pub fn new(vertices: Vec<Vertex>, dependencies: Vec<Dependency>) -> Self {
        Self {
            vertices,
            dependencies,
        }
    }
}

#[async_trait]
impl<A: Send> Action<A> for ExtendGraphAction {
    async fn run(
        self: Box<Self>,
        ctx: &mut ActionContext<'_>,
        _accumulator: &mut A,
    ) -> Result<(), EngineError> {
        ctx.extend_task_graph(&self.vertices, &self.dependencies)
            .await
    }

    fn describe(&self) -> String {
        format!(
            "extend +{} vertices +{} dependencies",
            self.vertices.len(),
            self.dependencies.len()
        )
    }
}

#[derive(Debug, Clone)]
pub struct AppendLogAction {
    task_id: TaskId,
    message: String,
    payload: Option<Value>,
}

impl AppendLogAction {
    pub fn new(task_id: impl Into<TaskId>, message: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            message: message.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

#[async_trait]
impl<A: Send> Action<A> for AppendLogAction {
    async fn run(
        self: Box<Self>,
        ctx: &mut ActionContext<'_>,
        _accumulator: &mut A,
    ) -> Result<(), EngineError> {
        ctx.append_tasklog(&self.task_id, &self.message, self.payload)
            .await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("log {}: {}", self.task_id, self.message)
    }
}

/// Synchronous action over the accumulator only.
///
/// Useful for tests and for evaluators that want to record something after
/// the traversal has finished.
pub struct FnAction<F> {
    label: String,
    f: F,
}

impl<F> FnAction<F> {
    pub fn new<A>(label: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(&mut A) -> Result<(), EngineError>,
    {
        Self {
            label: label.into(),
            f,
        }
    }
}

#[async_trait]
impl<A, F> Action<A> for FnAction<F>
where
    A: Send,
    F: FnOnce(&mut A) -> Result<(), EngineError> + Send,
{
    async fn run(
        self: Box<Self>,
        _ctx: &mut ActionContext<'_>,
        accumulator: &mut A,
    ) -> Result<(), EngineError> {
        (self.f)(accumulator)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
