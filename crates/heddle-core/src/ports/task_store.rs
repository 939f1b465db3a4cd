//! TaskStore port - タスクグラフの正本（source of truth）
//!
//! TaskStore は以下を管理します：
//! - ジョブ（JobRecord）
//! - タスク（Task: 状態・payload・依存）
//! - 監査ログ（TaskLog, append-only）
//!
//! # 設計原則
//! - 状態遷移は「同じトランザクション内で読んでから書く」（blind write しない）
//! - `begin()` は常に独立したトランザクションを開く（ambient なトランザクションは無い）
//! - 同じキーに触れる並行トランザクションは直列化される（少なくとも片方が Conflict になる）

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{JobId, JobRecord, Task, TaskId, TaskLog};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A concurrent transaction committed a write to something this one read.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// One unit of isolation. Writes are buffered until `commit`; dropping the
/// transaction without committing discards them.
///
/// Reads observe the transaction's own buffered writes.
#[async_trait]
pub trait Transaction: Send {
    async fn job_exists(&mut self, job_id: &JobId) -> Result<bool, StoreError>;

    async fn put_job(&mut self, job: JobRecord) -> Result<(), StoreError>;

    async fn get_task(&mut self, job_id: &JobId, task_id: &TaskId)
    -> Result<Option<Task>, StoreError>;

    /// Ancestor query: every task owned by `job_id`, ordered by task id.
    async fn query_tasks(&mut self, job_id: &JobId) -> Result<Vec<Task>, StoreError>;

    async fn put_tasks(&mut self, job_id: &JobId, tasks: Vec<Task>) -> Result<(), StoreError>;

    async fn append_log(
        &mut self,
        job_id: &JobId,
        task_id: &TaskId,
        log: TaskLog,
    ) -> Result<(), StoreError>;

    /// Logs of one task in append order.
    async fn query_logs(
        &mut self,
        job_id: &JobId,
        task_id: &TaskId,
    ) -> Result<Vec<TaskLog>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Open a new, independent transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;
}
