//! Errors - エラー型と分類
//!
//! 呼び出し側の入力ミス（Permanent）とストア側の一時的な障害（Transient / Infrastructure）を
//! `ErrorKind` で区別します。オーケストレーション層はこれを見てリトライ可否を決めます。

use thiserror::Error;

use super::ids::{JobId, TaskId};
use super::status::TaskStatus;
use crate::ports::StoreError;

/// ErrorKind は実行エラーの分類
///
/// - Transient: 一時的なエラー（リトライ推奨、例: トランザクション競合）
/// - Permanent: 恒久的なエラー（バグか入力ミス、リトライ無意味）
/// - Infrastructure: ストア実装の障害
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// Why a status change was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("unknown state: {0}")]
    UnknownState(String),

    #[error("attempting transition from \"{from}\" to \"{to}\" not in {allowed:?}")]
    Illegal {
        from: TaskStatus,
        to: TaskStatus,
        allowed: Vec<TaskStatus>,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid amendment: {0}")]
    InvalidAmendment(String),

    #[error("task with id \"{task_id}\" not found for job \"{job_id}\"")]
    TaskNotFound { job_id: JobId, task_id: TaskId },

    #[error("invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Raised by business logic (evaluator callbacks or actions).
    #[error("evaluator failed: {0}")]
    Evaluator(String),

    #[error("job {job_id} did not converge within {passes} passes")]
    PassLimitExceeded { job_id: JobId, passes: usize },
}

impl EngineError {
    pub fn evaluator(message: impl Into<String>) -> Self {
        EngineError::Evaluator(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Store(StoreError::Conflict(_)) => ErrorKind::Transient,
            EngineError::Store(StoreError::Backend(_)) => ErrorKind::Infrastructure,
            EngineError::InvalidArgument(_)
            | EngineError::InvalidAmendment(_)
            | EngineError::TaskNotFound { .. }
            | EngineError::InvalidTransition(_)
            | EngineError::Evaluator(_)
            | EngineError::PassLimitExceeded { .. } => ErrorKind::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
