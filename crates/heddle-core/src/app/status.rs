//! Status - ジョブの進捗サマリ
//!
//! タスクを状態ごとに数えただけのビューです。
//! 「まだ動いているか」を `is_settled()` で判定できます。

use serde::{Deserialize, Serialize};

use crate::domain::{Task, TaskStatus};

/// Task counts per status for one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub ongoing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut counts = Self::default();
        for task in tasks {
            *counts.slot(task.status) += 1;
        }
        counts
    }

    fn slot(&mut self, status: TaskStatus) -> &mut usize {
        match status {
            TaskStatus::Pending => &mut self.pending,
            TaskStatus::Ongoing => &mut self.ongoing,
            TaskStatus::Completed => &mut self.completed,
            TaskStatus::Failed => &mut self.failed,
            TaskStatus::Cancelled => &mut self.cancelled,
        }
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::Ongoing => self.ongoing,
            TaskStatus::Completed => self.completed,
            TaskStatus::Failed => self.failed,
            TaskStatus::Cancelled => self.cancelled,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.ongoing + self.completed + self.failed + self.cancelled
    }

    /// No task is pending or ongoing.
    pub fn is_settled(&self) -> bool {
        TaskStatus::ALL
            .into_iter()
            .filter(|status| status.is_active())
            .all(|status| self.count(status) == 0)
    }
}
