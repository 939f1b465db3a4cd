//! Task status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::TransitionError;

/// Status of a persisted task.
///
/// State transitions:
/// - Pending -> Ongoing | Completed | Failed | Cancelled
/// - Ongoing -> Completed | Failed | Cancelled
/// - Completed | Failed | Cancelled -> Pending (retry path)
///
/// `Pending` is the only initial state. There is no terminal state in the
/// table itself: whether a task is "done" is up to the evaluator logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Ongoing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::Ongoing,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    /// Statuses reachable from `self` in one step.
    pub fn allowed_transitions(self) -> &'static [TaskStatus] {
        use TaskStatus::*;
        match self {
            Pending => &[Ongoing, Completed, Failed, Cancelled],
            Ongoing => &[Completed, Failed, Cancelled],
            Completed | Failed | Cancelled => &[Pending],
        }
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Validate `self -> next`, naming the rejected pair on failure.
    pub fn transition_to(self, next: TaskStatus) -> Result<TaskStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError::Illegal {
                from: self,
                to: next,
                allowed: self.allowed_transitions().to_vec(),
            })
        }
    }

    /// Pending or Ongoing: the task still expects a state change.
    pub fn is_active(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Ongoing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Ongoing => "ongoing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| TransitionError::UnknownState(s.to_string()))
    }
}
