//! Persisted records: jobs, tasks and task logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::graph::Vertex;
use super::ids::{JobId, TaskId, TaskLogId};
use super::status::TaskStatus;
use super::task_type::TaskType;

/// Owner of one task graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub created: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(job_id: JobId, created: DateTime<Utc>) -> Self {
        Self { job_id, created }
    }
}

/// Durable form of a vertex, owned by exactly one job.
///
/// Design:
/// - `status` and `payload` change only through the mutation API.
/// - `dependencies` only ever grows (graph extension), never shrinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub payload: serde_json::Value,
    pub dependencies: Vec<TaskId>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Task {
    /// A fresh `Pending` task with no dependencies yet.
    pub fn from_vertex(vertex: &Vertex, now: DateTime<Utc>) -> Self {
        Self {
            id: vertex.id.clone(),
            task_type: vertex.vertex_type.clone(),
            status: TaskStatus::Pending,
            payload: vertex.payload.clone(),
            dependencies: Vec::new(),
            created: now,
            updated: now,
        }
    }

    /// Append `dep` unless already present. Returns true if the list changed.
    pub fn add_dependency(&mut self, dep: TaskId) -> bool {
        if self.dependencies.contains(&dep) {
            return false;
        }
        self.dependencies.push(dep);
        true
    }

    pub fn to_in_memory(&self) -> InMemoryTask {
        InMemoryTask {
            id: self.id.clone(),
            task_type: self.task_type.clone(),
            payload: self.payload.clone(),
            status: self.status,
            dependencies: self.dependencies.clone(),
        }
    }
}

/// Detached, read-only copy of a task handed to evaluator logic.
///
/// Mutating it has no effect on the store; state changes go through actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InMemoryTask {
    pub id: TaskId,
    pub task_type: TaskType,
    pub payload: serde_json::Value,
    pub status: TaskStatus,
    pub dependencies: Vec<TaskId>,
}

/// Immutable audit entry attached to a task. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLog {
    pub id: TaskLogId,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_from_vertex_starts_pending() {
        let now = Utc::now();
        let vertex = Vertex::new("build", "find_isolate", json!({"target": "x"}));
        let task = Task::from_vertex(&vertex, now);

        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.dependencies.is_empty());
        assert_eq!(task.payload, json!({"target": "x"}));
        assert_eq!(task.created, now);
        assert_eq!(task.updated, now);
    }

    #[test]
    fn add_dependency_is_idempotent() {
        let vertex = Vertex::new("test", "run_test", json!({}));
        let mut task = Task::from_vertex(&vertex, Utc::now());

        assert!(task.add_dependency(TaskId::new("build")));
        assert!(!task.add_dependency(TaskId::new("build")));
        assert_eq!(task.dependencies, vec![TaskId::new("build")]);
    }

    #[test]
    fn in_memory_copy_is_detached() {
        let vertex = Vertex::new("test", "run_test", json!({"n": 1}));
        let task = Task::from_vertex(&vertex, Utc::now());

        let mut copy = task.to_in_memory();
        copy.payload = json!({"n": 2});
        copy.status = TaskStatus::Failed;

        assert_eq!(task.payload, json!({"n": 1}));
        assert_eq!(task.status, TaskStatus::Pending);
    }
}
