//! Construction-time graph vocabulary: vertices and dependency edges.

use serde::{Deserialize, Serialize};

use super::ids::TaskId;
use super::task_type::TaskType;

/// Description of one task to add to a job's graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: TaskId,
    pub vertex_type: TaskType,
    pub payload: serde_json::Value,
}

impl Vertex {
    pub fn new(
        id: impl Into<TaskId>,
        vertex_type: impl Into<TaskType>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            vertex_type: vertex_type.into(),
            payload,
        }
    }
}

/// `from` requires `to` to be evaluated first (`to` is a prerequisite of `from`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub from: TaskId,
    pub to: TaskId,
}

impl Dependency {
    pub fn new(from: impl Into<TaskId>, to: impl Into<TaskId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Vertices plus edges, only used when populating or extending a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskGraph {
    pub vertices: Vec<Vertex>,
    pub dependencies: Vec<Dependency>,
}

impl TaskGraph {
    pub fn new(vertices: Vec<Vertex>, dependencies: Vec<Dependency>) -> Self {
        Self {
            vertices,
            dependencies,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.dependencies.is_empty()
    }
}
