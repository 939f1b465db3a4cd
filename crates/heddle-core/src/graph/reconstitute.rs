//! Rebuild a job's graph from its persisted tasks.

use std::collections::BTreeMap;

use super::dependency::DependencyGraph;
use super::population::ensure_job;
use crate::domain::{EngineError, JobId, Task, TaskId};
use crate::ports::Transaction;

/// Snapshot of one job's tasks plus the tasks nothing depends on.
#[derive(Debug, Clone, Default)]
pub struct ReconstitutedTaskGraph {
    tasks: BTreeMap<TaskId, Task>,
    terminal_tasks: Vec<TaskId>,
}

impl ReconstitutedTaskGraph {
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let terminal_tasks = DependencyGraph::from_tasks(&tasks).terminal_tasks();
        let tasks = tasks
            .into_iter()
            .map(|task| (task.id.clone(), task))
            .collect();
        Self {
            tasks,
            terminal_tasks,
        }
    }

    pub fn tasks(&self) -> &BTreeMap<TaskId, Task> {
        &self.tasks
    }

    pub fn terminal_tasks(&self) -> &[TaskId] {
        &self.terminal_tasks
    }

    pub fn get(&self, task_id: &TaskId) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.tasks.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Load every task of `job_id` in one consistent read.
pub async fn load_task_graph(
    tx: &mut dyn Transaction,
    job_id: &JobId,
) -> Result<ReconstitutedTaskGraph, EngineError> {
    ensure_job(tx, job_id).await?;
    let tasks = tx.query_tasks(job_id).await?;
    Ok(ReconstitutedTaskGraph::from_tasks(tasks))
}
