//! Graph population and extension.
//!
//! どちらも呼び出し側が開いたトランザクションの中で動きます。
//! 検証に失敗した場合は何も書き込まずにエラーを返すので、
//! トランザクションを commit しなければストアは変化しません。

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use super::dependency::{DependencyGraph, describe_cycle};
use crate::domain::{Dependency, EngineError, JobId, Task, TaskGraph, TaskId, Vertex};
use crate::ports::{Clock, Transaction};

pub(crate) async fn ensure_job(tx: &mut dyn Transaction, job_id: &JobId) -> Result<(), EngineError> {
    if tx.job_exists(job_id).await? {
        Ok(())
    } else {
        Err(EngineError::InvalidArgument(format!(
            "job {job_id} does not exist"
        )))
    }
}

/// Create one `Pending` task per vertex and record each dependency on its
/// `from` task.
///
/// Rejects duplicate vertex ids, dependencies naming unknown vertices, cycles,
/// and jobs that already own tasks. Repeated edges are collapsed.
pub async fn populate(
    tx: &mut dyn Transaction,
    clock: &dyn Clock,
    job_id: &JobId,
    graph: &TaskGraph,
) -> Result<(), EngineError> {
    ensure_job(tx, job_id).await?;

    if !tx.query_tasks(job_id).await?.is_empty() {
        return Err(EngineError::InvalidArgument(format!(
            "job {job_id} already has a task graph; use extend instead"
        )));
    }

    let now = clock.now();
    let mut tasks: BTreeMap<TaskId, Task> = BTreeMap::new();
    for vertex in &graph.vertices {
        if tasks.contains_key(&vertex.id) {
            return Err(EngineError::InvalidArgument(format!(
                "duplicate vertex id \"{}\"",
                vertex.id
            )));
        }
        tasks.insert(vertex.id.clone(), Task::from_vertex(vertex, now));
    }

    for dep in &graph.dependencies {
        if !tasks.contains_key(&dep.to) {
            return Err(EngineError::InvalidArgument(format!(
                "dependency target \"{}\" is not a vertex",
                dep.to
            )));
        }
        let Some(task) = tasks.get_mut(&dep.from) else {
            return Err(EngineError::InvalidArgument(format!(
                "dependency source \"{}\" is not a vertex",
                dep.from
            )));
        };
        task.add_dependency(dep.to.clone());
    }

    if let Some(cycle) = DependencyGraph::from_tasks(tasks.values()).detect_cycle() {
        return Err(EngineError::InvalidArgument(format!(
            "dependency cycle: {}",
            describe_cycle(&cycle)
        )));
    }

    debug!(
        %job_id,
        vertices = tasks.len(),
        dependencies = graph.dependencies.len(),
        "populating task graph"
    );
    tx.put_tasks(job_id, tasks.into_values().collect()).await?;
    Ok(())
}

/// Add new vertices and edges to an existing graph.
///
/// New vertex ids must not collide with existing tasks. An edge may start and
/// end on either a new or an existing task. Edges already present are
/// ignored. Only the new tasks and the existing tasks whose dependency list
/// grew are written.
pub async fn extend(
    tx: &mut dyn Transaction,
    clock: &dyn Clock,
    job_id: &JobId,
    vertices: &[Vertex],
    dependencies: &[Dependency],
) -> Result<(), EngineError> {
    ensure_job(tx, job_id).await?;

    if vertices.is_empty() && dependencies.is_empty() {
        return Ok(());
    }

    let now = clock.now();
    let mut existing: BTreeMap<TaskId, Task> = tx
        .query_tasks(job_id)
        .await?
        .into_iter()
        .map(|task| (task.id.clone(), task))
        .collect();

    let mut added: BTreeMap<TaskId, Task> = BTreeMap::new();
    for vertex in vertices {
        if existing.contains_key(&vertex.id) || added.contains_key(&vertex.id) {
            return Err(EngineError::InvalidAmendment(format!(
                "vertex \"{}\" already exists in the task graph",
                vertex.id
            )));
        }
        added.insert(vertex.id.clone(), Task::from_vertex(vertex, now));
    }

    let mut changed: HashSet<TaskId> = HashSet::new();
    for dep in dependencies {
        if !added.contains_key(&dep.to) && !existing.contains_key(&dep.to) {
            return Err(EngineError::InvalidAmendment(format!(
                "dependency target \"{}\" is not in the graph or the amendment",
                dep.to
            )));
        }
        if let Some(task) = added.get_mut(&dep.from) {
            task.add_dependency(dep.to.clone());
        } else if let Some(task) = existing.get_mut(&dep.from) {
            if task.add_dependency(dep.to.clone()) {
                task.updated = now;
                changed.insert(dep.from.clone());
            }
        } else {
            return Err(EngineError::InvalidAmendment(format!(
                "dependency source \"{}\" is not in the graph or the amendment",
                dep.from
            )));
        }
    }

    let combined = DependencyGraph::from_tasks(existing.values().chain(added.values()));
    if let Some(cycle) = combined.detect_cycle() {
        return Err(EngineError::InvalidAmendment(format!(
            "amendment introduces a dependency cycle: {}",
            describe_cycle(&cycle)
        )));
    }

    debug!(
        %job_id,
        added = added.len(),
        updated = changed.len(),
        "extending task graph"
    );

    let mut writes: Vec<Task> = added.into_values().collect();
    writes.extend(
        existing
            .into_values()
            .filter(|task| changed.contains(&task.id)),
    );
    tx.put_tasks(job_id, writes).await?;
    Ok(())
}
