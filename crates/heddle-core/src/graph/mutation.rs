//! Task mutation: status/payload updates and task logs.

use std::str::FromStr;

use serde_json::Value;
use tracing::debug;

use crate::domain::{EngineError, JobId, Task, TaskId, TaskLog, TaskStatus};
use crate::ports::{Clock, IdGenerator, Transaction};

/// Requested change to one task. At least one field must be set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub new_state: Option<TaskStatus>,
    pub payload: Option<Value>,
}

impl TaskUpdate {
    pub fn status(new_state: TaskStatus) -> Self {
        Self {
            new_state: Some(new_state),
            payload: None,
        }
    }

    pub fn payload(payload: Value) -> Self {
        Self {
            new_state: None,
            payload: Some(payload),
        }
    }

    /// Status given by name, as it arrives from serialized input.
    pub fn status_named(name: &str) -> Result<Self, EngineError> {
        Ok(Self::status(TaskStatus::from_str(name)?))
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.new_state.is_none() && self.payload.is_none()
    }
}

/// Apply `update` to one task after validating the status transition.
///
/// The payload, if given, replaces the stored payload wholesale.
pub async fn update_task(
    tx: &mut dyn Transaction,
    clock: &dyn Clock,
    job_id: &JobId,
    task_id: &TaskId,
    update: TaskUpdate,
) -> Result<Task, EngineError> {
    if update.is_empty() {
        return Err(EngineError::InvalidArgument(
            "set one or both of new_state and payload".to_string(),
        ));
    }

    let Some(mut task) = tx.get_task(job_id, task_id).await? else {
        return Err(EngineError::TaskNotFound {
            job_id: *job_id,
            task_id: task_id.clone(),
        });
    };

    if let Some(next) = update.new_state {
        let from = task.status;
        task.status = from.transition_to(next)?;
        debug!(%job_id, %task_id, %from, to = %next, "task transition");
    }
    if let Some(payload) = update.payload {
        task.payload = payload;
    }
    task.updated = clock.now();

    tx.put_tasks(job_id, vec![task.clone()]).await?;
    Ok(task)
}

/// Append an audit entry to a task. The task is not required to exist.
pub async fn append_tasklog(
    tx: &mut dyn Transaction,
    clock: &dyn Clock,
    ids: &dyn IdGenerator,
    job_id: &JobId,
    task_id: &TaskId,
    message: &str,
    payload: Option<Value>,
) -> Result<TaskLog, EngineError> {
    let log = TaskLog {
        id: ids.generate_task_log_id(),
        timestamp: clock.now(),
        message: message.to_string(),
        payload,
    };
    tx.append_log(job_id, task_id, log.clone()).await?;
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dependency, TaskGraph, TransitionError, Vertex};
    use crate::graph::population::populate;
    use crate::impls::InMemoryTaskStore;
    use crate::ports::{FixedClock, SystemClock, TaskStore, UlidGenerator};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    async fn single_task_job() -> (InMemoryTaskStore, JobId) {
        let store = InMemoryTaskStore::new();
        let job = store.create_job().await.unwrap();
        let graph = TaskGraph::new(
            vec![Vertex::new("run", "run_test", json!({"n": 1}))],
            Vec::<Dependency>::new(),
        );
        let mut tx = store.begin().await.unwrap();
        populate(tx.as_mut(), &SystemClock, &job, &graph).await.unwrap();
        tx.commit().await.unwrap();
        (store, job)
    }

    #[tokio::test]
    async fn update_status_and_payload_together() {
        let (store, job) = single_task_job().await;
        let later = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();

        let mut tx = store.begin().await.unwrap();
        let task = update_task(
            tx.as_mut(),
            &FixedClock::new(later),
            &job,
            &TaskId::new("run"),
            TaskUpdate::status(TaskStatus::Ongoing).with_payload(json!({"n": 2})),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(task.status, TaskStatus::Ongoing);
        assert_eq!(task.payload, json!({"n": 2}));
        assert_eq!(task.updated, later);
        assert!(task.created < later);
    }

    #[tokio::test]
    async fn update_requires_something_to_change() {
        let (store, job) = single_task_job().await;

        let mut tx = store.begin().await.unwrap();
        let err = update_task(
            tx.as_mut(),
            &SystemClock,
            &job,
            &TaskId::new("run"),
            TaskUpdate::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn update_missing_task_is_not_found() {
        let (store, job) = single_task_job().await;

        let mut tx = store.begin().await.unwrap();
        let err = update_task(
            tx.as_mut(),
            &SystemClock,
            &job,
            &TaskId::new("nope"),
            TaskUpdate::status(TaskStatus::Ongoing),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::TaskNotFound { .. }));
    }

    #[tokio::test]
    async fn illegal_transition_leaves_task_untouched() {
        let (store, job) = single_task_job().await;
        let run = TaskId::new("run");

        let mut tx = store.begin().await.unwrap();
        update_task(
            tx.as_mut(),
            &SystemClock,
            &job,
            &run,
            TaskUpdate::status(TaskStatus::Completed),
        )
        .await
        .unwrap();

        let err = update_task(
            tx.as_mut(),
            &SystemClock,
            &job,
            &run,
            TaskUpdate::status(TaskStatus::Ongoing).with_payload(json!({"late": true})),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition(TransitionError::Illegal {
                from: TaskStatus::Completed,
                to: TaskStatus::Ongoing,
                ..
            })
        ));
        let stored = tx.get_task(&job, &run).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(stored.payload, json!({"n": 1}));
    }

    #[tokio::test]
    async fn pending_to_pending_is_rejected() {
        let (store, job) = single_task_job().await;
        let run = TaskId::new("run");

        let mut tx = store.begin().await.unwrap();
        let err = update_task(
            tx.as_mut(),
            &SystemClock,
            &job,
            &run,
            TaskUpdate::status(TaskStatus::Pending),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition(_)));
        assert_eq!(
            tx.get_task(&job, &run).await.unwrap().unwrap().status,
            TaskStatus::Pending
        );
    }

    #[test]
    fn status_named_rejects_unknown_states() {
        let err = TaskUpdate::status_named("exploded").unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition(TransitionError::UnknownState(_))
        ));
        assert_eq!(
            TaskUpdate::status_named("ongoing").unwrap().new_state,
            Some(TaskStatus::Ongoing)
        );
    }

    #[tokio::test]
    async fn tasklogs_are_appended_without_task_check() {
        let (store, job) = single_task_job().await;
        let ids = UlidGenerator::new(SystemClock);
        let ghost = TaskId::new("not-a-task");

        let mut tx = store.begin().await.unwrap();
        append_tasklog(tx.as_mut(), &SystemClock, &ids, &job, &ghost, "first", None)
            .await
            .unwrap();
        append_tasklog(
            tx.as_mut(),
            &SystemClock,
            &ids,
            &job,
            &ghost,
            "second",
            Some(json!({"k": "v"})),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let logs = tx.query_logs(&job, &ghost).await.unwrap();
        let messages: Vec<&str> = logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert_eq!(logs[1].payload, Some(json!({"k": "v"})));
    }
}
