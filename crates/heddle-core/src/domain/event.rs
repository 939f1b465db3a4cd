//! Event - 評価ループに渡す外部入力
//!
//! `evaluate` 自体はイベントの型を決めません（ジェネリック）。
//! ここにあるのは、よく使う形（種別・対象タスク・任意 payload）の既製品です。

use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// A poll tick, a remote-job callback, an "initiate" request...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_task: Option<TaskId>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            target_task: None,
            payload: serde_json::Value::Null,
        }
    }

    pub fn targeting(mut self, task: impl Into<TaskId>) -> Self {
        self.target_task = Some(task.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// True when the event has no target or targets `task`.
    pub fn applies_to(&self, task: &TaskId) -> bool {
        self.target_task.as_ref().is_none_or(|target| target == task)
    }
}
