//! heddle-core
//!
//! Persistent, transactional task-graph evaluation.
//!
//! ジョブごとに依存グラフ（DAG）を永続化し、外部イベントが来るたびに
//! 依存順に走査して Evaluator を呼びます。Evaluator が返した Action は
//! 1 つずつ独立したトランザクションで実行され、Action が出なくなるまで
//! 走査を繰り返します。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task_type, status, graph, task, event, errors）
//! - **ports**: 抽象化レイヤー（TaskStore / Transaction, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryTaskStore: 楽観的並行制御つきのインメモリストア）
//! - **graph**: トランザクション内で動くグラフ操作（populate, extend, update, load, traversal）
//! - **app**: エンジン、Evaluator / Action、レジストリ、combinator、設定

pub mod app;
pub mod domain;
pub mod graph;
pub mod impls;
pub mod ports;

pub use app::{
    Action, ActionContext, EngineBuilder, EngineConfig, Evaluator, EvaluatorRegistry, StatusCounts,
    TaskGraphEngine, evaluator_fn,
};
pub use domain::{
    Dependency, EngineError, ErrorKind, Event, InMemoryTask, JobId, Task, TaskGraph, TaskId,
    TaskLog, TaskStatus, TaskType, Vertex,
};
pub use graph::{ReconstitutedTaskGraph, TaskUpdate};
pub use impls::InMemoryTaskStore;
