//! Graph operations that run inside a caller-supplied transaction.
//!
//! - `population`: 初期構築（populate）と拡張（extend）
//! - `mutation`: タスク更新とタスクログ
//! - `reconstitute`: 永続化されたタスクからのグラフ再構築
//! - `traversal`: 依存順（post-order）の走査
//! - `dependency`: 終端タスクの計算と循環検出

pub mod dependency;
pub mod mutation;
pub mod population;
pub mod reconstitute;
pub mod traversal;

pub use self::dependency::DependencyGraph;
pub use self::mutation::{TaskUpdate, append_tasklog, update_task};
pub use self::population::{extend, populate};
pub use self::reconstitute::{ReconstitutedTaskGraph, load_task_graph};
pub use self::traversal::post_order;
