//! App - アプリケーション層
//!
//! ports と graph の操作を組み合わせて、エンジンの公開 API を実装します。
//!
//! # 主要コンポーネント
//! - **TaskGraphEngine**: グラフ操作と評価ループ
//! - **EngineBuilder**: エンジンの構築とワイヤリング
//! - **Evaluator / Action**: 判断ロジックと、その結果としての副作用
//! - **EvaluatorRegistry**: task_type ごとの Evaluator 振り分け
//! - **combinators**: Evaluator を組み合わせる部品

pub mod action;
pub mod builder;
pub mod combinators;
pub mod config;
pub mod engine;
pub mod evaluator;
pub mod registry;
pub mod retry;
pub mod status;

// 主要な型を再エクスポート
pub use self::action::{
    Action, ActionContext, AppendLogAction, BoxedAction, ExtendGraphAction, FnAction, NoopAction,
    UpdateTaskAction,
};
pub use self::builder::{BuildError, EngineBuilder};
pub use self::combinators::{
    DispatchByEventType, FilteringEvaluator, JsonAccumulator, PayloadLiftingEvaluator, Selector,
    SequenceEvaluator,
};
pub use self::config::EngineConfig;
pub use self::engine::TaskGraphEngine;
pub use self::evaluator::{Actions, Evaluator, evaluator_fn};
pub use self::registry::{EvaluatorRegistry, RegistryError};
pub use self::retry::TransactionRetryPolicy;
pub use self::status::StatusCounts;
