//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（永続ストア、時刻、ID 採番）へのインターフェースを提供し、
//! 実装の詳細を隠蔽します。開発用・テスト用の実装は `impls` にあります。

pub mod clock;
pub mod id_generator;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::task_store::{StoreError, TaskStore, Transaction};
