//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: OCC ベースの TaskStore
//!
//! 本番用のストア（データベース実装）は別クレートに配置する想定です。

pub mod inmem_store;

pub use self::inmem_store::{InMemoryTaskStore, InMemoryTransaction};
