//! EngineBuilder - エンジンの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - 設定値の矛盾は build() 時に BuildError として返す
//! - Clock / IdGenerator は省略時に本番用の実装を使う

use std::sync::Arc;

use super::config::EngineConfig;
use super::engine::TaskGraphEngine;
use super::retry::TransactionRetryPolicy;
use crate::ports::{Clock, IdGenerator, SystemClock, TaskStore, UlidGenerator};

/// EngineBuilder は TaskGraphEngine を構築
///
/// # 使用例
/// ```ignore
/// let engine = TaskGraphEngine::builder(Arc::new(InMemoryTaskStore::new()))
///     .max_passes(100)
///     .build()?;
/// ```
pub struct EngineBuilder {
    store: Arc<dyn TaskStore>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    config: EngineConfig,
}

/// BuildError はエンジン構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("max_passes must be at least 1")]
    ZeroPassLimit,

    #[error("transaction_retry.max_attempts must be at least 1")]
    ZeroRetryAttempts,

    #[error("transaction_retry.multiplier must be finite and >= 1.0, got {0}")]
    InvalidMultiplier(f64),
}

impl EngineBuilder {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            clock: None,
            ids: None,
            config: EngineConfig::default(),
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Replace the whole configuration (e.g. one loaded from a file).
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_passes(mut self, max_passes: usize) -> Self {
        self.config.max_passes = Some(max_passes);
        self
    }

    pub fn transaction_retry(mut self, policy: TransactionRetryPolicy) -> Self {
        self.config.transaction_retry = policy;
        self
    }

    pub fn build(self) -> Result<TaskGraphEngine, BuildError> {
        if self.config.max_passes == Some(0) {
            return Err(BuildError::ZeroPassLimit);
        }
        let retry = &self.config.transaction_retry;
        if retry.max_attempts == 0 {
            return Err(BuildError::ZeroRetryAttempts);
        }
        if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
            return Err(BuildError::InvalidMultiplier(retry.multiplier));
        }

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))) as Arc<dyn IdGenerator>);

        Ok(TaskGraphEngine::from_parts(
            self.store,
            clock,
            ids,
            self.config,
        ))
    }
}
