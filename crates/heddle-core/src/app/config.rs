//! Engine configuration.
//!
//! JSON で読み込めます。省略したフィールドは既定値になります。
//!
//! ```json
//! { "max_passes": 100, "transaction_retry": { "max_attempts": 5 } }
//! ```

use serde::{Deserialize, Serialize};

use super::retry::TransactionRetryPolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on traversals per `evaluate` call. None means unbounded.
    pub max_passes: Option<usize>,

    /// Retry applied to standalone graph operations and to graph loads
    /// inside `evaluate`. Action transactions are never retried.
    pub transaction_retry: TransactionRetryPolicy,
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_passes, None);
        assert_eq!(config.transaction_retry.max_attempts, 3);
    }

    #[test]
    fn partial_retry_section_keeps_other_defaults() {
        let config = EngineConfig::from_json(
            r#"{ "max_passes": 7, "transaction_retry": { "max_attempts": 5 } }"#,
        )
        .unwrap();
        assert_eq!(config.max_passes, Some(7));
        assert_eq!(config.transaction_retry.max_attempts, 5);
        assert_eq!(config.transaction_retry.base_delay_ms, 10);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(EngineConfig::from_json("{ max_passes: ").is_err());
    }
}
