//! Cache-layer error taxonomy.
//!
//! Only store and template failures live here. Producer errors belong to the
//! caller and are returned unchanged by the remember engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store failed or did not answer within the configured timeout.
    #[error("cache store unavailable during `{operation}`: {reason}")]
    StoreUnavailable {
        operation: &'static str,
        reason: String,
    },
    /// A key template references a placeholder the caller did not supply.
    #[error("key template for `{category}` has unresolved placeholder `{{{placeholder}}}`")]
    UnresolvedKeyTemplate { category: String, placeholder: String },
    /// Tag operations were requested from a store without native tag support.
    #[error("cache store does not support native tags")]
    TagsUnsupported,
    #[error("cached value under `{key}` is not an integer")]
    NotAnInteger { key: String },
    #[error("cache payload could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalidation request must name at least one tag")]
    EmptyInvalidation,
}

impl CacheError {
    pub fn unavailable(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            operation,
            reason: reason.into(),
        }
    }

    /// Returns true for failures that the read path degrades around.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_template_message_keeps_braces() {
        let err = CacheError::UnresolvedKeyTemplate {
            category: "user_permissions".to_string(),
            placeholder: "id".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "key template for `user_permissions` has unresolved placeholder `{id}`"
        );
    }

    #[test]
    fn only_store_failures_are_unavailable() {
        assert!(CacheError::unavailable("get", "connection refused").is_unavailable());
        assert!(!CacheError::TagsUnsupported.is_unavailable());
    }
}
