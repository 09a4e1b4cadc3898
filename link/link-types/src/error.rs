//! Error types for link configuration.

use thiserror::Error;

/// Errors raised while parsing or validating configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// An attach-node definition string could not be used.
    #[error("invalid attach node definition '{definition}': {reason}")]
    InvalidNodeDefinition {
        /// The offending definition string.
        definition: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A configuration value is out of range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    /// Create an attach-node error with no source string.
    #[must_use]
    pub fn invalid_node(reason: impl Into<String>) -> Self {
        Self::InvalidNodeDefinition {
            definition: String::new(),
            reason: reason.into(),
        }
    }

    /// Create an invalid value error.
    #[must_use]
    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }

    /// Check if this is an attach-node definition error.
    #[must_use]
    pub fn is_node_definition(&self) -> bool {
        matches!(self, Self::InvalidNodeDefinition { .. })
    }
}
