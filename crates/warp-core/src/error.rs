//! Error types for Warp

use thiserror::Error;

/// The main error type for Warp operations
#[derive(Debug, Error)]
pub enum WarpError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Duplicate node name: {0}")]
    DuplicateNodeName(String),

    #[error("Missing required field `{field}` in {context}")]
    MissingField { context: String, field: String },

    #[error("Invalid field `{field}` in {context}: expected {expected}")]
    InvalidField {
        context: String,
        field: String,
        expected: String,
    },

    #[error("Unknown {context} type: {value}")]
    UnknownVariant { context: String, value: String },

    #[error("Invalid time dilation {0}: must be finite and greater than zero")]
    InvalidDilation(f32),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Script bridge violation: {0}")]
    Bridge(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),
}

impl WarpError {
    pub fn missing(context: impl Into<String>, field: impl Into<String>) -> Self {
        WarpError::MissingField {
            context: context.into(),
            field: field.into(),
        }
    }

    pub fn invalid(
        context: impl Into<String>,
        field: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        WarpError::InvalidField {
            context: context.into(),
            field: field.into(),
            expected: expected.into(),
        }
    }

    /// True for malformed persisted data (recoverable at import time)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            WarpError::MissingField { .. }
                | WarpError::InvalidField { .. }
                | WarpError::UnknownVariant { .. }
                | WarpError::TomlParseError(_)
        )
    }
}

/// Result type alias for Warp operations
pub type Result<T> = std::result::Result<T, WarpError>;

impl From<toml::de::Error> for WarpError {
    fn from(err: toml::de::Error) -> Self {
        WarpError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for WarpError {
    fn from(err: toml::ser::Error) -> Self {
        WarpError::TomlSerError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_message_names_field() {
        let err = WarpError::missing("sphere shape", "radius");
        let msg = err.to_string();
        assert!(msg.contains("radius"));
        assert!(msg.contains("sphere shape"));
        assert!(err.is_configuration());
    }

    #[test]
    fn bridge_errors_are_not_configuration() {
        assert!(!WarpError::Bridge("double release".into()).is_configuration());
        assert!(!WarpError::InvalidDilation(0.0).is_configuration());
    }
}
