//! Error types for the diagnostics server.
//!
//! This module defines semantic error types for level resolution, modifier
//! management, and configuration, plus their mapping onto MCP protocol errors.

pub use mcpkit::McpError;
use thiserror::Error;

/// Domain-specific errors for the diagnostics server.
///
/// Named `DiagnosticsError` to avoid collision with `mcpkit::McpError`.
#[derive(Debug, Error)]
pub enum DiagnosticsError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Level ordinal outside the representable range
    #[error("Invalid message level: {value} (expected 1 through 9)")]
    InvalidLevel { value: i64 },

    /// Unknown level name
    #[error("Unknown message level: {0}")]
    UnknownLevel(String),

    /// Required input missing or empty
    #[error("Validation failed: {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// Wildcard pattern could not be compiled
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Level modifier not registered
    #[error("Level modifier not found: {0}")]
    ModifierNotFound(String),
}

impl DiagnosticsError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid level error.
    pub fn invalid_level(value: i64) -> Self {
        Self::InvalidLevel { value }
    }

    /// Create a validation error for a named input.
    pub fn validation(field: &'static str, msg: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: msg.into(),
        }
    }

    /// Create an invalid pattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: msg.into(),
        }
    }

    /// Create a modifier not found error.
    pub fn modifier_not_found(name: impl Into<String>) -> Self {
        Self::ModifierNotFound(name.into())
    }

    /// Get a user-friendly suggestion for how to fix this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some("Check your DBADIAG_* environment variables"),
            Self::InvalidLevel { .. } => Some("Use a level between 1 (Critical) and 9 (InternalComment)"),
            Self::UnknownLevel(_) => Some(
                "Use one of: Critical, Important, Output, Host, Significant, VeryVerbose, \
                 Verbose, SomewhatVerbose, System, Debug, InternalComment",
            ),
            Self::Validation { .. } => Some("Supply a non-empty value for every required input"),
            Self::InvalidPattern { .. } => Some("Patterns support '*' and '?' wildcards only"),
            Self::ModifierNotFound(_) => Some("Use list_level_modifiers to see registered names"),
        }
    }
}

/// Convert DiagnosticsError to mcpkit's McpError for protocol responses.
///
/// Tool errors should generally return `ToolOutput::error()` with a message
/// instead of using this conversion.
impl From<DiagnosticsError> for McpError {
    fn from(e: DiagnosticsError) -> Self {
        match e {
            DiagnosticsError::Config(msg) => McpError::invalid_request(msg),
            DiagnosticsError::InvalidLevel { value } => McpError::invalid_params(
                "level",
                format!("Invalid message level: {}", value),
            ),
            DiagnosticsError::UnknownLevel(name) => {
                McpError::invalid_params("level", format!("Unknown message level: {}", name))
            }
            DiagnosticsError::Validation { field, message } => {
                McpError::invalid_params(field, message)
            }
            DiagnosticsError::InvalidPattern { pattern, message } => McpError::invalid_params(
                "pattern",
                format!("Invalid pattern '{}': {}", pattern, message),
            ),
            DiagnosticsError::ModifierNotFound(name) => McpError::invalid_params(
                "name",
                format!("Level modifier not found: {}", name),
            ),
        }
    }
}
