//! Unified error handling for the AMQP CDR backend
//!
//! Every failure in the publication pipeline is one of a small set of classes.
//! Each is terminal for the operation that raised it (one CDR, one reload)
//! and none is retried inside the backend.

use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Configuration Errors ====================
    /// The `global` section is missing or malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// The configuration sources could not be read or merged
    #[error("Configuration error: {0}")]
    Config(String),

    // ==================== Broker Errors ====================
    /// A connection profile could not be resolved to a live handle
    #[error("Could not get AMQP connection '{connection}': {reason}")]
    Bind { connection: String, reason: String },

    /// The broker rejected the message or the connection is unusable
    #[error("Error publishing CDR to AMQP: {0}")]
    Publish(String),

    /// Publish was attempted before any configuration was loaded
    #[error("AMQP CDR backend is not configured")]
    NotConfigured,

    // ==================== Payload Errors ====================
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Shorthand for a bind failure on `connection`
    pub fn bind(connection: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Bind {
            connection: connection.into(),
            reason: reason.into(),
        }
    }

    /// Returns a stable error code for logs and status reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Config(_) => "config_error",
            AppError::Bind { .. } => "bind_error",
            AppError::Publish(_) => "publish_error",
            AppError::NotConfigured => "not_configured",
            AppError::Serialization(_) => "serialization_error",
        }
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
