//! AMQP CDR Backend Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the AMQP CDR backend. It includes:
//!
//! - The CDR record model with disposition and AMA flag enums
//! - The backend configuration schema and its loader
//! - Traits for the broker connection manager and the CDR backend callback
//! - Unified error handling

pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use crate::config::GlobalConfig;
pub use crate::error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
