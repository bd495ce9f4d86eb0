//! Common traits for the broker seam and the CDR callback
//!
//! The backend never talks to a broker directly. It resolves named
//! connections through a [`ConnectionManager`] and publishes through the
//! returned [`BrokerConnection`]; reconnects, channel management and
//! timeouts belong to the implementation behind these traits.

use crate::models::CdrRecord;
use crate::AppResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Media type of published CDR payloads
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// AMQP delivery mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Transient,
    Persistent,
}

impl DeliveryMode {
    /// Wire value of the `delivery-mode` basic property
    pub fn as_u8(&self) -> u8 {
        match self {
            DeliveryMode::Transient => 1,
            DeliveryMode::Persistent => 2,
        }
    }
}

/// Properties and flags attached to a single publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishProperties {
    pub content_type: &'static str,
    pub delivery_mode: DeliveryMode,
    /// Return the message if it cannot be routed to a queue
    pub mandatory: bool,
    /// Return the message if no consumer can take it immediately
    pub immediate: bool,
}

impl PublishProperties {
    /// Properties used for every CDR: persistent JSON, queued even without consumers
    pub fn persistent_json() -> Self {
        Self {
            content_type: CONTENT_TYPE_JSON,
            delivery_mode: DeliveryMode::Persistent,
            mandatory: false,
            immediate: false,
        }
    }
}

/// A live, shareable broker connection handle
///
/// Handles are shared by every publish that reads the same configuration
/// snapshot, so implementations must tolerate concurrent calls.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Name of the profile this handle was resolved from
    fn name(&self) -> &str;

    /// Whether the handle can still reach its broker
    fn is_connected(&self) -> bool {
        true
    }

    /// Publish `body` to `exchange` with `routing_key`
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: &PublishProperties,
        body: Bytes,
    ) -> AppResult<()>;
}

/// Resolves connection profile names to live handles
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Get a handle for the named connection profile
    async fn get_connection(&self, name: &str) -> AppResult<Arc<dyn BrokerConnection>>;
}

/// A CDR backend as registered with the CDR subsystem
#[async_trait]
pub trait CdrBackend: Send + Sync {
    /// Backend name used at registration
    fn name(&self) -> &'static str;

    /// Human readable description
    fn description(&self) -> &'static str;

    /// Log one completed call
    async fn log(&self, record: &CdrRecord) -> AppResult<()>;

    /// Log one completed call and report the callback status (`0` or `-1`)
    async fn log_status(&self, record: &CdrRecord) -> i32 {
        match self.log(record).await {
            Ok(()) => 0,
            Err(_) => -1,
        }
    }
}
