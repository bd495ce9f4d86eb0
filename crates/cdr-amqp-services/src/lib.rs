//! CDR publication pipeline
//!
//! This crate turns completed CDRs into JSON messages and publishes them to
//! an AMQP broker under a hot-reloadable configuration.
//!
//! # Architecture
//!
//! ```text
//!   reload trigger                       CDR subsystem
//!         |                                    |
//!         v                                    v
//!  AmqpCdrBackend (state machine)  --->  Publisher
//!     |          |                         |     |
//!     v          v                         v     v
//!  GlobalConfig  ConnectionBinder   ConfigStore  serializer
//!  ::validate        |                  ^
//!                    +---- install -----+
//! ```
//!
//! - `serializer` - Record-to-message mapping and JSON encoding
//! - `ConfigStore` - Lock-free holder of the active configuration snapshot
//! - `ConnectionBinder` - Resolves a configuration's connection name
//! - `Publisher` - Sends one CDR through the active snapshot
//! - `AmqpCdrBackend` - Load/reload/unload lifecycle and the CDR callback

pub mod backend;
pub mod binder;
pub mod publisher;
pub mod serializer;
pub mod store;

pub use backend::{reload_status, AmqpCdrBackend, ModuleState, ReloadOutcome};
pub use binder::ConnectionBinder;
pub use publisher::Publisher;
pub use serializer::{CdrMessage, Timestamp};
pub use store::{ConfigSnapshot, ConfigStore};

/// Backend registration constants
pub mod constants {
    /// Name the backend registers under
    pub const CDR_NAME: &str = "AMQP";

    /// Backend description
    pub const CDR_DESCRIPTION: &str = "AMQP CDR Backend";
}
