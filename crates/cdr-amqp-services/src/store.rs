//! Configuration store
//!
//! Holds the active [`ConfigSnapshot`] behind an `ArcSwapOption`. Readers get
//! an `Arc` to whatever snapshot was active when they loaded it and keep it
//! for the whole publish, so an install never tears a reader's view of the
//! (queue, exchange, connection) triple. A replaced snapshot, and with it the
//! connection reference, is freed when its last reader drops it.

use arc_swap::ArcSwapOption;
use cdr_amqp_core::{traits::BrokerConnection, GlobalConfig};
use std::fmt;
use std::sync::Arc;

/// A validated configuration paired with its bound connection
pub struct ConfigSnapshot {
    config: GlobalConfig,
    connection: Arc<dyn BrokerConnection>,
}

impl ConfigSnapshot {
    pub fn new(config: GlobalConfig, connection: Arc<dyn BrokerConnection>) -> Self {
        Self { config, connection }
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn connection(&self) -> &Arc<dyn BrokerConnection> {
        &self.connection
    }
}

impl fmt::Debug for ConfigSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSnapshot")
            .field("config", &self.config)
            .field("connection", &self.connection.name())
            .finish()
    }
}

/// Atomically replaceable holder of the active snapshot
#[derive(Default)]
pub struct ConfigStore {
    active: ArcSwapOption<ConfigSnapshot>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            active: ArcSwapOption::empty(),
        }
    }

    /// The snapshot active right now, if any
    pub fn load(&self) -> Option<Arc<ConfigSnapshot>> {
        self.active.load_full()
    }

    /// Install `snapshot` and hand back the one it replaced
    pub fn install(&self, snapshot: Arc<ConfigSnapshot>) -> Option<Arc<ConfigSnapshot>> {
        self.active.swap(Some(snapshot))
    }

    /// Remove the active snapshot, leaving the store unloaded
    pub fn release(&self) -> Option<Arc<ConfigSnapshot>> {
        self.active.swap(None)
    }

    pub fn is_loaded(&self) -> bool {
        self.active.load().is_some()
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("active", &self.load())
            .finish()
    }
}
