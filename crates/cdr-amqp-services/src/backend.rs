//! AMQP CDR backend module
//!
//! Owns the configuration store and drives the load/reload/unload lifecycle:
//!
//! ```text
//! Unloaded --load--> Reloading --ok--------> Loaded
//!                        |  \--unchanged---> Loaded (snapshot kept)
//!                        \---error---------> previous state, snapshot kept
//! Loaded/Unloaded --unload--> Unloaded
//! ```
//!
//! A failed initial load leaves the backend unloaded and is meant to decline
//! the module. A failed reload never touches the active snapshot.

use async_trait::async_trait;
use cdr_amqp_core::{
    models::CdrRecord,
    traits::{CdrBackend, ConnectionManager},
    AppResult, GlobalConfig,
};
use config::Config;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::binder::ConnectionBinder;
use crate::constants::{CDR_DESCRIPTION, CDR_NAME};
use crate::publisher::Publisher;
use crate::store::{ConfigSnapshot, ConfigStore};

/// Lifecycle state of the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Unloaded,
    Loaded,
    Reloading,
}

/// Successful outcome of a (re)load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new snapshot was bound and installed
    Applied,
    /// The validated configuration equals the active one; nothing changed
    Unchanged,
}

/// Status reported for a reload: `0` applied, `1` unchanged, `-1` error
pub fn reload_status(result: &AppResult<ReloadOutcome>) -> i32 {
    match result {
        Ok(ReloadOutcome::Applied) => 0,
        Ok(ReloadOutcome::Unchanged) => 1,
        Err(_) => -1,
    }
}

/// The AMQP CDR backend
pub struct AmqpCdrBackend {
    store: Arc<ConfigStore>,
    binder: ConnectionBinder,
    publisher: Publisher,
    reload_lock: Mutex<()>,
    reloading: AtomicBool,
}

impl AmqpCdrBackend {
    pub fn new(manager: Arc<dyn ConnectionManager>) -> Self {
        let store = Arc::new(ConfigStore::new());
        Self {
            binder: ConnectionBinder::new(manager),
            publisher: Publisher::new(store.clone()),
            store,
            reload_lock: Mutex::new(()),
            reloading: AtomicBool::new(false),
        }
    }

    /// Shared handle to the configuration store
    pub fn store(&self) -> Arc<ConfigStore> {
        self.store.clone()
    }

    pub fn state(&self) -> ModuleState {
        if self.reloading.load(Ordering::Acquire) {
            ModuleState::Reloading
        } else if self.store.is_loaded() {
            ModuleState::Loaded
        } else {
            ModuleState::Unloaded
        }
    }

    /// The configuration currently in force
    pub fn active_config(&self) -> Option<GlobalConfig> {
        self.store.load().map(|snapshot| snapshot.config().clone())
    }

    /// Initial load
    ///
    /// Any failure means the backend should not be registered.
    pub async fn load(&self, raw: &Config) -> AppResult<ReloadOutcome> {
        match self.process(raw).await {
            Ok(outcome) => {
                info!("CDR AMQP logging enabled");
                Ok(outcome)
            }
            Err(e) => {
                warn!("Configuration failed to load: {}", e);
                Err(e)
            }
        }
    }

    /// Reload from a freshly read configuration tree
    ///
    /// On error the previously active snapshot stays in force.
    pub async fn reload(&self, raw: &Config) -> AppResult<ReloadOutcome> {
        let result = self.process(raw).await;
        match &result {
            Ok(ReloadOutcome::Applied) => info!("Reloaded AMQP CDR configuration"),
            Ok(ReloadOutcome::Unchanged) => info!("AMQP CDR configuration unchanged"),
            Err(e) if self.store.is_loaded() => {
                warn!("Reload rejected, keeping previous configuration: {}", e)
            }
            Err(e) => warn!("Reload failed with no active configuration: {}", e),
        }
        result
    }

    /// Drop the active snapshot and its connection reference
    pub async fn unload(&self) {
        let _guard = self.reload_lock.lock().await;
        if self.store.release().is_some() {
            info!("AMQP CDR backend unloaded");
        }
    }

    #[instrument(skip(self, raw))]
    async fn process(&self, raw: &Config) -> AppResult<ReloadOutcome> {
        let _guard = self.reload_lock.lock().await;

        self.reloading.store(true, Ordering::Release);
        let result = self.apply(raw).await;
        self.reloading.store(false, Ordering::Release);

        result
    }

    async fn apply(&self, raw: &Config) -> AppResult<ReloadOutcome> {
        let config = GlobalConfig::validate(raw).map_err(|e| {
            error!("Invalid cdr_amqp.conf: {}", e);
            e
        })?;

        if let Some(active) = self.store.load() {
            if active.config() == &config {
                if active.connection().is_connected() {
                    return Ok(ReloadOutcome::Unchanged);
                }
                warn!(
                    "AMQP connection '{}' is down, rebinding",
                    config.connection
                );
            }
        }

        let connection = self.binder.bind(&config).await?;

        info!(
            connection = %config.connection,
            queue = %config.queue,
            exchange = %config.exchange,
            "Installing AMQP CDR configuration"
        );
        // The replaced snapshot is dropped here; in-flight publishes holding
        // it keep its connection alive until they finish.
        drop(
            self.store
                .install(Arc::new(ConfigSnapshot::new(config, connection))),
        );

        Ok(ReloadOutcome::Applied)
    }
}

#[async_trait]
impl CdrBackend for AmqpCdrBackend {
    fn name(&self) -> &'static str {
        CDR_NAME
    }

    fn description(&self) -> &'static str {
        CDR_DESCRIPTION
    }

    async fn log(&self, record: &CdrRecord) -> AppResult<()> {
        self.publisher.publish(record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdr_amqp_core::AppError;

    #[test]
    fn test_reload_status_codes() {
        assert_eq!(reload_status(&Ok(ReloadOutcome::Applied)), 0);
        assert_eq!(reload_status(&Ok(ReloadOutcome::Unchanged)), 1);
        assert_eq!(
            reload_status(&Err(AppError::Validation("missing [global] section".to_string()))),
            -1
        );
        assert_eq!(reload_status(&Err(AppError::bind("c1", "refused"))), -1);
    }
}
