//! CDR publisher
//!
//! Publishes one record through a configuration snapshot: serialize, encode,
//! then hand the payload to the snapshot's connection. Failures are logged
//! and returned; nothing is retried here.

use cdr_amqp_core::{
    models::CdrRecord,
    traits::PublishProperties,
    AppError, AppResult,
};
use std::sync::Arc;
use tracing::{debug, error, instrument};

use crate::serializer;
use crate::store::{ConfigSnapshot, ConfigStore};

pub struct Publisher {
    store: Arc<ConfigStore>,
    properties: PublishProperties,
}

impl Publisher {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            store,
            properties: PublishProperties::persistent_json(),
        }
    }

    /// Publish `record` through the snapshot active at call time
    ///
    /// Fails with [`AppError::NotConfigured`] if nothing was ever loaded.
    pub async fn publish(&self, record: &CdrRecord) -> AppResult<()> {
        let snapshot = self.store.load().ok_or_else(|| {
            error!("AMQP CDR backend is not configured, dropping CDR");
            AppError::NotConfigured
        })?;

        self.publish_with(&snapshot, record).await
    }

    /// Publish `record` through a specific snapshot
    #[instrument(
        skip(self, snapshot, record),
        fields(linkedid = %record.linkedid, queue = %snapshot.config().queue)
    )]
    pub async fn publish_with(
        &self,
        snapshot: &ConfigSnapshot,
        record: &CdrRecord,
    ) -> AppResult<()> {
        let config = snapshot.config();
        let body = serializer::serialize(record, config).encode()?;

        debug!(
            "Publishing {} byte CDR to exchange '{}'",
            body.len(),
            config.exchange
        );

        snapshot
            .connection()
            .publish(&config.exchange, &config.queue, &self.properties, body)
            .await
            .map_err(|e| {
                error!("Error publishing CDR to AMQP: {}", e);
                match e {
                    AppError::Publish(_) => e,
                    other => AppError::Publish(other.to_string()),
                }
            })
    }
}
