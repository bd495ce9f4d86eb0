//! Connection binder
//!
//! Resolves the connection named by a configuration to a live handle. Runs
//! only while (re)loading; a failure rejects the whole (re)load.

use cdr_amqp_core::{
    traits::{BrokerConnection, ConnectionManager},
    AppError, AppResult, GlobalConfig,
};
use std::sync::Arc;
use tracing::{debug, error, instrument};

pub struct ConnectionBinder {
    manager: Arc<dyn ConnectionManager>,
}

impl ConnectionBinder {
    pub fn new(manager: Arc<dyn ConnectionManager>) -> Self {
        Self { manager }
    }

    /// Resolve `config.connection` through the connection manager
    ///
    /// Every failure is reported as [`AppError::Bind`] carrying the
    /// connection name.
    #[instrument(skip(self, config), fields(connection = %config.connection))]
    pub async fn bind(&self, config: &GlobalConfig) -> AppResult<Arc<dyn BrokerConnection>> {
        let name = config.connection.as_str();

        if name.is_empty() {
            error!("Could not get AMQP connection: no connection configured");
            return Err(AppError::bind(name, "no connection configured"));
        }

        match self.manager.get_connection(name).await {
            Ok(connection) => {
                debug!("Bound AMQP connection {}", name);
                Ok(connection)
            }
            Err(e) => {
                error!("Could not get AMQP connection {}: {}", name, e);
                Err(match e {
                    AppError::Bind { .. } => e,
                    other => AppError::bind(name, other.to_string()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use cdr_amqp_core::traits::PublishProperties;

    struct NamedConnection(String);

    #[async_trait]
    impl BrokerConnection for NamedConnection {
        fn name(&self) -> &str {
            &self.0
        }

        async fn publish(
            &self,
            _exchange: &str,
            _routing_key: &str,
            _properties: &PublishProperties,
            _body: Bytes,
        ) -> AppResult<()> {
            Ok(())
        }
    }

    /// Knows exactly one profile; everything else is a configuration failure
    struct SingleProfile(&'static str);

    #[async_trait]
    impl ConnectionManager for SingleProfile {
        async fn get_connection(&self, name: &str) -> AppResult<Arc<dyn BrokerConnection>> {
            if name == self.0 {
                Ok(Arc::new(NamedConnection(name.to_string())))
            } else {
                Err(AppError::Config(format!("no profile {}", name)))
            }
        }
    }

    fn config(connection: &str) -> GlobalConfig {
        GlobalConfig {
            connection: connection.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_bind_known_connection() {
        let binder = ConnectionBinder::new(Arc::new(SingleProfile("c1")));
        let connection = binder.bind(&config("c1")).await.unwrap();
        assert_eq!(connection.name(), "c1");
    }

    #[tokio::test]
    async fn test_bind_unknown_connection_reports_name() {
        let binder = ConnectionBinder::new(Arc::new(SingleProfile("c1")));
        match binder.bind(&config("c2")).await {
            Err(AppError::Bind { connection, .. }) => assert_eq!(connection, "c2"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("bind should fail"),
        }
    }

    #[tokio::test]
    async fn test_bind_empty_connection_fails() {
        let binder = ConnectionBinder::new(Arc::new(SingleProfile("")));
        let err = binder.bind(&config("")).await.err().unwrap();
        assert!(matches!(err, AppError::Bind { .. }));
    }
}
