//! In-memory broker doubles shared by the pipeline tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use cdr_amqp_core::{
    traits::{BrokerConnection, ConnectionManager, PublishProperties},
    AppError, AppResult,
};
use config::{Config, File, FileFormat};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// One publish as seen by the broker
#[derive(Debug, Clone)]
pub struct Published {
    pub connection: String,
    pub exchange: String,
    pub routing_key: String,
    pub properties: PublishProperties,
    pub body: serde_json::Value,
}

/// Broker shared by every connection handed out by [`FakeManager`]
#[derive(Default)]
pub struct FakeBroker {
    published: Mutex<Vec<Published>>,
    failing: AtomicBool,
    down: AtomicBool,
}

impl FakeBroker {
    pub fn published(&self) -> Vec<Published> {
        self.published.lock().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Mark connections handed out so far as lost
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

pub struct FakeConnection {
    name: String,
    broker: Arc<FakeBroker>,
}

#[async_trait]
impl BrokerConnection for FakeConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        !self.broker.down.load(Ordering::SeqCst)
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: &PublishProperties,
        body: Bytes,
    ) -> AppResult<()> {
        if self.broker.failing.load(Ordering::SeqCst) {
            return Err(AppError::Publish("channel closed by broker".to_string()));
        }

        let body = serde_json::from_slice(&body)?;
        self.broker.published.lock().push(Published {
            connection: self.name.clone(),
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            properties: properties.clone(),
            body,
        });
        Ok(())
    }
}

/// Connection manager with a fixed set of resolvable profiles
pub struct FakeManager {
    pub broker: Arc<FakeBroker>,
    profiles: Mutex<HashSet<String>>,
    lookups: AtomicUsize,
}

impl FakeManager {
    pub fn new(profiles: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            broker: Arc::new(FakeBroker::default()),
            profiles: Mutex::new(profiles.iter().map(|p| p.to_string()).collect()),
            lookups: AtomicUsize::new(0),
        })
    }

    pub fn remove_profile(&self, name: &str) {
        self.profiles.lock().remove(name);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionManager for FakeManager {
    async fn get_connection(&self, name: &str) -> AppResult<Arc<dyn BrokerConnection>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if !self.profiles.lock().contains(name) {
            return Err(AppError::bind(name, "unknown connection profile"));
        }

        Ok(Arc::new(FakeConnection {
            name: name.to_string(),
            broker: self.broker.clone(),
        }))
    }
}

/// Raw configuration tree from INI text
pub fn raw_config(ini: &str) -> Config {
    Config::builder()
        .add_source(File::from_str(ini, FileFormat::Ini))
        .build()
        .expect("valid INI")
}
