//! Backend configuration
//!
//! The configuration schema for `cdr_amqp.conf` and the loader that builds the
//! raw configuration tree with the `config` crate. The file is INI-formatted
//! and carries a single `[global]` section:
//!
//! ```ini
//! [global]
//! loguniqueid = no
//! loguserfield = no
//! connection = bunny
//! queue = asterisk_cdr
//! exchange =
//! ```

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::AppError;
use crate::AppResult;

/// Default configuration file name
pub const CONF_FILENAME: &str = "cdr_amqp.conf";

/// Name of the only configuration section
pub const GLOBAL_SECTION: &str = "global";

/// Environment variable prefix for overrides (`CDR_AMQP__GLOBAL__QUEUE=...`)
pub const ENV_PREFIX: &str = "CDR_AMQP";

/// Global backend settings
///
/// Immutable once validated. A reload always produces a new instance which
/// is compared against the active one to detect unchanged configurations.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct GlobalConfig {
    /// Name of the broker connection profile to publish through
    #[serde(default)]
    pub connection: String,

    /// Queue name, used as the routing key
    #[serde(default = "default_queue")]
    pub queue: String,

    /// Exchange to publish to
    #[serde(default)]
    pub exchange: String,

    /// Whether to add `uniqueid` to published CDRs
    #[serde(default, rename = "loguniqueid")]
    pub log_unique_id: bool,

    /// Whether to add `userfield` to published CDRs
    #[serde(default, rename = "loguserfield")]
    pub log_user_field: bool,
}

fn default_queue() -> String {
    "asterisk_cdr".to_string()
}

impl GlobalConfig {
    /// Extract and validate the `[global]` section of a raw configuration tree
    ///
    /// Unset options receive their defaults. Only presence and types are
    /// checked here; an empty `connection` is rejected when binding.
    pub fn validate(raw: &Config) -> AppResult<Self> {
        match raw.get::<GlobalConfig>(GLOBAL_SECTION) {
            Ok(global) => {
                debug!(
                    connection = %global.connection,
                    queue = %global.queue,
                    exchange = %global.exchange,
                    "Validated [global] section"
                );
                Ok(global)
            }
            Err(ConfigError::NotFound(_)) => Err(AppError::Validation(format!(
                "missing [{}] section",
                GLOBAL_SECTION
            ))),
            Err(e) => Err(AppError::Validation(format!(
                "invalid [{}] section: {}",
                GLOBAL_SECTION, e
            ))),
        }
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            connection: String::new(),
            queue: default_queue(),
            exchange: String::new(),
            log_unique_id: false,
            log_user_field: false,
        }
    }
}

/// Builds the raw configuration tree from the backend's file and environment
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Loader for the INI file at `path`, with `CDR_AMQP` environment overrides
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            env_prefix: Some(ENV_PREFIX.to_string()),
        }
    }

    /// Disable environment overrides
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Path of the configuration file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file and environment into a raw configuration tree
    ///
    /// A missing file is not an error here; it surfaces as a missing
    /// `[global]` section when the tree is validated.
    pub fn load_raw(&self) -> AppResult<Config> {
        let path = self.path.to_string_lossy();
        let mut builder =
            Config::builder().add_source(File::new(&path, FileFormat::Ini).required(false));

        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(Environment::with_prefix(prefix).separator("__"));
        }

        Ok(builder.build()?)
    }

    /// Load and validate in one step
    pub fn load(&self) -> AppResult<GlobalConfig> {
        GlobalConfig::validate(&self.load_raw()?)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(CONF_FILENAME)
    }
}
