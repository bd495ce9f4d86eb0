//! AMQP CDR Backend host process
//!
//! Loads the backend from `cdr_amqp.conf`, resolves its broker connection
//! from `amqp.conf`, then publishes every CDR read from stdin (one JSON
//! record per line). `SIGHUP` reloads the configuration; `Ctrl-C` or
//! `SIGTERM` unloads the backend and exits. Reaching the end of stdin does
//! not stop the process.

use anyhow::Context;
use cdr_amqp_broker::{profile::AMQP_CONF_FILENAME, LapinConnectionManager};
use cdr_amqp_core::{
    config::{ConfigLoader, CONF_FILENAME},
    models::CdrRecord,
    traits::CdrBackend,
};
use cdr_amqp_services::{reload_status, AmqpCdrBackend};
use std::env;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "cdr_amqp={},cdr_amqp_core={},cdr_amqp_services={},cdr_amqp_broker={},lapin=warn",
            log_level, log_level, log_level, log_level
        ))
    });

    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}

/// Re-read the configuration file and apply it, returning the reload status
async fn reload(backend: &AmqpCdrBackend, loader: &ConfigLoader) -> i32 {
    let raw = match loader.load_raw() {
        Ok(raw) => raw,
        Err(e) => {
            error!("Failed to read {}: {}", loader.path().display(), e);
            return -1;
        }
    };

    reload_status(&backend.reload(&raw).await)
}

#[cfg(unix)]
fn spawn_reload_handler(
    backend: Arc<AmqpCdrBackend>,
    loader: ConfigLoader,
) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, reloading {}", loader.path().display());
            let status = reload(&backend, &loader).await;
            info!("Reload finished with status {}", status);
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn spawn_reload_handler(
    _backend: Arc<AmqpCdrBackend>,
    _loader: ConfigLoader,
) -> anyhow::Result<()> {
    warn!("Configuration reload on signal is only supported on unix");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Publish CDRs read from stdin until EOF
async fn feed_stdin(backend: &AmqpCdrBackend) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: CdrRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed CDR: {}", e);
                continue;
            }
        };

        if backend.log_status(&record).await != 0 {
            warn!("CDR {} was not published", record.linkedid);
        }
    }

    info!("End of CDR input");
    Ok(())
}

/// Run `input` until `shutdown` completes; the end of input does not stop the run
async fn serve<I, S>(input: I, shutdown: S) -> anyhow::Result<()>
where
    I: Future<Output = anyhow::Result<()>>,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    tokio::select! {
        result = input => {
            result?;
            info!("Waiting for shutdown signal");
            (&mut shutdown).await;
        }
        _ = &mut shutdown => {}
    }

    info!("Shutdown signal received");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting AMQP CDR backend v{}", env!("CARGO_PKG_VERSION"));

    let conf_path = env::var("CDR_AMQP_CONFIG").unwrap_or_else(|_| CONF_FILENAME.to_string());
    let amqp_path =
        env::var("AMQP_CONFIG").unwrap_or_else(|_| AMQP_CONF_FILENAME.to_string());

    let manager = Arc::new(
        LapinConnectionManager::from_file(&amqp_path)
            .with_context(|| format!("failed to load connection profiles from {}", amqp_path))?,
    );
    let loader = ConfigLoader::new(&conf_path);
    let backend = Arc::new(AmqpCdrBackend::new(manager.clone()));

    let raw = loader
        .load_raw()
        .with_context(|| format!("failed to read {}", conf_path))?;
    if let Err(e) = backend.load(&raw).await {
        error!("Module declined: {}", e);
        return Err(e).context("AMQP CDR backend failed to load");
    }

    info!(
        "Registered CDR backend {} ({})",
        backend.name(),
        backend.description()
    );

    spawn_reload_handler(backend.clone(), loader)?;

    serve(feed_stdin(&backend), shutdown_signal()).await?;

    backend.unload().await;
    manager.close_all().await;

    info!("AMQP CDR backend stopped");
    Ok(())
}
