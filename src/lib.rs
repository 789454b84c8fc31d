pub mod accounts;
pub mod api;
pub mod appointments;
pub mod attachments;
pub mod authorization;
pub mod billing;
pub mod checkups;
pub mod clinical; // Derived fields: age, BMI, blood pressure
pub mod config;
pub mod core_state;
pub mod db;
pub mod doctors;
pub mod employees;
pub mod error;
pub mod history; // Version log reads
pub mod home; // Dashboards and report totals
pub mod lab_tests;
pub mod medical_records;
pub mod models;
pub mod notifications;
pub mod patients;
pub mod prescriptions;
pub mod scheduling; // Appointment status graph
pub mod search; // Filters, visibility scoping, pagination
pub mod validation;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::accounts::bootstrap_admin;
use crate::api::{start_server, ServerError};
use crate::config::{AppConfig, ConfigError, DEFAULT_LOG_FILTER};
use crate::core_state::{CoreError, CoreState};
use crate::error::ServiceError;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Bootstrap failed: {0}")]
    Bootstrap(#[from] ServiceError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("Cannot start async runtime: {0}")]
    Runtime(std::io::Error),
}

/// Binary entry point: configure, serve until Ctrl-C, flush the audit log.
pub fn run() {
    let config = AppConfig::from_env();
    let filter = config
        .as_ref()
        .map(|c| c.log_filter.as_str())
        .unwrap_or(DEFAULT_LOG_FILTER);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    tracing::info!("MediCore starting v{}", crate::config::APP_VERSION);

    if let Err(e) = config.map_err(StartupError::from).and_then(serve_blocking) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn serve_blocking(config: AppConfig) -> Result<(), StartupError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(StartupError::Runtime)?;
    runtime.block_on(serve(config))
}

async fn serve(config: AppConfig) -> Result<(), StartupError> {
    let core = Arc::new(CoreState::open(config)?);

    let issued = {
        let conn = core.db()?;
        bootstrap_admin(&conn)?
    };
    if let Some(issued) = issued {
        tracing::warn!(
            username = %issued.account.username,
            token = %issued.token,
            "Administrator account created. Store this token now; it is not shown again"
        );
    }

    let mut server = start_server(core.clone(), core.config.bind).await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {e}");
    }
    server.shutdown();
    server.stopped().await;

    match core.flush_and_prune_audit() {
        Ok(flushed) => tracing::info!(flushed, "Audit log flushed"),
        Err(e) => tracing::warn!("Failed to flush audit log: {e}"),
    }
    Ok(())
}
