//! # InvenTrack Server
//!
//! Process host: loads configuration, opens storage and keeps it running
//! until a termination signal, re-running startup after every restore.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Process Lifecycle                               │
//! │                                                                         │
//! │  load config ──► bootstrap ──► wait ─┬─ SIGINT/SIGTERM ─► shutdown ─► 0 │
//! │                      ▲               │                                  │
//! │                      │               └─ restart signal ─► shutdown ─┐   │
//! │                      └──────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  shutdown exceeds SHUTDOWN_TIMEOUT_SECS, or lifecycle panics ─► exit 1  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use inventrack_db::{Database, RestartSignal};
use inventrack_server::{Admission, AppConfig, AppState};

/// Storage of the running generation, for the panic path.
type CurrentDb = Arc<Mutex<Option<Database>>>;

/// Bound on the best-effort flush after a lifecycle fault.
const FAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,inventrack=debug,sqlx=warn")),
        )
        .with_target(true)
        .init();

    info!("Starting InvenTrack server...");

    let current: CurrentDb = Arc::new(Mutex::new(None));
    let lifecycle = tokio::spawn(run(current.clone()));

    match lifecycle.await {
        Ok(Ok(())) => {
            info!("Server shutdown complete");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            error!(error = ?e, "Server stopped with an error");
            ExitCode::FAILURE
        }
        Err(join_err) => {
            error!(error = %join_err, "Lifecycle task panicked");
            flush_after_fault(&current).await;
            ExitCode::FAILURE
        }
    }
}

async fn run(current: CurrentDb) -> anyhow::Result<()> {
    let config = AppConfig::load().context("invalid configuration")?;
    info!(
        backend = ?config.db_type,
        path = %config.db_path.display(),
        "Configuration loaded"
    );

    let admission = Arc::new(Admission::new(config.login_limit, config.api_limit));
    let restart = RestartSignal::new();
    let mut restarts = restart.subscribe();

    loop {
        let state = AppState::bootstrap(&config, admission.clone(), restart.clone())
            .await
            .context("startup failed")?;
        set_current(&current, Some(state.db.clone()));
        info!("InvenTrack ready");

        let restarting = tokio::select! {
            _ = shutdown_signal() => false,
            changed = restarts.changed() => changed.is_ok(),
        };

        if restarting {
            info!("Restarting after restore");
        }

        let closed = state.shutdown(config.shutdown_timeout).await;
        set_current(&current, None);
        closed.context("shutdown failed")?;

        if !restarting {
            return Ok(());
        }
    }
}

fn set_current(current: &CurrentDb, db: Option<Database>) {
    match current.lock() {
        Ok(mut slot) => *slot = db,
        Err(poisoned) => *poisoned.into_inner() = db,
    }
}

async fn flush_after_fault(current: &CurrentDb) {
    let db = match current.lock() {
        Ok(slot) => slot.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    let Some(db) = db else {
        return;
    };

    match tokio::time::timeout(FAULT_FLUSH_TIMEOUT, db.flush()).await {
        Ok(Ok(())) => info!("Emergency flush complete"),
        Ok(Err(e)) => error!(error = %e, "Emergency flush failed"),
        Err(_) => warn!("Emergency flush timed out"),
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
