//! Shared application state and its startup / shutdown sequence.
//!
//! ```text
//!   AppConfig ──► AppState::bootstrap
//!                   ├── Database::connect   (schema, admin seed, flusher)
//!                   ├── LedgerService
//!                   └── BackupManager ──► RestartSignal
//!
//!   restart or termination ──► AppState::shutdown(timeout)
//!                                 └── final flush, bounded
//! ```
//!
//! The rate limiters and the restart signal outlive any one state, so a
//! restore-triggered restart keeps admission history.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use inventrack_db::{BackupManager, Database, LedgerService, RestartSignal};

use crate::config::AppConfig;
use crate::error::HostError;
use crate::rate_limit::Admission;

/// Everything a request handler needs. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub ledger: LedgerService,
    pub backup: BackupManager,
    pub admission: Arc<Admission>,
    pub restart: RestartSignal,
}

impl AppState {
    /// Opens the configured store and wires the services onto it.
    pub async fn bootstrap(
        config: &AppConfig,
        admission: Arc<Admission>,
        restart: RestartSignal,
    ) -> Result<Self, HostError> {
        let db = Database::connect(config.db_config()).await?;

        let state = AppState {
            ledger: LedgerService::new(db.clone()),
            backup: BackupManager::new(db.clone(), restart.clone())
                .restart_delay(config.restart_delay),
            db,
            admission,
            restart,
        };

        info!(
            backend = ?config.db_type,
            sealed = state.db.is_sealed(),
            "Application state ready"
        );
        Ok(state)
    }

    pub async fn is_healthy(&self) -> bool {
        self.db.health_check().await
    }

    /// Final flush and close, abandoned after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), HostError> {
        match tokio::time::timeout(timeout, self.db.shutdown()).await {
            Ok(Ok(())) => {
                info!("Storage closed");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, "Storage shutdown failed");
                Err(e.into())
            }
            Err(_) => {
                error!(timeout_ms = timeout.as_millis() as u64, "Storage shutdown timed out");
                Err(HostError::ShutdownTimeout(timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use inventrack_core::NewAsset;

    fn config(dir: &tempfile::TempDir) -> AppConfig {
        AppConfig {
            db_path: dir.path().join("inventrack.db"),
            flush_interval: None,
            restart_delay: Duration::from_millis(10),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_restore_then_rebootstrap_serves_restored_data() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let admission = Arc::new(Admission::default());
        let restart = RestartSignal::new();
        let mut restarts = restart.subscribe();

        let state = AppState::bootstrap(&config, admission.clone(), restart.clone())
            .await
            .unwrap();
        assert!(state.is_healthy().await);
        state
            .db
            .assets()
            .create(NewAsset {
                name: "Laptop".to_string(),
                category: "Elektronik".to_string(),
                sku: Some("ELE-000001".to_string()),
                quantity: 3,
                location: "Gudang A".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let snapshot = state.backup.export_snapshot().await.unwrap();

        state
            .db
            .assets()
            .create(NewAsset {
                name: "Meja".to_string(),
                category: "Furnitur".to_string(),
                sku: Some("FUR-000001".to_string()),
                quantity: 1,
                location: "Gudang B".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let outcome = state.backup.import_snapshot(&snapshot.bytes, None).await.unwrap();
        assert!(outcome.restart_required);

        tokio::time::timeout(Duration::from_secs(2), restarts.changed())
            .await
            .unwrap()
            .unwrap();
        state.shutdown(Duration::from_secs(5)).await.unwrap();

        let next = AppState::bootstrap(&config, admission, restart).await.unwrap();
        assert!(!next.db.is_sealed());
        assert!(next.db.assets().get_by_sku("ELE-000001").await.unwrap().is_some());
        assert!(next.db.assets().get_by_sku("FUR-000001").await.unwrap().is_none());
        next.shutdown(Duration::from_secs(5)).await.unwrap();
    }
}
