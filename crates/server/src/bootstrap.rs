use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use loadline_core::config::{AppConfig, ConfigError, LoadOptions};
use loadline_core::orchestrator::CallOrchestrator;
use loadline_db::{connect_with_settings, migrations, DbPool, SqlCallStore, SqlCarrierStore, SqlLoadCatalog};
use loadline_fmcsa::{build_registry, RegistryBuildError};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<CallOrchestrator>,
    pub loads: Arc<SqlLoadCatalog>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Registry(#[from] RegistryBuildError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        registry_mode = ?config.registry.mode,
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let registry = build_registry(&config.registry)?;
    let loads = Arc::new(SqlLoadCatalog::new(db_pool.clone()));
    let orchestrator = Arc::new(CallOrchestrator::new(
        registry,
        loads.clone(),
        Arc::new(SqlCallStore::new(db_pool.clone())),
        Arc::new(SqlCarrierStore::new(db_pool.clone())),
        config.negotiation.clone(),
        config.catalog.clone(),
    ));

    Ok(Application { config, db_pool, orchestrator, loads })
}

#[cfg(test)]
mod tests {
    use loadline_core::config::{ConfigOverrides, LoadOptions, RegistryMode};
    use loadline_core::LoadPreferences;

    use crate::bootstrap::bootstrap;

    fn sandbox_options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                registry_mode: Some(RegistryMode::Sandbox),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_wires_the_call_path() {
        let app = bootstrap(sandbox_options("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with sandbox overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('calls', 'negotiation_rounds', 'loads', 'carriers')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema should exist after bootstrap");
        assert_eq!(table_count, 4, "bootstrap should create the call-path tables");

        let started = app
            .orchestrator
            .start_call("MC-123456", None)
            .await
            .expect("sandbox carrier should verify");
        let candidates = app
            .orchestrator
            .pitch_loads(&started.call_id, &LoadPreferences::default())
            .await
            .expect("empty board pitches cleanly");
        assert!(candidates.is_empty());

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_configuration() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("postgres://wrong".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("bootstrap must fail").to_string();
        assert!(message.contains("database.url"), "unexpected error: {message}");
    }
}
