use std::sync::Arc;

use ratedesk_agent::{AgentRuntime, DialogueController};
use ratedesk_core::config::{AppConfig, ConfigError, LoadOptions, StoreBackend};
use ratedesk_core::{DeterministicRateEngine, TracingAuditSink};
use ratedesk_db::{
    connect_with_config, migrations, DbPool, InMemorySessionStore, SessionStore, SqlSessionStore,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    /// Present only for the sqlite backend.
    pub db_pool: Option<DbPool>,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        store_backend = ?config.store.backend,
        "starting application bootstrap"
    );

    let (store, db_pool): (Arc<dyn SessionStore>, Option<DbPool>) = match config.store.backend {
        StoreBackend::Memory => (Arc::new(InMemorySessionStore::default()), None),
        StoreBackend::Sqlite => {
            let pool = connect_with_config(&config.database)
                .await
                .map_err(BootstrapError::DatabaseConnect)?;
            info!(
                event_name = "system.bootstrap.database_connected",
                correlation_id = "bootstrap",
                "database connection established"
            );

            migrations::run_pending(&pool).await.map_err(BootstrapError::Migration)?;
            info!(
                event_name = "system.bootstrap.migrations_applied",
                correlation_id = "bootstrap",
                "database migrations applied"
            );
            (Arc::new(SqlSessionStore::new(pool.clone())), Some(pool))
        }
    };

    let controller =
        DialogueController::new(DeterministicRateEngine::new(config.negotiation.clone()));
    let runtime = Arc::new(AgentRuntime::new(store, controller, Arc::new(TracingAuditSink)));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        "application bootstrap complete"
    );
    Ok(Application { config, db_pool, runtime })
}

#[cfg(test)]
mod tests {
    use ratedesk_core::config::{ConfigOverrides, LoadOptions, StoreBackend};
    use ratedesk_core::{Phase, SessionId};

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn options(backend: StoreBackend, database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                store_backend: Some(backend),
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn memory_backend_boots_without_a_pool() {
        let app = bootstrap(options(StoreBackend::Memory, "sqlite::memory:"))
            .await
            .expect("memory bootstrap");

        assert!(app.db_pool.is_none());
        app.runtime.ping_store().await.expect("memory store is always ready");
    }

    #[tokio::test]
    async fn sqlite_backend_migrates_and_serves_a_turn() {
        let app = bootstrap(options(StoreBackend::Sqlite, "sqlite::memory:"))
            .await
            .expect("sqlite bootstrap");
        let pool = app.db_pool.clone().expect("pool for sqlite backend");

        let (tables,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('conversation_session', 'conversation_message')",
        )
        .fetch_one(&pool)
        .await
        .expect("count tables");
        assert_eq!(tables, 2);

        let response =
            app.runtime.handle_message("boot-1", "hello", "bootstrap-test").await.expect("turn");
        assert_eq!(response.state.phase, Phase::Intake);
        assert!(app
            .runtime
            .session(&SessionId::from("boot-1"))
            .await
            .expect("lookup")
            .is_some());

        pool.close().await;
    }

    #[tokio::test]
    async fn invalid_database_url_fails_config_validation() {
        let result = bootstrap(options(StoreBackend::Sqlite, "postgres://localhost/rates")).await;

        let error = result.err().expect("bootstrap should fail");
        assert!(matches!(error, BootstrapError::Config(_)));
        assert!(error.to_string().contains("database.url"));
    }
}
