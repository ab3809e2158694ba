pub mod chat;
pub mod config;
pub mod doctor;
pub mod migrate;
pub mod smoke;

use std::sync::Arc;

use ratedesk_agent::{AgentRuntime, DialogueController};
use ratedesk_core::config::{AppConfig, StoreBackend};
use ratedesk_core::{AuditSink, DeterministicRateEngine};
use ratedesk_db::{
    connect_with_config, migrations, DbPool, InMemorySessionStore, SessionStore, SqlSessionStore,
};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Error class, message and exit code for a store that could not be opened.
pub(crate) type StoreFailure = (&'static str, String, u8);

pub(crate) struct OpenedRuntime {
    pub runtime: AgentRuntime,
    pub pool: Option<DbPool>,
}

impl OpenedRuntime {
    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
        }
    }
}

/// Builds the configured session store (migrating sqlite first) and a runtime over it.
pub(crate) async fn open_runtime(
    config: &AppConfig,
    audit: Arc<dyn AuditSink>,
) -> Result<OpenedRuntime, StoreFailure> {
    let (store, pool): (Arc<dyn SessionStore>, Option<DbPool>) = match config.store.backend {
        StoreBackend::Memory => (Arc::new(InMemorySessionStore::default()), None),
        StoreBackend::Sqlite => {
            let pool = connect_with_config(&config.database)
                .await
                .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
            if let Err(error) = migrations::run_pending(&pool).await {
                pool.close().await;
                return Err(("migration", error.to_string(), 5u8));
            }
            (Arc::new(SqlSessionStore::new(pool.clone())), Some(pool))
        }
    };

    let controller =
        DialogueController::new(DeterministicRateEngine::new(config.negotiation.clone()));
    Ok(OpenedRuntime { runtime: AgentRuntime::new(store, controller, audit), pool })
}

pub(crate) fn current_thread_runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
    tokio::runtime::Builder::new_current_thread().enable_all().build()
}
