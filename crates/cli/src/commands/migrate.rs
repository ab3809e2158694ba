use crate::commands::{current_thread_runtime, CommandResult};
use ratedesk_core::config::{AppConfig, LoadOptions};
use ratedesk_db::{connect_with_config, migrations};

/// Migrates `database.url` regardless of the selected store backend, so a database can be
/// prepared before switching to it.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let outcome = migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8));
        let applied = migrations::applied_count(&pool).await.unwrap_or_default();
        pool.close().await;
        outcome.map(|()| applied)
    });

    match result {
        Ok(applied) => CommandResult::success(
            "migrate",
            format!(
                "applied pending migrations ({applied}/{} recorded)",
                migrations::known_migrations()
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
