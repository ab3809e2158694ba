use std::env;
use std::sync::{Mutex, OnceLock};

use ratedesk_cli::commands::{config, doctor, migrate, smoke};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("RATEDESK_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_bad_env() {
    with_env(&[("RATEDESK_SERVER_PORT", "not-a-port")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn smoke_passes_with_memory_store() {
    with_env(&[], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 0, "expected successful smoke report: {}", result.output);

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "pass");
        let names = payload["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .map(|check| check["name"].as_str().unwrap_or_default().to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["config_validation", "store_readiness", "conversation", "audit_trail"]
        );
    });
}

#[test]
fn smoke_passes_with_sqlite_store() {
    with_env(
        &[("RATEDESK_STORE_BACKEND", "sqlite"), ("RATEDESK_DATABASE_URL", "sqlite::memory:")],
        || {
            let result = smoke::run();
            assert_eq!(result.exit_code, 0, "expected successful smoke report: {}", result.output);

            let payload = parse_payload(last_line(&result.output));
            assert_eq!(payload["status"], "pass");
            let conversation = &payload["checks"][2];
            assert_eq!(conversation["name"], "conversation");
            assert!(conversation["message"]
                .as_str()
                .is_some_and(|message| message.contains("reached final")));
        },
    );
}

#[test]
fn smoke_returns_failure_when_config_invalid() {
    with_env(&[("RATEDESK_STORE_BACKEND", "postgres")], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 6, "expected smoke failure code");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
    });
}

#[test]
fn doctor_json_reports_memory_store_ready() {
    with_env(&[], || {
        let payload = parse_payload(&doctor::run(true));

        assert_eq!(payload["overall_status"], "pass");
        assert_eq!(payload["checks"][1]["name"], "store_readiness");
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

#[test]
fn doctor_flags_unmigrated_sqlite_database() {
    with_env(
        &[("RATEDESK_STORE_BACKEND", "sqlite"), ("RATEDESK_DATABASE_URL", "sqlite::memory:")],
        || {
            let payload = parse_payload(&doctor::run(true));

            assert_eq!(payload["overall_status"], "fail");
            assert_eq!(payload["checks"][1]["status"], "pass");
            assert_eq!(payload["checks"][2]["name"], "migration_status");
            assert_eq!(payload["checks"][2]["status"], "fail");
        },
    );
}

#[test]
fn config_attributes_env_sources() {
    with_env(&[("RATEDESK_LOG_LEVEL", "debug")], || {
        let output = config::run();

        assert!(output.contains("- logging.level = debug (source: env (RATEDESK_LOG_LEVEL))"));
        assert!(output.contains("- store.backend = memory (source: default)"));
        assert!(output.contains("- negotiation.floor_apr = 6.45 (source: default)"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "RATEDESK_STORE_BACKEND",
        "RATEDESK_DATABASE_URL",
        "RATEDESK_DATABASE_MAX_CONNECTIONS",
        "RATEDESK_DATABASE_TIMEOUT_SECS",
        "RATEDESK_SERVER_BIND_ADDRESS",
        "RATEDESK_SERVER_PORT",
        "RATEDESK_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "RATEDESK_NEGOTIATION_BASELINE_APR",
        "RATEDESK_NEGOTIATION_INITIAL_OFFER_APR",
        "RATEDESK_NEGOTIATION_FLOOR_APR",
        "RATEDESK_NEGOTIATION_STEP_DOWN",
        "RATEDESK_LOGGING_LEVEL",
        "RATEDESK_LOGGING_FORMAT",
        "RATEDESK_LOG_LEVEL",
        "RATEDESK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
