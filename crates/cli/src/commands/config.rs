use std::env;
use std::fs;
use std::path::Path;

use ratedesk_core::config::{resolve_config_path, AppConfig, LoadOptions, LogFormat, StoreBackend};
use toml::Value;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = config_file_path.as_deref().and_then(load_config_file_doc);

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let terms = &config.negotiation;
    vec![
        Field {
            key: "store.backend",
            value: backend_name(config.store.backend).to_string(),
            env_keys: &["RATEDESK_STORE_BACKEND"],
        },
        Field {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["RATEDESK_DATABASE_URL"],
        },
        Field {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["RATEDESK_DATABASE_MAX_CONNECTIONS"],
        },
        Field {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["RATEDESK_DATABASE_TIMEOUT_SECS"],
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["RATEDESK_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["RATEDESK_SERVER_PORT"],
        },
        Field {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["RATEDESK_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key: "negotiation.baseline_apr",
            value: terms.baseline_apr.to_string(),
            env_keys: &["RATEDESK_NEGOTIATION_BASELINE_APR"],
        },
        Field {
            key: "negotiation.initial_offer_apr",
            value: terms.initial_offer_apr.to_string(),
            env_keys: &["RATEDESK_NEGOTIATION_INITIAL_OFFER_APR"],
        },
        Field {
            key: "negotiation.floor_apr",
            value: terms.floor_apr.to_string(),
            env_keys: &["RATEDESK_NEGOTIATION_FLOOR_APR"],
        },
        Field {
            key: "negotiation.step_down",
            value: terms.step_down.to_string(),
            env_keys: &["RATEDESK_NEGOTIATION_STEP_DOWN"],
        },
        Field {
            key: "negotiation.asset_threshold",
            value: terms.asset_threshold.to_string(),
            env_keys: &[],
        },
        Field {
            key: "negotiation.asset_adjustment",
            value: terms.asset_adjustment.to_string(),
            env_keys: &[],
        },
        Field {
            key: "negotiation.first_time_buyer_adjustment",
            value: terms.first_time_buyer_adjustment.to_string(),
            env_keys: &[],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["RATEDESK_LOGGING_LEVEL", "RATEDESK_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format_name(config.logging.format).to_string(),
            env_keys: &["RATEDESK_LOGGING_FORMAT", "RATEDESK_LOG_FORMAT"],
        },
    ]
}

fn backend_name(backend: StoreBackend) -> &'static str {
    match backend {
        StoreBackend::Memory => "memory",
        StoreBackend::Sqlite => "sqlite",
    }
}

fn format_name(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    }
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use toml::Value;

    use super::{contains_path, field_source};

    #[test]
    fn nested_keys_are_found_in_file_doc() {
        let doc: Value = "[negotiation]\nfloor_apr = \"6.40\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "negotiation.floor_apr"));
        assert!(!contains_path(&doc, "negotiation.step_down"));
        assert!(!contains_path(&doc, "server.port"));
    }

    #[test]
    fn file_attribution_names_the_file() {
        let doc: Value = "[server]\nport = 9000\n".parse().expect("toml");

        let source = field_source(
            "server.port",
            &["RATEDESK_TEST_UNSET_PORT_KEY"],
            Some(&doc),
            Some(Path::new("config/ratedesk.toml")),
        );
        assert_eq!(source, "file (config/ratedesk.toml)");

        let fallback = field_source("server.bind_address", &[], Some(&doc), None);
        assert_eq!(fallback, "default");
    }
}
