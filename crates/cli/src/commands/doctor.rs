use ratedesk_core::config::{AppConfig, LoadOptions, StoreBackend};
use ratedesk_db::{connect_with_config, migrations, ping, DbPool};
use serde::Serialize;

use crate::commands::current_thread_runtime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.extend(check_store(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["store_readiness", "migration_status"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    // Skipped checks don't fail the report; only explicit failures do.
    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_store(config: &AppConfig) -> Vec<DoctorCheck> {
    if config.store.backend == StoreBackend::Memory {
        return vec![
            DoctorCheck {
                name: "store_readiness",
                status: CheckStatus::Pass,
                details: "in-memory session store (state is lost on restart)".to_string(),
            },
            DoctorCheck {
                name: "migration_status",
                status: CheckStatus::Skipped,
                details: "memory backend has no schema".to_string(),
            },
        ];
    }

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck {
                name: "store_readiness",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            }];
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        let pinged = ping(&pool).await.map_err(|error| format!("database ping failed: {error}"));
        let applied = applied_migrations(&pool).await;
        pool.close().await;
        pinged.map(|()| applied)
    });

    match result {
        Ok(applied) => {
            let known = migrations::known_migrations();
            let migration = match applied {
                Some(count) if count as usize >= known => DoctorCheck {
                    name: "migration_status",
                    status: CheckStatus::Pass,
                    details: format!("{count}/{known} migrations applied"),
                },
                Some(count) => DoctorCheck {
                    name: "migration_status",
                    status: CheckStatus::Fail,
                    details: format!("{count}/{known} migrations applied; run `ratedesk migrate`"),
                },
                None => DoctorCheck {
                    name: "migration_status",
                    status: CheckStatus::Fail,
                    details: "schema not initialized; run `ratedesk migrate`".to_string(),
                },
            };
            vec![
                DoctorCheck {
                    name: "store_readiness",
                    status: CheckStatus::Pass,
                    details: format!("connected using `{}`", config.database.url),
                },
                migration,
            ]
        }
        Err(error) => vec![
            DoctorCheck { name: "store_readiness", status: CheckStatus::Fail, details: error },
            DoctorCheck {
                name: "migration_status",
                status: CheckStatus::Skipped,
                details: "skipped because the store is unreachable".to_string(),
            },
        ],
    }
}

/// `None` when the migrations bookkeeping table does not exist yet.
async fn applied_migrations(pool: &DbPool) -> Option<i64> {
    migrations::applied_count(pool).await.ok()
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
