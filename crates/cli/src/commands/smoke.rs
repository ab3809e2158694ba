use std::sync::Arc;
use std::time::Instant;

use crate::commands::{current_thread_runtime, open_runtime, CommandResult, OpenedRuntime};
use ratedesk_core::config::{AppConfig, LoadOptions};
use ratedesk_core::{InMemoryAuditSink, Phase};
use serde::Serialize;

/// Drives a fresh session from intake to `final`.
const SCRIPT: &[&str] = &[
    "My salary is $75,000, I have $50,000 in assets, I am a first-time buyer, and I have 1 car.",
    "yes",
    "yes",
    "what is my rate?",
    "negotiate",
    "accept",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config = match timed_check(|| AppConfig::load(LoadOptions::default())) {
        Ok((elapsed_ms, config)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Pass,
                elapsed_ms,
                message: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err((elapsed_ms, error)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: error.to_string(),
            });
            checks.push(skipped("store_readiness"));
            checks.push(skipped("conversation"));
            checks.push(skipped("audit_trail"));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck {
                name: "store_readiness",
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("failed to initialize async runtime: {error}"),
            });
            checks.push(skipped("conversation"));
            checks.push(skipped("audit_trail"));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let audit = InMemoryAuditSink::default();
    let store_started = Instant::now();
    let opened = runtime.block_on(async {
        let opened = open_runtime(&config, Arc::new(audit.clone())).await.map_err(|(_, m, _)| m)?;
        match opened.runtime.ping_store().await {
            Ok(()) => Ok::<_, String>(opened),
            Err(error) => {
                opened.close().await;
                Err(error.to_string())
            }
        }
    });

    let opened: OpenedRuntime = match opened {
        Ok(opened) => {
            checks.push(SmokeCheck {
                name: "store_readiness",
                status: SmokeStatus::Pass,
                elapsed_ms: elapsed_since(store_started),
                message: format!("{:?} session store ready", config.store.backend).to_lowercase(),
            });
            opened
        }
        Err(message) => {
            checks.push(SmokeCheck {
                name: "store_readiness",
                status: SmokeStatus::Fail,
                elapsed_ms: elapsed_since(store_started),
                message,
            });
            checks.push(skipped("conversation"));
            checks.push(skipped("audit_trail"));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let conversation_started = Instant::now();
    let session_id = format!("smoke-{}", uuid::Uuid::new_v4());
    let conversation = runtime.block_on(async {
        let mut last = None;
        for message in SCRIPT {
            let response = opened
                .runtime
                .handle_message(&session_id, message, "smoke")
                .await
                .map_err(|error| format!("turn `{message}` failed: {error}"))?;
            last = Some(response.state);
        }
        Ok::<_, String>(last)
    });
    runtime.block_on(opened.close());

    let conversation_check = match conversation {
        Ok(Some(state)) if state.phase == Phase::Final && state.rate.accepted => SmokeCheck {
            name: "conversation",
            status: SmokeStatus::Pass,
            elapsed_ms: elapsed_since(conversation_started),
            message: format!(
                "session reached final at {}% APR after {} messages",
                state.rate.offered_apr.map(|apr| apr.normalize().to_string()).unwrap_or_default(),
                state.history.len()
            ),
        },
        Ok(Some(state)) => SmokeCheck {
            name: "conversation",
            status: SmokeStatus::Fail,
            elapsed_ms: elapsed_since(conversation_started),
            message: format!("scripted conversation stopped in phase `{}`", state.phase),
        },
        Ok(None) => SmokeCheck {
            name: "conversation",
            status: SmokeStatus::Fail,
            elapsed_ms: elapsed_since(conversation_started),
            message: "scripted conversation produced no turns".to_string(),
        },
        Err(message) => SmokeCheck {
            name: "conversation",
            status: SmokeStatus::Fail,
            elapsed_ms: elapsed_since(conversation_started),
            message,
        },
    };
    checks.push(conversation_check);

    let transitions = audit
        .events()
        .iter()
        .filter(|event| event.event_type == "flow.transition_applied")
        .count();
    checks.push(SmokeCheck {
        name: "audit_trail",
        status: if transitions > 0 { SmokeStatus::Pass } else { SmokeStatus::Fail },
        elapsed_ms: 0,
        message: format!("{transitions} flow transitions audited"),
    });

    finalize_report(checks, elapsed_since(started))
}

fn elapsed_since(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((elapsed_since(started), value)),
        Err(error) => Err((elapsed_since(started), error)),
    }
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
