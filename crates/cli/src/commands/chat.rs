use std::io::{self, BufRead, Write};
use std::sync::Arc;

use crate::commands::{current_thread_runtime, open_runtime, CommandResult};
use ratedesk_agent::prompts;
use ratedesk_core::config::{AppConfig, LoadOptions};
use ratedesk_core::{SessionId, TracingAuditSink};

const QUIT_WORDS: &[&str] = &["/quit", "/exit"];

pub fn run(session: Option<String>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    run_with(&config, session, stdin.lock(), &mut stdout)
}

/// Reads one message per line until EOF or a quit word, writing each agent reply.
pub fn run_with(
    config: &AppConfig,
    session: Option<String>,
    input: impl BufRead,
    output: &mut impl Write,
) -> CommandResult {
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let opened = match runtime.block_on(open_runtime(config, Arc::new(TracingAuditSink))) {
        Ok(opened) => opened,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("chat", error_class, message, exit_code);
        }
    };

    let session_id = session
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("cli-{}", uuid::Uuid::new_v4()));
    let result = runtime.block_on(converse(&opened.runtime, &session_id, input, output));
    runtime.block_on(opened.close());

    match result {
        Ok(turns) => CommandResult::success(
            "chat",
            format!("session `{session_id}` closed after {turns} turns"),
        ),
        Err((error_class, message)) => CommandResult::failure("chat", error_class, message, 7),
    }
}

async fn converse(
    runtime: &ratedesk_agent::AgentRuntime,
    session_id: &str,
    input: impl BufRead,
    output: &mut impl Write,
) -> Result<usize, (&'static str, String)> {
    let io_failure = |error: io::Error| ("io", error.to_string());

    match runtime.session(&SessionId::from(session_id)).await {
        Ok(Some(existing)) => {
            writeln!(output, "resuming `{session_id}` in phase {}", existing.phase)
                .map_err(io_failure)?;
            if let Some(last) = existing.history.last() {
                writeln!(output, "agent> {}", last.content).map_err(io_failure)?;
            }
        }
        Ok(None) => writeln!(output, "agent> {}", prompts::HELLO).map_err(io_failure)?,
        Err(error) => return Err(("store", error.to_string())),
    }

    let mut turns = 0;
    for line in input.lines() {
        let line = line.map_err(io_failure)?;
        let message = line.trim();
        if QUIT_WORDS.contains(&message) {
            break;
        }
        if message.is_empty() {
            continue;
        }

        let correlation_id = format!("cli-turn-{turns}");
        let response = runtime
            .handle_message(session_id, message, &correlation_id)
            .await
            .map_err(|error| ("turn", error.to_string()))?;
        turns += 1;

        // Accept produces two agent messages; show everything appended after the user's line.
        let replies = response
            .state
            .history
            .iter()
            .rev()
            .take_while(|entry| entry.role != ratedesk_core::Role::User)
            .collect::<Vec<_>>();
        for reply in replies.into_iter().rev() {
            writeln!(output, "agent> {}", reply.content).map_err(io_failure)?;
        }
        output.flush().map_err(io_failure)?;
    }

    Ok(turns)
}
