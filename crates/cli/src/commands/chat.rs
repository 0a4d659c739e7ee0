use std::io::{self, BufRead, Write};

use ration_agent::runtime::{AgentRuntime, TurnOutcome, FAREWELL_MESSAGE};
use ration_core::config::{AppConfig, LoadOptions};
use tracing::info;

use crate::bootstrap::bootstrap_with_config;
use crate::commands::CommandResult;

pub const GREETING_BANNER: &str =
    "Hello! Welcome to the ration ordering service. What would you like to order today?";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    Exit,
    TurnLimit,
    EndOfInput,
}

impl SessionEnd {
    fn as_str(self) -> &'static str {
        match self {
            Self::Exit => "exit",
            Self::TurnLimit => "turn_limit",
            Self::EndOfInput => "end_of_input",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub turns: u32,
    pub ended_by: SessionEnd,
}

pub fn run(options: &LoadOptions, session_id: Option<String>, resume: bool) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("chat", error),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::runtime_failure("chat", error),
    };

    let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    runtime.block_on(async {
        let app = match bootstrap_with_config(&config).await {
            Ok(app) => app,
            Err(error) => return CommandResult::bootstrap_failure("chat", &error),
        };

        if !resume {
            app.agent_runtime.start_session(&session_id).await;
        }

        let stdin = io::stdin();
        let stdout = io::stdout();
        let outcome =
            run_session(&app.agent_runtime, &session_id, stdin.lock(), stdout.lock()).await;
        app.db_pool.close().await;

        match outcome {
            Ok(summary) => CommandResult::success(
                "chat",
                format!(
                    "session {session_id} ended after {} turn(s) ({})",
                    summary.turns,
                    summary.ended_by.as_str()
                ),
            ),
            Err(error) => CommandResult::failure("chat", "io", error.to_string(), 7),
        }
    })
}

/// Reads one utterance per line from `input` and writes `Agent: ...` replies
/// to `output` until the caller leaves, the turn cap is hit, or input ends.
pub async fn run_session<R: BufRead, W: Write>(
    runtime: &AgentRuntime,
    session_id: &str,
    mut input: R,
    mut output: W,
) -> io::Result<SessionSummary> {
    writeln!(output, "Agent: {GREETING_BANNER}")?;
    let mut turns = 0;

    let ended_by = loop {
        write!(output, "You: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break SessionEnd::EndOfInput;
        }
        if !line.trim().is_empty() {
            turns += 1;
        }

        match runtime.handle_utterance(session_id, &line).await {
            TurnOutcome::Reply(reply) => writeln!(output, "Agent: {reply}")?,
            TurnOutcome::SessionEnded => {
                writeln!(output, "Agent: {FAREWELL_MESSAGE}")?;
                break SessionEnd::Exit;
            }
            TurnOutcome::TurnLimitReached(message) => {
                writeln!(output, "Agent: {message}")?;
                break SessionEnd::TurnLimit;
            }
        }
    };

    output.flush()?;
    info!(
        event_name = "cli.chat.finished",
        session_id,
        turns,
        ended_by = ended_by.as_str(),
        "chat session finished"
    );
    Ok(SessionSummary { turns, ended_by })
}
