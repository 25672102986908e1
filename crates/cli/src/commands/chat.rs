use std::io::{BufRead, Write};

use paydesk_agent::offline::format_inr;
use paydesk_agent::{
    client_from_config, AnalystError, AnalystRuntime, AnalystSession, HistoryEntry,
    ToolExecutionResult,
};
use paydesk_core::config::{AppConfig, LoadOptions};
use paydesk_core::ApplicationError;

use super::{build_projector, CommandResult, Projector, EXIT_COMPUTATION, EXIT_CONFIG, EXIT_RUNTIME};

const PROMPT: &str = "you> ";

pub fn run() -> CommandResult {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    run_with_io(stdin.lock(), &mut stdout)
}

/// Line-oriented analyst session. `exit` or end of input ends it.
pub fn run_with_io<R, W>(input: R, output: &mut W) -> CommandResult
where
    R: BufRead,
    W: Write,
{
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("chat", "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };

    let projector = match build_projector(&config) {
        Ok(projector) => projector,
        Err(error) => {
            return CommandResult::failure("chat", "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };

    let client = match client_from_config(&config.agent) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure("chat", "config_validation", format!("{error:#}"), EXIT_CONFIG)
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            )
        }
    };

    let analyst = AnalystRuntime::for_roster(client, projector.roster().clone());
    runtime.block_on(converse(&projector, &analyst, input, output))
}

async fn converse<R, W>(
    projector: &Projector,
    analyst: &AnalystRuntime,
    input: R,
    output: &mut W,
) -> CommandResult
where
    R: BufRead,
    W: Write,
{
    let mut turns = 0_usize;
    let mut session = match open(projector, analyst, output).await {
        Ok(session) => session,
        Err(failure) => return failure.into_result(),
    };
    // set while the session predates a roster change that could not be recomputed
    let mut reopen_pending = false;

    let mut input = input;
    let mut line = String::new();
    loop {
        write!(output, "{PROMPT}").ok();
        output.flush().ok();
        line.clear();
        match input.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(error) => {
                return CommandResult::failure("chat", "io", error.to_string(), EXIT_RUNTIME)
            }
        }
        let text = line.trim();
        if matches!(text, "exit" | "quit") {
            break;
        }
        if text.is_empty() {
            continue;
        }

        if reopen_pending {
            reopen_pending = !reopen(projector, analyst, &mut session, output).await;
        }

        let report = match analyst.submit_user_text(&mut session, text).await {
            Ok(report) => report,
            Err(error) => {
                return CommandResult::failure("chat", "turn", error.to_string(), EXIT_RUNTIME)
            }
        };
        turns += 1;
        // the user's own line is already on screen
        print_entries(output, report.entries.iter().skip(1));

        if report.roster_changed {
            reopen_pending = !reopen(projector, analyst, &mut session, output).await;
        }
    }

    CommandResult::success(
        "chat",
        format!("session ended after {turns} turns; roster has {} employees", projector.roster().len()),
    )
}

/// Replaces `session` with one over a fresh projection. On failure the current
/// session is kept and `false` is returned.
async fn reopen<W: Write>(
    projector: &Projector,
    analyst: &AnalystRuntime,
    session: &mut AnalystSession,
    output: &mut W,
) -> bool {
    writeln!(output, "-- roster changed; starting a new analysis --").ok();
    match open(projector, analyst, output).await {
        Ok(reopened) => {
            *session = reopened;
            true
        }
        Err(failure) => {
            writeln!(
                output,
                "-- payroll could not be recomputed ({}); continuing the current session --",
                failure.message()
            )
            .ok();
            output.flush().ok();
            false
        }
    }
}

enum OpenFailure {
    Computation(ApplicationError),
    Turn(AnalystError),
}

impl OpenFailure {
    fn message(&self) -> String {
        match self {
            Self::Computation(error) => error.to_string(),
            Self::Turn(error) => error.to_string(),
        }
    }

    fn into_result(self) -> CommandResult {
        match &self {
            Self::Computation(_) => {
                CommandResult::failure("chat", "computation", self.message(), EXIT_COMPUTATION)
            }
            Self::Turn(_) => CommandResult::failure("chat", "turn", self.message(), EXIT_RUNTIME),
        }
    }
}

async fn open<W: Write>(
    projector: &Projector,
    analyst: &AnalystRuntime,
    output: &mut W,
) -> Result<AnalystSession, OpenFailure> {
    let projection = projector.refresh().await.map_err(OpenFailure::Computation)?;
    let (session, report) = analyst.reopen(&projection).await.map_err(OpenFailure::Turn)?;
    print_entries(output, report.entries.iter());
    Ok(session)
}

fn print_entries<'a, W: Write>(output: &mut W, entries: impl Iterator<Item = &'a HistoryEntry>) {
    for entry in entries {
        let line = match entry {
            HistoryEntry::User { text } => format!("{PROMPT}{text}"),
            HistoryEntry::Model { text } => format!("analyst> {text}"),
            HistoryEntry::Tool { result: ToolExecutionResult::Success { employee_name, net_pay } } => {
                format!("tool> added {employee_name} (estimated net pay {}/month)", format_inr(*net_pay))
            }
            HistoryEntry::Tool { result: ToolExecutionResult::Error { message } } => {
                format!("tool> {message}")
            }
        };
        writeln!(output, "{line}").ok();
    }
    output.flush().ok();
}
