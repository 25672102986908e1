use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // diagnostics go to stderr so command output stays parseable
    let filter = EnvFilter::try_from_env("PAYDESK_CLI_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).compact().init();

    paydesk_cli::run()
}
