pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::payroll::PayrollArgs;

#[derive(Debug, Parser)]
#[command(
    name = "paydesk",
    about = "Paydesk operator CLI",
    long_about = "Inspect configuration, check readiness, print the payroll projection, and chat with the payroll analyst.",
    after_help = "Examples:\n  paydesk doctor --json\n  paydesk payroll --department Engineering --sort netPay --desc\n  paydesk chat"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, payroll computation, and analyst readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Compute the payroll projection and print views, totals, and issues")]
    Payroll(PayrollArgs),
    #[command(about = "Chat with the payroll analyst over stdin; `exit` ends the session")]
    Chat,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Payroll(args) => commands::payroll::run(&args),
        Command::Chat => commands::chat::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
