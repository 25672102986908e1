pub mod chat;
pub mod config;
pub mod doctor;
pub mod payroll;

use std::future::Future;
use std::sync::Arc;

use paydesk_core::config::AppConfig;
use paydesk_core::payroll::computation_service;
use paydesk_core::{ApplicationError, PayrollComputationService, PayrollProjector, RosterStore};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

pub(crate) const EXIT_CONFIG: u8 = 2;
pub(crate) const EXIT_COMPUTATION: u8 = 3;
pub(crate) const EXIT_RUNTIME: u8 = 4;

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) type Projector = PayrollProjector<Arc<dyn PayrollComputationService>>;

/// Roster and projector as configured by `[payroll]`.
pub(crate) fn build_projector(config: &AppConfig) -> Result<Projector, ApplicationError> {
    let roster =
        if config.payroll.seed_roster { RosterStore::seeded() } else { RosterStore::new() };
    let service = computation_service(&config.payroll)?;
    Ok(PayrollProjector::with_max_attempts(
        Arc::new(roster),
        service,
        config.payroll.max_recompute_attempts,
    ))
}

pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| format!("failed to initialize async runtime: {error}"))?;
    Ok(runtime.block_on(future))
}
