use std::sync::Arc;

use paydesk_agent::{client_from_config, AnalystRuntime};
use paydesk_core::config::AppConfig;
use paydesk_core::payroll::computation_service;
use paydesk_core::{ApplicationError, PayrollProjector, RosterStore};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::AppState;

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("payroll computation setup failed: {0}")]
    Computation(#[source] ApplicationError),
    #[error("analyst agent setup failed: {0:#}")]
    Agent(#[source] anyhow::Error),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        computation = config.payroll.computation.as_str(),
        agent_provider = config.agent.provider.as_str(),
        "starting application bootstrap"
    );

    let roster =
        Arc::new(if config.payroll.seed_roster { RosterStore::seeded() } else { RosterStore::new() });
    let service = computation_service(&config.payroll).map_err(BootstrapError::Computation)?;
    let projector = PayrollProjector::with_max_attempts(
        Arc::clone(&roster),
        service,
        config.payroll.max_recompute_attempts,
    );
    info!(
        event_name = "system.bootstrap.roster_loaded",
        correlation_id = "bootstrap",
        employees = roster.len(),
        "roster loaded"
    );

    let client = client_from_config(&config.agent).map_err(BootstrapError::Agent)?;
    let analyst = AnalystRuntime::for_roster(client, roster);

    match projector.refresh().await {
        Ok(projection) => info!(
            event_name = "system.bootstrap.projection_ready",
            correlation_id = "bootstrap",
            generation = projection.generation(),
            employees = projection.len(),
            "initial payroll projection computed"
        ),
        // recomputed on the next request; health reports degraded until then
        Err(error) => warn!(
            event_name = "system.bootstrap.projection_deferred",
            correlation_id = "bootstrap",
            error = %error,
            "initial payroll projection failed"
        ),
    }

    Ok(Application { config, state: AppState::new(projector, analyst) })
}
