use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use paydesk_core::config::{AgentConfig, AgentProvider};
use paydesk_core::payroll::{department_totals, DepartmentTotal, PayrollProjection, PayrollSummary};
use paydesk_core::EmployeeView;
use serde::{Deserialize, Serialize};

use crate::http::HttpAgentClient;
use crate::offline::OfflineAnalyst;
use crate::tools::{ToolCall, ToolDeclaration, ToolExecutionResult};

/// Conversational agent seam. Implementations may be remote; the runtime
/// validates any tool call they return before acting on it.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn respond(&self, request: &AgentRequest) -> Result<AgentReply>;
}

/// Agent client selected by `agent.provider`.
pub fn client_from_config(config: &AgentConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider {
        AgentProvider::Offline => Ok(Arc::new(OfflineAnalyst::new())),
        AgentProvider::Http => {
            let base_url = config
                .base_url
                .clone()
                .ok_or_else(|| anyhow!("agent.base_url is required for the http provider"))?;
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| anyhow!("agent.api_key is required for the http provider"))?;
            Ok(Arc::new(HttpAgentClient::new(
                base_url,
                config.model.clone(),
                api_key,
                config.timeout(),
                config.max_retries,
            )?))
        }
    }
}

/// Projection data the agent may reason about.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollContext {
    pub generation: u64,
    pub summary: PayrollSummary,
    pub departments: Vec<DepartmentTotal>,
    pub employees: Vec<EmployeeView>,
}

impl PayrollContext {
    pub fn from_projection(projection: &PayrollProjection) -> Self {
        Self {
            generation: projection.generation(),
            summary: PayrollSummary::from_views(projection.views()),
            departments: department_totals(projection.views()),
            employees: projection.views().cloned().collect(),
        }
    }
}

/// Prior exchange replayed to a stateless agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptTurn {
    User { text: String },
    Model { text: String },
    ToolCall { call: ToolCall },
    ToolResponse { name: String, result: ToolExecutionResult },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnInput {
    Text { text: String },
    ToolResponse { name: String, result: ToolExecutionResult },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub session_id: String,
    pub system_instruction: String,
    pub tools: Vec<ToolDeclaration>,
    pub context: PayrollContext,
    pub transcript: Vec<TranscriptTurn>,
    pub input: TurnInput,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentReply {
    Text { text: String },
    ToolCall { call: ToolCall },
}

impl AgentReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}
