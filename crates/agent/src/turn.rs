use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    #[default]
    Idle,
    AwaitingAgent,
    ExecutingTool,
    AwaitingAgentFollowUp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEvent {
    UserTextSubmitted,
    AgentRepliedWithText,
    AgentRequestedTool,
    ToolResultRecorded,
    FollowUpReceived,
    AgentFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnAction {
    AppendUserMessage,
    SendToAgent,
    ExecuteTool,
    AppendToolResult,
    SendToolResponse,
    AppendModelMessage,
    AppendErrorNotice,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnTransition {
    pub from: TurnState,
    pub to: TurnState,
    pub event: TurnEvent,
    pub actions: Vec<TurnAction>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnTransitionError {
    #[error("invalid turn transition from {state:?} using event {event:?}")]
    InvalidTransition { state: TurnState, event: TurnEvent },
}

pub fn transition(current: TurnState, event: TurnEvent) -> Result<TurnTransition, TurnTransitionError> {
    use TurnAction::{
        AppendErrorNotice, AppendModelMessage, AppendToolResult, AppendUserMessage, ExecuteTool,
        SendToAgent, SendToolResponse,
    };
    use TurnEvent::{
        AgentFailed, AgentRepliedWithText, AgentRequestedTool, FollowUpReceived,
        ToolResultRecorded, UserTextSubmitted,
    };
    use TurnState::{AwaitingAgent, AwaitingAgentFollowUp, ExecutingTool, Idle};

    let (to, actions) = match (current, event) {
        (Idle, UserTextSubmitted) => (AwaitingAgent, vec![AppendUserMessage, SendToAgent]),
        (AwaitingAgent, AgentRepliedWithText) => (Idle, vec![AppendModelMessage]),
        (AwaitingAgent, AgentRequestedTool) => (ExecutingTool, vec![ExecuteTool]),
        (ExecutingTool, ToolResultRecorded) => {
            (AwaitingAgentFollowUp, vec![AppendToolResult, SendToolResponse])
        }
        (AwaitingAgentFollowUp, FollowUpReceived) => (Idle, vec![AppendModelMessage]),
        (AwaitingAgent, AgentFailed) | (AwaitingAgentFollowUp, AgentFailed) => {
            (Idle, vec![AppendErrorNotice])
        }
        _ => return Err(TurnTransitionError::InvalidTransition { state: current, event }),
    };

    Ok(TurnTransition { from: current, to, event, actions })
}
