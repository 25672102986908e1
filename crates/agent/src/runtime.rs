use std::sync::Arc;

use paydesk_core::{ApplicationError, PayrollProjection, RosterStore};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::conversation::{ConversationHistory, HistoryEntry};
use crate::llm::{AgentReply, AgentRequest, LlmClient, PayrollContext, TranscriptTurn, TurnInput};
use crate::tools::{ToolCall, ToolExecutionResult, ToolRegistry};
use crate::turn::{transition, TurnEvent, TurnState, TurnTransitionError};

pub const ANALYST_SYSTEM_INSTRUCTION: &str = "You are an expert financial and HR analyst \
reviewing a monthly Indian payroll (amounts in INR). Answer in under 50 words using only the \
payroll data provided. When asked to add an employee, call the add_employee tool with their \
name, department, role and annual salary. After the tool succeeds, confirm with: \
\"Done. I've added them to the payroll.\"";

pub const INITIAL_ANALYSIS_PROMPT: &str = "Analyze the following payroll data:";
pub const INITIAL_ANALYSIS_FAILURE_NOTICE: &str =
    "Sorry, I encountered an error during initial analysis.";
pub const TURN_FAILURE_NOTICE: &str = "Sorry, I encountered an error. Please try again.";
pub const UNEXPECTED_TOOL_NOTICE: &str =
    "I can make one roster change per message, so nothing further was changed. Please ask again.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalystError {
    #[error("message must not be empty")]
    EmptyMessage,
    #[error(transparent)]
    Turn(#[from] TurnTransitionError),
}

/// What one turn appended to the session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TurnReport {
    pub entries: Vec<HistoryEntry>,
    pub roster_changed: bool,
    pub agent_failed: bool,
}

/// Conversation bound to one projection generation.
///
/// A roster change makes the session stale; callers open a new one from the
/// refreshed projection, which starts a new history.
#[derive(Clone, Debug)]
pub struct AnalystSession {
    id: String,
    context: PayrollContext,
    history: ConversationHistory,
    transcript: Vec<TranscriptTurn>,
    state: TurnState,
}

impl AnalystSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn generation(&self) -> u64 {
        self.context.generation
    }

    pub fn context(&self) -> &PayrollContext {
        &self.context
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.context.generation == generation
    }

    fn advance(&mut self, event: TurnEvent) -> Result<(), TurnTransitionError> {
        let step = transition(self.state, event)?;
        debug!(
            event_name = "analyst.turn_transition",
            session_id = %self.id,
            from = ?step.from,
            to = ?step.to,
            event = ?step.event,
            actions = ?step.actions,
            "analyst turn advanced"
        );
        self.state = step.to;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TurnOrigin {
    InitialAnalysis,
    User,
}

impl TurnOrigin {
    fn failure_notice(self) -> &'static str {
        match self {
            Self::InitialAnalysis => INITIAL_ANALYSIS_FAILURE_NOTICE,
            Self::User => TURN_FAILURE_NOTICE,
        }
    }
}

/// Drives analyst turns against a roster through the tool registry.
pub struct AnalystRuntime {
    client: Arc<dyn LlmClient>,
    registry: ToolRegistry,
    system_instruction: String,
}

impl AnalystRuntime {
    pub fn new(client: Arc<dyn LlmClient>, registry: ToolRegistry) -> Self {
        Self { client, registry, system_instruction: ANALYST_SYSTEM_INSTRUCTION.to_string() }
    }

    pub fn for_roster(client: Arc<dyn LlmClient>, roster: Arc<RosterStore>) -> Self {
        Self::new(client, ToolRegistry::for_roster(roster))
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn open_session(&self, projection: &PayrollProjection) -> AnalystSession {
        let session = AnalystSession {
            id: Uuid::new_v4().to_string(),
            context: PayrollContext::from_projection(projection),
            history: ConversationHistory::new(),
            transcript: Vec::new(),
            state: TurnState::Idle,
        };
        info!(
            event_name = "analyst.session_opened",
            session_id = %session.id,
            generation = session.generation(),
            employees = session.context.employees.len(),
            "analyst session opened"
        );
        session
    }

    /// Opens a fresh session and runs its initial analysis.
    pub async fn reopen(
        &self,
        projection: &PayrollProjection,
    ) -> Result<(AnalystSession, TurnReport), AnalystError> {
        let mut session = self.open_session(projection);
        let report = self.start_analysis(&mut session).await?;
        Ok((session, report))
    }

    /// Synthetic first turn over the session's projection. Skipped for an empty
    /// roster; the prompt itself is never shown in the history.
    pub async fn start_analysis(
        &self,
        session: &mut AnalystSession,
    ) -> Result<TurnReport, AnalystError> {
        if session.context.employees.is_empty() {
            return Ok(TurnReport::default());
        }

        let data = match serde_json::to_string(&session.context.employees) {
            Ok(data) => data,
            Err(error) => {
                warn!(
                    event_name = "analyst.context_serialization_failed",
                    session_id = %session.id,
                    error = %error,
                    "payroll context could not be encoded for the agent"
                );
                let error =
                    anyhow::Error::new(error).context("payroll context could not be encoded");
                return self.abandon_turn(session, TurnOrigin::InitialAnalysis, error);
            }
        };
        self.run_turn(session, format!("{INITIAL_ANALYSIS_PROMPT} {data}"), TurnOrigin::InitialAnalysis)
            .await
    }

    /// Ends a turn with its failure notice without contacting the agent.
    fn abandon_turn(
        &self,
        session: &mut AnalystSession,
        origin: TurnOrigin,
        error: anyhow::Error,
    ) -> Result<TurnReport, AnalystError> {
        let mark = session.history.len();
        session.advance(TurnEvent::UserTextSubmitted)?;
        self.fail(session, origin, error)?;
        Ok(TurnReport {
            entries: session.history.since(mark).to_vec(),
            roster_changed: false,
            agent_failed: true,
        })
    }

    pub async fn submit_user_text(
        &self,
        session: &mut AnalystSession,
        text: &str,
    ) -> Result<TurnReport, AnalystError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AnalystError::EmptyMessage);
        }
        self.run_turn(session, text.to_string(), TurnOrigin::User).await
    }

    async fn run_turn(
        &self,
        session: &mut AnalystSession,
        text: String,
        origin: TurnOrigin,
    ) -> Result<TurnReport, AnalystError> {
        let mark = session.history.len();
        let mut report = TurnReport::default();

        session.advance(TurnEvent::UserTextSubmitted)?;
        if origin == TurnOrigin::User {
            session.history.push(HistoryEntry::user(text.clone()));
        }

        let reply = self.exchange(session, TurnInput::Text { text: text.clone() }).await;
        session.transcript.push(TranscriptTurn::User { text });

        match reply {
            Err(error) => {
                self.fail(session, origin, error)?;
                report.agent_failed = true;
            }
            Ok(AgentReply::Text { text }) => {
                session.advance(TurnEvent::AgentRepliedWithText)?;
                self.record_model_text(session, text);
            }
            Ok(AgentReply::ToolCall { call }) if origin == TurnOrigin::InitialAnalysis => {
                warn!(
                    event_name = "analyst.tool_call_ignored",
                    session_id = %session.id,
                    tool = %call.name,
                    "tool call during initial analysis was not executed"
                );
                session.advance(TurnEvent::AgentRepliedWithText)?;
                self.record_model_text(session, UNEXPECTED_TOOL_NOTICE.to_string());
            }
            Ok(AgentReply::ToolCall { call }) => {
                session.advance(TurnEvent::AgentRequestedTool)?;
                let result = self.execute_tool(session, &call);
                report.roster_changed = result.is_success();

                session.advance(TurnEvent::ToolResultRecorded)?;
                session.history.push(HistoryEntry::Tool { result: result.clone() });

                let input = TurnInput::ToolResponse { name: call.name.clone(), result: result.clone() };
                let name = call.name.clone();
                session.transcript.push(TranscriptTurn::ToolCall { call });
                let follow_up = self.exchange(session, input).await;
                session.transcript.push(TranscriptTurn::ToolResponse { name, result });

                match follow_up {
                    Err(error) => {
                        self.fail(session, origin, error)?;
                        report.agent_failed = true;
                    }
                    Ok(AgentReply::Text { text }) => {
                        session.advance(TurnEvent::FollowUpReceived)?;
                        self.record_model_text(session, text);
                    }
                    Ok(AgentReply::ToolCall { call }) => {
                        warn!(
                            event_name = "analyst.tool_call_ignored",
                            session_id = %session.id,
                            tool = %call.name,
                            "chained tool call in follow-up was not executed"
                        );
                        session.advance(TurnEvent::FollowUpReceived)?;
                        self.record_model_text(session, UNEXPECTED_TOOL_NOTICE.to_string());
                    }
                }
            }
        }

        report.entries = session.history.since(mark).to_vec();
        info!(
            event_name = "analyst.turn_completed",
            session_id = %session.id,
            initial_analysis = origin == TurnOrigin::InitialAnalysis,
            entries = report.entries.len(),
            roster_changed = report.roster_changed,
            agent_failed = report.agent_failed,
            "analyst turn completed"
        );
        Ok(report)
    }

    async fn exchange(
        &self,
        session: &AnalystSession,
        input: TurnInput,
    ) -> anyhow::Result<AgentReply> {
        let request = AgentRequest {
            session_id: session.id.clone(),
            system_instruction: self.system_instruction.clone(),
            tools: self.registry.declarations(),
            context: session.context.clone(),
            transcript: session.transcript.clone(),
            input,
        };
        self.client.respond(&request).await
    }

    fn execute_tool(&self, session: &AnalystSession, call: &ToolCall) -> ToolExecutionResult {
        debug!(
            event_name = "analyst.tool_requested",
            session_id = %session.id,
            tool = %call.name,
            "analyst requested tool"
        );
        self.registry.dispatch(call)
    }

    fn record_model_text(&self, session: &mut AnalystSession, text: String) {
        session.transcript.push(TranscriptTurn::Model { text: text.clone() });
        session.history.push(HistoryEntry::model(text));
    }

    fn fail(
        &self,
        session: &mut AnalystSession,
        origin: TurnOrigin,
        error: anyhow::Error,
    ) -> Result<(), TurnTransitionError> {
        let failure = ApplicationError::AgentServiceFailure(format!("{error:#}"));
        warn!(
            event_name = "analyst.agent_failed",
            session_id = %session.id,
            state = ?session.state,
            error = %failure,
            "analyst agent call failed"
        );
        session.advance(TurnEvent::AgentFailed)?;
        session.history.push(HistoryEntry::model(origin.failure_notice()));
        Ok(())
    }
}
