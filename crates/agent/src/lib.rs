//! Analyst orchestration over the payroll roster.
//!
//! A conversational agent answers questions about the current payroll
//! projection and may request roster changes through declared tools. The
//! agent only proposes: every tool call is validated and executed locally,
//! and its result is computed by the payroll rules, never taken from the agent.
//!
//! - `turn` holds the per-turn state machine.
//! - `tools` declares, validates and executes `add_employee`.
//! - `runtime` drives sessions through the state machine.
//! - `llm` is the agent seam, implemented by `http` and `offline`.

pub mod conversation;
pub mod http;
pub mod llm;
pub mod offline;
pub mod runtime;
pub mod tools;
pub mod turn;

pub use conversation::{ConversationHistory, HistoryEntry};
pub use http::HttpAgentClient;
pub use llm::{client_from_config, AgentReply, AgentRequest, LlmClient, PayrollContext};
pub use offline::OfflineAnalyst;
pub use runtime::{AnalystError, AnalystRuntime, AnalystSession, TurnReport};
pub use tools::{ToolCall, ToolExecutionResult, ToolRegistry};
