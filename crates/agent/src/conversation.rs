use serde::{Deserialize, Serialize};

use crate::tools::ToolExecutionResult;

/// One visible entry of an analyst conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum HistoryEntry {
    User { text: String },
    Model { text: String },
    Tool { result: ToolExecutionResult },
}

impl HistoryEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::Model { text: text.into() }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::User { text } | Self::Model { text } => Some(text),
            Self::Tool { .. } => None,
        }
    }
}

/// Append-only record of a session. A new session starts a new history.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    entries: Vec<HistoryEntry>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Entries appended at or after `mark`.
    pub fn since(&self, mark: usize) -> &[HistoryEntry] {
        self.entries.get(mark..).unwrap_or_default()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tool_results(&self) -> impl Iterator<Item = &ToolExecutionResult> {
        self.entries.iter().filter_map(|entry| match entry {
            HistoryEntry::Tool { result } => Some(result),
            _ => None,
        })
    }
}
