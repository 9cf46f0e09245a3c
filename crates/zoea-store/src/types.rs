// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a mysis row, mirrored by the in-memory runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MysisState {
    Idle,
    Running,
    Stopped,
    Errored,
}

impl MysisState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MysisState::Idle => "idle",
            MysisState::Running => "running",
            MysisState::Stopped => "stopped",
            MysisState::Errored => "errored",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(MysisState::Idle),
            "running" => Some(MysisState::Running),
            "stopped" => Some(MysisState::Stopped),
            "errored" => Some(MysisState::Errored),
            _ => None,
        }
    }

    /// Mysis messages are accepted in `{idle, running}`, rejected otherwise.
    pub fn accepts_messages(&self) -> bool {
        matches!(self, MysisState::Idle | MysisState::Running)
    }
}

/// Role of a memory row in the conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryRole {
    System,
    User,
    Assistant,
    Tool,
    BroadcastNote,
}

impl MemoryRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryRole::System => "system",
            MemoryRole::User => "user",
            MemoryRole::Assistant => "assistant",
            MemoryRole::Tool => "tool",
            MemoryRole::BroadcastNote => "broadcast_note",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(MemoryRole::System),
            "user" => Some(MemoryRole::User),
            "assistant" => Some(MemoryRole::Assistant),
            "tool" => Some(MemoryRole::Tool),
            "broadcast_note" => Some(MemoryRole::BroadcastNote),
            _ => None,
        }
    }
}

/// Provenance of a memory row; drives prompt-source selection in the context assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    System,
    Direct,
    Broadcast,
    Nudge,
    Tool,
    Llm,
}

impl MemorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemorySource::System => "system",
            MemorySource::Direct => "direct",
            MemorySource::Broadcast => "broadcast",
            MemorySource::Nudge => "nudge",
            MemorySource::Tool => "tool",
            MemorySource::Llm => "llm",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(MemorySource::System),
            "direct" => Some(MemorySource::Direct),
            "broadcast" => Some(MemorySource::Broadcast),
            "nudge" => Some(MemorySource::Nudge),
            "tool" => Some(MemorySource::Tool),
            "llm" => Some(MemorySource::Llm),
            _ => None,
        }
    }
}

/// A single append-only record in a mysis's conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: i64,
    pub mysis_id: String,
    pub role: MemoryRole,
    pub source: MemorySource,
    pub sender_id: Option<String>,
    pub content: String,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
}

impl Memory {
    /// Derives `tool_call_id` from a tool-role memory's `<id><delim><payload>` encoding.
    /// Returns `None` for non-tool memories or malformed content (missing delimiter or empty id).
    pub fn tool_call_id(&self, delimiter: &str) -> Option<&str> {
        if self.role != MemoryRole::Tool {
            return None;
        }
        let (id, _) = self.content.split_once(delimiter)?;
        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mysis {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub state: MysisState,
    pub last_error: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub provider: String,
    pub username: String,
    pub credentials: String,
    pub in_use_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broadcast {
    pub id: i64,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mysis_state_round_trips_through_str() {
        for s in [
            MysisState::Idle,
            MysisState::Running,
            MysisState::Stopped,
            MysisState::Errored,
        ] {
            assert_eq!(MysisState::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn only_idle_and_running_accept_messages() {
        assert!(MysisState::Idle.accepts_messages());
        assert!(MysisState::Running.accepts_messages());
        assert!(!MysisState::Stopped.accepts_messages());
        assert!(!MysisState::Errored.accepts_messages());
    }

    fn mem(content: &str) -> Memory {
        Memory {
            id: 1,
            mysis_id: "m1".into(),
            role: MemoryRole::Tool,
            source: MemorySource::Tool,
            sender_id: None,
            content: content.to_string(),
            reasoning: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn tool_call_id_extracts_from_well_formed_content() {
        assert_eq!(mem("t1::payload").tool_call_id("::"), Some("t1"));
    }

    #[test]
    fn tool_call_id_none_when_delimiter_missing() {
        assert_eq!(mem("no delimiter here").tool_call_id("::"), None);
    }

    #[test]
    fn tool_call_id_none_when_id_empty() {
        assert_eq!(mem("::payload").tool_call_id("::"), None);
    }

    #[test]
    fn tool_call_id_none_for_non_tool_role() {
        let mut m = mem("t1::payload");
        m.role = MemoryRole::Assistant;
        assert_eq!(m.tool_call_id("::"), None);
    }
}
