// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded argument object, exactly as emitted by the model.
    pub arguments: String,
}

/// Canonical message as stored and replayed through a provider.
///
/// `tool_call_id` is set on `Role::Tool` messages (the result being returned)
/// and `tool_calls` is set on `Role::Assistant` messages that requested tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: text.into(), tool_call_id: None, tool_calls: vec![] }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: text.into(), tool_call_id: None, tool_calls: vec![] }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: text.into(), tool_call_id: None, tool_calls: vec![] }
    }

    pub fn assistant_with_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self { role: Role::Assistant, content: text.into(), tool_call_id: None, tool_calls }
    }

    pub fn tool_result(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(id.into()),
            tool_calls: vec![],
        }
    }
}

/// A tool schema offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub json_schema: serde_json::Value,
}

/// Result of a `Chat`/`ChatWithTools` call.
#[derive(Debug, Clone, Default)]
pub struct ChatReply {
    pub content: String,
    /// Extracted chain-of-thought text, if the backend exposed one. Empty otherwise.
    pub reasoning: String,
    pub tool_calls: Vec<ToolCall>,
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors_set_expected_role() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);
        assert_eq!(Message::assistant("a").role, Role::Assistant);
    }

    #[test]
    fn tool_result_sets_tool_call_id() {
        let m = Message::tool_result("call-1", "output");
        assert_eq!(m.role, Role::Tool);
        assert_eq!(m.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(m.content, "output");
    }

    #[test]
    fn assistant_with_tool_calls_carries_calls() {
        let calls = vec![ToolCall { id: "c1".into(), name: "look".into(), arguments: "{}".into() }];
        let m = Message::assistant_with_tool_calls("", calls.clone());
        assert_eq!(m.tool_calls, calls);
    }

    #[test]
    fn role_serializes_lowercase() {
        let s = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(s, "\"assistant\"");
    }
}
