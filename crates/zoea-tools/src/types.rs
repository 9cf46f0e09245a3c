// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde_json::Value;

/// A single tool invocation requested by the model, forwarded verbatim from
/// the provider's `tool_calls` response.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// A tool's JSON-schema declaration, as surfaced to the provider.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub json_schema: Value,
}

/// The result of executing one [`ToolCall`]. Always tagged with the
/// originating call id so the caller can persist exactly one tool-result
/// memory per call, success or failure.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
    /// Set only when a retriable failure (`TransientNetwork`/`Timeout`)
    /// exhausted its retries or ran past the turn deadline. A terminal
    /// upstream error payload is still `is_error` but never escalates — the
    /// turn continues.
    pub escalate: bool,
}

impl ToolOutput {
    pub fn ok(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { tool_call_id: tool_call_id.into(), content: content.into(), is_error: false, escalate: false }
    }

    /// A non-retriable or not-yet-retried failure: persisted as a tool-error
    /// memory, but the mysis stays `running`.
    pub fn err(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { tool_call_id: tool_call_id.into(), content: content.into(), is_error: true, escalate: false }
    }

    /// A retriable failure whose retries were exhausted: persisted the same
    /// way, but the caller must also transition the mysis to `errored`.
    pub fn err_escalate(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { tool_call_id: tool_call_id.into(), content: content.into(), is_error: true, escalate: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_output_is_not_error() {
        let out = ToolOutput::ok("c1", "result");
        assert!(!out.is_error);
        assert!(!out.escalate);
        assert_eq!(out.content, "result");
    }

    #[test]
    fn err_output_is_error_but_does_not_escalate() {
        let out = ToolOutput::err("c1", "Error: Terminal: invalid target");
        assert!(out.is_error);
        assert!(!out.escalate);
        assert!(out.content.starts_with("Error: Terminal:"));
    }

    #[test]
    fn err_escalate_output_is_error_and_escalates() {
        let out = ToolOutput::err_escalate("c1", "Error: TransientNetwork: deadline exceeded");
        assert!(out.is_error);
        assert!(out.escalate);
    }

    #[test]
    fn tool_call_carries_args() {
        let call = ToolCall { id: "c1".into(), name: "look".into(), args: json!({"radius": 5}) };
        assert_eq!(call.args["radius"], 5);
    }
}
