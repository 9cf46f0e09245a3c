// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Deterministic encodings between [`zoea_store::Memory`] rows and
//! [`zoea_provider::Message`]s. These constants are part of the persisted
//! wire format: changing them invalidates every stored memory.

use zoea_provider::{Message, ToolCall as ProviderToolCall};
use zoea_store::{Memory, MemoryRole};

/// Marks an assistant memory's `content` as a serialized tool-call payload
/// rather than plain text.
pub const TOOL_CALLS_PREFIX: &str = "TOOL_CALLS:";

/// Separates `id`, `name` and `arguments_json` within one call's line.
pub const TOOL_CALL_FIELD_DELIM: char = '\t';

/// Separates `<tool_call_id>` from `<payload-or-error-text>` in a tool-role
/// memory's content.
pub const TOOL_RESULT_DELIM: &str = "::";

/// Encode an assistant turn that produced tool calls: `TOOL_CALLS:` followed
/// by one line per call, each `id\tname\targuments_json`. Plain-text replies
/// use their content directly and never carry this prefix.
pub fn encode_tool_calls(tool_calls: &[ProviderToolCall]) -> String {
    let mut out = String::from(TOOL_CALLS_PREFIX);
    for tc in tool_calls {
        out.push('\n');
        out.push_str(&tc.id);
        out.push(TOOL_CALL_FIELD_DELIM);
        out.push_str(&tc.name);
        out.push(TOOL_CALL_FIELD_DELIM);
        out.push_str(&tc.arguments);
    }
    out
}

/// Decode a `TOOL_CALLS:`-prefixed payload back into provider tool calls.
/// A line missing its `id` or `name` field is dropped; the caller falls back
/// to treating the memory as plain text if nothing survives.
pub fn decode_tool_calls(content: &str) -> Vec<ProviderToolCall> {
    let Some(body) = content.strip_prefix(TOOL_CALLS_PREFIX) else {
        return Vec::new();
    };
    body.lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut fields = line.splitn(3, TOOL_CALL_FIELD_DELIM);
            let id = fields.next()?.to_string();
            let name = fields.next()?.to_string();
            let arguments = fields.next().unwrap_or("{}").to_string();
            if id.is_empty() || name.is_empty() {
                None
            } else {
                Some(ProviderToolCall { id, name, arguments })
            }
        })
        .collect()
}

pub fn is_tool_call_payload(content: &str) -> bool {
    content.starts_with(TOOL_CALLS_PREFIX)
}

/// Encode one tool-result memory's content: `<tool_call_id><delim><payload>`.
pub fn encode_tool_result(tool_call_id: &str, payload: &str) -> String {
    format!("{tool_call_id}{TOOL_RESULT_DELIM}{payload}")
}

/// Split a tool-result memory's content into `(tool_call_id, payload)`.
/// Returns `None` for malformed content (missing delimiter or empty id) —
/// the same condition [`Memory::tool_call_id`] checks.
pub fn decode_tool_result(content: &str) -> Option<(&str, &str)> {
    let (id, payload) = content.split_once(TOOL_RESULT_DELIM)?;
    if id.is_empty() {
        None
    } else {
        Some((id, payload))
    }
}

/// Convert one windowed [`Memory`] into a canonical provider [`Message`].
/// An assistant memory holding stored tool calls emits `content = ""` with
/// `tool_calls` parsed from the payload; malformed tool-call JSON falls back
/// to the raw content with no tool calls.
pub fn memory_to_message(mem: &Memory) -> Message {
    match mem.role {
        MemoryRole::System => Message::system(mem.content.clone()),
        MemoryRole::User | MemoryRole::BroadcastNote => Message::user(mem.content.clone()),
        MemoryRole::Assistant => {
            if is_tool_call_payload(&mem.content) {
                let tool_calls = decode_tool_calls(&mem.content);
                if !tool_calls.is_empty() {
                    return Message::assistant_with_tool_calls(String::new(), tool_calls);
                }
            }
            Message::assistant(mem.content.clone())
        }
        MemoryRole::Tool => {
            let (id, payload) = decode_tool_result(&mem.content).unwrap_or(("", &mem.content));
            Message::tool_result(id, payload.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn mem(role: MemoryRole, content: &str) -> Memory {
        Memory {
            id: 1,
            mysis_id: "m1".into(),
            role,
            source: zoea_store::MemorySource::Llm,
            sender_id: None,
            content: content.to_string(),
            reasoning: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn encode_then_decode_tool_calls_round_trips() {
        let calls = vec![ProviderToolCall { id: "c1".into(), name: "look".into(), arguments: "{\"x\":1}".into() }];
        let encoded = encode_tool_calls(&calls);
        assert!(encoded.starts_with(TOOL_CALLS_PREFIX));
        let decoded = decode_tool_calls(&encoded);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].name, "look");
    }

    #[test]
    fn decode_tool_calls_on_plain_text_is_empty() {
        assert!(decode_tool_calls("just a reply").is_empty());
    }

    #[test]
    fn decode_tool_calls_on_line_missing_fields_is_empty() {
        assert!(decode_tool_calls(&format!("{TOOL_CALLS_PREFIX}\nno_tabs_here")).is_empty());
    }

    #[test]
    fn encode_tool_calls_produces_one_line_per_call() {
        let calls = vec![
            ProviderToolCall { id: "c1".into(), name: "look".into(), arguments: "{}".into() },
            ProviderToolCall { id: "c2".into(), name: "move".into(), arguments: "{\"x\":1}".into() },
        ];
        let encoded = encode_tool_calls(&calls);
        let lines: Vec<&str> = encoded.strip_prefix(TOOL_CALLS_PREFIX).unwrap().lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["c1\tlook\t{}", "c2\tmove\t{\"x\":1}"]);
    }

    #[test]
    fn tool_result_round_trips() {
        let encoded = encode_tool_result("c1", "42 hull points");
        assert_eq!(decode_tool_result(&encoded), Some(("c1", "42 hull points")));
    }

    #[test]
    fn tool_result_missing_delimiter_is_none() {
        assert_eq!(decode_tool_result("no delimiter"), None);
    }

    #[test]
    fn tool_result_empty_id_is_none() {
        assert_eq!(decode_tool_result("::payload"), None);
    }

    #[test]
    fn memory_to_message_assistant_tool_calls_has_empty_content() {
        let calls = vec![ProviderToolCall { id: "c1".into(), name: "look".into(), arguments: "{}".into() }];
        let content = encode_tool_calls(&calls);
        let m = memory_to_message(&mem(MemoryRole::Assistant, &content));
        assert_eq!(m.content, "");
        assert_eq!(m.tool_calls.len(), 1);
    }

    #[test]
    fn memory_to_message_plain_assistant_keeps_content() {
        let m = memory_to_message(&mem(MemoryRole::Assistant, "hello"));
        assert_eq!(m.content, "hello");
        assert!(m.tool_calls.is_empty());
    }

    #[test]
    fn memory_to_message_malformed_tool_calls_falls_back_to_text() {
        let content = format!("{TOOL_CALLS_PREFIX}garbage");
        let m = memory_to_message(&mem(MemoryRole::Assistant, &content));
        assert_eq!(m.content, content);
        assert!(m.tool_calls.is_empty());
    }

    #[test]
    fn memory_to_message_tool_role_sets_call_id() {
        let content = encode_tool_result("c1", "result text");
        let m = memory_to_message(&mem(MemoryRole::Tool, &content));
        assert_eq!(m.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(m.content, "result text");
    }
}
