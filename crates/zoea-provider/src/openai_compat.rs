// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Strict OpenAI Chat Completions wire format.
//!
//! This module and [`crate::flexible`] are kept non-overlapping by design:
//! neither calls into the other's helpers. A mysis bound to an
//! OpenAI-compatible provider always goes through [`build_request_body`] and
//! [`parse_response`] here; a mysis bound to a flexible/Ollama-like provider
//! never does.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::provider::Provider;
use crate::rate_limit::RateLimiter;
use crate::types::{ChatReply, Message, Role, ToolCall, ToolSpec};

/// How the API key is attached to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    Bearer,
    ApiKeyHeader,
    None,
}

pub struct OpenAICompatProvider {
    provider_name: String,
    model: String,
    temperature: f32,
    chat_url: String,
    api_key: Option<String>,
    auth_style: AuthStyle,
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl OpenAICompatProvider {
    pub fn new(
        provider_name: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        base_url: &str,
        api_key: Option<String>,
        auth_style: AuthStyle,
        limiter: RateLimiter,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            provider_name: provider_name.into(),
            model: model.into(),
            temperature,
            chat_url: format!("{base}/chat/completions"),
            api_key,
            auth_style,
            client: reqwest::Client::new(),
            limiter,
        }
    }

    async fn send(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<ChatReply, ProviderError> {
        self.limiter.wait().await;

        let hoisted = hoist_system_messages(messages);
        let wire_messages = build_wire_messages(&hoisted);
        let body = build_request_body(&self.model, self.temperature, &wire_messages, tools);

        debug!(provider = %self.provider_name, model = %self.model, tools = tools.len(), "sending chat completion");

        let mut req = self.client.post(&self.chat_url).json(&body);
        req = match self.auth_style {
            AuthStyle::Bearer => {
                let key = self
                    .api_key
                    .as_deref()
                    .ok_or_else(|| ProviderError::Unauthorized("no api key configured".into()))?;
                req.bearer_auth(key)
            }
            AuthStyle::ApiKeyHeader => {
                let key = self
                    .api_key
                    .as_deref()
                    .ok_or_else(|| ProviderError::Unauthorized("no api key configured".into()))?;
                req.header("api-key", key)
            }
            AuthStyle::None => req,
        };

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &text));
        }

        let body: Value = resp.json().await.map_err(|e| ProviderError::ProtocolError(e.to_string()))?;
        parse_response(&body)
    }
}

#[async_trait]
impl Provider for OpenAICompatProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[Message]) -> Result<ChatReply, ProviderError> {
        self.send(messages, &[]).await
    }

    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ChatReply, ProviderError> {
        self.send(messages, tools).await
    }
}

/// Merge every system message into one at index 0; append a synthetic
/// `{role: user, content: "Begin."}` if nothing non-system remains.
pub fn hoist_system_messages(messages: &[Message]) -> Vec<Message> {
    let mut system_text = String::new();
    let mut rest: Vec<Message> = Vec::with_capacity(messages.len());

    for m in messages {
        if m.role == Role::System {
            if !system_text.is_empty() {
                system_text.push_str("\n\n");
            }
            system_text.push_str(&m.content);
        } else {
            rest.push(m.clone());
        }
    }

    let mut out = Vec::with_capacity(rest.len() + 2);
    if !system_text.is_empty() {
        out.push(Message::system(system_text));
    }
    if rest.is_empty() {
        out.push(Message::user("Begin."));
    } else {
        out.extend(rest);
    }
    out
}

/// Convert canonical messages to OpenAI wire JSON, rewriting malformed tool
/// call argument JSON to `{}` and logging it.
fn build_wire_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            if m.role == Role::Assistant && !m.tool_calls.is_empty() {
                let calls: Vec<Value> = m
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        let args = if serde_json::from_str::<Value>(&tc.arguments).is_ok() {
                            tc.arguments.clone()
                        } else {
                            warn!(tool_call_id = %tc.id, raw = %tc.arguments, "invalid tool-call argument JSON, rewriting to {{}}");
                            "{}".to_string()
                        };
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": { "name": tc.name, "arguments": args },
                        })
                    })
                    .collect();
                let mut v = json!({ "role": "assistant", "tool_calls": calls });
                if !m.content.is_empty() {
                    v["content"] = json!(m.content);
                }
                v
            } else if m.role == Role::Tool {
                json!({
                    "role": "tool",
                    "tool_call_id": m.tool_call_id.clone().unwrap_or_default(),
                    "content": m.content,
                })
            } else {
                json!({ "role": role_str(m.role), "content": m.content })
            }
        })
        .collect()
}

fn role_str(r: Role) -> &'static str {
    match r {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn build_request_body(model: &str, temperature: f32, messages: &[Value], tools: &[ToolSpec]) -> Value {
    let mut body = json!({
        "model": model,
        "messages": messages,
        "temperature": temperature,
        "stream": false,
    });
    if !tools.is_empty() {
        let wire_tools: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.json_schema,
                    }
                })
            })
            .collect();
        body["tools"] = json!(wire_tools);
    }
    body
}

/// Parse a non-streaming `/chat/completions` response body.
pub fn parse_response(body: &Value) -> Result<ChatReply, ProviderError> {
    let message = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| ProviderError::ProtocolError("missing choices[0].message".into()))?;

    let content = message.get("content").and_then(|c| c.as_str()).unwrap_or("").to_string();
    let reasoning = message
        .get("reasoning_content")
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string();

    let tool_calls = message
        .get("tool_calls")
        .and_then(|tc| tc.as_array())
        .map(|arr| {
            arr.iter()
                .map(|tc| ToolCall {
                    id: tc.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    name: tc
                        .get("function")
                        .and_then(|f| f.get("name"))
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    arguments: tc
                        .get("function")
                        .and_then(|f| f.get("arguments"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("{}")
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ChatReply { content, reasoning, tool_calls })
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── System hoisting ──────────────────────────────────────────────────────

    #[test]
    fn hoist_merges_multiple_system_messages_in_order() {
        let msgs = vec![
            Message::system("first"),
            Message::user("hi"),
            Message::system("second"),
        ];
        let hoisted = hoist_system_messages(&msgs);
        assert_eq!(hoisted[0].role, Role::System);
        assert_eq!(hoisted[0].content, "first\n\nsecond");
        assert_eq!(hoisted[1].role, Role::User);
        assert_eq!(hoisted.len(), 2);
    }

    #[test]
    fn hoist_appends_begin_when_no_non_system_message() {
        let msgs = vec![Message::system("sys only")];
        let hoisted = hoist_system_messages(&msgs);
        assert_eq!(hoisted.len(), 2);
        assert_eq!(hoisted[1].role, Role::User);
        assert_eq!(hoisted[1].content, "Begin.");
    }

    #[test]
    fn hoist_no_system_messages_is_unaffected() {
        let msgs = vec![Message::user("hi"), Message::assistant("hello")];
        let hoisted = hoist_system_messages(&msgs);
        assert_eq!(hoisted.len(), 2);
        assert_eq!(hoisted[0].role, Role::User);
    }

    #[test]
    fn hoist_preserves_non_system_order() {
        let msgs = vec![
            Message::system("s"),
            Message::user("u1"),
            Message::assistant("a1"),
            Message::user("u2"),
        ];
        let hoisted = hoist_system_messages(&msgs);
        assert_eq!(hoisted.len(), 4);
        assert_eq!(hoisted[1].content, "u1");
        assert_eq!(hoisted[2].content, "a1");
        assert_eq!(hoisted[3].content, "u2");
    }

    // ── Wire message building ────────────────────────────────────────────────

    #[test]
    fn invalid_tool_argument_json_rewritten_to_empty_object() {
        let msgs = vec![Message::assistant_with_tool_calls(
            "",
            vec![ToolCall { id: "c1".into(), name: "look".into(), arguments: "{not json".into() }],
        )];
        let wire = build_wire_messages(&msgs);
        assert_eq!(wire[0]["tool_calls"][0]["function"]["arguments"], "{}");
    }

    #[test]
    fn valid_tool_argument_json_passed_through() {
        let msgs = vec![Message::assistant_with_tool_calls(
            "",
            vec![ToolCall { id: "c1".into(), name: "look".into(), arguments: r#"{"x":1}"#.into() }],
        )];
        let wire = build_wire_messages(&msgs);
        assert_eq!(wire[0]["tool_calls"][0]["function"]["arguments"], r#"{"x":1}"#);
    }

    #[test]
    fn tool_result_message_carries_tool_call_id() {
        let msgs = vec![Message::tool_result("c1", "output")];
        let wire = build_wire_messages(&msgs);
        assert_eq!(wire[0]["role"], "tool");
        assert_eq!(wire[0]["tool_call_id"], "c1");
        assert_eq!(wire[0]["content"], "output");
    }

    #[test]
    fn request_body_sets_stream_false() {
        let body = build_request_body("gpt-4o-mini", 0.7, &[], &[]);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn request_body_omits_tools_key_when_empty() {
        let body = build_request_body("gpt-4o-mini", 0.7, &[], &[]);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn request_body_includes_tools_when_present() {
        let tools = vec![ToolSpec {
            name: "look".into(),
            description: "look around".into(),
            json_schema: json!({"type": "object"}),
        }];
        let body = build_request_body("gpt-4o-mini", 0.7, &[], &tools);
        assert_eq!(body["tools"][0]["function"]["name"], "look");
    }

    // ── Response parsing ──────────────────────────────────────────────────────

    #[test]
    fn parse_response_extracts_content() {
        let body = json!({"choices": [{"message": {"content": "hello"}}]});
        let reply = parse_response(&body).unwrap();
        assert_eq!(reply.content, "hello");
        assert!(reply.tool_calls.is_empty());
    }

    #[test]
    fn parse_response_extracts_tool_calls() {
        let body = json!({"choices": [{"message": {
            "content": "",
            "tool_calls": [{"id": "c1", "function": {"name": "look", "arguments": "{}"}}]
        }}]});
        let reply = parse_response(&body).unwrap();
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "look");
    }

    #[test]
    fn parse_response_extracts_reasoning_content() {
        let body = json!({"choices": [{"message": {"content": "x", "reasoning_content": "thinking"}}]});
        let reply = parse_response(&body).unwrap();
        assert_eq!(reply.reasoning, "thinking");
    }

    #[test]
    fn parse_response_missing_choices_is_protocol_error() {
        let body = json!({});
        assert!(matches!(parse_response(&body), Err(ProviderError::ProtocolError(_))));
    }
}
