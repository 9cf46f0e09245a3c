// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Flexible (Ollama-like) wire format.
//!
//! Permits system messages anywhere in the conversation; consecutive system
//! messages are merged in place without reordering the rest of the
//! conversation. Kept entirely separate from [`crate::openai_compat`] — no
//! shared helpers, no shared types beyond the canonical [`Message`].

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::Provider;
use crate::rate_limit::RateLimiter;
use crate::types::{ChatReply, Message, Role, ToolCall, ToolSpec};

pub struct FlexibleProvider {
    provider_name: String,
    model: String,
    temperature: f32,
    chat_url: String,
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl FlexibleProvider {
    pub fn new(
        provider_name: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        base_url: &str,
        limiter: RateLimiter,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            provider_name: provider_name.into(),
            model: model.into(),
            temperature,
            chat_url: format!("{base}/api/chat"),
            client: reqwest::Client::new(),
            limiter,
        }
    }

    async fn send(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<ChatReply, ProviderError> {
        self.limiter.wait().await;

        let merged = merge_consecutive_system_messages(messages);
        let wire_messages = build_wire_messages(&merged);
        let body = build_request_body(&self.model, self.temperature, &wire_messages, tools);

        debug!(provider = %self.provider_name, model = %self.model, tools = tools.len(), "sending flexible chat request");

        let resp = self.client.post(&self.chat_url).json(&body).send().await?;
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
impl Provider for FlexibleProvider {
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

/// Merge runs of consecutive system messages into one, leaving every other
/// message (and the position of each run) untouched.
pub fn merge_consecutive_system_messages(messages: &[Message]) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::with_capacity(messages.len());
    for m in messages {
        if m.role == Role::System {
            if let Some(last) = out.last_mut() {
                if last.role == Role::System {
                    last.content.push_str("\n\n");
                    last.content.push_str(&m.content);
                    continue;
                }
            }
        }
        out.push(m.clone());
    }
    out
}

fn build_wire_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let mut v = json!({ "role": role_str(m.role), "content": m.content });
            if !m.tool_calls.is_empty() {
                let calls: Vec<Value> = m
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        let args: Value = serde_json::from_str(&tc.arguments).unwrap_or_else(|_| json!({}));
                        json!({ "function": { "name": tc.name, "arguments": args } })
                    })
                    .collect();
                v["tool_calls"] = json!(calls);
            }
            v
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
        "stream": false,
        "options": { "temperature": temperature },
    });
    if !tools.is_empty() {
        let wire_tools: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": { "name": t.name, "description": t.description, "parameters": t.json_schema },
                })
            })
            .collect();
        body["tools"] = json!(wire_tools);
    }
    body
}

/// Parse a non-streaming `/api/chat` response: `{"message": {...}, "done": true}`.
pub fn parse_response(body: &Value) -> Result<ChatReply, ProviderError> {
    let message = body
        .get("message")
        .ok_or_else(|| ProviderError::ProtocolError("missing message field".into()))?;

    let content = message.get("content").and_then(|c| c.as_str()).unwrap_or("").to_string();

    let tool_calls = message
        .get("tool_calls")
        .and_then(|tc| tc.as_array())
        .map(|arr| {
            arr.iter()
                .enumerate()
                .map(|(i, tc)| {
                    let function = tc.get("function");
                    let name = function
                        .and_then(|f| f.get("name"))
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let arguments = function
                        .and_then(|f| f.get("arguments"))
                        .map(|v| if v.is_string() { v.as_str().unwrap().to_string() } else { v.to_string() })
                        .unwrap_or_else(|| "{}".to_string());
                    // Ollama does not assign call ids; synthesize a stable one
                    // from the response ordinal.
                    ToolCall { id: format!("call_{i}"), name, arguments }
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ChatReply { content, reasoning: String::new(), tool_calls })
}

// ── Unit tests ────────────────────────────────────────────────────────────────
