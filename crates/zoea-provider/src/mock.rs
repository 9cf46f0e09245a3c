// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::provider::Provider;
use crate::types::{ChatReply, Message, ToolSpec};

/// A pre-scripted provider. Each call to `chat`/`chat_with_tools` pops the
/// next reply from the front of the queue, so tests can script exact turn
/// sequences — including tool calls — with no network access.
pub struct MockProvider {
    scripts: Arc<Mutex<Vec<ChatReply>>>,
    /// The last request seen by this mock, recorded for assertions.
    pub last_messages: Arc<Mutex<Option<Vec<Message>>>>,
}

impl MockProvider {
    pub fn new(scripts: Vec<ChatReply>) -> Self {
        Self { scripts: Arc::new(Mutex::new(scripts)), last_messages: Arc::new(Mutex::new(None)) }
    }

    /// Convenience: always replies with the same plain text.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![ChatReply { content: reply.into(), ..Default::default() }])
    }

    /// Convenience: one tool call followed by a final text reply.
    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        args_json: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            ChatReply {
                content: String::new(),
                reasoning: String::new(),
                tool_calls: vec![crate::types::ToolCall {
                    id: tool_id.into(),
                    name: tool_name.into(),
                    arguments: args_json.into(),
                }],
            },
            ChatReply { content: final_text.into(), ..Default::default() },
        ])
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }
    fn model(&self) -> &str {
        "mock-model"
    }

    async fn chat(&self, messages: &[Message]) -> Result<ChatReply, ProviderError> {
        self.chat_with_tools(messages, &[]).await
    }

    async fn chat_with_tools(
        &self,
        messages: &[Message],
        _tools: &[ToolSpec],
    ) -> Result<ChatReply, ProviderError> {
        *self.last_messages.lock().unwrap() = Some(messages.to_vec());
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.is_empty() {
            Ok(ChatReply { content: "[no more scripts]".into(), ..Default::default() })
        } else {
            Ok(scripts.remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_text_returns_the_configured_reply() {
        let p = MockProvider::always_text("hello world");
        let reply = p.chat(&[Message::user("hi")]).await.unwrap();
        assert_eq!(reply.content, "hello world");
    }

    #[tokio::test]
    async fn tool_then_text_returns_two_rounds_in_order() {
        let p = MockProvider::tool_then_text("c1", "look", "{}", "done");
        let first = p.chat(&[Message::user("hi")]).await.unwrap();
        assert_eq!(first.tool_calls.len(), 1);
        assert_eq!(first.tool_calls[0].name, "look");

        let second = p.chat(&[Message::user("hi")]).await.unwrap();
        assert_eq!(second.content, "done");
    }

    #[tokio::test]
    async fn exhausted_scripts_fall_back_to_placeholder() {
        let p = MockProvider::new(vec![]);
        let reply = p.chat(&[]).await.unwrap();
        assert_eq!(reply.content, "[no more scripts]");
    }

    #[tokio::test]
    async fn records_last_messages_seen() {
        let p = MockProvider::always_text("x");
        p.chat(&[Message::user("remember me")]).await.unwrap();
        let last = p.last_messages.lock().unwrap().clone().unwrap();
        assert_eq!(last[0].content, "remember me");
    }
}
