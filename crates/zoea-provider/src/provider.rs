// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{ChatReply, Message, ToolSpec};

/// An LLM backend bound to one `{provider, model, temperature}` triple.
///
/// Implementations share a [`crate::rate_limit::RateLimiter`] per provider
/// so every mysis using that provider draws from the same token bucket.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    /// Plain chat, no tool schemas offered.
    async fn chat(&self, messages: &[Message]) -> Result<ChatReply, ProviderError>;

    /// Chat with a tool schema list; the model may request zero or more tool calls.
    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ChatReply, ProviderError>;

    /// Release idle connections. Default no-op; HTTP-backed providers hold a
    /// pooled `reqwest::Client` that tears down naturally on drop, so only
    /// providers with explicit background resources need to override this.
    async fn close(&self) {}
}

/// Builds [`Provider`] instances for one named backend. Each mysis gets its
/// own `Provider` from `create`, but all instances for a provider name share
/// one rate limiter (constructed once by the factory and cloned in).
pub trait ProviderFactory: Send + Sync {
    fn name(&self) -> &str;
    fn create(&self, model: &str, temperature: f32) -> Box<dyn Provider>;
}
