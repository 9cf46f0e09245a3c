// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Invokes the upstream [`ToolClient`], applying a per-call timeout and a
//! jittered retry policy, and guaranteeing exactly one [`ToolOutput`] per
//! [`ToolCall`] regardless of outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::warn;

use crate::client::ToolClient;
use crate::error::ToolError;
use crate::types::{ToolCall, ToolOutput};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

pub struct ToolExecutor {
    client: Arc<dyn ToolClient>,
    call_timeout: Duration,
    max_retries: u32,
}

impl ToolExecutor {
    pub fn new(client: Arc<dyn ToolClient>) -> Self {
        Self { client, call_timeout: DEFAULT_CALL_TIMEOUT, max_retries: DEFAULT_MAX_RETRIES }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Execute `call`, retrying transient failures up to `max_retries` times
    /// with jittered backoff, never running past `turn_deadline`. Always
    /// returns a [`ToolOutput`] tagged with `call.id` — on terminal failure
    /// its content is the `"Error: <classification>: <message>"` payload. A
    /// retriable failure that exhausts its retries (or would run past the
    /// deadline) escalates; a non-retriable upstream error payload does not.
    pub async fn execute(&self, call: &ToolCall, turn_deadline: Instant) -> ToolOutput {
        let mut attempt = 0;
        loop {
            let outcome = self.call_once(call).await;
            match outcome {
                Ok(value) => {
                    let content = serde_json::to_string(&value).unwrap_or_else(|_| value.to_string());
                    return ToolOutput::ok(&call.id, content);
                }
                Err(err) if err.is_retriable() && attempt < self.max_retries => {
                    let delay = backoff_delay(attempt);
                    if Instant::now() + delay >= turn_deadline {
                        warn!(tool = %call.name, attempt, "retry would exceed turn deadline, giving up");
                        return ToolOutput::err_escalate(&call.id, err.as_tool_result_text());
                    }
                    warn!(tool = %call.name, attempt, delay_ms = delay.as_millis() as u64, "retrying transient tool failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_retriable() => return ToolOutput::err_escalate(&call.id, err.as_tool_result_text()),
                Err(err) => return ToolOutput::err(&call.id, err.as_tool_result_text()),
            }
        }
    }

    async fn call_once(&self, call: &ToolCall) -> Result<serde_json::Value, ToolError> {
        match tokio::time::timeout(self.call_timeout, self.client.call(&call.name, &call.args)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(self.call_timeout)),
        }
    }
}

/// Exponential backoff with full jitter, capped at [`MAX_BACKOFF`].
fn backoff_delay(attempt: u32) -> Duration {
    let cap = BASE_BACKOFF.saturating_mul(1 << attempt.min(8)).min(MAX_BACKOFF);
    let jittered_ms = rand::thread_rng().gen_range(0..=cap.as_millis() as u64);
    Duration::from_millis(jittered_ms)
}
