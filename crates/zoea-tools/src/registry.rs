// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Fuses upstream-discovered tools with the fixed orchestrator tool set into
//! the one list advertised to the provider.

use std::sync::Arc;
use std::time::Instant;

use tracing::warn;

use crate::client::ToolClient;
use crate::error::ToolError;
use crate::executor::ToolExecutor;
use crate::orchestrator::{self, OrchestratorBackend};
use crate::types::{ToolCall, ToolOutput, ToolSpec};

pub struct ToolRegistry {
    client: Arc<dyn ToolClient>,
    executor: ToolExecutor,
    backend: Arc<dyn OrchestratorBackend>,
}

impl ToolRegistry {
    pub fn new(client: Arc<dyn ToolClient>, backend: Arc<dyn OrchestratorBackend>) -> Self {
        Self { executor: ToolExecutor::new(client.clone()), client, backend }
    }

    /// The combined schema list sent to the provider: upstream tools plus
    /// the orchestrator set, with orchestrator names winning any collision.
    pub async fn schemas(&self) -> Result<Vec<ToolSpec>, ToolError> {
        let upstream = self.client.list_tools().await?;
        let mut merged: Vec<ToolSpec> =
            upstream.into_iter().filter(|t| !orchestrator::is_orchestrator_tool(&t.name)).collect();
        merged.extend(orchestrator::orchestrator_tool_specs());
        Ok(merged)
    }

    /// Execute `call` on behalf of `calling_mysis_id`, dispatching to the
    /// orchestrator backend when the name is reserved, else to the upstream
    /// tool executor. Always returns exactly one [`ToolOutput`].
    pub async fn execute(&self, calling_mysis_id: &str, call: &ToolCall, turn_deadline: Instant) -> ToolOutput {
        if let Some(output) = orchestrator::dispatch(self.backend.as_ref(), calling_mysis_id, call).await {
            return output;
        }
        self.executor.execute(call, turn_deadline).await
    }

    pub async fn close(&self) {
        self.client.close().await;
    }
}
