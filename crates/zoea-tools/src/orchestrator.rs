// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Built-in fleet-operation tools, executed locally by whatever owns the
//! fleet (the commander) rather than dispatched upstream. Handlers must
//! complete quickly and must never call a [`Provider`](zoea_provider) —
//! they only read and write fleet state.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::types::{ToolCall, ToolOutput, ToolSpec};

/// Names reserved for orchestrator tools. A name collision with an upstream
/// tool resolves in favor of the orchestrator tool.
pub const ORCHESTRATOR_TOOL_NAMES: &[&str] = &[
    "swarm_status",
    "list_myses",
    "send_message",
    "broadcast",
    "search_messages",
    "search_broadcasts",
    "search_reasoning",
];

pub fn is_orchestrator_tool(name: &str) -> bool {
    ORCHESTRATOR_TOOL_NAMES.contains(&name)
}

#[derive(Debug, Clone, Default)]
pub struct SwarmStatus {
    pub running: u32,
    pub idle: u32,
    pub stopped: u32,
    pub errored: u32,
    pub total: u32,
    pub aggregate_tick: u64,
}

#[derive(Debug, Clone)]
pub struct MysisSummary {
    pub id: String,
    pub name: String,
}

/// Fleet-state operations backing the orchestrator tools. Implemented by
/// whatever owns the commander and store; this crate only defines the seam.
#[async_trait]
pub trait OrchestratorBackend: Send + Sync {
    async fn swarm_status(&self) -> SwarmStatus;
    async fn list_myses(&self) -> Vec<MysisSummary>;
    async fn send_message(&self, target_id: &str, content: &str) -> Result<(), ToolError>;
    /// `sender_id` is the calling mysis, supplied by the dispatcher — never
    /// part of the model-supplied arguments. Must not fail when the
    /// recipient set is empty.
    async fn broadcast(&self, sender_id: &str, content: &str) -> Result<(), ToolError>;
    async fn search_messages(&self, mysis_id: &str, query: &str, limit: usize) -> Result<Vec<String>, ToolError>;
    async fn search_broadcasts(&self, query: &str, limit: usize) -> Result<Vec<String>, ToolError>;
    async fn search_reasoning(&self, mysis_id: &str, query: &str, limit: usize) -> Result<Vec<String>, ToolError>;
}

pub fn orchestrator_tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "swarm_status".into(),
            description: "Fleet-wide counts by mysis state, plus the current aggregate tick.".into(),
            json_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolSpec {
            name: "list_myses".into(),
            description: "List every mysis in the fleet as {id, name} pairs.".into(),
            json_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolSpec {
            name: "send_message".into(),
            description: "Send a direct message to one mysis.".into(),
            json_schema: json!({
                "type": "object",
                "properties": {
                    "target_id": { "type": "string" },
                    "content": { "type": "string" },
                },
                "required": ["target_id", "content"],
            }),
        },
        ToolSpec {
            name: "broadcast".into(),
            description: "Broadcast a message to every other running mysis.".into(),
            json_schema: json!({
                "type": "object",
                "properties": { "content": { "type": "string" } },
                "required": ["content"],
            }),
        },
        ToolSpec {
            name: "search_messages".into(),
            description: "Search one mysis's memory for a substring.".into(),
            json_schema: json!({
                "type": "object",
                "properties": {
                    "mysis_id": { "type": "string" },
                    "query": { "type": "string" },
                    "limit": { "type": "integer" },
                },
                "required": ["mysis_id", "query"],
            }),
        },
        ToolSpec {
            name: "search_broadcasts".into(),
            description: "Search the broadcast audit log for a substring.".into(),
            json_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "limit": { "type": "integer" },
                },
                "required": ["query"],
            }),
        },
        ToolSpec {
            name: "search_reasoning".into(),
            description: "Search one mysis's stored reasoning traces for a substring.".into(),
            json_schema: json!({
                "type": "object",
                "properties": {
                    "mysis_id": { "type": "string" },
                    "query": { "type": "string" },
                    "limit": { "type": "integer" },
                },
                "required": ["mysis_id", "query"],
            }),
        },
    ]
}

const DEFAULT_SEARCH_LIMIT: usize = 20;

fn limit_arg(args: &Value) -> usize {
    args.get("limit").and_then(Value::as_u64).map(|n| n as usize).unwrap_or(DEFAULT_SEARCH_LIMIT)
}

fn string_arg(args: &Value, key: &str) -> Result<String, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ToolError::Terminal(format!("missing required argument: {key}")))
}

/// Dispatch `call` if its name is one of [`ORCHESTRATOR_TOOL_NAMES`];
/// `calling_mysis_id` is the mysis whose turn produced this call, used as
/// the sender for `broadcast`. Returns `None` for any other tool name so
/// the caller can fall through to the upstream `ToolClient`.
pub async fn dispatch(
    backend: &dyn OrchestratorBackend,
    calling_mysis_id: &str,
    call: &ToolCall,
) -> Option<ToolOutput> {
    if !is_orchestrator_tool(&call.name) {
        return None;
    }
    Some(dispatch_known(backend, calling_mysis_id, call).await)
}

async fn dispatch_known(backend: &dyn OrchestratorBackend, calling_mysis_id: &str, call: &ToolCall) -> ToolOutput {
    match run(backend, calling_mysis_id, call).await {
        Ok(value) => ToolOutput::ok(&call.id, value.to_string()),
        Err(err) => ToolOutput::err(&call.id, err.as_tool_result_text()),
    }
}

async fn run(backend: &dyn OrchestratorBackend, calling_mysis_id: &str, call: &ToolCall) -> Result<Value, ToolError> {
    match call.name.as_str() {
        "swarm_status" => {
            let status = backend.swarm_status().await;
            Ok(json!({
                "running": status.running,
                "idle": status.idle,
                "stopped": status.stopped,
                "errored": status.errored,
                "total": status.total,
                "aggregate_tick": status.aggregate_tick,
            }))
        }
        "list_myses" => {
            let myses = backend.list_myses().await;
            Ok(json!(myses.into_iter().map(|m| json!({ "id": m.id, "name": m.name })).collect::<Vec<_>>()))
        }
        "send_message" => {
            let target_id = string_arg(&call.args, "target_id")?;
            let content = string_arg(&call.args, "content")?;
            backend.send_message(&target_id, &content).await?;
            Ok(json!({ "sent": true }))
        }
        "broadcast" => {
            let content = string_arg(&call.args, "content")?;
            backend.broadcast(calling_mysis_id, &content).await?;
            Ok(json!({ "broadcast": true }))
        }
        "search_messages" => {
            let mysis_id = string_arg(&call.args, "mysis_id")?;
            let query = string_arg(&call.args, "query")?;
            let hits = backend.search_messages(&mysis_id, &query, limit_arg(&call.args)).await?;
            Ok(json!(hits))
        }
        "search_broadcasts" => {
            let query = string_arg(&call.args, "query")?;
            let hits = backend.search_broadcasts(&query, limit_arg(&call.args)).await?;
            Ok(json!(hits))
        }
        "search_reasoning" => {
            let mysis_id = string_arg(&call.args, "mysis_id")?;
            let query = string_arg(&call.args, "query")?;
            let hits = backend.search_reasoning(&mysis_id, &query, limit_arg(&call.args)).await?;
            Ok(json!(hits))
        }
        other => Err(ToolError::Fatal(format!("unreachable: not an orchestrator tool: {other}"))),
    }
}
