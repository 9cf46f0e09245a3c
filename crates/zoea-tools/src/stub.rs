// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! An in-memory [`ToolClient`] substituted for the real upstream connection
//! when the host is run with `--offline`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::ToolClient;
use crate::error::ToolError;
use crate::types::ToolSpec;

/// Always answers every call with a fixed JSON value (or the default
/// `{"ok": true}` if none is scripted for that tool name), and advertises a
/// fixed, caller-supplied set of tool schemas.
pub struct StubToolClient {
    specs: Vec<ToolSpec>,
    responses: Mutex<HashMap<String, Value>>,
}

impl StubToolClient {
    pub fn new(specs: Vec<ToolSpec>) -> Self {
        Self { specs, responses: Mutex::new(HashMap::new()) }
    }

    /// Script a canned reply for a specific tool name.
    pub fn with_response(self, name: impl Into<String>, value: Value) -> Self {
        self.responses.lock().unwrap().insert(name.into(), value);
        self
    }
}

#[async_trait]
impl ToolClient for StubToolClient {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
        Ok(self.specs.clone())
    }

    async fn call(&self, name: &str, _args: &Value) -> Result<Value, ToolError> {
        let responses = self.responses.lock().unwrap();
        Ok(responses.get(name).cloned().unwrap_or_else(|| json!({"ok": true, "stub": true})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> ToolSpec {
        ToolSpec { name: name.into(), description: String::new(), json_schema: json!({}) }
    }

    #[tokio::test]
    async fn list_tools_returns_configured_specs() {
        let stub = StubToolClient::new(vec![spec("ship_snapshot")]);
        let tools = stub.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "ship_snapshot");
    }

    #[tokio::test]
    async fn call_without_script_returns_default_ok() {
        let stub = StubToolClient::new(vec![]);
        let result = stub.call("anything", &json!({})).await.unwrap();
        assert_eq!(result["ok"], true);
    }

    #[tokio::test]
    async fn call_with_script_returns_scripted_value() {
        let stub = StubToolClient::new(vec![]).with_response("ship_snapshot", json!({"hull": 100}));
        let result = stub.call("ship_snapshot", &json!({})).await.unwrap();
        assert_eq!(result["hull"], 100);
    }
}
