// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! HTTP transport to the upstream game's tool RPC. Wire format is a flat
//! JSON-RPC-like POST: `{"jsonrpc": "2.0", "method": ..., "params": ...}`
//! over one endpoint, matching the upstream game's own convention rather
//! than inventing a bespoke one.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::ToolClient;
use crate::error::ToolError;
use crate::types::ToolSpec;

pub struct HttpToolClient {
    endpoint: String,
    protocol_version: String,
    client: reqwest::Client,
}

impl HttpToolClient {
    pub fn new(endpoint: impl Into<String>, protocol_version: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), protocol_version: protocol_version.into(), client: reqwest::Client::new() }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, ToolError> {
        let body = json!({
            "jsonrpc": "2.0",
            "protocol_version": self.protocol_version,
            "method": method,
            "params": params,
        });

        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let value: Value = resp.json().await.map_err(|e| ToolError::Fatal(e.to_string()))?;
        if let Some(err) = value.get("error") {
            return Err(ToolError::Terminal(err.to_string()));
        }
        Ok(value.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ToolClient for HttpToolClient {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
        let result = self.rpc("list_tools", json!({})).await?;
        let entries = result.as_array().ok_or_else(|| ToolError::Fatal("list_tools: expected array".into()))?;
        entries
            .iter()
            .map(|e| {
                Ok(ToolSpec {
                    name: e.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                    description: e.get("description").and_then(Value::as_str).unwrap_or_default().to_string(),
                    json_schema: e.get("json_schema").cloned().unwrap_or(json!({})),
                })
            })
            .collect()
    }

    async fn call(&self, name: &str, args: &Value) -> Result<Value, ToolError> {
        self.rpc(name, args.clone()).await
    }
}

fn classify_status(status: reqwest::StatusCode, body: &str) -> ToolError {
    if status.as_u16() == 429 || status.is_server_error() {
        ToolError::TransientNetwork(format!("{status}: {body}"))
    } else {
        ToolError::Fatal(format!("{status}: {body}"))
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ToolError::Timeout(std::time::Duration::from_secs(0))
        } else if e.is_connect() || e.is_request() {
            ToolError::TransientNetwork(e.to_string())
        } else {
            ToolError::Fatal(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_5xx_as_transient() {
        assert!(matches!(classify_status(reqwest::StatusCode::BAD_GATEWAY, ""), ToolError::TransientNetwork(_)));
    }

    #[test]
    fn classify_429_as_transient() {
        assert!(matches!(classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS, ""), ToolError::TransientNetwork(_)));
    }

    #[test]
    fn classify_4xx_other_as_fatal() {
        assert!(matches!(classify_status(reqwest::StatusCode::BAD_REQUEST, ""), ToolError::Fatal(_)));
    }
}
