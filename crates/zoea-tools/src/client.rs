// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The upstream game's tool surface, treated as an opaque RPC transport.
//! Concrete wire encoding is a host concern; this crate only needs a
//! call-in/call-out contract to execute against.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;
use crate::types::ToolSpec;

/// Transport to the upstream tool server. Implementations own the wire
/// protocol (HTTP, a local socket, whatever the host provides); the rest of
/// this crate only depends on this trait.
#[async_trait]
pub trait ToolClient: Send + Sync {
    /// List of tools currently offered by upstream, with their schemas.
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError>;

    /// Invoke `name` with `args`, returning upstream's raw JSON result.
    async fn call(&self, name: &str, args: &Value) -> Result<Value, ToolError>;

    /// Release any held resources (connections, sockets). Default no-op.
    async fn close(&self) {}
}
