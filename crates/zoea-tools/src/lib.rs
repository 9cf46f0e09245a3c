// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Tool execution against the opaque upstream game RPC, with timeout and
//! retry, plus the fixed set of local orchestrator (fleet) tools.

pub mod client;
pub mod error;
pub mod executor;
pub mod http;
pub mod orchestrator;
pub mod registry;
pub mod stub;
pub mod types;

pub use client::ToolClient;
pub use error::ToolError;
pub use executor::ToolExecutor;
pub use http::HttpToolClient;
pub use orchestrator::{is_orchestrator_tool, MysisSummary, OrchestratorBackend, SwarmStatus, ORCHESTRATOR_TOOL_NAMES};
pub use registry::ToolRegistry;
pub use stub::StubToolClient;
pub use types::{ToolCall, ToolOutput, ToolSpec};
