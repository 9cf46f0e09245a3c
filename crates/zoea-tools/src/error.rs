// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Classification of a [`crate::client::ToolClient`] call failure.
///
/// The variant name is used verbatim as `<classification>` in the
/// synthesized `"Error: <classification>: <message>"` tool-result payload,
/// so renaming a variant changes the wire text.
#[derive(Debug, Error, Clone)]
pub enum ToolError {
    #[error("TransientNetwork: {0}")]
    TransientNetwork(String),

    #[error("Timeout: call exceeded {0:?}")]
    Timeout(std::time::Duration),

    /// Upstream returned an explicit error payload. Not retried: the
    /// upstream has already answered, just with a failure.
    #[error("Terminal: {0}")]
    Terminal(String),

    #[error("Fatal: {0}")]
    Fatal(String),
}

impl ToolError {
    /// Only transient classifications are worth retrying.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ToolError::TransientNetwork(_) | ToolError::Timeout(_))
    }

    /// Render as the `"Error: <classification>: <message>"` tool-result text
    /// mandated for terminal tool-call failures.
    pub fn as_tool_result_text(&self) -> String {
        format!("Error: {self}")
    }
}
