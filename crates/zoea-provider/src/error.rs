// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Classified provider failure. Only the first three variants are retriable
/// by callers (`ToolExecutor`, the turn loop).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("rate limited")]
    RateLimited,

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("fatal provider error: {0}")]
    Fatal(String),
}

impl ProviderError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ProviderError::TransientNetwork(_) | ProviderError::RateLimited | ProviderError::Timeout(_)
        )
    }

    /// Classify an HTTP status code + optional body text into the taxonomy.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if status.as_u16() == 429 {
            ProviderError::RateLimited
        } else if status.as_u16() == 401 || status.as_u16() == 403 {
            ProviderError::Unauthorized(body.to_string())
        } else if status.is_server_error() {
            ProviderError::TransientNetwork(format!("{status}: {body}"))
        } else {
            ProviderError::ProtocolError(format!("{status}: {body}"))
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout(std::time::Duration::from_secs(0))
        } else if e.is_connect() || e.is_request() {
            ProviderError::TransientNetwork(e.to_string())
        } else {
            ProviderError::ProtocolError(e.to_string())
        }
    }
}
