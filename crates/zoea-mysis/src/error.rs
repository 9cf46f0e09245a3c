// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Errors that can surface out of a single mysis turn. Mirrors the kinds
/// (not types) laid out for error propagation: the mysis runtime is the sole
/// authority that turns one of these into a state transition.
#[derive(Debug, Error)]
pub enum MysisError {
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("store error: {0}")]
    Store(#[from] zoea_store::StoreError),

    #[error("provider transient failure: {0}")]
    ProviderTransient(#[from] zoea_provider::ProviderError),

    #[error("no account available for provider {0}")]
    AccountUnavailable(String),

    #[error("mysis is {0:?}, cannot accept messages")]
    Rejected(zoea_store::MysisState),
}
