// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommanderError {
    #[error("mysis not found: {0}")]
    NotFound(String),

    #[error("mysis name already in use: {0}")]
    DuplicateName(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("swarm is at capacity ({0} myses)")]
    AtCapacity(usize),

    #[error("store error: {0}")]
    Store(#[from] zoea_store::StoreError),

    #[error("mysis error: {0}")]
    Mysis(#[from] zoea_mysis::MysisError),
}
