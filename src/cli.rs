// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use clap::Parser;

/// Local multi-agent swarm controller for autonomous game-playing myses.
#[derive(Debug, Parser)]
#[command(name = "zoea-nova", version, about)]
pub struct Cli {
    /// Explicit config file path, layered on top of the standard search path.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose (debug-level) logging to stderr.
    #[arg(long)]
    pub debug: bool,

    /// Run with a stub tool client and the mock provider only; no network calls.
    #[arg(long)]
    pub offline: bool,

    /// Auto-start every mysis loaded from the store, overriding `swarm.auto_start`.
    #[arg(long)]
    pub start_swarm: bool,
}
