// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The commander: fleet registry, lifecycle orchestration (create, start,
//! stop, message, broadcast), and the ordered shutdown sequence.

mod barrier;
mod error;
mod fleet;
mod shutdown;

pub use barrier::RunBarrier;
pub use error::CommanderError;
pub use fleet::{Commander, StateCounts};
pub use shutdown::ShutdownSequencer;
