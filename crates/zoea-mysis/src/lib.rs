// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! One long-running mysis: context assembly, the tool-calling turn loop, and
//! the nudge-driven state machine that decides when it runs at all.

mod activity;
mod codec;
mod context;
mod error;
mod events;
mod runtime;

pub use activity::Activity;
pub use codec::{decode_tool_calls, decode_tool_result, encode_tool_calls, encode_tool_result, memory_to_message};
pub use context::{ContextAssembler, PromptSourceKind, DEFAULT_MAX_CONTEXT_MESSAGES, SNAPSHOT_TOOL_NAMES};
pub use error::MysisError;
pub use runtime::{MysisConfig, MysisRuntime, IDLE_NUDGE_INTERVAL, LLM_CALL_TIMEOUT, STOP_TIMEOUT};
