// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Transient, non-persisted annotation of what a running mysis is doing
//! right now. Purely informational: per the concurrency model, activity
//! MUST NOT gate the nudge loop.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Idle,
    LlmCall,
    McpCall,
    Traveling,
    Mining,
    InCombat,
    Cooldown,
}

impl Activity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Idle => "idle",
            Activity::LlmCall => "llm_call",
            Activity::McpCall => "mcp_call",
            Activity::Traveling => "traveling",
            Activity::Mining => "mining",
            Activity::InCombat => "in_combat",
            Activity::Cooldown => "cooldown",
        }
    }
}
