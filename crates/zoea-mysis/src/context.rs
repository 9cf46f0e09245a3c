// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Builds the bounded, protocol-valid message slice sent to the provider for
//! the next turn. Deterministic and pure over store reads: given the same
//! stored memories it always produces the same output.

use std::collections::{HashMap, HashSet};

use zoea_provider::Message;
use zoea_store::{Memory, MemoryRole, MemorySource, Store, StoreError};

use crate::codec::memory_to_message;

pub const DEFAULT_MAX_CONTEXT_MESSAGES: usize = 20;

/// Tool names whose results are compaction candidates: only the newest
/// result per name is kept in a context window.
pub const SNAPSHOT_TOOL_NAMES: &[&str] =
    &["ship_snapshot", "system_snapshot", "cargo_snapshot", "nearby_snapshot", "list_myses", "swarm_status"];

pub const SYNTHETIC_NUDGE_TEXT: &str = "continue";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSourceKind {
    Direct,
    CommanderBroadcast,
    SwarmBroadcast,
    SyntheticNudge,
}

pub struct ContextAssembler {
    max_context_messages: usize,
}

impl ContextAssembler {
    pub fn new(max_context_messages: usize) -> Self {
        Self { max_context_messages }
    }

    /// Assemble `([Message], prompt_source_kind)` for `mysis_id`'s next
    /// turn. When no fresh direct/broadcast memory falls in the window, a
    /// synthetic "continue" user message is appended — ephemeral, never
    /// persisted.
    pub async fn assemble(&self, store: &Store, mysis_id: &str) -> Result<(Vec<Message>, PromptSourceKind), StoreError> {
        let mut window = store.get_recent_memories(mysis_id, self.max_context_messages).await?;

        compact_snapshots(&mut window);
        remove_orphaned_tool_results(&mut window);

        let prompt_source = select_prompt_source(&window);

        ensure_system_prompt_first(store, mysis_id, &mut window).await?;

        let mut messages: Vec<Message> = window.iter().map(memory_to_message).collect();
        if prompt_source == PromptSourceKind::SyntheticNudge {
            messages.push(Message::user(SYNTHETIC_NUDGE_TEXT));
        }

        Ok((messages, prompt_source))
    }
}

/// For each memory that is a tool result of a declared snapshot tool, keep
/// only the newest occurrence per tool name. A result's tool name is
/// resolved by matching its `tool_call_id` back to the assistant memory
/// that produced it; unknown tool names are never compacted.
fn compact_snapshots(window: &mut Vec<Memory>) {
    let tool_name_by_call_id = assistant_tool_names(window);

    // newest-per-name: walk from the end (newest), remember which names
    // we've already kept one of, drop earlier duplicates.
    let mut kept_names: HashSet<String> = HashSet::new();
    let mut drop_indices: HashSet<usize> = HashSet::new();

    for (idx, mem) in window.iter().enumerate().rev() {
        if mem.role != MemoryRole::Tool {
            continue;
        }
        let Some(call_id) = mem.tool_call_id("::") else { continue };
        let Some(tool_name) = tool_name_by_call_id.get(call_id) else { continue };
        if !SNAPSHOT_TOOL_NAMES.contains(&tool_name.as_str()) {
            continue;
        }
        if !kept_names.insert(tool_name.clone()) {
            drop_indices.insert(idx);
        }
    }

    let mut i = 0;
    window.retain(|_| {
        let keep = !drop_indices.contains(&i);
        i += 1;
        keep
    });
}

/// Map every `tool_call_id` produced by an assistant memory in the window to
/// the tool name it called. A turn may request several tools at once, so
/// each assistant memory can contribute multiple ids.
fn assistant_tool_names(window: &[Memory]) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for mem in window {
        if mem.role != MemoryRole::Assistant {
            continue;
        }
        for tc in crate::codec::decode_tool_calls(&mem.content) {
            out.insert(tc.id, tc.name);
        }
    }
    out
}

/// Drop any `tool`-role memory whose id is not among the assistant tool
/// calls remaining in the window, and any malformed tool-result memory.
fn remove_orphaned_tool_results(window: &mut Vec<Memory>) {
    let valid_ids: HashSet<String> = window
        .iter()
        .filter(|m| m.role == MemoryRole::Assistant)
        .flat_map(|m| crate::codec::decode_tool_calls(&m.content))
        .map(|tc| tc.id)
        .collect();

    window.retain(|mem| {
        if mem.role != MemoryRole::Tool {
            return true;
        }
        match mem.tool_call_id("::") {
            Some(id) => valid_ids.contains(id),
            None => false,
        }
    });
}

/// Choose the single "prompt source" in strict priority order: most recent
/// commander direct message, else most recent commander broadcast, else
/// most recent swarm broadcast, else synthetic nudge.
fn select_prompt_source(window: &[Memory]) -> PromptSourceKind {
    if window.iter().rev().any(|m| m.source == MemorySource::Direct) {
        return PromptSourceKind::Direct;
    }
    if window.iter().rev().any(|m| m.source == MemorySource::Broadcast && m.sender_id.is_none()) {
        return PromptSourceKind::CommanderBroadcast;
    }
    if window.iter().rev().any(|m| m.source == MemorySource::Broadcast) {
        return PromptSourceKind::SwarmBroadcast;
    }
    PromptSourceKind::SyntheticNudge
}

async fn ensure_system_prompt_first(store: &Store, mysis_id: &str, window: &mut Vec<Memory>) -> Result<(), StoreError> {
    if window.first().map(|m| m.role == MemoryRole::System).unwrap_or(false) {
        return Ok(());
    }
    match store.get_system_memory(mysis_id).await {
        Ok(system) => {
            window.insert(0, system);
            Ok(())
        }
        Err(StoreError::NotFound(_)) => Ok(()),
        Err(e) => Err(e),
    }
}
