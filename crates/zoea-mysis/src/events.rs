// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Event payloads a mysis publishes onto the shared [`zoea_bus::EventBus`].
//! Thin convenience constructors over [`zoea_bus::Event`]; the bus itself
//! only knows about `{kind, mysis_id, mysis_name, timestamp, payload}`.

use uuid::Uuid;
use zoea_bus::{Event, EventKind};

/// Mysis ids are UUID strings minted by the store; this never fails for an
/// id this crate produced itself, but falls back to nil rather than panic
/// if a foreign/malformed id ever reaches the event layer.
fn parse_mysis_id(mysis_id: &str) -> Uuid {
    Uuid::parse_str(mysis_id).unwrap_or(Uuid::nil())
}

pub fn state_changed(mysis_id: &str, mysis_name: &str, new_state: zoea_store::MysisState) -> Event {
    Event::new(EventKind::MysisStateChanged, parse_mysis_id(mysis_id), mysis_name)
        .with_payload(serde_json::json!({ "state": new_state.as_str() }))
}

pub fn mysis_error(mysis_id: &str, mysis_name: &str, message: &str) -> Event {
    Event::new(EventKind::MysisError, parse_mysis_id(mysis_id), mysis_name)
        .with_payload(serde_json::json!({ "message": message }))
}

pub fn mysis_response(mysis_id: &str, mysis_name: &str, content: &str) -> Event {
    Event::new(EventKind::MysisResponse, parse_mysis_id(mysis_id), mysis_name)
        .with_payload(serde_json::json!({ "content": content }))
}

pub fn mysis_message(mysis_id: &str, mysis_name: &str, content: &str) -> Event {
    Event::new(EventKind::MysisMessage, parse_mysis_id(mysis_id), mysis_name)
        .with_payload(serde_json::json!({ "content": content }))
}

pub fn network_busy(mysis_id: &str, mysis_name: &str) -> Event {
    Event::new(EventKind::NetworkBusy, parse_mysis_id(mysis_id), mysis_name)
}

pub fn network_idle(mysis_id: &str, mysis_name: &str) -> Event {
    Event::new(EventKind::NetworkIdle, parse_mysis_id(mysis_id), mysis_name)
}

pub fn rate_limit_hit(mysis_id: &str, mysis_name: &str) -> Event {
    Event::new(EventKind::RateLimitHit, parse_mysis_id(mysis_id), mysis_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_mysis_id_falls_back_to_nil_uuid() {
        let ev = network_busy("not-a-uuid", "alpha");
        assert_eq!(ev.mysis_id, Uuid::nil());
    }

    #[test]
    fn state_changed_carries_state_in_payload() {
        let ev = state_changed(&Uuid::new_v4().to_string(), "alpha", zoea_store::MysisState::Idle);
        assert_eq!(ev.payload["state"], "idle");
    }
}
