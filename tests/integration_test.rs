// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! End-to-end tests exercising the commander, myses, bus and store together.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use zoea_bus::EventKind;
use zoea_commander::Commander;
use zoea_store::{MemoryRole, Store};
use zoea_tools::StubToolClient;

async fn commander() -> Arc<Commander> {
    let store = Store::open_in_memory().await.unwrap();
    let bus = zoea_bus::EventBus::default();
    let tool_client = Arc::new(StubToolClient::new(vec![]));
    Commander::new(store, bus, HashMap::new(), tool_client)
}

#[tokio::test]
async fn full_lifecycle_creates_starts_responds_and_stops() {
    let cmd = commander().await;
    let mut sub = cmd.event_bus().subscribe().await;

    let id = cmd.create_mysis("alpha", "mock", None).await.unwrap();
    cmd.start_mysis(&id).await.unwrap();
    cmd.send_message(&id, "hello fleet").await.unwrap();

    let saw_response = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = sub.rx.recv().await.expect("bus closed before a response arrived");
            if event.kind == EventKind::MysisResponse {
                return;
            }
        }
    })
    .await;
    assert!(saw_response.is_ok(), "expected a MysisResponse event within the deadline");

    cmd.stop_mysis(&id).await.unwrap();
    assert_eq!(cmd.state_counts().await.stopped, 1);

    let memories = cmd.store().get_memories_all(&id).await.unwrap();
    assert!(memories.iter().any(|m| m.role == MemoryRole::User && m.content == "hello fleet"));
    assert!(memories.iter().any(|m| m.role == MemoryRole::Assistant));
}

#[tokio::test]
async fn broadcast_reaches_every_other_running_mysis_but_not_the_sender() {
    let cmd = commander().await;
    let alpha = cmd.create_mysis("alpha", "mock", None).await.unwrap();
    let beta = cmd.create_mysis("beta", "mock", None).await.unwrap();
    cmd.start_mysis(&alpha).await.unwrap();
    cmd.start_mysis(&beta).await.unwrap();

    cmd.broadcast_to_all(&alpha, "heads up").await.unwrap();

    let beta_memories = cmd.store().get_memories_all(&beta).await.unwrap();
    assert!(beta_memories.iter().any(|m| m.role == MemoryRole::BroadcastNote && m.content == "heads up"));

    let alpha_memories = cmd.store().get_memories_all(&alpha).await.unwrap();
    assert!(!alpha_memories.iter().any(|m| m.role == MemoryRole::BroadcastNote));

    let audit = cmd.store().search_broadcasts("heads up", 10).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].sender_id, alpha);

    cmd.stop_all(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn broadcast_never_fails_when_nobody_is_running() {
    let cmd = commander().await;
    cmd.create_mysis("alpha", "mock", None).await.unwrap();
    cmd.broadcast_to_all("commander", "anyone there?").await.unwrap();
}

#[tokio::test]
async fn stopped_mysis_rejects_further_messages() {
    let cmd = commander().await;
    let id = cmd.create_mysis("alpha", "mock", None).await.unwrap();
    cmd.start_mysis(&id).await.unwrap();
    cmd.stop_mysis(&id).await.unwrap();

    let err = cmd.send_message(&id, "too late").await;
    assert!(err.is_err());
}

#[tokio::test]
async fn create_mysis_rejects_unknown_provider_without_touching_the_store() {
    let cmd = commander().await;
    let err = cmd.create_mysis("alpha", "nonexistent", None).await;
    assert!(err.is_err());
    assert!(cmd.store().list_myses().await.unwrap().is_empty());
}
