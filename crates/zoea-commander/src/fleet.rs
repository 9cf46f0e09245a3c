// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The fleet registry: the commander's `myses` map, provider wiring, and the
//! orchestrator tool backend that executes against that same map.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use uuid::Uuid;

use zoea_bus::{Event, EventBus, EventKind};
use zoea_config::ProviderConfig;
use zoea_mysis::{MysisConfig, MysisRuntime};
use zoea_provider::SharedProviderRegistry;
use zoea_store::{MemorySource, MysisState, Store};
use zoea_tools::{MysisSummary, OrchestratorBackend, SwarmStatus, ToolError};

use crate::barrier::RunBarrier;
use crate::error::CommanderError;

type FleetMap = RwLock<HashMap<String, Arc<MysisRuntime>>>;

/// Shared fleet state, read by both [`Commander`]'s own operations and the
/// orchestrator tools executed inside a mysis's turn — both sides dispatch
/// against the same map, never a snapshot of it.
pub(crate) struct FleetBackend {
    pub(crate) fleet: Arc<FleetMap>,
    pub(crate) store: Store,
    pub(crate) bus: EventBus,
}

#[async_trait]
impl OrchestratorBackend for FleetBackend {
    async fn swarm_status(&self) -> SwarmStatus {
        let fleet = self.fleet.read().await;
        let mut status = SwarmStatus { total: fleet.len() as u32, ..Default::default() };
        for m in fleet.values() {
            match m.state() {
                MysisState::Idle => status.idle += 1,
                MysisState::Running => status.running += 1,
                MysisState::Stopped => status.stopped += 1,
                MysisState::Errored => status.errored += 1,
            }
            status.aggregate_tick = status.aggregate_tick.max(m.last_server_tick().max(0) as u64);
        }
        status
    }

    async fn list_myses(&self) -> Vec<MysisSummary> {
        self.fleet
            .read()
            .await
            .values()
            .map(|m| MysisSummary { id: m.id().to_string(), name: m.name().to_string() })
            .collect()
    }

    async fn send_message(&self, target_id: &str, content: &str) -> Result<(), ToolError> {
        let runtime = self
            .fleet
            .read()
            .await
            .get(target_id)
            .cloned()
            .ok_or_else(|| ToolError::Terminal(format!("no such mysis: {target_id}")))?;
        runtime
            .send_message_from(content, MemorySource::Direct, None)
            .await
            .map_err(|e| ToolError::Terminal(e.to_string()))
    }

    async fn broadcast(&self, sender_id: &str, content: &str) -> Result<(), ToolError> {
        broadcast_to_all(&self.fleet, &self.store, &self.bus, sender_id, content)
            .await
            .map_err(|e| ToolError::Terminal(e.to_string()))
    }

    async fn search_messages(&self, mysis_id: &str, query: &str, limit: usize) -> Result<Vec<String>, ToolError> {
        let hits = self
            .store
            .search_memories(mysis_id, query, limit)
            .await
            .map_err(|e| ToolError::Terminal(e.to_string()))?;
        Ok(hits.into_iter().map(|m| m.content).collect())
    }

    async fn search_broadcasts(&self, query: &str, limit: usize) -> Result<Vec<String>, ToolError> {
        let hits = self
            .store
            .search_broadcasts(query, limit)
            .await
            .map_err(|e| ToolError::Terminal(e.to_string()))?;
        Ok(hits.into_iter().map(|b| b.content).collect())
    }

    async fn search_reasoning(&self, mysis_id: &str, query: &str, limit: usize) -> Result<Vec<String>, ToolError> {
        let all = self
            .store
            .get_memories_all(mysis_id)
            .await
            .map_err(|e| ToolError::Terminal(e.to_string()))?;
        Ok(all
            .into_iter()
            .filter(|m| !m.reasoning.is_empty() && m.reasoning.contains(query))
            .map(|m| m.reasoning)
            .take(limit)
            .collect())
    }
}

/// Broadcasts `content` from `sender_id` to every other mysis currently
/// running, then records one audit row. Never fails on an empty recipient
/// set — only a store write failure is an error. Publishes a
/// `BroadcastDelivered` event per mysis the broadcast was actually queued to.
async fn broadcast_to_all(
    fleet: &Arc<FleetMap>,
    store: &Store,
    bus: &EventBus,
    sender_id: &str,
    content: &str,
) -> Result<(), zoea_store::StoreError> {
    let recipients: Vec<Arc<MysisRuntime>> = fleet
        .read()
        .await
        .values()
        .filter(|m| m.id() != sender_id && m.state() == MysisState::Running)
        .cloned()
        .collect();

    for runtime in recipients {
        match runtime.queue_broadcast(content, sender_id).await {
            Ok(()) => {
                let mysis_id = Uuid::parse_str(runtime.id()).unwrap_or(Uuid::nil());
                let event = Event::new(EventKind::BroadcastDelivered, mysis_id, runtime.name())
                    .with_payload(serde_json::json!({"sender_id": sender_id, "content": content}));
                bus.publish(event).await;
            }
            Err(e) => warn!(mysis = runtime.name(), error = %e, "failed to queue broadcast"),
        }
    }
    store.append_broadcast(sender_id, content).await?;
    Ok(())
}

/// Fleet owner: holds the mysis registry, provider and tool wiring, the
/// shutdown completion barrier, and the event bus reference.
pub struct Commander {
    fleet: Arc<FleetMap>,
    store: Store,
    bus: EventBus,
    provider_registry: SharedProviderRegistry,
    provider_configs: HashMap<String, ProviderConfig>,
    tool_registry: Arc<zoea_tools::ToolRegistry>,
    run_barrier: Arc<RunBarrier>,
}

impl Commander {
    pub fn new(
        store: Store,
        bus: EventBus,
        provider_configs: HashMap<String, ProviderConfig>,
        tool_client: Arc<dyn zoea_tools::ToolClient>,
    ) -> Arc<Self> {
        let fleet: Arc<FleetMap> = Arc::new(RwLock::new(HashMap::new()));
        let backend = Arc::new(FleetBackend { fleet: fleet.clone(), store: store.clone(), bus: bus.clone() });
        let tool_registry = Arc::new(zoea_tools::ToolRegistry::new(tool_client, backend));
        let provider_registry = Arc::new(zoea_provider::ProviderRegistry::new(provider_configs.clone()));

        Arc::new(Self {
            fleet,
            store,
            bus,
            provider_registry,
            provider_configs,
            tool_registry,
            run_barrier: Arc::new(RunBarrier::new()),
        })
    }

    pub fn tool_registry(&self) -> Arc<zoea_tools::ToolRegistry> {
        self.tool_registry.clone()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Reads all persisted mysis rows, instantiates a runtime per row in
    /// `idle`, and does not start any — `auto_start` decides whether the
    /// caller should follow up with `start_mysis` for each.
    pub async fn load(&self) -> Result<Vec<String>, CommanderError> {
        let rows = self.store.list_myses().await?;
        let mut ids = Vec::with_capacity(rows.len());
        let mut fleet = self.fleet.write().await;
        for row in rows {
            let config = MysisConfig {
                id: row.id.clone(),
                name: row.name.clone(),
                provider_name: row.provider.clone(),
                model: row.model.clone(),
                temperature: row.temperature,
            };
            let runtime = MysisRuntime::new(
                config,
                self.store.clone(),
                self.bus.clone(),
                self.provider_registry.clone(),
                self.tool_registry.clone(),
                MysisState::Idle,
            );
            ids.push(row.id.clone());
            fleet.insert(row.id, runtime);
        }
        Ok(ids)
    }

    /// Validates the provider, persists a new row, and registers a runtime
    /// in `idle`. `model`, if omitted, uses the provider's configured default.
    pub async fn create_mysis(&self, name: &str, provider_name: &str, model: Option<String>) -> Result<String, CommanderError> {
        {
            let fleet = self.fleet.read().await;
            if fleet.values().any(|m| m.name() == name) {
                return Err(CommanderError::DuplicateName(name.to_string()));
            }
        }

        let (default_model, temperature) = self.resolve_provider(provider_name)?;
        let model = model.unwrap_or(default_model);

        let row = self.store.create_mysis(name, provider_name, &model, temperature).await?;
        let config = MysisConfig {
            id: row.id.clone(),
            name: row.name.clone(),
            provider_name: row.provider.clone(),
            model: row.model.clone(),
            temperature: row.temperature,
        };
        let runtime = MysisRuntime::new(
            config,
            self.store.clone(),
            self.bus.clone(),
            self.provider_registry.clone(),
            self.tool_registry.clone(),
            MysisState::Idle,
        );
        self.fleet.write().await.insert(row.id.clone(), runtime);

        let mysis_id = Uuid::parse_str(&row.id).unwrap_or(Uuid::nil());
        self.bus.publish(Event::new(EventKind::MysisCreated, mysis_id, &row.name)).await;

        Ok(row.id)
    }

    fn resolve_provider(&self, provider_name: &str) -> Result<(String, f32), CommanderError> {
        if provider_name == "mock" {
            return Ok(("mock-model".to_string(), 0.0));
        }
        let cfg = self
            .provider_configs
            .get(provider_name)
            .ok_or_else(|| CommanderError::UnknownProvider(provider_name.to_string()))?;
        Ok((cfg.model.clone(), cfg.temperature))
    }

    async fn get(&self, id: &str) -> Result<Arc<MysisRuntime>, CommanderError> {
        self.fleet.read().await.get(id).cloned().ok_or_else(|| CommanderError::NotFound(id.to_string()))
    }

    pub async fn start_mysis(&self, id: &str) -> Result<(), CommanderError> {
        let runtime = self.get(id).await?;
        let barrier = self.run_barrier.clone();
        barrier.increment();
        let on_exit_barrier = barrier.clone();
        let on_exit: zoea_mysis::ExitCallback = Arc::new(move || on_exit_barrier.decrement());
        if let Err(e) = runtime.start(Some(on_exit)).await {
            barrier.decrement();
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn stop_mysis(&self, id: &str) -> Result<(), CommanderError> {
        let runtime = self.get(id).await?;
        runtime.stop().await?;
        Ok(())
    }

    /// Sends `Stop()` to every mysis, then waits on the run barrier with a
    /// bounded deadline. Logs and continues past a timeout rather than
    /// blocking shutdown indefinitely.
    pub async fn stop_all(&self, deadline: std::time::Duration) {
        let runtimes: Vec<Arc<MysisRuntime>> = self.fleet.read().await.values().cloned().collect();
        for runtime in runtimes {
            if let Err(e) = runtime.stop().await {
                warn!(mysis = runtime.name(), error = %e, "error stopping mysis during StopAll");
            }
        }
        if !self.run_barrier.wait_zero(deadline).await {
            warn!("StopAll timed out waiting for run loops to exit; continuing shutdown");
        } else {
            info!("all mysis run loops exited cleanly");
        }
    }

    /// Fire-and-forget wrapper over `Mysis.SendMessageFrom`; all state
    /// validation happens inside the mysis.
    pub async fn send_message(&self, id: &str, content: &str) -> Result<(), CommanderError> {
        let runtime = self.get(id).await?;
        runtime.send_message_from(content, MemorySource::Direct, None).await?;
        Ok(())
    }

    pub async fn broadcast_to_all(&self, sender_id: &str, content: &str) -> Result<(), CommanderError> {
        broadcast_to_all(&self.fleet, &self.store, &self.bus, sender_id, content).await?;
        Ok(())
    }

    pub async fn aggregate_tick(&self) -> i64 {
        self.fleet.read().await.values().map(|m| m.last_server_tick()).max().unwrap_or(0)
    }

    pub async fn state_counts(&self) -> StateCounts {
        let fleet = self.fleet.read().await;
        let mut counts = StateCounts::default();
        for m in fleet.values() {
            match m.state() {
                MysisState::Idle => counts.idle += 1,
                MysisState::Running => counts.running += 1,
                MysisState::Stopped => counts.stopped += 1,
                MysisState::Errored => counts.errored += 1,
            }
        }
        counts
    }

    pub async fn list_ids(&self) -> Vec<String> {
        self.fleet.read().await.keys().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub idle: u32,
    pub running: u32,
    pub stopped: u32,
    pub errored: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn commander() -> Arc<Commander> {
        let store = Store::open_in_memory().await.unwrap();
        let bus = EventBus::default();
        let tool_client = Arc::new(zoea_tools::StubToolClient::new(vec![]));
        Commander::new(store, bus, HashMap::new(), tool_client)
    }

    #[tokio::test]
    async fn create_mysis_with_mock_provider_registers_in_fleet() {
        let cmd = commander().await;
        let id = cmd.create_mysis("alpha", "mock", None).await.unwrap();
        assert_eq!(cmd.list_ids().await, vec![id]);
    }

    #[tokio::test]
    async fn create_mysis_duplicate_name_errors() {
        let cmd = commander().await;
        cmd.create_mysis("alpha", "mock", None).await.unwrap();
        let err = cmd.create_mysis("alpha", "mock", None).await.unwrap_err();
        assert!(matches!(err, CommanderError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn create_mysis_unknown_provider_errors() {
        let cmd = commander().await;
        let err = cmd.create_mysis("alpha", "nonexistent", None).await.unwrap_err();
        assert!(matches!(err, CommanderError::UnknownProvider(_)));
    }

    #[tokio::test]
    async fn start_stop_mysis_round_trips_state() {
        let cmd = commander().await;
        let id = cmd.create_mysis("alpha", "mock", None).await.unwrap();
        cmd.start_mysis(&id).await.unwrap();
        assert_eq!(cmd.state_counts().await, StateCounts { running: 1, ..Default::default() });
        cmd.stop_mysis(&id).await.unwrap();
        assert_eq!(cmd.state_counts().await, StateCounts { stopped: 1, ..Default::default() });
    }

    #[tokio::test]
    async fn broadcast_never_fails_with_zero_running_recipients() {
        let cmd = commander().await;
        cmd.create_mysis("alpha", "mock", None).await.unwrap();
        cmd.broadcast_to_all("commander", "hello fleet").await.unwrap();
    }

    #[tokio::test]
    async fn create_mysis_publishes_mysis_created() {
        let cmd = commander().await;
        let mut sub = cmd.event_bus().subscribe().await;
        let id = cmd.create_mysis("alpha", "mock", None).await.unwrap();
        let event = sub.rx.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::MysisCreated);
        assert_eq!(event.mysis_id.to_string(), id);
        assert_eq!(event.mysis_name, "alpha");
    }

    #[tokio::test]
    async fn broadcast_publishes_broadcast_delivered_per_running_recipient() {
        let cmd = commander().await;
        let sender = cmd.create_mysis("alpha", "mock", None).await.unwrap();
        let recipient = cmd.create_mysis("beta", "mock", None).await.unwrap();
        cmd.start_mysis(&recipient).await.unwrap();

        let mut sub = cmd.event_bus().subscribe().await;
        cmd.broadcast_to_all(&sender, "hello fleet").await.unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                let event = sub.rx.recv().await.expect("bus closed before a delivery event arrived");
                if event.kind == EventKind::BroadcastDelivered {
                    return event;
                }
            }
        })
        .await
        .expect("expected a BroadcastDelivered event within the deadline");

        assert_eq!(event.mysis_id.to_string(), recipient);
        assert_eq!(event.payload["sender_id"], sender);
    }

    #[tokio::test]
    async fn load_instantiates_existing_rows_idle() {
        let store = Store::open_in_memory().await.unwrap();
        store.create_mysis("alpha", "mock", "mock-model", 0.5).await.unwrap();
        let bus = EventBus::default();
        let tool_client = Arc::new(zoea_tools::StubToolClient::new(vec![]));
        let cmd = Commander::new(store, bus, HashMap::new(), tool_client);
        cmd.load().await.unwrap();
        assert_eq!(cmd.state_counts().await, StateCounts { idle: 1, ..Default::default() });
    }

    #[tokio::test]
    async fn stop_all_waits_for_barrier_then_returns() {
        let cmd = commander().await;
        let id = cmd.create_mysis("alpha", "mock", None).await.unwrap();
        cmd.start_mysis(&id).await.unwrap();
        cmd.stop_all(std::time::Duration::from_secs(2)).await;
        assert_eq!(cmd.state_counts().await, StateCounts { stopped: 1, ..Default::default() });
    }
}
