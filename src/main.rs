// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::Cli;
use zoea_bus::EventBus;
use zoea_commander::{Commander, ShutdownSequencer};
use zoea_store::Store;
use zoea_tools::{HttpToolClient, StubToolClient, ToolClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = zoea_config::load(cli.config.as_deref()).context("loading configuration")?;
    let config_dir = cli
        .config
        .as_deref()
        .and_then(|p| p.parent())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let store = Store::open(store_path()?).await.context("opening store")?;

    if !cli.offline {
        let credentials = zoea_config::load_credentials(&config, &config_dir).context("loading credentials")?;
        for (provider, entries) in &credentials.providers {
            for entry in entries {
                store
                    .seed_account(provider, &entry.username, &entry.credential)
                    .await
                    .with_context(|| format!("seeding account {}/{}", provider, entry.username))?;
            }
        }
    }

    let bus = EventBus::default();

    let tool_client: Arc<dyn ToolClient> = if cli.offline || config.mcp.endpoint.is_empty() {
        if !cli.offline {
            warn!("mcp.endpoint is empty; falling back to a stub tool client");
        }
        Arc::new(StubToolClient::new(vec![]))
    } else {
        Arc::new(HttpToolClient::new(config.mcp.endpoint.clone(), config.mcp.protocol_version.clone()))
    };

    let provider_configs: HashMap<_, _> = config.providers.clone();
    let commander = Commander::new(store, bus, provider_configs, tool_client);

    let loaded = commander.load().await.context("loading persisted myses")?;
    info!(count = loaded.len(), "loaded myses from store");

    if cli.start_swarm || config.swarm.auto_start {
        for id in &loaded {
            if let Err(e) = commander.start_mysis(id).await {
                warn!(mysis = %id, error = %e, "failed to auto-start mysis");
            }
        }
    }

    let sequencer = Arc::new(ShutdownSequencer::new(commander.clone()));
    wait_for_shutdown_signal().await;
    info!("shutdown signal received");
    sequencer.run().await;

    Ok(())
}

/// Only closes the event bus to unblock any parked consumer; the actual
/// teardown sequence always runs from the one place after this returns,
/// never from inside a signal handler itself.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler").recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn store_path() -> anyhow::Result<PathBuf> {
    if let Some(dir) = dirs::data_dir() {
        let dir = dir.join("zoea-nova");
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        return Ok(dir.join("zoea-nova.sqlite3"));
    }
    Ok(PathBuf::from("zoea-nova.sqlite3"))
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("ZOEA_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
}
