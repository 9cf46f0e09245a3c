// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_max_myses() -> usize {
    16
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_credentials_path() -> String {
    "credentials.yaml".to_string()
}
fn default_rate_limit() -> f64 {
    1.0
}
fn default_rate_burst() -> u32 {
    4
}
fn default_temperature() -> f32 {
    0.7
}
fn default_protocol_version() -> String {
    "1.0".to_string()
}
fn default_max_context_messages() -> usize {
    20
}
fn default_idle_nudge_interval_secs() -> u64 {
    30
}
fn default_llm_call_timeout_secs() -> u64 {
    120
}
fn default_tool_call_timeout_secs() -> u64 {
    30
}
fn default_tool_retry_attempts() -> u32 {
    3
}
fn default_stop_timeout_secs() -> u64 {
    5
}
fn default_kind() -> String {
    "openai_compatible".to_string()
}

/// Top-level configuration, deserialized from a merged stack of YAML layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub swarm: SwarmConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub mcp: ToolClientConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Fleet-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    #[serde(default = "default_max_myses")]
    pub max_myses: usize,
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    /// If true, `Commander::load` auto-starts every mysis loaded in `idle`.
    #[serde(default)]
    pub auto_start: bool,
    /// Path to the separate 0600 credentials file. Relative paths are resolved
    /// against the directory of the config file that set them.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_myses: default_max_myses(),
            default_provider: default_provider(),
            default_model: default_model(),
            auto_start: false,
            credentials_path: default_credentials_path(),
        }
    }
}

/// Per-provider endpoint and rate-limit configuration.
///
/// `rate_limit`/`rate_burst`/`temperature`/`endpoint` may each be overridden by
/// the environment variables `ZOEA_PROVIDER_<NAME>_{RATE_LIMIT,RATE_BURST,
/// TEMPERATURE,ENDPOINT}` (name upper-cased), applied after YAML load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Requests per second sustained.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: f64,
    /// Burst capacity on top of the sustained rate.
    #[serde(default = "default_rate_burst")]
    pub rate_burst: u32,
    /// Which wire family this provider speaks: `openai_compatible`, `flexible` or `mock`.
    #[serde(default = "default_kind")]
    pub kind: String,
}

impl ProviderConfig {
    /// Apply `ZOEA_PROVIDER_<NAME>_*` environment overrides in place.
    pub fn apply_env_overrides(&mut self, name: &str) {
        let prefix = format!("ZOEA_PROVIDER_{}", name.to_uppercase());
        if let Ok(v) = std::env::var(format!("{prefix}_ENDPOINT")) {
            self.endpoint = v;
        }
        if let Ok(v) = std::env::var(format!("{prefix}_RATE_LIMIT")) {
            if let Ok(parsed) = v.parse() {
                self.rate_limit = parsed;
            }
        }
        if let Ok(v) = std::env::var(format!("{prefix}_RATE_BURST")) {
            if let Ok(parsed) = v.parse() {
                self.rate_burst = parsed;
            }
        }
        if let Ok(v) = std::env::var(format!("{prefix}_TEMPERATURE")) {
            if let Ok(parsed) = v.parse() {
                self.temperature = parsed;
            }
        }
    }
}

/// Upstream tool-server (ToolClient) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolClientConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
}

impl Default for ToolClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            protocol_version: default_protocol_version(),
        }
    }
}

/// Tuning knobs for the mysis runtime; all have the defaults named in the core spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,
    #[serde(default = "default_idle_nudge_interval_secs")]
    pub idle_nudge_interval_secs: u64,
    #[serde(default = "default_llm_call_timeout_secs")]
    pub llm_call_timeout_secs: u64,
    #[serde(default = "default_tool_call_timeout_secs")]
    pub tool_call_timeout_secs: u64,
    #[serde(default = "default_tool_retry_attempts")]
    pub tool_retry_attempts: u32,
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_context_messages: default_max_context_messages(),
            idle_nudge_interval_secs: default_idle_nudge_interval_secs(),
            llm_call_timeout_secs: default_llm_call_timeout_secs(),
            tool_call_timeout_secs: default_tool_call_timeout_secs(),
            tool_retry_attempts: default_tool_retry_attempts(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

/// One entry in the separate credentials file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEntry {
    pub username: String,
    pub credential: String,
}

/// Shape of the 0600 credentials file: `provider -> [{username, credential}]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsFile {
    #[serde(flatten)]
    pub providers: HashMap<String, Vec<CredentialEntry>>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
