// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::{Config, CredentialsFile};

/// Ordered list of config file locations searched from lowest to highest priority.
/// Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("/etc/zoea-nova/config.yaml"));

    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("zoea-nova/config.yaml"));
    } else if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/zoea-nova/config.yaml"));
    }

    paths.push(PathBuf::from(".zoea-nova/config.yaml"));

    paths
}

/// Load configuration by merging all discovered YAML files.
/// The `extra` argument may provide an explicit path (e.g. `--config` CLI flag);
/// unlike the search-path layers, a missing explicit path is an error.
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let mut config: Config =
        if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty()) {
            Config::default()
        } else {
            serde_yaml::from_value(merged).context("deserializing merged config")?
        };

    for (name, provider) in config.providers.iter_mut() {
        provider.apply_env_overrides(name);
    }

    Ok(config)
}

/// Load and parse the separate credentials file referenced by `swarm.credentials_path`.
///
/// `config_dir` is the directory the winning config file lived in (or the cwd
/// when only defaults were used); relative credential paths resolve against it.
/// Returns an empty [`CredentialsFile`] if the resolved path does not exist —
/// a fleet with no accounts configured yet is not an error.
pub fn load_credentials(config: &Config, config_dir: &Path) -> anyhow::Result<CredentialsFile> {
    let path = resolve_credentials_path(config, config_dir);
    if !path.is_file() {
        return Ok(CredentialsFile::default());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path)?.permissions().mode() & 0o777;
        if mode != 0o600 {
            tracing::warn!(
                path = %path.display(),
                mode = format!("{mode:o}"),
                "credentials file permissions are not 0600"
            );
        }
    }

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn resolve_credentials_path(config: &Config, config_dir: &Path) -> PathBuf {
    let p = PathBuf::from(&config.swarm.credentials_path);
    if p.is_absolute() {
        p
    } else {
        config_dir.join(p)
    }
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
