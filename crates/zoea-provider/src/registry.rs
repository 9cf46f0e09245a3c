// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Builds [`Provider`] instances from configuration, keeping one
//! [`RateLimiter`] per provider name shared by every mysis bound to it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use zoea_config::ProviderConfig;

use crate::flexible::FlexibleProvider;
use crate::mock::MockProvider;
use crate::openai_compat::{AuthStyle, OpenAICompatProvider};
use crate::provider::Provider;
use crate::rate_limit::RateLimiter;

/// Resolves `{provider_name, model, temperature}` into a concrete [`Provider`],
/// given the static `providers:` configuration map. Credentials are looked up
/// by the caller (via `zoea-store`'s account claim) and passed in explicitly,
/// since the same provider config is shared by every mysis using it while
/// credentials are claimed per-mysis.
pub struct ProviderRegistry {
    configs: HashMap<String, ProviderConfig>,
    limiters: RwLock<HashMap<String, RateLimiter>>,
}

impl ProviderRegistry {
    pub fn new(configs: HashMap<String, ProviderConfig>) -> Self {
        Self { configs, limiters: RwLock::new(HashMap::new()) }
    }

    fn limiter_for(&self, name: &str, cfg: &ProviderConfig) -> RateLimiter {
        if let Some(l) = self.limiters.read().unwrap().get(name) {
            return l.clone();
        }
        let limiter = RateLimiter::new(cfg.rate_limit, cfg.rate_burst);
        self.limiters.write().unwrap().insert(name.to_string(), limiter.clone());
        limiter
    }

    /// Construct a provider bound to `model`/`temperature`, with `api_key`
    /// resolved by the caller (e.g. from a claimed account's credential).
    pub fn create(
        &self,
        provider_name: &str,
        model: &str,
        temperature: f32,
        api_key: Option<String>,
    ) -> Result<Box<dyn Provider>> {
        if provider_name == "mock" {
            return Ok(Box::new(MockProvider::always_text("")));
        }

        let cfg = self
            .configs
            .get(provider_name)
            .ok_or_else(|| anyhow!("unknown provider: {provider_name}"))?;
        let limiter = self.limiter_for(provider_name, cfg);

        let provider: Box<dyn Provider> = match cfg.kind.as_str() {
            "openai_compatible" => Box::new(OpenAICompatProvider::new(
                provider_name,
                model,
                temperature,
                &cfg.endpoint,
                api_key,
                AuthStyle::Bearer,
                limiter,
            )),
            "flexible" => Box::new(FlexibleProvider::new(provider_name, model, temperature, &cfg.endpoint, limiter)),
            "mock" => Box::new(MockProvider::always_text("")),
            other => return Err(anyhow!("unknown provider kind: {other}")),
        };
        Ok(provider)
    }
}

/// Shared handle, cloned into every mysis runtime.
pub type SharedProviderRegistry = Arc<ProviderRegistry>;

#[cfg(test)]
mod tests {
    use super::*;

    fn openai_cfg() -> ProviderConfig {
        ProviderConfig {
            endpoint: "https://api.example.com/v1".into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            rate_limit: 1.0,
            rate_burst: 4,
            kind: "openai_compatible".into(),
        }
    }

    #[test]
    fn create_openai_compatible_provider_succeeds() {
        let mut configs = HashMap::new();
        configs.insert("openai".to_string(), openai_cfg());
        let reg = ProviderRegistry::new(configs);
        let p = reg.create("openai", "gpt-4o-mini", 0.7, Some("key".into())).unwrap();
        assert_eq!(p.name(), "openai");
    }

    #[test]
    fn create_unknown_provider_errors() {
        let reg = ProviderRegistry::new(HashMap::new());
        assert!(reg.create("nope", "m", 0.5, None).is_err());
    }

    #[test]
    fn mock_provider_bypasses_config_lookup() {
        let reg = ProviderRegistry::new(HashMap::new());
        let p = reg.create("mock", "mock-model", 0.0, None).unwrap();
        assert_eq!(p.name(), "mock");
    }

    #[test]
    fn limiter_is_shared_across_creates_for_same_provider() {
        let mut configs = HashMap::new();
        configs.insert("openai".to_string(), openai_cfg());
        let reg = ProviderRegistry::new(configs);
        let _ = reg.create("openai", "m1", 0.5, None).unwrap();
        let _ = reg.create("openai", "m2", 0.5, None).unwrap();
        assert_eq!(reg.limiters.read().unwrap().len(), 1);
    }
}
