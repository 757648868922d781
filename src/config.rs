//! File/env configuration loading (§6.1), mirroring the teacher's
//! `GatewayConfig::load`: read a `.toml`/`.json` file if present, fall back
//! to defaults otherwise, apply environment overrides, then validate.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::policy::{Algorithm, Policy};

/// On-disk representation of a [`Policy`] — algorithm is a free-form
/// string here (resolved through [`Algorithm::parse`]) so config files can
/// name a custom registered algorithm without this crate knowing about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub capacity: u64,
    pub window: f64,
    pub algorithm: String,
    #[serde(default)]
    pub burst: Option<u64>,
    #[serde(default)]
    pub refill_rate: Option<f64>,
    #[serde(default)]
    pub distributed: bool,
    #[serde(default)]
    pub store_endpoint: Option<String>,
}

impl PolicyConfig {
    pub fn to_policy(&self) -> Result<Policy> {
        Policy::new(
            self.capacity,
            self.window,
            Algorithm::parse(&self.algorithm),
            self.burst,
            self.refill_rate,
            self.distributed,
            self.store_endpoint.clone(),
        )
        .map_err(|e| anyhow::anyhow!(e.to_string()))
    }
}

fn default_policy() -> PolicyConfig {
    PolicyConfig {
        capacity: 100,
        window: 60.0,
        algorithm: "token_bucket".to_string(),
        burst: None,
        refill_rate: None,
        distributed: false,
        store_endpoint: None,
    }
}

/// Top-level engine configuration: a default policy applied when a caller
/// doesn't name one, plus any number of named policies (e.g. one per
/// route or client tier).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_policy")]
    pub default_policy: PolicyConfig,

    #[serde(default)]
    pub policies: HashMap<String, PolicyConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_policy: default_policy(),
            policies: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load from `path` if it exists (`.toml` or `.json`), otherwise fall
    /// back to built-in defaults. Environment overrides and validation run
    /// regardless of which source produced the base config.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: EngineConfig = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => toml::from_str(&content)?,
                Some("json") => serde_json::from_str(&content)?,
                Some(ext) => bail!("unsupported config format: .{ext}, use .toml or .json"),
                None => bail!("config file has no extension, use .toml or .json"),
            }
        } else {
            tracing::info!(
                "rate limit config not found at {}, using defaults",
                path.display()
            );
            EngineConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(policies = config.policies.len(), "loaded rate limit configuration");
        Ok(config)
    }

    /// Environment overrides for the default policy's capacity/window and
    /// distributed store endpoint — the knobs an operator is most likely
    /// to want to flip without editing the file.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RATE_LIMIT_DEFAULT_CAPACITY") {
            if let Ok(n) = v.parse::<u64>() {
                self.default_policy.capacity = n;
            }
        }
        if let Ok(v) = std::env::var("RATE_LIMIT_DEFAULT_WINDOW_SECS") {
            if let Ok(n) = v.parse::<f64>() {
                self.default_policy.window = n;
            }
        }
        if let Ok(v) = std::env::var("RATE_LIMIT_STORE_ENDPOINT") {
            self.default_policy.store_endpoint = Some(v);
        }
    }

    /// Every configured policy (default plus named) must independently
    /// construct a valid [`Policy`] — a malformed entry fails config
    /// loading up front instead of surfacing as a runtime error on first
    /// use.
    pub fn validate(&self) -> Result<()> {
        self.default_policy
            .to_policy()
            .context("default_policy is invalid")?;
        for (name, policy) in &self.policies {
            policy
                .to_policy()
                .with_context(|| format!("policy {name:?} is invalid"))?;
        }
        Ok(())
    }

    /// Resolve a named policy, falling back to the default when `name` is
    /// unset or unrecognized.
    pub fn policy_for(&self, name: Option<&str>) -> Result<Policy> {
        match name.and_then(|n| self.policies.get(n)) {
            Some(cfg) => cfg.to_policy(),
            None => self.default_policy.to_policy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_no_file_present() {
        let config = EngineConfig::load(Path::new("/nonexistent/ratelimit.toml")).unwrap();
        assert_eq!(config.default_policy.capacity, 100);
    }

    #[test]
    fn policy_for_falls_back_to_default() {
        let config = EngineConfig::default();
        let policy = config.policy_for(Some("unknown-route")).unwrap();
        assert_eq!(policy.capacity, 100);
    }

    #[test]
    fn rejects_invalid_named_policy() {
        let mut config = EngineConfig::default();
        config.policies.insert(
            "bad".to_string(),
            PolicyConfig {
                capacity: 0,
                window: 60.0,
                algorithm: "token_bucket".to_string(),
                burst: None,
                refill_rate: None,
                distributed: false,
                store_endpoint: None,
            },
        );
        assert!(config.validate().is_err());
    }
}
