use std::path::{Path, PathBuf};

use anyhow::Context;
use ccm_conductor::AuditConfig;
use ccm_core::{AnalyticsProviderSignature, ProviderRegistry, ProviderSignature};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "ccm.yaml";

#[derive(Debug, Deserialize)]
pub struct ProviderEntry {
    pub key: String,
    #[serde(flatten)]
    pub signature: ProviderSignature,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsEntry {
    pub key: String,
    #[serde(flatten)]
    pub signature: AnalyticsProviderSignature,
}

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Extra consent platforms, registered after the built-ins.
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
    #[serde(default)]
    pub analytics: Vec<AnalyticsEntry>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".ccm")
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            audit: AuditConfig::default(),
            output_dir: default_output_dir(),
            providers: Vec::new(),
            analytics: Vec::new(),
        }
    }
}

impl CliConfig {
    /// An explicit path must exist; otherwise `ccm.yaml` in `cwd` is used
    /// when present, and defaults when not.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let candidate = cwd.join(DEFAULT_CONFIG_FILE);
                if !candidate.exists() {
                    return Ok(Self::default());
                }
                candidate
            }
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing config: {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Built-in signatures plus the configured extras. A configured key that
    /// matches a built-in replaces it.
    pub fn registry(&self) -> anyhow::Result<ProviderRegistry> {
        let mut registry = ProviderRegistry::with_defaults();
        for entry in &self.providers {
            registry
                .add_provider(&entry.key, entry.signature.clone())
                .with_context(|| format!("registering provider '{}'", entry.key))?;
        }
        for entry in &self.analytics {
            registry
                .add_analytics_provider(&entry.key, entry.signature.clone())
                .with_context(|| format!("registering analytics provider '{}'", entry.key))?;
        }
        tracing::debug!(
            providers = self.providers.len(),
            analytics = self.analytics.len(),
            "registered configured signatures"
        );
        Ok(registry)
    }
}
