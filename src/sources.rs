// src/sources.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use uuid::Uuid;

const ENV_PATH: &str = "SCRAPESTREAM_CONFIG";

/// Closed set of extraction strategies. Dispatch is by variant, never by
/// string lookup at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Feed,
    Markup,
}

/// Selector map for markup sources. Every field is optional at parse time;
/// the markup extractor decides what it can live without (`container` and
/// `item` are required to run a cycle, the rest default per-field to "").
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Selectors {
    pub container: Option<String>,
    pub item: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub date: Option<String>,
    pub summary: Option<String>,
    pub base_url: Option<String>,
}

/// One configured source as it appears in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub url: String,
    pub strategy: StrategyKind,
    pub poll_minutes: u64,
    #[serde(default)]
    pub selectors: Option<Selectors>,
}

/// Validated source with its derived identity. Immutable after startup;
/// there is no hot reload.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub id: String,
    pub name: String,
    pub url: String,
    pub strategy: StrategyKind,
    pub interval: Duration,
    pub selectors: Selectors,
}

impl SourceDescriptor {
    fn from_spec(spec: SourceSpec) -> Self {
        Self {
            id: source_id(&spec.url),
            name: spec.name,
            interval: Duration::from_secs(spec.poll_minutes * 60),
            strategy: spec.strategy,
            selectors: spec.selectors.unwrap_or_default(),
            url: spec.url,
        }
    }
}

/// Stable source identity: v5 UUID in the URL namespace. A pure function of
/// the address, so persisted cursor keys survive restarts and reordering of
/// the config file.
pub fn source_id(url: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes()).to_string()
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_state_path() -> String {
    "scrapestream.db".to_string()
}

fn default_capacity() -> usize {
    1024
}

fn default_pace_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerCfg {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateCfg {
    #[serde(default = "default_state_path")]
    pub path: String,
}

impl Default for StateCfg {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueCfg {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Delay between items pushed by one poller, to avoid flooding
    /// subscribers with a whole batch at once.
    #[serde(default = "default_pace_ms")]
    pub pace_ms: u64,
}

impl Default for QueueCfg {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            pace_ms: default_pace_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerCfg,
    #[serde(default)]
    pub state: StateCfg,
    #[serde(default)]
    pub queue: QueueCfg,
    pub sources: Vec<SourceSpec>,
}

impl AppConfig {
    pub fn descriptors(&self) -> Vec<SourceDescriptor> {
        self.sources
            .iter()
            .cloned()
            .map(SourceDescriptor::from_spec)
            .collect()
    }
}

/// Load configuration from an explicit path. Supports TOML or JSON.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing config from {}", path.display()))?;
    if cfg.sources.is_empty() {
        return Err(anyhow!("config has no sources"));
    }
    Ok(cfg)
}

/// Load configuration using env var + fallbacks:
/// 1) $SCRAPESTREAM_CONFIG
/// 2) config/sources.toml
/// 3) config/sources.json
///
/// Missing or malformed configuration is a startup-fatal error.
pub fn load_config_default() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
        return Err(anyhow!("SCRAPESTREAM_CONFIG points to non-existent path"));
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_config_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_config_from(&json_p);
    }
    Err(anyhow!(
        "no config found (set {} or provide config/sources.toml)",
        ENV_PATH
    ))
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("unsupported config format (json)");
    }
    if let Ok(cfg) = toml::from_str::<AppConfig>(s) {
        return Ok(cfg);
    }
    // Fallback: the original shipped its source list as JSON.
    serde_json::from_str(s).context("unsupported config format")
}
