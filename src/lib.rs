//! Knowledge Graph Engine
//!
//! An in-process engine that owns graphs of notes, tags, folders and links,
//! and derives analytics from them:
//! - Graph store with cascading deletes and a note/task side index
//! - Stats, clusters (connectivity, tags, type) and weighted shortest paths
//! - Force-directed, circular, grid, hierarchical and radial layouts
//! - Filtering, free-text search, and JSON/CSV/DOT export
//! - Mutation events over a broadcast bus

pub mod error;
pub mod events;
pub mod graph;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::{GraphError, Result};
pub use graph::GraphService;

use serde::Deserialize;
use std::path::Path;

use graph::layout::{LayoutConfig, LayoutType};

/// Default YAML config location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "kgraph.yaml";

/// Default warning threshold for a single layout computation
pub const DEFAULT_LAYOUT_BUDGET_MS: u64 = 100;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub layout: LayoutYamlConfig,
    pub events: EventsYamlConfig,
}

/// Layout configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutYamlConfig {
    /// Layout used when a caller does not pick one
    #[serde(rename = "type")]
    pub layout_type: LayoutType,
    pub iterations: usize,
    pub width: f64,
    pub height: f64,
    /// Warn when one layout takes longer than this
    pub budget_ms: u64,
}

impl Default for LayoutYamlConfig {
    fn default() -> Self {
        let defaults = LayoutConfig::default();
        Self {
            layout_type: defaults.layout_type,
            iterations: defaults.iterations,
            width: defaults.width,
            height: defaults.height,
            budget_ms: DEFAULT_LAYOUT_BUDGET_MS,
        }
    }
}

/// Event bus configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsYamlConfig {
    pub capacity: usize,
}

impl Default for EventsYamlConfig {
    fn default() -> Self {
        Self {
            capacity: events::DEFAULT_CAPACITY,
        }
    }
}

// ============================================================================
// Runtime config (what the service actually uses)
// ============================================================================

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Defaults applied by [`GraphService::default_layout_config`]
    pub layout: LayoutConfig,
    pub layout_budget_ms: u64,
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_yaml(YamlConfig::default())
    }
}

impl Config {
    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries [`DEFAULT_CONFIG_PATH`]. A missing or
    /// unparsable file falls back to defaults, as do unparsable env values.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> anyhow::Result<Self> {
        let mut yaml = Self::load_yaml(yaml_path);

        if let Some(ms) = env_parse("KGRAPH_LAYOUT_BUDGET_MS") {
            yaml.layout.budget_ms = ms;
        }
        if let Some(iterations) = env_parse("KGRAPH_LAYOUT_ITERATIONS") {
            yaml.layout.iterations = iterations;
        }
        if let Some(capacity) = env_parse("KGRAPH_EVENT_CAPACITY") {
            yaml.events.capacity = capacity;
        }
        if let Some(layout_type) = env_parse("KGRAPH_DEFAULT_LAYOUT") {
            yaml.layout.layout_type = layout_type;
        }

        Ok(Self::from_yaml(yaml))
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        Self {
            layout: LayoutConfig {
                layout_type: yaml.layout.layout_type,
                iterations: yaml.layout.iterations,
                width: yaml.layout.width,
                height: yaml.layout.height,
                ..LayoutConfig::default()
            },
            layout_budget_ms: yaml.layout.budget_ms,
            event_capacity: yaml.events.capacity.max(1),
        }
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!("No config file at {}, using env vars / defaults", path.display());
                YamlConfig::default()
            }
        }
    }
}

/// Read and parse an env var, ignoring (and logging) values that don't parse.
fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    let raw = std::env::var(var).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}", var, raw);
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
