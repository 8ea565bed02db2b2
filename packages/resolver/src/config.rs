use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "vtree.config.json";

/// Resolver configuration (`vtree.config.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverOptions {
    /// Component name that embeds another named tree
    #[serde(default = "default_virtual_component_name")]
    pub virtual_component_name: String,

    /// Deepest node nesting allowed in one pass, embedded trees included
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Passes the async host runs before giving up on pending fetches
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,

    #[serde(default)]
    pub fetch: FetchPolicy,
}

/// How often a missing component may be requested
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchPolicy {
    /// Fetches issued per component name before the resolver stops asking.
    /// `None` requests again on every pass while the component is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

fn default_virtual_component_name() -> String {
    "VirtualComponent".to_string()
}

fn default_max_depth() -> usize {
    256
}

fn default_max_passes() -> usize {
    32
}

impl ResolverOptions {
    /// Load options from a directory, falling back to defaults when no config file exists
    pub fn load(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let options: ResolverOptions = serde_json::from_str(&content)?;
            Ok(options)
        } else {
            Ok(ResolverOptions::default())
        }
    }

    pub fn with_max_fetch_attempts(mut self, max_attempts: u32) -> Self {
        self.fetch.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            virtual_component_name: default_virtual_component_name(),
            max_depth: default_max_depth(),
            max_passes: default_max_passes(),
            fetch: FetchPolicy::default(),
        }
    }
}
