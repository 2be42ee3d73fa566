//! CLI configuration.
//!
//! An optional `trackline.toml` supplies defaults for the resolve chain and
//! completion policy. Command-line flags always win over the file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use trackline_engine::{parse_chain, parse_policy_chain, CompletionPolicy, MergeStrategy};

const DEFAULT_CONFIG_FILE: &str = "trackline.toml";
const DEFAULT_CHAIN: &str = "childrenFirstThenParent,parentOnly";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub resolve: ResolveConfig,
    pub completion: CompletionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveConfig {
    /// Merge strategy chain, comma separated
    pub chain: String,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            chain: DEFAULT_CHAIN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompletionConfig {
    /// Rollup policy chain, comma separated, one entry per hierarchy depth
    pub policy: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            policy: CompletionPolicy::Cascade.as_str().to_string(),
        }
    }
}

impl Config {
    /// Load configuration. An explicit path must exist; otherwise
    /// `./trackline.toml` is used when present, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let text = match path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("cannot read config file {}", path.display()))?,
            None => match std::fs::read_to_string(DEFAULT_CONFIG_FILE) {
                Ok(text) => text,
                Err(_) => return Ok(Self::default()),
            },
        };
        toml::from_str(&text).context("invalid config file")
    }

    /// Resolve chain: the flag when given, the config otherwise
    pub fn chain(&self, flag: Option<&str>) -> Result<Vec<MergeStrategy>> {
        let spec = flag.unwrap_or(&self.resolve.chain);
        let chain = parse_chain(spec)?;
        anyhow::ensure!(!chain.is_empty(), "merge strategy chain is empty");
        Ok(chain)
    }

    /// Completion policy chain: the flag when given, the config otherwise.
    /// Entry N governs hierarchy depth N; the final entry repeats for
    /// deeper levels.
    pub fn policy(&self, flag: Option<&str>) -> Result<Vec<CompletionPolicy>> {
        let spec = flag.unwrap_or(&self.completion.policy);
        let chain = parse_policy_chain(spec)?;
        anyhow::ensure!(!chain.is_empty(), "completion policy chain is empty");
        Ok(chain)
    }
}
