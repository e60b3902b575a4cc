// src/config.rs

//! Configuration for content facet tooling
//!
//! Loaded from TOML; every field has a default so an absent file or an empty
//! section is valid.
//!
//! ```toml
//! [database]
//! path = "/var/lib/conary/facet.db"
//!
//! [binding]
//! path_prefixes = ["/pulp/repos/"]
//!
//! [agent]
//! package_name = "katello-agent"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Default path for the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/conary/facet.toml";

/// Default database location
pub const DEFAULT_DB_PATH: &str = "/var/lib/conary/facet.db";

/// Prefix under which published yum content is served
pub const DEFAULT_PATH_PREFIX: &str = "/pulp/repos/";

/// Package whose presence marks the host's agent as installed
pub const DEFAULT_AGENT_PACKAGE: &str = "katello-agent";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub binding: BindingConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Accepted prefixes for repository paths reported by hosts
    #[serde(default = "default_path_prefixes")]
    pub path_prefixes: Vec<String>,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            path_prefixes: default_path_prefixes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_package")]
    pub package_name: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            package_name: default_agent_package(),
        }
    }
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

fn default_path_prefixes() -> Vec<String> {
    vec![DEFAULT_PATH_PREFIX.to_string()]
}

fn default_agent_package() -> String {
    DEFAULT_AGENT_PACKAGE.to_string()
}

impl FacetConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: FacetConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, or the default path
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));

        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.binding.path_prefixes.is_empty() {
            return Err(Error::Config(
                "binding.path_prefixes must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .binding
            .path_prefixes
            .iter()
            .find(|p| !p.starts_with('/') || !p.ends_with('/'))
        {
            return Err(Error::Config(format!(
                "binding path prefix '{bad}' must start and end with '/'"
            )));
        }
        Ok(())
    }
}
