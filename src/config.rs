//! Engine configuration
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! separator = "/"
//! matcher_cache_capacity = 1024
//! conflict_strategy = "deny-overrides"
//! ```

use crate::authz::{ConflictStrategy, DEFAULT_CAPACITY, DEFAULT_SEPARATOR};
use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Authorizer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Segment separator a wildcard never crosses
    pub separator: char,

    /// Number of compiled matchers kept per authorizer
    pub matcher_cache_capacity: usize,

    /// How a batch with several conclusive statements is decided
    pub conflict_strategy: ConflictStrategy,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading engine configuration from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.matcher_cache_capacity == 0 {
            return Err(AuthzError::InvalidConfig(
                "matcher_cache_capacity must be greater than zero".to_string(),
            ));
        }
        if self.separator == '*' {
            return Err(AuthzError::InvalidConfig(
                "separator cannot be the wildcard character".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            separator: DEFAULT_SEPARATOR,
            matcher_cache_capacity: DEFAULT_CAPACITY,
            conflict_strategy: ConflictStrategy::DenyOverrides,
        }
    }
}
