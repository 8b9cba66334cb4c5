// searchbar.toml: every section is optional

use searchbar_core::DatasourceParams;
use searchbar_dsl::config::{load_config, ConfigError};
use searchbar_dsl::RuleConfig;
use searchbar_suggest::SuggestConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchbarConfig {
    pub suggest: SuggestConfig,
    pub datasource: DatasourceParams,
    pub rule: RuleConfig,
}

impl SearchbarConfig {
    /// Load `path`, or the defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let config: Self = load_config(path)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// The datasource to query; falls back to the rule's index.
    pub fn datasource(&self, index: Option<&str>) -> DatasourceParams {
        let mut params = self.datasource.clone();
        if let Some(index) = index {
            params.index = index.to_string();
        } else if params.index.is_empty() {
            params.index = self.rule.index.clone();
        }
        params
    }
}
