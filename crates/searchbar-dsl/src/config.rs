//! Configuration parsing for log rules and query criteria

use crate::interval::{Interval, TimeUnit};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

// comparison operators for criteria
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    #[serde(rename = "more than", alias = "gt")]
    Gt,
    #[serde(rename = "more than or equals", alias = "gte")]
    Gte,
    #[serde(rename = "less than", alias = "lt")]
    Lt,
    #[serde(rename = "less than or equals", alias = "lte")]
    Lte,
    #[serde(rename = "equals", alias = "eq")]
    Eq,
    #[serde(rename = "does not equal", alias = "neq")]
    Neq,
    #[serde(rename = "matches", alias = "match")]
    Match,
    #[serde(rename = "does not match", alias = "not_match")]
    NotMatch,
    #[serde(rename = "matches phrase", alias = "match_phrase")]
    MatchPhrase,
    #[serde(rename = "does not match phrase", alias = "not_match_phrase")]
    NotMatchPhrase,
    // anything else; never produces a clause
    #[serde(other)]
    Unsupported,
}

impl Comparator {
    /// Comparators that go into `must`; the rest go into `must_not`.
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            Comparator::Gt
                | Comparator::Gte
                | Comparator::Lt
                | Comparator::Lte
                | Comparator::Eq
                | Comparator::Match
                | Comparator::MatchPhrase
        )
    }

    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            Comparator::Neq | Comparator::NotMatch | Comparator::NotMatchPhrase
        )
    }
}

// A single field condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub field: String,
    pub comparator: Comparator,
    pub value: Value,
}

impl Criterion {
    pub fn new(field: impl Into<String>, comparator: Comparator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            comparator,
            value: value.into(),
        }
    }
}

// Log rule: the part of an alerting rule that drives query construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default = "default_index")]
    pub index: String,

    #[serde(default = "default_timestamp_field")]
    pub timestamp_field: String,

    #[serde(default = "default_time_size")]
    pub time_size: u64,

    #[serde(default = "default_time_unit")]
    pub time_unit: TimeUnit,

    #[serde(default)]
    pub group_by: Vec<String>,

    #[serde(default)]
    pub criteria: Vec<Criterion>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            index: default_index(),
            timestamp_field: default_timestamp_field(),
            time_size: default_time_size(),
            time_unit: default_time_unit(),
            group_by: Vec::new(),
            criteria: Vec::new(),
        }
    }
}

impl RuleConfig {
    pub fn interval(&self) -> Interval {
        Interval::new(self.time_size, self.time_unit)
    }
}

// default value helpers for serde
fn default_index() -> String {
    "logs-*".to_string()
}

fn default_timestamp_field() -> String {
    "@timestamp".to_string()
}

fn default_time_size() -> u64 {
    5
}

fn default_time_unit() -> TimeUnit {
    TimeUnit::Minutes
}

// Load any TOML configuration file

pub fn load_config<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: T = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_from_toml() {
        let toml_content = r#"
index = "filebeat-*"
time_size = 15
time_unit = "m"
group_by = ["host.name"]

[[criteria]]
field = "log.level"
comparator = "equals"
value = "error"

[[criteria]]
field = "bytes"
comparator = "gte"
value = 1024

[[criteria]]
field = "message"
comparator = "sounds like"
value = "oops"
"#;
        let rule: RuleConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(rule.index, "filebeat-*");
        assert_eq!(rule.timestamp_field, "@timestamp");
        assert_eq!(rule.interval().as_millis(), 900_000);
        assert_eq!(rule.criteria[0].comparator, Comparator::Eq);
        assert_eq!(rule.criteria[1].comparator, Comparator::Gte);
        assert_eq!(rule.criteria[2].comparator, Comparator::Unsupported);
    }

    #[test]
    fn test_comparator_partition() {
        assert!(Comparator::Match.is_positive());
        assert!(Comparator::NotMatchPhrase.is_negative());
        assert!(!Comparator::Unsupported.is_positive());
        assert!(!Comparator::Unsupported.is_negative());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config::<RuleConfig, _>("/nonexistent/searchbar.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
