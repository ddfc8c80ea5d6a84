//! Rules document schema, loading, and validation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::LoadError;

/// Top-level rules document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// List of routing rules
    #[serde(default)]
    pub rules: Vec<Rule>,

    /// Response identifier served when no rule matches
    #[serde(default = "default_fallback")]
    pub fallback_response: String,

    /// Engine settings
    #[serde(default)]
    pub settings: Settings,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            fallback_response: default_fallback(),
            settings: Settings::default(),
        }
    }
}

fn default_fallback() -> String {
    "no_match.json".to_string()
}

impl RouterConfig {
    /// Load a rules document from disk.
    ///
    /// `.yaml`/`.yml` files parse as YAML, everything else as JSON.
    /// Condition header names are lowercased so they line up with the
    /// names the HTTP layer produces.
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|source| LoadError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            _ => serde_json::from_str(&content).map_err(|source| LoadError::Json {
                path: path.to_path_buf(),
                source,
            })?,
        };

        config.normalize();
        config.validate().map_err(|reason| LoadError::Validation {
            path: path.to_path_buf(),
            reason,
        })?;

        Ok(config)
    }

    /// Lowercase every condition header name.
    pub(crate) fn normalize(&mut self) {
        for rule in &mut self.rules {
            rule.conditions.normalize();
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.fallback_response.is_empty() {
            return Err("fallback_response cannot be empty".to_string());
        }
        if self.settings.partitions == 0 {
            return Err("settings.partitions must be at least 1".to_string());
        }
        for (i, rule) in self.rules.iter().enumerate() {
            rule.validate().map_err(|e| format!("rule {i}: {e}"))?;
        }
        Ok(())
    }
}

/// A single routing rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    /// Header conditions that must all hold for the rule to score
    #[serde(default)]
    pub conditions: Conditions,

    /// Identifier of the payload served when this rule wins
    pub response: String,
}

impl Rule {
    fn validate(&self) -> Result<(), String> {
        if self.response.is_empty() {
            return Err("response cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Header comparisons grouped by kind.
///
/// Each kind maps header names to comparison values; an omitted kind is
/// vacuously satisfied. Unrecognized kinds in the document are ignored
/// rather than rejected, so older rules files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Conditions {
    /// Header value must equal the given string
    #[serde(default)]
    pub equals: HashMap<String, String>,

    /// Header value must differ from the given string
    #[serde(default)]
    pub not_equals: HashMap<String, String>,

    /// Header value must contain the given substring
    #[serde(default)]
    pub contains: HashMap<String, String>,
}

impl Conditions {
    /// Total number of declared header comparisons.
    pub fn len(&self) -> usize {
        self.equals.len() + self.not_equals.len() + self.contains.len()
    }

    /// True when no comparison is declared at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn normalize(&mut self) {
        for block in [&mut self.equals, &mut self.not_equals, &mut self.contains] {
            let lowered: HashMap<String, String> = block
                .drain()
                .map(|(name, value)| (name.to_lowercase(), value))
                .collect();
            *block = lowered;
        }
    }
}

/// Engine tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Number of concurrent partitions the rule list is scored in
    #[serde(default = "default_partitions")]
    pub partitions: usize,

    /// Maximum number of header signatures the decision cache retains
    /// (0 disables decision caching)
    #[serde(default = "default_cache_capacity")]
    pub decision_cache_capacity: u64,

    /// Directory response identifiers resolve under
    #[serde(default = "default_payload_dir")]
    pub payload_dir: PathBuf,

    /// Log every matched request
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log every request that fell back
    #[serde(default = "default_true")]
    pub log_unmatched: bool,
}

fn default_partitions() -> usize {
    4
}

fn default_cache_capacity() -> u64 {
    65_536
}

fn default_payload_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            partitions: default_partitions(),
            decision_cache_capacity: default_cache_capacity(),
            payload_dir: default_payload_dir(),
            log_matches: true,
            log_unmatched: true,
        }
    }
}
