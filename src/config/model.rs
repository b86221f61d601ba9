// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::share::ShareSettings;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [share]
/// program = "mcpm"
/// subcommand = ["share"]
/// startup_timeout = "30s"
/// capture_limit = 65536
///
/// [share.env]
/// MCPM_LOG = "info"
///
/// [classifier]
/// success_tokens = ["http://", "https://"]
/// failure_tokens = ["error", "failed"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub share: ShareSection,

    #[serde(default)]
    pub classifier: ClassifierSection,
}

/// `[share]` section: what to launch and how long to wait for it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShareSection {
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the logical name.
    #[serde(default = "default_subcommand")]
    pub subcommand: Vec<String>,

    /// Duration string such as `"30s"` or `"500ms"`.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout: String,

    /// Bytes of process output kept while waiting for a verdict.
    #[serde(default = "default_capture_limit")]
    pub capture_limit: usize,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_program() -> String {
    "mcpm".to_string()
}

fn default_subcommand() -> Vec<String> {
    vec!["share".to_string()]
}

fn default_startup_timeout() -> String {
    "30s".to_string()
}

fn default_capture_limit() -> usize {
    crate::share::DEFAULT_CAPTURE_LIMIT
}

impl Default for ShareSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            subcommand: default_subcommand(),
            startup_timeout: default_startup_timeout(),
            capture_limit: default_capture_limit(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }
}

/// `[classifier]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierSection {
    /// Substrings (case-sensitive) that mark a line as success.
    #[serde(default = "default_success_tokens")]
    pub success_tokens: Vec<String>,

    /// Substrings (case-insensitive) that mark a line as failure.
    #[serde(default = "default_failure_tokens")]
    pub failure_tokens: Vec<String>,
}

fn default_success_tokens() -> Vec<String> {
    vec!["http://".to_string(), "https://".to_string()]
}

fn default_failure_tokens() -> Vec<String> {
    vec!["error".to_string(), "failed".to_string()]
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            success_tokens: default_success_tokens(),
            failure_tokens: default_failure_tokens(),
        }
    }
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    share: ShareSettings,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(share: ShareSettings) -> Self {
        Self { share }
    }

    pub fn share(&self) -> &ShareSettings {
        &self.share
    }

    pub fn into_share_settings(self) -> ShareSettings {
        self.share
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(ShareSettings::default())
    }
}
