// src/share/mod.rs

//! Lifecycle of shared processes.
//!
//! - [`classifier`] decides from stdout whether a freshly started process
//!   came up.
//! - [`registry`] holds the processes that are currently shared.
//! - [`orchestrator`] composes the executor, classifier and registry into
//!   the start / stop / list workflow.

pub mod classifier;
pub mod orchestrator;
pub mod registry;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

pub use classifier::{
    Classification, ClassifierRules, OutputClassifier, DEFAULT_CAPTURE_LIMIT, NO_OUTPUT_MESSAGE,
};
pub use orchestrator::{ShareOrchestrator, StartupOutcome};
pub use registry::ProcessRegistry;

use crate::exec::CommandSpec;
use crate::types::ShareOptions;

/// Default deadline for a started process to print a verdict.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// How share processes are launched and judged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareSettings {
    pub program: String,
    /// Arguments placed before the logical name (e.g. `["share"]`).
    pub subcommand: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub startup_timeout: Duration,
    pub capture_limit: usize,
    pub rules: ClassifierRules,
}

impl Default for ShareSettings {
    fn default() -> Self {
        Self {
            program: "mcpm".to_string(),
            subcommand: vec!["share".to_string()],
            env: BTreeMap::new(),
            working_dir: None,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            capture_limit: DEFAULT_CAPTURE_LIMIT,
            rules: ClassifierRules::default(),
        }
    }
}

impl ShareSettings {
    /// Build the command line that shares `name`:
    /// `<program> <subcommand..> <name> [--port P] [--no-auth]`.
    pub fn command_for(&self, name: &str, options: &ShareOptions) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.program)
            .args(self.subcommand.iter().cloned())
            .arg(name);

        if let Some(port) = options.port {
            spec = spec.arg("--port").arg(port.to_string());
        }
        if options.no_auth {
            spec = spec.arg("--no-auth");
        }

        spec.env = self.env.clone();
        spec.working_dir = self.working_dir.clone();
        spec
    }
}
