// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! The share orchestrator talks to a `CommandExecutor` instead of calling
//! `tokio::process::Command` directly. This makes it easy to swap in a fake
//! executor in tests while keeping the production implementation here.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::StartError;

use super::process::{ChildProcess, ProcessHandle};

/// Everything needed to launch one external process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment, layered on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Trait abstracting how external processes are started.
///
/// Production code uses [`RealCommandExecutor`]; tests provide their own
/// implementation that hands out scripted processes.
pub trait CommandExecutor: Send + Sync {
    /// Launch `spec` and return a handle to the running process.
    ///
    /// On error nothing is left running and no pipe stays open.
    fn start(&self, spec: &CommandSpec) -> Result<Arc<dyn ProcessHandle>, StartError>;
}

/// Real executor backed by `tokio::process`.
///
/// Only stdout is piped. stdin and stderr are attached to the null device so
/// that classification only ever sees one stream.
#[derive(Debug, Clone, Default)]
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn start(&self, spec: &CommandSpec) -> Result<Arc<dyn ProcessHandle>, StartError> {
        if spec.program.trim().is_empty() {
            return Err(StartError::NotFound {
                program: spec.program.clone(),
            });
        }

        info!(
            program = %spec.program,
            args = ?spec.args,
            "starting external process"
        );

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| StartError::from_spawn(&spec.program, e))?;

        // `child` is dropped on this path; kill_on_drop reaps it.
        let stdout = child.stdout.take().ok_or_else(|| StartError::Pipe {
            program: spec.program.clone(),
        })?;

        debug!(program = %spec.program, pid = ?child.id(), "external process spawned");

        Ok(Arc::new(ChildProcess::new(spec.program.clone(), child, stdout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_args_env_and_dir() {
        let spec = CommandSpec::new("mcpm")
            .arg("share")
            .args(["fs", "--port", "9000"])
            .env("MCPM_LOG", "debug")
            .working_dir("/tmp");

        assert_eq!(spec.program, "mcpm");
        assert_eq!(spec.args, vec!["share", "fs", "--port", "9000"]);
        assert_eq!(spec.env.get("MCPM_LOG").map(String::as_str), Some("debug"));
        assert_eq!(spec.working_dir, Some(PathBuf::from("/tmp")));
    }

    #[tokio::test]
    async fn empty_program_is_rejected_before_spawning() {
        let err = RealCommandExecutor::new()
            .start(&CommandSpec::new("  "))
            .unwrap_err();
        assert!(matches!(err, StartError::NotFound { .. }));
    }

    #[tokio::test]
    async fn missing_executable_maps_to_not_found() {
        let err = RealCommandExecutor::new()
            .start(&CommandSpec::new("mcpshare-definitely-not-installed"))
            .unwrap_err();
        assert!(matches!(err, StartError::NotFound { .. }), "got {err:?}");
    }
}
