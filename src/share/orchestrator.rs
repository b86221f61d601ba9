// src/share/orchestrator.rs

//! Start, stop and list shared processes.
//!
//! Starting a share runs through `Idle -> Starting -> {Shared | Failed |
//! TimedOut}`:
//!
//! 1. The name is reserved in the registry. If it is already taken the call
//!    fails with `AlreadySharing` and nothing is launched.
//! 2. The process is launched through the [`CommandExecutor`].
//! 3. A classifier task reads its stdout while the startup deadline runs.
//!    Whichever of success, failure or deadline resolves first decides:
//!    success registers the handle, anything else kills the process and
//!    drops the reservation.
//!
//! A verdict that arrives after the deadline is discarded by the classifier
//! task itself. Killing the process closes its stdout, which is what lets
//! that task exit.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::errors::{ShareError, ShareResult, StartError};
use crate::exec::{CommandExecutor, ProcessHandle};
use crate::types::ShareOptions;

use super::ShareSettings;
use super::classifier::{Classification, spawn_classifier};
use super::registry::ProcessRegistry;

/// How the startup race ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    /// The process announced an endpoint; `output` is what it printed.
    Started { output: String },
    /// The process reported a problem or closed stdout first.
    Rejected { output: String },
    /// Nothing decisive before the deadline.
    TimedOut,
}

/// Entry point for the share workflow. Owns the registry of shared
/// processes for as long as it lives.
pub struct ShareOrchestrator<E: CommandExecutor> {
    executor: E,
    registry: ProcessRegistry,
    settings: ShareSettings,
}

impl<E: CommandExecutor> std::fmt::Debug for ShareOrchestrator<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareOrchestrator")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<E: CommandExecutor> ShareOrchestrator<E> {
    pub fn new(executor: E, settings: ShareSettings) -> Self {
        Self {
            executor,
            registry: ProcessRegistry::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &ShareSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Start sharing `name`. Returns the process output that confirmed
    /// startup (normally containing the public URL).
    pub async fn start_share(&self, name: &str, options: &ShareOptions) -> ShareResult<String> {
        let name = validate_name(name)?;

        let reservation = Reservation::claim(&self.registry, name)
            .ok_or_else(|| ShareError::AlreadySharing(name.to_string()))?;

        let spec = self.settings.command_for(name, options);
        let handle = self
            .executor
            .start(&spec)
            .map_err(|source| ShareError::StartFailed {
                name: name.to_string(),
                source,
            })?;

        let Some(stream) = handle.take_stdout() else {
            self.kill_quietly(name, handle.as_ref()).await;
            return Err(ShareError::StartFailed {
                name: name.to_string(),
                source: StartError::Pipe {
                    program: spec.program,
                },
            });
        };

        info!(
            name = %name,
            pid = ?handle.id(),
            timeout = ?self.settings.startup_timeout,
            "share process started; waiting for verdict"
        );

        let receiver = spawn_classifier(
            name,
            stream,
            self.settings.rules.clone(),
            self.settings.capture_limit,
        );

        let outcome = match timeout(self.settings.startup_timeout, receiver).await {
            Ok(Ok(Classification::Success(output))) => StartupOutcome::Started { output },
            Ok(Ok(Classification::Failure(output))) => StartupOutcome::Rejected { output },
            Ok(Ok(Classification::Pending)) | Ok(Err(_)) => StartupOutcome::Rejected {
                output: "share output classifier ended without a verdict".to_string(),
            },
            Err(_) => StartupOutcome::TimedOut,
        };

        match outcome {
            StartupOutcome::Started { output } => {
                reservation.commit(handle);
                info!(name = %name, "share is up; process registered");
                Ok(output)
            }
            StartupOutcome::Rejected { output } => {
                warn!(name = %name, output = %output.trim_end(), "share process reported failure");
                self.kill_quietly(name, handle.as_ref()).await;
                Err(ShareError::ClassifiedFailure {
                    name: name.to_string(),
                    output,
                })
            }
            StartupOutcome::TimedOut => {
                warn!(
                    name = %name,
                    after = ?self.settings.startup_timeout,
                    "no verdict from share process before deadline"
                );
                self.kill_quietly(name, handle.as_ref()).await;
                Err(ShareError::TimedOut {
                    name: name.to_string(),
                    after: self.settings.startup_timeout,
                })
            }
        }
    }

    /// Stop sharing `name`.
    ///
    /// The entry is removed before the kill is attempted, so it disappears
    /// from [`list_shared`](Self::list_shared) even if the kill fails.
    pub async fn stop_share(&self, name: &str) -> ShareResult<()> {
        let name = validate_name(name)?;

        let handle = self
            .registry
            .remove(name)
            .ok_or_else(|| ShareError::NotSharing(name.to_string()))?;

        match handle.kill().await {
            Ok(()) => {
                info!(name = %name, "stopped sharing");
                Ok(())
            }
            Err(e) => {
                warn!(name = %name, error = %e, "failed to kill shared process");
                Err(ShareError::KillFailed {
                    name: name.to_string(),
                    detail: e.to_string(),
                })
            }
        }
    }

    /// Names of everything currently shared.
    pub fn list_shared(&self) -> BTreeSet<String> {
        self.registry.list()
    }

    /// Stop every shared process. Returns how many were stopped.
    pub async fn shutdown(&self) -> usize {
        let entries = self.registry.drain();
        let count = entries.len();

        for (name, handle) in entries {
            self.kill_quietly(&name, handle.as_ref()).await;
        }

        if count > 0 {
            info!(count, "stopped all shared processes");
        }
        count
    }

    async fn kill_quietly(&self, name: &str, handle: &dyn ProcessHandle) {
        if let Err(e) = handle.kill().await {
            warn!(name = %name, error = %e, "failed to kill share process");
        } else {
            debug!(name = %name, "share process killed");
        }
    }
}

fn validate_name(name: &str) -> ShareResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ShareError::InvalidName(
            "name argument is required".to_string(),
        ));
    }
    Ok(trimmed)
}

/// A reserved registry slot. Dropping it without
/// [`commit`](Reservation::commit) releases the name again, including when
/// the surrounding future is cancelled.
struct Reservation<'a> {
    registry: &'a ProcessRegistry,
    name: &'a str,
}

impl<'a> Reservation<'a> {
    fn claim(registry: &'a ProcessRegistry, name: &'a str) -> Option<Self> {
        registry.reserve(name).then_some(Self { registry, name })
    }

    fn commit(self, handle: Arc<dyn ProcessHandle>) {
        // register() replaces the reserved slot; the release in Drop then
        // leaves the active entry alone.
        self.registry.register(self.name, handle);
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.registry.release(self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_are_rejected() {
        assert!(matches!(validate_name("   "), Err(ShareError::InvalidName(_))));
        assert_eq!(validate_name("  fs ").unwrap(), "fs");
    }

    #[test]
    fn dropped_reservation_releases_name() {
        let registry = ProcessRegistry::new();
        {
            let _r = Reservation::claim(&registry, "fs").unwrap();
            assert!(Reservation::claim(&registry, "fs").is_none());
        }
        assert!(Reservation::claim(&registry, "fs").is_some());
    }
}
