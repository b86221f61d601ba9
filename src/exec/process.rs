// src/exec/process.rs

//! Handles to running external processes.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

use tokio::io::AsyncRead;
use tokio::process::{Child, ChildStdout};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{Duration, sleep};
use tracing::debug;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Boxed, sendable future used by the object-safe traits in this module.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The readable stdout of a process.
pub type OutputStream = Pin<Box<dyn AsyncRead + Send>>;

/// One live external process.
///
/// A handle has a single logical owner at a time (the orchestrator during
/// startup, the registry afterwards), but all methods take `&self` so the
/// handle can be shared behind an `Arc`.
pub trait ProcessHandle: Send + Sync + fmt::Debug {
    /// OS process id, if known.
    fn id(&self) -> Option<u32>;

    /// Take the stdout stream. Returns `None` once it has been taken.
    fn take_stdout(&self) -> Option<OutputStream>;

    /// Terminate the process.
    ///
    /// Must succeed when the process has already exited.
    fn kill(&self) -> BoxFuture<'_, io::Result<()>>;

    /// Wait for the process to exit and return its exit code (`None` when
    /// it was terminated by a signal).
    fn wait(&self) -> BoxFuture<'_, io::Result<Option<i32>>>;
}

/// [`ProcessHandle`] backed by a `tokio::process::Child`.
pub struct ChildProcess {
    program: String,
    pid: Option<u32>,
    child: AsyncMutex<Child>,
    stdout: Mutex<Option<ChildStdout>>,
}

impl ChildProcess {
    pub fn new(program: String, child: Child, stdout: ChildStdout) -> Self {
        Self {
            program,
            pid: child.id(),
            child: AsyncMutex::new(child),
            stdout: Mutex::new(Some(stdout)),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl fmt::Debug for ChildProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildProcess")
            .field("program", &self.program)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl ProcessHandle for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    fn take_stdout(&self) -> Option<OutputStream> {
        self.stdout
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(|s| Box::pin(s) as OutputStream)
    }

    fn kill(&self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            let mut child = self.child.lock().await;

            if let Some(status) = child.try_wait()? {
                debug!(
                    program = %self.program,
                    pid = ?self.pid,
                    ?status,
                    "process already exited; nothing to kill"
                );
                return Ok(());
            }

            match child.kill().await {
                Ok(()) => Ok(()),
                // The process can exit between try_wait and kill.
                Err(e) => match child.try_wait() {
                    Ok(Some(_)) => Ok(()),
                    _ => Err(e),
                },
            }
        })
    }

    fn wait(&self) -> BoxFuture<'_, io::Result<Option<i32>>> {
        Box::pin(async move {
            // Poll instead of awaiting `Child::wait`, so the lock is free for
            // `kill` between checks.
            loop {
                if let Some(status) = self.child.lock().await.try_wait()? {
                    return Ok(status.code());
                }
                sleep(WAIT_POLL_INTERVAL).await;
            }
        })
    }
}
