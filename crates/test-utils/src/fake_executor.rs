use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::{watch, Mutex as AsyncMutex};

use mcpshare::errors::StartError;
use mcpshare::exec::{BoxFuture, CommandExecutor, CommandSpec, OutputStream, ProcessHandle};

/// What a fake process does once started.
#[derive(Debug, Clone, Default)]
pub struct Script {
    lines: Vec<String>,
    exit_after_output: bool,
    fail_kill: bool,
    start_failure: Option<StartFailure>,
}

/// Start errors a [`FakeExecutor`] can simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartFailure {
    NotFound,
    PermissionDenied,
}

impl Script {
    /// Print `lines` and keep running.
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Print nothing and keep running.
    pub fn silent() -> Self {
        Self::default()
    }

    /// Exit (closing stdout) after printing.
    pub fn then_exit(mut self) -> Self {
        self.exit_after_output = true;
        self
    }

    /// Make `kill` return an error and leave the process running.
    pub fn failing_kill(mut self) -> Self {
        self.fail_kill = true;
        self
    }

    /// Fail at launch instead of starting.
    pub fn fail_start(failure: StartFailure) -> Self {
        Self {
            start_failure: Some(failure),
            ..Self::default()
        }
    }
}

/// A fake executor that:
/// - records every command it was asked to start
/// - hands out [`FakeProcess`]es driven by per-name [`Script`]s
///
/// A script applies to a spec whose arguments contain the scripted name;
/// anything else gets the default script (silent).
#[derive(Default)]
pub struct FakeExecutor {
    scripts: Mutex<HashMap<String, Script>>,
    default_script: Script,
    started: Arc<Mutex<Vec<CommandSpec>>>,
    processes: Arc<Mutex<Vec<(String, Arc<FakeProcess>)>>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(script: Script) -> Self {
        Self {
            default_script: script,
            ..Self::default()
        }
    }

    pub fn script(self, name: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(name.to_string(), script);
        self
    }

    /// Shared view of the started specs, usable after the executor has been
    /// moved into an orchestrator.
    pub fn started_log(&self) -> Arc<Mutex<Vec<CommandSpec>>> {
        Arc::clone(&self.started)
    }

    /// Shared view of the processes handed out, keyed by scripted name (or
    /// program for unscripted starts).
    pub fn process_log(&self) -> Arc<Mutex<Vec<(String, Arc<FakeProcess>)>>> {
        Arc::clone(&self.processes)
    }

    fn script_for(&self, spec: &CommandSpec) -> (String, Script) {
        let scripts = self.scripts.lock().unwrap();
        scripts
            .iter()
            .find(|(name, _)| spec.args.iter().any(|a| a == *name))
            .map(|(name, script)| (name.clone(), script.clone()))
            .unwrap_or_else(|| (spec.program.clone(), self.default_script.clone()))
    }
}

impl CommandExecutor for FakeExecutor {
    fn start(&self, spec: &CommandSpec) -> Result<Arc<dyn ProcessHandle>, StartError> {
        self.started.lock().unwrap().push(spec.clone());
        let (key, script) = self.script_for(spec);

        if let Some(failure) = script.start_failure {
            let program = spec.program.clone();
            return Err(match failure {
                StartFailure::NotFound => StartError::NotFound { program },
                StartFailure::PermissionDenied => StartError::PermissionDenied { program },
            });
        }

        let process = Arc::new(FakeProcess::spawn(script));
        self.processes
            .lock()
            .unwrap()
            .push((key, Arc::clone(&process)));
        Ok(process)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Code(i32),
    Killed,
}

/// A scripted stand-in for an external process.
///
/// Its stdout is one half of a `tokio::io::duplex` pipe; killing the process
/// drops the other half, which closes the stream like a real exit would.
#[derive(Debug)]
pub struct FakeProcess {
    stdout: Mutex<Option<DuplexStream>>,
    writer: Arc<AsyncMutex<Option<DuplexStream>>>,
    exit: Arc<watch::Sender<Option<Exit>>>,
    kill_calls: AtomicUsize,
    fail_kill: bool,
}

impl FakeProcess {
    fn spawn(script: Script) -> Self {
        let (writer, reader) = tokio::io::duplex(64 * 1024);
        let writer = Arc::new(AsyncMutex::new(Some(writer)));
        let (exit, _) = watch::channel(None);
        let exit = Arc::new(exit);

        let task_writer = Arc::clone(&writer);
        let task_exit = Arc::clone(&exit);
        let lines = script.lines.clone();
        let exit_after_output = script.exit_after_output;

        tokio::spawn(async move {
            let mut guard = task_writer.lock().await;
            if let Some(w) = guard.as_mut() {
                for line in lines {
                    if w.write_all(format!("{line}\n").as_bytes()).await.is_err() {
                        break;
                    }
                }
            }
            if exit_after_output {
                guard.take();
                task_exit.send_if_modified(|state| {
                    if state.is_none() {
                        *state = Some(Exit::Code(0));
                        true
                    } else {
                        false
                    }
                });
            }
        });

        Self {
            stdout: Mutex::new(Some(reader)),
            writer,
            exit,
            kill_calls: AtomicUsize::new(0),
            fail_kill: script.fail_kill,
        }
    }

    /// Print another line, if the process is still running.
    pub async fn emit(&self, line: &str) -> bool {
        let mut guard = self.writer.lock().await;
        match guard.as_mut() {
            Some(w) => w.write_all(format!("{line}\n").as_bytes()).await.is_ok(),
            None => false,
        }
    }

    pub fn kill_calls(&self) -> usize {
        self.kill_calls.load(Ordering::SeqCst)
    }

    pub fn was_killed(&self) -> bool {
        matches!(*self.exit.borrow(), Some(Exit::Killed))
    }

    pub fn is_running(&self) -> bool {
        self.exit.borrow().is_none()
    }
}

impl ProcessHandle for FakeProcess {
    fn id(&self) -> Option<u32> {
        None
    }

    fn take_stdout(&self) -> Option<OutputStream> {
        self.stdout
            .lock()
            .unwrap()
            .take()
            .map(|s| Box::pin(s) as OutputStream)
    }

    fn kill(&self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            self.kill_calls.fetch_add(1, Ordering::SeqCst);

            if self.fail_kill {
                return Err(io::Error::other("kill refused by fake process"));
            }

            self.writer.lock().await.take();
            self.exit.send_if_modified(|state| {
                if state.is_none() {
                    *state = Some(Exit::Killed);
                    true
                } else {
                    false
                }
            });
            Ok(())
        })
    }

    fn wait(&self) -> BoxFuture<'_, io::Result<Option<i32>>> {
        Box::pin(async move {
            let mut rx = self.exit.subscribe();
            let state = rx
                .wait_for(|state| state.is_some())
                .await
                .map_err(|e| io::Error::other(e.to_string()))?;
            Ok(match *state {
                Some(Exit::Code(code)) => Some(code),
                _ => None,
            })
        })
    }
}
