// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for launching the external share command
//! using `tokio::process::Command` and handing back a [`ProcessHandle`]
//! that the share workflow can kill, wait on, and read stdout from.
//!
//! - [`backend`] provides the `CommandExecutor` trait, the `CommandSpec`
//!   describing what to launch, and the production `RealCommandExecutor`.
//! - [`process`] provides the `ProcessHandle` trait and `ChildProcess`, its
//!   implementation on top of a `tokio::process::Child`.
//!
//! Tests swap in a scripted executor so no real processes are spawned.

pub mod backend;
pub mod process;

pub use backend::{CommandExecutor, CommandSpec, RealCommandExecutor};
pub use process::{BoxFuture, ChildProcess, OutputStream, ProcessHandle};
