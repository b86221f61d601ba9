// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod server;
pub mod share;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{default_config_path, load_or_default};
use crate::exec::RealCommandExecutor;
use crate::share::{ShareOrchestrator, ShareSettings};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (plus CLI overrides)
/// - the share orchestrator and its process registry
/// - the stdio request loop
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let explicit = args.config.is_some();
    let config_path = args
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    let mut settings = load_or_default(&config_path, explicit)?.into_share_settings();
    if let Some(program) = args.program {
        settings.program = program;
    }

    if args.dry_run {
        print_dry_run(&settings);
        return Ok(());
    }

    info!(
        program = %settings.program,
        timeout = ?settings.startup_timeout,
        "share settings loaded"
    );

    let orchestrator = Arc::new(ShareOrchestrator::new(RealCommandExecutor::new(), settings));

    // Ctrl-C -> graceful shutdown.
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    server::serve(orchestrator, tokio::io::stdin(), tokio::io::stdout(), shutdown).await?;
    Ok(())
}

/// Simple dry-run output: print the effective share settings.
fn print_dry_run(settings: &ShareSettings) {
    println!("mcpshare dry-run");
    println!("  share.program = {}", settings.program);
    println!("  share.subcommand = {:?}", settings.subcommand);
    println!("  share.startup_timeout = {:?}", settings.startup_timeout);
    println!("  share.capture_limit = {}", settings.capture_limit);
    if let Some(ref dir) = settings.working_dir {
        println!("  share.working_dir = {}", dir.display());
    }
    for (key, value) in settings.env.iter() {
        println!("  share.env.{key} = {value}");
    }
    println!(
        "  classifier.success_tokens = {:?}",
        settings.rules.success_tokens()
    );
    println!(
        "  classifier.failure_tokens = {:?}",
        settings.rules.failure_tokens()
    );

    debug!("dry-run complete (nothing started)");
}
