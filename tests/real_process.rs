// tests/real_process.rs
//
// Drives real `sh` processes through the production executor. The logical
// name is passed as `$0` to the script (`sh -c <script> <name>`).
#![cfg(unix)]

mod common;
use crate::common::builders::SettingsBuilder;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use mcpshare::errors::{ShareError, StartError};
use mcpshare::exec::{CommandExecutor, CommandSpec, RealCommandExecutor};
use mcpshare::share::ShareOrchestrator;
use mcpshare::types::ShareOptions;

type TestResult = Result<(), Box<dyn Error>>;

fn sh_orchestrator(script: &str, timeout: Duration) -> ShareOrchestrator<RealCommandExecutor> {
    let settings = SettingsBuilder::new()
        .program("sh")
        .subcommand(&["-c", script])
        .startup_timeout(timeout)
        .build();
    ShareOrchestrator::new(RealCommandExecutor::new(), settings)
}

#[tokio::test]
async fn real_process_announcing_url_is_shared_then_stopped() -> TestResult {
    init_tracing();

    let orch = sh_orchestrator(
        r#"echo "Connecting..."; echo "Server running at https://tunnel.example/$0"; exec sleep 30"#,
        Duration::from_secs(5),
    );

    let text = with_timeout(orch.start_share("abc123", &ShareOptions::default())).await?;
    assert!(text.contains("https://tunnel.example/abc123"));

    let handle = orch.registry().get("abc123").expect("registered");
    orch.stop_share("abc123").await?;
    assert!(orch.list_shared().is_empty());

    // Killed by signal, so no exit code.
    assert_eq!(with_timeout(handle.wait()).await?, None);

    Ok(())
}

#[tokio::test]
async fn real_process_error_line_is_failure() -> TestResult {
    init_tracing();

    let orch = sh_orchestrator(
        r#"echo "Starting up..."; echo "Error: port 9000 already in use"; exec sleep 30"#,
        Duration::from_secs(5),
    );

    let err = with_timeout(orch.start_share("fs", &ShareOptions::default()))
        .await
        .unwrap_err();
    match err {
        ShareError::ClassifiedFailure { output, .. } => {
            assert!(output.contains("port 9000 already in use"))
        }
        other => panic!("expected ClassifiedFailure, got {other:?}"),
    }
    assert!(orch.list_shared().is_empty());

    Ok(())
}

#[tokio::test]
async fn stderr_is_not_classified() -> TestResult {
    init_tracing();

    let orch = sh_orchestrator(
        r#"echo "Error: only on stderr" >&2; echo "ready at http://127.0.0.1:9000"; exec sleep 30"#,
        Duration::from_secs(5),
    );

    let text = with_timeout(orch.start_share("fs", &ShareOptions::default())).await?;
    assert!(!text.contains("stderr"));
    assert_eq!(orch.shutdown().await, 1);

    Ok(())
}

#[tokio::test]
async fn real_process_silence_times_out() -> TestResult {
    init_tracing();

    let orch = sh_orchestrator("exec sleep 30", Duration::from_millis(200));

    let err = with_timeout(orch.start_share("fs", &ShareOptions::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, ShareError::TimedOut { .. }), "got {err:?}");
    assert!(orch.list_shared().is_empty());

    Ok(())
}

#[tokio::test]
async fn kill_after_natural_exit_is_ok() -> TestResult {
    init_tracing();

    let handle = RealCommandExecutor::new().start(&CommandSpec::new("sh").args(["-c", "exit 3"]))?;

    assert_eq!(with_timeout(handle.wait()).await?, Some(3));
    handle.kill().await?;
    handle.kill().await?;

    Ok(())
}

#[tokio::test]
async fn kill_is_not_blocked_by_a_pending_wait() -> TestResult {
    init_tracing();

    let handle = RealCommandExecutor::new().start(&CommandSpec::new("sh").args(["-c", "exec sleep 30"]))?;

    let waiter = tokio::spawn({
        let handle = Arc::clone(&handle);
        async move { handle.wait().await }
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    tokio::time::timeout(Duration::from_secs(3), handle.kill()).await??;
    assert_eq!(with_timeout(waiter).await??, None);

    Ok(())
}

#[tokio::test]
async fn missing_program_is_start_failure() -> TestResult {
    init_tracing();

    let settings = SettingsBuilder::new()
        .program("mcpshare-no-such-binary")
        .build();
    let orch = ShareOrchestrator::new(RealCommandExecutor::new(), settings);

    let err = orch
        .start_share("fs", &ShareOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ShareError::StartFailed {
            source: StartError::NotFound { .. },
            ..
        }
    ));

    Ok(())
}
