// src/server/runtime.rs

//! Line-oriented service loop.
//!
//! Each request is handled on its own task, so a slow `start` (which may
//! wait for the full startup deadline) does not hold up a `list` or `stop`
//! issued after it. Responses are written as they complete; clients match
//! them up through the echoed `id`.

use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::errors::{Result, ShareError};
use crate::exec::CommandExecutor;
use crate::share::ShareOrchestrator;

use super::handler::dispatch;
use super::{ToolRequest, ToolResponse};

/// Serve requests from `input` until it closes or `shutdown` resolves.
///
/// - On end of input, requests already in flight are allowed to finish and
///   their responses are written.
/// - On shutdown, in-flight requests are abandoned; any process they were
///   starting is killed when its handle is dropped.
///
/// Either way every shared process is stopped before returning.
pub async fn serve<E, R, W, S>(
    orchestrator: Arc<ShareOrchestrator<E>>,
    input: R,
    mut output: W,
    shutdown: S,
) -> Result<()>
where
    E: CommandExecutor + 'static,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    info!("mcpshare service started");

    let (tx, mut rx) = mpsc::channel::<ToolResponse>(64);
    let mut input = BufReader::new(input);
    // Kept across iterations: `read_until` appends, so a read interrupted
    // by another branch resumes where it stopped.
    let mut line_buf = Vec::new();
    let mut in_flight: JoinSet<()> = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(in_flight = in_flight.len(), "shutdown requested");
                in_flight.abort_all();
                break;
            }

            Some(response) = rx.recv() => {
                write_response(&mut output, &response).await?;
            }

            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        warn!(error = %e, "request task panicked");
                    }
                }
            }

            read = input.read_until(b'\n', &mut line_buf) => {
                let at_eof = read? == 0;
                let line = std::mem::take(&mut line_buf);

                if !line.is_empty() {
                    match parse_request(&line) {
                        Ok(request) => {
                            debug!(?request, "request received");
                            let orchestrator = Arc::clone(&orchestrator);
                            let tx = tx.clone();
                            in_flight.spawn(async move {
                                let response = dispatch(orchestrator.as_ref(), request).await;
                                let _ = tx.send(response).await;
                            });
                        }
                        Err(Some(response)) => write_response(&mut output, &response).await?,
                        Err(None) => {}
                    }
                }

                if at_eof {
                    info!("input closed; finishing in-flight requests");
                    break;
                }
            }
        }
    }

    // Once every request task has finished (or been aborted) the last
    // sender clone is gone and `recv` returns `None`.
    drop(tx);
    while let Some(response) = rx.recv().await {
        write_response(&mut output, &response).await?;
    }
    while in_flight.join_next().await.is_some() {}

    let stopped = orchestrator.shutdown().await;
    info!(stopped, "mcpshare service finished");

    output.flush().await?;
    Ok(())
}

/// Decode one input line. Blank lines yield `Err(None)`; lines that are not
/// UTF-8 or not a valid request yield an error response.
fn parse_request(line: &[u8]) -> std::result::Result<ToolRequest, Option<ToolResponse>> {
    let invalid = |detail: String| {
        Some(ToolResponse::error(
            None,
            &ShareError::InvalidRequest(format!("invalid request: {detail}")),
        ))
    };

    let text = std::str::from_utf8(line).map_err(|e| invalid(e.to_string()))?;
    if text.trim().is_empty() {
        return Err(None);
    }

    serde_json::from_str::<ToolRequest>(text).map_err(|e| invalid(e.to_string()))
}

async fn write_response<W>(output: &mut W, response: &ToolResponse) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded = serde_json::to_vec(response)?;
    encoded.push(b'\n');
    output.write_all(&encoded).await?;
    output.flush().await?;
    Ok(())
}
