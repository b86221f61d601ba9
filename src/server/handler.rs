// src/server/handler.rs

//! Dispatch of `share` tool requests onto the orchestrator.

use tracing::debug;

use crate::errors::{ShareError, ShareResult};
use crate::exec::CommandExecutor;
use crate::share::ShareOrchestrator;
use crate::types::{ShareAction, ShareOptions};

use super::{PortArg, ToolRequest, ToolResponse};

/// Handle one request and wrap the result for the wire.
pub async fn dispatch<E: CommandExecutor>(
    orchestrator: &ShareOrchestrator<E>,
    request: ToolRequest,
) -> ToolResponse {
    let id = request.id.clone();
    match handle_request(orchestrator, request).await {
        Ok(text) => ToolResponse::text(id, text),
        Err(err) => {
            debug!(kind = ?err.kind(), error = %err, "share request failed");
            ToolResponse::error(id, &err)
        }
    }
}

/// Handle one request, returning the human-readable reply text.
pub async fn handle_request<E: CommandExecutor>(
    orchestrator: &ShareOrchestrator<E>,
    request: ToolRequest,
) -> ShareResult<String> {
    let action = match request.action.as_deref().map(str::trim) {
        None | Some("") => {
            return Err(ShareError::InvalidRequest(
                "action is required. Valid: start|stop|list".to_string(),
            ));
        }
        Some(raw) => raw.parse::<ShareAction>().map_err(ShareError::InvalidRequest)?,
    };

    match action {
        ShareAction::Start => {
            let name = required_name(&request)?;
            let options = ShareOptions {
                port: parse_port(request.port.as_ref())?,
                no_auth: request.no_auth.unwrap_or(false),
            };
            orchestrator.start_share(name, &options).await
        }
        ShareAction::Stop => {
            let name = required_name(&request)?;
            orchestrator.stop_share(name).await?;
            Ok(format!("Stopped sharing server {}", name.trim()))
        }
        ShareAction::List => Ok(format_shared_list(orchestrator.list_shared())),
    }
}

fn required_name(request: &ToolRequest) -> ShareResult<&str> {
    match request.name.as_deref() {
        Some(name) if !name.trim().is_empty() => Ok(name),
        _ => Err(ShareError::InvalidName(
            "name argument is required".to_string(),
        )),
    }
}

/// An empty string means "no port", matching clients that always send the
/// field.
fn parse_port(port: Option<&PortArg>) -> ShareResult<Option<u16>> {
    let value = match port {
        None => return Ok(None),
        Some(PortArg::Text(s)) if s.trim().is_empty() => return Ok(None),
        Some(PortArg::Text(s)) => s.trim().parse::<u64>().ok(),
        Some(PortArg::Number(n)) => Some(*n),
    };

    match value {
        Some(n) if (1..=u16::MAX as u64).contains(&n) => Ok(Some(n as u16)),
        _ => Err(ShareError::InvalidRequest(format!(
            "invalid port {}; expected a number between 1 and 65535",
            describe_port(port)
        ))),
    }
}

fn describe_port(port: Option<&PortArg>) -> String {
    match port {
        Some(PortArg::Number(n)) => n.to_string(),
        Some(PortArg::Text(s)) => format!("'{s}'"),
        None => String::new(),
    }
}

fn format_shared_list(names: impl IntoIterator<Item = String>) -> String {
    let mut names = names.into_iter().peekable();
    if names.peek().is_none() {
        return "No servers are currently being shared.".to_string();
    }

    let mut out = String::from("Currently shared servers:\n");
    for name in names {
        out.push_str(&format!("- {name}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_parsing() {
        assert_eq!(parse_port(None).unwrap(), None);
        assert_eq!(parse_port(Some(&PortArg::Text(" ".into()))).unwrap(), None);
        assert_eq!(
            parse_port(Some(&PortArg::Text("9000".into()))).unwrap(),
            Some(9000)
        );
        assert_eq!(parse_port(Some(&PortArg::Number(8080))).unwrap(), Some(8080));

        for bad in [PortArg::Number(0), PortArg::Number(70000), PortArg::Text("http".into())] {
            assert!(matches!(
                parse_port(Some(&bad)),
                Err(ShareError::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn shared_list_text() {
        assert_eq!(
            format_shared_list(Vec::new()),
            "No servers are currently being shared."
        );
        assert_eq!(
            format_shared_list(vec!["a".to_string(), "b".to_string()]),
            "Currently shared servers:\n- a\n- b\n"
        );
    }
}
