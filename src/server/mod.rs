// src/server/mod.rs

//! The `share` tool as seen by a tool-calling client.
//!
//! - [`handler`] turns one [`ToolRequest`] into a call on the
//!   `ShareOrchestrator` and formats the reply text.
//! - [`runtime`] is the stdio loop: JSON requests in, JSON responses out,
//!   one per line.

pub mod handler;
pub mod runtime;

use serde::{Deserialize, Serialize};

use crate::errors::{ShareError, ShareErrorKind};

pub use handler::{dispatch, handle_request};
pub use runtime::serve;

/// A call to the `share` tool.
///
/// ```json
/// {"id": 7, "action": "start", "name": "filesystem", "port": "9000", "no_auth": true}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolRequest {
    /// Opaque correlation id, echoed back in the response.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub port: Option<PortArg>,
    #[serde(default)]
    pub no_auth: Option<bool>,
}

/// Port as sent by clients: either a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PortArg {
    Number(u64),
    Text(String),
}

/// Reply to a [`ToolRequest`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ShareErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ToolResponse {
    pub fn text(id: Option<serde_json::Value>, text: impl Into<String>) -> Self {
        Self {
            id,
            ok: true,
            text: Some(text.into()),
            kind: None,
            message: None,
        }
    }

    pub fn error(id: Option<serde_json::Value>, err: &ShareError) -> Self {
        Self {
            id,
            ok: false,
            text: None,
            kind: Some(err.kind()),
            message: Some(err.to_string()),
        }
    }
}
