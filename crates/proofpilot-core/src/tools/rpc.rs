//! JSON-RPC 2.0 client for the tool server.
//!
//! Requests are HTTP POSTs. Replies arrive either as a plain JSON body or
//! as a server-sent-events stream. In a stream, notifications and frames for
//! other request ids are skipped until the response to our request arrives. The session identifier handed out by `initialize` travels in
//! the `mcp-session-id` header on every later request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::sse::data_frames;
use super::{ToolDescriptor, ToolReply, ToolTransport};

/// Header carrying the tool-server session identifier.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Protocol revision announced during `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

const ACCEPT_VALUE: &str = "application/json, text/event-stream";

/// Errors specific to the tool-server protocol.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("no {SESSION_HEADER} header in initialize response")]
    MissingSessionHeader,

    #[error("{method} returned HTTP {status}")]
    Status { method: String, status: u16 },

    #[error("{method}: stream ended without data")]
    StreamEnded { method: String },

    #[error("tool server error: {0}")]
    Server(String),

    #[error("{method}: malformed reply: {reason}")]
    Malformed { method: String, reason: String },
}

/// `clientInfo` sent during `initialize`.
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "proofpilot".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Connected tool-server client. Construct with [`RpcToolClient::connect`].
#[derive(Debug)]
pub struct RpcToolClient {
    url: String,
    client: reqwest::Client,
    session_id: String,
    next_id: AtomicU64,
}

impl RpcToolClient {
    /// Perform the `initialize` handshake and return a ready client.
    pub async fn connect(url: impl Into<String>, client_info: ClientInfo) -> Result<Self> {
        Self::connect_with_timeout(url, client_info, None).await
    }

    pub async fn connect_with_timeout(
        url: impl Into<String>,
        client_info: ClientInfo,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let url = url.into();
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build().context("failed to build HTTP client")?;

        let payload = json!({
            "jsonrpc": "2.0",
            "method": "initialize",
            "params": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": client_info,
            },
            "id": 1,
        });

        let resp = client
            .post(&url)
            .header(ACCEPT, ACCEPT_VALUE)
            .header(CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("initialize request to {url} failed"))?;

        if !resp.status().is_success() {
            return Err(RpcError::Status {
                method: "initialize".to_string(),
                status: resp.status().as_u16(),
            }
            .into());
        }

        let session_id = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(RpcError::MissingSessionHeader)?;

        debug!(url = %url, session_id = %session_id, "tool server session initialized");

        Ok(Self {
            url,
            client,
            session_id,
            next_id: AtomicU64::new(2),
        })
    }

    /// Session identifier assigned by the server.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send one request and return the JSON-RPC response that answers it.
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let resp = self
            .client
            .post(&self.url)
            .header(ACCEPT, ACCEPT_VALUE)
            .header(CONTENT_TYPE, "application/json")
            .header(SESSION_HEADER, &self.session_id)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("{method} request to {} failed", self.url))?;

        if !resp.status().is_success() {
            return Err(RpcError::Status {
                method: method.to_string(),
                status: resp.status().as_u16(),
            }
            .into());
        }

        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            return resp
                .json::<Value>()
                .await
                .with_context(|| format!("{method}: invalid JSON body"));
        }

        let frames = data_frames(resp.bytes_stream());
        futures::pin_mut!(frames);
        while let Some(frame) = frames.next().await {
            let frame = frame.with_context(|| format!("{method}: failed reading stream"))?;
            let msg: Value = serde_json::from_str(&frame).map_err(|e| RpcError::Malformed {
                method: method.to_string(),
                reason: e.to_string(),
            })?;
            if answers_request(&msg, id) {
                return Ok(msg);
            }
            debug!(method, frame = %frame, "skipping stream frame");
        }
        Err(RpcError::StreamEnded {
            method: method.to_string(),
        }
        .into())
    }
}

/// Whether `msg` is the response to request `id` rather than a notification
/// or a reply to some other request.
fn answers_request(msg: &Value, id: u64) -> bool {
    if msg.get("result").is_none() && msg.get("error").is_none() {
        return false;
    }
    match msg.get("id") {
        None | Some(Value::Null) => true,
        Some(Value::Number(n)) => n.as_u64() == Some(id),
        Some(Value::String(s)) => s.parse::<u64>().ok() == Some(id),
        Some(_) => false,
    }
}

#[async_trait]
impl ToolTransport for RpcToolClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let msg = self.request("tools/list", json!({})).await?;
        if let Some(err) = msg.get("error") {
            return Err(RpcError::Server(err.to_string()).into());
        }
        let tools = msg
            .get("result")
            .and_then(|r| r.get("tools"))
            .cloned()
            .ok_or_else(|| RpcError::Malformed {
                method: "tools/list".to_string(),
                reason: "missing result.tools".to_string(),
            })?;
        serde_json::from_value(tools).map_err(|e| {
            RpcError::Malformed {
                method: "tools/list".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolReply> {
        let msg = self
            .request(
                "tools/call",
                json!({"name": name, "arguments": Value::Object(arguments)}),
            )
            .await?;
        parse_call_reply(&msg)
    }
}

/// Extract the tool output and optional new hash from a `tools/call` reply.
pub fn parse_call_reply(msg: &Value) -> Result<ToolReply> {
    if let Some(err) = msg.get("error") {
        let text = err
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(RpcError::Server(text).into());
    }

    let malformed = |reason: &str| RpcError::Malformed {
        method: "tools/call".to_string(),
        reason: reason.to_string(),
    };

    let result = msg.get("result").ok_or_else(|| malformed("missing result"))?;
    let text = result
        .get("content")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("text"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| malformed("missing result.content[0].text"))?
        .to_string();
    let hash = result
        .get("hash")
        .and_then(|h| h.as_str())
        .map(str::to_string);

    Ok(ToolReply { text, hash })
}
