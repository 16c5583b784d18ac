//! Tool-server access: transport, capability table and dispatch.
//!
//! ```text
//! RpcToolClient (JSON-RPC over HTTP, SSE replies)
//!     ^ ToolTransport
//!     |
//! CapabilityTable { name -> ToolAdapter }   built once per session
//!     |   adapter injects coqSessionId / proofVersionHash
//!     v
//! ToolGateway::dispatch(first pending call) --> tool-result Message
//! ```

pub mod capability;
pub mod gateway;
pub mod rpc;
pub mod sse;

pub use capability::{CapabilityTable, ToolAdapter};
pub use gateway::{Dispatch, ToolGateway};
pub use rpc::{ClientInfo, RpcError, RpcToolClient};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Argument carrying the checker session id.
pub const SESSION_ID_ARG: &str = "coqSessionId";
/// Argument carrying the proof-version hash.
pub const PROOF_HASH_ARG: &str = "proofVersionHash";

/// A tool as advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

/// Output of one `tools/call`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReply {
    /// Text of the first content chunk.
    pub text: String,
    /// New proof-version hash, when the server reported one.
    pub hash: Option<String>,
}

/// Wire access to the tool server.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke `name` with fully prepared arguments.
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolReply>;
}
