//! Dispatch of a single tool call into tool-result messages.

use std::sync::Arc;

use crate::checker::{self, CheckVerdict};
use crate::message::{Message, ToolCall};

use super::CapabilityTable;

/// Result of dispatching one tool call.
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Name of the tool that was called.
    pub tool: String,
    /// Tool-result messages to append. Never empty.
    pub messages: Vec<Message>,
    /// Classified result, when the checker tool returned checker JSON.
    pub verdict: Option<CheckVerdict>,
    /// Proof-version hash reported at the transport level.
    pub hash: Option<String>,
}

impl Dispatch {
    pub fn is_checker(&self) -> bool {
        self.verdict.is_some()
    }

    /// The proof-version hash this call moves to, if any.
    ///
    /// A hash inside checker JSON describes the proof that was checked and
    /// wins over the transport-level one.
    pub fn proof_hash(&self) -> Option<&str> {
        let transport = self.hash.as_deref().filter(|h| !h.is_empty());
        let body = self
            .verdict
            .as_ref()
            .and_then(|v| v.hash.as_deref())
            .filter(|h| !h.is_empty());
        if let (Some(t), Some(b)) = (transport, body) {
            if t != b {
                tracing::warn!(
                    tool = %self.tool,
                    transport_hash = %t,
                    checker_hash = %b,
                    "tool result carries two different proof hashes, using the checker's"
                );
            }
        }
        body.or(transport)
    }
}

/// Routes tool calls to the capability table and renders the results.
#[derive(Debug, Clone)]
pub struct ToolGateway {
    table: Arc<CapabilityTable>,
    checker_tool: String,
}

impl ToolGateway {
    pub fn new(table: Arc<CapabilityTable>, checker_tool: impl Into<String>) -> Self {
        Self {
            table,
            checker_tool: checker_tool.into(),
        }
    }

    pub fn table(&self) -> &CapabilityTable {
        &self.table
    }

    pub fn checker_tool(&self) -> &str {
        &self.checker_tool
    }

    /// Invoke `call` and turn its outcome into a tool-result message.
    ///
    /// Failures (unknown tool, transport or server errors) are rendered as
    /// the tool result so the model can react to them.
    pub async fn dispatch(&self, call: &ToolCall) -> Dispatch {
        let Some(adapter) = self.table.get(&call.name) else {
            tracing::warn!(tool = %call.name, "model requested unknown tool");
            let content = format!(
                "Error: {} is not a valid tool, try one of [{}].",
                call.name,
                self.table.names().join(", ")
            );
            return Dispatch {
                tool: call.name.clone(),
                messages: vec![Message::tool(&call.id, &call.name, content)],
                verdict: None,
                hash: None,
            };
        };

        tracing::info!(tool = %call.name, "calling tool");
        match adapter.invoke(call.args.clone()).await {
            Ok(reply) => {
                let verdict = (call.name == self.checker_tool)
                    .then(|| checker::parse_output(&reply.text))
                    .flatten()
                    .map(|resp| checker::classify(&resp));
                let content = verdict
                    .as_ref()
                    .map(|v| v.feedback.clone())
                    .unwrap_or(reply.text);
                if let Some(v) = &verdict {
                    tracing::info!(tool = %call.name, outcome = ?v.outcome, "checker result");
                }
                Dispatch {
                    tool: call.name.clone(),
                    messages: vec![Message::tool(&call.id, &call.name, content)],
                    verdict,
                    hash: reply.hash,
                }
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                Dispatch {
                    tool: call.name.clone(),
                    messages: vec![Message::tool(
                        &call.id,
                        &call.name,
                        format!("Error: {e:#}\n Please fix your mistakes."),
                    )],
                    verdict: None,
                    hash: None,
                }
            }
        }
    }
}
