//! OpenAI-compatible chat-completions backend.
//!
//! Sends `POST <base_url>/chat/completions` and maps the first choice back
//! into a [`Message::Ai`], including any `tool_calls`.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::ToolSpec;
use super::trait_def::ChatModel;
use crate::message::{CRITIC_PREFIX, Message, ToolCall};

/// Connection and sampling settings for one model profile.
#[derive(Debug, Clone)]
pub struct OpenAiCompatSettings {
    /// Profile name the model is registered under.
    pub name: String,
    /// Base URL up to and including the API version (e.g. `https://api.openai.com/v1`).
    pub base_url: String,
    /// Model identifier sent in the request body.
    pub model: String,
    /// Bearer token, if the endpoint requires one.
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

/// A [`ChatModel`] backed by any OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatModel {
    settings: OpenAiCompatSettings,
    client: reqwest::Client,
}

impl OpenAiCompatModel {
    pub fn new(settings: OpenAiCompatSettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build HTTP client")?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn build_payload(&self, messages: &[Message], tools: &[ToolSpec]) -> Value {
        let mut payload = json!({
            "model": self.settings.model,
            "messages": messages.iter().map(encode_message).collect::<Vec<_>>(),
        });
        if let Some(t) = self.settings.temperature {
            payload["temperature"] = json!(t);
        }
        if let Some(max) = self.settings.max_tokens {
            payload["max_tokens"] = json!(max);
        }
        if !tools.is_empty() {
            payload["tools"] = Value::Array(tools.iter().map(encode_tool).collect());
        }
        payload
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatModel {
    fn name(&self) -> &str {
        &self.settings.name
    }

    async fn invoke(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message> {
        let payload = self.build_payload(messages, tools);
        let mut request = self.client.post(self.endpoint()).json(&payload);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }

        debug!(
            model = %self.settings.name,
            messages = messages.len(),
            tools = tools.len(),
            "sending chat completion request"
        );

        let resp = request
            .send()
            .await
            .with_context(|| format!("chat request to {} failed", self.settings.name))?;
        let status = resp.status();
        let raw: Value = resp
            .json()
            .await
            .with_context(|| format!("invalid JSON from {}", self.settings.name))?;
        if !status.is_success() {
            bail!(
                "model {} returned {}: {}",
                self.settings.name,
                status.as_u16(),
                raw
            );
        }

        decode_response(&raw)
    }
}

// ---------------------------------------------------------------------------
// Wire mapping
// ---------------------------------------------------------------------------

fn encode_message(message: &Message) -> Value {
    match message {
        Message::System { content } => json!({"role": "system", "content": content}),
        Message::Human { content } => json!({"role": "user", "content": content}),
        Message::Ai {
            content,
            tool_calls,
        } => {
            let mut v = json!({"role": "assistant", "content": content});
            if !tool_calls.is_empty() {
                v["tool_calls"] = Value::Array(
                    tool_calls
                        .iter()
                        .map(|c| {
                            json!({
                                "id": c.id,
                                "type": "function",
                                "function": {
                                    "name": c.name,
                                    "arguments": Value::Object(c.args.clone()).to_string(),
                                }
                            })
                        })
                        .collect(),
                );
            }
            v
        }
        Message::Critic { content } => {
            json!({"role": "assistant", "content": format!("{CRITIC_PREFIX}{content}")})
        }
        Message::Tool {
            tool_call_id,
            content,
            ..
        } => json!({"role": "tool", "tool_call_id": tool_call_id, "content": content}),
    }
}

fn encode_tool(tool: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

/// Map `choices[0].message` of a chat-completions response to a [`Message`].
fn decode_response(raw: &Value) -> Result<Message> {
    let message = raw
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .context("missing choices[0].message in chat response")?;

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(|c| c.as_array()) {
        for (idx, call) in calls.iter().enumerate() {
            let id = call
                .get("id")
                .and_then(|i| i.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("call_{idx}"));
            let Some(function) = call.get("function") else {
                warn!(id = %id, "tool call without function block, skipping");
                continue;
            };
            let name = function
                .get("name")
                .and_then(|n| n.as_str())
                .unwrap_or("unknown")
                .to_string();
            let args = decode_arguments(function.get("arguments"));
            tool_calls.push(ToolCall { id, name, args });
        }
    }

    Ok(Message::Ai {
        content,
        tool_calls,
    })
}

/// Arguments arrive as a JSON-encoded string (or, from some servers, as an
/// object). Anything unparseable becomes an empty map.
fn decode_arguments(raw: Option<&Value>) -> Map<String, Value> {
    match raw {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) if s.trim().is_empty() => Map::new(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                warn!(arguments = %other, "tool arguments are not an object, dropping");
                Map::new()
            }
            Err(e) => {
                warn!(error = %e, "malformed tool arguments, dropping");
                Map::new()
            }
        },
        _ => Map::new(),
    }
}
