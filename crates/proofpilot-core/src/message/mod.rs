//! Role-tagged conversation messages exchanged with chat models.
//!
//! A conversation is an ordered `Vec<Message>`. The one structural rule the
//! rest of the crate relies on: an [`Message::Ai`] carrying tool calls is
//! immediately followed by the [`Message::Tool`] results for those calls.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prefix used when a critic annotation is rendered as plain assistant text.
pub const CRITIC_PREFIX: &str = "[Critic]: ";

/// A tool invocation requested by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call identifier, echoed back in the tool result.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Named arguments.
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    Human {
        content: String,
    },
    Ai {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Output of the critique step. Never carries tool calls.
    Critic {
        content: String,
    },
    /// Result of a single tool call.
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::Human {
            content: content.into(),
        }
    }

    /// An assistant message without tool calls.
    pub fn ai(content: impl Into<String>) -> Self {
        Self::Ai {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn ai_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Ai {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn critic(content: impl Into<String>) -> Self {
        Self::Critic {
            content: content.into(),
        }
    }

    pub fn tool(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: content.into(),
        }
    }

    /// Text content of the message, whatever its role.
    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::Human { content }
            | Self::Ai { content, .. }
            | Self::Critic { content }
            | Self::Tool { content, .. } => content,
        }
    }

    /// Short role label, used in logs and transcripts.
    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::Human { .. } => "human",
            Self::Ai { .. } => "ai",
            Self::Critic { .. } => "critic",
            Self::Tool { .. } => "tool",
        }
    }

    /// Tool calls requested by this message (empty unless `Ai`).
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Ai { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::Tool { .. })
    }

    pub fn is_critic(&self) -> bool {
        matches!(self, Self::Critic { .. })
    }

    /// Drop any tool calls, keeping only the text.
    ///
    /// Used for replies to prompts that were told not to call tools, so an
    /// unpaired call never enters the history.
    pub fn into_text_only(self) -> Self {
        match self {
            Self::Ai { content, .. } => Self::ai(content),
            other => other,
        }
    }
}

/// Render a conversation as plain text, one message per paragraph.
pub fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| m.content())
        .collect::<Vec<_>>()
        .join("\n")
}
