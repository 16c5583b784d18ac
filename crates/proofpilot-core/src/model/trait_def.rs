//! The `ChatModel` trait -- the adapter interface for model backends.
//!
//! The trait is object-safe so backends can be stored as
//! `Arc<dyn ChatModel>` in the [`super::ModelRegistry`].

use anyhow::Result;
use async_trait::async_trait;

use super::ToolSpec;
use crate::message::Message;

/// A chat model: ordered role-tagged messages in, one message out.
///
/// Implementations must return a [`Message::Ai`]. Retries, backoff and
/// timeouts are the backend's business; the orchestrator waits for as long
/// as the call takes.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Human-readable name for this model (e.g. the profile name).
    fn name(&self) -> &str;

    /// Produce the next message for `messages`.
    ///
    /// `tools` lists the tools the model may call. An empty slice means the
    /// model is expected to answer in text only.
    async fn invoke(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message>;
}

// Compile-time assertion: ChatModel must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn ChatModel) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        async fn invoke(&self, messages: &[Message], _tools: &[ToolSpec]) -> Result<Message> {
            let last = messages.last().map(|m| m.content()).unwrap_or_default();
            Ok(Message::ai(last))
        }
    }

    #[tokio::test]
    async fn echo_model_is_usable_as_trait_object() {
        let model: Box<dyn ChatModel> = Box::new(EchoModel);
        assert_eq!(model.name(), "echo");

        let reply = model
            .invoke(&[Message::human("hello")], &[])
            .await
            .unwrap();
        assert_eq!(reply, Message::ai("hello"));
    }
}
