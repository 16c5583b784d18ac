//! Language-model boundary.
//!
//! This module defines the [`ChatModel`] trait every backend implements,
//! the [`ToolSpec`] schema handed to models that may call tools, the
//! [`ModelRegistry`] for runtime lookup by profile name, and the
//! [`ModelRoles`] bundle the orchestrator is driven by.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator / InnerExecutor
//!     |
//!     v
//! ModelRoles { executor, critic, replanner, ... }  (Arc<dyn ChatModel>)
//!     ^
//!     |  resolve(assignments)
//! ModelRegistry --get("sonnet")--> Arc<dyn ChatModel>
//!     |
//!     v
//! invoke(messages, tools) --> Message::Ai { content, tool_calls }
//! ```

pub mod openai;
pub mod registry;
pub mod roles;
pub mod trait_def;

pub use openai::OpenAiCompatModel;
pub use registry::ModelRegistry;
pub use roles::{ModelRole, ModelRoles};
pub use trait_def::ChatModel;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool description offered to a model that is allowed to call tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments the model must supply.
    pub parameters: Value,
}
