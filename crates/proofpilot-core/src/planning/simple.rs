//! Single-shot plan generation.

use anyhow::{Context, Result};

use crate::message::Message;
use crate::model::{ChatModel, ToolSpec};
use crate::prompts;

/// Ask `planner` for one numbered proof plan.
pub async fn generate_plan(
    planner: &dyn ChatModel,
    theorem: &str,
    tools: &[ToolSpec],
) -> Result<String> {
    let messages = [
        Message::system(prompts::SIMPLE_PLAN_SYSTEM),
        Message::human(prompts::simple_plan_request(tools, theorem)),
    ];
    let reply = planner
        .invoke(&messages, &[])
        .await
        .with_context(|| format!("planner {} failed", planner.name()))?;
    Ok(reply.content().trim().to_string())
}
