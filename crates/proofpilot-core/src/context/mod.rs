//! Context compaction for long attempt histories.
//!
//! The history is split into a prefix that gets summarized and a suffix
//! that is kept verbatim. The suffix holds at least `tail_size` messages and
//! never starts with a tool result, so a tool call and its result are
//! always kept or dropped together.

use anyhow::{Context, Result};

use crate::message::{Message, transcript};
use crate::model::ChatModel;
use crate::prompts;

/// Index where the kept suffix of `history` starts.
///
/// Starts `tail_size` messages from the end and moves backwards while the
/// suffix would begin with a tool result.
pub fn split_for_compaction(history: &[Message], tail_size: usize) -> usize {
    let mut start = history.len().saturating_sub(tail_size);
    while start > 0 && history[start].is_tool_result() {
        start -= 1;
    }
    start
}

/// Outcome of one compaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Compaction {
    /// Bullet summary of the dropped prefix.
    pub summary: String,
    /// Number of messages summarized away.
    pub compressed: usize,
}

/// Summarize everything before the kept suffix and drop it from `history`.
///
/// Returns `None` when there is nothing to compress.
pub async fn compact(
    history: &mut Vec<Message>,
    tail_size: usize,
    summarizer: &dyn ChatModel,
) -> Result<Option<Compaction>> {
    let start = split_for_compaction(history, tail_size);
    if start == 0 {
        return Ok(None);
    }

    let prompt = prompts::summarize_progress(&transcript(&history[..start]));
    let reply = summarizer
        .invoke(&[Message::human(prompt)], &[])
        .await
        .context("progress summarizer call failed")?;

    history.drain(..start);

    Ok(Some(Compaction {
        summary: reply.content().trim().to_string(),
        compressed: start,
    }))
}
