//! States of the per-plan machine and the pure transition predicate.

use std::fmt;

use serde::Serialize;

use crate::config::ProofFlowConfig;

/// A node of the per-plan state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InnerState {
    CallLlm,
    CallTool,
    Critique,
    FetchSimilar,
    Replan,
    Summarize,
    EarlyStop,
}

impl InnerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CallLlm => "call_llm",
            Self::CallTool => "call_tool",
            Self::Critique => "critique",
            Self::FetchSimilar => "fetch_similar",
            Self::Replan => "replan",
            Self::Summarize => "summarize",
            Self::EarlyStop => "early_stop",
        }
    }
}

impl fmt::Display for InnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the predicate looks at after a tool call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub proof_finished: bool,
    pub tool_iterations: usize,
    pub last_tool_was_checker: bool,
    pub failure_streak: u32,
    pub message_count: usize,
    pub last_is_critic: bool,
    pub last_has_tool_call: bool,
}

/// Next state after `CallTool`. Rules are checked in priority order.
pub fn after_tool_call(s: &Snapshot, limits: &ProofFlowConfig) -> InnerState {
    if s.proof_finished || s.tool_iterations >= limits.max_tool_iterations {
        InnerState::EarlyStop
    } else if s.last_tool_was_checker && s.failure_streak >= limits.critique_after_failures {
        InnerState::Critique
    } else if s.message_count > limits.max_raw_messages {
        InnerState::Summarize
    } else if s.last_is_critic {
        InnerState::Replan
    } else if s.last_has_tool_call {
        InnerState::CallTool
    } else {
        InnerState::CallLlm
    }
}

/// Successor of the states whose next state never depends on the run.
pub fn fixed_successor(state: InnerState) -> Option<InnerState> {
    match state {
        InnerState::Critique => Some(InnerState::FetchSimilar),
        InnerState::FetchSimilar => Some(InnerState::Replan),
        InnerState::Replan | InnerState::Summarize => Some(InnerState::CallLlm),
        InnerState::CallLlm | InnerState::CallTool | InnerState::EarlyStop => None,
    }
}
