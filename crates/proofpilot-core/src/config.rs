//! Tunables for planning and proof execution.
//!
//! All fields have defaults, so an empty `[agent]` table (or none at all)
//! in the config file yields [`AgentConfig::default`].

use serde::{Deserialize, Serialize};

/// How candidate plans are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanningMode {
    /// One model call per plan.
    #[default]
    Simple,
    /// Two debaters argue for several rounds; a judge writes the plan.
    Debate,
}

impl std::fmt::Display for PlanningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => f.write_str("simple"),
            Self::Debate => f.write_str("debate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    pub mode: PlanningMode,
    /// Number of candidate plans to generate.
    pub plan_samples_number: usize,
    /// Number of top-ranked plans to attempt.
    pub best_plan_samples_number: usize,
    /// Debate rounds (one A turn plus one B turn each).
    pub rounds_number: usize,
    /// Upper bound on concurrent plan generations.
    pub max_parallel_generations: usize,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            mode: PlanningMode::Simple,
            plan_samples_number: 7,
            best_plan_samples_number: 3,
            rounds_number: 5,
            max_parallel_generations: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProofFlowConfig {
    /// Tool results per plan attempt before giving up.
    pub max_tool_iterations: usize,
    /// History length that triggers summarization.
    pub max_raw_messages: usize,
    /// Minimum number of recent messages kept verbatim by summarization.
    pub tail_size: usize,
    /// Consecutive invalid proofs that trigger a critique.
    pub critique_after_failures: u32,
    /// Name of the proof-checking tool.
    pub checker_tool: String,
}

impl Default for ProofFlowConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: 20,
            max_raw_messages: 60,
            tail_size: 20,
            critique_after_failures: 5,
            checker_tool: "check_proof".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub planning: PlanningConfig,
    pub proof_flow: ProofFlowConfig,
}
