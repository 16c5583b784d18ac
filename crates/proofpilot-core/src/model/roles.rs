//! The model roles an agent run is driven by.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::registry::ModelRegistry;
use super::trait_def::ChatModel;

/// Every distinct model role in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    /// Drives the proof attempt and issues tool calls.
    Executor,
    Critic,
    Replanner,
    /// Compacts long attempt histories.
    Summarizer,
    /// Explains why a whole plan attempt failed.
    FailureSummarizer,
    SimilarAnalyzer,
    Ranker,
    /// Single-shot plan generation.
    Planner,
    DebaterA,
    DebaterB,
    Judge,
}

impl ModelRole {
    pub const ALL: [ModelRole; 11] = [
        ModelRole::Executor,
        ModelRole::Critic,
        ModelRole::Replanner,
        ModelRole::Summarizer,
        ModelRole::FailureSummarizer,
        ModelRole::SimilarAnalyzer,
        ModelRole::Ranker,
        ModelRole::Planner,
        ModelRole::DebaterA,
        ModelRole::DebaterB,
        ModelRole::Judge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executor => "executor",
            Self::Critic => "critic",
            Self::Replanner => "replanner",
            Self::Summarizer => "summarizer",
            Self::FailureSummarizer => "failure_summarizer",
            Self::SimilarAnalyzer => "similar_analyzer",
            Self::Ranker => "ranker",
            Self::Planner => "planner",
            Self::DebaterA => "debater_a",
            Self::DebaterB => "debater_b",
            Self::Judge => "judge",
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelRole {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| RoleError::UnknownRole(s.to_string()))
    }
}

/// Errors from parsing roles or resolving them against a registry.
#[derive(Debug, thiserror::Error)]
pub enum RoleError {
    #[error("unknown model role {0:?}")]
    UnknownRole(String),

    #[error("role {role} refers to unknown model {model:?}")]
    UnknownModel { role: ModelRole, model: String },
}

/// One chat model per role.
#[derive(Clone)]
pub struct ModelRoles {
    pub executor: Arc<dyn ChatModel>,
    pub critic: Arc<dyn ChatModel>,
    pub replanner: Arc<dyn ChatModel>,
    pub summarizer: Arc<dyn ChatModel>,
    pub failure_summarizer: Arc<dyn ChatModel>,
    pub similar_analyzer: Arc<dyn ChatModel>,
    pub ranker: Arc<dyn ChatModel>,
    pub planner: Arc<dyn ChatModel>,
    pub debater_a: Arc<dyn ChatModel>,
    pub debater_b: Arc<dyn ChatModel>,
    pub judge: Arc<dyn ChatModel>,
}

impl ModelRoles {
    /// Use the same model for every role.
    pub fn uniform(model: Arc<dyn ChatModel>) -> Self {
        Self {
            executor: Arc::clone(&model),
            critic: Arc::clone(&model),
            replanner: Arc::clone(&model),
            summarizer: Arc::clone(&model),
            failure_summarizer: Arc::clone(&model),
            similar_analyzer: Arc::clone(&model),
            ranker: Arc::clone(&model),
            planner: Arc::clone(&model),
            debater_a: Arc::clone(&model),
            debater_b: Arc::clone(&model),
            judge: model,
        }
    }

    /// Resolve every role to a registered model.
    ///
    /// Roles missing from `assignments` fall back to `default_model`.
    pub fn resolve(
        registry: &ModelRegistry,
        assignments: &HashMap<ModelRole, String>,
        default_model: &str,
    ) -> Result<Self, RoleError> {
        let pick = |role: ModelRole| -> Result<Arc<dyn ChatModel>, RoleError> {
            let name = assignments
                .get(&role)
                .map(String::as_str)
                .unwrap_or(default_model);
            registry.get(name).ok_or_else(|| RoleError::UnknownModel {
                role,
                model: name.to_string(),
            })
        };

        Ok(Self {
            executor: pick(ModelRole::Executor)?,
            critic: pick(ModelRole::Critic)?,
            replanner: pick(ModelRole::Replanner)?,
            summarizer: pick(ModelRole::Summarizer)?,
            failure_summarizer: pick(ModelRole::FailureSummarizer)?,
            similar_analyzer: pick(ModelRole::SimilarAnalyzer)?,
            ranker: pick(ModelRole::Ranker)?,
            planner: pick(ModelRole::Planner)?,
            debater_a: pick(ModelRole::DebaterA)?,
            debater_b: pick(ModelRole::DebaterB)?,
            judge: pick(ModelRole::Judge)?,
        })
    }

    /// Model assigned to `role`.
    pub fn get(&self, role: ModelRole) -> &Arc<dyn ChatModel> {
        match role {
            ModelRole::Executor => &self.executor,
            ModelRole::Critic => &self.critic,
            ModelRole::Replanner => &self.replanner,
            ModelRole::Summarizer => &self.summarizer,
            ModelRole::FailureSummarizer => &self.failure_summarizer,
            ModelRole::SimilarAnalyzer => &self.similar_analyzer,
            ModelRole::Ranker => &self.ranker,
            ModelRole::Planner => &self.planner,
            ModelRole::DebaterA => &self.debater_a,
            ModelRole::DebaterB => &self.debater_b,
            ModelRole::Judge => &self.judge,
        }
    }
}

impl fmt::Debug for ModelRoles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ModelRoles");
        for role in ModelRole::ALL {
            s.field(role.as_str(), &self.get(role).name());
        }
        s.finish()
    }
}
