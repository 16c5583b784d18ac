//! Project metadata and proof-checking service.
//!
//! [`ProofService`] is the seam the orchestrator talks through;
//! [`RestProofService`] is the HTTP implementation.

pub mod rest;

pub use rest::RestProofService;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of premises requested per goal.
pub const DEFAULT_MAX_PREMISES: u32 = 20;

/// Reply to `start_session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub session_id: String,
    pub proof_version_hash: String,
}

/// Statement of the theorem under proof, as seen by a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTheorem {
    pub theorem_statement: String,
    /// Everything else the service sent along.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A proved theorem from the project, used as an in-context exemplar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TheoremSource {
    #[serde(default)]
    pub theorem_statement: String,
    #[serde(default)]
    pub theorem_proof: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Premises {
    #[serde(default)]
    pub premises: Vec<String>,
}

/// Raw result of a proof check.
///
/// The checker's `error` field is sometimes a string and sometimes a
/// structured object, so it is kept as a JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckProofResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<Vec<Value>>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempted_proof: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl CheckProofResponse {
    /// The `error` field, treating `null`, `false` and `""` as unset.
    pub fn error_text(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Operations of the project/checker service used by a run.
#[async_trait]
pub trait ProofService: Send + Sync {
    /// Open a proof session for `theorem_name` in `file_path`.
    async fn start_session(&self, file_path: &str, theorem_name: &str) -> Result<SessionStart>;

    async fn get_session_theorem(
        &self,
        session_id: &str,
        proof_version_hash: &str,
    ) -> Result<SessionTheorem>;

    async fn check_proof(
        &self,
        proof: &str,
        session_id: &str,
        proof_version_hash: &str,
    ) -> Result<CheckProofResponse>;

    /// Names of theorems related to `goal` (a JSON-encoded goal).
    async fn get_premises(&self, goal: &str, file_path: &str, session_id: &str)
    -> Result<Premises>;

    async fn get_theorem(
        &self,
        file_path: &str,
        theorem_name: &str,
        session_id: &str,
        proof_version_hash: &str,
    ) -> Result<TheoremSource>;

    /// Close the session and release its resources.
    async fn finish_session(&self, session_id: &str) -> Result<()>;
}
