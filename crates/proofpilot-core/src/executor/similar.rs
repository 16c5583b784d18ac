//! Lookup of proved theorems related to the current goals.

use anyhow::{Context, Result};
use serde_json::Value;

use crate::service::ProofService;
use crate::state::ProofSession;

/// For each goal, ask for related premises and fetch their full
/// statement and proof. Results keep the service's relevance order,
/// goal by goal.
pub async fn similar_theorems(
    service: &dyn ProofService,
    session: &ProofSession,
    goals: &[Value],
    proof_version_hash: &str,
) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for goal in goals {
        let goal_json = match goal {
            Value::String(s) => s.clone(),
            Value::Object(_) => goal.to_string(),
            other => {
                tracing::warn!(goal = %other, "skipping goal of unexpected shape");
                continue;
            }
        };
        let premises = service
            .get_premises(&goal_json, &session.file_path, &session.session_id)
            .await
            .context("premise lookup failed")?;
        names.extend(premises.premises);
    }

    let mut theorems = Vec::with_capacity(names.len());
    for name in &names {
        let theorem = service
            .get_theorem(
                &session.file_path,
                name,
                &session.session_id,
                proof_version_hash,
            )
            .await
            .with_context(|| format!("failed to fetch theorem {name}"))?;
        theorems.push(format!(
            "{}\n{}",
            theorem.theorem_statement, theorem.theorem_proof
        ));
    }

    tracing::debug!(goals = goals.len(), theorems = theorems.len(), "fetched similar theorems");
    Ok(theorems)
}
