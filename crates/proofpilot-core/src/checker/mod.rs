//! Classification of proof-checker results.
//!
//! [`classify`] never touches proof state: it maps one
//! [`CheckProofResponse`] to an outcome category plus the feedback text the
//! executor model sees in place of the raw JSON. Applying the verdict to the
//! proof state is the tracker's job.

use serde::Serialize;
use serde_json::Value;

use crate::service::CheckProofResponse;

/// Message of a whole proof that checks but leaves goals open.
pub const PARTIAL_SENTINEL: &str = "Proof is incomplete but valid so far";

/// Prefix of the message for a closed branch with goals left elsewhere.
pub const BRANCH_PARTIAL_PREFIX: &str =
    "Your proof is incomplete but valid so far. It has the following goal at the depth";

/// Message of a finished proof.
pub const COMPLETE_SENTINEL: &str = "Proof complete and valid";

/// Outcome category of one checker call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CheckOutcome {
    /// The proof failed to check. Counts toward the failure streak.
    InvalidProof,
    /// The checker itself failed. Does not count toward the streak.
    TransportError,
    /// Valid so far with goals remaining. `branch` is set when only the
    /// current branch was closed.
    Partial { branch: bool },
    Complete,
    /// A successful result with a message this client does not know.
    Unrecognized,
}

/// A classified checker result.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckVerdict {
    pub outcome: CheckOutcome,
    /// Text shown to the executor model as the tool result.
    pub feedback: String,
    /// New goal set, when the result carries one.
    pub goals: Option<Vec<Value>>,
    /// Proof text, set only when the proof is finished.
    pub finished_proof: Option<String>,
    pub hash: Option<String>,
}

/// Parse a checker tool's text output. `None` if it is not checker JSON.
pub fn parse_output(text: &str) -> Option<CheckProofResponse> {
    serde_json::from_str(text).ok()
}

/// True when the result closes the proof: success, no goals left, and not
/// the whole-proof partial message.
pub fn is_finished(resp: &CheckProofResponse) -> bool {
    resp.success
        && resp.goals.as_ref().is_none_or(|g| g.is_empty())
        && resp.message != PARTIAL_SENTINEL
}

pub fn classify(resp: &CheckProofResponse) -> CheckVerdict {
    let goals_text = render_goals(resp.goals.as_deref());
    let proof = resp.proof.clone().unwrap_or_default();

    let (outcome, feedback) = if !resp.success {
        match resp.error_text() {
            None => (
                CheckOutcome::InvalidProof,
                format!(
                    "Unfortunately, the last proof you checked is not valid:\n{}\n\
                     It fails with the error: {}\n\
                     But it has a valid prefix {}\n\
                     The goals after this prefix are {}\n\
                     Please continue to prove the theorem taking the valid prefix into account",
                    resp.attempted_proof.as_deref().unwrap_or_default(),
                    resp.message,
                    resp.valid_prefix.as_deref().unwrap_or_default(),
                    goals_text,
                ),
            ),
            Some(error) => (
                CheckOutcome::TransportError,
                format!(
                    "I couldn't check the last proof you sent. I got {error} \
                     Please try again to check proof but avoid using admits and \
                     non-obligatory goal focusing."
                ),
            ),
        }
    } else if resp.message == PARTIAL_SENTINEL {
        (
            CheckOutcome::Partial { branch: false },
            format!(
                "The proof you just checked has no errors but is incomplete:\n{proof}\n\
                 The current goals are {goals_text}\n\
                 Please continue to prove the theorem taking the valid prefix into account"
            ),
        )
    } else if resp.message.starts_with(BRANCH_PARTIAL_PREFIX) {
        (
            CheckOutcome::Partial { branch: true },
            format!(
                "The proof you just checked has no errors but is incomplete:\n{proof}\n\
                 You have successfully proved the current branch but there are goals \
                 in another branch. {goals_text}\n\
                 Please continue to prove the theorem taking the valid prefix into account"
            ),
        )
    } else if resp.message == COMPLETE_SENTINEL {
        (CheckOutcome::Complete, "Proof is complete".to_string())
    } else {
        (CheckOutcome::Unrecognized, resp.message.clone())
    };

    let goals = match outcome {
        CheckOutcome::TransportError => None,
        _ => resp.goals.clone(),
    };

    let finished_proof = if is_finished(resp) {
        let text = finished_text(resp);
        if text.is_none() {
            tracing::warn!(
                checker_message = %resp.message,
                "finished check result carries no proof text"
            );
        }
        text
    } else {
        None
    };

    CheckVerdict {
        outcome,
        feedback,
        goals,
        finished_proof,
        hash: resp.hash.clone(),
    }
}

/// Proof text of a finished result: the checked proof, else the attempted
/// script, else the valid prefix. Blank text does not count.
fn finished_text(resp: &CheckProofResponse) -> Option<String> {
    [&resp.proof, &resp.attempted_proof, &resp.valid_prefix]
        .into_iter()
        .flatten()
        .find(|p| !p.trim().is_empty())
        .cloned()
}

fn render_goals(goals: Option<&[Value]>) -> String {
    match goals {
        Some(g) => Value::Array(g.to_vec()).to_string(),
        None => "[]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_without_error_is_invalid_proof() {
        let verdict = classify(&CheckProofResponse {
            success: false,
            goals: Some(vec![json!("n + 0 = n")]),
            message: "Unable to unify".to_string(),
            attempted_proof: Some("intros. reflexivity.".to_string()),
            valid_prefix: Some("intros.".to_string()),
            ..Default::default()
        });
        assert_eq!(verdict.outcome, CheckOutcome::InvalidProof);
        assert!(verdict.feedback.contains("intros. reflexivity."));
        assert!(verdict.feedback.contains("It fails with the error: Unable to unify"));
        assert!(verdict.feedback.contains("But it has a valid prefix intros."));
        assert!(verdict.feedback.contains("[\"n + 0 = n\"]"));
        assert_eq!(verdict.goals.as_ref().unwrap().len(), 1);
        assert!(verdict.finished_proof.is_none());
    }

    #[test]
    fn failure_with_error_is_transport_error() {
        let verdict = classify(&CheckProofResponse {
            success: false,
            error: Some(json!("timeout")),
            goals: Some(vec![json!("stale")]),
            ..Default::default()
        });
        assert_eq!(verdict.outcome, CheckOutcome::TransportError);
        assert!(verdict.feedback.starts_with("I couldn't check the last proof you sent. I got timeout"));
        assert!(verdict.feedback.contains("avoid using admits"));
        assert!(verdict.goals.is_none());
    }

    #[test]
    fn whole_and_branch_partials() {
        let whole = classify(&CheckProofResponse {
            success: true,
            goals: Some(vec![json!("m = m")]),
            message: PARTIAL_SENTINEL.to_string(),
            proof: Some("intros.".to_string()),
            ..Default::default()
        });
        assert_eq!(whole.outcome, CheckOutcome::Partial { branch: false });
        assert!(whole.feedback.contains("The current goals are [\"m = m\"]"));

        let branch = classify(&CheckProofResponse {
            success: true,
            goals: Some(vec![json!("m = m")]),
            message: format!("{BRANCH_PARTIAL_PREFIX} 2: m = m"),
            proof: Some("split. - auto.".to_string()),
            ..Default::default()
        });
        assert_eq!(branch.outcome, CheckOutcome::Partial { branch: true });
        assert!(branch.feedback.contains("current branch"));
        assert!(branch.finished_proof.is_none());
    }

    #[test]
    fn whole_partial_with_empty_goals_is_not_finished() {
        let verdict = classify(&CheckProofResponse {
            success: true,
            goals: Some(Vec::new()),
            message: PARTIAL_SENTINEL.to_string(),
            proof: Some("intros.".to_string()),
            ..Default::default()
        });
        assert!(verdict.finished_proof.is_none());
    }

    #[test]
    fn complete_sets_finished_proof() {
        let verdict = classify(&CheckProofResponse {
            success: true,
            goals: Some(Vec::new()),
            message: COMPLETE_SENTINEL.to_string(),
            proof: Some("intros. reflexivity.".to_string()),
            hash: Some("h9".to_string()),
            ..Default::default()
        });
        assert_eq!(verdict.outcome, CheckOutcome::Complete);
        assert_eq!(verdict.feedback, "Proof is complete");
        assert_eq!(verdict.finished_proof.as_deref(), Some("intros. reflexivity."));
        assert_eq!(verdict.hash.as_deref(), Some("h9"));
    }

    #[test]
    fn complete_without_proof_text_is_not_finished() {
        let verdict = classify(&CheckProofResponse {
            success: true,
            goals: Some(Vec::new()),
            message: COMPLETE_SENTINEL.to_string(),
            ..Default::default()
        });
        assert_eq!(verdict.outcome, CheckOutcome::Complete);
        assert!(verdict.finished_proof.is_none());

        let blank = classify(&CheckProofResponse {
            success: true,
            goals: Some(Vec::new()),
            message: COMPLETE_SENTINEL.to_string(),
            proof: Some("  ".to_string()),
            ..Default::default()
        });
        assert!(blank.finished_proof.is_none());
    }

    #[test]
    fn complete_falls_back_to_attempted_proof() {
        let verdict = classify(&CheckProofResponse {
            success: true,
            goals: Some(Vec::new()),
            message: COMPLETE_SENTINEL.to_string(),
            proof: Some(String::new()),
            attempted_proof: Some("intros n. lia.".to_string()),
            ..Default::default()
        });
        assert_eq!(verdict.finished_proof.as_deref(), Some("intros n. lia."));
    }

    #[test]
    fn unknown_success_message_passes_through() {
        let verdict = classify(&CheckProofResponse {
            success: true,
            goals: Some(vec![json!("x")]),
            message: "Something new".to_string(),
            ..Default::default()
        });
        assert_eq!(verdict.outcome, CheckOutcome::Unrecognized);
        assert_eq!(verdict.feedback, "Something new");
    }

    #[test]
    fn non_json_output_is_not_a_checker_result() {
        assert!(parse_output("Error: tool crashed").is_none());
        assert!(parse_output(r#"{"success": true, "message": "ok"}"#).is_some());
    }
}
