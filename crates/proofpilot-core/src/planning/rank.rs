//! Model-judged plan ranking.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::verdict::parse_json;
use crate::message::Message;
use crate::model::ChatModel;
use crate::prompts;

/// Score given when the ranker's answer cannot be used.
pub const DEFAULT_SCORE: u8 = 5;
/// Score of the only candidate, assigned without asking the ranker.
pub const SINGLE_PLAN_SCORE: u8 = 10;

const SCORE_RANGE: std::ops::RangeInclusive<i64> = 1..=10;

/// A plan with its score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredPlan {
    pub plan: String,
    pub score: u8,
    /// The ranker's justification, when it gave a usable one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Scores in generation order, and the selected top plans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    pub scores: Vec<ScoredPlan>,
    /// Best first; ties keep generation order.
    pub selected: Vec<ScoredPlan>,
}

#[derive(Deserialize)]
struct RawScore {
    score: Value,
    #[serde(default)]
    reason: Option<String>,
}

/// Extract a 1–10 score and the reason from a ranker reply.
pub fn parse_score(raw: &str) -> Option<(u8, Option<String>)> {
    let parsed: RawScore = parse_json(raw)?;
    let score = match &parsed.score {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    if !SCORE_RANGE.contains(&score) {
        return None;
    }
    Some((u8::try_from(score).ok()?, parsed.reason))
}

/// Score every plan and keep the best `keep`.
///
/// Never fails: a ranker error or an unusable answer scores the plan
/// [`DEFAULT_SCORE`].
pub async fn rank_plans(
    ranker: &dyn ChatModel,
    theorem: &str,
    plans: Vec<String>,
    keep: usize,
) -> Ranking {
    let scores = match plans.len() {
        0 => Vec::new(),
        1 => {
            tracing::info!("single candidate plan, scoring it {SINGLE_PLAN_SCORE}");
            plans
                .into_iter()
                .map(|plan| ScoredPlan {
                    plan,
                    score: SINGLE_PLAN_SCORE,
                    reason: None,
                })
                .collect()
        }
        _ => {
            let mut scores = Vec::with_capacity(plans.len());
            for (index, plan) in plans.into_iter().enumerate() {
                let (score, reason) = score_plan(ranker, theorem, &plan, index).await;
                scores.push(ScoredPlan {
                    plan,
                    score,
                    reason,
                });
            }
            scores
        }
    };

    let mut selected = scores.clone();
    // `sort_by` is stable, so equal scores keep generation order.
    selected.sort_by(|a, b| b.score.cmp(&a.score));
    selected.truncate(keep);

    tracing::info!(
        candidates = scores.len(),
        selected = selected.len(),
        "ranked plans"
    );
    Ranking { scores, selected }
}

async fn score_plan(
    ranker: &dyn ChatModel,
    theorem: &str,
    plan: &str,
    index: usize,
) -> (u8, Option<String>) {
    let messages = [
        Message::system(prompts::RANKER_SYSTEM),
        Message::human(prompts::ranker_request(theorem, plan)),
    ];
    match ranker.invoke(&messages, &[]).await {
        Ok(reply) => match parse_score(reply.content()) {
            Some((score, reason)) => {
                tracing::debug!(plan_index = index, score, "plan scored");
                (score, reason)
            }
            None => {
                tracing::warn!(plan_index = index, "unusable ranker reply, using default score");
                (DEFAULT_SCORE, None)
            }
        },
        Err(e) => {
            tracing::warn!(plan_index = index, error = %e, "ranker call failed, using default score");
            (DEFAULT_SCORE, None)
        }
    }
}
