//! Integration tests for plan generation, debate and ranking.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;

use proofpilot_core::config::{PlanningConfig, PlanningMode};
use proofpilot_core::message::Message;
use proofpilot_core::model::{ChatModel, ModelRoles, ToolSpec};
use proofpilot_core::planning::{
    Debaters, Winner, generate_plans, rank_plans, run_debate,
};
use proofpilot_core::planning::rank::{DEFAULT_SCORE, SINGLE_PLAN_SCORE};

use proofpilot_test_utils::ScriptedModel;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Planner that sleeps a little and tracks how many calls overlap.
#[derive(Default)]
struct CountingPlanner {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl ChatModel for CountingPlanner {
    fn name(&self) -> &str {
        "counting"
    }

    async fn invoke(&self, _messages: &[Message], _tools: &[ToolSpec]) -> Result<Message> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Message::ai(format!("  plan {n}  ")))
    }
}

struct FailingPlanner;

#[async_trait]
impl ChatModel for FailingPlanner {
    fn name(&self) -> &str {
        "failing"
    }

    async fn invoke(&self, _messages: &[Message], _tools: &[ToolSpec]) -> Result<Message> {
        bail!("quota exceeded")
    }
}

fn tools() -> Vec<ToolSpec> {
    vec![ToolSpec {
        name: "check_proof".to_string(),
        description: "Check a proof".to_string(),
        parameters: serde_json::json!({"type": "object", "properties": {}}),
    }]
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generation_respects_parallelism_bound() {
    let planner = Arc::new(CountingPlanner::default());
    let roles = ModelRoles::uniform(planner.clone());
    let config = PlanningConfig {
        plan_samples_number: 7,
        max_parallel_generations: 3,
        ..Default::default()
    };

    let plans = generate_plans(&roles, "T", &tools(), &config)
        .await
        .expect("generation should succeed");

    assert_eq!(plans.len(), 7);
    assert!(plans.iter().all(|p| p.starts_with("plan ")));
    assert_eq!(planner.calls.load(Ordering::SeqCst), 7);
    let peak = planner.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency {peak} exceeds bound");
}

#[tokio::test]
async fn one_failed_generation_fails_the_batch() {
    let roles = ModelRoles::uniform(Arc::new(FailingPlanner));
    let config = PlanningConfig {
        plan_samples_number: 2,
        ..Default::default()
    };

    let err = generate_plans(&roles, "T", &tools(), &config)
        .await
        .expect_err("generation should fail");
    assert!(format!("{err:#}").contains("quota exceeded"));
}

#[tokio::test]
async fn debate_mode_returns_judge_plans() {
    let debater = Arc::new(ScriptedModel::new("debater").with_fallback(Message::ai("argument")));
    let judge = Arc::new(ScriptedModel::new("judge").with_fallback(Message::ai(
        "```json\n{\"winner\": \"B\", \"plan\": \"1. induction n\"}\n```",
    )));
    let mut roles = ModelRoles::uniform(debater.clone());
    roles.judge = judge.clone();
    let config = PlanningConfig {
        mode: PlanningMode::Debate,
        plan_samples_number: 2,
        rounds_number: 1,
        ..Default::default()
    };

    let plans = generate_plans(&roles, "T", &tools(), &config)
        .await
        .expect("debate generation should succeed");

    assert_eq!(plans, vec!["1. induction n", "1. induction n"]);
    assert_eq!(judge.call_count(), 2);
    // Two debaters per round, two debates.
    assert_eq!(debater.call_count(), 4);
}

// ---------------------------------------------------------------------------
// Debate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn debate_alternates_turns_and_shows_the_judge_everything() {
    let a = ScriptedModel::new("a")
        .reply_text("A1: induction")
        .reply_text("A2: induction then lia");
    let b = ScriptedModel::new("b")
        .reply_text("B1: missing base case")
        .reply_text("B2: fine");
    let judge = ScriptedModel::new("judge")
        .reply_text(r#"{"winner": "a", "plan": "induction n; lia"}"#);
    let debaters = Debaters {
        a: &a,
        b: &b,
        judge: &judge,
    };

    let outcome = run_debate(debaters, "forall n, n + 0 = n", &tools(), 2)
        .await
        .expect("debate should finish");

    assert_eq!(outcome.verdict.winner, Winner::A);
    assert_eq!(outcome.verdict.plan, "induction n; lia");
    assert_eq!(outcome.transcript.len(), 6);
    assert_eq!(
        &outcome.transcript[2..],
        ["A1: induction", "B1: missing base case", "A2: induction then lia", "B2: fine"]
    );

    // B's first turn sees A's first argument.
    let b_first = &b.calls()[0];
    assert!(b_first.messages.iter().any(|m| m.content() == "A1: induction"));
    assert!(b_first.tools.is_empty());

    let judge_call = &judge.calls()[0];
    assert!(judge_call.messages.iter().any(|m| m.content() == "B2: fine"));
}

#[tokio::test]
async fn unparseable_verdict_defaults_to_a_with_empty_plan() {
    let a = ScriptedModel::new("a");
    let b = ScriptedModel::new("b");
    let judge = ScriptedModel::new("judge").reply_text("Plan A is clearly better.");
    let debaters = Debaters {
        a: &a,
        b: &b,
        judge: &judge,
    };

    let outcome = run_debate(debaters, "T", &tools(), 0)
        .await
        .expect("debate should finish");

    assert_eq!(outcome.verdict.winner, Winner::A);
    assert!(outcome.verdict.plan.is_empty());
    assert_eq!(a.call_count(), 0);
    assert_eq!(outcome.transcript.len(), 2);
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ranking_sorts_by_score_and_keeps_ties_in_order() {
    let ranker = ScriptedModel::new("ranker")
        .reply_text(r#"{"score": 6, "reason": "ok"}"#)
        .reply_text(r#"{"score": "9", "reason": "strong"}"#)
        .reply_text("no idea")
        .reply_text(r#"{"score": 6}"#)
        .reply_text(r#"{"score": 42}"#);
    let plans = (0..5).map(|i| format!("p{i}")).collect();

    let ranking = rank_plans(&ranker, "T", plans, 3).await;

    let scores: Vec<u8> = ranking.scores.iter().map(|s| s.score).collect();
    assert_eq!(scores, vec![6, 9, DEFAULT_SCORE, 6, DEFAULT_SCORE]);
    let selected: Vec<&str> = ranking.selected.iter().map(|s| s.plan.as_str()).collect();
    assert_eq!(selected, vec!["p1", "p0", "p3"]);
    assert_eq!(ranking.selected[0].reason.as_deref(), Some("strong"));
    assert_eq!(ranker.call_count(), 5);
}

#[tokio::test]
async fn ranker_errors_fall_back_to_default_score() {
    let ranker = ScriptedModel::new("ranker")
        .reply_error("timeout")
        .reply_text(r#"{"score": 7}"#);

    let ranking = rank_plans(&ranker, "T", vec!["a".into(), "b".into()], 5).await;

    assert_eq!(ranking.scores[0].score, DEFAULT_SCORE);
    assert_eq!(ranking.selected[0].plan, "b");
    assert_eq!(ranking.selected.len(), 2);
}

#[tokio::test]
async fn single_plan_is_not_sent_to_the_ranker() {
    let ranker = ScriptedModel::new("ranker");

    let ranking = rank_plans(&ranker, "T", vec!["only".into()], 3).await;

    assert_eq!(ranker.call_count(), 0);
    assert_eq!(ranking.selected.len(), 1);
    assert_eq!(ranking.selected[0].score, SINGLE_PLAN_SCORE);

    let none = rank_plans(&ranker, "T", vec!["only".into()], 0).await;
    assert!(none.selected.is_empty());
}
