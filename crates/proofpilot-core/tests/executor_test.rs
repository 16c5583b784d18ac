//! Integration tests for the per-plan executor.
//!
//! Every test runs against in-memory fakes: scripted models, a fake tool
//! server and a fake proof service.

use std::sync::Arc;

use serde_json::json;

use proofpilot_core::config::ProofFlowConfig;
use proofpilot_core::executor::{AttemptState, ExecutionRecord, InnerExecutor, StopReason};
use proofpilot_core::message::Message;
use proofpilot_core::model::{ChatModel, ModelRoles};
use proofpilot_core::orchestrator::{OpenSession, open_session};
use proofpilot_core::prompts;

use proofpilot_test_utils::{
    FakeProofService, FakeToolTransport, ScriptedModel, complete_json, invalid_proof_json,
    tool_call_message, transport_error_json,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

struct Harness {
    transport: Arc<FakeToolTransport>,
    service: Arc<FakeProofService>,
    open: OpenSession,
}

async fn harness(transport: FakeToolTransport, service: FakeProofService) -> Harness {
    let transport = Arc::new(transport);
    let service = Arc::new(service);
    let open = open_session(
        service.as_ref(),
        transport.clone(),
        "src/Add.v",
        "add_zero",
        "check_proof",
    )
    .await
    .expect("session should open");
    Harness {
        transport,
        service,
        open,
    }
}

fn dyn_model(model: &Arc<ScriptedModel>) -> Arc<dyn ChatModel> {
    model.clone()
}

/// Roles where only the executor is scripted; every other role answers
/// with an empty message.
fn roles_with_executor(executor: &Arc<ScriptedModel>) -> ModelRoles {
    let mut roles = ModelRoles::uniform(Arc::new(ScriptedModel::new("idle")));
    roles.executor = dyn_model(executor);
    roles
}

fn check_call(id: &str, proof: &str) -> Message {
    tool_call_message(id, "check_proof", json!({ "proof": proof }))
}

async fn run_attempt(h: &Harness, roles: &ModelRoles, limits: &ProofFlowConfig) -> ExecutionRecord {
    let executor = InnerExecutor::new(
        roles,
        h.service.as_ref(),
        &h.open.gateway,
        &h.open.session,
        limits,
    );
    let attempt = AttemptState::new(
        0,
        "Induction on n.",
        vec![Message::system("rules"), Message::human("prove it")],
        h.open.tracker.clone(),
    );
    executor.run(attempt).await
}

fn tool_contents(record: &ExecutionRecord) -> Vec<&str> {
    record
        .history
        .iter()
        .filter(|m| m.is_tool_result())
        .map(Message::content)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn complete_proof_stops_with_proved() {
    let transport = FakeToolTransport::standard().reply(
        "check_proof",
        &complete_json("intros n. lia.", None),
        None,
    );
    let h = harness(transport, FakeProofService::new()).await;
    let executor = Arc::new(ScriptedModel::new("exec").reply(check_call("c1", "intros n. lia.")));

    let record = run_attempt(&h, &roles_with_executor(&executor), &ProofFlowConfig::default()).await;

    assert!(record.success);
    assert_eq!(record.stop_reason, StopReason::Proved);
    assert_eq!(record.finished_proof.as_deref(), Some("intros n. lia."));
    assert_eq!(record.tool_iterations, 1);
    assert_eq!(
        record.history.last(),
        Some(&Message::ai(prompts::PROOF_COMPLETED))
    );
    assert_eq!(tool_contents(&record), vec!["Proof is complete"]);

    let calls = h.transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].arguments["coqSessionId"], "session-1");
    assert_eq!(calls[0].arguments["proofVersionHash"], "hash-0");
    assert_eq!(calls[0].arguments["proof"], "intros n. lia.");
}

#[tokio::test]
async fn checker_timeout_asks_for_retry_without_counting_a_failure() {
    // Four invalid proofs, then a timeout. Had the timeout counted, the
    // streak would reach the critique threshold.
    let mut transport = FakeToolTransport::standard();
    for _ in 0..4 {
        transport = transport.reply("check_proof", &invalid_proof_json("auto.", None), None);
    }
    transport = transport.reply("check_proof", &transport_error_json("timeout"), None);
    let h = harness(transport, FakeProofService::new()).await;

    let mut executor = ScriptedModel::new("exec");
    for i in 0..5 {
        executor = executor.reply(check_call(&format!("c{i}"), "auto."));
    }
    let executor = Arc::new(executor.reply_text("stopping"));
    let critic = Arc::new(ScriptedModel::new("critic").reply_text("do better"));
    let mut roles = roles_with_executor(&executor);
    roles.critic = dyn_model(&critic);

    let record = run_attempt(&h, &roles, &ProofFlowConfig::default()).await;

    assert_eq!(record.stop_reason, StopReason::NoToolCall);
    assert_eq!(critic.call_count(), 0);
    assert_eq!(record.tool_iterations, 5);
    let contents = tool_contents(&record);
    assert!(contents[3].starts_with("Unfortunately, the last proof you checked is not valid"));
    assert!(
        contents[4].starts_with("I couldn't check the last proof you sent. I got timeout"),
        "got: {}",
        contents[4]
    );
}

#[tokio::test]
async fn fifth_failure_triggers_critique_similar_lookup_and_replan() {
    let mut transport = FakeToolTransport::standard();
    for _ in 0..5 {
        transport = transport.reply("check_proof", &invalid_proof_json("auto.", None), None);
    }
    let service = FakeProofService::new()
        .with_premises("n + 0 = n", &["add_0_r"])
        .with_theorem("add_0_r", "Lemma add_0_r : forall n, n + 0 = n.", "Proof. induction n; auto. Qed.");
    let h = harness(transport, service).await;

    let mut executor = ScriptedModel::new("exec");
    for i in 0..5 {
        executor = executor.reply(check_call(&format!("c{i}"), "auto."));
    }
    let executor = Arc::new(executor.reply_text("out of ideas"));
    let critic = Arc::new(ScriptedModel::new("critic").reply_text("auto is not enough"));
    let analyzer = Arc::new(ScriptedModel::new("analyzer").reply_text("reuse induction"));
    let replanner = Arc::new(ScriptedModel::new("replanner").reply_text("  Induct, then simpl.  "));
    let mut roles = roles_with_executor(&executor);
    roles.critic = dyn_model(&critic);
    roles.similar_analyzer = dyn_model(&analyzer);
    roles.replanner = dyn_model(&replanner);

    let record = run_attempt(&h, &roles, &ProofFlowConfig::default()).await;

    assert_eq!(critic.call_count(), 1);
    assert_eq!(analyzer.call_count(), 1);
    assert_eq!(replanner.call_count(), 1);

    // The analyzer sees only its own request, with the exemplar inlined.
    let analyzer_call = &analyzer.calls()[0];
    assert_eq!(analyzer_call.messages.len(), 1);
    assert!(analyzer_call.tools.is_empty());
    assert!(analyzer_call.last_content().contains("Lemma add_0_r"));
    assert!(analyzer_call.last_content().contains("induction n; auto."));

    assert!(
        critic.calls()[0]
            .last_content()
            .contains("Critique the last actions under overall plan:\nInduction on n.")
    );
    assert_eq!(record.plan, "Induct, then simpl.");
    assert!(record.history.contains(&Message::critic("auto is not enough")));
    assert!(
        record
            .history
            .contains(&Message::human(prompts::refined_plan("Induct, then simpl.")))
    );
    assert_eq!(record.stop_reason, StopReason::NoToolCall);
    assert!(
        h.service
            .log()
            .iter()
            .any(|entry| entry.starts_with("get_premises n + 0 = n"))
    );
}

#[tokio::test]
async fn iteration_cap_ends_with_early_stop() {
    let transport = FakeToolTransport::standard().fallback("get_theorem", "Lemma x : True.");
    let h = harness(transport, FakeProofService::new()).await;
    let executor = Arc::new(ScriptedModel::new("exec").with_fallback(tool_call_message(
        "c",
        "get_theorem",
        json!({ "theoremName": "x" }),
    )));
    let limits = ProofFlowConfig {
        max_tool_iterations: 3,
        ..Default::default()
    };

    let record = run_attempt(&h, &roles_with_executor(&executor), &limits).await;

    assert!(!record.success);
    assert_eq!(record.stop_reason, StopReason::IterationCap);
    assert_eq!(record.tool_iterations, 3);
    assert_eq!(
        record.history.last(),
        Some(&Message::ai(prompts::MAX_ITERATIONS_REACHED))
    );
    assert_eq!(h.transport.calls().len(), 3);
}

#[tokio::test]
async fn new_hash_reaches_every_adapter() {
    let transport = FakeToolTransport::standard()
        .reply("check_proof", &invalid_proof_json("auto.", None), Some("hash-7"))
        .reply("check_proof", &invalid_proof_json("auto.", Some("hash-8")), None);
    let h = harness(transport, FakeProofService::new()).await;
    let executor = Arc::new(
        ScriptedModel::new("exec")
            .reply(check_call("c1", "auto."))
            .reply(check_call("c2", "auto."))
            .reply(check_call("c3", "auto."))
            .reply_text("done"),
    );

    run_attempt(&h, &roles_with_executor(&executor), &ProofFlowConfig::default()).await;

    let calls = h.transport.calls();
    assert_eq!(calls[0].arguments["proofVersionHash"], "hash-0");
    assert_eq!(calls[1].arguments["proofVersionHash"], "hash-7");
    assert_eq!(calls[2].arguments["proofVersionHash"], "hash-8");
    assert_eq!(h.open.tracker.hash(), "hash-8");
    assert_eq!(
        h.open.gateway.table().get("check_proof").map(|a| a.current_hash()),
        Some("hash-8".to_string())
    );
}

#[tokio::test]
async fn unknown_tool_is_reported_back_to_the_model() {
    let h = harness(FakeToolTransport::standard(), FakeProofService::new()).await;
    let executor = Arc::new(
        ScriptedModel::new("exec")
            .reply(tool_call_message("c1", "search_web", json!({})))
            .reply_text("ok"),
    );

    let record = run_attempt(&h, &roles_with_executor(&executor), &ProofFlowConfig::default()).await;

    assert_eq!(
        tool_contents(&record),
        vec!["Error: search_web is not a valid tool, try one of [check_proof, get_theorem]."]
    );
    assert!(h.transport.calls().is_empty());
    assert_eq!(record.tool_iterations, 1);
}

#[tokio::test]
async fn tool_failure_is_reported_back_to_the_model() {
    let transport =
        FakeToolTransport::standard().reply_error("get_theorem", "connection reset");
    let h = harness(transport, FakeProofService::new()).await;
    let executor = Arc::new(
        ScriptedModel::new("exec")
            .reply(tool_call_message("c1", "get_theorem", json!({ "theoremName": "x" })))
            .reply_text("ok"),
    );

    let record = run_attempt(&h, &roles_with_executor(&executor), &ProofFlowConfig::default()).await;

    assert_eq!(
        tool_contents(&record),
        vec!["Error: connection reset\n Please fix your mistakes."]
    );
    assert_eq!(record.stop_reason, StopReason::NoToolCall);
}

#[tokio::test]
async fn only_the_first_of_several_tool_calls_runs() {
    let h = harness(FakeToolTransport::standard(), FakeProofService::new()).await;
    let two_calls = Message::ai_with_calls(
        "thinking",
        vec![
            proofpilot_core::message::ToolCall::new("a", "get_theorem", Default::default()),
            proofpilot_core::message::ToolCall::new("b", "get_theorem", Default::default()),
        ],
    );
    let executor = Arc::new(ScriptedModel::new("exec").reply(two_calls).reply_text("ok"));

    let record = run_attempt(&h, &roles_with_executor(&executor), &ProofFlowConfig::default()).await;

    assert_eq!(h.transport.calls().len(), 1);
    let ai = &record.history[2];
    assert_eq!(ai.content(), "thinking");
    assert_eq!(ai.tool_calls().len(), 1);
    assert_eq!(ai.tool_calls()[0].id, "a");
}

#[tokio::test]
async fn long_history_is_summarized_and_summary_injected_once() {
    let h = harness(FakeToolTransport::standard(), FakeProofService::new()).await;
    let executor = Arc::new(
        ScriptedModel::new("exec")
            .reply(tool_call_message("c1", "get_theorem", json!({ "theoremName": "x" })))
            .reply_text("finished thinking"),
    );
    let summarizer = Arc::new(ScriptedModel::new("summarizer").reply_text("- tried get_theorem"));
    let mut roles = roles_with_executor(&executor);
    roles.summarizer = dyn_model(&summarizer);
    let limits = ProofFlowConfig {
        max_raw_messages: 3,
        tail_size: 2,
        ..Default::default()
    };

    let record = run_attempt(&h, &roles, &limits).await;

    assert_eq!(summarizer.call_count(), 1);
    let summary_call = &summarizer.calls()[0];
    assert_eq!(summary_call.messages.len(), 1);
    assert!(summary_call.tools.is_empty());

    let second = &executor.calls()[1];
    assert_eq!(
        second.messages[0],
        Message::human("Conversation summary so far:\n- tried get_theorem")
    );
    assert!(second.messages[1].has_tool_calls());
    assert!(second.messages[2].is_tool_result());
    assert_eq!(record.stop_reason, StopReason::NoToolCall);
}

#[tokio::test]
async fn model_failure_aborts_only_the_attempt() {
    let h = harness(FakeToolTransport::standard(), FakeProofService::new()).await;
    let executor = Arc::new(ScriptedModel::new("exec").reply_error("rate limited"));

    let record = run_attempt(&h, &roles_with_executor(&executor), &ProofFlowConfig::default()).await;

    assert!(!record.success);
    match &record.stop_reason {
        StopReason::Aborted { error } => assert!(error.contains("rate limited"), "got: {error}"),
        other => panic!("expected an aborted attempt, got {other:?}"),
    }
}
