//! Per-plan execution: the inner state machine.
//!
//! One [`InnerExecutor::run`] call drives a single plan attempt from
//! `CallLlm` until the model stops calling tools, the proof is finished,
//! or the tool-iteration cap is hit:
//!
//! ```text
//! CallLlm --tool call--> CallTool --after_tool_call()--> CallLlm | CallTool
//!    |                      |                            | Critique | Summarize
//!    | no tool call         |                            | Replan | EarlyStop
//!    v                      v
//!   end                 EarlyStop --> end
//!
//! Critique --> FetchSimilar --> Replan --> CallLlm
//! Summarize --> CallLlm
//! ```
//!
//! Recoverable problems (invalid proofs, tool errors) are fed back to the
//! model as tool results. Anything else aborts this attempt only.

pub mod similar;
pub mod transition;

pub use similar::similar_theorems;
pub use transition::{InnerState, Snapshot, after_tool_call, fixed_successor};

use serde::Serialize;
use tracing::Instrument;

use crate::config::ProofFlowConfig;
use crate::context;
use crate::message::Message;
use crate::model::{ModelRole, ModelRoles, ToolSpec};
use crate::prompts;
use crate::service::ProofService;
use crate::state::{ProofSession, ProofStateTracker};
use crate::tools::ToolGateway;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Errors that abort a plan attempt.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The conversation is not in the shape a state requires.
    #[error("protocol violation in {state}: {detail}")]
    ProtocolViolation { state: InnerState, detail: String },

    #[error("{role} model call failed: {message}")]
    Model { role: ModelRole, message: String },

    #[error("proof service call failed in {state}: {message}")]
    Service { state: InnerState, message: String },
}

/// Why an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StopReason {
    Proved,
    IterationCap,
    /// The executor model answered without calling a tool.
    NoToolCall,
    Aborted { error: String },
}

/// Mutable state of one plan attempt.
#[derive(Debug, Clone)]
pub struct AttemptState {
    pub plan_index: usize,
    /// Active plan; replaced on every replan.
    pub plan: String,
    pub history: Vec<Message>,
    pub tracker: ProofStateTracker,
    /// One-shot progress summary, injected by the next `CallLlm`.
    pub summary: Option<String>,
    pub tool_iterations: usize,
    pub last_tool: Option<String>,
}

impl AttemptState {
    pub fn new(
        plan_index: usize,
        plan: impl Into<String>,
        history: Vec<Message>,
        tracker: ProofStateTracker,
    ) -> Self {
        Self {
            plan_index,
            plan: plan.into(),
            history,
            tracker,
            summary: None,
            tool_iterations: 0,
            last_tool: None,
        }
    }
}

/// Outcome of one plan attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub plan_index: usize,
    pub success: bool,
    /// The plan as it stood at the end, after any replans.
    pub plan: String,
    pub history: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_proof: Option<String>,
    pub stop_reason: StopReason,
    pub tool_iterations: usize,
}

enum Step {
    Next(InnerState),
    Stop(StopReason),
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Runs plan attempts against one proof session.
pub struct InnerExecutor<'a> {
    roles: &'a ModelRoles,
    service: &'a dyn ProofService,
    gateway: &'a ToolGateway,
    session: &'a ProofSession,
    limits: &'a ProofFlowConfig,
    tool_specs: Vec<ToolSpec>,
    tool_summary: String,
}

impl<'a> InnerExecutor<'a> {
    pub fn new(
        roles: &'a ModelRoles,
        service: &'a dyn ProofService,
        gateway: &'a ToolGateway,
        session: &'a ProofSession,
        limits: &'a ProofFlowConfig,
    ) -> Self {
        Self {
            roles,
            service,
            gateway,
            session,
            limits,
            tool_specs: gateway.table().specs(),
            tool_summary: gateway.table().summary(),
        }
    }

    /// Drive one attempt to its end. Never fails; errors end the attempt
    /// with [`StopReason::Aborted`].
    pub async fn run(&self, attempt: AttemptState) -> ExecutionRecord {
        let span = tracing::info_span!("attempt", plan_index = attempt.plan_index);
        self.run_inner(attempt).instrument(span).await
    }

    async fn run_inner(&self, mut attempt: AttemptState) -> ExecutionRecord {
        let mut state = InnerState::CallLlm;
        let stop_reason = loop {
            tracing::debug!(state = %state, messages = attempt.history.len(), "entering state");
            match self.step(state, &mut attempt).await {
                Ok(Step::Next(next)) => state = next,
                Ok(Step::Stop(reason)) => break reason,
                Err(e) => {
                    tracing::warn!(state = %state, error = %e, "plan attempt aborted");
                    break StopReason::Aborted {
                        error: e.to_string(),
                    };
                }
            }
        };

        let finished_proof = attempt.tracker.finished_proof().map(str::to_string);
        tracing::info!(
            success = finished_proof.is_some(),
            stop_reason = ?stop_reason,
            tool_iterations = attempt.tool_iterations,
            "plan attempt finished"
        );

        ExecutionRecord {
            plan_index: attempt.plan_index,
            success: finished_proof.is_some(),
            plan: attempt.plan,
            history: attempt.history,
            finished_proof,
            stop_reason,
            tool_iterations: attempt.tool_iterations,
        }
    }

    async fn step(
        &self,
        state: InnerState,
        attempt: &mut AttemptState,
    ) -> Result<Step, ExecutorError> {
        match state {
            InnerState::CallLlm => self.call_llm(attempt).await,
            InnerState::CallTool => self.call_tool(attempt).await,
            InnerState::Critique => self.critique(attempt).await,
            InnerState::FetchSimilar => self.fetch_similar(attempt).await,
            InnerState::Replan => self.replan(attempt).await,
            InnerState::Summarize => self.summarize(attempt).await,
            InnerState::EarlyStop => Ok(self.early_stop(attempt)),
        }
    }

    async fn ask(
        &self,
        role: ModelRole,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<Message, ExecutorError> {
        self.roles
            .get(role)
            .invoke(messages, tools)
            .await
            .map_err(|e| ExecutorError::Model {
                role,
                message: format!("{e:#}"),
            })
    }

    /// Advance along a fixed edge.
    fn follow(state: InnerState) -> Step {
        match fixed_successor(state) {
            Some(next) => Step::Next(next),
            None => Step::Next(InnerState::CallLlm),
        }
    }

    // -- states -------------------------------------------------------------

    async fn call_llm(&self, attempt: &mut AttemptState) -> Result<Step, ExecutorError> {
        if let Some(summary) = attempt.summary.take().filter(|s| !s.is_empty()) {
            attempt
                .history
                .insert(0, Message::human(prompts::conversation_summary(&summary)));
        }

        let reply = self
            .ask(ModelRole::Executor, &attempt.history, &self.tool_specs)
            .await?;
        let wants_tool = reply.has_tool_calls();
        attempt.history.push(reply);

        if wants_tool {
            Ok(Step::Next(InnerState::CallTool))
        } else {
            tracing::info!("executor replied without a tool call");
            Ok(Step::Stop(StopReason::NoToolCall))
        }
    }

    async fn call_tool(&self, attempt: &mut AttemptState) -> Result<Step, ExecutorError> {
        let (content, call, dropped) = match attempt.history.last() {
            Some(Message::Ai {
                content,
                tool_calls,
            }) if !tool_calls.is_empty() => {
                (content.clone(), tool_calls[0].clone(), tool_calls.len() - 1)
            }
            other => {
                return Err(ExecutorError::ProtocolViolation {
                    state: InnerState::CallTool,
                    detail: format!(
                        "expected an ai message with a tool call, found {}",
                        other.map_or("nothing", Message::role)
                    ),
                });
            }
        };

        // Only the first call is executed; keep the history paired.
        if dropped > 0 {
            tracing::debug!(dropped, "ignoring extra tool calls");
            if let Some(last) = attempt.history.last_mut() {
                *last = Message::ai_with_calls(content, vec![call.clone()]);
            }
        }

        let dispatch = self.gateway.dispatch(&call).await;

        let tracker = &mut attempt.tracker;
        if let Some(verdict) = &dispatch.verdict {
            tracker.apply(verdict);
        }
        tracker.observe_hash(dispatch.proof_hash());

        let added = dispatch.messages.len().max(1);
        attempt.history.extend(dispatch.messages);
        attempt.tool_iterations += added;
        attempt.last_tool = Some(dispatch.tool);

        tracing::info!(
            tool = %call.name,
            iteration = attempt.tool_iterations,
            max = self.limits.max_tool_iterations,
            failure_streak = attempt.tracker.failure_streak(),
            "tool call finished"
        );

        let last = attempt.history.last();
        let snapshot = Snapshot {
            proof_finished: attempt.tracker.is_finished(),
            tool_iterations: attempt.tool_iterations,
            last_tool_was_checker: attempt.last_tool.as_deref()
                == Some(self.gateway.checker_tool()),
            failure_streak: attempt.tracker.failure_streak(),
            message_count: attempt.history.len(),
            last_is_critic: last.is_some_and(Message::is_critic),
            last_has_tool_call: last.is_some_and(Message::has_tool_calls),
        };
        Ok(Step::Next(after_tool_call(&snapshot, self.limits)))
    }

    async fn critique(&self, attempt: &mut AttemptState) -> Result<Step, ExecutorError> {
        tracing::info!(
            failure_streak = attempt.tracker.failure_streak(),
            "requesting critique"
        );
        let mut prompt = attempt.history.clone();
        prompt.push(Message::human(prompts::critique(
            &attempt.plan,
            &self.tool_summary,
        )));
        let reply = self
            .ask(ModelRole::Critic, &prompt, &self.tool_specs)
            .await?;
        attempt.history.push(Message::critic(reply.content()));
        Ok(Self::follow(InnerState::Critique))
    }

    async fn fetch_similar(&self, attempt: &mut AttemptState) -> Result<Step, ExecutorError> {
        let service_err = |e: anyhow::Error| ExecutorError::Service {
            state: InnerState::FetchSimilar,
            message: format!("{e:#}"),
        };

        let hash = attempt.tracker.hash();
        let similar = similar_theorems(
            self.service,
            self.session,
            attempt.tracker.goals(),
            &hash,
        )
        .await
        .map_err(service_err)?;
        let theorem = self
            .service
            .get_session_theorem(&self.session.session_id, &hash)
            .await
            .map_err(service_err)?;
        let theorem_state = serde_json::to_string(&theorem)
            .unwrap_or_else(|_| theorem.theorem_statement.clone());

        let request = Message::human(prompts::borrow_from_similar(&theorem_state, &similar));
        let reply = self
            .ask(ModelRole::SimilarAnalyzer, std::slice::from_ref(&request), &[])
            .await?;
        attempt.history.push(request);
        attempt.history.push(reply.into_text_only());
        Ok(Self::follow(InnerState::FetchSimilar))
    }

    async fn replan(&self, attempt: &mut AttemptState) -> Result<Step, ExecutorError> {
        let mut prompt = attempt.history.clone();
        prompt.push(Message::human(prompts::replan(
            &attempt.plan,
            &self.tool_summary,
        )));
        let reply = self
            .ask(ModelRole::Replanner, &prompt, &self.tool_specs)
            .await?;
        let new_plan = reply.content().trim().to_string();

        tracing::info!(plan_index = attempt.plan_index, "plan refined");
        attempt
            .history
            .push(Message::human(prompts::refined_plan(&new_plan)));
        attempt.plan = new_plan;
        attempt.tracker.reset_failure_streak();
        Ok(Self::follow(InnerState::Replan))
    }

    async fn summarize(&self, attempt: &mut AttemptState) -> Result<Step, ExecutorError> {
        let compaction = context::compact(
            &mut attempt.history,
            self.limits.tail_size,
            self.roles.summarizer.as_ref(),
        )
        .await
        .map_err(|e| ExecutorError::Model {
            role: ModelRole::Summarizer,
            message: format!("{e:#}"),
        })?;
        if let Some(c) = compaction {
            tracing::info!(
                plan_index = attempt.plan_index,
                compressed = c.compressed,
                kept = attempt.history.len(),
                "compacted attempt history"
            );
            attempt.summary = Some(c.summary);
        }
        Ok(Self::follow(InnerState::Summarize))
    }

    fn early_stop(&self, attempt: &mut AttemptState) -> Step {
        if attempt.tracker.is_finished() {
            attempt.history.push(Message::ai(prompts::PROOF_COMPLETED));
            Step::Stop(StopReason::Proved)
        } else {
            attempt
                .history
                .push(Message::ai(prompts::MAX_ITERATIONS_REACHED));
            Step::Stop(StopReason::IterationCap)
        }
    }
}
