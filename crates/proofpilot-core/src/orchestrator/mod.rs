//! Run-level orchestration: session setup, planning and the outer loop
//! over ranked plans.
//!
//! ```text
//! open_session --> generate_plans --> rank_plans
//!                                         |
//!   FetchGoals --> TryPlan(0) --fail--> TryPlan(1) ... --> Exhausted
//!                      |                    |
//!                      +------proved--------+--> Success
//! ```
//!
//! Each `TryPlan` works on a deep clone of the run's proof state; only the
//! proof-version hash is shared. A failed attempt is summarized and the
//! summary is handed to the next attempt.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{AgentConfig, PlanningMode};
use crate::executor::{AttemptState, ExecutionRecord, InnerExecutor, similar_theorems};
use crate::message::Message;
use crate::model::ModelRoles;
use crate::planning::{Ranking, ScoredPlan, generate_plans, rank_plans};
use crate::prompts;
use crate::service::ProofService;
use crate::state::{ProofSession, ProofStateTracker, ProofVersion};
use crate::tools::{CapabilityTable, ToolGateway, ToolTransport};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Final outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunResult {
    Proved { proof: String, plan_index: usize },
    /// Every ranked plan was tried without success.
    Exhausted { attempts: usize },
}

/// Everything a run did, serializable as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub theorem_name: String,
    pub theorem: String,
    pub file: String,
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub planning_mode: PlanningMode,
    pub ranking: Ranking,
    pub attempts: Vec<ExecutionRecord>,
    pub result: RunResult,
}

impl RunReport {
    pub fn is_proved(&self) -> bool {
        matches!(self.result, RunResult::Proved { .. })
    }

    pub fn proof(&self) -> Option<&str> {
        match &self.result {
            RunResult::Proved { proof, .. } => Some(proof),
            RunResult::Exhausted { .. } => None,
        }
    }
}

/// States of the outer loop.
#[derive(Debug, Clone, PartialEq, Eq)]
enum OuterState {
    FetchGoals,
    TryPlan(usize),
    Success { proof: String, plan_index: usize },
    Exhausted,
}

impl fmt::Display for OuterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchGoals => f.write_str("fetch_goals"),
            Self::TryPlan(i) => write!(f, "try_plan({i})"),
            Self::Success { .. } => f.write_str("success"),
            Self::Exhausted => f.write_str("exhausted"),
        }
    }
}

/// A started proof session with its tools discovered.
#[derive(Debug)]
pub struct OpenSession {
    pub session: ProofSession,
    pub tracker: ProofStateTracker,
    pub gateway: ToolGateway,
}

// ---------------------------------------------------------------------------
// Session setup
// ---------------------------------------------------------------------------

/// Start a checker session, read the theorem and build the capability
/// table for it.
pub async fn open_session(
    service: &dyn ProofService,
    transport: Arc<dyn ToolTransport>,
    file_path: &str,
    theorem_name: &str,
    checker_tool: &str,
) -> Result<OpenSession> {
    let start = service
        .start_session(file_path, theorem_name)
        .await
        .with_context(|| format!("failed to start session for {theorem_name} in {file_path}"))?;
    tracing::info!(
        session_id = %start.session_id,
        hash = %start.proof_version_hash,
        "proof session started"
    );

    let version = ProofVersion::new(start.proof_version_hash.clone());
    let theorem = service
        .get_session_theorem(&start.session_id, &start.proof_version_hash)
        .await
        .context("failed to read session theorem")?;

    let table = CapabilityTable::discover(transport, &start.session_id, &version)
        .await
        .context("tool discovery failed")?;
    tracing::info!(tools = ?table.names(), "tools discovered");

    Ok(OpenSession {
        session: ProofSession {
            session_id: start.session_id,
            theorem_name: theorem_name.to_string(),
            theorem_statement: theorem.theorem_statement,
            file_path: file_path.to_string(),
        },
        tracker: ProofStateTracker::new(version),
        gateway: ToolGateway::new(Arc::new(table), checker_tool),
    })
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// One proof run over an open session.
pub struct ProofRun<'a> {
    pub roles: &'a ModelRoles,
    pub service: &'a dyn ProofService,
    pub gateway: &'a ToolGateway,
    pub session: &'a ProofSession,
    pub config: &'a AgentConfig,
}

impl ProofRun<'_> {
    /// Plan, rank and execute. Fails only if plan generation or the goal
    /// probe fails; an unproved theorem is a successful run with
    /// [`RunResult::Exhausted`].
    pub async fn run(&self, tracker: ProofStateTracker) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "run",
            run_id = %run_id,
            theorem = %self.session.theorem_name
        );
        self.run_inner(run_id, tracker).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, tracker: ProofStateTracker) -> Result<RunReport> {
        let started_at = Utc::now();

        let ranking = self.plan().await?;
        let (result, attempts) = self.execute(&ranking.selected, tracker).await?;

        tracing::info!(
            proved = matches!(result, RunResult::Proved { .. }),
            attempts = attempts.len(),
            "run finished"
        );

        Ok(RunReport {
            run_id,
            theorem_name: self.session.theorem_name.clone(),
            theorem: self.session.theorem_statement.clone(),
            file: self.session.file_path.clone(),
            session_id: self.session.session_id.clone(),
            started_at,
            finished_at: Utc::now(),
            planning_mode: self.config.planning.mode,
            ranking,
            attempts,
            result,
        })
    }

    /// Generate candidate plans and rank them.
    pub async fn plan(&self) -> Result<Ranking> {
        let specs = self.gateway.table().specs();
        let plans = generate_plans(
            self.roles,
            &self.session.theorem_statement,
            &specs,
            &self.config.planning,
        )
        .await?;
        Ok(rank_plans(
            self.roles.ranker.as_ref(),
            &self.session.theorem_statement,
            plans,
            self.config.planning.best_plan_samples_number,
        )
        .await)
    }

    /// The outer loop: try each ranked plan once, in order, until one
    /// proves the theorem.
    pub async fn execute(
        &self,
        plans: &[ScoredPlan],
        mut run_state: ProofStateTracker,
    ) -> Result<(RunResult, Vec<ExecutionRecord>)> {
        let executor = InnerExecutor::new(
            self.roles,
            self.service,
            self.gateway,
            self.session,
            &self.config.proof_flow,
        );
        let mut attempts = Vec::new();
        let mut failure_summary = String::new();
        let mut state = OuterState::FetchGoals;

        loop {
            tracing::debug!(state = %state, "outer loop");
            state = match state {
                OuterState::FetchGoals => {
                    let probe = self
                        .service
                        .check_proof(
                            prompts::PROBE_PROOF,
                            &self.session.session_id,
                            &run_state.hash(),
                        )
                        .await
                        .context("initial goal probe failed")?;
                    run_state.set_goals(probe.goals.unwrap_or_default());
                    tracing::info!(goals = run_state.goals().len(), "baseline goals fetched");
                    OuterState::TryPlan(0)
                }
                OuterState::TryPlan(index) => match plans.get(index) {
                    None => OuterState::Exhausted,
                    Some(scored) => {
                        tracing::info!(plan_index = index, score = scored.score, "executing plan");
                        let attempt = self
                            .prepare_attempt(index, &scored.plan, &failure_summary, &run_state)
                            .await;
                        let record = executor.run(attempt).await;
                        let outcome = match &record.finished_proof {
                            Some(proof) => OuterState::Success {
                                proof: proof.clone(),
                                plan_index: index,
                            },
                            None => {
                                failure_summary = self.summarize_failure(&record.history).await;
                                tracing::info!(plan_index = index, "plan failed");
                                OuterState::TryPlan(index + 1)
                            }
                        };
                        attempts.push(record);
                        outcome
                    }
                },
                OuterState::Success { proof, plan_index } => {
                    return Ok((RunResult::Proved { proof, plan_index }, attempts));
                }
                OuterState::Exhausted => {
                    tracing::warn!(attempts = attempts.len(), "all plans exhausted");
                    let count = attempts.len();
                    return Ok((RunResult::Exhausted { attempts: count }, attempts));
                }
            };
        }
    }

    /// Opening messages of an attempt and a fresh copy of the run state.
    async fn prepare_attempt(
        &self,
        index: usize,
        plan: &str,
        failure_summary: &str,
        run_state: &ProofStateTracker,
    ) -> AttemptState {
        let tracker = run_state.clone();
        let similar = match similar_theorems(
            self.service,
            self.session,
            tracker.goals(),
            &tracker.hash(),
        )
        .await
        {
            Ok(similar) => similar,
            Err(e) => {
                tracing::warn!(error = %e, "similar theorem lookup failed, continuing without");
                Vec::new()
            }
        };

        let mut history = vec![
            Message::system(prompts::execution_system(
                &self.session.theorem_name,
                &self.session.file_path,
            )),
            Message::human(prompts::theorem_to_prove(
                &self.session.theorem_statement,
                &self.session.file_path,
            )),
        ];
        if !failure_summary.is_empty() {
            history.push(Message::system(prompts::previous_failures(failure_summary)));
        }
        history.push(Message::human(prompts::follow_plan(plan, &similar)));

        AttemptState::new(index, plan, history, tracker)
    }

    /// Explain why an attempt failed. Returns an empty summary if the
    /// summarizer call fails.
    async fn summarize_failure(&self, history: &[Message]) -> String {
        let mut prompt = failure_summary_prompt(history);
        prompt.push(Message::human(prompts::FAILURE_SUMMARY_REQUEST));
        let specs = self.gateway.table().specs();
        match self.roles.failure_summarizer.invoke(&prompt, &specs).await {
            Ok(reply) => reply.content().trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "failure summarizer call failed");
                String::new()
            }
        }
    }
}

/// Keep the first system message; later ones become human messages so
/// the summarizer sees a single system prompt.
fn failure_summary_prompt(history: &[Message]) -> Vec<Message> {
    let mut seen_system = false;
    history
        .iter()
        .map(|m| match m {
            Message::System { content } if seen_system => {
                Message::human(prompts::demoted_system(content))
            }
            Message::System { .. } => {
                seen_system = true;
                m.clone()
            }
            other => other.clone(),
        })
        .collect()
}
