//! Candidate plan generation and ranking.
//!
//! All candidates are generated concurrently in a bounded task group and
//! collected before ranking starts. A single failed generation fails the
//! whole batch.

pub mod debate;
pub mod rank;
pub mod simple;
mod verdict;

pub use debate::{DebateOutcome, Debaters, JudgeVerdict, Winner, run_debate};
pub use rank::{Ranking, ScoredPlan, rank_plans};
pub use simple::generate_plan;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::{PlanningConfig, PlanningMode};
use crate::model::{ModelRoles, ToolSpec};

/// Generate `config.plan_samples_number` candidate plans.
///
/// Plans are returned in generation-index order regardless of completion
/// order. At most `config.max_parallel_generations` run at once.
pub async fn generate_plans(
    roles: &ModelRoles,
    theorem: &str,
    tools: &[ToolSpec],
    config: &PlanningConfig,
) -> Result<Vec<String>> {
    let count = config.plan_samples_number;
    let semaphore = Arc::new(Semaphore::new(config.max_parallel_generations.max(1)));
    let theorem: Arc<str> = Arc::from(theorem);
    let tools: Arc<[ToolSpec]> = Arc::from(tools);

    tracing::info!(count, mode = %config.mode, "generating candidate plans");

    let mut set = JoinSet::new();
    for index in 0..count {
        let semaphore = Arc::clone(&semaphore);
        let roles = roles.clone();
        let theorem = Arc::clone(&theorem);
        let tools = Arc::clone(&tools);
        let mode = config.mode;
        let rounds = config.rounds_number;

        set.spawn(async move {
            let result = async {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .context("generation semaphore closed")?;
                match mode {
                    PlanningMode::Simple => {
                        generate_plan(roles.planner.as_ref(), &theorem, &tools).await
                    }
                    PlanningMode::Debate => {
                        let debaters = Debaters {
                            a: roles.debater_a.as_ref(),
                            b: roles.debater_b.as_ref(),
                            judge: roles.judge.as_ref(),
                        };
                        run_debate(debaters, &theorem, &tools, rounds)
                            .await
                            .map(|outcome| outcome.verdict.plan)
                    }
                }
            }
            .await;
            (index, result)
        });
    }

    let mut plans: Vec<Option<String>> = vec![None; count];
    while let Some(joined) = set.join_next().await {
        let (index, result) = joined.context("plan generation task panicked")?;
        let plan = result.with_context(|| format!("plan generation {index} failed"))?;
        tracing::debug!(plan_index = index, "candidate plan ready");
        plans[index] = Some(plan);
    }

    Ok(plans.into_iter().flatten().collect())
}
