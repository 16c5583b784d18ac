//! `proofpilot prove`: run the orchestrator against live services.

use std::sync::Arc;

use anyhow::{Context, Result};

use proofpilot_core::orchestrator::{ProofRun, RunReport, RunResult, open_session};
use proofpilot_core::service::{ProofService, RestProofService};
use proofpilot_core::tools::{ClientInfo, RpcToolClient};

use crate::config::ProofPilotConfig;

/// Prove `theorem` from `file`. Returns whether a proof was found.
pub async fn run_prove(
    config: &ProofPilotConfig,
    file: &str,
    theorem: &str,
    json: bool,
) -> Result<bool> {
    let roles = config.build_roles()?;
    let service = RestProofService::with_timeout(&config.project_url, config.request_timeout)?;
    let transport = RpcToolClient::connect_with_timeout(
        &config.tools_url,
        ClientInfo::default(),
        config.request_timeout,
    )
    .await
    .with_context(|| format!("failed to connect to tool server at {}", config.tools_url))?;
    tracing::info!(
        project_url = %config.project_url,
        tools_url = %config.tools_url,
        mode = %config.agent.planning.mode,
        "services connected"
    );

    let open = open_session(
        &service,
        Arc::new(transport),
        file,
        theorem,
        &config.agent.proof_flow.checker_tool,
    )
    .await?;

    let run = ProofRun {
        roles: &roles,
        service: &service,
        gateway: &open.gateway,
        session: &open.session,
        config: &config.agent,
    };
    let report = run.run(open.tracker.clone()).await;

    if let Err(e) = service.finish_session(&open.session.session_id).await {
        tracing::warn!(session_id = %open.session.session_id, error = %e, "failed to finish session");
    }

    let report = report?;
    print_report(&report, json)?;
    Ok(report.is_proved())
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).context("failed to serialize run report")?
        );
        return Ok(());
    }

    let elapsed = report.finished_at - report.started_at;
    match &report.result {
        RunResult::Proved { proof, plan_index } => {
            println!(
                "Proved {} with plan {} in {}s.",
                report.theorem_name,
                plan_index + 1,
                elapsed.num_seconds()
            );
            println!();
            println!("{proof}");
        }
        RunResult::Exhausted { attempts } => {
            eprintln!(
                "No proof found for {} after {attempts} plan attempt(s) in {}s.",
                report.theorem_name,
                elapsed.num_seconds()
            );
            for record in &report.attempts {
                eprintln!(
                    "  plan {}: {:?} after {} tool call(s)",
                    record.plan_index + 1,
                    record.stop_reason,
                    record.tool_iterations
                );
            }
        }
    }
    Ok(())
}
