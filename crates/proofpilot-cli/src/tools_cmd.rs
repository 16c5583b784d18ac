//! `proofpilot tools`: show what the tool server offers.

use anyhow::{Context, Result};

use proofpilot_core::tools::{
    ClientInfo, PROOF_HASH_ARG, RpcToolClient, SESSION_ID_ARG, ToolDescriptor, ToolTransport,
};

use crate::config::ProofPilotConfig;

pub async fn run_tools(config: &ProofPilotConfig, json: bool) -> Result<()> {
    let client = RpcToolClient::connect_with_timeout(
        &config.tools_url,
        ClientInfo::default(),
        config.request_timeout,
    )
    .await
    .with_context(|| format!("failed to connect to tool server at {}", config.tools_url))?;
    let tools = client.list_tools().await.context("tools/list failed")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&tools).context("failed to serialize tools")?
        );
        return Ok(());
    }

    if tools.is_empty() {
        println!("No tools offered by {}.", config.tools_url);
        return Ok(());
    }

    println!("{} tool(s) at {}:", tools.len(), config.tools_url);
    for tool in &tools {
        println!("{}", describe(tool));
    }
    Ok(())
}

/// One line per tool: name, visible parameters, and which session fields
/// get injected.
fn describe(tool: &ToolDescriptor) -> String {
    let required: Vec<&str> = tool
        .input_schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();
    let params: Vec<&str> = tool
        .input_schema
        .get("properties")
        .and_then(|p| p.as_object())
        .map(|p| {
            p.keys()
                .map(String::as_str)
                .filter(|k| *k != SESSION_ID_ARG && *k != PROOF_HASH_ARG)
                .collect()
        })
        .unwrap_or_default();
    let injected: Vec<&str> = [SESSION_ID_ARG, PROOF_HASH_ARG]
        .into_iter()
        .filter(|k| required.contains(k))
        .collect();

    let mut line = format!("  {}({})", tool.name, params.join(", "));
    if !injected.is_empty() {
        line.push_str(&format!(" [injected: {}]", injected.join(", ")));
    }
    if let Some(first) = tool.description.lines().next().filter(|l| !l.is_empty()) {
        line.push_str(&format!(" - {first}"));
    }
    line
}
