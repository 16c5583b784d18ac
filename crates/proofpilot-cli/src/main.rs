mod config;
mod prove_cmd;
mod tools_cmd;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};

use proofpilot_core::config::PlanningMode;

use config::ProofPilotConfig;

#[derive(Parser)]
#[command(
    name = "proofpilot",
    version,
    about = "Prove a Coq theorem with planning language models and a remote checker"
)]
struct Cli {
    /// Project/checker REST service URL (overrides PROOFPILOT_PROJECT_URL)
    #[arg(long, global = true)]
    project_url: Option<String>,

    /// Tool server URL (overrides PROOFPILOT_TOOLS_URL)
    #[arg(long, global = true)]
    tools_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Prove one theorem
    Prove {
        /// Path of the file holding the theorem, as the services know it
        file: String,
        /// Name of the theorem to prove
        theorem: String,
        /// How candidate plans are produced
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Number of candidate plans to generate
        #[arg(long)]
        plans: Option<usize>,
        /// Number of top-ranked plans to try
        #[arg(long)]
        best: Option<usize>,
        /// Tool calls per plan attempt before giving up
        #[arg(long)]
        max_tool_iterations: Option<usize>,
        /// Print the full run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the tools offered by the tool server
    Tools {
        /// Print raw tool descriptors as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Simple,
    Debate,
}

impl From<ModeArg> for PlanningMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Simple => PlanningMode::Simple,
            ModeArg::Debate => PlanningMode::Debate,
        }
    }
}

/// Execute the `proofpilot init` command: write the starter config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let path = config::save_config(&config::ConfigFile::starter())?;

    println!("Config written to {}", path.display());
    println!("  services.project_url = {}", config::DEFAULT_PROJECT_URL);
    println!("  services.tools_url = {}", config::DEFAULT_TOOLS_URL);
    println!("  models.{} uses $OPENAI_API_KEY", config::DEFAULT_PROFILE);
    println!();
    println!("Next: run `proofpilot prove <file> <theorem>`.");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            cmd_init(force)?;
        }
        Commands::Prove {
            file,
            theorem,
            mode,
            plans,
            best,
            max_tool_iterations,
            json,
        } => {
            let mut resolved =
                ProofPilotConfig::resolve(cli.project_url.as_deref(), cli.tools_url.as_deref())?;
            let planning = &mut resolved.agent.planning;
            if let Some(mode) = mode {
                planning.mode = mode.into();
            }
            if let Some(n) = plans {
                planning.plan_samples_number = n;
            }
            if let Some(n) = best {
                planning.best_plan_samples_number = n;
            }
            if let Some(n) = max_tool_iterations {
                resolved.agent.proof_flow.max_tool_iterations = n;
            }

            let proved = prove_cmd::run_prove(&resolved, &file, &theorem, json).await?;
            if !proved {
                std::process::exit(1);
            }
        }
        Commands::Tools { json } => {
            let resolved =
                ProofPilotConfig::resolve(cli.project_url.as_deref(), cli.tools_url.as_deref())?;
            tools_cmd::run_tools(&resolved, json).await?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "proofpilot",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn prove_parses_overrides() {
        let cli = Cli::try_parse_from([
            "proofpilot",
            "--tools-url",
            "http://t/mcp",
            "prove",
            "src/Add.v",
            "add_zero",
            "--mode",
            "debate",
            "--plans",
            "3",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.tools_url.as_deref(), Some("http://t/mcp"));
        match cli.command {
            Commands::Prove {
                file,
                theorem,
                mode,
                plans,
                json,
                ..
            } => {
                assert_eq!(file, "src/Add.v");
                assert_eq!(theorem, "add_zero");
                assert_eq!(mode.map(PlanningMode::from), Some(PlanningMode::Debate));
                assert_eq!(plans, Some(3));
                assert!(json);
            }
            _ => panic!("expected prove"),
        }
    }
}
