//! browser-agent CLI
//!
//! Lists the built-in action catalogue or replays a scripted run against a
//! real Chrome instance.

use anyhow::Context;
use browser_agent::actions::builtin::BuiltinConfig;
use browser_agent::{ActionRegistry, Agent, AgentSettings, BrowserSession, LaunchOptions, ScriptedDecisions};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "browser-agent")]
#[command(version)]
#[command(about = "Action dispatch and step orchestration for browser agents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the built-in action catalogue as JSON
    Actions,

    /// Run the agent with a fixed list of decisions
    Replay {
        /// JSON array of decisions, one per step
        #[arg(long, value_name = "FILE")]
        script: PathBuf,

        /// Task description recorded with the run
        #[arg(long)]
        task: String,

        /// Launch browser in headed mode (default: headless)
        #[arg(long, short = 'H')]
        headed: bool,

        /// Override the step limit
        #[arg(long, value_name = "N")]
        max_steps: Option<u64>,

        /// Agent settings as JSON
        #[arg(long, value_name = "FILE")]
        settings: Option<PathBuf>,

        /// Files the upload_file action may use
        #[arg(long = "file", value_name = "PATH")]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Actions => {
            let registry = ActionRegistry::with_defaults()?;
            println!("{}", serde_json::to_string_pretty(&registry.catalogue())?);
        }
        Command::Replay {
            script,
            task,
            headed,
            max_steps,
            settings,
            files,
        } => {
            let script_json = tokio::fs::read_to_string(&script)
                .await
                .with_context(|| format!("Failed to read script {}", script.display()))?;
            let decisions = ScriptedDecisions::from_json(&script_json)?;

            let mut agent_settings = match settings {
                Some(path) => {
                    let json = tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("Failed to read settings {}", path.display()))?;
                    AgentSettings::from_json(&json)?
                }
                None => AgentSettings::default(),
            };
            if let Some(max_steps) = max_steps {
                agent_settings = agent_settings.max_steps(max_steps);
            }

            let builtins = files.into_iter().fold(BuiltinConfig::new(), BuiltinConfig::with_file);
            let registry = Arc::new(ActionRegistry::with_builtins(&builtins)?);

            let session = BrowserSession::launch(LaunchOptions {
                headless: !headed,
                ..Default::default()
            })?;
            let context = session.open_context()?;

            let result = Agent::new(task, registry, Arc::new(decisions), context)
                .with_settings(agent_settings)
                .run()
                .await;

            eprintln!(
                "Run {} ended with {:?} after {} steps",
                result.run_id, result.termination, result.steps
            );
            if let Some(error) = &result.error {
                eprintln!("Error: {}", error);
            }

            let summary = serde_json::json!({
                "run_id": result.run_id,
                "done": result.done,
                "result": result.result,
                "steps": result.steps,
                "termination": result.termination,
                "error": result.error,
                "history": result.history.to_value_safe(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);

            session.close()?;
        }
    }

    Ok(())
}
