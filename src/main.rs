mod demo;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bizflow_core::config::BizFlowConfig;
use bizflow_flow::FlowOptions;

#[derive(Parser)]
#[command(name = "bizflow", version, about = "Business flow orchestration engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "bizflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the order-approval demo flow and print its result
    Run {
        /// Flow variable as KEY=VALUE; VALUE is parsed as JSON, else taken as a string
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, Value)>,
    },
    /// Print the demo flow as a diagram
    Export {
        #[arg(long, value_enum, default_value_t = Format::Plantuml)]
        format: Format,
    },
    /// Show current configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Plantuml,
    Dot,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = BizFlowConfig::load_or_default(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if !cli.config.exists() {
        warn!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Export { format } => {
            let flow = build_demo(&config)?;
            let diagram = match format {
                Format::Plantuml => flow.to_plantuml(),
                Format::Dot => flow.to_dot(),
            };
            println!("{}", diagram);
        }
        Commands::Run { vars } => {
            let flow = build_demo(&config)?;
            let mut variables = demo::default_variables();
            variables.extend(vars);
            info!(flow_id = %flow.id(), vars = variables.len(), "Starting demo run");

            let result = tokio::task::spawn_blocking(move || flow.execute_with_variables(variables))
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if !result.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn build_demo(config: &BizFlowConfig) -> anyhow::Result<bizflow_flow::FlowGraph> {
    let (commands, queries) = demo::buses();
    Ok(demo::order_flow(
        commands,
        queries,
        FlowOptions::from_config(config),
    )?)
}

/// Parse `KEY=VALUE` into a flow variable.
fn parse_var(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("variable name must not be empty in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
