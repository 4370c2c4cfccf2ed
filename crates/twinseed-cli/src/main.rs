mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use twinseed_engine::config::types::PartitionStrategyKind;

#[derive(Parser)]
#[command(
    name = "twinseed",
    version,
    about = "Provision test data into a digital-twin registry and its connectors"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    RoundRobin,
    Bpn,
}

impl From<Strategy> for PartitionStrategyKind {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::RoundRobin => Self::RoundRobin,
            Strategy::Bpn => Self::Bpn,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Transform the test data and publish it
    Run {
        /// Path to provisioning YAML file
        config: PathBuf,
        /// Test-data document, overriding `input`
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Only provision records of these BPNs (comma-separated)
        #[arg(long, value_delimiter = ',')]
        bpns: Vec<String>,
        /// Partitioning strategy, overriding `partitioning.strategy`
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,
        /// Twins published concurrently
        #[arg(long)]
        parallelism: Option<u32>,
        /// Stop scheduling twins after this many seconds
        #[arg(long)]
        deadline: Option<u64>,
        /// Plan only; contact no service
        #[arg(long)]
        dry_run: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the configuration and plan the test data offline
    Check {
        /// Path to provisioning YAML file
        config: PathBuf,
    },
    /// Delete all shells, contract definitions, policies and assets
    Reset {
        /// Path to provisioning YAML file
        config: PathBuf,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run {
            config,
            input,
            bpns,
            strategy,
            parallelism,
            deadline,
            dry_run,
            json,
        } => {
            let overrides = commands::run::Overrides {
                input,
                bpns,
                strategy: strategy.map(Into::into),
                parallelism,
                deadline_secs: deadline,
            };
            commands::run::execute(&config, overrides, dry_run, json).await
        }
        Commands::Check { config } => commands::check::execute(&config),
        Commands::Reset { config, json } => commands::reset::execute(&config, json).await,
    }
}
