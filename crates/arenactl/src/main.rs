// Arena Control CLI
// Run simulated duels, inspect learned tables, stand in for the policy server

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod duel;
mod serve;

#[derive(Parser)]
#[command(name = "arenactl")]
#[command(about = "Arena combat agent control CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run simulated duels between learning agents and scripted knights
    Simulate {
        /// Number of agents, each in its own duel
        #[arg(short, long, default_value = "1")]
        agents: usize,

        /// Number of episodes
        #[arg(short, long, default_value = "10")]
        episodes: usize,

        /// Directory for table files
        #[arg(short, long, default_value = "saved")]
        storage: PathBuf,

        /// Pool every agent's table through the shared-table manager
        #[arg(long)]
        shared: bool,

        /// Let an external policy server pick actions
        #[arg(long, conflicts_with = "shared")]
        remote: bool,

        /// Tick length in seconds
        #[arg(long, default_value = "0.05")]
        dt: f32,

        /// Longest duel in simulated seconds
        #[arg(long, default_value = "120")]
        max_seconds: f32,

        /// Base seed for exploration and knight behavior
        #[arg(long)]
        seed: Option<u64>,

        /// Agent configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Drop action completion signals so every cycle ends by watchdog
        #[arg(long)]
        stall: bool,
    },

    /// Print a persisted table
    Inspect {
        /// Table file
        file: PathBuf,
    },

    /// Stand-in policy server answering with random actions
    Serve {
        /// Address to listen on
        #[arg(long, default_value = arena_rl_core::protocol::DEFAULT_HOST)]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value_t = arena_rl_core::protocol::DEFAULT_PORT)]
        port: u16,

        /// Seed for the random actions
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            agents,
            episodes,
            storage,
            shared,
            remote,
            dt,
            max_seconds,
            seed,
            config,
            stall,
        } => {
            let options = commands::SimulateOptions {
                agents,
                episodes,
                storage,
                shared,
                remote,
                dt,
                max_seconds,
                seed,
                config,
                stall,
            };
            commands::simulate(options).await?;
        }

        Commands::Inspect { file } => {
            commands::inspect(&file).await?;
        }

        Commands::Serve { host, port, seed } => {
            serve::serve(&host, port, seed).await?;
        }
    }

    Ok(())
}
