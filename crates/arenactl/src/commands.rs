// Simulate and inspect command implementations

use anyhow::{Context, Result};
use arena_rl_agent::{AgentConfig, CombatAgent, PolicyVariant, TableManager, TableStore, World};
use arena_rl_env::{Arena, ArenaConfig, Outcome};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::duel::{self, Duel, DuelReport};

pub struct SimulateOptions {
    pub agents: usize,
    pub episodes: usize,
    pub storage: PathBuf,
    pub shared: bool,
    pub remote: bool,
    pub dt: f32,
    pub max_seconds: f32,
    pub seed: Option<u64>,
    pub config: Option<PathBuf>,
    pub stall: bool,
}

pub async fn simulate(options: SimulateOptions) -> Result<()> {
    anyhow::ensure!(options.dt > 0.0, "tick length must be positive");
    anyhow::ensure!(options.agents > 0, "at least one agent is required");

    let mut base = match &options.config {
        Some(path) => AgentConfig::from_file(path)
            .with_context(|| format!("Failed to load agent config {}", path.display()))?,
        None => AgentConfig::default(),
    };
    if options.remote {
        base.policy = PolicyVariant::Remote;
    }
    if options.shared {
        base.table.table_name = Some(base.table.shared_filename.clone());
    }

    let store = TableStore::new(&options.storage);
    store
        .init()
        .await
        .with_context(|| format!("Failed to create storage directory {}", options.storage.display()))?;

    println!("Arena simulation");
    println!("   Agents: {}", options.agents);
    println!("   Episodes: {}", options.episodes);
    println!("   Policy: {:?}", base.policy);
    println!("   Shared table: {}", options.shared);
    println!("   Storage: {}", options.storage.display());
    println!();

    for episode in 0..options.episodes {
        let reports = run_episode(&options, &base, &store, episode).await?;
        print_episode(episode, &reports);
    }

    Ok(())
}

async fn run_episode(
    options: &SimulateOptions,
    base: &AgentConfig,
    store: &TableStore,
    episode: usize,
) -> Result<Vec<DuelReport>> {
    let manager = options
        .shared
        .then(|| TableManager::new(store.clone(), base.table.shared_filename.clone()));
    let world = match &manager {
        Some(manager) => World::new(store.clone()).with_manager(manager.handle()),
        None => World::new(store.clone()),
    };

    let mut duels = Vec::with_capacity(options.agents);
    for index in 0..options.agents {
        let offset = (episode * options.agents + index) as u64;
        let mut config = base.clone();
        config.name = format!("{}{}", base.name, index);
        config.learning.seed = options.seed.map(|s| s.wrapping_add(offset));

        let arena = Arena::new(ArenaConfig {
            seed: options.seed.map(|s| s.wrapping_add(offset).wrapping_mul(31)),
            stall_completions: options.stall,
            ..ArenaConfig::default()
        });
        let agent = CombatAgent::start(config, &world, &arena)
            .await
            .with_context(|| format!("Failed to start agent {index}"))?;
        duels.push(Duel { agent, arena });
    }

    let pace = base.policy == PolicyVariant::Remote;
    duel::run_all(&mut duels, options.dt, options.max_seconds, pace).await;

    let mut reports = Vec::with_capacity(duels.len());
    for duel in duels {
        reports.push(duel.report());
        let Duel { agent, arena } = duel;
        let name = agent.name().to_string();
        if let Err(e) = agent.shutdown(&arena).await {
            warn!(agent = %name, error = %e, "agent teardown failed");
        }
    }

    if let Some(mut manager) = manager {
        let merged = manager.tick();
        info!(episode, merged, "merged shared tables");
        manager
            .shutdown()
            .await
            .context("Failed to persist the shared table")?;
    }
    Ok(reports)
}

fn print_episode(episode: usize, reports: &[DuelReport]) {
    let wins = reports
        .iter()
        .filter(|r| r.outcome == Some(Outcome::EnemyWon))
        .count();
    let losses = reports
        .iter()
        .filter(|r| r.outcome == Some(Outcome::KnightWon))
        .count();
    println!(
        "Episode {:>3}: {} won, {} lost, {} undecided",
        episode + 1,
        wins,
        losses,
        reports.len() - wins - losses
    );
    for (index, report) in reports.iter().enumerate() {
        println!(
            "   agent {index}: {:?} after {:.1}s, {} decisions, {} watchdog recoveries, {} states",
            report.outcome,
            report.seconds,
            report.stats.decisions,
            report.stats.watchdog_recoveries,
            report.states
        );
    }
}

pub async fn inspect(file: &Path) -> Result<()> {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Not a table file: {}", file.display()))?;
    let dir = file.parent().unwrap_or_else(|| Path::new("."));
    let store = TableStore::new(dir);

    match store.load(name).await {
        Ok(Some(table)) => {
            print!("{}", table.describe());
            println!("{} states", table.len());
        }
        Ok(None) => println!("No table at {}", file.display()),
        Err(e) => {
            warn!(error = %e, "table is unreadable");
            println!("Table at {} is malformed and would load empty", file.display());
        }
    }
    Ok(())
}
