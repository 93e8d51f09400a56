use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use meshtable_core::adapters::FileNamespaceState;
use meshtable_core::config::Config;
use meshtable_core::core_table::{Content, ContentType, Key, NamespaceState};
use meshtable_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use meshtable_core::metrics::init_metrics;
use meshtable_core::simulation::{Simulation, SimulationConfig};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "meshtable")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML); MESHTABLE_* variables apply on top
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replicate random writes between in-process peers and report convergence
    Simulate {
        #[arg(long, default_value_t = 3)]
        peers: usize,

        /// Entries created, each on a random peer
        #[arg(long, default_value_t = 50)]
        puts: usize,

        /// Entries deleted afterwards, each on a random peer
        #[arg(long, default_value_t = 0)]
        deletes: usize,

        /// Probability that a single delivery is lost
        #[arg(long, default_value_t = 0.0)]
        drop_rate: f64,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Sync rounds before giving up
        #[arg(long, default_value_t = 20)]
        max_rounds: usize,

        /// Keep one snapshot file per peer in this directory
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the contents of a snapshot file
    Inspect {
        path: PathBuf,

        /// Only this namespace
        #[arg(long)]
        namespace: Option<Uuid>,

        /// List every record, not just the per-namespace totals
        #[arg(long)]
        records: bool,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    namespace: String,
    peers: usize,
    live_entries: Vec<usize>,
    rounds: Option<usize>,
    converged: bool,
    delivered: u64,
    dropped: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;

    let mut log_config = LogConfig::try_from(&config.logging)?;
    if let Some(level) = &args.log_level {
        let current = log_config.level;
        log_config.level = LogLevel::from_str(level).unwrap_or_else(|| {
            eprintln!("Invalid log level '{}', using '{}'", level, current);
            current
        });
    }
    if args.json_logs {
        log_config.json_format = true;
    }
    init_logging_with_config(log_config)?;
    init_metrics();

    match args.command {
        Command::Simulate {
            peers,
            puts,
            deletes,
            drop_rate,
            seed,
            max_rounds,
            snapshot_dir,
            json,
        } => {
            if peers == 0 {
                bail!("--peers must be at least 1");
            }
            if !(0.0..=1.0).contains(&drop_rate) {
                bail!("--drop-rate must be within 0.0..=1.0");
            }

            let sim_config = SimulationConfig { peers, drop_rate, seed, table: config.table.clone() };
            let report =
                simulate(sim_config, puts, deletes, max_rounds, snapshot_dir).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            if !report.converged {
                warn!(max_rounds, "Peers did not converge");
            }
        }
        Command::Inspect { path, namespace, records } => {
            inspect(path, namespace, records).await?;
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn simulate(
    config: SimulationConfig,
    puts: usize,
    deletes: usize,
    max_rounds: usize,
    snapshot_dir: Option<PathBuf>,
) -> Result<SimulationReport> {
    let peers = config.peers;
    let mut sim = match &snapshot_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let states = (0..peers)
                .map(|i| {
                    let path = dir.join(format!("peer-{}.snapshot", i));
                    Arc::new(FileNamespaceState::new(path)) as Arc<dyn NamespaceState>
                })
                .collect();
            Simulation::with_states(config, states).await?
        }
        None => Simulation::new(config).await?,
    };

    let namespace = sim.namespace();
    let mut created = Vec::with_capacity(puts);
    for n in 0..puts {
        let peer = sim.random_peer();
        let key = Key::generate(namespace);
        let content = Content::from_bytes(format!("entry {}", n).into_bytes(), ContentType::TEXT)?;
        if sim.table(peer).put(key, content)?.is_some() {
            created.push(key);
        }
        sim.deliver()?;
    }

    for key in created.iter().take(deletes) {
        let peer = sim.random_peer();
        if sim.table(peer).delete(key).is_none() {
            info!(%key, peer, "Delete skipped, entry not live on that peer");
        }
        sim.deliver()?;
    }

    let rounds = sim.run_until_converged(max_rounds)?;

    if snapshot_dir.is_some() {
        for peer in sim.peers() {
            peer.table.flush().await;
        }
    }

    let stats = sim.bus_stats();
    Ok(SimulationReport {
        namespace: namespace.to_string(),
        peers,
        live_entries: sim
            .peers()
            .iter()
            .map(|peer| peer.table.stats())
            .map(|stats| stats.entries - stats.tombstones)
            .collect(),
        rounds,
        converged: rounds.is_some(),
        delivered: stats.delivered,
        dropped: stats.dropped,
    })
}

fn print_report(report: &SimulationReport) {
    println!("namespace   {}", report.namespace);
    println!("peers       {}", report.peers);
    for (i, live) in report.live_entries.iter().enumerate() {
        println!("  peer {:<4} {} live entries", i, live);
    }
    match report.rounds {
        Some(rounds) => println!("converged   after {} round(s)", rounds),
        None => println!("converged   no"),
    }
    println!("delivered   {}", report.delivered);
    println!("dropped     {}", report.dropped);
}

async fn inspect(path: PathBuf, only: Option<Uuid>, list_records: bool) -> Result<()> {
    let state = FileNamespaceState::new(&path);
    let Some(snapshot) = state.load().await? else {
        bail!("No snapshot at {}", path.display());
    };

    println!("snapshot    {}", path.display());
    println!("written     {} ms since epoch", snapshot.metadata.timestamp);
    println!("namespaces  {}", snapshot.metadata.namespaces_count);
    println!("entries     {}", snapshot.metadata.entries_count);

    let mut namespaces: Vec<_> = snapshot.table.iter().collect();
    namespaces.sort_by_key(|(namespace, _)| **namespace);

    for (namespace, entries) in namespaces {
        if only.is_some_and(|wanted| wanted != *namespace) {
            continue;
        }
        let tombstones = entries.values().filter(|content| content.is_deleted()).count();
        println!();
        println!("{}  {} live, {} tombstones", namespace, entries.len() - tombstones, tombstones);

        if list_records {
            let mut records: Vec<_> = entries
                .iter()
                .map(|(id, content)| (content.record(Key::new(*namespace, *id)), content))
                .collect();
            records.sort_by_key(|(record, _)| (record.version, record.key.id));
            for (record, content) in records {
                let kind = if content.is_deleted() { "tombstone" } else { "live" };
                println!(
                    "  {} v{} {} type={} {} bytes",
                    record.key.id,
                    record.version,
                    kind,
                    content.content_type.0,
                    content.len()
                );
            }
        }
    }

    Ok(())
}
