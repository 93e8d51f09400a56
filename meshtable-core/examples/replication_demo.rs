//! Two peers replicating one namespace over the in-process bus
//!
//! Run with:
//! ```bash
//! cargo run --example replication_demo
//! ```

use meshtable_core::core_table::{Content, ContentType, Key};
use meshtable_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use meshtable_core::simulation::{Simulation, SimulationConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_with_config(LogConfig::new(LogLevel::Debug).with_target(false))?;

    let config = SimulationConfig { peers: 2, ..SimulationConfig::default() };
    let mut sim = Simulation::new(config).await?;
    let key = Key::generate(sim.namespace());

    let waypoint = Content::from_bytes(b"52.37N 4.89E".to_vec(), ContentType::WAYPOINT)?;
    sim.table(0).put(key, waypoint)?;
    sim.deliver()?;
    info!(replicated = sim.table(1).get(&key).is_some(), "Creation pushed");

    sim.table(1).delete(&key);
    sim.deliver()?;
    info!(present = sim.table(0).get(&key).is_some(), "Deletion pushed");

    let rounds = sim.run_until_converged(5)?;
    info!(?rounds, stats = ?sim.table(0).stats(), "Done");
    Ok(())
}
