//! osm-abts CLI
//!
//! OSM XML → 도로망 → 여행자 → 경로 시뮬레이션 도구

use std::path::{Path, PathBuf};

use abts_core::{form_network_from_osm, read_osm, Model, ModelSnapshot, SimulationConfig};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "osm-abts", version)]
#[command(about = "Activity-based traffic simulation on OpenStreetMap exports", long_about = None)]
struct Cli {
    /// Simulation config file (.json, .yaml or .yml)
    #[arg(long, global = true, env = "ABTS_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full simulation
    Simulate {
        /// OSM XML export to build the model from
        #[arg(long, required_unless_present = "snapshot", conflicts_with = "snapshot")]
        osm: Option<PathBuf>,

        /// Prepared model snapshot to start from instead
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Number of travellers
        #[arg(long, default_value_t = 1000)]
        travellers: usize,

        /// Number of simulated weeks
        #[arg(long, default_value_t = 4)]
        weeks: u32,

        /// Overrides the configured seed
        #[arg(long)]
        seed: Option<u64>,

        /// Write the JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Build the road network and print its statistics
    Network {
        /// OSM XML export
        #[arg(long)]
        osm: PathBuf,
    },

    /// Prepare network and places once and store them
    Snapshot {
        /// OSM XML export
        #[arg(long)]
        osm: PathBuf,

        /// Output snapshot file
        #[arg(long)]
        out: PathBuf,
    },

    /// Describe a snapshot file
    Inspect {
        /// Snapshot file
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// Print a configuration as JSON
    Config {
        /// Tag-only junctions and the base speed table
        #[arg(long)]
        original: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Simulate {
            osm,
            snapshot,
            travellers,
            weeks,
            seed,
            report,
        } => {
            let mut model = match (osm, snapshot) {
                (Some(osm), _) => {
                    let mut config = load_config(cli.config.as_deref())?;
                    if let Some(seed) = seed {
                        config = config.with_seed(seed);
                    }
                    println!("🗺️  Reading {}...", osm.display());
                    Model::new(&osm, config)
                        .with_context(|| format!("failed to read {}", osm.display()))?
                }
                (None, Some(path)) => {
                    println!("📦 Restoring {}...", path.display());
                    let mut snapshot = ModelSnapshot::load(&path)
                        .with_context(|| format!("failed to load snapshot {}", path.display()))?;
                    if let Some(config_path) = cli.config.as_deref() {
                        let overrides = load_config(Some(config_path))?;
                        apply_run_settings(&mut snapshot.config, overrides);
                    }
                    if let Some(seed) = seed {
                        snapshot.config.seed = seed;
                    }
                    Model::from_snapshot(snapshot)?
                }
                (None, None) => anyhow::bail!("either --osm or --snapshot is required"),
            };

            println!("🚗 Simulating {} travellers over {} weeks...", travellers, weeks);
            let result = model.run(travellers, weeks).context("simulation failed")?;

            println!("\n✅ Simulation finished\n");
            print!("{}", result);

            if let Some(path) = report {
                let json = result.to_json_pretty()?;
                std::fs::write(&path, json)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("\n📄 Report saved to: {}", path.display());
            }
        }

        Commands::Network { osm } => {
            let config = load_config(cli.config.as_deref())?;
            let raw = read_osm(&osm).with_context(|| format!("failed to read {}", osm.display()))?;
            let network = form_network_from_osm(&raw, &config.network)?;
            let stats = network.stats();

            println!("🛣️  Network of {}", osm.display());
            println!("   Raw nodes:         {}", raw.node_count());
            println!("   Raw ways:          {}", raw.way_count());
            println!("   Junctions:         {}", stats.nodes);
            println!("   Road segments:     {}", stats.edges);
            println!("   Dead ends:         {}", stats.dead_ends);
            println!(
                "   Components:        {} (largest {})",
                stats.components, stats.largest_component
            );
            println!("   Total length:      {:.2} mi", stats.total_length_miles);
        }

        Commands::Snapshot { osm, out } => {
            let config = load_config(cli.config.as_deref())?;
            println!("🔨 Preparing model...");
            println!("   Input:  {}", osm.display());
            println!("   Output: {}", out.display());

            let mut model = Model::new(&osm, config)
                .with_context(|| format!("failed to read {}", osm.display()))?;
            model.form_network()?;
            model.form_places()?;
            model
                .snapshot()?
                .save(&out)
                .with_context(|| format!("failed to write {}", out.display()))?;

            let size = std::fs::metadata(&out)?.len();
            println!(
                "\n✅ Snapshot written ({} bytes, {:.2} KB)",
                size,
                size as f64 / 1024.0
            );
        }

        Commands::Inspect { snapshot } => {
            let loaded = ModelSnapshot::load(&snapshot)
                .with_context(|| format!("failed to load snapshot {}", snapshot.display()))?;
            print_snapshot(&snapshot, &loaded);
        }

        Commands::Config { original } => {
            let config = if original {
                SimulationConfig::original()
            } else {
                SimulationConfig::default()
            };
            println!("{}", config.to_json_pretty()?);
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_config(path: Option<&Path>) -> Result<SimulationConfig> {
    match path {
        Some(path) => {
            let config = SimulationConfig::from_path(path)
                .with_context(|| format!("invalid config {}", path.display()))?;
            tracing::info!(path = %path.display(), seed = config.seed, "Using config file");
            Ok(config)
        }
        None => Ok(SimulationConfig::default()),
    }
}

/// Takes traveller, trip and seed settings from `overrides`; network and
/// place settings stay those that built the stored model
fn apply_run_settings(stored: &mut SimulationConfig, overrides: SimulationConfig) {
    stored.seed = overrides.seed;
    stored.travellers = overrides.travellers;
    stored.trips = overrides.trips;
}

fn print_snapshot(path: &Path, snapshot: &ModelSnapshot) {
    let stats = snapshot.network.stats();
    println!("📦 {}", path.display());
    println!("   Version:    {}", snapshot.version);
    println!("   Created:    {}", snapshot.created_at);
    if let Some(source) = &snapshot.source {
        println!("   Source:     {}", source);
    }
    println!("   Seed:       {}", snapshot.config.seed);
    println!(
        "   Network:    {} junctions, {} roads, {:.2} mi",
        stats.nodes, stats.edges, stats.total_length_miles
    );
    println!("   Places:");
    for (category, count) in snapshot.places.counts() {
        println!("     {:<12} {}", category, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_simulate_needs_a_source() {
        assert!(Cli::try_parse_from(["osm-abts", "simulate"]).is_err());
        assert!(Cli::try_parse_from([
            "osm-abts",
            "simulate",
            "--osm",
            "a.osm",
            "--snapshot",
            "a.abts"
        ])
        .is_err());
    }

    #[test]
    fn test_simulate_defaults() {
        let cli = Cli::try_parse_from(["osm-abts", "simulate", "--osm", "town.osm"]).unwrap();
        match cli.command {
            Commands::Simulate {
                osm,
                travellers,
                weeks,
                seed,
                ..
            } => {
                assert_eq!(osm, Some(PathBuf::from("town.osm")));
                assert_eq!(travellers, 1000);
                assert_eq!(weeks, 4);
                assert_eq!(seed, None);
            }
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "osm-abts",
            "network",
            "--osm",
            "town.osm",
            "--config",
            "sim.yaml",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("sim.yaml")));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_snapshot_keeps_network_and_place_settings() {
        let mut stored = SimulationConfig::original();
        let mut overrides = SimulationConfig::default().with_seed(77);
        overrides.travellers.favourites_per_category = 1;
        overrides.trips.templates.truncate(2);
        overrides.places.max_snap_distance_miles = Some(0.5);

        apply_run_settings(&mut stored, overrides);

        assert_eq!(stored.seed, 77);
        assert_eq!(stored.travellers.favourites_per_category, 1);
        assert_eq!(stored.trips.templates.len(), 2);
        assert!(!stored.network.split_at_shared_nodes);
        assert_eq!(stored.places.max_snap_distance_miles, None);
    }

    #[test]
    fn test_config_flag_is_plain_switch() {
        let cli = Cli::try_parse_from(["osm-abts", "config", "--original"]).unwrap();
        assert!(matches!(cli.command, Commands::Config { original: true }));
        let cli = Cli::try_parse_from(["osm-abts", "config"]).unwrap();
        assert!(matches!(cli.command, Commands::Config { original: false }));
    }

    #[test]
    fn test_default_config_when_no_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config.seed, SimulationConfig::default().seed);
    }
}
