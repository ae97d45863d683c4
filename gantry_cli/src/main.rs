// CLI entry point for the gantry construction driver.
//
// Generates a blueprint, seeds an in-memory world around it, and drives a
// full build — gate, phases, guardian, verification — printing the final
// report. Checkpoints land in a real on-disk store, so interrupted runs
// show up in `gantry list` and can be continued with `gantry resume`.
//
// This binary is deliberately thin: every decision lives in `gantry_core`;
// here is only argument parsing, logging bootstrap, world seeding, and
// report formatting.

mod generators;
mod logging;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gantry_core::blueprint::Blueprint;
use gantry_core::checkpoint::CheckpointStore;
use gantry_core::config::{GantryConfig, ManagerConfig, VerifierConfig};
use gantry_core::manager::{BuildManager, BuildReport, StopHandle};
use gantry_core::schedule::SystemClock;
use gantry_core::session::BuildSession;
use gantry_core::types::{BlockKind, BlockPos, SessionId};
use gantry_core::world::GridWorld;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "gantry",
    version,
    about = "Autonomous construction driver (dry runs against an in-memory world)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a blueprint and drive a full build.
    Build {
        #[arg(long, value_enum, default_value_t = Shape::House)]
        shape: Shape,
        #[arg(long, default_value_t = 5)]
        width: i32,
        #[arg(long, default_value_t = 5)]
        depth: i32,
        /// Wall layers between floor and roof (house only).
        #[arg(long, default_value_t = 3)]
        height: i32,
        /// Anchor corner "x,y,z" at foundation level.
        #[arg(long, default_value = "10,1,10")]
        at: String,
        /// Proceed even if the pre-build gate fails.
        #[arg(long)]
        force: bool,
        /// Print the full report as JSON instead of the summary.
        #[arg(long)]
        json: bool,
        #[arg(long, default_value = ".gantry/checkpoints")]
        checkpoint_dir: PathBuf,
        /// JSON config file overriding the default tunables.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List sessions recorded in the checkpoint store.
    List {
        #[arg(long, default_value = ".gantry/checkpoints")]
        checkpoint_dir: PathBuf,
    },
    /// Resume a checkpointed session and drive it to completion.
    Resume {
        session_id: String,
        #[arg(long)]
        json: bool,
        #[arg(long, default_value = ".gantry/checkpoints")]
        checkpoint_dir: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Shape {
    House,
    Wall,
    Platform,
}

// clap's default_value_t renders the default through Display.
impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Shape::House => "house",
            Shape::Wall => "wall",
            Shape::Platform => "platform",
        };
        f.write_str(name)
    }
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Build {
            shape,
            width,
            depth,
            height,
            at,
            force,
            json,
            checkpoint_dir,
            config,
        } => {
            let anchor = parse_pos(&at)?;
            let blueprint = match shape {
                Shape::House => generators::house(anchor, width, depth, height),
                Shape::Wall => generators::wall(anchor, width, height),
                Shape::Platform => generators::platform(anchor, width, depth),
            };
            let config = load_config(config.as_deref())?;
            let mut world = seed_world(&blueprint)?;
            let manager = BuildManager::new(config, CheckpointStore::new(&checkpoint_dir));
            let clock = SystemClock::new();
            let report = manager.build(&mut world, &clock, blueprint, force, &StopHandle::new())?;
            print_report(&report, json)?;
        }
        Command::List { checkpoint_dir } => {
            let manager =
                BuildManager::new(GantryConfig::default(), CheckpointStore::new(&checkpoint_dir));
            let sessions = manager.list_sessions()?;
            if sessions.is_empty() {
                println!("no sessions in {}", checkpoint_dir.display());
            }
            for s in sessions {
                println!(
                    "{}  checkpoints: {:>3}  last phase: {:<18}  updated: {}",
                    s.session_id, s.checkpoints, s.last_phase.to_string(), s.updated_at
                );
            }
        }
        Command::Resume {
            session_id,
            json,
            checkpoint_dir,
            config,
        } => {
            let id = SessionId::from_string(session_id);
            let store = CheckpointStore::new(&checkpoint_dir);
            // Rebuild the dry-run world around the checkpointed blueprint.
            let session = BuildSession::load(&store, &id)?;
            let mut world = seed_world(&session.blueprint)?;
            let config = load_config(config.as_deref())?;
            let manager = BuildManager::new(config, store);
            let clock = SystemClock::new();
            let report = manager.resume(&mut world, &clock, &id, &StopHandle::new())?;
            print_report(&report, json)?;
        }
    }
    Ok(())
}

/// Parse an "x,y,z" coordinate triple.
fn parse_pos(s: &str) -> Result<BlockPos> {
    let parts: Vec<i32> = s
        .split(',')
        .map(|p| p.trim().parse::<i32>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("invalid coordinate triple '{s}'"))?;
    if parts.len() != 3 {
        bail!("expected x,y,z but got '{s}'");
    }
    Ok(BlockPos::new(parts[0], parts[1], parts[2]))
}

fn load_config(path: Option<&Path>) -> Result<GantryConfig> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            GantryConfig::from_json(&text)
                .with_context(|| format!("parsing config {}", path.display()))
        }
        None => {
            // The in-memory world has no eventual-consistency window and
            // nothing to wait out, so dry runs skip the live-world delays.
            Ok(GantryConfig {
                verifier: VerifierConfig {
                    settle_delay_ms: 0,
                    ..VerifierConfig::default()
                },
                manager: ManagerConfig {
                    phase_failure_backoff_ms: 250,
                    ..ManagerConfig::default()
                },
                ..GantryConfig::default()
            })
        }
    }
}

/// Seed an in-memory world around the blueprint: grass ground one layer
/// below the foundation, a stocked inventory with headroom, a full tool
/// kit, and the agent standing next to the site.
fn seed_world(blueprint: &Blueprint) -> Result<GridWorld> {
    let Some(bbox) = blueprint.bounding_box() else {
        bail!("blueprint has no blocks");
    };
    tracing::debug!(
        blocks = blueprint.blocks.len(),
        building_type = %blueprint.building_type,
        "seeding dry-run world"
    );
    let mut world = GridWorld::around(bbox.min, bbox.max, 8);
    world.fill_layer(bbox.min.y - 1, BlockKind::GrassBlock);
    for (kind, count) in blueprint.material_bill() {
        world.stock(kind, count + 64);
    }
    world.stock_item("stone_pickaxe", 1);
    world.stock_item("iron_axe", 1);
    world.stock_item("shovel", 1);
    world.set_agent_position(BlockPos::new(bbox.min.x - 2, bbox.min.y, bbox.min.z - 2));
    Ok(world)
}

fn print_report(report: &BuildReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("session {}", report.session_id);
    for event in &report.events {
        println!("  [{:>7}ms] {}", event.at_ms, event.kind);
    }
    println!("final phase: {}", report.final_phase);
    println!(
        "blocks: {}/{} placed, {} failed",
        report.progress.placed_blocks,
        report.progress.total_blocks,
        report.progress.failed_blocks.len()
    );
    if let Some(structure) = &report.structure {
        println!(
            "structure: {:.1}% accurate ({} correct, {} missing, {} wrong)",
            structure.accuracy,
            structure.correct_blocks,
            structure.missing_blocks.len(),
            structure.wrong_blocks.len()
        );
    }
    if let Some(functionality) = &report.functionality {
        let verdict = if functionality.functional { "passed" } else { "FAILED" };
        println!("functionality: {verdict}");
        for test in &functionality.tests {
            match &test.issue {
                Some(issue) => println!("  {}: {}", test.name, issue),
                None => println!("  {}: ok", test.name),
            }
        }
    }
    for action in &report.repair_actions {
        println!("repair: {action}");
    }
    println!(
        "guardian: {} warning(s), {} failure(s)",
        report.warnings.len(),
        report.failures.len()
    );
    if report.stopped_early {
        println!("build stopped before completion; resume with `gantry resume {}`", report.session_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pos_accepts_triples() {
        assert_eq!(parse_pos("1,2,3").unwrap(), BlockPos::new(1, 2, 3));
        assert_eq!(parse_pos(" -4, 0, 7 ").unwrap(), BlockPos::new(-4, 0, 7));
        assert!(parse_pos("1,2").is_err());
        assert!(parse_pos("a,b,c").is_err());
    }

    #[test]
    fn seeded_world_supports_the_blueprint() {
        let blueprint = generators::house(BlockPos::new(10, 1, 10), 5, 5, 3);
        let world = seed_world(&blueprint).unwrap();
        // Ground exists directly under every foundation block.
        for spec in &blueprint.blocks {
            if spec.pos.y == 1 {
                assert_eq!(
                    world.cell(spec.pos.offset(0, -1, 0)),
                    Some(BlockKind::GrassBlock)
                );
            }
        }
    }
}
