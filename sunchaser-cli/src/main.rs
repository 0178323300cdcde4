//! Headless race runner: load a car, a route snapshot, and a strategy,
//! then tick the simulation to completion and report the result.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use sunchaser_sim::{CarConfig, Command, RaceEnv, Route, Strategy, StrategyConfig, TelemetryLog};

#[derive(Debug, Parser)]
#[command(name = "sunchaser", version)]
#[command(about = "Headless solar car race runner")]
struct Args {
    /// Car profile JSON
    #[arg(long)]
    car: PathBuf,

    /// Route snapshot JSON, weather attached
    #[arg(long)]
    route: PathBuf,

    /// Strategy config JSON; defaults to a lazy 30 mph cruise
    #[arg(long)]
    strategy: Option<PathBuf>,

    /// Replay the commands of a previous telemetry log instead of
    /// consulting a strategy
    #[arg(long, conflicts_with = "strategy")]
    replay: Option<PathBuf>,

    /// Attempt every loop the route offers
    #[arg(long)]
    try_loops: bool,

    /// Tick length in seconds
    #[arg(long, default_value_t = 5.0)]
    tick: f64,

    /// Abort the run after this many ticks
    #[arg(long, default_value_t = 1_000_000)]
    max_ticks: usize,

    /// Write the run's telemetry log to this path
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Where each tick's command comes from.
enum Driver {
    Strategy { strategy: Strategy, try_loops: bool },
    Replay { commands: Vec<Command>, cursor: usize },
}

impl Driver {
    fn next_command(&mut self, env: &RaceEnv) -> Option<Command> {
        match self {
            Self::Strategy {
                strategy,
                try_loops,
            } => {
                let ctx = env.speed_context();
                let mut cmd = Command::full_speed(env.car());
                cmd.target_mph = strategy.get_speed(&ctx);
                cmd.try_loop = *try_loops;
                Some(cmd)
            }
            Self::Replay { commands, cursor } => {
                let cmd = commands.get(*cursor).copied()?;
                *cursor += 1;
                Some(cmd)
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let car = load_car(&args.car)?;
    let route = load_route(&args.route)?;
    let mut env = RaceEnv::new(car, route)?.with_tick(args.tick)?;
    let mut driver = build_driver(&args, env.car())?;

    info!(
        "starting {} over {} legs ({:.1} miles)",
        env.car().name,
        env.route().len(),
        sunchaser_sim::units::meters_to_miles(env.route().total_length())
    );

    let mut finished = false;
    for _ in 0..args.max_ticks {
        let Some(cmd) = driver.next_command(&env) else {
            break;
        };
        if env.step(Some(cmd))? {
            finished = true;
            break;
        }
    }

    let state = env.state().clone();
    let log = env.into_telemetry();

    println!(
        "Race {} at {}",
        if finished { "finished" } else { "aborted" },
        state.time
    );
    println!("  miles earned  : {:.1}", state.miles_earned);
    println!("  legs completed: {}", state.legs_completed.join(", "));
    println!("  battery left  : {:.0} Wh", state.energy / 3_600.0);
    println!(
        "  average speed : {:.1} mph (sd {:.1})",
        log.average_mph(),
        log.stddev_mph()
    );

    if let Some(path) = &args.output {
        fs::write(path, log.to_json()?)
            .with_context(|| format!("writing telemetry to {}", path.display()))?;
        println!("  telemetry     : {}", path.display());
    }

    if !finished {
        std::process::exit(1);
    }
    Ok(())
}

fn build_driver(args: &Args, car: &CarConfig) -> Result<Driver> {
    if let Some(path) = &args.replay {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading telemetry log {}", path.display()))?;
        let log = TelemetryLog::from_json(&text)
            .with_context(|| format!("parsing telemetry log {}", path.display()))?;
        return Ok(Driver::Replay {
            commands: log.commands(),
            cursor: 0,
        });
    }
    let config = match &args.strategy {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading strategy config {}", path.display()))?;
            StrategyConfig::from_json(&text)?
        }
        None => StrategyConfig::Lazy {
            target_mph: 30.0_f64.clamp(car.min_mph, car.max_mph),
        },
    };
    Ok(Driver::Strategy {
        strategy: Strategy::from_config(config),
        try_loops: args.try_loops,
    })
}

fn load_car(path: &Path) -> Result<CarConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading car profile {}", path.display()))?;
    Ok(CarConfig::from_json(&text)?)
}

fn load_route(path: &Path) -> Result<Route> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading route snapshot {}", path.display()))?;
    Ok(Route::from_json(&text)?)
}
