use bhquad::{ScenarioConfig, Scenario};
use bhquad::{bench_forces, bench_step_curve};
#[cfg(feature = "vis")]
use bhquad::run_2d;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser, Debug)]
struct Args {
    /// Scenario file, looked up in `scenarios/` unless it exists as given
    #[arg(short, default_value = "galaxy.yaml")]
    file_name: String,

    /// Run this many steps without a window, then print a summary
    #[arg(long)]
    steps: Option<u64>,

    /// Run the benchmarks instead of a scenario
    #[arg(long)]
    bench: bool,

    #[arg(long)]
    verbose: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let direct = PathBuf::from(file_name);
    let config_path = if direct.is_file() {
        direct
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name)
    };

    let file = File::open(&config_path).with_context(|| format!("failed to open {}", config_path.display()))?;
    let reader = BufReader::new(file);
    let scenario_cfg: ScenarioConfig =
        serde_yaml::from_reader(reader).with_context(|| format!("failed to parse {}", config_path.display()))?;

    Ok(scenario_cfg)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)?;

    if args.bench {
        bench_forces()?;
        bench_step_curve()?;
        return Ok(());
    }

    let scenario_cfg = load_scenario_from_yaml(&args.file_name)?;
    let mut scenario = Scenario::build_scenario(scenario_cfg)
        .with_context(|| format!("invalid scenario {}", args.file_name))?;

    match args.steps {
        Some(steps) => {
            for _ in 0..steps {
                scenario.simulation.step();
            }
            let sim = &scenario.simulation;
            info!(
                "t = {:.3}: {} bodies, total mass {:.3e}, COM ({:.3}, {:.3}), {:?}",
                sim.time(),
                sim.live_count(),
                sim.total_mass(),
                sim.center_of_mass().x,
                sim.center_of_mass().y,
                sim.stats()
            );
        }
        None => show(scenario),
    }

    Ok(())
}

#[cfg(feature = "vis")]
fn show(scenario: Scenario) {
    run_2d(scenario);
}

// no viewer compiled in, run to the configured end time instead
#[cfg(not(feature = "vis"))]
fn show(mut scenario: Scenario) {
    scenario.simulation.run();
}
