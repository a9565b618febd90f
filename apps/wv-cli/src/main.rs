use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wv_core::timing;
use wv_sim::{
    Force, GeneratorBounds, ModeExcitation, Scheduler, Simulation, StopReason,
    WaveParams, WaveState, mode_generator, pluck_force, pluck_generator,
};

mod config;
mod error;

use error::{CliError, CliResult};

#[derive(Parser)]
#[command(name = "wv-cli")]
#[command(about = "WaveString CLI - damped, forced vibrating string simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the default parameter set
    Params {
        #[arg(long, value_enum, default_value_t = Format::Yaml)]
        format: Format,
    },
    /// Step the string as fast as possible for a fixed number of ticks
    Simulate {
        #[command(flatten)]
        setup: Setup,
        /// Number of ticks to run
        #[arg(long, default_value_t = 1_000)]
        ticks: u64,
        /// Print a report line every N ticks
        #[arg(long, default_value_t = 100)]
        report_every: u64,
        /// Write the final state as JSON
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Run the string in real time on the fixed-cadence scheduler
    Live {
        #[command(flatten)]
        setup: Setup,
        /// Wall-clock run time in seconds
        #[arg(long, default_value_t = 2.0)]
        seconds: f64,
        /// How long a pluck is held before release, in milliseconds
        #[arg(long, default_value_t = 100)]
        hold_ms: u64,
    },
}

#[derive(Args)]
struct Setup {
    /// Parameter YAML file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Pluck position along the string (0..1)
    #[arg(long)]
    pluck: Option<f64>,
    /// Pluck height
    #[arg(long, default_value_t = 200.0)]
    amplitude: f64,
    /// Drive this standing-wave mode (1 = fundamental)
    #[arg(long)]
    mode: Option<usize>,
    /// Drive frequency in Hz (defaults to the mode's harmonic)
    #[arg(long)]
    frequency: Option<f64>,
    /// Exponential decay rate of the mode drive (1/s)
    #[arg(long, default_value_t = 0.0)]
    decay: f64,
    /// Start from rest instead of the default displacement
    #[arg(long)]
    at_rest: bool,
    /// Print timing statistics at the end
    #[arg(long)]
    timing: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Yaml,
    Json,
}

#[derive(Serialize)]
struct Snapshot<'a> {
    step: u64,
    energy: f64,
    mechanical_energy: f64,
    stop_reason: Option<String>,
    state: &'a [f64],
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Params { format } => cmd_params(format),
        Commands::Simulate {
            setup,
            ticks,
            report_every,
            snapshot,
        } => cmd_simulate(&setup, ticks, report_every, snapshot.as_deref()),
        Commands::Live {
            setup,
            seconds,
            hold_ms,
        } => cmd_live(&setup, seconds, Duration::from_millis(hold_ms)),
    }
}

fn cmd_params(format: Format) -> CliResult<()> {
    let params = WaveParams::default();
    match format {
        Format::Yaml => print!("{}", serde_yaml::to_string(&params)?),
        Format::Json => println!("{}", serde_json::to_string_pretty(&params)?),
    }
    Ok(())
}

fn build_simulation(setup: &Setup) -> CliResult<Simulation> {
    if setup.timing {
        timing::enable_timing();
    }
    let params = config::load_params(setup.config.as_deref())?;
    let engine = if setup.at_rest {
        let zeros = vec![0.0; params.n];
        WaveState::with_initial_conditions(params, &zeros, &zeros)?
    } else {
        WaveState::new(params)?
    };

    let p = engine.params();
    println!(
        "N={} dx={:.4} r2={:.6} nf={:.3}Hz wave_speed={:.3}m/s",
        p.n,
        engine.dx(),
        engine.r2(),
        engine.natural_frequency(),
        p.wave_speed().get::<uom::si::velocity::meter_per_second>()
    );
    Ok(Simulation::from_engine(engine))
}

fn mode_excitation(setup: &Setup, engine: &WaveState) -> CliResult<Option<ModeExcitation>> {
    let Some(mode) = setup.mode else {
        return Ok(None);
    };
    if mode == 0 {
        return Err(CliError::InvalidArg {
            what: "mode must be at least 1",
        });
    }
    Ok(Some(ModeExcitation {
        mode,
        frequency: setup
            .frequency
            .unwrap_or(mode as f64 * engine.params().string_frequency()),
        amplitude: setup.amplitude,
        decay: setup.decay,
    }))
}

fn cmd_simulate(
    setup: &Setup,
    ticks: u64,
    report_every: u64,
    snapshot: Option<&Path>,
) -> CliResult<()> {
    let mut sim = build_simulation(setup)?;
    let n = sim.engine().n();

    if let Some(position) = setup.pluck {
        sim.apply_force("pluck", Some(pluck_force(n, setup.amplitude, position)))?;
    }
    if let Some(excitation) = mode_excitation(setup, sim.engine())? {
        let generator = mode_generator(
            n,
            sim.engine().params().dt,
            excitation,
            GeneratorBounds::default(),
        );
        sim.apply_force("mode", Some(Force::generator(generator)))?;
    }

    let report_every = report_every.max(1);
    for _ in 0..ticks {
        let report = sim.tick()?;
        if report.step.step % report_every == 0 || report.step.quiescent {
            println!(
                "step {:>7}  energy {:>14.6e}  mechanical {:>14.6e}",
                report.step.step,
                report.step.energy,
                sim.engine().mechanical_energy()
            );
        }
        if report.step.quiescent {
            println!("String at rest after {} steps", report.step.step);
            break;
        }
    }

    if let Some(path) = snapshot {
        write_snapshot(&sim, path)?;
    }
    sim.stats().print_summary();
    Ok(())
}

fn cmd_live(setup: &Setup, seconds: f64, hold: Duration) -> CliResult<()> {
    let run_for = Duration::try_from_secs_f64(seconds).map_err(|_| CliError::InvalidArg {
        what: "seconds must be a non-negative finite number",
    })?;
    let sim = build_simulation(setup)?;
    let n = sim.engine().n();
    let dt = sim.engine().params().dt;
    let excitation = mode_excitation(setup, sim.engine())?;
    let mut scheduler = Scheduler::new(sim);

    scheduler.run(Some(Box::new(|state: &[f64], engine: &WaveState| {
        if engine.steps() % 250 == 0 {
            let peak = state.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
            info!(step = engine.steps(), energy = engine.energy(), peak, "tick");
        }
    })))?;

    if let Some(position) = setup.pluck {
        let generator = pluck_generator(n, setup.amplitude, position, hold);
        scheduler.apply_force("pluck", Some(Force::generator(generator)))?;
    }
    if let Some(excitation) = excitation {
        let generator = mode_generator(n, dt, excitation, GeneratorBounds::default());
        scheduler.apply_force("mode", Some(Force::generator(generator)))?;
    }

    std::thread::sleep(run_for);
    scheduler.stop()?;

    let (reason, steps) =
        scheduler.with_simulation(|sim| (sim.stop_reason(), sim.engine().steps()))?;
    match reason {
        Some(StopReason::Quiescent) => println!("String came to rest after {steps} steps"),
        _ => println!("Stopped after {steps} steps"),
    }
    scheduler.with_simulation(|sim| sim.stats().print_summary())?;
    Ok(())
}

fn write_snapshot(sim: &Simulation, path: &Path) -> CliResult<()> {
    let engine = sim.engine();
    let snapshot = Snapshot {
        step: engine.steps(),
        energy: engine.energy(),
        mechanical_energy: engine.mechanical_energy(),
        stop_reason: sim.stop_reason().map(|r| format!("{r:?}")),
        state: engine.state(),
    };
    fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
    println!("Snapshot written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode_setup(mode: usize) -> Setup {
        Setup {
            config: None,
            pluck: None,
            amplitude: 1.0,
            mode: Some(mode),
            frequency: None,
            decay: 0.0,
            at_rest: true,
            timing: false,
        }
    }

    #[test]
    fn default_drive_frequency_ignores_speed_up() {
        let params = WaveParams {
            t0: 12.0,
            rho: 3.0,
            length: 0.5,
            speed_up: 4.0,
            ..WaveParams::default()
        };
        let engine = WaveState::new(params).unwrap();
        let excitation = mode_excitation(&mode_setup(3), &engine).unwrap().unwrap();
        // 3 * sqrt(12/3) / (2 * 0.5)
        assert!((excitation.frequency - 6.0).abs() < 1e-12);
    }

    #[test]
    fn mode_zero_is_rejected() {
        let engine = WaveState::new(WaveParams::default()).unwrap();
        assert!(matches!(
            mode_excitation(&mode_setup(0), &engine),
            Err(CliError::InvalidArg { .. })
        ));
    }
}
