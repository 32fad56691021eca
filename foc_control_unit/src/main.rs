//! # FOC Simulator
//!
//! Runs the control core against a simulated PMSM. The controller is ticked
//! by a [`CycleRunner`] on its own thread while the main thread plays the
//! configured scenario through the facade: optional hardware test and motor
//! identification, then a periodically renewed setpoint, status printouts
//! and plot lines.
//!
//! The scenario clock is the controller's own clock, so `free_running`
//! pacing runs the same scenario faster than wall time.

use clap::Parser;
use foc_common::config::{ConfigLoader, LogLevel};
use foc_common::state::State;
use foc_control_unit::config::SimAppConfig;
use foc_control_unit::cycle::{CycleRunner, CycleStats, rt_setup};
use foc_control_unit::facade::{ControllerHandle, init};
use foc_control_unit::sim::SimulatedPowerStage;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// FOC simulator: sensorless control core against a simulated motor
#[derive(Parser, Debug)]
#[command(name = "foc_sim")]
#[command(version)]
#[command(about = "Run the sensorless FOC control core against a simulated motor")]
struct Args {
    /// Path to the simulator configuration TOML.
    #[arg(default_value = "config/foc_sim.toml")]
    config: PathBuf,

    /// Override the scenario duration [s].
    #[arg(long)]
    duration: Option<f64>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let loaded = SimAppConfig::load_validated(&args.config);
    let level = match &loaded {
        Ok(config) => config.shared.log_level,
        Err(_) => LogLevel::Info,
    };
    setup_tracing(&args, level);

    info!("FOC simulator v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = loaded
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|config| run(&args, config));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("FOC simulator shutdown complete");
}

fn run(args: &Args, mut config: SimAppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(duration) = args.duration {
        config.scenario.duration = duration;
    }
    info!(
        service = %config.shared.service_name,
        rate_hz = config.cycle.rate_hz,
        pacing = ?config.cycle.pacing,
        "config OK"
    );

    let stage = SimulatedPowerStage::new(&config.motor);
    let (mut controller, handle) = init(config.parameters, stage)?;
    let mut runner = CycleRunner::from_config(&config.cycle)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let cycle_running = running.clone();
    let cpu_core = config.cycle.cpu_core;
    let rt_priority = config.cycle.rt_priority;
    let cycle = thread::Builder::new()
        .name("foc-cycle".to_string())
        .spawn(move || {
            rt_setup(cpu_core, rt_priority)?;
            runner.run(&cycle_running, |dt| {
                controller.power_stage_mut().advance(dt);
                controller.tick(dt);
            })
        })?;

    play_scenario(&config, &handle, &running);

    handle.stop();
    wait_ticks(&handle, 2, &running);
    running.store(false, Ordering::SeqCst);

    let stats: CycleStats = cycle
        .join()
        .map_err(|_| "cycle thread panicked".to_string())??;
    info!(
        cycles = stats.cycle_count,
        avg_cycle_ns = stats.avg_cycle_ns(),
        max_cycle_ns = stats.max_cycle_ns,
        stddev_cycle_ns = stats.stddev_cycle_ns() as i64,
        overruns = stats.overruns,
        "cycle statistics"
    );
    handle.print_status_info()?;
    Ok(())
}

fn play_scenario(config: &SimAppConfig, handle: &ControllerHandle, running: &AtomicBool) {
    let scenario = &config.scenario;

    if scenario.hardware_test {
        match handle.begin_hardware_test() {
            Ok(()) => {
                wait_while(handle, running, State::HardwareTesting);
                if let Some(report) = handle.hardware_test_report() {
                    info!(passed = report.passed(), "hardware test finished");
                }
            }
            Err(e) => warn!(error = %e, "hardware test not started"),
        }
    }

    if let Some(mode) = scenario.identification {
        match handle.begin_motor_identification(mode) {
            Ok(()) => {
                wait_while(handle, running, State::MotorIdentification);
                let m = handle.motor_parameters();
                info!(
                    resistance = m.resistance,
                    inductance = m.inductance_d,
                    field_flux = m.field_flux,
                    "motor parameters after identification"
                );
            }
            Err(e) => warn!(error = %e, "identification not started"),
        }
    }

    if handle.state() == State::Fault {
        warn!(faults = ?handle.faults(), "controller faulted, skipping setpoint phase");
        return;
    }

    let start = handle.telemetry().time;
    let end = start + scenario.duration;
    let mut next_renew = start;
    let mut next_status = start;
    while running.load(Ordering::SeqCst) {
        let now = handle.telemetry().time;
        if now >= end {
            break;
        }
        if now >= next_renew {
            next_renew = now + scenario.renew_interval;
            if let Err(e) =
                handle.set_setpoint(scenario.control_mode, scenario.setpoint, scenario.setpoint_ttl)
            {
                warn!(error = %e, "setpoint rejected");
            }
            if scenario.plot {
                let _ = handle.plot_real_time_values();
            }
        }
        if scenario.status_interval > 0.0 && now >= next_status {
            next_status = now + scenario.status_interval;
            let _ = handle.print_status_info();
        }
        thread::sleep(Duration::from_micros(200));
    }
}

/// Block until the controller has left `state` after at least one tick.
fn wait_while(handle: &ControllerHandle, running: &AtomicBool, state: State) {
    let issued = handle.telemetry().tick_count;
    while running.load(Ordering::SeqCst) {
        let t = handle.telemetry();
        if t.tick_count > issued && t.state != state {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

fn wait_ticks(handle: &ControllerHandle, ticks: u64, running: &AtomicBool) {
    let target = handle.telemetry().tick_count + ticks;
    while running.load(Ordering::SeqCst) && handle.telemetry().tick_count < target {
        thread::sleep(Duration::from_micros(200));
    }
}

/// Setup tracing subscriber from CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(directive.parse().unwrap_or_else(|_| tracing::Level::INFO.into()));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
