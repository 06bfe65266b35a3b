mod args;

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use args::Args;
use clap::Parser;
use log::{info, warn};
use pedflow_kernel::scenario::Scenario;
use pedflow_kernel::Simulator;

fn main() {
    env_logger::builder()
        .filter_module("pedflow", log::LevelFilter::Info)
        .filter_module("pedflow_kernel", log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if cfg!(debug_assertions) {
        warn!("Debug build");
    }

    if let Err(e) = run() {
        eprintln!("pedflow: {e}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let options = args.to_simulator_options();

    let scenario: Scenario = toml::from_str(&fs::read_to_string(&args.scenario)?)?;
    info!("Loaded scenario file: {}", args.scenario.display());

    let mut simulator = Simulator::new(scenario, options)?;

    if let Some(out) = &args.out {
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = BufWriter::new(File::create(out)?);
        simulator.set_trajectory(Box::new(file))?;
        info!("Writing trajectories to {}", out.display());
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))?;
    }

    while !simulator.is_finished() {
        if interrupted.load(Ordering::SeqCst) {
            warn!("Interrupted at t={:.2}s", simulator.clock.elapsed_time());
            break;
        }
        simulator.step()?;
    }
    simulator.collect_door_statistics();
    simulator.print_statistics();

    export_diagnostics(&simulator)?;
    info!(
        "Finished: t={:.2}s, {} agents remaining",
        simulator.clock.elapsed_time(),
        simulator.get_pedestrian_count()
    );
    Ok(())
}

fn export_diagnostics(simulator: &Simulator) -> anyhow::Result<()> {
    let current_time = chrono::Local::now();
    fs::create_dir("logs").ok();
    let log_path: PathBuf = [
        "logs",
        &current_time.format("%Y-%m-%d_%H%M%S_log.json").to_string(),
    ]
    .iter()
    .collect();
    let mut log_file = File::create(&log_path)?;
    serde_json::to_writer(&mut log_file, &simulator.diagnostic_log)?;
    info!("Exported log file: {}", log_path.display());
    Ok(())
}
