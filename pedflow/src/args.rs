use std::path::PathBuf;

use pedflow_kernel::direction::DirectionStrategy;
use pedflow_kernel::waiting::WaitingStrategy;
use pedflow_kernel::SimulatorOptions;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum Strategy {
    MiddlePoint,
    MinSeparation,
    Bottleneck,
    Floorfield,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum Waiting {
    Middle,
    Random,
    Floorfield,
}

#[derive(Debug, clap::Parser)]
#[command(version, about = "Headless pedestrian dynamics simulation")]
pub struct Args {
    /// Path to scenario file
    pub scenario: PathBuf,
    /// Trajectory output file; omit to skip trajectory writing
    #[arg(short, long)]
    pub out: Option<PathBuf>,
    /// Max simulated time (seconds)
    #[arg(long)]
    pub t_max: Option<f64>,
    /// Simulation step length (seconds)
    #[arg(long)]
    pub dt: Option<f64>,
    /// Trajectory frames per simulated second
    #[arg(long)]
    pub fps: Option<f64>,
    /// RNG seed
    #[arg(short, long)]
    pub seed: Option<u64>,
    /// Walking-direction strategy
    #[arg(value_enum, long, default_value = "floorfield")]
    pub strategy: Strategy,
    /// Waiting strategy
    #[arg(value_enum, long, default_value = "middle")]
    pub waiting: Waiting,
    /// Restrict routing candidates to the agent's subroom
    #[arg(long)]
    pub within_subroom: bool,
    /// Slow agents down near walls
    #[arg(long)]
    pub wall_avoidance: bool,
    /// Grid spacing of the routing floor fields (meters)
    #[arg(long)]
    pub spacing: Option<f64>,
}

impl Args {
    pub fn to_simulator_options(&self) -> SimulatorOptions {
        let mut options = SimulatorOptions {
            strategy: match self.strategy {
                Strategy::MiddlePoint => DirectionStrategy::MiddlePoint,
                Strategy::MinSeparation => DirectionStrategy::MinSeparationShorterLine,
                Strategy::Bottleneck => DirectionStrategy::InRangeBottleneck,
                Strategy::Floorfield => DirectionStrategy::LocalFloorfield,
            },
            waiting_strategy: match self.waiting {
                Waiting::Middle => WaitingStrategy::Middle,
                Waiting::Random => WaitingStrategy::Random,
                Waiting::Floorfield => WaitingStrategy::Floorfield,
            },
            within_subroom: self.within_subroom,
            use_wall_avoidance: self.wall_avoidance,
            ..Default::default()
        };

        if let Some(t_max) = self.t_max {
            options.t_max = t_max;
        }
        if let Some(dt) = self.dt {
            options.dt = dt;
        }
        if let Some(fps) = self.fps {
            options.fps = fps;
        }
        if let Some(seed) = self.seed {
            options.seed = seed;
        }
        if let Some(spacing) = self.spacing {
            options.router_spacing = spacing;
            options.field_spacing = spacing;
        }

        options
    }
}
