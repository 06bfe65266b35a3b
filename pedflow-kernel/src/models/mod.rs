mod gradient;

use glam::DVec2;

use crate::direction::DirectionManager;
use crate::error::SimResult;
use crate::geometry::Building;
use crate::neighbor_grid::NeighborGrid;
use crate::pedestrian::Pedestrian;

pub use self::gradient::GradientModel;

/// Next-step kinematics for one agent.
#[derive(Debug, Clone, Copy)]
pub struct PedestrianUpdate {
    pub position: DVec2,
    pub velocity: DVec2,
}

impl PedestrianUpdate {
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }
}

/// Read-only state handed to the model during the compute phase.
///
/// The neighborhood index is current for this step and is not mutated
/// while `compute_new_position` runs, so per-agent calls may be issued in
/// parallel.
pub struct ModelContext<'a> {
    pub building: &'a Building,
    pub grid: &'a NeighborGrid,
    pub agents: &'a [Pedestrian],
    pub direction: &'a DirectionManager,
    pub periodic: bool,
}

/// Operational model plug point.
///
/// By the time `compute_new_position` is called, every agent has a valid
/// destination door and exit line, and its desired direction has been set
/// by the active direction strategy.
pub trait OperationalModel: Send + Sync {
    /// Called once after the geometry is final and doors are known.
    fn init(&mut self, building: &Building) -> SimResult<()>;

    fn compute_new_position(
        &self,
        dt: f64,
        agent: &Pedestrian,
        ctx: &ModelContext,
    ) -> PedestrianUpdate;

    fn apply_update(&self, update: &PedestrianUpdate, agent: &mut Pedestrian) {
        agent.pos = update.position;
        agent.vel = update.velocity;
    }

    /// Upper bound of the model's interaction range; the neighbor grid cell
    /// size must not be smaller.
    fn max_interaction_range(&self) -> f64 {
        4.0
    }
}
