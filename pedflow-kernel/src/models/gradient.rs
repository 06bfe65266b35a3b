use glam::DVec2;

use crate::error::SimResult;
use crate::geometry::Building;
use crate::pedestrian::Pedestrian;

use super::{ModelContext, OperationalModel, PedestrianUpdate};

/// Cosine of phi (2*phi is the effective angle of sight of pedestrians).
const COS_PHI: f64 = -0.17364817766693036;

/// Repulsion strength and falloff between agents.
const PED_A: f64 = 2.1;
const PED_B: f64 = 0.3;
/// Repulsion strength and falloff from walls.
const WALL_A: f64 = 10.0;
const WALL_B: f64 = 0.2;

/// Default operational model: relaxation toward the desired direction plus
/// exponential repulsion from neighbors and walls.
#[derive(Debug)]
pub struct GradientModel {
    interaction_range: f64,
}

impl GradientModel {
    pub fn new() -> Self {
        GradientModel {
            interaction_range: 4.0,
        }
    }
}

impl Default for GradientModel {
    fn default() -> Self {
        GradientModel::new()
    }
}

impl OperationalModel for GradientModel {
    fn init(&mut self, _building: &Building) -> SimResult<()> {
        Ok(())
    }

    fn compute_new_position(
        &self,
        dt: f64,
        agent: &Pedestrian,
        ctx: &ModelContext,
    ) -> PedestrianUpdate {
        let pos = agent.pos;
        let vel = agent.vel;
        let e = agent.desired_dir;
        let kind = &ctx.building.subroom(agent.room, agent.subroom).kind;
        let v0 = agent.desired_speed(kind);

        // driving term
        let mut acc = (e * v0 - vel) / agent.tau;

        // repulsion from neighbors within the interaction range
        for i in ctx.grid.neighbors(pos, self.interaction_range) {
            let other = &ctx.agents[i as usize];
            if other.id == agent.id {
                continue;
            }
            let difference = pos - other.pos;
            let distance_squared = difference.length_squared();
            if distance_squared > self.interaction_range * self.interaction_range
                || distance_squared < 1e-12
            {
                continue;
            }

            let distance = distance_squared.sqrt();
            let direction = difference / distance;
            let touch = agent.ellipse.b_max + other.ellipse.b_max;
            let mut force = PED_A / PED_B * ((touch - distance) / PED_B).exp() * direction;

            // effects outside the field of view count half
            if e.dot(-force) < force.length() * COS_PHI {
                force *= 0.5;
            }
            acc += force;
        }

        // repulsion from walls via the room's distance map
        let wall_distance = ctx.direction.distance_to_wall(agent.room, pos);
        if wall_distance.is_finite() {
            let away = -ctx.direction.direction_to_wall(agent.room, pos);
            acc += WALL_A * WALL_B * (-wall_distance / WALL_B).exp() * away;
        }

        let vel_prev = vel;
        let mut new_vel = vel + acc * dt;
        new_vel = new_vel.clamp_length_max(v0 * 1.3);
        let new_pos = pos + (new_vel + vel_prev) * 0.5 * dt;

        PedestrianUpdate {
            position: new_pos,
            velocity: new_vel,
        }
    }

    fn max_interaction_range(&self) -> f64 {
        self.interaction_range
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec2;

    use crate::direction::{DirectionManager, DirectionStrategy};
    use crate::field::SpeedMode;
    use crate::geometry::{Room, SubRoom, SubRoomKind};
    use crate::neighbor_grid::NeighborGrid;
    use crate::pedestrian::AgentParameters;

    use super::*;

    fn open_building() -> Building {
        let mut building = Building::new();
        building.add_room(Room {
            id: 0,
            caption: String::new(),
            zpos: 0.0,
            subrooms: vec![SubRoom {
                id: 0,
                polygon: vec![
                    dvec2(0.0, 0.0),
                    dvec2(20.0, 0.0),
                    dvec2(20.0, 20.0),
                    dvec2(0.0, 20.0),
                ],
                walls: vec![],
                obstacles: vec![],
                door_uids: vec![],
                plane: [0.0; 3],
                kind: SubRoomKind::Normal,
                inside_point: Some(dvec2(1.0, 1.0)),
            }],
        });
        building
    }

    fn context<'a>(
        building: &'a Building,
        grid: &'a NeighborGrid,
        agents: &'a [Pedestrian],
        direction: &'a DirectionManager,
    ) -> ModelContext<'a> {
        ModelContext {
            building,
            grid,
            agents,
            direction,
            periodic: false,
        }
    }

    #[test]
    fn free_agent_accelerates_toward_desired_direction() {
        let building = open_building();
        let direction =
            DirectionManager::new(DirectionStrategy::MiddlePoint, 0.25, SpeedMode::Homogeneous, 0.8);
        let mut grid = NeighborGrid::new(dvec2(0.0, 0.0), dvec2(20.0, 20.0), 4.0);

        let mut ped = Pedestrian::new(0, dvec2(5.0, 5.0), &AgentParameters::default(), 3);
        ped.desired_dir = dvec2(1.0, 0.0);
        let agents = vec![ped];
        grid.update(agents.iter().map(|p| p.pos));

        let model = GradientModel::new();
        let ctx = context(&building, &grid, &agents, &direction);
        let update = model.compute_new_position(0.1, &agents[0], &ctx);

        assert!(update.is_finite());
        assert!(update.velocity.x > 0.0);
        assert!(update.position.x > 5.0);
        assert!(update.velocity.length() <= agents[0].v0 * 1.3 + 1e-9);
    }

    #[test]
    fn close_neighbor_pushes_away() {
        let building = open_building();
        let direction =
            DirectionManager::new(DirectionStrategy::MiddlePoint, 0.25, SpeedMode::Homogeneous, 0.8);
        let mut grid = NeighborGrid::new(dvec2(0.0, 0.0), dvec2(20.0, 20.0), 4.0);

        let mut a = Pedestrian::new(0, dvec2(5.0, 5.0), &AgentParameters::default(), 3);
        a.desired_dir = dvec2(0.0, 0.0);
        let b = Pedestrian::new(1, dvec2(5.4, 5.0), &AgentParameters::default(), 3);
        let agents = vec![a, b];
        grid.update(agents.iter().map(|p| p.pos));

        let model = GradientModel::new();
        let ctx = context(&building, &grid, &agents, &direction);
        let update = model.compute_new_position(0.1, &agents[0], &ctx);

        // pushed in -x, away from the neighbor at +x
        assert!(update.velocity.x < 0.0);
    }
}
