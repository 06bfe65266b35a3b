use glam::DVec2;

use crate::direction::DirectionManager;
use crate::geometry::{bounding_box, Building};
use crate::pedestrian::Pedestrian;

/// Where an agent steers while it is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitingStrategy {
    /// Middle of the waiting area (or of the subroom outside one).
    Middle,
    /// Uniformly random point inside the waiting area or subroom,
    /// rejection-sampled in the bounding box with the agent's own RNG.
    Random,
    /// Keep following the floor field toward the destination door.
    Floorfield,
}

impl WaitingStrategy {
    pub fn waiting_position(
        &self,
        building: &Building,
        direction: &DirectionManager,
        ped: &mut Pedestrian,
    ) -> DVec2 {
        // the waiting area's polygon while inside one, else the subroom
        let goal_polygon = ped
            .final_goal
            .and_then(|id| building.goal(id))
            .filter(|g| g.is_waiting_area() && g.contains(ped.pos))
            .map(|g| g.polygon().to_vec());

        match self {
            WaitingStrategy::Middle => match &goal_polygon {
                Some(polygon) => crate::geometry::centroid(polygon),
                None => building.subroom(ped.room, ped.subroom).centroid(),
            },
            WaitingStrategy::Random => {
                let contains = |p: DVec2| match &goal_polygon {
                    Some(polygon) => crate::geometry::point_in_polygon(polygon, p),
                    None => building.subroom(ped.room, ped.subroom).contains(p),
                };
                let (min, max) = match &goal_polygon {
                    Some(polygon) => bounding_box(polygon),
                    None => building.subroom(ped.room, ped.subroom).bounding_box(),
                };
                for _ in 0..64 {
                    let p = DVec2::new(
                        min.x + ped.rng.f64() * (max.x - min.x),
                        min.y + ped.rng.f64() * (max.y - min.y),
                    );
                    if contains(p) {
                        return p;
                    }
                }
                ped.pos
            }
            WaitingStrategy::Floorfield => match ped.destination {
                Some(uid) => {
                    let dir = direction.direction_to_target(ped.room, uid, ped.pos);
                    ped.pos + dir
                }
                None => ped.pos,
            },
        }
    }
}
