use glam::DVec2;

use super::line::{Uid, Wall};
use super::obstacle::Obstacle;
use super::polygon;

/// Subroom variant. Stairs carry reference points for their upper and lower
/// ends; escalators additionally carry a belt speed and a direction flag.
#[derive(Debug, Clone, PartialEq)]
pub enum SubRoomKind {
    Normal,
    Stair {
        up: DVec2,
        down: DVec2,
    },
    Escalator {
        up: DVec2,
        down: DVec2,
        speed: f64,
        upward: bool,
    },
}

/// A single planar region bounded by walls; the smallest containment unit.
///
/// All points of a subroom share the plane `z = A·x + B·y + C`.
#[derive(Debug, Clone)]
pub struct SubRoom {
    pub id: i32,
    pub polygon: Vec<DVec2>,
    pub walls: Vec<Wall>,
    pub obstacles: Vec<Obstacle>,
    /// UIDs of the crossings and transitions on this subroom's boundary.
    pub door_uids: Vec<Uid>,
    /// Plane coefficients `[A, B, C]`.
    pub plane: [f64; 3],
    pub kind: SubRoomKind,
    /// A point strictly inside the subroom, derived from a bounding door.
    /// Set by `Building::init_geometry`.
    pub inside_point: Option<DVec2>,
}

impl SubRoom {
    /// Containment: inside the boundary polygon, outside every obstacle.
    pub fn contains(&self, p: DVec2) -> bool {
        polygon::point_in_polygon(&self.polygon, p) && !self.obstacles.iter().any(|o| o.contains(p))
    }

    pub fn elevation(&self, p: DVec2) -> f64 {
        self.plane[0] * p.x + self.plane[1] * p.y + self.plane[2]
    }

    /// Walkable area: polygon area minus obstacle areas.
    pub fn area(&self) -> f64 {
        let gross = polygon::signed_area(&self.polygon).abs();
        let holes: f64 = self.obstacles.iter().map(Obstacle::area).sum();
        (gross - holes).max(0.0)
    }

    pub fn centroid(&self) -> DVec2 {
        polygon::centroid(&self.polygon)
    }

    pub fn bounding_box(&self) -> (DVec2, DVec2) {
        polygon::bounding_box(&self.polygon)
    }

    /// Walls of the subroom and of all its obstacles.
    pub fn all_walls(&self) -> impl Iterator<Item = &Wall> {
        self.walls
            .iter()
            .chain(self.obstacles.iter().flat_map(|o| o.walls().iter()))
    }
}

/// Ordered set of subrooms sharing a caption and elevation hint.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: i32,
    pub caption: String,
    pub zpos: f64,
    pub subrooms: Vec<SubRoom>,
}

impl Room {
    pub fn subroom_containing(&self, p: DVec2) -> Option<usize> {
        self.subrooms.iter().position(|s| s.contains(p))
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec2;

    use super::*;

    fn square_subroom() -> SubRoom {
        SubRoom {
            id: 0,
            polygon: vec![
                dvec2(0.0, 0.0),
                dvec2(4.0, 0.0),
                dvec2(4.0, 4.0),
                dvec2(0.0, 4.0),
            ],
            walls: vec![],
            obstacles: vec![],
            door_uids: vec![],
            plane: [0.0, 0.0, 1.5],
            kind: SubRoomKind::Normal,
            inside_point: None,
        }
    }

    #[test]
    fn containment_and_elevation() {
        let sub = square_subroom();
        assert!(sub.contains(dvec2(2.0, 2.0)));
        assert!(!sub.contains(dvec2(5.0, 2.0)));
        assert_eq!(sub.elevation(dvec2(1.0, 1.0)), 1.5);
    }

    #[test]
    fn obstacle_subtracts_from_area() {
        let mut uids = crate::geometry::UidAllocator::new();
        let mut sub = square_subroom();
        assert_eq!(sub.area(), 16.0);
        sub.obstacles.push(Obstacle::new(
            0,
            String::new(),
            vec![
                dvec2(1.0, 1.0),
                dvec2(2.0, 1.0),
                dvec2(2.0, 2.0),
                dvec2(1.0, 2.0),
            ],
            &mut uids,
        ));
        assert_eq!(sub.area(), 15.0);
        assert!(!sub.contains(dvec2(1.5, 1.5)));
    }
}
