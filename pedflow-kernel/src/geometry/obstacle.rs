use glam::DVec2;

use super::line::{UidAllocator, Wall, WallType};
use super::polygon;

/// Closed polygonal region inside a subroom that agents must not cross.
#[derive(Debug, Clone)]
pub struct Obstacle {
    pub id: i32,
    pub caption: String,
    polygon: Vec<DVec2>,
    walls: Vec<Wall>,
}

impl Obstacle {
    pub fn new(id: i32, caption: String, polygon: Vec<DVec2>, uids: &mut UidAllocator) -> Self {
        let walls = polygon
            .iter()
            .zip(polygon.iter().cycle().skip(1))
            .map(|(a, b)| Wall::new(*a, *b, WallType::Wall, uids))
            .collect();
        Obstacle {
            id,
            caption,
            polygon,
            walls,
        }
    }

    pub fn polygon(&self) -> &[DVec2] {
        &self.polygon
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    pub fn contains(&self, p: DVec2) -> bool {
        polygon::point_in_polygon(&self.polygon, p)
    }

    pub fn area(&self) -> f64 {
        polygon::signed_area(&self.polygon).abs()
    }
}
