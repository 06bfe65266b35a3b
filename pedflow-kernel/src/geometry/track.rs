use glam::DVec2;

use super::building::{RoomId, SubRoomId};
use super::line::Wall;

/// Ordered chain of wall segments along a platform edge.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: i32,
    pub room: RoomId,
    pub subroom: SubRoomId,
    pub walls: Vec<Wall>,
    /// Start point of the chain; train door offsets are measured from here.
    pub start: DVec2,
}

impl Track {
    /// Point at arc-length `s` along the wall chain, measured from `start`.
    ///
    /// Returns `None` if `s` exceeds the chain length.
    pub fn point_at(&self, s: f64) -> Option<DVec2> {
        let mut remaining = s;
        for wall in self.ordered_walls() {
            let len = wall.length();
            if remaining <= len {
                let dir = (wall.1 - wall.0) / len;
                return Some(wall.0 + dir * remaining);
            }
            remaining -= len;
        }
        None
    }

    pub fn length(&self) -> f64 {
        self.ordered_walls().map(|w| w.length()).sum()
    }

    /// Walls oriented so the chain runs away from `start`.
    pub fn ordered_walls(&self) -> impl Iterator<Item = OrientedSegment> + '_ {
        let mut cursor = self.start;
        self.walls.iter().map(move |wall| {
            let (p1, p2) = (wall.line.point1(), wall.line.point2());
            let seg = if (p1 - cursor).length() <= (p2 - cursor).length() {
                OrientedSegment(p1, p2)
            } else {
                OrientedSegment(p2, p1)
            };
            cursor = seg.1;
            seg
        })
    }
}

/// Wall segment oriented along the track direction.
#[derive(Debug, Clone, Copy)]
pub struct OrientedSegment(pub DVec2, pub DVec2);

impl OrientedSegment {
    pub fn length(&self) -> f64 {
        (self.1 - self.0).length()
    }
}

/// One door of a train, placed by arc-length offset from the track start.
#[derive(Debug, Clone, Copy)]
pub struct TrainDoor {
    pub offset: f64,
    pub width: f64,
}

/// A train model: name, capacity, and its door layout.
#[derive(Debug, Clone)]
pub struct TrainType {
    pub name: String,
    pub max_agents: u64,
    pub doors: Vec<TrainDoor>,
}
