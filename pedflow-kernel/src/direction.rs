use glam::DVec2;
use rustc_hash::FxHashMap;

use crate::error::SimResult;
use crate::field::{FloorField, SpeedMode, TargetMode};
use crate::geometry::{Building, Line, RoomId, Uid};
use crate::pedestrian::Pedestrian;

/// Walking-direction strategy: maps (agent, exit line) to the point the
/// agent steers toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionStrategy {
    /// Midpoint of the exit line.
    MiddlePoint,
    /// Exit line shrunk inward by the agent's shoulder width, then the
    /// closest point on the shrunk segment.
    MinSeparationShorterLine,
    /// Projection onto the extended exit line if within a small slack of
    /// the segment, the midpoint otherwise.
    InRangeBottleneck,
    /// Cached floor-field gradient toward the destination door.
    LocalFloorfield,
}

/// Strategy dispatch plus the per-room floor fields backing the
/// floor-field strategy and the router's local-distance queries.
pub struct DirectionManager {
    pub strategy: DirectionStrategy,
    fields: FxHashMap<RoomId, FloorField>,
    spacing: f64,
    speed_mode: SpeedMode,
    wall_avoid_distance: f64,
}

impl DirectionManager {
    pub fn new(
        strategy: DirectionStrategy,
        spacing: f64,
        speed_mode: SpeedMode,
        wall_avoid_distance: f64,
    ) -> Self {
        DirectionManager {
            strategy,
            fields: FxHashMap::default(),
            spacing,
            speed_mode,
            wall_avoid_distance,
        }
    }

    /// Rebuild the line-segment fields of every room and precompute all
    /// door targets, so the compute phase only reads.
    pub fn reinit(&mut self, building: &Building) -> SimResult<()> {
        self.fields.clear();
        for ri in 0..building.rooms().len() {
            let room_id = RoomId(ri);
            let mut field = FloorField::from_room(
                building,
                room_id,
                self.spacing,
                TargetMode::LineSegment,
                self.speed_mode,
                true,
                self.wall_avoid_distance,
            )?;
            field.add_all_targets()?;
            self.fields.insert(room_id, field);
        }
        Ok(())
    }

    /// Local geodesic distance from a position to a door of the room.
    pub fn distance_to_target(&self, room: RoomId, door: Uid, pos: DVec2) -> f64 {
        match self.fields.get(&room) {
            Some(field) => field.cost_to(door, pos),
            None => f64::INFINITY,
        }
    }

    pub fn direction_to_target(&self, room: RoomId, door: Uid, pos: DVec2) -> DVec2 {
        match self.fields.get(&room) {
            Some(field) => field.direction_to(door, pos),
            None => DVec2::ZERO,
        }
    }

    pub fn distance_to_wall(&self, room: RoomId, pos: DVec2) -> f64 {
        match self.fields.get(&room) {
            Some(field) => field.distance_to_wall(pos),
            None => f64::INFINITY,
        }
    }

    pub fn direction_to_wall(&self, room: RoomId, pos: DVec2) -> DVec2 {
        match self.fields.get(&room) {
            Some(field) => field.direction_to_wall(pos),
            None => DVec2::ZERO,
        }
    }

    /// The point the agent steers toward, clamped into its subroom.
    pub fn target(&self, building: &Building, ped: &Pedestrian) -> DVec2 {
        let Some(exit_line) = ped.exit_line else {
            return ped.pos;
        };
        let raw = match self.strategy {
            DirectionStrategy::MiddlePoint => exit_line.centre(),
            DirectionStrategy::MinSeparationShorterLine => {
                min_separation_target(&exit_line, ped)
            }
            DirectionStrategy::InRangeBottleneck => in_range_target(&exit_line, ped),
            DirectionStrategy::LocalFloorfield => {
                let dir = ped
                    .destination
                    .map(|uid| self.direction_to_target(ped.room, uid, ped.pos))
                    .unwrap_or(DVec2::ZERO);
                if dir == DVec2::ZERO {
                    // no cached field for this destination (e.g. a waiting
                    // area's virtual crossing)
                    exit_line.shortest_point(ped.pos)
                } else {
                    ped.pos + dir
                }
            }
        };
        clamp_into_subroom(building, ped, raw)
    }
}

/// Shrink the exit line by the shoulder width on both sides; fall back to
/// the midpoint when the line is shorter than twice the shrink width.
fn min_separation_target(exit_line: &Line, ped: &Pedestrian) -> DVec2 {
    let d = ped.ellipse.b_min + 0.1;
    let p1 = exit_line.point1();
    let p2 = exit_line.point2();
    if crate::geometry::approx_eq(p1, p2) {
        return p1;
    }

    let length = (p1 - p2).length();
    if d >= 0.5 * length {
        return (p1 + p2) * 0.5;
    }
    let u = d / length;
    let shrunk = Line::with_uid(p1 + (p2 - p1) * u, p1 + (p2 - p1) * (1.0 - u), exit_line.uid());
    shrunk.shortest_point(ped.pos)
}

fn in_range_target(exit_line: &Line, ped: &Pedestrian) -> DVec2 {
    let p1 = exit_line.point1();
    let p2 = exit_line.point2();
    let lot = exit_line.lot_point(ped.pos);
    let middle = (p1 + p2) * 0.5;
    let d = 0.2;

    let diff = (p1 - p2).normalize_or_zero() * d;
    let widened = Line::with_uid(p1 - diff, p2 + diff, exit_line.uid());
    if widened.is_in_line_segment(lot) {
        lot
    } else {
        middle
    }
}

/// Pull a target back toward the agent until it lies inside the agent's
/// subroom polygon.
fn clamp_into_subroom(building: &Building, ped: &Pedestrian, target: DVec2) -> DVec2 {
    let sub = building.subroom(ped.room, ped.subroom);
    if sub.contains(target) {
        return target;
    }
    // the exit line sits on the boundary, so targets on it count as inside
    if let Some(exit_line) = &ped.exit_line {
        if exit_line.dist_to(target) < crate::geometry::EPS_DIST {
            return target;
        }
    }
    for k in (0..10).rev() {
        let t = k as f64 / 10.0;
        let candidate = ped.pos + (target - ped.pos) * t;
        if sub.contains(candidate) {
            return candidate;
        }
    }
    ped.pos
}
