use glam::DVec2;
use log::warn;
use rustc_hash::FxHashMap;

use crate::error::{SimError, SimResult};

use super::door::{Door, DoorKind};
use super::goal::{Goal, GoalId};
use super::line::{Line, Uid, UidAllocator, Wall, WallType};
use super::room::{Room, SubRoom};
use super::track::{Track, TrainType};

/// Stable handle of a room in the building arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoomId(pub usize);

/// Stable handle of a subroom within its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubRoomId(pub usize);

/// The building graph: rooms owning subrooms, door and goal arenas, tracks
/// and train types, plus the transient train overlay.
///
/// Entities are stored once and referenced by stable handles ([`RoomId`],
/// [`SubRoomId`], door [`Uid`]s, [`GoalId`]s); there are no back-pointers.
#[derive(Debug, Default)]
pub struct Building {
    rooms: Vec<Room>,
    doors: FxHashMap<Uid, Door>,
    /// Door iteration order (insertion order, stable across lookups).
    door_order: Vec<Uid>,
    goals: Vec<Goal>,
    goal_index: FxHashMap<GoalId, usize>,
    tracks: FxHashMap<i32, Track>,
    train_types: FxHashMap<String, TrainType>,

    train_walls_removed: FxHashMap<i32, Vec<(RoomId, SubRoomId, Wall)>>,
    train_walls_added: FxHashMap<i32, Vec<(RoomId, SubRoomId, Wall)>>,
    train_doors_added: FxHashMap<i32, Vec<Uid>>,

    pub uids: UidAllocator,
}

impl Building {
    pub fn new() -> Self {
        Building::default()
    }

    // ---- construction ----

    pub fn add_room(&mut self, room: Room) -> RoomId {
        self.rooms.push(room);
        RoomId(self.rooms.len() - 1)
    }

    /// Register a door and link it to its adjoining subrooms.
    pub fn add_door(&mut self, door: Door) -> Uid {
        let uid = door.uid();
        for (room, subroom) in door.sides.iter().flatten() {
            self.rooms[room.0].subrooms[subroom.0].door_uids.push(uid);
        }
        self.door_order.push(uid);
        self.doors.insert(uid, door);
        uid
    }

    pub fn add_goal(&mut self, goal: Goal) {
        self.goal_index.insert(goal.id, self.goals.len());
        self.goals.push(goal);
    }

    pub fn add_track(&mut self, track: Track) {
        self.tracks.insert(track.id, track);
    }

    pub fn add_train_type(&mut self, train_type: TrainType) {
        self.train_types.insert(train_type.name.clone(), train_type);
    }

    // ---- lookup ----

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn room(&self, id: RoomId) -> &Room {
        &self.rooms[id.0]
    }

    pub fn room_mut(&mut self, id: RoomId) -> &mut Room {
        &mut self.rooms[id.0]
    }

    pub fn subroom(&self, room: RoomId, subroom: SubRoomId) -> &SubRoom {
        &self.rooms[room.0].subrooms[subroom.0]
    }

    pub fn door(&self, uid: Uid) -> Option<&Door> {
        self.doors.get(&uid)
    }

    pub fn door_mut(&mut self, uid: Uid) -> Option<&mut Door> {
        self.doors.get_mut(&uid)
    }

    /// Transition lookup by scenario id.
    pub fn transition_by_id(&self, id: i32) -> Option<&Door> {
        self.door_order
            .iter()
            .filter_map(|uid| self.doors.get(uid))
            .find(|d| d.is_transition() && d.id == id)
    }

    pub fn transition_uid_by_id(&self, id: i32) -> Option<Uid> {
        self.transition_by_id(id).map(Door::uid)
    }

    /// Crossing lookup by scenario id.
    pub fn crossing_by_id(&self, id: i32) -> Option<&Door> {
        self.doors()
            .find(|d| matches!(d.kind, DoorKind::Crossing) && d.id == id)
    }

    pub fn doors(&self) -> impl Iterator<Item = &Door> {
        self.door_order.iter().filter_map(|uid| self.doors.get(uid))
    }

    pub fn doors_mut(&mut self) -> impl Iterator<Item = &mut Door> {
        self.doors.values_mut()
    }

    pub fn door_uids(&self) -> &[Uid] {
        &self.door_order
    }

    pub fn exits(&self) -> impl Iterator<Item = &Door> {
        self.doors().filter(|d| d.is_exit())
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn goals_mut(&mut self) -> &mut [Goal] {
        &mut self.goals
    }

    pub fn goal(&self, id: GoalId) -> Option<&Goal> {
        self.goal_index.get(&id).map(|&i| &self.goals[i])
    }

    pub fn goal_mut(&mut self, id: GoalId) -> Option<&mut Goal> {
        self.goal_index.get(&id).map(|&i| &mut self.goals[i])
    }

    pub fn track(&self, id: i32) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn train_type(&self, name: &str) -> Option<&TrainType> {
        self.train_types.get(name)
    }

    /// (room, subroom) containing the position, if any.
    pub fn find_room_and_subroom(&self, p: DVec2) -> Option<(RoomId, SubRoomId)> {
        for (ri, room) in self.rooms.iter().enumerate() {
            if let Some(si) = room.subroom_containing(p) {
                return Some((RoomId(ri), SubRoomId(si)));
            }
        }
        None
    }

    pub fn is_in_any_subroom(&self, p: DVec2) -> bool {
        self.find_room_and_subroom(p).is_some()
    }

    /// Outer boundary rectangle over all subroom polygons.
    pub fn bounding_box(&self) -> (DVec2, DVec2) {
        let mut min = DVec2::splat(f64::MAX);
        let mut max = DVec2::splat(f64::MIN);
        for room in &self.rooms {
            for sub in &room.subrooms {
                let (lo, hi) = sub.bounding_box();
                min = min.min(lo);
                max = max.max(hi);
            }
        }
        (min, max)
    }

    pub fn elevation(&self, room: RoomId, subroom: SubRoomId, p: DVec2) -> f64 {
        self.subroom(room, subroom).elevation(p)
    }

    // ---- initialization ----

    /// Derive per-subroom inside points and run consistency checks.
    ///
    /// The inside point is the centre of a bounding door offset by a quarter
    /// of the door's normal, picking whichever side lies inside the subroom.
    pub fn init_geometry(&mut self) -> SimResult<()> {
        for ri in 0..self.rooms.len() {
            for si in 0..self.rooms[ri].subrooms.len() {
                let inside = {
                    let sub = &self.rooms[ri].subrooms[si];
                    let mut found = None;
                    for uid in &sub.door_uids {
                        let Some(door) = self.doors.get(uid) else {
                            continue;
                        };
                        let mid = door.line.centre();
                        let normal = door.line.normal_vec();
                        let candidates = [mid + normal * 0.25, mid - normal * 0.25];
                        if let Some(p) = candidates.into_iter().find(|p| sub.contains(*p)) {
                            found = Some(p);
                            break;
                        }
                    }
                    found
                };
                match inside {
                    Some(p) => self.rooms[ri].subrooms[si].inside_point = Some(p),
                    None => {
                        return Err(SimError::geometry(
                            format!("room {} subroom {}", self.rooms[ri].id, si),
                            "no point inside the subroom could be found, subroom may be too small",
                        ))
                    }
                }
            }
        }

        for door in self.doors() {
            for (room, subroom) in door.sides.iter().flatten() {
                let sub = self.subroom(*room, *subroom);
                let on_boundary = sub
                    .walls
                    .iter()
                    .any(|w| w.line.nearly_in_line_segment(door.line.centre()))
                    || sub.contains(door.line.centre())
                    || sub
                        .polygon
                        .iter()
                        .zip(sub.polygon.iter().cycle().skip(1))
                        .any(|(a, b)| {
                            Line::with_uid(*a, *b, Uid(u64::MAX))
                                .nearly_in_line_segment(door.line.centre())
                        });
                if !on_boundary {
                    warn!(
                        "geometry: door {}: centre not on the boundary of room {} subroom {}",
                        door.id, self.rooms[room.0].id, subroom.0
                    );
                }
            }
        }

        Ok(())
    }

    // ---- train overlay ----

    /// Apply a train arrival: carve the train's door openings out of the
    /// track walls and add one transition per train door, all keyed by
    /// `train_id`. Returns true — the door graph is stale afterwards.
    pub fn train_arrive(&mut self, train_id: i32, track_id: i32, type_name: &str) -> SimResult<bool> {
        let track = self
            .tracks
            .get(&track_id)
            .ok_or_else(|| SimError::geometry(format!("track {track_id}"), "unknown track"))?
            .clone();
        let train_type = self
            .train_types
            .get(type_name)
            .ok_or_else(|| {
                SimError::geometry(format!("train type {type_name}"), "unknown train type")
            })?
            .clone();

        // door spans as arc-length intervals along the track
        let mut spans: Vec<(f64, f64)> = Vec::new();
        let mut added_doors = Vec::new();
        for train_door in &train_type.doors {
            // door spans are centred on their offset
            let s0 = train_door.offset - train_door.width / 2.0;
            let s1 = train_door.offset + train_door.width / 2.0;
            let (Some(p0), Some(p1)) = (track.point_at(s0), track.point_at(s1)) else {
                warn!(
                    "geometry: train {train_id}: door at offset {s0} beyond track {track_id}, skipped"
                );
                continue;
            };
            spans.push((s0, s1));

            let line = Line::new(p0, p1, &mut self.uids);
            let mut door = Door::new(
                train_id,
                format!("train {train_id} door"),
                line,
                DoorKind::Transition { exit: true },
            );
            door.sides = [Some((track.room, track.subroom)), None];
            let uid = self.add_door(door);
            added_doors.push(uid);
        }

        // wall surgery: rebuild every chain wall minus the door spans
        let mut removed = Vec::new();
        let mut added = Vec::new();
        let mut s = 0.0;
        let chain: Vec<_> = track.ordered_walls().collect();
        for (wall, seg) in track.walls.iter().zip(chain) {
            let len = seg.length();
            let (wall_s0, wall_s1) = (s, s + len);
            s = wall_s1;

            let mut cuts: Vec<(f64, f64)> = spans
                .iter()
                .filter(|(a, b)| *b > wall_s0 && *a < wall_s1)
                .map(|(a, b)| (a.max(wall_s0), b.min(wall_s1)))
                .collect();
            if cuts.is_empty() {
                continue;
            }
            cuts.sort_by(|a, b| a.0.total_cmp(&b.0));

            let dir = (seg.1 - seg.0) / len;
            let at = |arc: f64| seg.0 + dir * (arc - wall_s0);

            removed.push((track.room, track.subroom, *wall));
            let mut cursor = wall_s0;
            for (a, b) in &cuts {
                if *a - cursor > 1e-9 {
                    added.push((
                        track.room,
                        track.subroom,
                        Wall::new(at(cursor), at(*a), wall.kind, &mut self.uids),
                    ));
                }
                cursor = *b;
            }
            if wall_s1 - cursor > 1e-9 {
                added.push((
                    track.room,
                    track.subroom,
                    Wall::new(at(cursor), at(wall_s1), wall.kind, &mut self.uids),
                ));
            }
        }

        for (room, subroom, wall) in &removed {
            let walls = &mut self.rooms[room.0].subrooms[subroom.0].walls;
            walls.retain(|w| w.line.uid() != wall.line.uid());
        }
        for (room, subroom, wall) in &added {
            self.rooms[room.0].subrooms[subroom.0].walls.push(*wall);
        }

        self.train_walls_removed.insert(train_id, removed);
        self.train_walls_added.insert(train_id, added);
        self.train_doors_added.insert(train_id, added_doors);

        Ok(true)
    }

    /// Undo a train arrival, restoring the original wall set bit-exactly.
    pub fn train_depart(&mut self, train_id: i32) -> SimResult<bool> {
        let doors = self.train_doors_added.remove(&train_id).ok_or_else(|| {
            SimError::geometry(format!("train {train_id}"), "departure without arrival")
        })?;
        for uid in doors {
            if let Some(door) = self.doors.remove(&uid) {
                for (room, subroom) in door.sides.iter().flatten() {
                    self.rooms[room.0].subrooms[subroom.0]
                        .door_uids
                        .retain(|u| *u != uid);
                }
            }
            self.door_order.retain(|u| *u != uid);
        }

        for (room, subroom, wall) in self.train_walls_added.remove(&train_id).unwrap_or_default() {
            self.rooms[room.0].subrooms[subroom.0]
                .walls
                .retain(|w| w.line.uid() != wall.line.uid());
        }
        for (room, subroom, wall) in self
            .train_walls_removed
            .remove(&train_id)
            .unwrap_or_default()
        {
            self.rooms[room.0].subrooms[subroom.0].walls.push(wall);
        }

        Ok(true)
    }

    /// Doors added for a currently-present train.
    pub fn train_doors(&self, train_id: i32) -> &[Uid] {
        self.train_doors_added
            .get(&train_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Walls of the given track between the platform edge, tagged
    /// [`WallType::Track`], collected from the owning subroom.
    pub fn track_walls(&self, track_id: i32) -> Vec<Wall> {
        match self.tracks.get(&track_id) {
            Some(track) => self
                .subroom(track.room, track.subroom)
                .walls
                .iter()
                .filter(|w| w.kind == WallType::Track)
                .copied()
                .collect(),
            None => Vec::new(),
        }
    }
}
