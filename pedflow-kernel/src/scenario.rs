use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::distributor::{AgentSource, StartDistribution};
use crate::error::{SimError, SimResult};
use crate::events::{
    expand_schedule, expand_timetable, DoorAction, Event, Schedule, TrainAction,
    TrainTimetableEntry,
};
use crate::geometry::{
    Building, Door, DoorKind, FlowRegulation, Goal, GoalId, Line, Obstacle, Room, RoomId, SubRoom,
    SubRoomId, SubRoomKind, Track, TrainDoor, TrainType, Wall, WallType, EPS_DIST,
};

fn dvec(p: [f64; 2]) -> DVec2 {
    DVec2::new(p[0], p[1])
}

/// Scenario data
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub rooms: Vec<RoomConfig>,
    #[serde(default)]
    pub crossings: Vec<CrossingConfig>,
    #[serde(default)]
    pub transitions: Vec<TransitionConfig>,
    #[serde(default)]
    pub goals: Vec<GoalConfig>,
    #[serde(default)]
    pub tracks: Vec<TrackConfig>,
    #[serde(default)]
    pub train_types: Vec<TrainTypeConfig>,
    #[serde(default)]
    pub train_timetable: Vec<TrainTimetableEntry>,
    #[serde(default)]
    pub events: Vec<EventConfig>,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub distributions: Vec<StartDistribution>,
    #[serde(default)]
    pub sources: Vec<AgentSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    pub id: i32,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub zpos: f64,
    pub subrooms: Vec<SubRoomConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubRoomClass {
    #[default]
    Normal,
    Stair,
    EscalatorUp,
    EscalatorDown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubRoomConfig {
    pub id: i32,
    #[serde(default)]
    pub class: SubRoomClass,
    /// Boundary ring; also the default wall layout when `walls` is absent
    /// (door openings are carved out automatically).
    pub polygon: Vec<[f64; 2]>,
    /// Plane coefficients of `z = A·x + B·y + C`.
    #[serde(default)]
    pub plane: [f64; 3],
    pub up: Option<[f64; 2]>,
    pub down: Option<[f64; 2]>,
    /// Escalator belt speed.
    pub speed: Option<f64>,
    #[serde(default)]
    pub walls: Option<Vec<WallConfig>>,
    #[serde(default)]
    pub obstacles: Vec<ObstacleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallConfig {
    pub p1: [f64; 2],
    pub p2: [f64; 2],
    #[serde(default = "wall_type_wall")]
    pub kind: WallType,
    pub track_id: Option<i32>,
}

fn wall_type_wall() -> WallType {
    WallType::Wall
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstacleConfig {
    pub id: i32,
    #[serde(default)]
    pub caption: String,
    pub polygon: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossingConfig {
    pub id: i32,
    pub room: i32,
    pub subroom1: i32,
    pub subroom2: i32,
    pub p1: [f64; 2],
    pub p2: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorStateConfig {
    #[default]
    Open,
    Close,
    TempClose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionConfig {
    pub id: i32,
    #[serde(default)]
    pub caption: String,
    pub room1: i32,
    pub subroom1: i32,
    /// Absent for exits to the outside.
    pub room2: Option<i32>,
    pub subroom2: Option<i32>,
    pub p1: [f64; 2],
    pub p2: [f64; 2],
    #[serde(default)]
    pub state: DoorStateConfig,
    pub max_agents: Option<u64>,
    /// Maximum outflow in agents per second.
    pub outflow: Option<f64>,
    #[serde(default)]
    pub reopen_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalConfig {
    pub id: i32,
    #[serde(default)]
    pub caption: String,
    #[serde(default = "true_default", rename = "final")]
    pub is_final: bool,
    pub polygon: Vec<[f64; 2]>,
    pub room: Option<i32>,
    pub subroom: Option<i32>,
    pub waiting: Option<WaitingConfig>,
}

fn true_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaitingConfig {
    pub min_peds: Option<usize>,
    pub max_peds: Option<usize>,
    pub waiting_time: Option<f64>,
    pub transition_id: Option<i32>,
    #[serde(default)]
    pub global_timer: bool,
    #[serde(default)]
    pub successors: Vec<SuccessorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessorConfig {
    pub goal: i32,
    pub p: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackConfig {
    pub id: i32,
    pub room: i32,
    pub subroom: i32,
    pub start: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainTypeConfig {
    pub name: String,
    pub max_agents: u64,
    pub doors: Vec<TrainDoorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainDoorConfig {
    pub offset: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventConfig {
    Door {
        time: f64,
        door_id: i32,
        action: DoorAction,
    },
    Train {
        time: f64,
        train_id: i32,
        track_id: i32,
        train_type: String,
        action: TrainAction,
    },
    CreatePedestrians {
        time: f64,
        spec: StartDistribution,
    },
}

/// Everything the simulator needs, resolved from a [`Scenario`].
#[derive(Debug)]
pub struct Built {
    pub building: Building,
    pub events: Vec<Event>,
    pub distributions: Vec<StartDistribution>,
    pub sources: Vec<AgentSource>,
}

impl Scenario {
    /// Resolve the scenario into a building graph plus the event list.
    ///
    /// Cross-references (rooms, subrooms, transitions, goals) are checked
    /// here; a dangling reference is a fatal scenario error.
    pub fn build(&self) -> SimResult<Built> {
        let mut building = Building::new();

        let mut room_handles: Vec<(i32, RoomId)> = Vec::new();
        for room_cfg in &self.rooms {
            let mut subrooms = Vec::new();
            for sub_cfg in &room_cfg.subrooms {
                subrooms.push(self.build_subroom(&mut building, sub_cfg, room_cfg.id)?);
            }
            let handle = building.add_room(Room {
                id: room_cfg.id,
                caption: room_cfg.caption.clone(),
                zpos: room_cfg.zpos,
                subrooms,
            });
            room_handles.push((room_cfg.id, handle));
        }
        let room_of = |id: i32| -> SimResult<RoomId> {
            room_handles
                .iter()
                .find(|(rid, _)| *rid == id)
                .map(|(_, h)| *h)
                .ok_or_else(|| SimError::scenario(format!("room {id}"), "undefined room reference"))
        };
        let subroom_of = |building: &Building, room: RoomId, id: i32| -> SimResult<SubRoomId> {
            building
                .room(room)
                .subrooms
                .iter()
                .position(|s| s.id == id)
                .map(SubRoomId)
                .ok_or_else(|| {
                    SimError::scenario(format!("subroom {id}"), "undefined subroom reference")
                })
        };

        for cross in &self.crossings {
            let room = room_of(cross.room)?;
            let s1 = subroom_of(&building, room, cross.subroom1)?;
            let s2 = subroom_of(&building, room, cross.subroom2)?;
            let line = Line::new(dvec(cross.p1), dvec(cross.p2), &mut building.uids);
            let mut door = Door::new(cross.id, String::new(), line, DoorKind::Crossing);
            door.sides = [Some((room, s1)), Some((room, s2))];
            building.add_door(door);
        }

        for trans in &self.transitions {
            let room1 = room_of(trans.room1)?;
            let s1 = subroom_of(&building, room1, trans.subroom1)?;
            let side2 = match (trans.room2, trans.subroom2) {
                (Some(r2), Some(sub2)) => {
                    let room2 = room_of(r2)?;
                    Some((room2, subroom_of(&building, room2, sub2)?))
                }
                (None, _) => None,
                (Some(_), None) => {
                    return Err(SimError::scenario(
                        format!("transition {}", trans.id),
                        "room2 given without subroom2",
                    ))
                }
            };
            let line = Line::new(dvec(trans.p1), dvec(trans.p2), &mut building.uids);
            let mut door = Door::new(
                trans.id,
                trans.caption.clone(),
                line,
                DoorKind::Transition {
                    exit: side2.is_none(),
                },
            );
            door.sides = [Some((room1, s1)), side2];
            door.regulation = FlowRegulation {
                max_flow: trans.outflow,
                max_agents: trans.max_agents,
                reopen_time: trans.reopen_time,
            };
            match trans.state {
                DoorStateConfig::Open => {}
                DoorStateConfig::Close => door.close(),
                DoorStateConfig::TempClose => door.temp_close(0.0),
            }
            building.add_door(door);
        }

        self.derive_missing_walls(&mut building);
        self.register_tracks(&mut building, &room_of, &subroom_of)?;

        for goal_cfg in &self.goals {
            let mut goal = Goal::new(
                GoalId(goal_cfg.id),
                goal_cfg.caption.clone(),
                goal_cfg.is_final,
                goal_cfg.polygon.iter().copied().map(dvec).collect(),
            )?;
            let centre = goal.centroid();
            goal.room = match goal_cfg.room {
                Some(id) => Some(room_of(id)?),
                None => building.find_room_and_subroom(centre).map(|(r, _)| r),
            };
            goal.subroom = match (goal.room, goal_cfg.subroom) {
                (Some(room), Some(id)) => Some(subroom_of(&building, room, id)?),
                _ => building.find_room_and_subroom(centre).map(|(_, s)| s),
            };
            if let Some(waiting_cfg) = &goal_cfg.waiting {
                goal.waiting = Some(build_waiting(waiting_cfg, goal_cfg.id, centre, &mut building)?);
            }
            building.add_goal(goal);
        }

        for tt in &self.train_types {
            building.add_train_type(TrainType {
                name: tt.name.clone(),
                max_agents: tt.max_agents,
                doors: tt
                    .doors
                    .iter()
                    .map(|d| TrainDoor {
                        offset: d.offset,
                        width: d.width,
                    })
                    .collect(),
            });
        }

        building.init_geometry()?;

        let mut events: Vec<Event> = self
            .events
            .iter()
            .map(|e| match e.clone() {
                EventConfig::Door {
                    time,
                    door_id,
                    action,
                } => Event::Door {
                    time,
                    door_id,
                    action,
                },
                EventConfig::Train {
                    time,
                    train_id,
                    track_id,
                    train_type,
                    action,
                } => Event::Train {
                    time,
                    train_id,
                    track_id,
                    train_type,
                    action,
                },
                EventConfig::CreatePedestrians { time, spec } => {
                    Event::CreatePedestrians { time, spec }
                }
            })
            .collect();

        for schedule in &self.schedules {
            events.extend(expand_schedule(schedule));
            if let Some(max) = schedule.max_agents {
                for door_id in &schedule.doors {
                    let Some(uid) = building.transition_uid_by_id(*door_id) else {
                        return Err(SimError::scenario(
                            format!("schedule group {}", schedule.group_id),
                            format!("undefined transition {door_id}"),
                        ));
                    };
                    if let Some(door) = building.door_mut(uid) {
                        door.regulation.max_agents = Some(max);
                    }
                }
            }
        }
        for entry in &self.train_timetable {
            events.extend(expand_timetable(entry));
        }

        Ok(Built {
            building,
            events,
            distributions: self.distributions.clone(),
            sources: self.sources.clone(),
        })
    }

    fn build_subroom(
        &self,
        building: &mut Building,
        cfg: &SubRoomConfig,
        room_id: i32,
    ) -> SimResult<SubRoom> {
        if cfg.polygon.len() < 3 {
            return Err(SimError::scenario(
                format!("room {room_id} subroom {}", cfg.id),
                "polygon needs at least three vertices",
            ));
        }

        let kind = match cfg.class {
            SubRoomClass::Normal => SubRoomKind::Normal,
            SubRoomClass::Stair | SubRoomClass::EscalatorUp | SubRoomClass::EscalatorDown => {
                let (Some(up), Some(down)) = (cfg.up, cfg.down) else {
                    return Err(SimError::scenario(
                        format!("room {room_id} subroom {}", cfg.id),
                        "stair without up/down reference points",
                    ));
                };
                match cfg.class {
                    SubRoomClass::Stair => SubRoomKind::Stair {
                        up: dvec(up),
                        down: dvec(down),
                    },
                    class => SubRoomKind::Escalator {
                        up: dvec(up),
                        down: dvec(down),
                        speed: cfg.speed.unwrap_or(0.5),
                        upward: class == SubRoomClass::EscalatorUp,
                    },
                }
            }
        };

        let walls = cfg
            .walls
            .as_ref()
            .map(|walls| {
                walls
                    .iter()
                    .map(|w| Wall::new(dvec(w.p1), dvec(w.p2), w.kind, &mut building.uids))
                    .collect()
            })
            .unwrap_or_default();

        let obstacles = cfg
            .obstacles
            .iter()
            .map(|o| {
                Obstacle::new(
                    o.id,
                    o.caption.clone(),
                    o.polygon.iter().copied().map(dvec).collect(),
                    &mut building.uids,
                )
            })
            .collect();

        Ok(SubRoom {
            id: cfg.id,
            polygon: cfg.polygon.iter().copied().map(dvec).collect(),
            walls,
            obstacles,
            door_uids: Vec::new(),
            plane: cfg.plane,
            kind,
            inside_point: None,
        })
    }

    /// Subrooms declared without explicit walls get their polygon edges as
    /// walls, with the spans covered by doors carved out.
    fn derive_missing_walls(&self, building: &mut Building) {
        for ri in 0..building.rooms().len() {
            for si in 0..building.room(RoomId(ri)).subrooms.len() {
                let sub = building.subroom(RoomId(ri), SubRoomId(si));
                if !sub.walls.is_empty() {
                    continue;
                }
                let explicit = self
                    .rooms
                    .iter()
                    .find(|r| r.id == building.room(RoomId(ri)).id)
                    .and_then(|r| r.subrooms.iter().find(|s| s.id == sub.id))
                    .is_some_and(|s| s.walls.is_some());
                if explicit {
                    continue; // explicitly empty wall list
                }

                let polygon = sub.polygon.clone();
                let door_lines: Vec<Line> = sub
                    .door_uids
                    .iter()
                    .filter_map(|uid| building.door(*uid))
                    .map(|d| d.line)
                    .collect();

                let mut walls = Vec::new();
                let n = polygon.len();
                for i in 0..n {
                    let a = polygon[i];
                    let b = polygon[(i + 1) % n];
                    for (p1, p2) in carve_edge(a, b, &door_lines) {
                        walls.push(Wall::new(p1, p2, WallType::Wall, &mut building.uids));
                    }
                }
                building.room_mut(RoomId(ri)).subrooms[si].walls = walls;
            }
        }
    }

    fn register_tracks(
        &self,
        building: &mut Building,
        room_of: &dyn Fn(i32) -> SimResult<RoomId>,
        subroom_of: &dyn Fn(&Building, RoomId, i32) -> SimResult<SubRoomId>,
    ) -> SimResult<()> {
        for track_cfg in &self.tracks {
            let room = room_of(track_cfg.room)?;
            let subroom = subroom_of(building, room, track_cfg.subroom)?;

            // track walls are the subroom's explicit track-typed walls with
            // a matching id
            let mut walls: Vec<Wall> = Vec::new();
            if let Some(room_cfg) = self.rooms.iter().find(|r| r.id == track_cfg.room) {
                if let Some(sub_cfg) = room_cfg.subrooms.iter().find(|s| s.id == track_cfg.subroom)
                {
                    if let Some(wall_cfgs) = &sub_cfg.walls {
                        let sub = building.subroom(room, subroom);
                        for (cfg, wall) in wall_cfgs.iter().zip(&sub.walls) {
                            match cfg.track_id {
                                Some(id) if id == track_cfg.id => walls.push(*wall),
                                Some(id) if id < 0 => {
                                    log::warn!(
                                        "scenario: track wall with out-of-range id {id}, skipped"
                                    );
                                }
                                _ => {}
                            }
                        }
                    }
                }
            }
            if walls.is_empty() {
                return Err(SimError::scenario(
                    format!("track {}", track_cfg.id),
                    "no track walls found in subroom",
                ));
            }

            building.add_track(Track {
                id: track_cfg.id,
                room,
                subroom,
                walls,
                start: dvec(track_cfg.start),
            });
        }
        Ok(())
    }
}

fn build_waiting(
    cfg: &WaitingConfig,
    goal_id: i32,
    centre: DVec2,
    building: &mut Building,
) -> SimResult<crate::geometry::WaitingArea> {
    use crate::geometry::WaitingPolicy;

    let occupancy = cfg.min_peds.is_some() || cfg.max_peds.is_some();
    let mirror = cfg.transition_id.is_some();
    let timer = cfg.global_timer;
    if [occupancy, mirror, timer].iter().filter(|b| **b).count() != 1 {
        return Err(SimError::scenario(
            format!("waiting area {goal_id}"),
            "exactly one of occupancy, transition mirror, or global timer must be set",
        ));
    }

    let policy = if mirror {
        WaitingPolicy::TransitionMirror {
            transition_id: cfg.transition_id.unwrap(),
        }
    } else if timer {
        WaitingPolicy::GlobalTimer {
            waiting_time: cfg.waiting_time.ok_or_else(|| {
                SimError::scenario(
                    format!("waiting area {goal_id}"),
                    "global timer without waiting_time",
                )
            })?,
        }
    } else {
        WaitingPolicy::Occupancy {
            min_peds: cfg.min_peds.unwrap_or(0),
            max_peds: cfg.max_peds.unwrap_or(usize::MAX),
            waiting_time: cfg.waiting_time.unwrap_or(0.0),
        }
    };

    let successors = cfg
        .successors
        .iter()
        .map(|s| (GoalId(s.goal), s.p))
        .collect();
    crate::geometry::WaitingArea::new(policy, successors, centre, &mut building.uids)
}

/// Split one polygon edge into wall pieces, skipping the intervals covered
/// by door segments lying on the edge.
fn carve_edge(a: DVec2, b: DVec2, doors: &[Line]) -> Vec<(DVec2, DVec2)> {
    let edge = Line::with_uid(a, b, crate::geometry::Uid(u64::MAX));
    let len = (b - a).length();
    if len < 1e-9 {
        return Vec::new();
    }
    let dir = (b - a) / len;
    let param = |p: DVec2| (p - a).dot(dir);

    let mut cuts: Vec<(f64, f64)> = doors
        .iter()
        .filter(|d| {
            edge.dist_to(d.point1()) < EPS_DIST && edge.dist_to(d.point2()) < EPS_DIST
        })
        .map(|d| {
            let (t1, t2) = (param(d.point1()), param(d.point2()));
            (t1.min(t2).max(0.0), t1.max(t2).min(len))
        })
        .filter(|(t1, t2)| t2 > t1)
        .collect();
    cuts.sort_by(|x, y| x.0.total_cmp(&y.0));

    let mut pieces = Vec::new();
    let mut cursor = 0.0;
    for (t1, t2) in cuts {
        if t1 - cursor > 1e-6 {
            pieces.push((a + dir * cursor, a + dir * t1));
        }
        cursor = cursor.max(t2);
    }
    if len - cursor > 1e-6 {
        pieces.push((a + dir * cursor, a + dir * len));
    }
    pieces
}
