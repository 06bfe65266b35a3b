use std::collections::BTreeSet;

use log::{info, warn};
use ndarray::Array2;
use rustc_hash::FxHashMap;

use crate::direction::DirectionManager;
use crate::error::SimResult;
use crate::field::{FloorField, SpeedMode, TargetMode};
use crate::geometry::{Building, GoalId, RoomId, SubRoomId, SubRoomKind, Uid};
use crate::pedestrian::Pedestrian;

/// Weight applied to the straight-line distance between an outside goal and
/// an exit, so that exits near the goal win terminal selection without the
/// goal participating in the door graph.
const GOAL_EDGE_PENALTY: f64 = 1000.0;

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Grid spacing of the distance-measurement floor fields.
    pub spacing: f64,
    /// Scope of candidate doors in `find_exit`: the agent's subroom instead
    /// of the whole room.
    pub within_subroom: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            spacing: 0.125,
            within_subroom: false,
        }
    }
}

/// Door-graph router: Floyd–Warshall over all door UIDs with geodesic
/// edge lengths measured by per-room floor fields.
pub struct FloorfieldRouter {
    config: RouterConfig,
    uids: Vec<Uid>,
    index: FxHashMap<Uid, usize>,
    dist: Array2<f64>,
    next_hop: Array2<usize>,
    exits: Vec<Uid>,
    doors_to_goal: FxHashMap<GoalId, BTreeSet<Uid>>,
    needs_update: bool,
}

impl FloorfieldRouter {
    pub fn new(config: RouterConfig) -> Self {
        FloorfieldRouter {
            config,
            uids: Vec::new(),
            index: FxHashMap::default(),
            dist: Array2::zeros((0, 0)),
            next_hop: Array2::zeros((0, 0)),
            exits: Vec::new(),
            doors_to_goal: FxHashMap::default(),
            needs_update: false,
        }
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    pub fn set_needs_update(&mut self, value: bool) {
        self.needs_update |= value;
    }

    /// Shortest known distance between two doors, `+inf` when unconnected.
    pub fn distance(&self, from: Uid, to: Uid) -> f64 {
        match (self.index.get(&from), self.index.get(&to)) {
            (Some(&i), Some(&j)) => self.dist[(i, j)],
            _ => f64::INFINITY,
        }
    }

    /// Rebuild the whole door graph: per-room fields, edges, penalties,
    /// Floyd–Warshall.
    pub fn reinit(&mut self, building: &Building) -> SimResult<()> {
        self.uids = building.door_uids().to_vec();
        self.uids.sort();
        self.uids.dedup();
        self.index = self
            .uids
            .iter()
            .enumerate()
            .map(|(i, uid)| (*uid, i))
            .collect();
        self.exits = building.exits().map(|d| d.uid()).collect();

        let n = self.uids.len();
        let mut dist = Array2::from_elem((n, n), f64::INFINITY);
        let mut next_hop = Array2::zeros((n, n));
        for i in 0..n {
            dist[(i, i)] = 0.0;
            for j in 0..n {
                next_hop[(i, j)] = j;
            }
        }

        self.collect_goal_terminals(building);

        // distance-measurement field per room, centre-to-centre door costs
        for (ri, _) in building.rooms().iter().enumerate() {
            let room_id = RoomId(ri);
            let mut field = FloorField::from_room(
                building,
                room_id,
                self.config.spacing,
                TargetMode::CenterPoint,
                SpeedMode::Homogeneous,
                false,
                0.0,
            )?;

            let room_doors: Vec<Uid> = field.door_uids().collect();
            for (a, &u1) in room_doors.iter().enumerate() {
                for &u2 in room_doors.iter().skip(a + 1) {
                    if !shares_subroom(building, u1, u2) {
                        continue;
                    }
                    let d = field.distance_between_doors(u1, u2)?;
                    if d < field.spacing() {
                        warn!(
                            "router: ignoring distance of doors {u1} and {u2}, too small: {d:.2}"
                        );
                        continue;
                    }
                    let (i, j) = (self.index[&u1], self.index[&u2]);
                    if d < dist[(i, j)] {
                        dist[(i, j)] = d;
                        dist[(j, i)] = d;
                    }
                }
            }
        }

        self.apply_penalties(building, &mut dist);
        floyd_warshall(&mut dist, &mut next_hop);

        self.dist = dist;
        self.next_hop = next_hop;
        self.needs_update = false;
        info!("router: door graph rebuilt over {n} doors");
        Ok(())
    }

    /// Candidate terminal doors per goal: for a waiting area the doors of
    /// its room (or subroom); for a plain goal every exit, weighted by
    /// distance in `find_exit`.
    fn collect_goal_terminals(&mut self, building: &Building) {
        self.doors_to_goal.clear();
        for goal in building.goals() {
            let doors = if goal.is_waiting_area() {
                let mut set = BTreeSet::new();
                if let (Some(room), subroom) = (goal.room, goal.subroom) {
                    for door in building.doors() {
                        let inside = match (self.config.within_subroom, subroom) {
                            (true, Some(sub)) => door.is_in_subroom(room, sub),
                            _ => door.is_in(room),
                        };
                        if inside {
                            set.insert(door.uid());
                        }
                    }
                }
                set
            } else {
                self.exits.iter().copied().collect()
            };
            self.doors_to_goal.insert(goal.id, doors);
        }
    }

    fn apply_penalties(&self, building: &Building, dist: &mut Array2<f64>) {
        // directional escalators: the wrong direction gets an infinite edge
        for room in building.rooms() {
            for sub in &room.subrooms {
                let SubRoomKind::Escalator { up, upward, .. } = sub.kind else {
                    continue;
                };
                if sub.door_uids.len() != 2 {
                    continue;
                }
                let (a, b) = (sub.door_uids[0], sub.door_uids[1]);
                let (da, db) = match (building.door(a), building.door(b)) {
                    (Some(da), Some(db)) => (da, db),
                    _ => continue,
                };
                let a_is_up =
                    (da.line.centre() - up).length() <= (db.line.centre() - up).length();
                let (up_door, down_door) = if a_is_up { (a, b) } else { (b, a) };
                let forbidden = if upward {
                    (up_door, down_door)
                } else {
                    (down_door, up_door)
                };
                let (i, j) = (self.index[&forbidden.0], self.index[&forbidden.1]);
                dist[(i, j)] = f64::INFINITY;
            }
        }

        // closed doors lose all incident edges
        for door in building.doors() {
            if !door.is_closed() {
                continue;
            }
            let i = self.index[&door.uid()];
            for j in 0..self.uids.len() {
                if i != j {
                    dist[(i, j)] = f64::INFINITY;
                    dist[(j, i)] = f64::INFINITY;
                }
            }
        }
    }

    /// Choose the next door for an agent and set its destination and exit
    /// line. Returns `None` when no goal is reachable; the agent keeps its
    /// current destination.
    pub fn find_exit(
        &self,
        ped: &mut Pedestrian,
        building: &Building,
        direction: &DirectionManager,
    ) -> Option<Uid> {
        let (room, subroom) = building
            .find_room_and_subroom(ped.pos)
            .unwrap_or((ped.room, ped.subroom));

        // a waiting area in the agent's scope short-circuits the graph
        if let Some(goal) = ped.final_goal.and_then(|id| building.goal(id)) {
            if let Some(wa) = &goal.waiting {
                let in_scope = goal.room == Some(room)
                    && (!self.config.within_subroom || goal.subroom == Some(subroom));
                if in_scope {
                    ped.destination = Some(wa.centre_crossing.uid());
                    ped.exit_line = Some(wa.centre_crossing);
                    return ped.destination;
                }
            }
        }

        let terminals: Vec<Uid> = match ped.final_goal {
            None => building
                .exits()
                .filter(|d| d.is_passable_for_routing())
                .map(|d| d.uid())
                .collect(),
            Some(goal) => match self.doors_to_goal.get(&goal) {
                Some(doors) if !doors.is_empty() => doors.iter().copied().collect(),
                _ => {
                    warn!("routing: agent {}: unknown or unreachable goal {goal}", ped.id);
                    return None;
                }
            },
        };

        let local_doors = self.local_doors(building, room, subroom);
        let goal_pos = ped
            .final_goal
            .and_then(|id| building.goal(id))
            .filter(|g| !g.is_waiting_area())
            .map(|g| g.centroid());

        let mut best: Option<(f64, Uid, Uid)> = None;
        for &terminal in &terminals {
            let terminal_weight = match goal_pos {
                Some(gp) => match building.door(terminal) {
                    Some(door) => GOAL_EDGE_PENALTY * (door.line.centre() - gp).length(),
                    None => 0.0,
                },
                None => 0.0,
            };
            for &door in &local_doors {
                let local = direction.distance_to_target(room, door, ped.pos);
                if !local.is_finite() {
                    continue;
                }
                let graph = self.distance(door, terminal);
                if !graph.is_finite() {
                    continue;
                }
                let total = local + graph + terminal_weight;
                let better = match best {
                    None => true,
                    Some((best_total, best_door, _)) => {
                        total < best_total - 1e-9
                            || ((total - best_total).abs() <= 1e-9 && door < best_door)
                    }
                };
                if better {
                    best = Some((total, door, terminal));
                }
            }
        }

        let (_, mut best_door, best_terminal) = best?;

        // in room scope, forward along the next-hop chain until the first
        // transition; the room-wide floor field steers through crossings
        if !self.config.within_subroom {
            let mut hops = 0;
            while let Some(door) = building.door(best_door) {
                if door.is_transition() {
                    break;
                }
                let (i, j) = (self.index[&best_door], self.index[&best_terminal]);
                let next = self.uids[self.next_hop[(i, j)]];
                if next == best_door || hops > self.uids.len() {
                    break;
                }
                best_door = next;
                hops += 1;
            }
        }

        if let Some(door) = building.door(best_door) {
            ped.destination = Some(best_door);
            ped.exit_line = Some(door.line);
        }
        Some(best_door)
    }

    fn local_doors(&self, building: &Building, room: RoomId, subroom: SubRoomId) -> Vec<Uid> {
        let mut doors = Vec::new();
        if self.config.within_subroom {
            for uid in &building.subroom(room, subroom).door_uids {
                let Some(door) = building.door(*uid) else {
                    continue;
                };
                if door.is_transition() && !door.is_passable_for_routing() {
                    continue;
                }
                doors.push(*uid);
            }
        } else {
            for door in building.doors() {
                if door.is_in(room) {
                    doors.push(door.uid());
                }
            }
        }
        doors
    }
}

fn shares_subroom(building: &Building, u1: Uid, u2: Uid) -> bool {
    let (Some(d1), Some(d2)) = (building.door(u1), building.door(u2)) else {
        return false;
    };
    d1.sides
        .iter()
        .flatten()
        .any(|side| d2.sides.iter().flatten().any(|other| side == other))
}

/// All-pairs shortest paths with path reconstruction.
fn floyd_warshall(dist: &mut Array2<f64>, next_hop: &mut Array2<usize>) {
    let n = dist.dim().0;
    for k in 0..n {
        for i in 0..n {
            let dik = dist[(i, k)];
            if !dik.is_finite() {
                continue;
            }
            for j in 0..n {
                let through = dik + dist[(k, j)];
                if through < dist[(i, j)] {
                    dist[(i, j)] = through;
                    next_hop[(i, j)] = next_hop[(i, k)];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::floyd_warshall;

    #[test]
    fn shortest_paths_on_a_line_graph() {
        // 0 -- 1 -- 2, no direct 0--2 edge
        let mut dist = Array2::from_elem((3, 3), f64::INFINITY);
        for i in 0..3 {
            dist[(i, i)] = 0.0;
        }
        dist[(0, 1)] = 2.0;
        dist[(1, 0)] = 2.0;
        dist[(1, 2)] = 3.0;
        dist[(2, 1)] = 3.0;
        let mut next = Array2::zeros((3, 3));
        for i in 0..3 {
            for j in 0..3 {
                next[(i, j)] = j;
            }
        }

        floyd_warshall(&mut dist, &mut next);

        assert_eq!(dist[(0, 2)], 5.0);
        assert_eq!(next[(0, 2)], 1);
    }

    #[test]
    fn one_way_edges_stay_one_way() {
        let mut dist = Array2::from_elem((2, 2), f64::INFINITY);
        dist[(0, 0)] = 0.0;
        dist[(1, 1)] = 0.0;
        dist[(0, 1)] = 1.0; // 1 -> 0 missing (directional escalator)
        let mut next = Array2::zeros((2, 2));
        for i in 0..2 {
            for j in 0..2 {
                next[(i, j)] = j;
            }
        }

        floyd_warshall(&mut dist, &mut next);

        assert_eq!(dist[(0, 1)], 1.0);
        assert!(dist[(1, 0)].is_infinite());
    }
}
