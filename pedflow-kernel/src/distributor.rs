use glam::DVec2;
use log::{info, warn};

use crate::error::{SimError, SimResult};
use crate::geometry::{Building, GoalId, RoomId, SubRoom, SubRoomId};
use crate::pedestrian::{AgentParameters, Pedestrian};
use crate::util;

/// Initial-distribution spec: place `count` agents in a room or a specific
/// subroom, with parameters drawn from the spec's distributions.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StartDistribution {
    pub room: i32,
    #[serde(default)]
    pub subroom: Option<i32>,
    pub count: usize,
    #[serde(default)]
    pub group: i32,
    #[serde(default)]
    pub goal: Option<i32>,
    #[serde(default)]
    pub params: AgentParameters,
}

/// Candidate positions on a regular grid spaced `max(2 a_min, 2 b_max)`
/// with a wall/door buffer, shuffled with a deterministic RNG.
fn candidate_positions(
    sub: &SubRoom,
    params: &AgentParameters,
    rng: &mut fastrand::Rng,
) -> Vec<DVec2> {
    let spacing = (2.0 * params.a_min.0).max(2.0 * params.b_max.0);
    let buffer = params.b_max.0;
    let (min, max) = sub.bounding_box();

    let mut positions = Vec::new();
    let mut y = min.y + spacing / 2.0;
    while y < max.y {
        let mut x = min.x + spacing / 2.0;
        while x < max.x {
            let p = DVec2::new(x, y);
            if sub.contains(p) && clear_of_boundary(sub, p, buffer) {
                positions.push(p);
            }
            x += spacing;
        }
        y += spacing;
    }
    rng.shuffle(&mut positions);
    positions
}

fn clear_of_boundary(sub: &SubRoom, p: DVec2, buffer: f64) -> bool {
    sub.all_walls()
        .all(|w| w.line.dist_to(p) > buffer)
}

fn room_handle(building: &Building, room_id: i32) -> SimResult<RoomId> {
    building
        .rooms()
        .iter()
        .position(|r| r.id == room_id)
        .map(RoomId)
        .ok_or_else(|| {
            SimError::scenario(format!("room {room_id}"), "undefined room reference")
        })
}

/// Place the agents of one distribution spec.
///
/// Positions specified per room are allocated to subrooms in proportion to
/// subroom area, with largest-remainder rebalancing so the total is exact.
pub fn distribute_spec(
    building: &Building,
    spec: &StartDistribution,
    seed: u64,
    next_agent_id: &mut u64,
) -> SimResult<Vec<Pedestrian>> {
    let room = room_handle(building, spec.room)?;
    let subrooms = &building.room(room).subrooms;

    let per_subroom: Vec<(SubRoomId, usize)> = match spec.subroom {
        Some(sub_id) => {
            let si = subrooms
                .iter()
                .position(|s| s.id == sub_id)
                .ok_or_else(|| {
                    SimError::scenario(
                        format!("room {} subroom {sub_id}", spec.room),
                        "undefined subroom reference",
                    )
                })?;
            vec![(SubRoomId(si), spec.count)]
        }
        None => allocate_by_area(subrooms, spec.count),
    };

    let mut rng = fastrand::Rng::with_seed(seed ^ (spec.room as u64) << 32 ^ spec.count as u64);
    let mut agents = Vec::with_capacity(spec.count);

    for (subroom, n) in per_subroom {
        if n == 0 {
            continue;
        }
        let sub = building.subroom(room, subroom);
        let positions = candidate_positions(sub, &spec.params, &mut rng);
        if positions.len() < n {
            return Err(SimError::scenario(
                format!("room {} subroom {}", spec.room, sub.id),
                format!("only {} free positions for {n} agents", positions.len()),
            ));
        }
        for pos in positions.into_iter().take(n) {
            let id = *next_agent_id;
            *next_agent_id += 1;
            let mut ped = Pedestrian::new(id, pos, &spec.params, seed);
            ped.group = spec.group;
            ped.room = room;
            ped.subroom = subroom;
            ped.final_goal = spec.goal.map(GoalId);
            agents.push(ped);
        }
    }

    info!(
        "distributor: placed {} agents in room {}",
        agents.len(),
        spec.room
    );
    Ok(agents)
}

/// Largest-remainder allocation of `count` over the subroom areas.
fn allocate_by_area(subrooms: &[SubRoom], count: usize) -> Vec<(SubRoomId, usize)> {
    let total: f64 = subrooms.iter().map(SubRoom::area).sum();
    if total <= 0.0 {
        return vec![(SubRoomId(0), count)];
    }

    let quotas: Vec<f64> = subrooms
        .iter()
        .map(|s| count as f64 * s.area() / total)
        .collect();
    let mut allocation: Vec<usize> = quotas.iter().map(|q| q.floor() as usize).collect();
    let assigned: usize = allocation.iter().sum();

    let mut order: Vec<usize> = (0..subrooms.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = quotas[a] - quotas[a].floor();
        let fb = quotas[b] - quotas[b].floor();
        fb.total_cmp(&fa)
    });
    for &i in order.iter().take(count - assigned) {
        allocation[i] += 1;
    }

    allocation
        .into_iter()
        .enumerate()
        .map(|(i, n)| (SubRoomId(i), n))
        .collect()
}

/// A source that emits agents at a rate until its cap or the end of the
/// simulation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentSource {
    pub id: i32,
    pub room: i32,
    #[serde(default)]
    pub subroom: Option<i32>,
    /// Agents per second.
    pub frequency: f64,
    #[serde(default)]
    pub max_agents: Option<u64>,
    #[serde(default)]
    pub group: i32,
    #[serde(default)]
    pub goal: Option<i32>,
    #[serde(default)]
    pub params: AgentParameters,
}

pub struct AgentSourcesManager {
    sources: Vec<(AgentSource, u64)>,
    max_sim_time: f64,
    rng: fastrand::Rng,
}

impl AgentSourcesManager {
    pub fn new(sources: Vec<AgentSource>, max_sim_time: f64, seed: u64) -> Self {
        AgentSourcesManager {
            sources: sources.into_iter().map(|s| (s, 0)).collect(),
            max_sim_time,
            rng: fastrand::Rng::with_seed(seed ^ 0x5f5f),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// All sources have reached their cap (uncapped sources only finish
    /// with the simulation clock).
    pub fn is_completed(&self, t: f64) -> bool {
        t > self.max_sim_time
            || self
                .sources
                .iter()
                .all(|(src, generated)| src.max_agents.is_some_and(|max| *generated >= max))
    }

    pub fn total_cap(&self) -> u64 {
        self.sources
            .iter()
            .filter_map(|(s, _)| s.max_agents)
            .sum()
    }

    /// Emit this step's agents from all sources.
    pub fn process_all(
        &mut self,
        t: f64,
        dt: f64,
        building: &Building,
        seed: u64,
        next_agent_id: &mut u64,
    ) -> Vec<Pedestrian> {
        if t > self.max_sim_time {
            return Vec::new();
        }

        let mut agents = Vec::new();
        for (source, generated) in &mut self.sources {
            let mut n = util::poisson(source.frequency * dt, &mut self.rng) as u64;
            if let Some(max) = source.max_agents {
                n = n.min(max.saturating_sub(*generated));
            }
            if n == 0 {
                continue;
            }

            let Ok(room) = room_handle(building, source.room) else {
                warn!("source {}: undefined room {}", source.id, source.room);
                continue;
            };
            let subrooms = &building.room(room).subrooms;
            let si = source
                .subroom
                .and_then(|id| subrooms.iter().position(|s| s.id == id))
                .unwrap_or(0);
            let sub = building.subroom(room, SubRoomId(si));

            for _ in 0..n {
                let Some(pos) = sample_position(sub, source.params.b_max.0, &mut self.rng) else {
                    warn!("source {}: no free position found", source.id);
                    break;
                };
                let id = *next_agent_id;
                *next_agent_id += 1;
                let mut ped = Pedestrian::new(id, pos, &source.params, seed);
                ped.group = source.group;
                ped.room = room;
                ped.subroom = SubRoomId(si);
                ped.final_goal = source.goal.map(GoalId);
                agents.push(ped);
                *generated += 1;
            }
        }
        agents
    }
}

/// Rejection-sample a position inside the subroom with a wall buffer.
fn sample_position(sub: &SubRoom, buffer: f64, rng: &mut fastrand::Rng) -> Option<DVec2> {
    let (min, max) = sub.bounding_box();
    for _ in 0..100 {
        let p = DVec2::new(
            min.x + rng.f64() * (max.x - min.x),
            min.y + rng.f64() * (max.y - min.y),
        );
        if sub.contains(p) && clear_of_boundary(sub, p, buffer) {
            return Some(p);
        }
    }
    None
}
