use fastrand_contrib::RngExt;
use glam::DVec2;

use crate::geometry::{GoalId, Line, RoomId, SubRoomId, SubRoomKind, Uid};

pub type AgentId = u64;

/// Projected body ellipse of an agent.
#[derive(Debug, Clone, Copy)]
pub struct Ellipse {
    pub a_min: f64,
    pub a_tau: f64,
    pub b_min: f64,
    pub b_max: f64,
}

/// Normal distributions `(mean, sigma)` for per-agent parameters, shared by
/// one distribution spec or agent source.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AgentParameters {
    pub v0: (f64, f64),
    pub v0_up_stairs: (f64, f64),
    pub v0_down_stairs: (f64, f64),
    pub a_min: (f64, f64),
    pub a_tau: (f64, f64),
    pub b_min: (f64, f64),
    pub b_max: (f64, f64),
    pub tau: (f64, f64),
    pub premovement: (f64, f64),
}

impl Default for AgentParameters {
    fn default() -> Self {
        AgentParameters {
            v0: (1.34, 0.26),
            v0_up_stairs: (0.668, 0.04),
            v0_down_stairs: (0.750, 0.04),
            a_min: (0.18, 0.001),
            a_tau: (0.53, 0.001),
            b_min: (0.20, 0.001),
            b_max: (0.25, 0.001),
            tau: (0.5, 0.001),
            premovement: (0.0, 0.0),
        }
    }
}

fn sample(rng: &mut fastrand::Rng, (mean, sigma): (f64, f64)) -> f64 {
    if sigma <= 0.0 {
        mean
    } else {
        rng.f64_normal_approx(mean, sigma)
    }
}

/// One simulated agent.
#[derive(Debug, Clone)]
pub struct Pedestrian {
    pub id: AgentId,
    pub group: i32,
    pub pos: DVec2,
    /// Position at the start of the current step, for door-crossing tests.
    pub prev_pos: DVec2,
    pub vel: DVec2,
    pub ellipse: Ellipse,
    pub v0: f64,
    pub v0_up_stairs: f64,
    pub v0_down_stairs: f64,
    pub tau: f64,
    pub premovement: f64,
    pub room: RoomId,
    pub subroom: SubRoomId,
    pub destination: Option<Uid>,
    pub exit_line: Option<Line>,
    pub final_goal: Option<GoalId>,
    /// Steering direction for this step, set before the model runs.
    pub desired_dir: DVec2,
    waiting_since: Option<f64>,
    /// Per-agent deterministic RNG for waiting targets and successor
    /// sampling.
    pub rng: fastrand::Rng,
}

impl Pedestrian {
    pub fn new(id: AgentId, pos: DVec2, params: &AgentParameters, seed: u64) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ id);
        let ellipse = Ellipse {
            a_min: sample(&mut rng, params.a_min),
            a_tau: sample(&mut rng, params.a_tau),
            b_min: sample(&mut rng, params.b_min),
            b_max: sample(&mut rng, params.b_max),
        };
        Pedestrian {
            id,
            group: 0,
            pos,
            prev_pos: pos,
            vel: DVec2::ZERO,
            ellipse,
            v0: sample(&mut rng, params.v0).max(0.1),
            v0_up_stairs: sample(&mut rng, params.v0_up_stairs).max(0.1),
            v0_down_stairs: sample(&mut rng, params.v0_down_stairs).max(0.1),
            tau: sample(&mut rng, params.tau).max(0.05),
            premovement: sample(&mut rng, params.premovement).max(0.0),
            room: RoomId(0),
            subroom: SubRoomId(0),
            destination: None,
            exit_line: None,
            final_goal: None,
            desired_dir: DVec2::ZERO,
            waiting_since: None,
            rng,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting_since.is_some()
    }

    pub fn waiting_since(&self) -> Option<f64> {
        self.waiting_since
    }

    pub fn start_waiting(&mut self, time: f64) {
        if self.waiting_since.is_none() {
            self.waiting_since = Some(time);
        }
    }

    pub fn end_waiting(&mut self) {
        self.waiting_since = None;
    }

    /// Desired speed in the current subroom. On stairs the up/down variant
    /// applies, picked by the climb direction; escalators add their belt
    /// speed.
    pub fn desired_speed(&self, kind: &SubRoomKind) -> f64 {
        match kind {
            SubRoomKind::Normal => self.v0,
            SubRoomKind::Stair { up, down } => {
                if (*up - *down).dot(self.vel) >= 0.0 {
                    self.v0_up_stairs
                } else {
                    self.v0_down_stairs
                }
            }
            SubRoomKind::Escalator { up, down, speed, .. } => {
                let base = if (*up - *down).dot(self.vel) >= 0.0 {
                    self.v0_up_stairs
                } else {
                    self.v0_down_stairs
                };
                base + speed.abs()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec2;

    use super::*;

    #[test]
    fn sampling_is_deterministic_per_agent() {
        let params = AgentParameters::default();
        let a = Pedestrian::new(7, dvec2(0.0, 0.0), &params, 1234);
        let b = Pedestrian::new(7, dvec2(0.0, 0.0), &params, 1234);
        let c = Pedestrian::new(8, dvec2(0.0, 0.0), &params, 1234);
        assert_eq!(a.v0, b.v0);
        assert_ne!(a.v0, c.v0);
    }

    #[test]
    fn stair_speed_follows_climb_direction() {
        let params = AgentParameters::default();
        let mut ped = Pedestrian::new(0, dvec2(0.0, 0.0), &params, 1);
        let kind = SubRoomKind::Stair {
            up: dvec2(0.0, 10.0),
            down: dvec2(0.0, 0.0),
        };
        ped.vel = dvec2(0.0, 1.0);
        assert_eq!(ped.desired_speed(&kind), ped.v0_up_stairs);
        ped.vel = dvec2(0.0, -1.0);
        assert_eq!(ped.desired_speed(&kind), ped.v0_down_stairs);
    }

    #[test]
    fn waiting_entry_time_is_kept() {
        let params = AgentParameters::default();
        let mut ped = Pedestrian::new(0, dvec2(0.0, 0.0), &params, 1);
        ped.start_waiting(3.0);
        ped.start_waiting(9.0);
        assert_eq!(ped.waiting_since(), Some(3.0));
        ped.end_waiting();
        assert!(!ped.is_waiting());
    }
}
