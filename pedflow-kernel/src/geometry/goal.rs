use glam::DVec2;

use crate::error::{SimError, SimResult};
use crate::util;

use super::building::{RoomId, SubRoomId};
use super::line::{approx_eq, Line, UidAllocator};
use super::polygon;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GoalId(pub i32);

impl std::fmt::Display for GoalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Triggering policy of a waiting area. Exactly one applies.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitingPolicy {
    /// Open while fewer than `max_peds` are inside, closed while at least
    /// `max_peds` are inside. Agents are released once `waiting_time` has
    /// elapsed after the count first reached `min_peds`.
    Occupancy {
        min_peds: usize,
        max_peds: usize,
        waiting_time: f64,
    },
    /// Mirror the temp-close state of a specific transition.
    TransitionMirror { transition_id: i32 },
    /// Release at an absolute simulation time.
    GlobalTimer { waiting_time: f64 },
}

/// Waiting-area extension of a [`Goal`].
#[derive(Debug, Clone)]
pub struct WaitingArea {
    pub policy: WaitingPolicy,
    /// Successor goals with probabilities summing to 1.
    pub successors: Vec<(GoalId, f64)>,
    /// Virtual crossing at the area's centre, used as routing target while
    /// the agent is inside the area's room.
    pub centre_crossing: Line,
    pub open: bool,
    /// Time the inside-count first reached `min_peds` (occupancy policy).
    pub min_reached_at: Option<f64>,
    /// Inside-count of the last goal-manager pass.
    pub inside_count: usize,
}

impl WaitingArea {
    pub fn new(
        policy: WaitingPolicy,
        successors: Vec<(GoalId, f64)>,
        centre: DVec2,
        uids: &mut UidAllocator,
    ) -> SimResult<Self> {
        let sum: f64 = successors.iter().map(|(_, p)| p).sum();
        if !successors.is_empty() && (sum - 1.0).abs() > 1e-5 {
            return Err(SimError::geometry(
                "waiting area",
                format!("successor probabilities sum to {sum}, expected 1"),
            ));
        }
        // a degenerate horizontal segment through the centre; only its centre
        // and UID matter to the router
        let half = DVec2::new(0.1, 0.0);
        Ok(WaitingArea {
            policy,
            successors,
            centre_crossing: Line::new(centre - half, centre + half, uids),
            open: true,
            min_reached_at: None,
            inside_count: 0,
        })
    }

    /// Draw a successor goal from the distribution.
    pub fn sample_successor(&self, rng: &mut fastrand::Rng) -> Option<GoalId> {
        if self.successors.is_empty() {
            return None;
        }
        let x = rng.f64();
        let mut acc = 0.0;
        for (goal, p) in &self.successors {
            acc += p;
            if x < acc {
                return Some(*goal);
            }
        }
        self.successors.last().map(|(goal, _)| *goal)
    }
}

/// Polygonal target region with an id, caption, and final/intermediate flag.
#[derive(Debug, Clone)]
pub struct Goal {
    pub id: GoalId,
    pub caption: String,
    pub is_final: bool,
    polygon: Vec<DVec2>,
    /// Home room/subroom; set for waiting areas, optional for outside goals.
    pub room: Option<RoomId>,
    pub subroom: Option<SubRoomId>,
    pub waiting: Option<WaitingArea>,
}

impl Goal {
    /// Build a goal from its boundary vertices.
    ///
    /// Validates that the boundary is a closed ring of positive area and
    /// reorders it counter-clockwise.
    pub fn new(id: GoalId, caption: String, is_final: bool, vertices: Vec<DVec2>) -> SimResult<Self> {
        let mut ring = vertices;
        if ring.len() >= 2 && approx_eq(ring[0], *ring.last().unwrap()) {
            ring.pop();
        }
        if ring.len() < 3 || polygon::signed_area(&ring).abs() < 1e-9 {
            return Err(SimError::geometry(
                format!("goal {id}"),
                "boundary polygon is not closed",
            ));
        }
        if !polygon::is_ccw(&ring) {
            ring.reverse();
        }
        Ok(Goal {
            id,
            caption,
            is_final,
            polygon: ring,
            room: None,
            subroom: None,
            waiting: None,
        })
    }

    pub fn polygon(&self) -> &[DVec2] {
        &self.polygon
    }

    pub fn contains(&self, p: DVec2) -> bool {
        polygon::point_in_polygon(&self.polygon, p)
    }

    pub fn centroid(&self) -> DVec2 {
        polygon::centroid(&self.polygon)
    }

    /// Distance from `p` to the goal boundary, 0 inside.
    pub fn distance(&self, p: DVec2) -> f64 {
        if self.contains(p) {
            return 0.0;
        }
        let n = self.polygon.len();
        (0..n)
            .map(|i| {
                let seg = [self.polygon[i], self.polygon[(i + 1) % n]];
                util::distance_from_line(p, seg).length()
            })
            .fold(f64::MAX, f64::min)
    }

    pub fn is_waiting_area(&self) -> bool {
        self.waiting.is_some()
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec2;

    use super::*;

    fn square(id: i32) -> Goal {
        Goal::new(
            GoalId(id),
            "g".into(),
            true,
            vec![
                dvec2(0.0, 0.0),
                dvec2(2.0, 0.0),
                dvec2(2.0, 2.0),
                dvec2(0.0, 2.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn rejects_degenerate_ring() {
        let err = Goal::new(
            GoalId(0),
            String::new(),
            true,
            vec![dvec2(0.0, 0.0), dvec2(1.0, 0.0), dvec2(2.0, 0.0)],
        );
        assert!(err.is_err());
    }

    #[test]
    fn reorders_clockwise_input() {
        let goal = Goal::new(
            GoalId(0),
            String::new(),
            true,
            vec![
                dvec2(0.0, 2.0),
                dvec2(2.0, 2.0),
                dvec2(2.0, 0.0),
                dvec2(0.0, 0.0),
            ],
        )
        .unwrap();
        assert!(crate::geometry::is_ccw(goal.polygon()));
    }

    #[test]
    fn distance_is_zero_inside() {
        let goal = square(0);
        assert_eq!(goal.distance(dvec2(1.0, 1.0)), 0.0);
        assert!((goal.distance(dvec2(3.0, 1.0)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn successor_sum_is_validated() {
        let mut uids = UidAllocator::new();
        let bad = WaitingArea::new(
            WaitingPolicy::GlobalTimer { waiting_time: 5.0 },
            vec![(GoalId(1), 0.5), (GoalId(2), 0.4)],
            dvec2(0.0, 0.0),
            &mut uids,
        );
        assert!(bad.is_err());

        let ok = WaitingArea::new(
            WaitingPolicy::GlobalTimer { waiting_time: 5.0 },
            vec![(GoalId(1), 0.5), (GoalId(2), 0.5)],
            dvec2(0.0, 0.0),
            &mut uids,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn successor_sampling_follows_distribution() {
        let mut uids = UidAllocator::new();
        let wa = WaitingArea::new(
            WaitingPolicy::GlobalTimer { waiting_time: 5.0 },
            vec![(GoalId(1), 0.25), (GoalId(2), 0.75)],
            dvec2(0.0, 0.0),
            &mut uids,
        )
        .unwrap();

        let mut rng = fastrand::Rng::with_seed(42);
        let n = 40_000;
        let hits = (0..n)
            .filter(|_| wa.sample_successor(&mut rng) == Some(GoalId(2)))
            .count();
        let freq = hits as f64 / n as f64;
        assert!((freq - 0.75).abs() < 0.01, "freq was {freq}");
    }
}
