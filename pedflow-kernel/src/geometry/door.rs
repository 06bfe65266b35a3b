use super::building::{RoomId, SubRoomId};
use super::line::Line;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
    Open,
    Closed,
    TempClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorKind {
    /// Joins two subrooms of the same room.
    Crossing,
    /// Joins subrooms of possibly different rooms, or a subroom and the
    /// outside (`exit == true`).
    Transition { exit: bool },
}

/// Outflow policy of a door. All limits are optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowRegulation {
    /// Maximum mean outflow in agents per second.
    pub max_flow: Option<f64>,
    /// Maximum number of agents per open interval.
    pub max_agents: Option<u64>,
    /// Minimum time a temp-closed door stays closed.
    pub reopen_time: f64,
}

/// A crossing or transition: a line segment agents pass through, carrying a
/// door state, an optional outflow policy and usage counters.
#[derive(Debug, Clone)]
pub struct Door {
    pub id: i32,
    pub caption: String,
    pub line: Line,
    pub kind: DoorKind,
    state: DoorState,
    /// Adjoining subrooms. Exits have one side only.
    pub sides: [Option<(RoomId, SubRoomId)>; 2],
    pub regulation: FlowRegulation,

    usage: u64,
    last_passing: Option<f64>,
    /// (time, cumulative count, agent id) per passing, for flow statistics.
    flow_curve: Vec<(f64, u64, u64)>,
    passed_since_open: u64,
    open_since: f64,
    closed_at: Option<f64>,
}

impl Door {
    pub fn new(id: i32, caption: String, line: Line, kind: DoorKind) -> Self {
        Door {
            id,
            caption,
            line,
            kind,
            state: DoorState::Open,
            sides: [None, None],
            regulation: FlowRegulation::default(),
            usage: 0,
            last_passing: None,
            flow_curve: Vec::new(),
            passed_since_open: 0,
            open_since: 0.0,
            closed_at: None,
        }
    }

    pub fn uid(&self) -> super::line::Uid {
        self.line.uid()
    }

    pub fn state(&self) -> DoorState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == DoorState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state == DoorState::Closed
    }

    pub fn is_temp_closed(&self) -> bool {
        self.state == DoorState::TempClosed
    }

    /// Open or temp-closed doors still participate in routing.
    pub fn is_passable_for_routing(&self) -> bool {
        self.state != DoorState::Closed
    }

    pub fn is_exit(&self) -> bool {
        matches!(self.kind, DoorKind::Transition { exit: true })
    }

    pub fn is_transition(&self) -> bool {
        matches!(self.kind, DoorKind::Transition { .. })
    }

    pub fn open(&mut self, time: f64) {
        if self.state != DoorState::Open {
            self.state = DoorState::Open;
            self.open_since = time;
            self.passed_since_open = 0;
            self.closed_at = None;
        }
    }

    pub fn close(&mut self) {
        self.state = DoorState::Closed;
    }

    pub fn temp_close(&mut self, time: f64) {
        if self.state != DoorState::TempClosed {
            self.state = DoorState::TempClosed;
            self.closed_at = Some(time);
        }
    }

    pub fn usage(&self) -> u64 {
        self.usage
    }

    pub fn last_passing_time(&self) -> Option<f64> {
        self.last_passing
    }

    pub fn flow_curve(&self) -> &[(f64, u64, u64)] {
        &self.flow_curve
    }

    pub fn is_in(&self, room: RoomId) -> bool {
        self.sides.iter().flatten().any(|(r, _)| *r == room)
    }

    pub fn is_in_subroom(&self, room: RoomId, subroom: SubRoomId) -> bool {
        self.sides
            .iter()
            .flatten()
            .any(|(r, s)| *r == room && *s == subroom)
    }

    /// Record one agent passing. Usage is monotonic, last-passing
    /// non-decreasing.
    pub fn register_passing(&mut self, time: f64, agent: u64) {
        self.usage += 1;
        self.passed_since_open += 1;
        self.last_passing = Some(self.last_passing.map_or(time, |t: f64| t.max(time)));
        self.flow_curve.push((time, self.usage, agent));
    }

    /// Apply the outflow policy at time `t`. Returns true if the door state
    /// changed (which makes the door graph stale).
    pub fn update_regulation(&mut self, t: f64) -> bool {
        match self.state {
            DoorState::Closed => false,
            DoorState::Open => {
                let over_count = self
                    .regulation
                    .max_agents
                    .is_some_and(|max| self.passed_since_open >= max);
                let over_rate = self.regulation.max_flow.is_some_and(|rate| {
                    let open_for = t - self.open_since;
                    open_for > 0.0 && self.passed_since_open as f64 / open_for > rate
                });
                if over_count || over_rate {
                    self.temp_close(t);
                    true
                } else {
                    false
                }
            }
            DoorState::TempClosed => {
                let Some(closed_at) = self.closed_at else {
                    return false;
                };
                if t - closed_at >= self.regulation.reopen_time {
                    self.open(t);
                    true
                } else {
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec2;

    use crate::geometry::{Line, Uid};

    use super::*;

    fn door_with(regulation: FlowRegulation) -> Door {
        let line = Line::with_uid(dvec2(0.0, 0.0), dvec2(1.0, 0.0), Uid(1));
        let mut door = Door::new(1, "d".into(), line, DoorKind::Transition { exit: true });
        door.regulation = regulation;
        door
    }

    #[test]
    fn usage_is_monotonic() {
        let mut door = door_with(FlowRegulation::default());
        door.register_passing(1.0, 10);
        door.register_passing(0.5, 11); // out-of-order timestamp
        assert_eq!(door.usage(), 2);
        assert_eq!(door.last_passing_time(), Some(1.0));
        // the flow curve keeps the raw passing order
        assert_eq!(door.flow_curve(), &[(1.0, 1, 10), (0.5, 2, 11)]);
    }

    #[test]
    fn max_agents_temp_closes_and_reopens() {
        let mut door = door_with(FlowRegulation {
            max_agents: Some(2),
            reopen_time: 5.0,
            ..Default::default()
        });

        door.register_passing(1.0, 0);
        assert!(!door.update_regulation(1.0));
        door.register_passing(2.0, 1);
        assert!(door.update_regulation(2.0));
        assert!(door.is_temp_closed());

        // stays closed before the reopen interval elapsed
        assert!(!door.update_regulation(4.0));
        assert!(door.is_temp_closed());

        assert!(door.update_regulation(7.0));
        assert!(door.is_open());
        // window counter reset, usage kept
        assert_eq!(door.usage(), 2);
        door.register_passing(8.0, 2);
        assert!(!door.update_regulation(8.0));
    }

    #[test]
    fn rate_limit_temp_closes() {
        let mut door = door_with(FlowRegulation {
            max_flow: Some(1.0),
            reopen_time: 1.0,
            ..Default::default()
        });
        door.register_passing(0.2, 0);
        door.register_passing(0.3, 1);
        door.register_passing(0.4, 2);
        assert!(door.update_regulation(0.5));
        assert!(door.is_temp_closed());
    }
}
