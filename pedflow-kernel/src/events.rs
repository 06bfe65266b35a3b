use log::{info, warn};

use crate::distributor::{distribute_spec, StartDistribution};
use crate::geometry::Building;
use crate::pedestrian::Pedestrian;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorAction {
    Open,
    Close,
    TempClose,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainAction {
    Arrive,
    Depart,
}

/// A timed change to the world: door state, train overlay, or agent
/// creation.
#[derive(Debug, Clone)]
pub enum Event {
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

impl Event {
    pub fn time(&self) -> f64 {
        match self {
            Event::Door { time, .. }
            | Event::Train { time, .. }
            | Event::CreatePedestrians { time, .. } => *time,
        }
    }
}

/// Time-ordered event queue; events with equal timestamps keep their
/// insertion order. Each event is consumed at most once.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<Event>,
    cursor: usize,
}

impl EventQueue {
    pub fn new(mut events: Vec<Event>) -> Self {
        events.sort_by(|a, b| a.time().total_cmp(&b.time()));
        EventQueue { events, cursor: 0 }
    }

    pub fn pending(&self) -> usize {
        self.events.len() - self.cursor
    }

    pub fn list_events(&self) {
        for event in &self.events {
            info!("event: {event:?}");
        }
    }

    /// Consume and apply all events with `time <= t`.
    ///
    /// Returns whether the door graph is now stale, plus agents created by
    /// create-pedestrian events.
    pub fn process_due(
        &mut self,
        t: f64,
        building: &mut Building,
        seed: u64,
        next_agent_id: &mut u64,
    ) -> (bool, Vec<Pedestrian>) {
        let mut stale = false;
        let mut created = Vec::new();

        while self.cursor < self.events.len() && self.events[self.cursor].time() <= t {
            let event = self.events[self.cursor].clone();
            self.cursor += 1;
            match event {
                Event::Door {
                    door_id, action, ..
                } => {
                    stale |= apply_door_event(building, t, door_id, action);
                }
                Event::Train {
                    train_id,
                    track_id,
                    train_type,
                    action,
                    ..
                } => {
                    let result = match action {
                        TrainAction::Arrive => {
                            let r = building.train_arrive(train_id, track_id, &train_type);
                            if r.is_ok() {
                                apply_train_capacity(building, train_id, &train_type);
                            }
                            r
                        }
                        TrainAction::Depart => building.train_depart(train_id),
                    };
                    match result {
                        Ok(changed) => stale |= changed,
                        Err(e) => warn!("event: train {train_id}: {e}"),
                    }
                }
                Event::CreatePedestrians { spec, .. } => {
                    match distribute_spec(building, &spec, seed, next_agent_id) {
                        Ok(mut agents) => created.append(&mut agents),
                        Err(e) => warn!("event: create pedestrians: {e}"),
                    }
                }
            }
        }

        (stale, created)
    }
}

fn apply_door_event(building: &mut Building, t: f64, door_id: i32, action: DoorAction) -> bool {
    let Some(uid) = building.transition_uid_by_id(door_id) else {
        warn!("event: door {door_id}: unknown transition");
        return false;
    };
    let door = building.door_mut(uid).expect("uid from lookup");
    let before = door.state();
    match action {
        DoorAction::Open | DoorAction::Reset => door.open(t),
        DoorAction::Close => door.close(),
        DoorAction::TempClose => door.temp_close(t),
    }
    let changed = door.state() != before;
    if changed {
        info!("event: door {door_id} -> {:?} at t={t:.2}", door.state());
    }
    changed
}

/// Train doors admit at most the train's capacity, split over its doors.
fn apply_train_capacity(building: &mut Building, train_id: i32, train_type: &str) {
    let Some(tt) = building.train_type(train_type) else {
        return;
    };
    let max_agents = tt.max_agents;
    let uids = building.train_doors(train_id).to_vec();
    if uids.is_empty() {
        return;
    }
    let per_door = max_agents.div_ceil(uids.len() as u64);
    for uid in uids {
        if let Some(door) = building.door_mut(uid) {
            door.regulation.max_agents = Some(per_door);
            door.regulation.reopen_time = f64::MAX; // full is full until departure
        }
    }
}

/// Recurring schedule of a door group, expanded into plain door events.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Schedule {
    pub group_id: i32,
    pub doors: Vec<i32>,
    pub max_agents: Option<u64>,
    #[serde(default)]
    pub opening_times: Vec<f64>,
    #[serde(default)]
    pub closing_times: Vec<f64>,
}

pub fn expand_schedule(schedule: &Schedule) -> Vec<Event> {
    let mut events = Vec::new();
    for &door_id in &schedule.doors {
        for &t in &schedule.opening_times {
            events.push(Event::Door {
                time: t,
                door_id,
                action: DoorAction::Reset,
            });
        }
        for &t in &schedule.closing_times {
            events.push(Event::Door {
                time: t,
                door_id,
                action: DoorAction::TempClose,
            });
        }
    }
    events
}

/// One timetable row: a train serving a track, expanded into an arrive and
/// a depart event.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TrainTimetableEntry {
    pub train_id: i32,
    pub track_id: i32,
    pub train_type: String,
    pub arrival_time: f64,
    pub departure_time: f64,
}

pub fn expand_timetable(entry: &TrainTimetableEntry) -> Vec<Event> {
    vec![
        Event::Train {
            time: entry.arrival_time,
            train_id: entry.train_id,
            track_id: entry.track_id,
            train_type: entry.train_type.clone(),
            action: TrainAction::Arrive,
        },
        Event::Train {
            time: entry.departure_time,
            train_id: entry.train_id,
            track_id: entry.track_id,
            train_type: entry.train_type.clone(),
            action: TrainAction::Depart,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_orders_by_time_keeping_ties_stable() {
        let events = vec![
            Event::Door {
                time: 5.0,
                door_id: 1,
                action: DoorAction::Close,
            },
            Event::Door {
                time: 1.0,
                door_id: 2,
                action: DoorAction::Close,
            },
            Event::Door {
                time: 5.0,
                door_id: 3,
                action: DoorAction::Open,
            },
        ];
        let queue = EventQueue::new(events);
        let ids: Vec<i32> = queue
            .events
            .iter()
            .map(|e| match e {
                Event::Door { door_id, .. } => *door_id,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn schedule_expansion_covers_all_doors() {
        let schedule = Schedule {
            group_id: 0,
            doors: vec![1, 2],
            max_agents: Some(10),
            opening_times: vec![10.0, 30.0],
            closing_times: vec![20.0],
        };
        let events = expand_schedule(&schedule);
        assert_eq!(events.len(), 6);
        assert!(events
            .iter()
            .all(|e| matches!(e, Event::Door { .. })));
    }

    #[test]
    fn timetable_expands_to_arrival_and_departure() {
        let entry = TrainTimetableEntry {
            train_id: 1,
            track_id: 2,
            train_type: "TypeA".into(),
            arrival_time: 10.0,
            departure_time: 30.0,
        };
        let events = expand_timetable(&entry);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].time(), 10.0);
        assert_eq!(events[1].time(), 30.0);
    }
}
