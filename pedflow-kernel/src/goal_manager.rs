use log::info;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::geometry::{Building, GoalId, WaitingPolicy};
use crate::pedestrian::Pedestrian;

/// Runs after the location update each step: counts agents inside each
/// waiting area, applies the triggering policies, and moves agents in and
/// out of the waiting state.
///
/// Returns true when any waiting area changed its open state, which makes
/// the door graph stale.
pub fn update(building: &mut Building, agents: &mut [Pedestrian], time: f64) -> bool {
    let mut counts: FxHashMap<GoalId, usize> = FxHashMap::default();
    for goal in building.goals() {
        if goal.is_waiting_area() {
            let inside = agents.iter().filter(|p| goal.contains(p.pos)).count();
            counts.insert(goal.id, inside);
        }
    }

    // temp-close states of mirrored transitions, gathered before goals are
    // borrowed mutably
    let mirrored: FxHashMap<i32, bool> = building
        .goals()
        .iter()
        .filter_map(|g| g.waiting.as_ref())
        .filter_map(|wa| match wa.policy {
            WaitingPolicy::TransitionMirror { transition_id } => Some(transition_id),
            _ => None,
        })
        .map(|id| {
            let temp_closed = building
                .transition_by_id(id)
                .is_some_and(|d| d.is_temp_closed());
            (id, temp_closed)
        })
        .collect();

    let mut stale = false;
    let mut released: FxHashSet<GoalId> = FxHashSet::default();

    for goal in building.goals_mut() {
        let id = goal.id;
        let Some(wa) = goal.waiting.as_mut() else {
            continue;
        };
        let inside = counts.get(&id).copied().unwrap_or(0);
        wa.inside_count = inside;

        let (open, release) = match wa.policy {
            WaitingPolicy::Occupancy {
                min_peds,
                max_peds,
                waiting_time,
            } => {
                if inside >= min_peds && wa.min_reached_at.is_none() {
                    wa.min_reached_at = Some(time);
                }
                let release = wa
                    .min_reached_at
                    .is_some_and(|t0| inside >= min_peds && time >= t0 + waiting_time);
                (inside < max_peds, release)
            }
            WaitingPolicy::TransitionMirror { transition_id } => {
                let temp_closed = mirrored.get(&transition_id).copied().unwrap_or(false);
                (!temp_closed, !temp_closed)
            }
            WaitingPolicy::GlobalTimer { waiting_time } => (true, time >= waiting_time),
        };

        if open != wa.open {
            wa.open = open;
            stale = true;
            info!(
                "waiting area {id}: now {} ({inside} inside)",
                if open { "open" } else { "closed" }
            );
        }
        if release {
            released.insert(id);
        }
    }

    for ped in agents.iter_mut() {
        let Some(goal_id) = ped.final_goal else {
            continue;
        };
        let Some(goal) = building.goal(goal_id) else {
            continue;
        };
        let Some(wa) = &goal.waiting else {
            continue;
        };

        let inside = goal.contains(ped.pos);
        if inside && !ped.is_waiting() {
            ped.start_waiting(time);
        }

        if ped.is_waiting() && (released.contains(&goal_id) || !inside) {
            if released.contains(&goal_id) {
                if let Some(next) = wa.sample_successor(&mut ped.rng) {
                    ped.final_goal = Some(next);
                }
            }
            ped.end_waiting();
        }
    }

    stale
}

#[cfg(test)]
mod tests {
    use glam::dvec2;

    use crate::geometry::{Goal, GoalId, Room, SubRoom, SubRoomKind, UidAllocator, WaitingArea};
    use crate::pedestrian::{AgentParameters, Pedestrian};

    use super::*;

    fn building_with_wa(policy: WaitingPolicy, successors: Vec<(GoalId, f64)>) -> Building {
        let mut building = Building::new();
        building.add_room(Room {
            id: 0,
            caption: String::new(),
            zpos: 0.0,
            subrooms: vec![SubRoom {
                id: 0,
                polygon: vec![
                    dvec2(0.0, 0.0),
                    dvec2(10.0, 0.0),
                    dvec2(10.0, 10.0),
                    dvec2(0.0, 10.0),
                ],
                walls: vec![],
                obstacles: vec![],
                door_uids: vec![],
                plane: [0.0; 3],
                kind: SubRoomKind::Normal,
                inside_point: Some(dvec2(5.0, 5.0)),
            }],
        });

        let mut goal = Goal::new(
            GoalId(1),
            "wa".into(),
            false,
            vec![
                dvec2(2.0, 2.0),
                dvec2(6.0, 2.0),
                dvec2(6.0, 6.0),
                dvec2(2.0, 6.0),
            ],
        )
        .unwrap();
        let mut uids = UidAllocator::new();
        goal.waiting =
            Some(WaitingArea::new(policy, successors, goal.centroid(), &mut uids).unwrap());
        building.add_goal(goal);

        let successor = Goal::new(
            GoalId(2),
            "next".into(),
            true,
            vec![
                dvec2(8.0, 8.0),
                dvec2(9.0, 8.0),
                dvec2(9.0, 9.0),
                dvec2(8.0, 9.0),
            ],
        )
        .unwrap();
        building.add_goal(successor);
        building
    }

    fn agents_inside(n: usize) -> Vec<Pedestrian> {
        (0..n)
            .map(|i| {
                let mut p = Pedestrian::new(
                    i as u64,
                    dvec2(3.0 + 0.1 * i as f64, 3.0),
                    &AgentParameters::default(),
                    99,
                );
                p.final_goal = Some(GoalId(1));
                p
            })
            .collect()
    }

    #[test]
    fn occupancy_release_after_min_and_time() {
        let mut building = building_with_wa(
            WaitingPolicy::Occupancy {
                min_peds: 5,
                max_peds: 10,
                waiting_time: 15.0,
            },
            vec![(GoalId(2), 1.0)],
        );
        let mut agents = agents_inside(8);

        update(&mut building, &mut agents, 5.0);
        assert!(agents.iter().all(|p| p.is_waiting()));

        // before the waiting time elapsed, nobody is released
        update(&mut building, &mut agents, 19.0);
        assert!(agents.iter().all(|p| p.is_waiting()));

        update(&mut building, &mut agents, 20.0);
        assert!(agents.iter().all(|p| !p.is_waiting()));
        assert!(agents.iter().all(|p| p.final_goal == Some(GoalId(2))));
    }

    #[test]
    fn occupancy_closes_when_full() {
        let mut building = building_with_wa(
            WaitingPolicy::Occupancy {
                min_peds: 1,
                max_peds: 3,
                waiting_time: 100.0,
            },
            vec![(GoalId(2), 1.0)],
        );
        let mut agents = agents_inside(4);
        let stale = update(&mut building, &mut agents, 1.0);
        assert!(stale);
        let wa = building.goal(GoalId(1)).unwrap().waiting.as_ref().unwrap();
        assert!(!wa.open);
        assert_eq!(wa.inside_count, 4);
    }

    #[test]
    fn global_timer_releases_at_absolute_time() {
        let mut building = building_with_wa(
            WaitingPolicy::GlobalTimer { waiting_time: 30.0 },
            vec![(GoalId(2), 1.0)],
        );
        let mut agents = agents_inside(2);

        update(&mut building, &mut agents, 10.0);
        assert!(agents.iter().all(|p| p.is_waiting()));
        update(&mut building, &mut agents, 30.0);
        assert!(agents.iter().all(|p| !p.is_waiting()));
    }

    #[test]
    fn leaving_the_polygon_ends_waiting() {
        let mut building = building_with_wa(
            WaitingPolicy::GlobalTimer { waiting_time: 1000.0 },
            vec![(GoalId(2), 1.0)],
        );
        let mut agents = agents_inside(1);
        update(&mut building, &mut agents, 1.0);
        assert!(agents[0].is_waiting());

        agents[0].pos = dvec2(9.0, 9.0);
        update(&mut building, &mut agents, 2.0);
        assert!(!agents[0].is_waiting());
        // walked out on its own, goal unchanged
        assert_eq!(agents[0].final_goal, Some(GoalId(1)));
    }
}
