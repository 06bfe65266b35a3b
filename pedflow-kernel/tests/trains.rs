use glam::dvec2;
use pedflow_kernel::scenario::Scenario;
use pedflow_kernel::{Simulator, SimulatorOptions};

fn platform_scenario() -> Scenario {
    toml::from_str(
        r#"
        [[rooms]]
        id = 0
        caption = "platform"
        [[rooms.subrooms]]
        id = 0
        polygon = [[0.0, 0.0], [20.0, 0.0], [20.0, 5.0], [0.0, 5.0]]
        walls = [
            { p1 = [0.0, 0.0], p2 = [20.0, 0.0], kind = "track", track_id = 1 },
            { p1 = [20.0, 0.0], p2 = [20.0, 5.0] },
            { p1 = [20.0, 5.0], p2 = [0.0, 5.0] },
            { p1 = [0.0, 5.0], p2 = [0.0, 0.0] },
        ]

        # service door, closed for the whole run; the platform has no other
        # way out until the train arrives
        [[transitions]]
        id = 9
        room1 = 0
        subroom1 = 0
        p1 = [20.0, 2.0]
        p2 = [20.0, 3.0]
        state = "close"

        [[tracks]]
        id = 1
        room = 0
        subroom = 0
        start = [0.0, 0.0]

        [[train_types]]
        name = "TypeA"
        max_agents = 50
        doors = [{ offset = 5.0, width = 1.4 }, { offset = 15.0, width = 1.4 }]

        [[train_timetable]]
        train_id = 1
        track_id = 1
        train_type = "TypeA"
        arrival_time = 10.0
        departure_time = 30.0

        [[distributions]]
        room = 0
        count = 6
        [distributions.params]
        b_max = [0.15, 0.0]
        a_min = [0.15, 0.0]
        "#,
    )
    .unwrap()
}

fn wall_fingerprint(sim: &Simulator) -> Vec<(i64, i64, i64, i64)> {
    let sub = sim
        .building
        .subroom(pedflow_kernel::geometry::RoomId(0), pedflow_kernel::geometry::SubRoomId(0));
    let mut walls: Vec<(i64, i64, i64, i64)> = sub
        .walls
        .iter()
        .map(|w| {
            let (a, b) = (w.line.point1(), w.line.point2());
            (
                (a.x * 1000.0).round() as i64,
                (a.y * 1000.0).round() as i64,
                (b.x * 1000.0).round() as i64,
                (b.y * 1000.0).round() as i64,
            )
        })
        .collect();
    walls.sort();
    walls
}

/// A train arrival carves its door openings out of the track wall, agents
/// route through the new doors, and departure restores the wall set.
#[test]
fn train_arrival_opens_track_doors() {
    let options = SimulatorOptions {
        t_max: 60.0,
        seed: 8091983,
        ..Default::default()
    };
    let mut sim = Simulator::new(platform_scenario(), options).unwrap();
    let walls_before = wall_fingerprint(&sim);

    // before the train there is no open door; agents hold their positions
    while sim.clock.elapsed_time() < 9.5 {
        sim.step().unwrap();
    }
    assert_eq!(sim.get_pedestrian_count(), 6);
    assert_eq!(wall_fingerprint(&sim), walls_before);

    // cross the arrival
    while sim.clock.elapsed_time() < 12.0 {
        sim.step().unwrap();
    }

    // the wall spans (4.3, 5.7) and (14.3, 15.7) are gone
    let walls_during = wall_fingerprint(&sim);
    assert_ne!(walls_during, walls_before);
    let sub = sim
        .building
        .subroom(pedflow_kernel::geometry::RoomId(0), pedflow_kernel::geometry::SubRoomId(0));
    for probe in [dvec2(5.0, 0.0), dvec2(15.0, 0.0)] {
        assert!(
            sub.walls.iter().all(|w| w.line.dist_to(probe) > 0.5),
            "track wall still covers the train door at {probe:?}"
        );
    }
    let train_doors = sim.building.train_doors(1).to_vec();
    assert_eq!(train_doors.len(), 2);

    // agents route to the train and board before departure
    while sim.clock.elapsed_time() < 29.0 && sim.get_pedestrian_count() > 0 {
        sim.step().unwrap();
    }
    assert_eq!(sim.get_pedestrian_count(), 0, "agents did not board in time");
    let boarded: u64 = train_doors
        .iter()
        .filter_map(|uid| sim.building.door(*uid))
        .map(|d| d.usage())
        .sum();
    assert_eq!(boarded, 6);

    // departure restores the wall set bit-exactly
    while sim.clock.elapsed_time() < 31.0 {
        sim.step().unwrap();
    }
    assert_eq!(wall_fingerprint(&sim), walls_before);
    assert!(sim.building.train_doors(1).is_empty());
}
