use pedflow_kernel::scenario::Scenario;
use pedflow_kernel::{Simulator, SimulatorOptions};

/// An upward escalator between two halls: the router must never offer the
/// top-to-bottom direction.
#[test]
fn directional_escalator_is_one_way() {
    let scenario: Scenario = toml::from_str(
        r#"
        [[rooms]]
        id = 0
        [[rooms.subrooms]]
        id = 0
        polygon = [[0.0, 0.0], [4.0, 0.0], [4.0, 2.0], [0.0, 2.0]]

        [[rooms.subrooms]]
        id = 1
        class = "escalator_up"
        polygon = [[4.0, 0.0], [8.0, 0.0], [8.0, 2.0], [4.0, 2.0]]
        up = [8.0, 1.0]
        down = [4.0, 1.0]
        speed = 0.5
        plane = [0.5, 0.0, -2.0]

        [[rooms.subrooms]]
        id = 2
        polygon = [[8.0, 0.0], [12.0, 0.0], [12.0, 2.0], [8.0, 2.0]]
        plane = [0.0, 0.0, 2.0]

        # D_bottom
        [[crossings]]
        id = 1
        room = 0
        subroom1 = 0
        subroom2 = 1
        p1 = [4.0, 0.5]
        p2 = [4.0, 1.5]

        # D_top
        [[crossings]]
        id = 2
        room = 0
        subroom1 = 1
        subroom2 = 2
        p1 = [8.0, 0.5]
        p2 = [8.0, 1.5]

        [[transitions]]
        id = 3
        room1 = 0
        subroom1 = 2
        p1 = [12.0, 0.5]
        p2 = [12.0, 1.5]
        "#,
    )
    .unwrap();

    let sim = Simulator::new(scenario, SimulatorOptions::default()).unwrap();

    let bottom = sim.building.crossing_by_id(1).unwrap().uid();
    let top = sim.building.crossing_by_id(2).unwrap().uid();
    let exit = sim.building.transition_by_id(3).unwrap().uid();

    // riding up is allowed, riding down is not
    assert!(sim.router.distance(bottom, top).is_finite());
    assert!(sim.router.distance(top, bottom).is_infinite());

    // the path from the bottom hall to the exit goes over the escalator
    let via = sim.router.distance(bottom, exit);
    assert!(via.is_finite());
    assert!(via >= 8.0 - 1.0);
}

/// A downward escalator flips the forbidden direction.
#[test]
fn downward_escalator_forbids_the_climb() {
    let scenario: Scenario = toml::from_str(
        r#"
        [[rooms]]
        id = 0
        [[rooms.subrooms]]
        id = 0
        polygon = [[0.0, 0.0], [4.0, 0.0], [4.0, 2.0], [0.0, 2.0]]

        [[rooms.subrooms]]
        id = 1
        class = "escalator_down"
        polygon = [[4.0, 0.0], [8.0, 0.0], [8.0, 2.0], [4.0, 2.0]]
        up = [4.0, 1.0]
        down = [8.0, 1.0]

        [[rooms.subrooms]]
        id = 2
        polygon = [[8.0, 0.0], [12.0, 0.0], [12.0, 2.0], [8.0, 2.0]]

        [[crossings]]
        id = 1
        room = 0
        subroom1 = 0
        subroom2 = 1
        p1 = [4.0, 0.5]
        p2 = [4.0, 1.5]

        [[crossings]]
        id = 2
        room = 0
        subroom1 = 1
        subroom2 = 2
        p1 = [8.0, 0.5]
        p2 = [8.0, 1.5]

        [[transitions]]
        id = 3
        room1 = 0
        subroom1 = 2
        p1 = [12.0, 0.5]
        p2 = [12.0, 1.5]
        "#,
    )
    .unwrap();

    let sim = Simulator::new(scenario, SimulatorOptions::default()).unwrap();

    // here the "up" end is at the id=1 crossing, so the forbidden direction
    // is bottom-to-top of the belt: from the down end to the up end
    let up_door = sim.building.crossing_by_id(1).unwrap().uid();
    let down_door = sim.building.crossing_by_id(2).unwrap().uid();

    assert!(sim.router.distance(up_door, down_door).is_finite());
    assert!(sim.router.distance(down_door, up_door).is_infinite());
}
