use std::io::{self, Write};

use crate::geometry::Building;
use crate::pedestrian::Pedestrian;

/// Streaming text trajectory writer: a header, then one record per agent
/// per emitted frame.
pub struct TrajectoryWriter<W: Write> {
    out: W,
    precision: usize,
}

impl<W: Write> TrajectoryWriter<W> {
    pub fn new(out: W) -> Self {
        TrajectoryWriter { out, precision: 2 }
    }

    pub fn with_precision(out: W, precision: usize) -> Self {
        TrajectoryWriter { out, precision }
    }

    pub fn write_header(&mut self, n_agents: usize, fps: f64, building: &Building) -> io::Result<()> {
        writeln!(self.out, "#framerate: {fps:.2}")?;
        writeln!(self.out, "#agents: {n_agents}")?;
        let (min, max) = building.bounding_box();
        writeln!(
            self.out,
            "#geometry: {} rooms, {} doors, bounds [{:.2}, {:.2}] x [{:.2}, {:.2}]",
            building.rooms().len(),
            building.doors().count(),
            min.x,
            max.x,
            min.y,
            max.y
        )?;
        writeln!(self.out, "#ID\tFR\tX\tY\tZ")
    }

    pub fn write_frame(
        &mut self,
        frame: u64,
        agents: &[Pedestrian],
        building: &Building,
    ) -> io::Result<()> {
        let p = self.precision;
        for ped in agents {
            let z = building.elevation(ped.room, ped.subroom, ped.pos);
            writeln!(
                self.out,
                "{}\t{}\t{:.p$}\t{:.p$}\t{:.p$}",
                ped.id, frame, ped.pos.x, ped.pos.y, z
            )?;
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec2;

    use crate::geometry::{Room, SubRoom, SubRoomKind};
    use crate::pedestrian::AgentParameters;

    use super::*;

    #[test]
    fn frames_carry_elevation() {
        let mut building = Building::new();
        building.add_room(Room {
            id: 0,
            caption: String::new(),
            zpos: 0.0,
            subrooms: vec![SubRoom {
                id: 0,
                polygon: vec![
                    dvec2(0.0, 0.0),
                    dvec2(4.0, 0.0),
                    dvec2(4.0, 4.0),
                    dvec2(0.0, 4.0),
                ],
                walls: vec![],
                obstacles: vec![],
                door_uids: vec![],
                plane: [0.0, 0.0, 2.5],
                kind: SubRoomKind::Normal,
                inside_point: Some(dvec2(1.0, 1.0)),
            }],
        });

        let agents = vec![Pedestrian::new(
            3,
            dvec2(1.0, 2.0),
            &AgentParameters::default(),
            1,
        )];

        let mut buf = Vec::new();
        let mut writer = TrajectoryWriter::new(&mut buf);
        writer.write_header(1, 8.0, &building).unwrap();
        writer.write_frame(0, &agents, &building).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("#framerate: 8.00"));
        assert!(text.contains("3\t0\t1.00\t2.00\t2.50"));
    }
}
