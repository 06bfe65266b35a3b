mod building;
mod door;
mod goal;
mod line;
mod obstacle;
mod polygon;
mod room;
mod track;

pub use building::{Building, RoomId, SubRoomId};
pub use door::{Door, DoorKind, DoorState, FlowRegulation};
pub use goal::{Goal, GoalId, WaitingArea, WaitingPolicy};
pub use line::{approx_eq, Line, LineIntersection, Uid, UidAllocator, Wall, WallType};
pub use line::{COORD_TOLERANCE, EPS, EPS_DIST, EPS_GOAL};
pub use obstacle::Obstacle;
pub use polygon::{bounding_box, centroid, is_ccw, point_in_polygon, signed_area};
pub use room::{Room, SubRoom, SubRoomKind};
pub use track::{Track, TrainDoor, TrainType};
