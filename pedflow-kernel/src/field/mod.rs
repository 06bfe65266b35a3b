pub mod grid;

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use geo::coord;
use geo_rasterize::BinaryBuilder;
use glam::DVec2;
use ndarray::Array2;
use ordered_float::NotNan;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use rustc_hash::FxHashMap;

use crate::error::{SimError, SimResult};
use crate::geometry::{Building, DoorKind, Line, RoomId, Uid};
use crate::util::Index;

use grid::RectGrid;

// Code-grid cell classes. Door cells carry the door UID (>= 0) instead.
pub const CODE_OUTSIDE: i32 = -1;
pub const CODE_INSIDE: i32 = -2;
pub const CODE_WALL: i32 = -3;
pub const CODE_CLOSED_CROSSING: i32 = -4;
pub const CODE_CLOSED_TRANSITION: i32 = -5;

/// Cost-grid sentinel for cells not yet reached by the marcher.
const UNKNOWN_COST: f64 = -1.0;

/// How a destination is stamped onto the cost grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    /// Only the door's centre cell starts at zero. Used by the router,
    /// which wants centre-to-centre distances.
    CenterPoint,
    /// The whole (slightly shortened) door segment starts at zero. Used by
    /// the direction strategies.
    LineSegment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedMode {
    Homogeneous,
    /// Speed reduced near walls: `min(1, dist/wall_avoid_distance)`.
    WallAvoid,
    /// Caller-provided speed overlay (e.g. pedestrian density).
    PerAgent,
}

/// Cost and unit-gradient grids toward one destination.
#[derive(Debug, Clone)]
pub struct DestinationField {
    pub cost: Array2<f64>,
    pub grad: Option<Array2<DVec2>>,
}

/// Fast-marching floor field of one room.
///
/// Holds the rasterized code grid and lazily-built per-destination cost and
/// gradient fields. Build on an initialized building (inside points set).
pub struct FloorField {
    grid: RectGrid,
    code: Array2<i32>,
    doors: FxHashMap<Uid, Line>,
    speed_initial: Array2<f64>,
    speed_wall: Option<Array2<f64>>,
    speed_agent: Option<Array2<f64>>,
    wall_field: DestinationField,
    fields: FxHashMap<Uid, DestinationField>,
    mode: TargetMode,
    speed_mode: SpeedMode,
    with_gradients: bool,
}

impl FloorField {
    pub fn from_room(
        building: &Building,
        room_id: RoomId,
        spacing: f64,
        mode: TargetMode,
        speed_mode: SpeedMode,
        with_gradients: bool,
        wall_avoid_distance: f64,
    ) -> SimResult<Self> {
        let room = building.room(room_id);

        let mut walls: Vec<Line> = Vec::new();
        let mut doors: FxHashMap<Uid, Line> = FxHashMap::default();
        let mut closed: Vec<(Line, i32)> = Vec::new();

        for sub in &room.subrooms {
            for wall in sub.all_walls() {
                walls.push(wall.line);
            }
            for uid in &sub.door_uids {
                let Some(door) = building.door(*uid) else {
                    continue;
                };
                if door.is_closed() {
                    let code = match door.kind {
                        DoorKind::Crossing => CODE_CLOSED_CROSSING,
                        DoorKind::Transition { .. } => CODE_CLOSED_TRANSITION,
                    };
                    closed.push((door.line, code));
                } else {
                    doors.insert(*uid, door.line);
                }
            }
        }
        if doors.is_empty() && closed.is_empty() {
            return Err(SimError::geometry(
                format!("room {}", room.id),
                "no door in room, can not initialize floor field",
            ));
        }

        let mut min = DVec2::splat(f64::MAX);
        let mut max = DVec2::splat(f64::MIN);
        for line in walls.iter().chain(doors.values()).chain(closed.iter().map(|(l, _)| l)) {
            min = min.min(line.point1()).min(line.point2());
            max = max.max(line.point1()).max(line.point2());
        }
        let grid = RectGrid::from_bounds(min, max, spacing);
        let shape = grid.shape();

        // code grid: passable doors first, then closed doors, walls last,
        // so walls win at shared cells
        let mut code = Array2::from_elem(shape, CODE_OUTSIDE);
        for (uid, line) in &doors {
            stamp(&grid, &mut code, line, uid.0 as i32);
        }
        for (line, door_code) in &closed {
            stamp(&grid, &mut code, line, *door_code);
        }
        for line in &walls {
            stamp(&grid, &mut code, line, CODE_WALL);
        }

        // mark the interior, one flood per subroom seed
        for sub in &room.subrooms {
            if let Some(seed) = sub.inside_point {
                flood_inside(&grid, &mut code, seed);
            }
        }

        let speed_initial = Array2::from_elem(shape, 1.0);

        // wall-distance field: every wall cell is a zero-cost target
        let mut wall_cost = Array2::from_elem(shape, UNKNOWN_COST);
        ndarray::Zip::from(&mut wall_cost).and(&code).for_each(|c, &k| {
            if k == CODE_WALL {
                *c = 0.0;
            }
        });
        let mut wall_grad = Some(Array2::from_elem(shape, DVec2::ZERO));
        fast_march(&grid, &code, &speed_initial, &mut wall_cost, wall_grad.as_mut());
        let wall_field = DestinationField {
            cost: wall_cost,
            grad: wall_grad,
        };

        let speed_wall = (speed_mode == SpeedMode::WallAvoid).then(|| {
            let mut speed = Array2::from_elem(shape, 1.0);
            ndarray::Zip::from(&mut speed)
                .and(&wall_field.cost)
                .for_each(|s, &d| {
                    if d >= 0.0 {
                        *s = (d / wall_avoid_distance).min(1.0).max(1e-3);
                    }
                });
            speed
        });

        Ok(FloorField {
            grid,
            code,
            doors,
            speed_initial,
            speed_wall,
            speed_agent: None,
            wall_field,
            fields: FxHashMap::default(),
            mode,
            speed_mode,
            with_gradients,
        })
    }

    pub fn grid(&self) -> &RectGrid {
        &self.grid
    }

    pub fn spacing(&self) -> f64 {
        self.grid.spacing()
    }

    pub fn code(&self) -> &Array2<i32> {
        &self.code
    }

    pub fn door_uids(&self) -> impl Iterator<Item = Uid> + '_ {
        self.doors.keys().copied()
    }

    pub fn has_door(&self, uid: Uid) -> bool {
        self.doors.contains_key(&uid)
    }

    /// Install a per-agent speed overlay (only used in [`SpeedMode::PerAgent`]).
    pub fn set_agent_speed(&mut self, overlay: Array2<f64>) {
        assert_eq!(overlay.dim(), self.code.dim());
        self.speed_agent = Some(overlay);
    }

    fn active_speed(&self) -> &Array2<f64> {
        match self.speed_mode {
            SpeedMode::Homogeneous => &self.speed_initial,
            SpeedMode::WallAvoid => self.speed_wall.as_ref().unwrap_or(&self.speed_initial),
            SpeedMode::PerAgent => self.speed_agent.as_ref().unwrap_or(&self.speed_initial),
        }
    }

    /// Build the field toward `uid` if it does not exist yet.
    pub fn ensure_target(&mut self, uid: Uid) -> SimResult<()> {
        if !self.fields.contains_key(&uid) {
            let field = self.build_field(uid)?;
            self.fields.insert(uid, field);
        }
        Ok(())
    }

    /// Build fields for every door of the room, distinct destinations in
    /// parallel over the shared code grid.
    pub fn add_all_targets(&mut self) -> SimResult<()> {
        let uids: Vec<Uid> = self.doors.keys().copied().collect();
        let built: Vec<(Uid, SimResult<DestinationField>)> = uids
            .par_iter()
            .map(|uid| (*uid, self.build_field(*uid)))
            .collect();
        for (uid, field) in built {
            self.fields.insert(uid, field?);
        }
        Ok(())
    }

    fn build_field(&self, uid: Uid) -> SimResult<DestinationField> {
        let line = *self.doors.get(&uid).ok_or_else(|| {
            SimError::routing(format!("door {uid}"), "unknown door for this room's field")
        })?;

        // shorten the target segment so agents do not aim at the door jambs
        let target = shorten_target(&line);

        let shape = self.grid.shape();
        let mut cost = Array2::from_elem(shape, UNKNOWN_COST);
        ndarray::Zip::from(&mut cost).and(&self.code).for_each(|c, &k| {
            if k == CODE_WALL {
                *c = f64::INFINITY;
            }
        });

        match self.mode {
            TargetMode::LineSegment => {
                stamp_cost(&self.grid, &self.code, &mut cost, &target, 0.0);
            }
            TargetMode::CenterPoint => {
                if let Some(ix) = self.grid.index_at(line.centre()) {
                    if passable(self.code[ix]) {
                        cost[ix] = 0.0;
                    } else if let Some(snapped) = self.snap_key(ix) {
                        cost[snapped] = 0.0;
                    }
                }
            }
        }

        let mut grad = self
            .with_gradients
            .then(|| Array2::from_elem(shape, DVec2::ZERO));
        fast_march(&self.grid, &self.code, self.active_speed(), &mut cost, grad.as_mut());

        // in centre-point mode the rest of the door still reads as distance 0
        if self.mode == TargetMode::CenterPoint {
            stamp_cost(&self.grid, &self.code, &mut cost, &line, 0.0);
        }

        // the gradient is undefined on the target line itself; stamp the
        // inward normal so agents cross the line
        if let Some(grad) = grad.as_mut() {
            let normal = line.normal_vec();
            let trial = line.centre() - normal * 0.25;
            let trial2 = line.centre() + normal * 0.25;
            let pass = if self.code_at(trial) == Some(CODE_INSIDE) {
                Some(normal)
            } else if self.code_at(trial2) == Some(CODE_INSIDE) {
                Some(-normal)
            } else {
                None
            };
            match pass {
                Some(pass) => {
                    stamp_grad(&self.grid, &self.code, grad, &line, pass);
                    stamp_grad(&self.grid, &self.code, grad, &target, pass);
                }
                None => log::error!(
                    "field: door {uid}: no inside cell next to the target line"
                ),
            }
        }

        Ok(DestinationField { cost, grad })
    }

    fn code_at(&self, p: DVec2) -> Option<i32> {
        self.grid.index_at(p).map(|ix| self.code[ix])
    }

    /// Move a key off wall/outside cells onto a neighboring domain cell.
    fn snap_key(&self, ix: Index) -> Option<Index> {
        if passable(self.code[ix]) {
            return Some(ix);
        }
        [(1, 0), (-1, 0), (0, -1), (0, 1)]
            .into_iter()
            .map(|(dx, dy)| ix.add(dx, dy))
            .find(|n| self.grid.contains_index(*n) && passable(self.code[*n]))
    }

    /// Geodesic cost from `pos` to the destination door, `+inf` if
    /// unreachable. Positions on wall/outside cells snap to an inside
    /// neighbor first.
    pub fn cost_to(&self, uid: Uid, pos: DVec2) -> f64 {
        let Some(field) = self.fields.get(&uid) else {
            return f64::INFINITY;
        };
        let Some(key) = self.grid.index_at(pos).and_then(|ix| self.snap_key(ix)) else {
            return f64::INFINITY;
        };
        let c = field.cost[key];
        if c < 0.0 {
            f64::INFINITY
        } else {
            c
        }
    }

    /// Unit descent direction toward the destination, zero when unknown.
    pub fn direction_to(&self, uid: Uid, pos: DVec2) -> DVec2 {
        let Some(grad) = self.fields.get(&uid).and_then(|f| f.grad.as_ref()) else {
            return DVec2::ZERO;
        };
        let Some(key) = self.grid.index_at(pos).and_then(|ix| self.snap_key(ix)) else {
            return DVec2::ZERO;
        };
        grad[key]
    }

    pub fn distance_to_wall(&self, pos: DVec2) -> f64 {
        let Some(key) = self.grid.index_at(pos).and_then(|ix| self.snap_key(ix)) else {
            return f64::INFINITY;
        };
        let d = self.wall_field.cost[key];
        if d < 0.0 {
            f64::INFINITY
        } else {
            d
        }
    }

    /// Unit direction toward the nearest wall.
    pub fn direction_to_wall(&self, pos: DVec2) -> DVec2 {
        let Some(grad) = self.wall_field.grad.as_ref() else {
            return DVec2::ZERO;
        };
        match self.grid.index_at(pos).and_then(|ix| self.snap_key(ix)) {
            Some(key) => grad[key],
            None => DVec2::ZERO,
        }
    }

    /// Geodesic distance between two doors of this room, read from the
    /// first door's cost field at the second door's centre cell.
    pub fn distance_between_doors(&mut self, from: Uid, to: Uid) -> SimResult<f64> {
        let to_line = *self.doors.get(&to).ok_or_else(|| {
            SimError::routing(format!("door {to}"), "unknown door for this room's field")
        })?;
        self.ensure_target(from)?;
        let field = &self.fields[&from];

        let Some(mut key) = self.grid.index_at(to_line.centre()) else {
            return Ok(f64::INFINITY);
        };
        // the rasterized line and the computed centre may land on different
        // cells; prefer a cell actually carrying the door's code
        if self.code[key] != to.0 as i32 {
            for cand in [key.add(1, 0), key.add(-1, 0), key.add(0, 1), key.add(0, -1)] {
                if self.grid.contains_index(cand) && self.code[cand] == to.0 as i32 {
                    key = cand;
                    break;
                }
            }
        }
        let c = field.cost[key];
        Ok(if c < 0.0 { f64::INFINITY } else { c })
    }

    /// Drop all destination fields (geometry changed); the wall field and
    /// code grid are rebuilt by constructing a fresh `FloorField`.
    pub fn clear_targets(&mut self) {
        self.fields.clear();
    }
}

/// Cells the marcher may expand into: interior and door cells.
fn passable(code: i32) -> bool {
    code >= 0 || code == CODE_INSIDE
}

fn shorten_target(line: &Line) -> Line {
    let len = line.length();
    let cut = if len > 0.6 {
        0.2
    } else if len > 0.2 {
        0.05
    } else {
        return *line;
    };
    let u = cut / len;
    let p1 = line.point1();
    let p2 = line.point2();
    Line::with_uid(p1 + (p2 - p1) * u, p1 + (p2 - p1) * (1.0 - u), line.uid())
}

/// Rasterize one segment onto a boolean mask in grid coordinates.
fn line_mask(grid: &RectGrid, line: &Line) -> Array2<bool> {
    let (rows, cols) = grid.shape();
    let a = grid.grid_coord(line.point1());
    let b = grid.grid_coord(line.point2());
    let shape = geo::Line::new(coord! {x: a.x, y: a.y}, coord! {x: b.x, y: b.y});

    let mut rasterizer = BinaryBuilder::new()
        .width(cols)
        .height(rows)
        .build()
        .unwrap();
    rasterizer.rasterize(&shape).unwrap();
    let raster = rasterizer.finish();
    Array2::from_shape_vec(raster.dim(), raster.into_raw_vec()).unwrap()
}

/// Write `value` into every cell of the segment, without overwriting walls
/// or closed doors.
fn stamp(grid: &RectGrid, code: &mut Array2<i32>, line: &Line, value: i32) {
    let mask = line_mask(grid, line);
    ndarray::Zip::from(code).and(&mask).for_each(|c, &m| {
        if m && *c != CODE_WALL && *c != CODE_CLOSED_CROSSING && *c != CODE_CLOSED_TRANSITION {
            *c = value;
        }
    });
}

fn stamp_cost(grid: &RectGrid, code: &Array2<i32>, cost: &mut Array2<f64>, line: &Line, value: f64) {
    let mask = line_mask(grid, line);
    ndarray::Zip::from(cost).and(&mask).and(code).for_each(|c, &m, &k| {
        if m && k != CODE_WALL && k != CODE_CLOSED_CROSSING && k != CODE_CLOSED_TRANSITION {
            *c = value;
        }
    });
}

fn stamp_grad(
    grid: &RectGrid,
    code: &Array2<i32>,
    grad: &mut Array2<DVec2>,
    line: &Line,
    value: DVec2,
) {
    let mask = line_mask(grid, line);
    ndarray::Zip::from(grad).and(&mask).and(code).for_each(|g, &m, &k| {
        if m && k != CODE_WALL {
            *g = value;
        }
    });
}

/// Flood-fill `CODE_OUTSIDE` cells with `CODE_INSIDE` starting from a known
/// interior seed. Walls and door cells bound the flood.
fn flood_inside(grid: &RectGrid, code: &mut Array2<i32>, seed: DVec2) {
    let Some(start) = grid.index_at(seed) else {
        return;
    };
    if code[start] != CODE_OUTSIDE {
        return;
    }

    let mut queue = VecDeque::new();
    code[start] = CODE_INSIDE;
    queue.push_back(start);

    while let Some(ix) = queue.pop_front() {
        for n in grid.neighbors(ix) {
            if code[n] == CODE_OUTSIDE {
                code[n] = CODE_INSIDE;
                queue.push_back(n);
            }
        }
    }
}

/// Fast marching (Sethian) over the code grid.
///
/// Cells with cost 0 are the initial accepted front; every reachable cell is
/// solved exactly once, on first touch, in ascending cost order.
fn fast_march(
    grid: &RectGrid,
    code: &Array2<i32>,
    speed: &Array2<f64>,
    cost: &mut Array2<f64>,
    mut grad: Option<&mut Array2<DVec2>>,
) {
    type Key = (Reverse<NotNan<f64>>, (i32, i32));
    let float = |x: f64| Reverse(NotNan::new(x).unwrap());
    let mut heap: BinaryHeap<Key> = BinaryHeap::new();

    let (rows, cols) = cost.dim();
    for j in 0..rows {
        for i in 0..cols {
            let ix = Index::new(i as i32, j as i32);
            if cost[ix] != 0.0 {
                continue;
            }
            for n in grid.neighbors(ix) {
                if passable(code[n]) && cost[n] == UNKNOWN_COST {
                    solve_cell(grid, speed, cost, grad.as_mut().map(|g| &mut **g), n);
                    heap.push((float(cost[n]), (n.x, n.y)));
                }
            }
        }
    }

    while let Some((_, (x, y))) = heap.pop() {
        let ix = Index::new(x, y);
        for n in grid.neighbors(ix) {
            if passable(code[n]) && cost[n] == UNKNOWN_COST {
                solve_cell(grid, speed, cost, grad.as_mut().map(|g| &mut **g), n);
                heap.push((float(cost[n]), (n.x, n.y)));
            }
        }
    }
}

/// Solve the discretized eikonal equation at one cell and fill its gradient
/// from the side each axis value was taken from.
///
/// A neighbor counts as known when it carries a finite non-negative cost;
/// walls hold `+inf` in door fields and 0 in the wall-distance field, so
/// the same test serves both.
fn solve_cell(
    grid: &RectGrid,
    speed: &Array2<f64>,
    cost: &mut Array2<f64>,
    grad: Option<&mut Array2<DVec2>>,
    ix: Index,
) {
    let known = |cost: &Array2<f64>, i: Index| -> Option<f64> {
        if !grid.contains_index(i) {
            return None;
        }
        cost.get(i).copied().filter(|c| *c >= 0.0 && c.is_finite())
    };

    let right = ix.add(1, 0);
    let left = ix.add(-1, 0);
    let up = ix.add(0, 1);
    let down = ix.add(0, -1);

    let (row, points_right) = match (known(cost, right), known(cost, left)) {
        (Some(r), Some(l)) if r <= l => (r, true),
        (Some(_), Some(l)) => (l, false),
        (Some(r), None) => (r, true),
        (None, Some(l)) => (l, false),
        (None, None) => (f64::MAX, false),
    };
    let (col, points_up) = match (known(cost, up), known(cost, down)) {
        (Some(u), Some(d)) if u <= d => (u, true),
        (Some(_), Some(d)) => (d, false),
        (Some(u), None) => (u, true),
        (None, Some(d)) => (d, false),
        (None, None) => (f64::MAX, false),
    };

    if row == f64::MAX && col == f64::MAX {
        return;
    }

    let h = grid.spacing();
    let hf = h / speed[ix].max(1e-9);
    let u = if col == f64::MAX {
        row + hf
    } else if row == f64::MAX {
        col + hf
    } else {
        let det = 2.0 * hf * hf - (row - col) * (row - col);
        if det >= 0.0 {
            (row + col + det.sqrt()) / 2.0
        } else {
            row.min(col) + hf
        }
    };
    cost[ix] = u;

    if let Some(grad) = grad {
        let gx = if row == f64::MAX {
            0.0
        } else if points_right {
            -(cost[right] - u) / h
        } else {
            -(u - cost[left]) / h
        };
        let gy = if col == f64::MAX {
            0.0
        } else if points_up {
            -(cost[up] - u) / h
        } else {
            -(u - cost[down]) / h
        };
        grad[ix] = DVec2::new(gx, gy).normalize_or_zero();
    }
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;
    use glam::dvec2;
    use ndarray::Array2;

    use crate::geometry::Uid;
    use crate::util::Index;

    use super::grid::RectGrid;
    use super::*;

    /// Open 1D corridor: marching from a single seed gives arc length.
    #[test]
    fn fast_march_measures_distance() {
        let grid = RectGrid::from_bounds(dvec2(0.0, 0.0), dvec2(4.0, 4.0), 0.5);
        let shape = grid.shape();
        let code = Array2::from_elem(shape, CODE_INSIDE);
        let speed = Array2::from_elem(shape, 1.0);
        let mut cost = Array2::from_elem(shape, UNKNOWN_COST);

        let seed = grid.index_at(dvec2(0.0, 0.0)).unwrap();
        cost[seed] = 0.0;
        fast_march(&grid, &code, &speed, &mut cost, None);

        let probe = grid.index_at(dvec2(3.0, 0.0)).unwrap();
        // axis-aligned distance is exact
        assert_float_absolute_eq!(cost[probe], 3.0, 1e-9);

        // diagonal distance overestimates euclid but stays below manhattan
        let diag = grid.index_at(dvec2(3.0, 3.0)).unwrap();
        let euclid = (18.0f64).sqrt();
        assert!(cost[diag] >= euclid - 0.1);
        assert!(cost[diag] < 6.0);
    }

    #[test]
    fn walls_are_impassable() {
        let grid = RectGrid::from_bounds(dvec2(0.0, 0.0), dvec2(4.0, 4.0), 0.5);
        let shape = grid.shape();
        let mut code = Array2::from_elem(shape, CODE_INSIDE);
        // vertical wall splitting the domain, no gap
        let wall_col = grid.index_at(dvec2(2.0, 0.0)).unwrap().x;
        for j in 0..shape.0 {
            code[Index::new(wall_col, j as i32)] = CODE_WALL;
        }

        let speed = Array2::from_elem(shape, 1.0);
        let mut cost = Array2::from_elem(shape, UNKNOWN_COST);
        let seed = grid.index_at(dvec2(0.5, 2.0)).unwrap();
        cost[seed] = 0.0;
        fast_march(&grid, &code, &speed, &mut cost, None);

        let behind = grid.index_at(dvec2(3.5, 2.0)).unwrap();
        assert_eq!(cost[behind], UNKNOWN_COST);
    }

    #[test]
    fn single_cell_corridor_uses_one_sided_updates() {
        let grid = RectGrid::from_bounds(dvec2(0.0, 0.0), dvec2(5.0, 0.0), 0.5);
        let shape = grid.shape();
        let mut code = Array2::from_elem(shape, CODE_WALL);
        // one inside row
        let row = grid.index_at(dvec2(0.0, 0.0)).unwrap().y;
        for i in 0..shape.1 {
            code[Index::new(i as i32, row)] = CODE_INSIDE;
        }
        let speed = Array2::from_elem(shape, 1.0);
        let mut cost = Array2::from_elem(shape, UNKNOWN_COST);
        let seed = grid.index_at(dvec2(0.0, 0.0)).unwrap();
        cost[seed] = 0.0;
        let mut grad = Array2::from_elem(shape, glam::DVec2::ZERO);
        fast_march(&grid, &code, &speed, &mut cost, Some(&mut grad));

        let probe = grid.index_at(dvec2(4.0, 0.0)).unwrap();
        assert_float_absolute_eq!(cost[probe], 4.0, 1e-9);
        // gradient points back toward the seed
        assert!(grad[probe].x < -0.9);
    }

    #[test]
    fn gradient_descends_the_cost() {
        let grid = RectGrid::from_bounds(dvec2(0.0, 0.0), dvec2(4.0, 4.0), 0.25);
        let shape = grid.shape();
        let code = Array2::from_elem(shape, CODE_INSIDE);
        let speed = Array2::from_elem(shape, 1.0);
        let mut cost = Array2::from_elem(shape, UNKNOWN_COST);
        let seed = grid.index_at(dvec2(2.0, 2.0)).unwrap();
        cost[seed] = 0.0;
        let mut grad = Array2::from_elem(shape, glam::DVec2::ZERO);
        fast_march(&grid, &code, &speed, &mut cost, Some(&mut grad));

        // at interior cells the gradient is unit length and points downhill
        for probe in [dvec2(3.0, 2.0), dvec2(1.0, 1.0), dvec2(2.0, 3.5)] {
            let ix = grid.index_at(probe).unwrap();
            let g = grad[ix];
            assert_float_absolute_eq!(g.length(), 1.0, 1e-6);
            let ahead = probe + g * 0.5;
            let ahead_ix = grid.index_at(ahead).unwrap();
            assert!(cost[ahead_ix] < cost[ix]);
        }
    }

    #[test]
    fn shorten_target_keeps_short_lines() {
        let long = Line::with_uid(dvec2(0.0, 0.0), dvec2(2.0, 0.0), Uid(0));
        let short = Line::with_uid(dvec2(0.0, 0.0), dvec2(0.1, 0.0), Uid(1));
        assert!(shorten_target(&long).length() < long.length());
        assert_eq!(shorten_target(&short).length(), short.length());
    }
}
