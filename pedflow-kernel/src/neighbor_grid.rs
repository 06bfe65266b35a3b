use glam::DVec2;
use ndarray::Array2;
use thin_vec::ThinVec;

use super::util::Index;

/// Uniform grid over the building's bounding rectangle mapping cell → agent
/// indices. Rebuilt every step; queried by the operational model.
pub struct NeighborGrid {
    pub data: Array2<ThinVec<u32>>,
    pub origin: DVec2,
    pub unit: f64,
    pub shape: (usize, usize),
}

impl NeighborGrid {
    /// `unit` must be at least the operational model's maximum interaction
    /// range; may only be changed between steps by rebuilding the grid.
    pub fn new(min: DVec2, max: DVec2, unit: f64) -> Self {
        let shape = ((max - min) / unit).ceil();
        let shape = (shape.y.max(1.0) as usize, shape.x.max(1.0) as usize);
        let data = Array2::from_elem(shape, ThinVec::new());

        NeighborGrid {
            data,
            origin: min,
            unit,
            shape,
        }
    }

    /// Clear all cells and re-bin the given positions in O(N).
    pub fn update(&mut self, positions: impl IntoIterator<Item = DVec2>) {
        self.data.fill(ThinVec::new());

        for (i, pos) in positions.into_iter().enumerate() {
            let ix = ((pos - self.origin) / self.unit).floor();
            let ix = Index::new(ix.x as i32, ix.y as i32);
            if let Some(neighbors) = self.data.get_mut(ix) {
                if !neighbors.has_capacity() {
                    neighbors.reserve(16);
                }
                neighbors.push(i as u32);
            }
        }
    }

    /// Agents in the cells overlapping the square of half-side `r` centred
    /// at `p`. The caller is responsible for exact distance filtering.
    pub fn neighbors(&self, p: DVec2, r: f64) -> impl Iterator<Item = u32> + '_ {
        let lo = ((p - DVec2::splat(r) - self.origin) / self.unit).floor();
        let hi = ((p + DVec2::splat(r) - self.origin) / self.unit).floor();
        let (rows, cols) = self.shape;

        let y0 = lo.y.max(0.0) as i64;
        let y1 = hi.y.min(rows as f64 - 1.0) as i64;
        let x0 = lo.x.max(0.0) as i64;
        let x1 = hi.x.min(cols as f64 - 1.0) as i64;

        (y0..=y1)
            .flat_map(move |y| (x0..=x1).map(move |x| (y as usize, x as usize)))
            .flat_map(move |(y, x)| self.data[(y, x)].iter().copied())
    }
}
