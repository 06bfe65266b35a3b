use glam::DVec2;

use crate::util::Index;

/// Regular rectangular grid covering a room, with uniform spacing `h`.
///
/// Cell (0, 0) sits at `min`; indices are (x → i, y → j), stored in
/// `ndarray` arrays of shape `(rows = j, cols = i)`.
#[derive(Debug, Clone)]
pub struct RectGrid {
    min: DVec2,
    spacing: f64,
    cols: usize,
    rows: usize,
}

impl RectGrid {
    /// Grid over `[min, max]` padded by half a metre on every side, the
    /// way the per-room fields are dimensioned.
    pub fn from_bounds(min: DVec2, max: DVec2, spacing: f64) -> Self {
        let min = min - DVec2::splat(0.5);
        let max = max + DVec2::splat(0.5);
        let cols = ((max.x - min.x) / spacing).ceil() as usize + 1;
        let rows = ((max.y - min.y) / spacing).ceil() as usize + 1;
        RectGrid {
            min,
            spacing,
            cols,
            rows,
        }
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// `(rows, cols)` for allocating `ndarray` storage.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn includes_point(&self, p: DVec2) -> bool {
        let g = (p - self.min) / self.spacing;
        g.x >= -0.5 && g.y >= -0.5 && g.x < self.cols as f64 - 0.5 && g.y < self.rows as f64 - 0.5
    }

    /// Nearest cell index for a world position, if inside the grid.
    pub fn index_at(&self, p: DVec2) -> Option<Index> {
        if !self.includes_point(p) {
            return None;
        }
        let g = ((p - self.min) / self.spacing).round();
        Some(Index::new(g.x as i32, g.y as i32))
    }

    /// World position of a cell centre.
    pub fn world_at(&self, ix: Index) -> DVec2 {
        self.min + DVec2::new(ix.x as f64, ix.y as f64) * self.spacing
    }

    /// Continuous grid coordinate, for bilinear interpolation.
    pub fn grid_coord(&self, p: DVec2) -> DVec2 {
        (p - self.min) / self.spacing
    }

    pub fn contains_index(&self, ix: Index) -> bool {
        ix.x >= 0 && ix.y >= 0 && (ix.x as usize) < self.cols && (ix.y as usize) < self.rows
    }

    /// 4-connected neighbors that fall inside the grid.
    pub fn neighbors(&self, ix: Index) -> impl Iterator<Item = Index> + '_ {
        [(1, 0), (-1, 0), (0, 1), (0, -1)]
            .into_iter()
            .map(move |(dx, dy)| ix.add(dx, dy))
            .filter(|n| self.contains_index(*n))
    }
}

#[cfg(test)]
mod tests {
    use glam::dvec2;

    use crate::util::Index;

    use super::RectGrid;

    #[test]
    fn index_round_trip() {
        let grid = RectGrid::from_bounds(dvec2(0.0, 0.0), dvec2(10.0, 5.0), 0.25);
        let ix = grid.index_at(dvec2(3.0, 2.0)).unwrap();
        let back = grid.world_at(ix);
        assert!((back - dvec2(3.0, 2.0)).length() < 0.25);
    }

    #[test]
    fn padding_covers_the_boundary() {
        let grid = RectGrid::from_bounds(dvec2(0.0, 0.0), dvec2(10.0, 5.0), 0.25);
        assert!(grid.includes_point(dvec2(0.0, 0.0)));
        assert!(grid.includes_point(dvec2(10.0, 5.0)));
        assert!(!grid.includes_point(dvec2(11.0, 5.0)));
    }

    #[test]
    fn neighbor_clipping_at_corners() {
        let grid = RectGrid::from_bounds(dvec2(0.0, 0.0), dvec2(2.0, 2.0), 1.0);
        let corner: Vec<Index> = grid.neighbors(Index::new(0, 0)).collect();
        assert_eq!(corner.len(), 2);
    }
}
