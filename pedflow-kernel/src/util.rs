use glam::DVec2;
use ndarray::Array2;
use num_traits::PrimInt;

/// Index struct for [`ndarray::Array2`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Index {
    pub y: i32,
    pub x: i32,
}

impl Index {
    pub fn new<T: PrimInt>(x: T, y: T) -> Self {
        Index {
            x: x.to_i32().unwrap(),
            y: y.to_i32().unwrap(),
        }
    }

    pub fn add<T: PrimInt>(self, x: T, y: T) -> Self {
        Index {
            x: self.x + x.to_i32().unwrap(),
            y: self.y + y.to_i32().unwrap(),
        }
    }
}

unsafe impl ndarray::NdIndex<ndarray::Ix2> for Index {
    fn index_checked(&self, dim: &ndarray::Ix2, strides: &ndarray::Ix2) -> Option<isize> {
        if self.x.is_negative() || self.y.is_negative() {
            None
        } else {
            (self.y as usize, self.x as usize).index_checked(dim, strides)
        }
    }

    fn index_unchecked(&self, strides: &ndarray::Ix2) -> isize {
        (self.y as usize, self.x as usize).index_unchecked(strides)
    }
}

/// Interpolate grid using bilinear interpolation.
pub fn bilinear(grid: &Array2<f64>, pos: DVec2) -> f64 {
    const FMAX: f64 = 1e12;

    let base = pos.floor();
    let t = pos - base;
    let s = DVec2::ONE - t;
    let ix = Index::new(base.x as i32, base.y as i32);

    let mut y = 0.0;
    y += s.y * s.x * grid.get(ix).cloned().unwrap_or(FMAX);
    y += s.y * t.x * grid.get(ix.add(1, 0)).cloned().unwrap_or(FMAX);
    y += t.y * s.x * grid.get(ix.add(0, 1)).cloned().unwrap_or(FMAX);
    y += t.y * t.x * grid.get(ix.add(1, 1)).cloned().unwrap_or(FMAX);
    y
}

/// Spawn a random integer based on Poisson distribution.
pub fn poisson(lambda: f64, rng: &mut fastrand::Rng) -> i32 {
    let mut y = 0;
    let mut x = rng.f64();
    let exp_lambda = (-lambda).exp();

    while x >= exp_lambda {
        x *= rng.f64();
        y += 1;
    }

    y
}

/// Vector from the closest point of a line segment to `point`.
pub fn distance_from_line(point: DVec2, line: [DVec2; 2]) -> DVec2 {
    let a = point - line[0];
    let b = line[1] - line[0];
    let b_len2 = b.length_squared();

    if b_len2 == 0.0 {
        a
    } else {
        let t = (a.dot(b) / b_len2).clamp(0.0, 1.0);
        a - t * b
    }
}
