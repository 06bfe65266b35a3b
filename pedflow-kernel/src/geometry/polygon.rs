use glam::DVec2;

/// Even-odd point-in-polygon test. Vertices are an implicit closed ring.
pub fn point_in_polygon(polygon: &[DVec2], p: DVec2) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Signed area via the shoelace formula. Positive for CCW rings.
pub fn signed_area(polygon: &[DVec2]) -> f64 {
    let n = polygon.len();
    let mut sum = 0.0;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        sum += a.perp_dot(b);
    }
    sum * 0.5
}

pub fn is_ccw(polygon: &[DVec2]) -> bool {
    signed_area(polygon) > 0.0
}

pub fn centroid(polygon: &[DVec2]) -> DVec2 {
    let area = signed_area(polygon);
    if area.abs() < 1e-12 {
        // degenerate ring, fall back to vertex mean
        let sum: DVec2 = polygon.iter().sum();
        return sum / polygon.len().max(1) as f64;
    }
    let n = polygon.len();
    let mut c = DVec2::ZERO;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        c += (a + b) * a.perp_dot(b);
    }
    c / (6.0 * area)
}

pub fn bounding_box(polygon: &[DVec2]) -> (DVec2, DVec2) {
    let mut min = DVec2::splat(f64::MAX);
    let mut max = DVec2::splat(f64::MIN);
    for p in polygon {
        min = min.min(*p);
        max = max.max(*p);
    }
    (min, max)
}
