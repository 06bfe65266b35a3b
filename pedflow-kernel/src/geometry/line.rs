use glam::DVec2;

/// General geometric epsilon.
pub const EPS: f64 = 1e-3;
/// Distance epsilon used for "close enough to a segment" tests.
pub const EPS_DIST: f64 = 0.05;
/// Proximity epsilon for reaching a goal.
pub const EPS_GOAL: f64 = 0.005;
/// Coordinate equality tolerance, larger than [`EPS`] to absorb input noise.
pub const COORD_TOLERANCE: f64 = 0.03;

/// Point equality within [`EPS`].
pub fn approx_eq(a: DVec2, b: DVec2) -> bool {
    (a - b).length() < EPS
}

/// Process-unique identifier of a line segment (doors, walls).
///
/// Stable for the whole run; used as the handle across the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid(pub u64);

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allocator for [`Uid`]s, passed explicitly through the build context.
#[derive(Debug, Default, Clone)]
pub struct UidAllocator {
    next: u64,
}

impl UidAllocator {
    pub fn new() -> Self {
        UidAllocator::default()
    }

    pub fn alloc(&mut self) -> Uid {
        let uid = Uid(self.next);
        self.next += 1;
        uid
    }
}

/// Result of a segment/segment intersection test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineIntersection {
    None,
    Point(DVec2),
    /// Both segments are colinear and share an interval.
    Overlap,
}

/// Ordered pair of points with derived centre and length.
#[derive(Debug, Clone, Copy)]
pub struct Line {
    p1: DVec2,
    p2: DVec2,
    centre: DVec2,
    length: f64,
    uid: Uid,
}

impl Line {
    pub fn new(p1: DVec2, p2: DVec2, uids: &mut UidAllocator) -> Self {
        Line::with_uid(p1, p2, uids.alloc())
    }

    pub fn with_uid(p1: DVec2, p2: DVec2, uid: Uid) -> Self {
        Line {
            p1,
            p2,
            centre: (p1 + p2) * 0.5,
            length: (p1 - p2).length(),
            uid,
        }
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn point1(&self) -> DVec2 {
        self.p1
    }

    pub fn point2(&self) -> DVec2 {
        self.p2
    }

    pub fn centre(&self) -> DVec2 {
        self.centre
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Unit normal of the segment (left of the p1→p2 direction).
    pub fn normal_vec(&self) -> DVec2 {
        let r = self.p2 - self.p1;
        DVec2::new(-r.y, r.x).normalize_or_zero()
    }

    /// Foot of the perpendicular from `p` onto the carrier line.
    /// Not necessarily inside the segment.
    pub fn lot_point(&self, p: DVec2) -> DVec2 {
        let t = self.p1 - self.p2;
        let lambda = (p - self.p2).dot(t) / t.dot(t);
        self.p2 + t * lambda
    }

    /// True if the orthogonal projection of `p` falls strictly inside the segment.
    pub fn is_between(&self, p: DVec2) -> bool {
        let t = self.p1 - self.p2;
        let lambda = (p - self.p2).dot(t) / t.dot(t);
        lambda > 0.0 && lambda < 1.0
    }

    /// Point on the segment with the shortest distance to `p`.
    pub fn shortest_point(&self, p: DVec2) -> DVec2 {
        if approx_eq(self.p1, self.p2) {
            return self.p1;
        }
        let t = self.p1 - self.p2;
        let lambda = (p - self.p2).dot(t) / t.dot(t);
        if lambda < 0.0 {
            self.p2
        } else if lambda > 1.0 {
            self.p1
        } else {
            self.p2 + t * lambda
        }
    }

    pub fn dist_to(&self, p: DVec2) -> f64 {
        (p - self.shortest_point(p)).length()
    }

    /// Containment test for a point on the segment (colinear and within).
    pub fn is_in_line_segment(&self, p: DVec2) -> bool {
        let d21 = self.p2 - self.p1;
        let dp1 = p - self.p1;

        if d21.perp_dot(dp1).abs() > 1e-4 {
            return false;
        }

        let dotp = dp1.dot(d21);
        dotp >= 0.0 && dotp <= d21.length_squared()
    }

    /// Like [`Line::is_in_line_segment`] with the looser [`EPS_DIST`] band.
    pub fn nearly_in_line_segment(&self, p: DVec2) -> bool {
        ((self.p1 - p).length() + (self.p2 - p).length() - self.length).abs() < EPS_DIST
    }

    pub fn has_end_point(&self, p: DVec2) -> bool {
        approx_eq(self.p1, p) || approx_eq(self.p2, p)
    }

    pub fn share_common_point(&self, other: &Line) -> bool {
        self.has_end_point(other.p1) || self.has_end_point(other.p2)
    }

    /// Side test by the sign of the 2D cross product `(p2-p1) × (pt-p1)`.
    /// Colinear points count as the right side.
    pub fn is_left(&self, pt: DVec2) -> bool {
        (self.p2 - self.p1).perp_dot(pt - self.p1) > 0.0
    }

    pub fn intersects(&self, other: &Line) -> LineIntersection {
        self.intersection_with(other.p1, other.p2)
    }

    /// Segment/segment intersection.
    ///
    /// Returns [`LineIntersection::Overlap`] when both segments are colinear
    /// and share an interval of positive length.
    pub fn intersection_with(&self, q1: DVec2, q2: DVec2) -> LineIntersection {
        let r = self.p2 - self.p1;
        let s = q2 - q1;
        let denom = r.perp_dot(s);
        let qp = q1 - self.p1;

        if denom.abs() < 1e-12 {
            // parallel; colinear iff qp is parallel to r as well
            if r.perp_dot(qp).abs() > 1e-9 {
                return LineIntersection::None;
            }
            let r_len2 = r.length_squared();
            if r_len2 < 1e-18 {
                return if self.dist_to(q1) < EPS {
                    LineIntersection::Point(self.p1)
                } else {
                    LineIntersection::None
                };
            }
            let t0 = qp.dot(r) / r_len2;
            let t1 = (q2 - self.p1).dot(r) / r_len2;
            let (lo, hi) = if t0 < t1 { (t0, t1) } else { (t1, t0) };
            if hi < 0.0 || lo > 1.0 {
                return LineIntersection::None;
            }
            if (hi.min(1.0) - lo.max(0.0)).abs() < 1e-12 {
                // touching in a single point
                let t = lo.max(0.0);
                return LineIntersection::Point(self.p1 + r * t);
            }
            return LineIntersection::Overlap;
        }

        let t = qp.perp_dot(s) / denom;
        let u = qp.perp_dot(r) / denom;
        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            LineIntersection::Point(self.p1 + r * t)
        } else {
            LineIntersection::None
        }
    }

    /// True if the segment from `old` to `new` crosses this line.
    pub fn crossed_by(&self, old: DVec2, new: DVec2) -> bool {
        matches!(
            self.intersection_with(old, new),
            LineIntersection::Point(_) | LineIntersection::Overlap
        )
    }

    /// True if the segment intersects the circle around `centre`.
    pub fn intersects_circle(&self, centre: DVec2, radius: f64) -> bool {
        let p1 = self.p1 - centre;
        let p2 = self.p2 - centre;
        if approx_eq(p1, p2) {
            return false;
        }

        // quadratic in the segment parameter t: a t² + b t + c = 0
        let a = (p1 - p2).length_squared();
        let b = 2.0 * (p2.dot(p1 - p2));
        let c = p2.length_squared() - radius * radius;
        let delta = b * b - 4.0 * a * c;
        if delta < 0.0 {
            return false;
        }

        let sq = delta.sqrt();
        let t1 = (-b + sq) / (2.0 * a);
        let t2 = (-b - sq) / (2.0 * a);
        (0.0..=1.0).contains(&t1) || (0.0..=1.0).contains(&t2)
    }

    /// Segment extended by `d` beyond both endpoints.
    pub fn enlarge(&self, d: f64) -> Line {
        let diff = (self.p1 - self.p2).normalize_or_zero() * d;
        Line::with_uid(self.p1 + diff, self.p2 - diff, self.uid)
    }

    pub fn is_horizontal(&self) -> bool {
        (self.p1.y - self.p2.y).abs() <= EPS
    }

    pub fn is_vertical(&self) -> bool {
        (self.p1.x - self.p2.x).abs() <= EPS
    }
}

/// Endpoint-set equality modulo epsilon; the UID does not participate.
impl PartialEq for Line {
    fn eq(&self, other: &Self) -> bool {
        (approx_eq(self.p1, other.p1) && approx_eq(self.p2, other.p2))
            || (approx_eq(self.p1, other.p2) && approx_eq(self.p2, other.p1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WallType {
    Wall,
    Track,
}

/// Line segment tagged with a type. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub line: Line,
    pub kind: WallType,
}

impl Wall {
    pub fn new(p1: DVec2, p2: DVec2, kind: WallType, uids: &mut UidAllocator) -> Self {
        Wall {
            line: Line::new(p1, p2, uids),
            kind,
        }
    }
}
