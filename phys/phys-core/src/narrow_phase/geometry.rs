//! Closest-point helpers shared by the pair tests.
//!
//! Degenerate directions never fail: denominators get [`EPSILON`] added so a
//! zero-length segment collapses to its start point.

use nalgebra::Point3;

/// Guard added to denominators built from squared lengths.
pub const EPSILON: f64 = 1e-12;

/// Foot of the perpendicular from `p` onto the infinite line through `a`
/// and `b`, with its line parameter (`0` at `a`, `1` at `b`).
#[must_use]
pub fn perpendicular_foot(a: &Point3<f64>, b: &Point3<f64>, p: &Point3<f64>) -> (Point3<f64>, f64) {
    let d = b - a;
    let t = (p - a).dot(&d) / (d.norm_squared() + EPSILON);
    (a + d * t, t)
}

/// Closest point to `p` on the segment `[a, b]`.
#[must_use]
pub fn closest_point_on_segment(a: &Point3<f64>, b: &Point3<f64>, p: &Point3<f64>) -> Point3<f64> {
    let (_, t) = perpendicular_foot(a, b, p);
    a + (b - a) * t.clamp(0.0, 1.0)
}

/// Closest pair of points between segments `[p1, q1]` and `[p2, q2]`.
#[must_use]
pub fn closest_points_segments(
    p1: &Point3<f64>,
    q1: &Point3<f64>,
    p2: &Point3<f64>,
    q2: &Point3<f64>,
) -> (Point3<f64>, Point3<f64>) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.norm_squared();
    let e = d2.norm_squared();
    let f = d2.dot(&r);

    let (s, t) = if a <= EPSILON && e <= EPSILON {
        (0.0, 0.0)
    } else if a <= EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(&r);
        if e <= EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(&d2);
            let denom = a * e - b * b;
            let mut s = if denom > EPSILON {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };

    (p1 + d1 * s, p2 + d2 * t)
}

/// Closest point on triangle `tri` to `p`, by Voronoi region.
#[must_use]
pub fn closest_point_on_triangle(tri: &[Point3<f64>; 3], p: &Point3<f64>) -> Point3<f64> {
    let [a, b, c] = tri;
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc + EPSILON);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

/// Point where segment `[p, q]` crosses triangle `tri`, if it does.
#[must_use]
pub fn segment_triangle_crossing(
    p: &Point3<f64>,
    q: &Point3<f64>,
    tri: &[Point3<f64>; 3],
) -> Option<Point3<f64>> {
    let [a, b, c] = tri;
    let dir = q - p;
    let e1 = b - a;
    let e2 = c - a;
    let h = dir.cross(&e2);
    let det = e1.dot(&h);
    if det.abs() <= EPSILON {
        return None;
    }
    let inv = 1.0 / det;
    let s = p - a;
    let u = inv * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qv = s.cross(&e1);
    let v = inv * dir.dot(&qv);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = inv * e2.dot(&qv);
    (0.0..=1.0).contains(&t).then(|| p + dir * t)
}

/// Closest pair of points between segment `[p, q]` and triangle `tri`,
/// returned as `(on_segment, on_triangle)`.
#[must_use]
pub fn closest_points_segment_triangle(
    p: &Point3<f64>,
    q: &Point3<f64>,
    tri: &[Point3<f64>; 3],
) -> (Point3<f64>, Point3<f64>) {
    if let Some(x) = segment_triangle_crossing(p, q, tri) {
        return (x, x);
    }

    let mut best = (*p, closest_point_on_triangle(tri, p));
    let mut best_d2 = (best.0 - best.1).norm_squared();
    let mut consider = |pair: (Point3<f64>, Point3<f64>)| {
        let d2 = (pair.0 - pair.1).norm_squared();
        if d2 < best_d2 {
            best_d2 = d2;
            best = pair;
        }
    };

    consider((*q, closest_point_on_triangle(tri, q)));
    for i in 0..3 {
        consider(closest_points_segments(p, q, &tri[i], &tri[(i + 1) % 3]));
    }
    best
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tri() -> [Point3<f64>; 3] {
        [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 2.0),
            Point3::new(2.0, 0.0, 0.0),
        ]
    }

    #[test]
    fn test_perpendicular_foot_degenerate_line() {
        let a = Point3::new(1.0, 1.0, 1.0);
        let (foot, t) = perpendicular_foot(&a, &a, &Point3::new(5.0, 0.0, 0.0));
        assert_eq!(foot, a);
        assert_eq!(t, 0.0);
    }

    #[test]
    fn test_closest_point_on_segment_clamps() {
        let a = Point3::origin();
        let b = Point3::new(2.0, 0.0, 0.0);
        assert_eq!(closest_point_on_segment(&a, &b, &Point3::new(-3.0, 1.0, 0.0)), a);
        assert_relative_eq!(
            closest_point_on_segment(&a, &b, &Point3::new(1.0, 4.0, 0.0)),
            Point3::new(1.0, 0.0, 0.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_segment_segment() {
        let (c1, c2) = closest_points_segments(
            &Point3::new(-1.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, -1.0),
            &Point3::new(0.0, 1.0, 1.0),
        );
        assert_relative_eq!(c1, Point3::origin(), epsilon = 1e-9);
        assert_relative_eq!(c2, Point3::new(0.0, 1.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_closest_point_regions() {
        let t = tri();
        // Above the face.
        assert_relative_eq!(
            closest_point_on_triangle(&t, &Point3::new(0.5, 3.0, 0.5)),
            Point3::new(0.5, 0.0, 0.5),
            epsilon = 1e-12
        );
        // Beyond a vertex.
        assert_eq!(closest_point_on_triangle(&t, &Point3::new(-1.0, 0.0, -1.0)), t[0]);
        // Beyond the hypotenuse.
        assert_relative_eq!(
            closest_point_on_triangle(&t, &Point3::new(2.0, 0.0, 2.0)),
            Point3::new(1.0, 0.0, 1.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_segment_triangle() {
        let t = tri();
        // Crossing segment.
        let (s, q) = closest_points_segment_triangle(
            &Point3::new(0.5, 1.0, 0.5),
            &Point3::new(0.5, -1.0, 0.5),
            &t,
        );
        assert_relative_eq!(s, Point3::new(0.5, 0.0, 0.5), epsilon = 1e-12);
        assert_relative_eq!(q, s, epsilon = 1e-12);

        // Hovering horizontal segment: closest along its whole length.
        let (s, q) = closest_points_segment_triangle(
            &Point3::new(-5.0, 0.5, 0.5),
            &Point3::new(5.0, 0.5, 0.5),
            &t,
        );
        assert_relative_eq!((s - q).norm(), 0.5, epsilon = 1e-9);
    }
}
