//! Helpers for working with Bézier curves.

use kurbo::{CubicBez, ParamCurve, ParamCurveDeriv, Point, QuadBez, Vec2};
use smallvec::{SmallVec, smallvec};

/// Squared lengths below this are treated as zero.
pub(crate) const NEARLY_ZERO_SQ: f64 = 1e-18;

pub(crate) fn quad_to_cubic(p0: Point, p1: Point, p2: Point) -> CubicBez {
    QuadBez::new(p0, p1, p2).raise()
}

pub(crate) fn is_nearly_zero(v: Vec2) -> bool {
    v.hypot2() <= NEARLY_ZERO_SQ
}

/// The direction the curve leaves its start point in.
pub(crate) fn start_tangent(c: &CubicBez) -> Option<Vec2> {
    [c.p1 - c.p0, c.p2 - c.p0, c.p3 - c.p0]
        .into_iter()
        .find(|v| !is_nearly_zero(*v))
}

/// The direction the curve arrives at its end point in.
pub(crate) fn end_tangent(c: &CubicBez) -> Option<Vec2> {
    [c.p3 - c.p2, c.p3 - c.p1, c.p3 - c.p0]
        .into_iter()
        .find(|v| !is_nearly_zero(*v))
}

/// The tangent direction at parameter `t`.
///
/// At cusps, where the derivative vanishes, the second derivative or the
/// chord is used instead.
pub(crate) fn tangent_at(c: &CubicBez, t: f64) -> Option<Vec2> {
    if t <= 0.0 {
        return start_tangent(c);
    }

    if t >= 1.0 {
        return end_tangent(c);
    }

    let d1 = c.deriv();
    let v = d1.eval(t).to_vec2();

    if !is_nearly_zero(v) {
        return Some(v);
    }

    let v = d1.deriv().eval(t).to_vec2();

    if !is_nearly_zero(v) {
        return Some(v);
    }

    Some(c.p3 - c.p0).filter(|v| !is_nearly_zero(*v))
}

/// Whether all control points lie within `eps` of one straight line.
pub(crate) fn is_collinear(c: &CubicBez, eps: f64) -> bool {
    let Some((origin, dir)) = line_of(c) else {
        // All points coincide.
        return true;
    };

    let len = dir.length();

    [c.p0, c.p1, c.p2, c.p3]
        .iter()
        .all(|p| ((*p - origin).cross(dir) / len).abs() <= eps)
}

/// Split a collinear curve into the points at which it changes direction.
///
/// The result starts with the start point and ends with the end point of the
/// curve, so consecutive points describe straight lines that retrace the
/// curve.
pub(crate) fn collinear_points(c: &CubicBez) -> SmallVec<[Point; 4]> {
    let Some((_, dir)) = line_of(c) else {
        return smallvec![c.p0, c.p3];
    };

    // Project the curve onto the line, giving a one-dimensional cubic
    // polynomial whose derivative roots are the turning points.
    let proj = |p: Point| p.to_vec2().dot(dir);
    let (x0, x1, x2, x3) = (proj(c.p0), proj(c.p1), proj(c.p2), proj(c.p3));

    let a = 3.0 * (-x0 + 3.0 * x1 - 3.0 * x2 + x3);
    let b = 6.0 * (x0 - 2.0 * x1 + x2);
    let cc = 3.0 * (x1 - x0);

    let mut roots = solve_quadratic(a, b, cc);
    roots.retain(|t| *t > 1e-9 && *t < 1.0 - 1e-9);
    roots.sort_by(f64::total_cmp);

    let mut points = smallvec![c.p0];
    points.extend(roots.iter().map(|t| c.eval(*t)));
    points.push(c.p3);

    points
}

fn line_of(c: &CubicBez) -> Option<(Point, Vec2)> {
    let chord = c.p3 - c.p0;

    if !is_nearly_zero(chord) {
        return Some((c.p0, chord));
    }

    // Start and end coincide, use the control point farthest away instead.
    [c.p1, c.p2]
        .into_iter()
        .map(|p| p - c.p0)
        .filter(|v| !is_nearly_zero(*v))
        .max_by(|a, b| a.hypot2().total_cmp(&b.hypot2()))
        .map(|v| (c.p0, v))
}

/// Roots of `a*t^2 + b*t + c`.
pub(crate) fn solve_quadratic(a: f64, b: f64, c: f64) -> SmallVec<[f64; 2]> {
    const EPS: f64 = 1e-12;

    if a.abs() < EPS {
        if b.abs() < EPS {
            return SmallVec::new();
        }

        return smallvec![-c / b];
    }

    let disc = b * b - 4.0 * a * c;

    if disc < 0.0 {
        return SmallVec::new();
    }

    if disc == 0.0 {
        return smallvec![-b / (2.0 * a)];
    }

    // Numerically stable variant avoiding cancellation.
    let q = -0.5 * (b + b.signum() * disc.sqrt());

    if q == 0.0 {
        return smallvec![0.0];
    }

    smallvec![q / a, c / q]
}

/// Append points approximating the curve with chords to `out`, excluding
/// the start point.
///
/// The number of chords is chosen so that no chord deviates from the curve by
/// more than `tolerance`.
pub(crate) fn flatten_cubic(c: &CubicBez, tolerance: f64, out: &mut Vec<Point>) {
    let dd = (c.p0.to_vec2() - 2.0 * c.p1.to_vec2() + c.p2.to_vec2())
        .length()
        .max((c.p1.to_vec2() - 2.0 * c.p2.to_vec2() + c.p3.to_vec2()).length());
    let tolerance = tolerance.max(1e-6);

    let n = (0.75 * dd / tolerance).sqrt().ceil().clamp(1.0, 1000.0) as usize;

    for i in 1..n {
        out.push(c.eval(i as f64 / n as f64));
    }

    out.push(c.p3);
}
