//! Converting paths into the outlines of their strokes.
//!
//! The stroker walks each subpath once and builds two offset polylines at a
//! distance of half the line width, one on each side. Corners get joins, open
//! ends get caps, and the left side is finally connected with the reversed
//! right side into a single outline. The outline is meant to be filled using
//! the non-zero winding rule; overlapping parts of it simply reinforce each
//! other.

use crate::bezier::{
    collinear_points, end_tangent, is_collinear, is_nearly_zero, quad_to_cubic, start_tangent,
    tangent_at,
};
use crate::dash::dash;
use crate::path::{FillRule, Path, Segment, Subpath};
use crate::style::{LineCap, LineJoin, StrokeStyle};
use core::f64::consts::{FRAC_PI_2, PI};
use kurbo::{CubicBez, ParamCurve, Point, Vec2};

/// The maximum number of times a curve is split in half while offsetting.
const MAX_SUBDIVISION_DEPTH: u32 = 20;

/// Stroke a path, using a tolerance derived from the line width.
pub fn stroke(path: &Path, style: &StrokeStyle) -> Path {
    stroke_with_tolerance(path, style, default_tolerance(style.width))
}

/// The tolerance [`stroke`] uses for a given line width.
pub fn default_tolerance(width: f64) -> f64 {
    (width.abs() * 0.005).clamp(1e-4, 0.25)
}

/// Stroke a path.
///
/// `tolerance` is the maximum distance by which offset curves may deviate
/// from their exact position. The result is a closed outline using the
/// non-zero winding rule. A line width of zero yields an empty path.
pub fn stroke_with_tolerance(path: &Path, style: &StrokeStyle, tolerance: f64) -> Path {
    let style = style.sanitized();
    let mut out = Path::with_fill_rule(FillRule::NonZero);

    if style.width == 0.0 || path.is_empty() {
        return out;
    }

    let tolerance = if tolerance.is_finite() && tolerance > 0.0 {
        tolerance
    } else {
        default_tolerance(style.width)
    };

    let stroker = Stroker {
        hw: style.width / 2.0,
        cap: style.cap,
        join: style.join,
        miter_limit: style.miter_limit,
        tolerance,
    };

    match &style.dash {
        Some(pattern) => {
            for piece in dash(path, pattern, tolerance) {
                let segs = piece
                    .points
                    .windows(2)
                    .filter(|w| !is_nearly_zero(w[1] - w[0]))
                    .map(|w| Seg::Line(w[0], w[1]))
                    .collect::<Vec<_>>();

                stroker.stroke_segments(piece.points[0], &segs, piece.closed, true, &mut out);
            }
        }
        None => {
            for subpath in path.subpaths() {
                let segs = stroker.prepare(&subpath);
                let drawn = !subpath.segments.is_empty() || subpath.closed;

                stroker.stroke_segments(subpath.start, &segs, subpath.closed, drawn, &mut out);
            }
        }
    }

    out
}

#[derive(Debug, Clone, Copy)]
enum Seg {
    Line(Point, Point),
    Cubic(CubicBez),
}

impl Seg {
    fn start(&self) -> Point {
        match self {
            Self::Line(p, _) => *p,
            Self::Cubic(c) => c.p0,
        }
    }

    fn end(&self) -> Point {
        match self {
            Self::Line(_, p) => *p,
            Self::Cubic(c) => c.p3,
        }
    }

    fn start_dir(&self) -> Vec2 {
        match self {
            Self::Line(a, b) => *b - *a,
            Self::Cubic(c) => start_tangent(c).unwrap_or(Vec2::new(1.0, 0.0)),
        }
    }

    fn end_dir(&self) -> Vec2 {
        match self {
            Self::Line(a, b) => *b - *a,
            Self::Cubic(c) => end_tangent(c).unwrap_or(Vec2::new(1.0, 0.0)),
        }
    }
}

/// A piece of one side of the outline.
#[derive(Debug, Clone, Copy)]
enum Piece {
    Line(Point, Point),
    Cubic(CubicBez),
}

impl Piece {
    fn start(&self) -> Point {
        match self {
            Self::Line(p, _) => *p,
            Self::Cubic(c) => c.p0,
        }
    }

    fn reversed(&self) -> Self {
        match *self {
            Self::Line(a, b) => Self::Line(b, a),
            Self::Cubic(c) => Self::Cubic(CubicBez::new(c.p3, c.p2, c.p1, c.p0)),
        }
    }

    fn append_to(&self, out: &mut Path) {
        match *self {
            Self::Line(_, b) => out.line_to(b),
            Self::Cubic(c) => out.cubic_to(c.p1, c.p2, c.p3),
        }
    }
}

struct Stroker {
    hw: f64,
    cap: LineCap,
    join: LineJoin,
    miter_limit: f64,
    tolerance: f64,
}

impl Stroker {
    /// Convert a subpath into non-degenerate segments.
    fn prepare(&self, subpath: &Subpath<'_>) -> Vec<Seg> {
        let mut segs = vec![];
        let mut cur = subpath.start;
        let collinear_eps = self.tolerance * 0.01;

        let push_seg = |segs: &mut Vec<Seg>, a: Point, b: Point| {
            if !is_nearly_zero(b - a) {
                segs.push(Seg::Line(a, b));
            }
        };

        for seg in subpath.segments {
            let cubic = match *seg {
                Segment::LineTo(p) => {
                    push_seg(&mut segs, cur, p);
                    cur = p;
                    continue;
                }
                Segment::QuadTo(p1, p2) => quad_to_cubic(cur, p1, p2),
                Segment::CubicTo(p1, p2, p3) => CubicBez::new(cur, p1, p2, p3),
                Segment::MoveTo(_) | Segment::Close => continue,
            };

            if is_collinear(&cubic, collinear_eps) {
                // Degenerate curves are drawn as the lines they retrace.
                for w in collinear_points(&cubic).windows(2) {
                    push_seg(&mut segs, w[0], w[1]);
                }
            } else {
                segs.push(Seg::Cubic(cubic));
            }

            cur = cubic.p3;
        }

        if subpath.closed {
            push_seg(&mut segs, cur, subpath.start);
        }

        segs
    }

    fn stroke_segments(
        &self,
        start: Point,
        segs: &[Seg],
        closed: bool,
        drawn: bool,
        out: &mut Path,
    ) {
        if segs.is_empty() {
            // A zero-length subpath only shows up with round or square caps.
            if drawn {
                self.dot(start, out);
            }

            return;
        }

        let mut left = vec![];
        let mut right = vec![];

        for (i, seg) in segs.iter().enumerate() {
            self.offset(seg, self.hw, &mut left);
            self.offset(seg, -self.hw, &mut right);

            let next = if i + 1 < segs.len() {
                Some(&segs[i + 1])
            } else if closed {
                Some(&segs[0])
            } else {
                None
            };

            if let Some(next) = next {
                self.join(seg.end(), seg.end_dir(), next.start_dir(), &mut left, &mut right);
            }
        }

        if closed {
            emit_loop(&left, out);
            right.reverse();
            let right = right.iter().map(Piece::reversed).collect::<Vec<_>>();
            emit_loop(&right, out);
        } else {
            let mut outline = left;
            let last = &segs[segs.len() - 1];
            let first = &segs[0];

            self.cap_end(last.end(), last.end_dir(), &mut outline);
            outline.extend(right.iter().rev().map(Piece::reversed));
            self.cap_end(first.start(), -first.start_dir(), &mut outline);

            emit_loop(&outline, out);
        }
    }

    /// Offset a segment by the signed distance `d` along its left normal.
    fn offset(&self, seg: &Seg, d: f64, out: &mut Vec<Piece>) {
        match seg {
            Seg::Line(a, b) => {
                let n = normal(*b - *a) * d;
                out.push(Piece::Line(*a + n, *b + n));
            }
            Seg::Cubic(c) => self.offset_cubic(c, d, 0, out),
        }
    }

    fn offset_cubic(&self, c: &CubicBez, d: f64, depth: u32, out: &mut Vec<Piece>) {
        let (Some(t0), Some(t1)) = (start_tangent(c), end_tangent(c)) else {
            return;
        };

        let q0 = c.p0 + normal(t0) * d;
        let q3 = c.p3 + normal(t1) * d;

        let exact = |t: f64| -> Option<Point> {
            tangent_at(c, t).map(|tan| c.eval(t) + normal(tan) * d)
        };

        let turns_sharply = t0.normalize().dot(t1.normalize()) < 0.5;

        if depth < MAX_SUBDIVISION_DEPTH && turns_sharply {
            return self.split_and_offset(c, d, depth, out);
        }

        // Approximate the offset by moving the end points along their normals
        // and scaling the control arms so that the midpoint is exact.
        let arms = (c.p1 - c.p0) + (c.p2 - c.p3);

        if arms.hypot2() > 1e-18
            && let Some(mid) = exact(0.5)
        {
            let k = (mid - q0.midpoint(q3)).dot(arms) * 8.0 / (3.0 * arms.hypot2());
            let candidate = CubicBez::new(q0, q0 + (c.p1 - c.p0) * k, q3 + (c.p2 - c.p3) * k, q3);

            let within_tolerance = [0.25, 0.75].into_iter().all(|t| {
                exact(t).is_none_or(|p| candidate.eval(t).distance(p) <= self.tolerance)
            });

            if within_tolerance || depth >= MAX_SUBDIVISION_DEPTH {
                out.push(Piece::Cubic(candidate));
                return;
            }
        } else if depth >= MAX_SUBDIVISION_DEPTH {
            out.push(Piece::Line(q0, q3));
            return;
        }

        self.split_and_offset(c, d, depth, out);
    }

    fn split_and_offset(&self, c: &CubicBez, d: f64, depth: u32, out: &mut Vec<Piece>) {
        let (a, b) = c.subdivide();
        self.offset_cubic(&a, d, depth + 1, out);
        self.offset_cubic(&b, d, depth + 1, out);
    }

    /// Add the joins between two segments meeting at `v` to both sides.
    fn join(&self, v: Point, a: Vec2, b: Vec2, left: &mut Vec<Piece>, right: &mut Vec<Piece>) {
        let (ua, ub) = (a.normalize(), b.normalize());
        let (na, nb) = (normal(ua), normal(ub));
        let hw = self.hw;

        let left_from = v + na * hw;
        let left_to = v + nb * hw;
        let right_from = v - na * hw;
        let right_to = v - nb * hw;

        // For tiny turns, simply connect both sides with a line.
        let eps = self.tolerance * 0.1;
        if (na - nb).hypot2() * hw * hw < eps * eps {
            push_line(left, left_from, left_to);
            push_line(right, right_from, right_to);
            return;
        }

        let cross = ua.cross(ub);
        let dot = ua.dot(ub);
        // A clockwise turn has its outer corner on the left. Full reversals
        // are arbitrarily treated the same way.
        let left_outer = cross < 0.0 || (cross.abs() <= 1e-12 && dot < 0.0);

        let (outer, outer_from, outer_to, sign) = if left_outer {
            (&mut *left, left_from, left_to, 1.0)
        } else {
            (&mut *right, right_from, right_to, -1.0)
        };

        match self.join {
            LineJoin::Bevel => push_line(outer, outer_from, outer_to),
            LineJoin::Miter => {
                // The miter length relative to the line width is
                // 1 / sin(phi / 2) for the angle phi between the segments,
                // where sin(phi / 2)^2 = (1 + dot) / 2.
                let within_limit =
                    (1.0 + dot) / 2.0 * self.miter_limit * self.miter_limit >= 1.0;

                if within_limit && 1.0 + dot > 1e-12 {
                    let tip = v + (na + nb) * (sign * hw / (1.0 + dot));
                    push_line(outer, outer_from, tip);
                    push_line(outer, tip, outer_to);
                } else {
                    push_line(outer, outer_from, outer_to);
                }
            }
            LineJoin::Round => {
                let sweep = cross.abs().atan2(dot);
                let sweep = if left_outer { -sweep } else { sweep };
                arc(v, outer_from, outer_to, sweep, outer);
            }
        }

        // The inner side pivots through the corner itself.
        let inner = if left_outer { right } else { left };
        let (inner_from, inner_to) = if left_outer {
            (right_from, right_to)
        } else {
            (left_from, left_to)
        };

        push_line(inner, inner_from, v);
        push_line(inner, v, inner_to);
    }

    /// Add a cap at `p`, where the path travels in direction `dir`, going
    /// from the left side to the right side.
    fn cap_end(&self, p: Point, dir: Vec2, out: &mut Vec<Piece>) {
        let d = dir.normalize() * self.hw;
        let n = normal(dir) * self.hw;
        let (from, to) = (p + n, p - n);

        match self.cap {
            LineCap::Butt => push_line(out, from, to),
            LineCap::Square => {
                push_line(out, from, from + d);
                push_line(out, from + d, to + d);
                push_line(out, to + d, to);
            }
            LineCap::Round => arc(p, from, to, -PI, out),
        }
    }

    fn dot(&self, p: Point, out: &mut Path) {
        let hw = self.hw;

        match self.cap {
            LineCap::Butt => {}
            LineCap::Square => {
                out.push_rect(p.x - hw, p.y - hw, 2.0 * hw, 2.0 * hw);
            }
            LineCap::Round => {
                let from = p + Vec2::new(hw, 0.0);
                let mid = p - Vec2::new(hw, 0.0);
                let mut pieces = vec![];
                arc(p, from, mid, PI, &mut pieces);
                arc(p, mid, from, PI, &mut pieces);
                emit_loop(&pieces, out);
            }
        }
    }
}

fn normal(v: Vec2) -> Vec2 {
    let v = v.normalize();
    Vec2::new(-v.y, v.x)
}

fn push_line(out: &mut Vec<Piece>, from: Point, to: Point) {
    if !is_nearly_zero(to - from) {
        out.push(Piece::Line(from, to));
    }
}

/// Append a circular arc around `center` from `from` to `to`, sweeping by
/// `sweep` radians (counter-clockwise if positive).
///
/// The arc is made of cubic pieces spanning at most a quarter circle each.
fn arc(center: Point, from: Point, to: Point, sweep: f64, out: &mut Vec<Piece>) {
    let radius_vec = from - center;
    let r = radius_vec.length();

    if r == 0.0 || sweep == 0.0 {
        push_line(out, from, to);
        return;
    }

    let n = (sweep.abs() / FRAC_PI_2).ceil().max(1.0) as usize;
    let step = sweep / n as f64;
    let k = 4.0 / 3.0 * (step / 4.0).tan();
    let start_angle = radius_vec.atan2();

    let mut p0 = from;

    for i in 0..n {
        let a0 = start_angle + step * i as f64;
        let a1 = a0 + step;
        let p3 = if i + 1 == n {
            to
        } else {
            center + Vec2::from_angle(a1) * r
        };

        let p1 = p0 + Vec2::new(-a0.sin(), a0.cos()) * (k * r);
        let p2 = p3 - Vec2::new(-a1.sin(), a1.cos()) * (k * r);

        out.push(Piece::Cubic(CubicBez::new(p0, p1, p2, p3)));
        p0 = p3;
    }
}

fn emit_loop(pieces: &[Piece], out: &mut Path) {
    let Some(first) = pieces.first() else {
        return;
    };

    out.move_to(first.start());

    for piece in pieces {
        piece.append_to(out);
    }

    out.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Rect, Shape};

    fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> Path {
        let mut path = Path::new();
        path.move_to((x0, y0));
        path.line_to((x1, y1));
        path
    }

    fn area(path: &Path) -> f64 {
        path.to_bez_path().area().abs()
    }

    #[test]
    fn butt_line_outline() {
        let outline = stroke(&line(0.0, 0.0, 10.0, 0.0), &StrokeStyle::new(2.0));

        assert_eq!(outline.fill_rule(), FillRule::NonZero);
        let bounds = outline.bounds().unwrap();
        assert!((bounds.x0 - 0.0).abs() < 1e-9);
        assert!((bounds.x1 - 10.0).abs() < 1e-9);
        assert!((bounds.y0 + 1.0).abs() < 1e-9);
        assert!((bounds.y1 - 1.0).abs() < 1e-9);
        assert!((area(&outline) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn square_cap_extends() {
        let style = StrokeStyle::new(2.0).with_cap(LineCap::Square);
        let bounds = stroke(&line(0.0, 0.0, 10.0, 0.0), &style).bounds().unwrap();

        assert!((bounds.x0 + 1.0).abs() < 1e-9);
        assert!((bounds.x1 - 11.0).abs() < 1e-9);
    }

    #[test]
    fn round_cap_area() {
        let style = StrokeStyle::new(2.0).with_cap(LineCap::Round);
        let outline = stroke(&line(0.0, 0.0, 10.0, 0.0), &style);

        // A rectangle plus one full circle of radius 1.
        assert!((area(&outline) - (20.0 + PI)).abs() < 0.01);
    }

    #[test]
    fn miter_join_corner() {
        let mut path = Path::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        path.line_to((10.0, 10.0));

        let outline = stroke(&path, &StrokeStyle::new(2.0));
        let bounds = outline.bounds().unwrap();

        // The miter reaches the outer corner at (11, -1).
        assert!((bounds.x1 - 11.0).abs() < 1e-9);
        assert!((bounds.y0 + 1.0).abs() < 1e-9);
    }

    #[test]
    fn miter_limit_falls_back_to_bevel() {
        let mut path = Path::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        path.line_to((0.0, 1.0));

        let mitered = stroke(&path, &StrokeStyle::new(2.0).with_miter_limit(100.0));
        let beveled = stroke(&path, &StrokeStyle::new(2.0).with_miter_limit(1.5));

        assert!(mitered.bounds().unwrap().x1 > 15.0);
        assert!(beveled.bounds().unwrap().x1 < 11.5);
    }

    #[test]
    fn round_join_stays_within_radius() {
        let mut path = Path::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        path.line_to((10.0, 10.0));

        let style = StrokeStyle::new(2.0).with_join(LineJoin::Round);
        let bounds = stroke(&path, &style).bounds().unwrap();

        assert!((bounds.x1 - 11.0).abs() < 1e-9);
        assert!((bounds.y0 + 1.0).abs() < 1e-9);
    }

    #[test]
    fn closed_rect_has_hole() {
        let path = Path::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let outline = stroke(&path, &StrokeStyle::new(2.0));
        let bez = outline.to_bez_path();

        assert_eq!(outline.subpaths().len(), 2);
        assert_eq!(bez.winding(Point::new(5.0, 5.0)), 0);
        assert_ne!(bez.winding(Point::new(10.0, 5.0)), 0);
        assert_ne!(bez.winding(Point::new(10.9, 10.9)), 0);
        assert_eq!(bez.winding(Point::new(11.1, 5.0)), 0);
    }

    #[test]
    fn zero_length_subpaths() {
        let path = line(5.0, 5.0, 5.0, 5.0);

        assert!(stroke(&path, &StrokeStyle::new(2.0)).is_empty());

        let square = stroke(&path, &StrokeStyle::new(2.0).with_cap(LineCap::Square));
        assert_eq!(square.bounds(), Some(Rect::new(4.0, 4.0, 6.0, 6.0)));

        let round = stroke(&path, &StrokeStyle::new(2.0).with_cap(LineCap::Round));
        assert!((area(&round) - PI).abs() < 0.01);
    }

    #[test]
    fn lone_move_draws_nothing() {
        let mut path = Path::new();
        path.move_to((1.0, 1.0));

        let style = StrokeStyle::new(2.0).with_cap(LineCap::Round);
        assert!(stroke(&path, &style).is_empty());
    }

    #[test]
    fn zero_width_is_empty() {
        assert!(stroke(&line(0.0, 0.0, 1.0, 1.0), &StrokeStyle::new(0.0)).is_empty());
    }

    #[test]
    fn curve_offset_is_accurate() {
        // A quarter circle of radius 50.
        let k = 0.5522847498 * 50.0;
        let mut path = Path::new();
        path.move_to((50.0, 0.0));
        path.cubic_to((50.0, k), (k, 50.0), (0.0, 50.0));

        let outline = stroke(&path, &StrokeStyle::new(10.0));
        let bez = outline.to_bez_path();

        for i in 1..10 {
            let angle = FRAC_PI_2 * i as f64 / 10.0;
            let dir = Vec2::from_angle(angle);
            assert_ne!(bez.winding(Point::ORIGIN + dir * 50.0), 0);
            assert_ne!(bez.winding(Point::ORIGIN + dir * 54.5), 0);
            assert_ne!(bez.winding(Point::ORIGIN + dir * 45.5), 0);
            assert_eq!(bez.winding(Point::ORIGIN + dir * 55.5), 0);
            assert_eq!(bez.winding(Point::ORIGIN + dir * 44.5), 0);
        }
    }

    #[test]
    fn collinear_curve_is_stroked_as_line() {
        let mut path = Path::new();
        path.move_to((0.0, 0.0));
        path.cubic_to((1.0, 0.0), (2.0, 0.0), (10.0, 0.0));

        let outline = stroke(&path, &StrokeStyle::new(2.0));
        assert!((area(&outline) - 20.0).abs() < 1e-6);
    }

    #[test]
    fn deterministic() {
        let mut path = Path::new();
        path.move_to((0.0, 0.0));
        path.cubic_to((30.0, 40.0), (60.0, -40.0), (90.0, 0.0));
        path.line_to((90.0, 50.0));
        let style = StrokeStyle::new(3.0).with_join(LineJoin::Round);

        assert_eq!(stroke(&path, &style), stroke(&path, &style));
    }
}
