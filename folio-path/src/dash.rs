//! Breaking paths into dashes.

use crate::bezier::{flatten_cubic, quad_to_cubic};
use crate::path::{Path, Segment, Subpath};
use crate::style::Dash;
use kurbo::{CubicBez, Point};
use log::warn;
use smallvec::SmallVec;

/// The length an "on" interval of zero length is replaced with.
pub const DASH_EPSILON: f64 = 0.01;

/// The maximum number of dashes a single subpath may produce before dashing
/// is abandoned in favor of a solid line.
const MAX_DASHES: f64 = 1_000_000.0;

/// A painted stretch of a dashed path, as a polyline.
#[derive(Debug, Clone, PartialEq)]
pub struct DashSegment {
    /// The points of the polyline. There are always at least two.
    pub points: Vec<Point>,
    /// Whether the dash is a whole closed subpath that was never
    /// interrupted, in which case it has no ends.
    pub closed: bool,
}

impl DashSegment {
    /// The length of the polyline.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }
}

/// The effective dash intervals: odd-length arrays are repeated once, and
/// "on" intervals of zero length are replaced by [`DASH_EPSILON`].
fn intervals(dash: &Dash) -> SmallVec<[f64; 8]> {
    let mut out: SmallVec<[f64; 8]> = dash.array().iter().copied().collect();

    if out.len() % 2 == 1 {
        let first = out.clone();
        out.extend_from_slice(&first);
    }

    for on in out.iter_mut().step_by(2) {
        if *on == 0.0 {
            *on = DASH_EPSILON;
        }
    }

    out
}

/// Split a path into its dashes.
///
/// Curves are approximated by chords no further than `tolerance` away from
/// them. The pattern restarts at the beginning of each subpath. If the pattern
/// wraps around the closing point of a closed subpath, the last and first
/// dash are joined into one.
pub fn dash(path: &Path, dash: &Dash, tolerance: f64) -> Vec<DashSegment> {
    let pattern = intervals(dash);
    let total: f64 = pattern.iter().sum();
    let mut out = vec![];

    for subpath in path.subpaths() {
        let points = flatten(&subpath, tolerance);
        let length: f64 = points.windows(2).map(|w| w[0].distance(w[1])).sum();

        if length / total > MAX_DASHES {
            warn!("dash pattern too fine for path of length {length}, drawing solid line");

            out.push(DashSegment {
                points,
                closed: subpath.closed,
            });
            continue;
        }

        dash_polyline(&points, subpath.closed, &pattern, total, dash.phase(), &mut out);
    }

    out
}

fn flatten(subpath: &Subpath<'_>, tolerance: f64) -> Vec<Point> {
    let mut points = vec![subpath.start];
    let mut cur = subpath.start;

    for seg in subpath.segments {
        match *seg {
            Segment::LineTo(p) => points.push(p),
            Segment::QuadTo(p1, p2) => flatten_cubic(&quad_to_cubic(cur, p1, p2), tolerance, &mut points),
            Segment::CubicTo(p1, p2, p3) => {
                flatten_cubic(&CubicBez::new(cur, p1, p2, p3), tolerance, &mut points);
            }
            Segment::MoveTo(_) | Segment::Close => {}
        }

        if let Some(p) = seg.end_point() {
            cur = p;
        }
    }

    if subpath.closed && cur != subpath.start {
        points.push(subpath.start);
    }

    points
}

fn dash_polyline(
    points: &[Point],
    closed: bool,
    pattern: &[f64],
    total: f64,
    phase: f64,
    out: &mut Vec<DashSegment>,
) {
    if points.len() < 2 {
        return;
    }

    // Find the interval the phase lands in.
    let mut phase = phase % total;
    let mut idx = 0;

    while phase >= pattern[idx] {
        phase -= pattern[idx];
        idx = (idx + 1) % pattern.len();
    }

    let mut remaining = pattern[idx] - phase;
    let starts_on = idx % 2 == 0;
    let mut cur: Option<Vec<Point>> = starts_on.then(|| vec![points[0]]);
    let mut dashes: Vec<Vec<Point>> = vec![];
    let mut interrupted = false;

    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        let len = a.distance(b);
        let mut pos = 0.0;

        while len - pos > remaining {
            pos += remaining;
            let p = a.lerp(b, pos / len);

            match cur.take() {
                Some(mut dash) => {
                    dash.push(p);
                    dashes.push(dash);
                }
                None => cur = Some(vec![p]),
            }

            interrupted = true;
            idx = (idx + 1) % pattern.len();
            remaining = pattern[idx];
        }

        remaining -= len - pos;

        if let Some(dash) = &mut cur {
            dash.push(b);
        }
    }

    let ends_on = cur.is_some();

    if let Some(dash) = cur {
        dashes.push(dash);
    }

    if closed && !interrupted {
        out.extend(dashes.into_iter().map(|points| DashSegment {
            points,
            closed: true,
        }));
        return;
    }

    if closed && starts_on && ends_on && dashes.len() >= 2 {
        // The pattern wraps around the closing point, so the last dash
        // continues into the first.
        if let Some(mut last) = dashes.pop() {
            last.extend_from_slice(&dashes[0][1..]);
            dashes[0] = last;
        }
    }

    out.extend(
        dashes
            .into_iter()
            .filter(|d| d.len() >= 2)
            .map(|points| DashSegment {
                points,
                closed: false,
            }),
    );
}
