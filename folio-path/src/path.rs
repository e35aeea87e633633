//! The path model.

use kurbo::{Affine, BezPath, PathEl, Point, Rect, Shape};
use log::warn;

/// The winding rule that determines the interior of a path.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum FillRule {
    /// The non-zero winding rule.
    #[default]
    NonZero,
    /// The even-odd rule.
    EvenOdd,
}

/// A single path segment.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Segment {
    /// Start a new subpath.
    MoveTo(Point),
    /// A straight line to the given point.
    LineTo(Point),
    /// A quadratic Bézier curve with one control point.
    QuadTo(Point, Point),
    /// A cubic Bézier curve with two control points.
    CubicTo(Point, Point, Point),
    /// Close the current subpath.
    Close,
}

impl Segment {
    /// The end point of the segment, if it has one.
    pub fn end_point(&self) -> Option<Point> {
        match self {
            Self::MoveTo(p) | Self::LineTo(p) | Self::QuadTo(_, p) | Self::CubicTo(_, _, p) => {
                Some(*p)
            }
            Self::Close => None,
        }
    }

    fn transform(&self, t: Affine) -> Self {
        match *self {
            Self::MoveTo(p) => Self::MoveTo(t * p),
            Self::LineTo(p) => Self::LineTo(t * p),
            Self::QuadTo(p1, p2) => Self::QuadTo(t * p1, t * p2),
            Self::CubicTo(p1, p2, p3) => Self::CubicTo(t * p1, t * p2, t * p3),
            Self::Close => Self::Close,
        }
    }
}

/// A path made of lines and Bézier curves, together with a winding rule.
///
/// Every subpath starts with a [`Segment::MoveTo`]. Drawing operations that
/// are issued without a current point are ignored. After a subpath has been
/// closed, the next drawing operation implicitly starts a new subpath at the
/// start point of the closed one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    segments: Vec<Segment>,
    fill_rule: FillRule,
    start: Option<Point>,
    current: Option<Point>,
    needs_move: bool,
}

impl Path {
    /// Create a new, empty path with the non-zero winding rule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new, empty path with the given winding rule.
    pub fn with_fill_rule(fill_rule: FillRule) -> Self {
        Self {
            fill_rule,
            ..Self::default()
        }
    }

    /// Create a closed rectangular path.
    ///
    /// The rectangle is traversed starting at `(x0, y0)`, towards `(x1, y0)`.
    pub fn from_rect(rect: Rect) -> Self {
        let mut path = Self::new();
        path.push_rect(rect.x0, rect.y0, rect.width(), rect.height());

        path
    }

    /// Create a path from a kurbo path.
    pub fn from_bez_path(bez: &BezPath) -> Self {
        let mut path = Self::new();

        for el in bez.elements() {
            match *el {
                PathEl::MoveTo(p) => path.move_to(p),
                PathEl::LineTo(p) => path.line_to(p),
                PathEl::QuadTo(p1, p2) => path.quad_to(p1, p2),
                PathEl::CurveTo(p1, p2, p3) => path.cubic_to(p1, p2, p3),
                PathEl::ClosePath => path.close(),
            }
        }

        path
    }

    /// The winding rule of the path.
    pub fn fill_rule(&self) -> FillRule {
        self.fill_rule
    }

    /// Change the winding rule of the path.
    pub fn set_fill_rule(&mut self, fill_rule: FillRule) {
        self.fill_rule = fill_rule;
    }

    /// The segments of the path.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The current point, i.e. the point the next segment starts at.
    pub fn current_point(&self) -> Option<Point> {
        self.current
    }

    /// Start a new subpath at `p`.
    pub fn move_to(&mut self, p: impl Into<Point>) {
        let p = p.into();

        // Consecutive moves collapse into the last one.
        if let Some(Segment::MoveTo(last)) = self.segments.last_mut() {
            *last = p;
        } else {
            self.segments.push(Segment::MoveTo(p));
        }

        self.start = Some(p);
        self.current = Some(p);
        self.needs_move = false;
    }

    /// Append a straight line to `p`.
    pub fn line_to(&mut self, p: impl Into<Point>) {
        let p = p.into();

        if self.prepare_segment("line_to") {
            self.segments.push(Segment::LineTo(p));
            self.current = Some(p);
        }
    }

    /// Append a quadratic curve.
    pub fn quad_to(&mut self, p1: impl Into<Point>, p2: impl Into<Point>) {
        let p2 = p2.into();

        if self.prepare_segment("quad_to") {
            self.segments.push(Segment::QuadTo(p1.into(), p2));
            self.current = Some(p2);
        }
    }

    /// Append a cubic curve.
    pub fn cubic_to(&mut self, p1: impl Into<Point>, p2: impl Into<Point>, p3: impl Into<Point>) {
        let p3 = p3.into();

        if self.prepare_segment("cubic_to") {
            self.segments
                .push(Segment::CubicTo(p1.into(), p2.into(), p3));
            self.current = Some(p3);
        }
    }

    /// Close the current subpath with a straight line back to its start.
    pub fn close(&mut self) {
        if self.current.is_none() || self.needs_move {
            return;
        }

        self.segments.push(Segment::Close);
        self.current = self.start;
        self.needs_move = true;
    }

    /// Append a closed rectangle given by its origin and (possibly negative)
    /// size, the way the `re` operator describes it.
    pub fn push_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.move_to((x, y));
        self.line_to((x + width, y));
        self.line_to((x + width, y + height));
        self.line_to((x, y + height));
        self.close();
    }

    /// Append all subpaths of another path.
    pub fn extend(&mut self, other: &Self) {
        for seg in other.segments() {
            match *seg {
                Segment::MoveTo(p) => self.move_to(p),
                Segment::LineTo(p) => self.line_to(p),
                Segment::QuadTo(p1, p2) => self.quad_to(p1, p2),
                Segment::CubicTo(p1, p2, p3) => self.cubic_to(p1, p2, p3),
                Segment::Close => self.close(),
            }
        }
    }

    /// The exact bounding box of the path, or `None` if the path is empty.
    pub fn bounds(&self) -> Option<Rect> {
        if self.is_empty() {
            return None;
        }

        Some(self.to_bez_path().bounding_box())
    }

    /// Return a copy of the path with a transform applied to all points.
    #[must_use]
    pub fn transform(&self, transform: Affine) -> Self {
        let mut path = self.clone();
        path.apply_transform(transform);

        path
    }

    /// Apply a transform to all points of the path.
    pub fn apply_transform(&mut self, transform: Affine) {
        for seg in &mut self.segments {
            *seg = seg.transform(transform);
        }

        self.start = self.start.map(|p| transform * p);
        self.current = self.current.map(|p| transform * p);
    }

    /// Convert the path into a kurbo path.
    pub fn to_bez_path(&self) -> BezPath {
        let mut bez = BezPath::new();

        for seg in &self.segments {
            match *seg {
                Segment::MoveTo(p) => bez.move_to(p),
                Segment::LineTo(p) => bez.line_to(p),
                Segment::QuadTo(p1, p2) => bez.quad_to(p1, p2),
                Segment::CubicTo(p1, p2, p3) => bez.curve_to(p1, p2, p3),
                Segment::Close => bez.close_path(),
            }
        }

        bez
    }

    /// Split the path into its subpaths.
    pub fn subpaths(&self) -> Vec<Subpath<'_>> {
        let mut out = vec![];
        let mut i = 0;

        while i < self.segments.len() {
            let Segment::MoveTo(start) = self.segments[i] else {
                // Cannot happen through the public API, but be lenient.
                i += 1;
                continue;
            };

            let begin = i + 1;
            let mut end = begin;

            while end < self.segments.len()
                && !matches!(self.segments[end], Segment::MoveTo(_) | Segment::Close)
            {
                end += 1;
            }

            let closed = matches!(self.segments.get(end), Some(Segment::Close));

            out.push(Subpath {
                start,
                segments: &self.segments[begin..end],
                closed,
            });

            i = if closed { end + 1 } else { end };
        }

        out
    }

    fn prepare_segment(&mut self, op: &str) -> bool {
        if self.current.is_none() {
            warn!("{op} without a current point, ignoring");

            return false;
        }

        if self.needs_move
            && let Some(start) = self.start
        {
            self.segments.push(Segment::MoveTo(start));
            self.needs_move = false;
        }

        true
    }
}

/// A view of a single subpath.
#[derive(Debug, Clone, Copy)]
pub struct Subpath<'a> {
    /// The point the subpath starts at.
    pub start: Point,
    /// The segments after the initial move, never containing moves or
    /// closes.
    pub segments: &'a [Segment],
    /// Whether the subpath was explicitly closed.
    pub closed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_without_current_point_is_ignored() {
        let mut path = Path::new();
        path.line_to((1.0, 1.0));
        path.cubic_to((1.0, 1.0), (2.0, 2.0), (3.0, 3.0));

        assert!(path.is_empty());
        assert_eq!(path.current_point(), None);
    }

    #[test]
    fn implicit_move_after_close() {
        let mut path = Path::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        path.close();
        path.line_to((0.0, 10.0));

        assert_eq!(
            path.segments(),
            &[
                Segment::MoveTo(Point::new(0.0, 0.0)),
                Segment::LineTo(Point::new(10.0, 0.0)),
                Segment::Close,
                Segment::MoveTo(Point::new(0.0, 0.0)),
                Segment::LineTo(Point::new(0.0, 10.0)),
            ]
        );
    }

    #[test]
    fn consecutive_moves_collapse() {
        let mut path = Path::new();
        path.move_to((0.0, 0.0));
        path.move_to((5.0, 5.0));

        assert_eq!(path.segments(), &[Segment::MoveTo(Point::new(5.0, 5.0))]);
    }

    #[test]
    fn rect_bounds() {
        let path = Path::from_rect(Rect::new(10.0, 10.0, 90.0, 90.0));

        assert_eq!(path.bounds(), Some(Rect::new(10.0, 10.0, 90.0, 90.0)));
        assert_eq!(path.subpaths().len(), 1);
        assert!(path.subpaths()[0].closed);
    }

    #[test]
    fn curve_bounds_are_tight() {
        let mut path = Path::new();
        path.move_to((0.0, 0.0));
        path.cubic_to((0.0, 10.0), (10.0, 10.0), (10.0, 0.0));

        let bounds = path.bounds().unwrap();
        assert!((bounds.y1 - 7.5).abs() < 1e-9);
    }

    #[test]
    fn transform() {
        let path = Path::from_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
        let scaled = path.transform(Affine::scale(2.0));

        assert_eq!(scaled.bounds(), Some(Rect::new(0.0, 0.0, 2.0, 2.0)));
        assert_eq!(scaled.current_point(), Some(Point::ZERO));
    }

    #[test]
    fn subpaths() {
        let mut path = Path::new();
        path.move_to((0.0, 0.0));
        path.line_to((1.0, 0.0));
        path.move_to((5.0, 5.0));
        path.line_to((6.0, 5.0));
        path.line_to((6.0, 6.0));
        path.close();

        let subpaths = path.subpaths();
        assert_eq!(subpaths.len(), 2);
        assert!(!subpaths[0].closed);
        assert_eq!(subpaths[0].segments.len(), 1);
        assert!(subpaths[1].closed);
        assert_eq!(subpaths[1].start, Point::new(5.0, 5.0));
        assert_eq!(subpaths[1].segments.len(), 2);
    }
}
