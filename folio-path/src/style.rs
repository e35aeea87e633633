//! Stroke styles.

use log::warn;
use smallvec::SmallVec;

/// The shape at the ends of open subpaths.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum LineCap {
    /// The stroke ends exactly at the end point.
    #[default]
    Butt,
    /// A semicircle around the end point.
    Round,
    /// A square extending half the line width beyond the end point.
    Square,
}

impl LineCap {
    /// Convert the numeric value used by the `J` operator.
    pub fn from_number(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Butt),
            1 => Some(Self::Round),
            2 => Some(Self::Square),
            _ => None,
        }
    }
}

/// The shape at corners between segments.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum LineJoin {
    /// Extend the outer edges until they meet, subject to the miter limit.
    #[default]
    Miter,
    /// A circular arc around the corner.
    Round,
    /// A straight line cutting off the corner.
    Bevel,
}

impl LineJoin {
    /// Convert the numeric value used by the `j` operator.
    pub fn from_number(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Miter),
            1 => Some(Self::Round),
            2 => Some(Self::Bevel),
            _ => None,
        }
    }
}

/// A dash pattern.
///
/// The array alternates between the lengths of painted and unpainted
/// stretches. A pattern always has at least one element, no negative
/// elements, and not all of its elements are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Dash {
    array: SmallVec<[f64; 4]>,
    phase: f64,
}

impl Dash {
    /// Create a new dash pattern.
    ///
    /// Returns `None` if the array is empty, contains negative or non-finite
    /// values or only zeros, in which case lines are drawn solid.
    pub fn new(array: &[f64], phase: f64) -> Option<Self> {
        if array.is_empty() {
            return None;
        }

        if array.iter().any(|v| !v.is_finite() || *v < 0.0) {
            warn!("invalid dash array {array:?}, drawing solid lines");

            return None;
        }

        if array.iter().all(|v| *v == 0.0) {
            warn!("dash array only contains zeros, drawing solid lines");

            return None;
        }

        Some(Self {
            array: SmallVec::from_slice(array),
            phase: if phase.is_finite() { phase.max(0.0) } else { 0.0 },
        })
    }

    /// The lengths of the pattern.
    pub fn array(&self) -> &[f64] {
        &self.array
    }

    /// The distance into the pattern at which to start.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Return a copy of the pattern with all lengths scaled by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            array: self.array.iter().map(|v| v * factor).collect(),
            phase: self.phase * factor,
        }
    }
}

/// All properties that describe how a path is stroked.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    /// The line width. A width of zero denotes the thinnest line that can be
    /// rendered.
    pub width: f64,
    /// The line cap.
    pub cap: LineCap,
    /// The line join.
    pub join: LineJoin,
    /// The miter limit, at least 1.
    pub miter_limit: f64,
    /// The dash pattern, if lines are dashed.
    pub dash: Option<Dash>,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            width: 1.0,
            cap: LineCap::Butt,
            join: LineJoin::Miter,
            miter_limit: 10.0,
            dash: None,
        }
    }
}

impl StrokeStyle {
    /// Create a solid stroke style with the given width and default
    /// properties otherwise.
    pub fn new(width: f64) -> Self {
        Self {
            width,
            ..Self::default()
        }
    }

    /// Builder-style setter for the line cap.
    #[must_use]
    pub fn with_cap(mut self, cap: LineCap) -> Self {
        self.cap = cap;
        self
    }

    /// Builder-style setter for the line join.
    #[must_use]
    pub fn with_join(mut self, join: LineJoin) -> Self {
        self.join = join;
        self
    }

    /// Builder-style setter for the miter limit.
    #[must_use]
    pub fn with_miter_limit(mut self, miter_limit: f64) -> Self {
        self.miter_limit = miter_limit;
        self
    }

    /// Builder-style setter for the dash pattern.
    #[must_use]
    pub fn with_dash(mut self, dash: Option<Dash>) -> Self {
        self.dash = dash;
        self
    }

    /// Clamp all properties into their valid ranges.
    pub(crate) fn sanitized(&self) -> Self {
        Self {
            width: if self.width.is_finite() {
                self.width.abs()
            } else {
                0.0
            },
            miter_limit: if self.miter_limit.is_finite() {
                self.miter_limit.max(1.0)
            } else {
                1.0
            },
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_dashes() {
        assert!(Dash::new(&[], 0.0).is_none());
        assert!(Dash::new(&[0.0, 0.0], 0.0).is_none());
        assert!(Dash::new(&[3.0, -1.0], 0.0).is_none());
        assert!(Dash::new(&[0.0, 2.0], 0.0).is_some());
    }

    #[test]
    fn negative_phase_is_clamped() {
        assert_eq!(Dash::new(&[1.0], -3.0).unwrap().phase(), 0.0);
    }

    #[test]
    fn numeric_caps_and_joins() {
        assert_eq!(LineCap::from_number(1), Some(LineCap::Round));
        assert_eq!(LineJoin::from_number(2), Some(LineJoin::Bevel));
        assert_eq!(LineJoin::from_number(3), None);
    }

    #[test]
    fn sanitize() {
        let style = StrokeStyle::new(-2.0).with_miter_limit(0.5).sanitized();

        assert_eq!(style.width, 2.0);
        assert_eq!(style.miter_limit, 1.0);
    }
}
