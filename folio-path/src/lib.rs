/*!
Paths and a stroking engine for rendering PDF graphics.

This crate contains the geometric part of the `folio` rendering core:
- [`path`]: a path model that follows the path construction rules of PDF
  content streams, including implicit subpath starts after a close.
- [`style`]: line widths, caps, joins, miter limits and dash patterns.
- [`stroke`]: converts a path and a stroke style into a closed outline that
  can be filled with the non-zero winding rule.
- [`dash`]: splits a path into the dashes of a dash pattern.

Stroke outlines are computed in whatever coordinate system the input path is
in. Callers that need a minimum on-screen width are expected to boost the
width before stroking and transform the outline afterwards.

## Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod dash;
pub mod path;
pub mod stroke;
pub mod style;

mod bezier;

pub use dash::DashSegment;
pub use path::{FillRule, Path, Segment, Subpath};
pub use stroke::{stroke, stroke_with_tolerance};
pub use style::{Dash, LineCap, LineJoin, StrokeStyle};
