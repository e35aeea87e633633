//! Drawing commands produced by the interpreter.

use crate::paint::Paint;
use bitflags::bitflags;
use folio_path::{Dash, LineCap, LineJoin, Path};
use kurbo::Affine;
use std::ops::Deref;
use std::sync::Arc;

bitflags! {
    /// How a path is drawn.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct DrawMode: u8 {
        /// Stroke the path with the stroke paint.
        const STROKE = 1;
        /// Fill the path with the fill paint.
        const FILL = 1 << 1;
        /// Intersect the clip region with the path, after painting.
        const CLIP = 1 << 2;
    }
}

/// The pixels of a decoded image.
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePixels {
    /// Three bytes per pixel, in sRGB.
    Rgb(Vec<u8>),
    /// One byte per pixel, 255 where the fill paint is applied and 0
    /// where the image is transparent.
    Stencil(Vec<u8>),
}

/// A decoded image, ready to be drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// The width in pixels.
    pub width: u32,
    /// The height in pixels.
    pub height: u32,
    /// The pixels, in rows from top to bottom.
    pub pixels: ImagePixels,
    /// An optional alpha channel with one byte per pixel.
    pub alpha: Option<Vec<u8>>,
    /// Whether the image should be smoothed when scaled up.
    pub interpolate: bool,
}

/// A shared reference to decoded image data.
///
/// Two references are equal if they point to the same image.
#[derive(Debug, Clone)]
pub struct ImageRef(Arc<ImageData>);

impl ImageRef {
    /// Wrap decoded image data.
    pub fn new(data: ImageData) -> Self {
        Self(Arc::new(data))
    }
}

impl Deref for ImageRef {
    type Target = ImageData;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for ImageRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A single drawing command.
///
/// Commands are immutable once created. Style commands change the state
/// subsequent drawing commands are executed with; `Push` and `Pop` save and
/// restore that state.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Save the current drawing state.
    Push,
    /// Restore the most recently saved drawing state.
    Pop,
    /// Concatenate a transform with the current one. The argument is applied
    /// first.
    Transform(Affine),
    /// Set the line width.
    SetStrokeWidth(f64),
    /// Set the line cap.
    SetStrokeCap(LineCap),
    /// Set the line join.
    SetStrokeJoin(LineJoin),
    /// Set the miter limit.
    SetStrokeMiter(f64),
    /// Set or remove the dash pattern.
    SetStrokeDash(Option<Dash>),
    /// Set the paint used for filling.
    SetFillPaint(Paint),
    /// Set the paint used for stroking.
    SetStrokePaint(Paint),
    /// Set the constant alpha used for filling.
    SetFillAlpha(f32),
    /// Set the constant alpha used for stroking.
    SetStrokeAlpha(f32),
    /// Draw a path.
    DrawPath(Path, DrawMode),
    /// Draw an image into the unit square of the current user space.
    DrawImage(ImageRef),
}

impl Command {
    /// Whether the command changes pixels or the clip region when executed.
    pub fn draws(&self) -> bool {
        matches!(self, Self::DrawPath(..) | Self::DrawImage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_refs_compare_by_identity() {
        let data = ImageData {
            width: 1,
            height: 1,
            pixels: ImagePixels::Rgb(vec![0, 0, 0]),
            alpha: None,
            interpolate: false,
        };

        let a = ImageRef::new(data.clone());
        let b = ImageRef::new(data);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn draw_modes() {
        let mode = DrawMode::FILL | DrawMode::CLIP;

        assert!(mode.contains(DrawMode::FILL));
        assert!(!mode.contains(DrawMode::STROKE));
        assert!(Command::DrawPath(Path::new(), mode).draws());
        assert!(!Command::Push.draws());
    }
}
