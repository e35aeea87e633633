//! The rendered image of a page.

use crate::util::{lock, union};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageError};
use kurbo::Rect;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use vello_cpu::Pixmap;

#[derive(Debug, Default)]
struct Damage {
    total: Option<Rect>,
    pending: Option<Rect>,
}

/// A raster a renderer draws into.
///
/// The pixels are updated whenever the renderer publishes its progress, so a
/// raster that is not complete yet may show a partially drawn page. Rasters
/// are shared between the cache, renderers and callers; a renderer stops once
/// nobody but itself refers to its raster anymore.
#[derive(Debug)]
pub struct Raster {
    width: u16,
    height: u16,
    pixmap: Mutex<Pixmap>,
    damage: Mutex<Damage>,
    complete: AtomicBool,
}

impl Raster {
    /// Create a new, fully transparent raster.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixmap: Mutex::new(Pixmap::new(width, height)),
            damage: Mutex::new(Damage::default()),
            complete: AtomicBool::new(false),
        }
    }

    /// The width in pixels.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// The height in pixels.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// The unpremultiplied RGBA color of a pixel, or `None` if the position
    /// is outside of the raster.
    pub fn pixel(&self, x: u16, y: u16) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let pixmap = lock(&self.pixmap);
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let data = pixmap.data_as_u8_slice();

        Some(unpremultiply([
            data[idx],
            data[idx + 1],
            data[idx + 2],
            data[idx + 3],
        ]))
    }

    /// The area of the raster that was drawn to so far, in pixels.
    pub fn dirty(&self) -> Option<Rect> {
        lock(&self.damage).total
    }

    /// Return the area that was drawn to since the last call, and reset it.
    ///
    /// Viewers can use this to only repaint what changed.
    pub fn take_dirty(&self) -> Option<Rect> {
        lock(&self.damage).pending.take()
    }

    /// Whether the renderer drew all commands of the page.
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// The pixels as unpremultiplied RGBA, in rows from top to bottom.
    pub fn to_rgba8(&self) -> Vec<u8> {
        lock(&self.pixmap)
            .data_as_u8_slice()
            .chunks_exact(4)
            .flat_map(|p| unpremultiply([p[0], p[1], p[2], p[3]]))
            .collect()
    }

    /// Encode the raster into a PNG file.
    pub fn to_png(&self) -> Result<Vec<u8>, ImageError> {
        let mut png_data = Vec::new();
        let cursor = Cursor::new(&mut png_data);
        let encoder = PngEncoder::new(cursor);
        encoder.write_image(
            &self.to_rgba8(),
            self.width as u32,
            self.height as u32,
            ExtendedColorType::Rgba8,
        )?;

        Ok(png_data)
    }

    /// Replace the pixels and record the area that changed.
    pub(crate) fn publish(&self, pixmap: Pixmap, dirty: Option<Rect>) {
        *lock(&self.pixmap) = pixmap;

        if let Some(dirty) = dirty.and_then(|d| self.clamp(d)) {
            let mut damage = lock(&self.damage);
            damage.total = Some(union(damage.total, dirty));
            damage.pending = Some(union(damage.pending, dirty));
        }
    }

    pub(crate) fn mark_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    fn clamp(&self, rect: Rect) -> Option<Rect> {
        let bounds = Rect::new(0.0, 0.0, self.width as f64, self.height as f64);
        let rect = rect.intersect(bounds);

        (rect.width() > 0.0 && rect.height() > 0.0).then(|| rect.expand())
    }
}

fn unpremultiply([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    if a == 0 {
        return [0, 0, 0, 0];
    }

    let c = |v: u8| ((v as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8;

    [c(r), c(g), c(b), a]
}
