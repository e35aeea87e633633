//! The drawing surface renderers paint onto.
//!
//! All geometry handed to the surface is already in device space. The
//! transform of the underlying render context always stays at identity,
//! except while an image is drawn.

use crate::RenderSettings;
use crate::util::x_y_advances;
use folio_interpret::{Color, ImageData, ImagePixels, Paint, ShadingPaint};
use folio_path::FillRule;
use kurbo::{Affine, BezPath, Point, Rect, Shape};
use log::debug;
use std::sync::Arc;
use vello_cpu::color::{AlphaColor, PremulRgba8, Srgb};
use vello_cpu::peniko::{Fill, ImageQuality, ImageSampler};
use vello_cpu::{
    Image, ImageSource, Level, PaintType, Pixmap, RenderContext, RenderMode, Resources, peniko,
};

/// The largest number of pixels a shading texture may have.
const MAX_TEXTURE_PIXELS: f64 = 16_000_000.0;

/// A paint resolved for drawing in device space.
#[derive(Debug, Clone)]
pub(crate) enum DevicePaint<'a> {
    Solid(Color),
    Shading {
        paint: &'a ShadingPaint,
        /// Maps the shading space to device space.
        transform: Affine,
    },
}

impl<'a> DevicePaint<'a> {
    /// Resolve a paint, anchoring shadings at `anchor`.
    pub(crate) fn new(paint: &'a Paint, anchor: Affine) -> Self {
        match paint {
            Paint::Solid(c) => Self::Solid(*c),
            Paint::Shading(s) => Self::Shading {
                paint: s,
                transform: anchor * s.matrix,
            },
        }
    }
}

pub(crate) struct Surface {
    ctx: RenderContext,
    clip_depth: usize,
}

impl Surface {
    pub(crate) fn new(width: u16, height: u16, settings: &RenderSettings) -> Self {
        let vc_settings = vello_cpu::RenderSettings {
            level: Level::new(),
            num_threads: settings.num_threads,
            render_mode: RenderMode::OptimizeSpeed,
        };

        Self {
            ctx: RenderContext::new_with(width, height, vc_settings),
            clip_depth: 0,
        }
    }

    pub(crate) fn width(&self) -> u16 {
        self.ctx.width()
    }

    pub(crate) fn height(&self) -> u16 {
        self.ctx.height()
    }

    pub(crate) fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width() as f64, self.height() as f64)
    }

    /// The number of clip layers that are currently open.
    pub(crate) fn clip_depth(&self) -> usize {
        self.clip_depth
    }

    pub(crate) fn fill_background(&mut self, color: Color) {
        self.ctx.set_paint_transform(Affine::IDENTITY);
        self.ctx.set_paint(convert_color(color));
        self.ctx.fill_rect(&self.bounds());
    }

    pub(crate) fn fill_path(
        &mut self,
        path: &BezPath,
        fill_rule: FillRule,
        paint: &DevicePaint<'_>,
        alpha: f32,
    ) {
        if !self.set_paint(paint, path.bounding_box(), alpha) {
            return;
        }

        self.ctx.set_fill_rule(convert_fill_rule(fill_rule));
        self.ctx.fill_path(path);
    }

    pub(crate) fn push_clip(&mut self, path: &BezPath, fill_rule: FillRule) {
        self.ctx.set_fill_rule(convert_fill_rule(fill_rule));
        self.ctx.push_clip_path(path);
        self.clip_depth += 1;
    }

    pub(crate) fn pop_clip(&mut self) {
        if self.clip_depth > 0 {
            self.ctx.pop_clip_path();
            self.clip_depth -= 1;
        }
    }

    /// Draw an image into the unit square that `transform` maps to device
    /// space. Stencil masks are painted with `fill`.
    pub(crate) fn draw_image(
        &mut self,
        image: &ImageData,
        transform: Affine,
        fill: &DevicePaint<'_>,
        alpha: f32,
    ) {
        let (width, height) = (image.width, image.height);

        if width == 0 || height == 0 || width > u16::MAX as u32 || height > u16::MAX as u32 {
            debug!("skipping image with unsupported size {width}x{height}");

            return;
        }

        let Some(pixels) = image_pixels(image, fill, alpha) else {
            return;
        };

        let pixmap = Pixmap::from_parts(pixels, width as u16, height as u16);
        let quality = if image.interpolate {
            ImageQuality::Medium
        } else {
            ImageQuality::Low
        };

        let image = Image {
            image: ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: ImageSampler {
                x_extend: peniko::Extend::Pad,
                y_extend: peniko::Extend::Pad,
                quality,
                alpha: 1.0,
            },
        };

        // Image space has its origin in the top-left corner.
        let image_transform = transform
            * Affine::new([
                1.0 / width as f64,
                0.0,
                0.0,
                -1.0 / height as f64,
                0.0,
                1.0,
            ]);

        self.ctx.set_transform(image_transform);
        self.ctx.set_paint_transform(Affine::IDENTITY);
        self.ctx.set_paint(image);
        self.ctx.set_fill_rule(Fill::NonZero);
        self.ctx
            .fill_rect(&Rect::new(0.0, 0.0, width as f64, height as f64));
        self.ctx.set_transform(Affine::IDENTITY);
    }

    /// Render everything drawn so far into a new pixmap.
    ///
    /// Returns `None` while clip layers are open, since those are only
    /// composited once they are closed.
    pub(crate) fn snapshot(&mut self) -> Option<Pixmap> {
        if self.clip_depth > 0 {
            return None;
        }

        let mut pixmap = Pixmap::new(self.width(), self.height());
        self.ctx.flush();
        self.ctx
            .render_to_pixmap(&mut Resources::new(), &mut pixmap);

        Some(pixmap)
    }

    /// Set the paint for the next fill. Returns `false` if nothing needs to
    /// be drawn.
    fn set_paint(&mut self, paint: &DevicePaint<'_>, bbox: Rect, alpha: f32) -> bool {
        let mut paint_transform = Affine::IDENTITY;

        let paint: PaintType = match paint {
            DevicePaint::Solid(c) => convert_color(c.multiply_alpha(alpha)).into(),
            DevicePaint::Shading { paint, transform } => {
                let bbox = bbox.intersect(self.bounds());

                if bbox.width() <= 0.0
                    || bbox.height() <= 0.0
                    || bbox.area() > MAX_TEXTURE_PIXELS
                {
                    return false;
                }

                let Some((texture, translation)) = render_shading_texture(
                    bbox,
                    paint,
                    transform.inverse(),
                    alpha,
                ) else {
                    return false;
                };
                paint_transform = translation;

                PaintType::Image(Image {
                    image: ImageSource::Pixmap(Arc::new(texture)),
                    sampler: ImageSampler {
                        x_extend: peniko::Extend::Pad,
                        y_extend: peniko::Extend::Pad,
                        quality: ImageQuality::Low,
                        alpha: 1.0,
                    },
                })
            }
        };

        self.ctx.set_paint_transform(paint_transform);
        self.ctx.set_paint(paint);

        true
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("clip_depth", &self.clip_depth)
            .finish()
    }
}

/// Sample a shading at the center of every device pixel of `bbox`.
///
/// `inverse` maps device space into the space of the shading.
fn render_shading_texture(
    bbox: Rect,
    paint: &ShadingPaint,
    inverse: Affine,
    alpha: f32,
) -> Option<(Pixmap, Affine)> {
    let bbox = bbox.expand();
    let width = bbox.width() as u32;
    let height = bbox.height() as u32;

    if width == 0 || height == 0 || width > u16::MAX as u32 || height > u16::MAX as u32 {
        return None;
    }

    let (x_advance, y_advance) = x_y_advances(&inverse);

    let mut buf = vec![PremulRgba8::from_u32(0); width as usize * height as usize];
    let mut start_point = inverse * Point::new(bbox.x0 + 0.5, bbox.y0 + 0.5);

    for row in buf.chunks_exact_mut(width as usize) {
        let mut point = start_point;

        for pixel in row {
            let sample = paint.shader.color_at(point).multiply_alpha(alpha);
            *pixel = convert_color(sample).premultiply().to_rgba8();

            point += x_advance;
        }

        start_point += y_advance;
    }

    Some((
        Pixmap::from_parts(buf, width as u16, height as u16),
        Affine::translate((bbox.x0, bbox.y0)),
    ))
}

/// Convert image data into premultiplied pixels.
fn image_pixels(image: &ImageData, fill: &DevicePaint<'_>, alpha: f32) -> Option<Vec<PremulRgba8>> {
    let count = image.width as usize * image.height as usize;
    let alpha_at = |i: usize| -> f32 {
        let a = image.alpha.as_ref().and_then(|a| a.get(i)).copied().unwrap_or(255);

        a as f32 / 255.0 * alpha
    };

    let pixels = match &image.pixels {
        ImagePixels::Rgb(rgb) => {
            if rgb.len() < count * 3 {
                debug!("image has fewer samples than expected");

                return None;
            }

            rgb.chunks_exact(3)
                .take(count)
                .enumerate()
                .map(|(i, c)| {
                    AlphaColor::<Srgb>::from_rgba8(c[0], c[1], c[2], 255)
                        .multiply_alpha(alpha_at(i))
                        .premultiply()
                        .to_rgba8()
                })
                .collect()
        }
        ImagePixels::Stencil(mask) => {
            if mask.len() < count {
                debug!("stencil mask has fewer samples than expected");

                return None;
            }

            let color = match fill {
                DevicePaint::Solid(c) => *c,
                DevicePaint::Shading { .. } => {
                    debug!("stencil masks with shading paints are drawn in black");

                    Color::BLACK
                }
            };

            mask.iter()
                .take(count)
                .enumerate()
                .map(|(i, m)| {
                    let coverage = *m as f32 / 255.0 * alpha_at(i);
                    convert_color(color.multiply_alpha(coverage))
                        .premultiply()
                        .to_rgba8()
                })
                .collect()
        }
    };

    Some(pixels)
}

fn convert_color(c: Color) -> AlphaColor<Srgb> {
    AlphaColor::<Srgb>::new([c.r, c.g, c.b, c.a])
}

fn convert_fill_rule(fill_rule: FillRule) -> Fill {
    match fill_rule {
        FillRule::NonZero => Fill::NonZero,
        FillRule::EvenOdd => Fill::EvenOdd,
    }
}
