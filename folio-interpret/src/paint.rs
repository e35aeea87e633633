//! Paints used to fill and stroke paths.

use kurbo::{Affine, Point};
use std::fmt::Debug;
use std::sync::Arc;

/// An sRGB color with straight alpha, all components in `0..=1`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Color {
    /// The red component.
    pub r: f32,
    /// The green component.
    pub g: f32,
    /// The blue component.
    pub b: f32,
    /// The alpha component.
    pub a: f32,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    /// Create a new opaque color.
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create an opaque gray.
    pub const fn gray(v: f32) -> Self {
        Self::new(v, v, v)
    }

    /// Return the color with its alpha multiplied by `alpha`.
    #[must_use]
    pub fn multiply_alpha(self, alpha: f32) -> Self {
        Self {
            a: self.a * alpha,
            ..self
        }
    }

    /// Convert the color into 8-bit components.
    pub fn to_rgba8(self) -> [u8; 4] {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;

        [c(self.r), c(self.g), c(self.b), c(self.a)]
    }
}

/// A function assigning a color to every point of its coordinate space,
/// used for smooth shadings.
pub trait Shader: Send + Sync + Debug {
    /// The color at `p`. Points the shading does not cover yield a
    /// transparent color.
    fn color_at(&self, p: Point) -> Color;
}

/// The coordinate space a shading paint is anchored in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShadingSpace {
    /// The user space in effect when a path is painted.
    User,
    /// The default coordinate space of the page, as used by patterns.
    Page,
}

/// A paint backed by a [`Shader`].
#[derive(Debug, Clone)]
pub struct ShadingPaint {
    /// The shader.
    pub shader: Arc<dyn Shader>,
    /// The transform from shading space into the anchor space.
    pub matrix: Affine,
    /// The space the shading is anchored in.
    pub space: ShadingSpace,
}

impl PartialEq for ShadingPaint {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shader, &other.shader)
            && self.matrix == other.matrix
            && self.space == other.space
    }
}

/// The paint used to fill or stroke a path.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    /// A solid color.
    Solid(Color),
    /// A smooth shading.
    Shading(ShadingPaint),
}

impl Default for Paint {
    fn default() -> Self {
        Self::Solid(Color::BLACK)
    }
}

impl From<Color> for Paint {
    fn from(c: Color) -> Self {
        Self::Solid(c)
    }
}
