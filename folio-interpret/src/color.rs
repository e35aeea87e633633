//! Color spaces and the conversion of colors into paints.

use crate::paint::{Color, Paint, ShadingPaint, ShadingSpace, Shader};
use crate::shading;
use folio_syntax::{Object, ObjectModel};
use kurbo::Affine;
use log::warn;
use smallvec::{SmallVec, smallvec};
use std::sync::Arc;

/// The components of a color in its color space.
pub type ColorComponents = SmallVec<[f32; 4]>;

/// A color space.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ColorSpace {
    /// One gray component.
    #[default]
    DeviceGray,
    /// Red, green and blue components.
    DeviceRgb,
    /// Cyan, magenta, yellow and black components.
    DeviceCmyk,
    /// Colors are given by patterns.
    Pattern,
    /// Any other color space, given by its resolved definition.
    Other(Object),
}

impl ColorSpace {
    /// Get one of the color spaces that can be referred to by name directly,
    /// including the abbreviations used by inline images.
    pub fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"DeviceGray" | b"G" => Some(Self::DeviceGray),
            b"DeviceRGB" | b"RGB" => Some(Self::DeviceRgb),
            b"DeviceCMYK" | b"CMYK" => Some(Self::DeviceCmyk),
            b"Pattern" => Some(Self::Pattern),
            _ => None,
        }
    }

    /// Interpret a color space definition.
    ///
    /// Calibrated and ICC-based color spaces are approximated by the device
    /// color space with the same number of components.
    pub fn from_object(obj: &Object, objects: &dyn ObjectModel) -> Self {
        let obj = objects.resolve_object(obj);

        if let Some(name) = obj.as_name() {
            return Self::from_name(name).unwrap_or(Self::Other(obj));
        }

        let Some(family) = obj
            .as_array()
            .and_then(|a| a.first())
            .and_then(Object::as_name)
        else {
            warn!("invalid color space {obj:?}");

            return Self::Other(obj);
        };

        match family.as_bytes() {
            b"ICCBased" => {
                let n = obj
                    .as_array()
                    .and_then(|a| a.get(1))
                    .and_then(|s| objects.dict_get(s, b"N"))
                    .and_then(|n| n.as_number())
                    .map(|n| n as i64);

                match n {
                    Some(1) => Self::DeviceGray,
                    Some(3) => Self::DeviceRgb,
                    Some(4) => Self::DeviceCmyk,
                    _ => Self::Other(obj),
                }
            }
            b"CalGray" => Self::DeviceGray,
            b"CalRGB" => Self::DeviceRgb,
            name => Self::from_name(name).unwrap_or(Self::Other(obj)),
        }
    }

    /// Whether colors in this space are given by patterns.
    pub fn is_pattern(&self) -> bool {
        matches!(self, Self::Pattern)
            || matches!(self, Self::Other(o) if family(o) == Some(b"Pattern".as_slice()))
    }
}

/// The family name of an array color space, like `Indexed`.
pub(crate) fn family(obj: &Object) -> Option<&[u8]> {
    obj.as_array()
        .and_then(|a| a.first())
        .and_then(Object::as_name)
        .map(|n| n.as_bytes())
}

/// Turns colors, patterns and shadings into paints.
pub trait PaintProvider: Send + Sync {
    /// The number of components of colors in `cs`.
    fn num_components(&self, cs: &ColorSpace) -> usize;

    /// The paint for a color.
    fn paint_for(&self, cs: &ColorSpace, components: &[f32]) -> Paint;

    /// The color a color space starts out with when it is selected.
    fn initial_color(&self, cs: &ColorSpace) -> ColorComponents {
        match cs {
            ColorSpace::DeviceCmyk => smallvec![0.0, 0.0, 0.0, 1.0],
            ColorSpace::Pattern => SmallVec::new(),
            ColorSpace::Other(o) if family(o) == Some(b"Separation".as_slice()) => {
                smallvec![1.0]
            }
            cs => smallvec![0.0; self.num_components(cs)],
        }
    }

    /// The paint for a pattern, or `None` if the pattern is not supported.
    fn paint_for_pattern(&self, pattern: &Object, objects: &dyn ObjectModel) -> Option<Paint>;

    /// The shader for a shading, or `None` if the shading is not supported.
    fn paint_for_shading(
        &self,
        shading: &Object,
        objects: &dyn ObjectModel,
    ) -> Option<Arc<dyn Shader>>;
}

/// A paint provider for device color spaces.
///
/// Colors are converted with the naive formulas; other color spaces are
/// approximated. Axial and radial shadings are supported, both as shading
/// patterns and through `sh`, as long as their functions are exponential or
/// stitching functions.
#[derive(Debug, Default, Clone, Copy)]
pub struct DevicePaints;

impl PaintProvider for DevicePaints {
    fn num_components(&self, cs: &ColorSpace) -> usize {
        num_components(cs)
    }

    fn paint_for(&self, cs: &ColorSpace, components: &[f32]) -> Paint {
        Paint::Solid(to_rgb(cs, components))
    }

    fn paint_for_pattern(&self, pattern: &Object, objects: &dyn ObjectModel) -> Option<Paint> {
        let pattern = objects.resolve_object(pattern);
        let dict = pattern.as_dict()?;

        if dict.get_number(b"PatternType") != Some(2.0) {
            warn!("tiling patterns are not supported");

            return None;
        }

        let shader = self.paint_for_shading(dict.get(b"Shading")?, objects)?;
        let matrix = dict
            .get_array(b"Matrix")
            .and_then(affine_from_array)
            .unwrap_or(Affine::IDENTITY);

        Some(Paint::Shading(ShadingPaint {
            shader,
            matrix,
            space: ShadingSpace::Page,
        }))
    }

    fn paint_for_shading(
        &self,
        shading: &Object,
        objects: &dyn ObjectModel,
    ) -> Option<Arc<dyn Shader>> {
        shading::shader_from_object(shading, objects)
    }
}

pub(crate) fn num_components(cs: &ColorSpace) -> usize {
    match cs {
        ColorSpace::DeviceGray => 1,
        ColorSpace::DeviceRgb => 3,
        ColorSpace::DeviceCmyk => 4,
        ColorSpace::Pattern => 0,
        ColorSpace::Other(o) => match family(o) {
            Some(b"Lab") => 3,
            Some(b"DeviceN") => o
                .as_array()
                .and_then(|a| a.get(1))
                .and_then(Object::as_array)
                .map_or(1, <[Object]>::len),
            _ => 1,
        },
    }
}

/// Convert a color into sRGB.
pub(crate) fn to_rgb(cs: &ColorSpace, c: &[f32]) -> Color {
    let get = |i: usize| c.get(i).copied().unwrap_or(0.0).clamp(0.0, 1.0);

    match cs {
        ColorSpace::DeviceGray => Color::gray(get(0)),
        ColorSpace::DeviceRgb => Color::new(get(0), get(1), get(2)),
        ColorSpace::DeviceCmyk => cmyk_to_rgb(get(0), get(1), get(2), get(3)),
        ColorSpace::Pattern => Color::BLACK,
        ColorSpace::Other(o) => match family(o) {
            Some(b"Indexed") => indexed_to_rgb(o, c.first().copied().unwrap_or(0.0)),
            // Tints describe the amount of ink.
            Some(b"Separation" | b"DeviceN") => {
                Color::gray(1.0 - c.iter().fold(0.0_f32, |a, b| a.max(*b)).clamp(0.0, 1.0))
            }
            Some(b"Lab") => Color::gray((c.first().copied().unwrap_or(0.0) / 100.0).clamp(0.0, 1.0)),
            _ => Color::gray(get(0)),
        },
    }
}

pub(crate) fn cmyk_to_rgb(c: f32, m: f32, y: f32, k: f32) -> Color {
    Color::new((1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k))
}

fn indexed_to_rgb(def: &Object, index: f32) -> Color {
    let Some(parts) = def.as_array() else {
        return Color::BLACK;
    };

    let base = parts
        .get(1)
        .and_then(Object::as_name)
        .and_then(|n| ColorSpace::from_name(n))
        .unwrap_or(ColorSpace::DeviceRgb);
    let n = num_components(&base);
    let lookup = parts.get(3).and_then(Object::as_string).unwrap_or_default();
    let start = index.max(0.0) as usize * n;

    match lookup.get(start..start + n) {
        Some(bytes) => {
            let comps = bytes
                .iter()
                .map(|b| f32::from(*b) / 255.0)
                .collect::<ColorComponents>();

            to_rgb(&base, &comps)
        }
        None => {
            warn!("color index {index} out of range");

            Color::BLACK
        }
    }
}

pub(crate) fn affine_from_array(a: &[Object]) -> Option<Affine> {
    if a.len() != 6 {
        return None;
    }

    let mut m = [0.0; 6];

    for (dst, src) in m.iter_mut().zip(a) {
        *dst = src.as_number()?;
    }

    Some(Affine::new(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_syntax::{Dict, MemoryObjects, Name, Stream};

    #[test]
    fn names() {
        assert_eq!(ColorSpace::from_name(b"RGB"), Some(ColorSpace::DeviceRgb));
        assert_eq!(ColorSpace::from_name(b"DeviceCMYK"), Some(ColorSpace::DeviceCmyk));
        assert_eq!(ColorSpace::from_name(b"Indexed"), None);
    }

    #[test]
    fn icc_based_uses_component_count() {
        let mut objects = MemoryObjects::new();
        let profile = objects.insert(Object::Stream(Stream::new(
            Dict::new().with("N", Object::Number(3.0)),
            Vec::<u8>::new(),
        )));

        let def = Object::Array(vec![Object::Name(Name::from("ICCBased")), Object::Ref(profile)]);
        assert_eq!(ColorSpace::from_object(&def, &objects), ColorSpace::DeviceRgb);
    }

    #[test]
    fn device_colors() {
        let paints = DevicePaints;

        assert_eq!(
            paints.paint_for(&ColorSpace::DeviceRgb, &[1.0, 0.0, 0.0]),
            Paint::Solid(Color::new(1.0, 0.0, 0.0))
        );
        assert_eq!(
            paints.paint_for(&ColorSpace::DeviceCmyk, &[0.0, 0.0, 0.0, 1.0]),
            Paint::Solid(Color::BLACK)
        );
        assert_eq!(
            paints.initial_color(&ColorSpace::DeviceCmyk).as_slice(),
            &[0.0, 0.0, 0.0, 1.0]
        );
        assert_eq!(paints.initial_color(&ColorSpace::DeviceRgb).len(), 3);
    }

    #[test]
    fn indexed_lookup() {
        let def = Object::Array(vec![
            Object::Name(Name::from("Indexed")),
            Object::Name(Name::from("DeviceRGB")),
            Object::Number(1.0),
            Object::String(vec![0, 0, 0, 255, 0, 0]),
        ]);
        let cs = ColorSpace::from_object(&def, &MemoryObjects::new());

        assert_eq!(num_components(&cs), 1);
        assert_eq!(to_rgb(&cs, &[1.0]), Color::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn pattern_color_spaces() {
        let def = Object::Array(vec![
            Object::Name(Name::from("Pattern")),
            Object::Name(Name::from("DeviceRGB")),
        ]);

        assert!(ColorSpace::from_object(&def, &MemoryObjects::new()).is_pattern());
    }
}
