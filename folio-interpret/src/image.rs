//! Decoding image XObjects and inline images into pixels.

use crate::color::{ColorSpace, family, num_components, to_rgb};
use crate::command::{ImageData, ImagePixels};
use crate::error::DecodeError;
use folio_syntax::{Object, ObjectModel, Stream};
use log::warn;

/// Decodes image streams.
pub trait ImageDecoder: Send + Sync {
    /// Decode an image. Inline images are passed with their keys and values
    /// already expanded to their long forms.
    fn decode(&self, image: &Stream, objects: &dyn ObjectModel) -> Result<ImageData, DecodeError>;
}

/// An image decoder for samples that are either unfiltered or can be
/// unfiltered by the object model.
///
/// Supports 1, 2, 4, 8 and 16 bits per component in any color space the
/// paint conversion understands, `/Decode` arrays, `/ImageMask` stencils and
/// `/SMask` soft masks.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawImageDecoder;

impl ImageDecoder for RawImageDecoder {
    fn decode(&self, image: &Stream, objects: &dyn ObjectModel) -> Result<ImageData, DecodeError> {
        let dict = image.dict();
        let samples = Samples::new(image, objects)?;

        let pixels = if samples.is_mask {
            // A decoded sample of 0 marks the pixels that get painted.
            ImagePixels::Stencil(
                samples
                    .values
                    .iter()
                    .map(|v| if *v < 0.5 { 255 } else { 0 })
                    .collect(),
            )
        } else {
            let mut rgb = Vec::with_capacity(samples.values.len() / samples.n * 3);

            for chunk in samples.values.chunks_exact(samples.n) {
                let [r, g, b, _] = to_rgb(&samples.color_space, chunk).to_rgba8();
                rgb.extend_from_slice(&[r, g, b]);
            }

            ImagePixels::Rgb(rgb)
        };

        let alpha = if samples.is_mask {
            None
        } else {
            dict.get(b"SMask")
                .map(|s| objects.resolve_object(s))
                .and_then(|s| match s {
                    Object::Stream(s) => Some(s),
                    _ => None,
                })
                .and_then(|s| match soft_mask(&s, objects, samples.width, samples.height) {
                    Ok(alpha) => Some(alpha),
                    Err(e) => {
                        warn!("ignoring soft mask: {e}");

                        None
                    }
                })
        };

        Ok(ImageData {
            width: samples.width,
            height: samples.height,
            pixels,
            alpha,
            interpolate: dict.get_bool(b"Interpolate").unwrap_or(false),
        })
    }
}

/// The samples of an image, mapped through its decode array.
struct Samples {
    width: u32,
    height: u32,
    color_space: ColorSpace,
    is_mask: bool,
    n: usize,
    values: Vec<f32>,
}

impl Samples {
    fn new(image: &Stream, objects: &dyn ObjectModel) -> Result<Self, DecodeError> {
        let dict = image.dict();

        let dimension = |key: &[u8]| {
            dict.get_number(key)
                .filter(|v| *v >= 1.0 && v.fract() == 0.0 && *v <= f64::from(u32::MAX))
                .map(|v| v as u32)
                .ok_or(DecodeError::InvalidDimensions)
        };
        let width = dimension(b"Width")?;
        let height = dimension(b"Height")?;

        let is_mask = dict.get_bool(b"ImageMask").unwrap_or(false);
        let bpc = if is_mask {
            1
        } else {
            dict.get_number(b"BitsPerComponent").unwrap_or(8.0) as u8
        };

        if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
            return Err(DecodeError::UnsupportedBitDepth(bpc));
        }

        let color_space = if is_mask {
            ColorSpace::DeviceGray
        } else {
            dict.get(b"ColorSpace")
                .map(|cs| ColorSpace::from_object(cs, objects))
                .unwrap_or_default()
        };

        if color_space.is_pattern() {
            return Err(DecodeError::UnsupportedColorSpace("Pattern".to_string()));
        }

        let n = num_components(&color_space).max(1);
        let max = ((1_u32 << bpc) - 1) as f32;

        let decode = dict
            .get(b"Decode")
            .and_then(|d| objects.array(d))
            .and_then(|d| {
                d.chunks_exact(2)
                    .map(|pair| Some((pair[0].as_number()? as f32, pair[1].as_number()? as f32)))
                    .collect::<Option<Vec<_>>>()
            })
            .filter(|d| d.len() == n)
            .unwrap_or_else(|| {
                if is_indexed(&color_space) {
                    vec![(0.0, max)]
                } else {
                    vec![(0.0, 1.0); n]
                }
            });

        let filters = image.filters();
        let data = objects
            .stream_bytes(image, &filters)
            .ok_or_else(|| DecodeError::UnsupportedFilter(filters.to_vec()))?;

        let row_bytes = (width as usize * n * bpc as usize).div_ceil(8);
        let expected = row_bytes * height as usize;

        if data.len() < expected {
            return Err(DecodeError::TruncatedData {
                expected,
                found: data.len(),
            });
        }

        let mut values = Vec::with_capacity(width as usize * height as usize * n);

        for row in data[..expected].chunks_exact(row_bytes) {
            let mut reader = BitReader::new(row, bpc);

            for _ in 0..width {
                for (d_min, d_max) in &decode {
                    let sample = reader.read() as f32;
                    values.push(d_min + sample * (d_max - d_min) / max);
                }
            }
        }

        Ok(Self {
            width,
            height,
            color_space,
            is_mask,
            n,
            values,
        })
    }
}

fn is_indexed(cs: &ColorSpace) -> bool {
    matches!(cs, ColorSpace::Other(o) if family(o) == Some(b"Indexed".as_slice()))
}

/// Decode a soft mask and resample it to the size of its image.
fn soft_mask(
    mask: &Stream,
    objects: &dyn ObjectModel,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, DecodeError> {
    let samples = Samples::new(mask, objects)?;
    let gray = samples
        .values
        .chunks_exact(samples.n)
        .map(|c| to_rgb(&samples.color_space, c).to_rgba8()[0])
        .collect::<Vec<_>>();

    if samples.width == width && samples.height == height {
        return Ok(gray);
    }

    let x_factor = samples.width as f32 / width as f32;
    let y_factor = samples.height as f32 / height as f32;
    let mut out = Vec::with_capacity(width as usize * height as usize);

    for y in 0..height {
        let sy = ((y as f32 * y_factor) as u32).min(samples.height - 1);

        for x in 0..width {
            let sx = ((x as f32 * x_factor) as u32).min(samples.width - 1);
            out.push(gray[(sy * samples.width + sx) as usize]);
        }
    }

    Ok(out)
}

/// Reads big-endian samples of a fixed bit size.
struct BitReader<'a> {
    data: &'a [u8],
    bpc: u8,
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8], bpc: u8) -> Self {
        Self {
            data,
            bpc,
            bit_pos: 0,
        }
    }

    fn read(&mut self) -> u32 {
        let byte = self.bit_pos / 8;

        let value = match self.bpc {
            16 => u32::from(u16::from_be_bytes([
                self.data.get(byte).copied().unwrap_or(0),
                self.data.get(byte + 1).copied().unwrap_or(0),
            ])),
            8 => u32::from(self.data.get(byte).copied().unwrap_or(0)),
            bpc => {
                let shift = 8 - bpc as usize - self.bit_pos % 8;
                let mask = (1_u8 << bpc) - 1;

                u32::from((self.data.get(byte).copied().unwrap_or(0) >> shift) & mask)
            }
        };

        self.bit_pos += self.bpc as usize;

        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_syntax::{Dict, MemoryObjects, Name};

    fn image(dict: &[u8], data: Vec<u8>) -> Stream {
        let dict = Object::from_bytes(dict).unwrap().as_dict().unwrap().clone();

        Stream::new(dict, data)
    }

    #[test]
    fn rgb_8bit() {
        let stream = image(
            b"<< /Width 2 /Height 1 /ColorSpace /DeviceRGB /BitsPerComponent 8 >>",
            vec![255, 0, 0, 0, 0, 255],
        );
        let decoded = RawImageDecoder.decode(&stream, &MemoryObjects::new()).unwrap();

        assert_eq!(decoded.pixels, ImagePixels::Rgb(vec![255, 0, 0, 0, 0, 255]));
        assert_eq!(decoded.alpha, None);
    }

    #[test]
    fn gray_1bit_with_row_padding() {
        // 3 pixels per row, padded to a full byte.
        let stream = image(
            b"<< /Width 3 /Height 2 /ColorSpace /DeviceGray /BitsPerComponent 1 >>",
            vec![0b1010_0000, 0b0100_0000],
        );
        let decoded = RawImageDecoder.decode(&stream, &MemoryObjects::new()).unwrap();

        let ImagePixels::Rgb(rgb) = decoded.pixels else {
            panic!("expected rgb pixels");
        };
        let gray = rgb.chunks(3).map(|c| c[0]).collect::<Vec<_>>();
        assert_eq!(gray, vec![255, 0, 255, 0, 255, 0]);
    }

    #[test]
    fn stencil_honours_decode() {
        let data = vec![0b1000_0000];

        let normal = image(b"<< /Width 2 /Height 1 /ImageMask true >>", data.clone());
        let inverted = image(b"<< /Width 2 /Height 1 /ImageMask true /Decode [1 0] >>", data);
        let objects = MemoryObjects::new();

        assert_eq!(
            RawImageDecoder.decode(&normal, &objects).unwrap().pixels,
            ImagePixels::Stencil(vec![0, 255])
        );
        assert_eq!(
            RawImageDecoder.decode(&inverted, &objects).unwrap().pixels,
            ImagePixels::Stencil(vec![255, 0])
        );
    }

    #[test]
    fn indexed() {
        let stream = image(
            b"<< /Width 2 /Height 1 /BitsPerComponent 8 \
              /ColorSpace [/Indexed /DeviceRGB 1 <00FF00 0000FF>] >>",
            vec![1, 0],
        );
        let decoded = RawImageDecoder.decode(&stream, &MemoryObjects::new()).unwrap();

        assert_eq!(decoded.pixels, ImagePixels::Rgb(vec![0, 0, 255, 0, 255, 0]));
    }

    #[test]
    fn soft_mask_is_resampled() {
        let mut objects = MemoryObjects::new();
        let mask = objects.insert(Object::Stream(image(
            b"<< /Width 1 /Height 1 /ColorSpace /DeviceGray /BitsPerComponent 8 >>",
            vec![128],
        )));

        let mut dict = Dict::new()
            .with("Width", Object::Number(2.0))
            .with("Height", Object::Number(2.0))
            .with("ColorSpace", Object::Name(Name::from("DeviceGray")));
        dict.insert("SMask", Object::Ref(mask));

        let decoded = RawImageDecoder
            .decode(&Stream::new(dict, vec![0; 4]), &objects)
            .unwrap();

        assert_eq!(decoded.alpha, Some(vec![128; 4]));
    }

    #[test]
    fn errors() {
        let objects = MemoryObjects::new();

        let truncated = image(b"<< /Width 4 /Height 4 /ColorSpace /DeviceRGB >>", vec![0; 10]);
        assert_eq!(
            RawImageDecoder.decode(&truncated, &objects),
            Err(DecodeError::TruncatedData {
                expected: 48,
                found: 10
            })
        );

        let filtered = image(b"<< /Width 1 /Height 1 /Filter /DCTDecode >>", vec![0]);
        assert_eq!(
            RawImageDecoder.decode(&filtered, &objects),
            Err(DecodeError::UnsupportedFilter(vec![Name::from("DCTDecode")]))
        );

        let no_size = image(b"<< /Height 1 >>", vec![0]);
        assert_eq!(
            RawImageDecoder.decode(&no_size, &objects),
            Err(DecodeError::InvalidDimensions)
        );

        let odd_depth = image(b"<< /Width 1 /Height 1 /BitsPerComponent 3 >>", vec![0]);
        assert_eq!(
            RawImageDecoder.decode(&odd_depth, &objects),
            Err(DecodeError::UnsupportedBitDepth(3))
        );
    }
}
