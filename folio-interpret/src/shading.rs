//! Axial and radial shadings.

use crate::color::{ColorComponents, ColorSpace, to_rgb};
use crate::paint::{Color, Shader};
use crate::util::OptionLog;
use folio_syntax::{Object, ObjectModel};
use kurbo::{Point, Vec2};
use log::warn;
use smallvec::smallvec;
use std::sync::Arc;

/// A function mapping one input value to color components.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Function {
    /// `FunctionType 2`.
    Exponential {
        domain: [f32; 2],
        c0: ColorComponents,
        c1: ColorComponents,
        n: f32,
    },
    /// `FunctionType 3`.
    Stitching {
        domain: [f32; 2],
        functions: Vec<Function>,
        bounds: Vec<f32>,
        encode: Vec<f32>,
    },
    /// One single-output function per component.
    Array(Vec<Function>),
}

impl Function {
    pub(crate) fn from_object(obj: &Object, objects: &dyn ObjectModel) -> Option<Self> {
        let obj = objects.resolve_object(obj);

        if let Some(items) = obj.as_array() {
            let functions = items
                .iter()
                .map(|f| Self::from_object(f, objects))
                .collect::<Option<Vec<_>>>()?;

            return Some(Self::Array(functions));
        }

        let dict = obj.as_dict()?;
        let numbers = |key: &[u8]| -> Option<Vec<f32>> {
            objects
                .array(dict.get(key)?)?
                .iter()
                .map(|n| n.as_number().map(|n| n as f32))
                .collect()
        };
        let domain = numbers(b"Domain")
            .filter(|d| d.len() >= 2)
            .map_or([0.0, 1.0], |d| [d[0], d[1]]);

        match dict.get_number(b"FunctionType").map(|t| t as i64) {
            Some(2) => Some(Self::Exponential {
                domain,
                c0: numbers(b"C0").map_or_else(|| smallvec![0.0], Into::into),
                c1: numbers(b"C1").map_or_else(|| smallvec![1.0], Into::into),
                n: dict.get_number(b"N")? as f32,
            }),
            Some(3) => {
                let functions = objects
                    .array(dict.get(b"Functions")?)?
                    .iter()
                    .map(|f| Self::from_object(f, objects))
                    .collect::<Option<Vec<_>>>()?;
                let bounds = numbers(b"Bounds").unwrap_or_default();
                let encode = numbers(b"Encode")?;

                if functions.is_empty()
                    || bounds.len() + 1 != functions.len()
                    || encode.len() != 2 * functions.len()
                {
                    warn!("malformed stitching function");

                    return None;
                }

                Some(Self::Stitching {
                    domain,
                    functions,
                    bounds,
                    encode,
                })
            }
            t => {
                warn!("unsupported function type {t:?}");

                None
            }
        }
    }

    pub(crate) fn eval(&self, x: f32) -> ColorComponents {
        match self {
            Self::Exponential { domain, c0, c1, n } => {
                let x = x.clamp(domain[0], domain[1]);
                let xn = x.powf(*n);

                c0.iter().zip(c1).map(|(a, b)| a + xn * (b - a)).collect()
            }
            Self::Stitching {
                domain,
                functions,
                bounds,
                encode,
            } => {
                let x = x.clamp(domain[0], domain[1]);
                let k = bounds.iter().take_while(|b| x >= **b).count();

                let lo = if k == 0 { domain[0] } else { bounds[k - 1] };
                let hi = if k == bounds.len() {
                    domain[1]
                } else {
                    bounds[k]
                };
                let (e0, e1) = (encode[2 * k], encode[2 * k + 1]);

                let t = if hi > lo {
                    e0 + (x - lo) / (hi - lo) * (e1 - e0)
                } else {
                    e0
                };

                functions[k].eval(t)
            }
            Self::Array(functions) => functions.iter().flat_map(|f| f.eval(x)).collect(),
        }
    }
}

/// The parts shared by axial and radial shadings.
#[derive(Debug)]
struct Gradient {
    function: Function,
    color_space: ColorSpace,
    domain: [f32; 2],
    extend: [bool; 2],
}

impl Gradient {
    /// The color at parameter `s`, where 0 and 1 are the start and end of
    /// the gradient.
    fn color(&self, s: f64) -> Color {
        let s = if s < 0.0 {
            if !self.extend[0] {
                return Color::TRANSPARENT;
            }

            0.0
        } else if s > 1.0 {
            if !self.extend[1] {
                return Color::TRANSPARENT;
            }

            1.0
        } else {
            s
        };

        let t = self.domain[0] + s as f32 * (self.domain[1] - self.domain[0]);

        to_rgb(&self.color_space, &self.function.eval(t))
    }
}

/// A shading whose color varies along an axis.
#[derive(Debug)]
pub(crate) struct AxialShader {
    p0: Point,
    p1: Point,
    gradient: Gradient,
}

impl Shader for AxialShader {
    fn color_at(&self, p: Point) -> Color {
        let axis = self.p1 - self.p0;
        let len2 = axis.hypot2();

        if len2 == 0.0 {
            return Color::TRANSPARENT;
        }

        self.gradient.color((p - self.p0).dot(axis) / len2)
    }
}

/// A shading whose color varies between two circles.
#[derive(Debug)]
pub(crate) struct RadialShader {
    c0: Point,
    r0: f64,
    c1: Point,
    r1: f64,
    gradient: Gradient,
}

impl RadialShader {
    /// The largest parameter `s` of a circle passing through `p` that has a
    /// non-negative radius and is actually drawn.
    fn parameter(&self, p: Point) -> Option<f64> {
        let cd: Vec2 = self.c1 - self.c0;
        let pd: Vec2 = p - self.c0;
        let dr = self.r1 - self.r0;

        // |pd - s * cd|^2 = (r0 + s * dr)^2, i.e. a * s^2 - 2 * b * s + c = 0.
        let a = cd.hypot2() - dr * dr;
        let b = pd.dot(cd) + self.r0 * dr;
        let c = pd.hypot2() - self.r0 * self.r0;

        let candidates = if a.abs() < 1e-12 {
            if b.abs() < 1e-12 {
                return None;
            }

            [c / (2.0 * b), f64::NAN]
        } else {
            let disc = b * b - a * c;

            if disc < 0.0 {
                return None;
            }

            let root = disc.sqrt();
            let (s1, s2) = ((b + root) / a, (b - root) / a);

            [s1.max(s2), s1.min(s2)]
        };

        let extend = self.gradient.extend;

        candidates.into_iter().find(|s| {
            s.is_finite()
                && self.r0 + s * dr >= 0.0
                && (*s >= 0.0 || extend[0])
                && (*s <= 1.0 || extend[1])
        })
    }
}

impl Shader for RadialShader {
    fn color_at(&self, p: Point) -> Color {
        match self.parameter(p) {
            Some(s) => self.gradient.color(s),
            None => Color::TRANSPARENT,
        }
    }
}

/// Build a shader from a shading dictionary.
pub(crate) fn shader_from_object(obj: &Object, objects: &dyn ObjectModel) -> Option<Arc<dyn Shader>> {
    let obj = objects.resolve_object(obj);
    let dict = obj.as_dict().warn_none("shading is not a dictionary")?;

    let numbers = |key: &[u8]| -> Option<Vec<f64>> {
        objects
            .array(dict.get(key)?)?
            .iter()
            .map(Object::as_number)
            .collect()
    };

    let color_space = dict
        .get(b"ColorSpace")
        .map(|cs| ColorSpace::from_object(cs, objects))
        .unwrap_or_default();
    let function = Function::from_object(dict.get(b"Function")?, objects)
        .warn_none("unsupported shading function")?;
    let domain = numbers(b"Domain")
        .filter(|d| d.len() >= 2)
        .map_or([0.0, 1.0], |d| [d[0] as f32, d[1] as f32]);
    let extend = objects
        .array(dict.get(b"Extend").unwrap_or(&Object::Null))
        .filter(|e| e.len() >= 2)
        .map_or([false, false], |e| {
            [
                e[0].as_bool().unwrap_or(false),
                e[1].as_bool().unwrap_or(false),
            ]
        });

    let gradient = Gradient {
        function,
        color_space,
        domain,
        extend,
    };

    match dict.get_number(b"ShadingType").map(|t| t as i64) {
        Some(2) => {
            let c = numbers(b"Coords").filter(|c| c.len() == 4)?;

            Some(Arc::new(AxialShader {
                p0: Point::new(c[0], c[1]),
                p1: Point::new(c[2], c[3]),
                gradient,
            }))
        }
        Some(3) => {
            let c = numbers(b"Coords").filter(|c| c.len() == 6)?;

            Some(Arc::new(RadialShader {
                c0: Point::new(c[0], c[1]),
                r0: c[2],
                c1: Point::new(c[3], c[4]),
                r1: c[5],
                gradient,
            }))
        }
        t => {
            warn!("unsupported shading type {t:?}");

            None
        }
    }
}
