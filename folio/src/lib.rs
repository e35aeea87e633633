/*!
Incremental rendering of PDF pages.

A [`Page`] parses its content stream into drawing commands once, and renders
them into [`Raster`]s of any size, rotation and clip on request. Parsing and
rendering are both cooperative tasks: they can run on worker threads while a
viewer shows the partially drawn raster, or be driven to completion on the
calling thread.

- [`Renderer`] replays the commands of a page onto a raster using `vello_cpu`,
  stroking paths with `folio-path`.
- [`RenderCache`] keeps rendered rasters and makes sure that there is at most
  one renderer per requested image.

## Example
```
use folio::{Page, Rotation};
use folio_interpret::DictResources;
use folio_syntax::MemoryObjects;
use kurbo::Rect;
use std::sync::Arc;

let objects = Arc::new(MemoryObjects::new());
let resources = Arc::new(DictResources::empty(objects.clone()));
let page = Page::new(
    b"0 0 1 rg 0 0 50 100 re f".as_slice(),
    resources,
    objects,
    Rect::new(0.0, 0.0, 100.0, 100.0),
);

let raster = page.get_image(100, 100, None, true, true);
assert!(raster.is_complete());
assert_eq!(raster.pixel(10, 50), Some([0, 0, 255, 255]));
assert_eq!(raster.pixel(90, 50), Some([255, 255, 255, 255]));
```

## Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cache;
pub mod page;
pub mod raster;
pub mod renderer;

mod surface;
mod util;

pub use cache::{CacheLookup, CacheSettings, ImageRequestKey, RenderCache};
pub use folio_interpret;
pub use folio_path;
pub use folio_syntax;
pub use page::Page;
pub use raster::Raster;
pub use renderer::{GraphicsState, Renderer, Rotation, initial_transform};

use folio_interpret::Color;

/// Settings that should be applied when rendering.
#[derive(Clone, Debug)]
pub struct RenderSettings {
    /// The color the raster is filled with before drawing, if the background
    /// is drawn.
    ///
    /// By default, this is white.
    pub background: Color,
    /// Strokes thinner than this many device pixels are widened to it.
    ///
    /// By default, this is 1.
    pub hairline_threshold: f64,
    /// The maximum deviation of stroke outlines from their exact position,
    /// in device pixels.
    ///
    /// By default, this is 0.1.
    pub stroke_tolerance: f64,
    /// Whether edges shared by adjacent fills of the same color are
    /// reinforced, to hide anti-aliasing seams between them.
    ///
    /// By default, this is enabled.
    pub seam_correction: bool,
    /// The number of threads `vello_cpu` uses for rasterization. Zero means
    /// rasterizing on the thread of the renderer.
    ///
    /// By default, this is 0.
    pub num_threads: u16,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            background: Color::WHITE,
            hairline_threshold: 1.0,
            stroke_tolerance: 0.1,
            seam_correction: true,
            num_threads: 0,
        }
    }
}
