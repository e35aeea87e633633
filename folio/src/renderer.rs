//! Replaying drawing commands onto a raster.

use crate::RenderSettings;
use crate::raster::Raster;
use crate::surface::{DevicePaint, Surface};
use crate::util::{singular_values, union, x_y_advances};
use core::convert::Infallible;
use folio_interpret::{
    Color, Command, CommandBuffer, DataSignal, DrawMode, ImageData, Paint, Read, ShadingSpace,
    Step, Task,
};
use folio_path::{FillRule, Path, Segment, StrokeStyle, stroke_with_tolerance};
use kurbo::{Affine, BezPath, PathSeg, Point, Rect, Shape};
use log::{debug, trace, warn};
use std::sync::{Arc, Weak};

/// Fills with more straight edges than this are not considered for seam
/// correction.
const MAX_SEAM_EDGES: usize = 64;
/// How close the end points of two edges must be, in device pixels, for the
/// edges to be considered shared.
const SEAM_EPSILON: f64 = 0.01;

/// The clockwise rotation of a page.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    /// Upright.
    #[default]
    None,
    /// Rotated by 90 degrees.
    Quarter,
    /// Rotated by 180 degrees.
    Half,
    /// Rotated by 270 degrees.
    ThreeQuarters,
}

impl Rotation {
    /// Create a rotation from a number of degrees, as stored in the `/Rotate`
    /// entry of a page. Values that are not a multiple of 90 are rounded
    /// down to one.
    pub fn from_degrees(degrees: i64) -> Self {
        match degrees.rem_euclid(360) / 90 {
            1 => Self::Quarter,
            2 => Self::Half,
            3 => Self::ThreeQuarters,
            _ => Self::None,
        }
    }

    /// The rotation in degrees.
    pub fn degrees(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Quarter => 90,
            Self::Half => 180,
            Self::ThreeQuarters => 270,
        }
    }

    /// Whether the rotation swaps width and height.
    pub fn is_sideways(self) -> bool {
        matches!(self, Self::Quarter | Self::ThreeQuarters)
    }
}

/// The transform from page space into a raster of the given size.
///
/// `region` is the part of the page, in page space, that is mapped onto the
/// whole raster after applying the rotation. The y axis is flipped, so that
/// the top of the page ends up at the top of the raster.
pub fn initial_transform(region: Rect, rotation: Rotation, width: u16, height: u16) -> Affine {
    let region = region.abs();
    let (w, h) = (width as f64, height as f64);
    let rw = region.width().max(f64::EPSILON);
    let rh = region.height().max(f64::EPSILON);
    let Rect { x0, y0, x1, y1 } = region;

    match rotation {
        Rotation::None => Affine::new([w / rw, 0.0, 0.0, -h / rh, -x0 * w / rw, y1 * h / rh]),
        Rotation::Quarter => {
            Affine::new([0.0, h / rw, w / rh, 0.0, -y0 * w / rh, -x0 * h / rw])
        }
        Rotation::Half => Affine::new([-w / rw, 0.0, 0.0, h / rh, x1 * w / rw, -y0 * h / rh]),
        Rotation::ThreeQuarters => {
            Affine::new([0.0, -h / rw, -w / rh, 0.0, y1 * w / rh, x1 * h / rw])
        }
    }
}

/// The straight edges of the most recent fill, used to hide seams between
/// adjacent shapes.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FillEdges {
    color: Color,
    edges: Vec<(Point, Point)>,
}

/// The drawing state of a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsState {
    /// The transform from user space into device space.
    pub transform: Affine,
    /// How paths are stroked, in user space.
    pub stroke: StrokeStyle,
    /// The paint used for filling.
    pub fill_paint: Paint,
    /// The paint used for stroking.
    pub stroke_paint: Paint,
    /// The constant alpha used for filling.
    pub fill_alpha: f32,
    /// The constant alpha used for stroking.
    pub stroke_alpha: f32,
    /// The number of clip layers in effect.
    pub clip_depth: usize,
    /// The bounds of the clip region in device space, if it was clipped.
    pub clip_bounds: Option<Rect>,
    pub(crate) last_fill: Option<Arc<FillEdges>>,
}

impl GraphicsState {
    fn new(transform: Affine) -> Self {
        Self {
            transform,
            stroke: StrokeStyle::default(),
            fill_paint: Paint::default(),
            stroke_paint: Paint::default(),
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            clip_depth: 0,
            clip_bounds: None,
            last_fill: None,
        }
    }
}

/// A task that draws the commands of a [`CommandBuffer`] onto a [`Raster`].
///
/// Each step executes one command. Once the renderer has caught up with its
/// buffer, it publishes what it has drawn so far to the raster and either
/// waits for more commands or completes, depending on whether the buffer is
/// finished. The renderer stops as soon as its raster is dropped.
pub struct Renderer {
    buffer: Arc<CommandBuffer>,
    raster: Weak<Raster>,
    surface: Surface,
    settings: RenderSettings,
    draw_background: bool,
    initial_transform: Affine,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    next: usize,
    dirty: Option<Rect>,
    published: bool,
}

impl Renderer {
    /// Create a renderer drawing `buffer` onto `raster`, starting with
    /// `initial_transform` as the transform from page space to device space.
    pub fn new(
        buffer: Arc<CommandBuffer>,
        raster: &Arc<Raster>,
        initial_transform: Affine,
        draw_background: bool,
        settings: RenderSettings,
    ) -> Self {
        Self {
            buffer,
            raster: Arc::downgrade(raster),
            surface: Surface::new(raster.width(), raster.height(), &settings),
            settings,
            draw_background,
            initial_transform,
            state: GraphicsState::new(initial_transform),
            stack: vec![],
            next: 0,
            dirty: None,
            published: false,
        }
    }

    /// The current drawing state.
    pub fn state(&self) -> &GraphicsState {
        &self.state
    }

    /// The number of commands executed so far.
    pub fn position(&self) -> usize {
        self.next
    }

    /// The number of states saved by `Push` that were not restored yet.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Execute a single command.
    pub fn execute(&mut self, command: &Command) {
        trace!("executing {command:?}");

        match command {
            Command::Push => self.stack.push(self.state.clone()),
            Command::Pop => self.restore(),
            Command::Transform(m) => self.state.transform = self.state.transform * *m,
            Command::SetStrokeWidth(w) => self.state.stroke.width = *w,
            Command::SetStrokeCap(c) => self.state.stroke.cap = *c,
            Command::SetStrokeJoin(j) => self.state.stroke.join = *j,
            Command::SetStrokeMiter(m) => self.state.stroke.miter_limit = *m,
            Command::SetStrokeDash(d) => self.state.stroke.dash = d.clone(),
            Command::SetFillPaint(p) => self.state.fill_paint = p.clone(),
            Command::SetStrokePaint(p) => self.state.stroke_paint = p.clone(),
            Command::SetFillAlpha(a) => self.state.fill_alpha = a.clamp(0.0, 1.0),
            Command::SetStrokeAlpha(a) => self.state.stroke_alpha = a.clamp(0.0, 1.0),
            Command::DrawPath(path, mode) => self.draw_path(path, *mode),
            Command::DrawImage(image) => self.draw_image(image),
        }
    }

    fn restore(&mut self) {
        let Some(state) = self.stack.pop() else {
            warn!("tried to restore without a saved state");

            return;
        };

        while self.surface.clip_depth() > state.clip_depth {
            self.surface.pop_clip();
        }

        self.state = state;
    }

    fn draw_path(&mut self, path: &Path, mode: DrawMode) {
        if mode.contains(DrawMode::FILL) {
            self.fill(path);
        }

        if mode.contains(DrawMode::STROKE) {
            self.stroke(path);
        }

        if mode.contains(DrawMode::CLIP) {
            self.clip(path);
        }
    }

    fn fill(&mut self, path: &Path) {
        let bez = self.state.transform * path.to_bez_path();
        let paint = DevicePaint::new(&self.state.fill_paint, self.anchor(&self.state.fill_paint));
        self.surface
            .fill_path(&bez, path.fill_rule(), &paint, self.state.fill_alpha);
        self.mark_dirty(bez.bounding_box());

        if self.settings.seam_correction {
            self.correct_seams(&bez);
        }
    }

    fn stroke(&mut self, path: &Path) {
        let transform = self.state.transform;
        let (min_scale, max_scale) = singular_values(&transform);
        let mut style = self.state.stroke.clone();
        let threshold = self.settings.hairline_threshold;

        let tolerance = if min_scale > f64::EPSILON {
            let per_unit = thinnest_device_width(path, &transform).unwrap_or(min_scale);

            if style.width * per_unit < threshold {
                style.width = threshold / per_unit;
            }

            self.settings.stroke_tolerance / max_scale
        } else {
            style.width = style.width.max(1.0);

            folio_path::stroke::default_tolerance(style.width)
        };

        let outline = stroke_with_tolerance(path, &style, tolerance);

        if outline.is_empty() {
            return;
        }

        let bez = self.state.transform * outline.to_bez_path();
        let paint =
            DevicePaint::new(&self.state.stroke_paint, self.anchor(&self.state.stroke_paint));
        self.surface
            .fill_path(&bez, FillRule::NonZero, &paint, self.state.stroke_alpha);
        self.mark_dirty(bez.bounding_box());
    }

    fn clip(&mut self, path: &Path) {
        let bez = self.state.transform * path.to_bez_path();
        let bounds = bez.bounding_box();

        self.surface.push_clip(&bez, path.fill_rule());
        self.state.clip_depth = self.surface.clip_depth();
        self.state.clip_bounds = Some(match self.state.clip_bounds {
            Some(clip) => clip.intersect(bounds),
            None => bounds,
        });
    }

    fn draw_image(&mut self, image: &ImageData) {
        let paint = DevicePaint::new(&self.state.fill_paint, self.anchor(&self.state.fill_paint));
        self.surface
            .draw_image(image, self.state.transform, &paint, self.state.fill_alpha);
        self.mark_dirty(self.state.transform.transform_rect_bbox(Rect::new(0.0, 0.0, 1.0, 1.0)));
    }

    /// The transform shading paints are anchored at.
    fn anchor(&self, paint: &Paint) -> Affine {
        match paint {
            Paint::Shading(s) if s.space == ShadingSpace::Page => self.initial_transform,
            _ => self.state.transform,
        }
    }

    /// Re-stroke the edges a fill shares with the previous fill of the same
    /// solid color by one device pixel, so that no background shines through
    /// between them.
    fn correct_seams(&mut self, bez: &BezPath) {
        let color = match &self.state.fill_paint {
            Paint::Solid(c) if c.a >= 1.0 && self.state.fill_alpha >= 1.0 => *c,
            _ => {
                self.state.last_fill = None;

                return;
            }
        };

        let Some(edges) = line_edges(bez) else {
            self.state.last_fill = None;

            return;
        };

        if let Some(last) = &self.state.last_fill
            && last.color == color
        {
            let shared: Vec<_> = edges
                .iter()
                .filter(|e| last.edges.iter().any(|l| same_edge(**e, *l)))
                .copied()
                .collect();

            if !shared.is_empty() {
                debug!("correcting {} shared edges", shared.len());

                let mut seams = Path::new();

                for (p0, p1) in shared {
                    seams.move_to(p0);
                    seams.line_to(p1);
                }

                let outline = stroke_with_tolerance(
                    &seams,
                    &StrokeStyle::new(1.0),
                    self.settings.stroke_tolerance,
                );
                let outline = outline.to_bez_path();
                self.surface.fill_path(
                    &outline,
                    FillRule::NonZero,
                    &DevicePaint::Solid(color),
                    1.0,
                );
                self.mark_dirty(outline.bounding_box());
            }
        }

        self.state.last_fill = Some(Arc::new(FillEdges { color, edges }));
    }

    fn mark_dirty(&mut self, rect: Rect) {
        let rect = match self.state.clip_bounds {
            Some(clip) => rect.intersect(clip),
            None => rect,
        }
        .intersect(self.surface.bounds());

        if rect.width() > 0.0 && rect.height() > 0.0 {
            self.dirty = Some(union(self.dirty, rect));
        }
    }

    /// Publish the pixels drawn so far, if anything changed and the surface
    /// can currently be rendered.
    fn publish(&mut self, raster: &Raster) {
        if self.dirty.is_none() && self.published {
            return;
        }

        if let Some(pixmap) = self.surface.snapshot() {
            raster.publish(pixmap, self.dirty.take());
            self.published = true;
        }
    }
}

impl Task for Renderer {
    type Error = Infallible;

    fn setup(&mut self) -> Result<(), Self::Error> {
        if self.draw_background {
            self.surface.fill_background(self.settings.background);
            self.dirty = Some(self.surface.bounds());
        }

        Ok(())
    }

    fn iterate(&mut self) -> Result<Step, Self::Error> {
        let Some(raster) = self.raster.upgrade() else {
            debug!("raster was dropped, stopping renderer");

            return Ok(Step::Stopped);
        };

        match self.buffer.read(self.next) {
            Read::Command(command) => {
                self.execute(&command);
                self.next += 1;

                Ok(Step::Running)
            }
            Read::Pending => {
                self.publish(&raster);

                Ok(Step::NeedsData)
            }
            Read::Finished => {
                if !self.stack.is_empty() {
                    debug!("closing {} unbalanced states", self.stack.len());
                }

                while !self.stack.is_empty() {
                    self.restore();
                }

                while self.surface.clip_depth() > 0 {
                    self.surface.pop_clip();
                }

                self.publish(&raster);
                raster.mark_complete();

                Ok(Step::Completed)
            }
        }
    }

    fn data_signal(&self) -> Option<DataSignal> {
        Some(self.buffer.signal())
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("position", &self.next)
            .field("depth", &self.stack.len())
            .field("surface", &self.surface)
            .finish_non_exhaustive()
    }
}

/// The smallest device width of a stroke of user width one along any line or
/// control polygon leg of `path`, or `None` if the path has no extent.
///
/// A pen moving in direction `d` covers a band whose device width is
/// `|det| * |d| / |M d|`, which lies between the two singular values.
fn thinnest_device_width(path: &Path, transform: &Affine) -> Option<f64> {
    let det = transform.determinant().abs();
    let (x_advance, y_advance) = x_y_advances(transform);
    let mut thinnest: Option<f64> = None;

    let mut measure = |from: Point, to: Point| {
        let d = to - from;
        let device = x_advance * d.x + y_advance * d.y;

        if d.hypot2() > 0.0 && device.hypot2() > 0.0 {
            let width = det * d.hypot() / device.hypot();
            thinnest = Some(thinnest.map_or(width, |t: f64| t.min(width)));
        }
    };

    let mut start = Point::ZERO;
    let mut current = Point::ZERO;

    for segment in path.segments() {
        match *segment {
            Segment::MoveTo(p) => {
                start = p;
                current = p;
            }
            Segment::LineTo(p) => {
                measure(current, p);
                current = p;
            }
            Segment::QuadTo(p1, p2) => {
                measure(current, p1);
                measure(p1, p2);
                current = p2;
            }
            Segment::CubicTo(p1, p2, p3) => {
                measure(current, p1);
                measure(p1, p2);
                measure(p2, p3);
                current = p3;
            }
            Segment::Close => {
                measure(current, start);
                current = start;
            }
        }
    }

    thinnest
}

/// The straight edges of a path, or `None` if there are too many of them.
fn line_edges(path: &BezPath) -> Option<Vec<(Point, Point)>> {
    let mut edges = vec![];

    for seg in path.segments() {
        if let PathSeg::Line(line) = seg
            && (line.p1 - line.p0).hypot2() > SEAM_EPSILON * SEAM_EPSILON
        {
            if edges.len() == MAX_SEAM_EDGES {
                return None;
            }

            edges.push((line.p0, line.p1));
        }
    }

    Some(edges)
}

fn same_edge(a: (Point, Point), b: (Point, Point)) -> bool {
    let close = |p: Point, q: Point| (p - q).hypot2() <= SEAM_EPSILON * SEAM_EPSILON;

    (close(a.0, b.0) && close(a.1, b.1)) || (close(a.0, b.1) && close(a.1, b.0))
}
