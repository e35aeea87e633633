//! The content stream interpreter.
//!
//! An [`Interpreter`] is a [`Task`] that reads one top-level object of a
//! content stream per step. Operands are collected on a stack, operators
//! consume them and turn the current state into [`Command`]s, which are
//! appended to the page's [`CommandBuffer`].

use crate::buffer::CommandBuffer;
use crate::color::{ColorSpace, DevicePaints, PaintProvider, affine_from_array};
use crate::command::{Command, DrawMode, ImageRef};
use crate::error::{DecodeError, InterpretError, ParseError, ResourceError, Result};
use crate::font::{FontProvider, WidthsOnly};
use crate::image::{ImageDecoder, RawImageDecoder};
use crate::paint::Paint;
use crate::resources::{ResourceCategory, ResourceLookup};
use crate::state::{ParserState, StateStack, TextRenderingMode};
use crate::task::{Step, Task};
use crate::util::{OptionLog, lock};
use core::fmt;
use folio_path::{Dash, FillRule, LineCap, LineJoin, Path};
use folio_syntax::object::{keyword_literal, read_object};
use folio_syntax::{Lexer, Name, ObjRef, Object, ObjectModel, SyntaxError, Token};
use kurbo::{Affine, Point};
use log::{trace, warn};
use ops::{Arg, Op, Signature};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::{Arc, Mutex, Weak};
use text::TextObject;

mod inline_image;
mod ops;
mod text;
mod x_object;

/// A callback function for resolving warnings during interpretation.
pub type WarningSinkFn = Arc<dyn Fn(InterpreterWarning) + Send + Sync>;

/// Settings that should be applied during the interpretation process.
#[derive(Clone)]
pub struct InterpreterSettings {
    /// Provides the glyphs of shown text. The default provider only knows
    /// glyph advances, so text moves the text position but draws nothing.
    pub fonts: Arc<dyn FontProvider>,
    /// Converts colors, patterns and shadings into paints.
    pub paints: Arc<dyn PaintProvider>,
    /// Decodes image XObjects and inline images.
    pub images: Arc<dyn ImageDecoder>,
    /// In certain cases, a warning is emitted in case an issue was
    /// encountered that does not stop the interpretation. Providing a
    /// callback allows you to catch those warnings and handle them, if
    /// desired.
    pub warning_sink: WarningSinkFn,
    /// How deeply form XObjects may be nested before interpretation fails.
    pub max_form_depth: usize,
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self {
            fonts: Arc::new(WidthsOnly),
            paints: Arc::new(DevicePaints),
            images: Arc::new(RawImageDecoder),
            warning_sink: Arc::new(|_| {}),
            max_form_depth: 32,
        }
    }
}

impl fmt::Debug for InterpreterSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpreterSettings")
            .field("max_form_depth", &self.max_form_depth)
            .finish_non_exhaustive()
    }
}

/// Warnings that can occur while interpreting a content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpreterWarning {
    /// An image failed to decode and was skipped.
    ImageDecodeFailure(DecodeError),
    /// The glyphs of a string could not be determined, the string was
    /// skipped.
    GlyphDecodeFailure(DecodeError),
    /// The content of a form XObject could not be decoded, the form was
    /// skipped.
    ContentDecodeFailure(DecodeError),
    /// An operator was invoked with more operands than it takes. The
    /// superfluous ones were dropped.
    StrayOperands {
        /// The operator.
        op: &'static str,
        /// The number of dropped operands.
        count: usize,
    },
    /// `Q` was used without a matching `q`.
    UnbalancedRestore,
    /// A shading could not be turned into a paint.
    UnsupportedShading,
    /// A pattern could not be turned into a paint.
    UnsupportedPattern,
}

impl fmt::Display for InterpreterWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageDecodeFailure(e) => write!(f, "failed to decode image: {e}"),
            Self::GlyphDecodeFailure(e) => write!(f, "failed to decode text: {e}"),
            Self::ContentDecodeFailure(e) => write!(f, "failed to decode form content: {e}"),
            Self::StrayOperands { op, count } => {
                write!(f, "dropped {count} superfluous operands of {op}")
            }
            Self::UnbalancedRestore => write!(f, "restore without matching save"),
            Self::UnsupportedShading => write!(f, "unsupported shading"),
            Self::UnsupportedPattern => write!(f, "unsupported pattern"),
        }
    }
}

/// Where emitted commands go.
#[derive(Debug)]
enum Sink {
    /// The buffer of a page. Interpretation stops once the page drops it.
    Buffer(Weak<CommandBuffer>),
    /// A list that is spliced into another stream, used for forms.
    Local(Vec<Arc<Command>>),
}

impl Sink {
    fn push(&mut self, command: Arc<Command>) {
        match self {
            Self::Buffer(buffer) => {
                if let Some(buffer) = buffer.upgrade() {
                    buffer.append_shared(command);
                }
            }
            Self::Local(commands) => commands.push(command),
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            Self::Buffer(buffer) => buffer.strong_count() > 0,
            Self::Local(_) => true,
        }
    }
}

type FormCache = Arc<Mutex<FxHashMap<ObjRef, Arc<[Arc<Command>]>>>>;
type ImageCache = Arc<Mutex<FxHashMap<ObjRef, ImageRef>>>;

/// Decoded XObjects, keyed by the identity of their streams.
#[derive(Debug, Clone, Default)]
struct XObjectCache {
    forms: FormCache,
    images: ImageCache,
}

impl XObjectCache {
    fn form(&self, id: ObjRef) -> Option<Arc<[Arc<Command>]>> {
        lock(&self.forms).get(&id).cloned()
    }

    fn image(&self, id: ObjRef) -> Option<ImageRef> {
        lock(&self.images).get(&id).cloned()
    }
}

/// Which of the two paints an operator sets.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum PaintTarget {
    Fill,
    Stroke,
}

type Operands = SmallVec<[Object; 8]>;

/// A resumable interpreter for one content stream.
pub struct Interpreter {
    content: Arc<[u8]>,
    pos: usize,
    operands: Operands,
    resources: Arc<dyn ResourceLookup>,
    objects: Arc<dyn ObjectModel>,
    settings: InterpreterSettings,
    sink: Sink,
    state: StateStack,
    path: Path,
    // The winding rule of a pending `W` or `W*`.
    clip: Option<FillRule>,
    // The nesting depth of `BX`/`EX` sections.
    compatibility: usize,
    text: TextObject,
    cache: XObjectCache,
    form_depth: usize,
}

impl Interpreter {
    /// Create an interpreter that appends the commands of `content` to
    /// `target`.
    ///
    /// The interpreter only holds a weak reference to the buffer and stops
    /// once the buffer is dropped.
    pub fn new(
        content: impl Into<Arc<[u8]>>,
        resources: Arc<dyn ResourceLookup>,
        objects: Arc<dyn ObjectModel>,
        target: &Arc<CommandBuffer>,
        settings: InterpreterSettings,
    ) -> Self {
        Self::with_sink(
            content.into(),
            resources,
            objects,
            settings,
            Sink::Buffer(Arc::downgrade(target)),
            ParserState::default(),
            XObjectCache::default(),
            0,
        )
    }

    fn with_sink(
        content: Arc<[u8]>,
        resources: Arc<dyn ResourceLookup>,
        objects: Arc<dyn ObjectModel>,
        settings: InterpreterSettings,
        sink: Sink,
        state: ParserState,
        cache: XObjectCache,
        form_depth: usize,
    ) -> Self {
        Self {
            content,
            pos: 0,
            operands: SmallVec::new(),
            resources,
            objects,
            settings,
            sink,
            state: StateStack::new(state),
            path: Path::new(),
            clip: None,
            compatibility: 0,
            text: TextObject::default(),
            cache,
            form_depth,
        }
    }

    /// The offset of the next unread byte of the content stream.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn emit(&mut self, command: Command) {
        self.sink.push(Arc::new(command));
    }

    fn warn(&self, warning: InterpreterWarning) {
        warn!("{warning}");
        (self.settings.warning_sink)(warning);
    }

    fn find_resource(&self, name: &Name, category: ResourceCategory) -> Result<Object> {
        let obj = self
            .resources
            .find(name, category)
            .ok_or_else(|| ResourceError::Missing {
                category,
                name: name.clone(),
            })?;

        match obj {
            Object::Ref(r) => match self.objects.resolve_object(&obj) {
                Object::Null => Err(ResourceError::Unresolvable(r).into()),
                resolved => Ok(resolved),
            },
            obj => Ok(obj),
        }
    }

    fn take_operands(&mut self, op: Op) -> Result<Operands> {
        match op.signature() {
            Signature::Fixed(args) => self.take_fixed(op, args),
            Signature::Color => {
                let n = self.num_components(op);
                self.take_fixed_numbers(op, n)
            }
            Signature::ColorOrPattern => {
                if matches!(self.operands.last(), Some(Object::Name(_))) {
                    // The components preceding a pattern name belong to
                    // uncolored patterns, so there are no superfluous ones.
                    let name_index = self.operands.len() - 1;
                    let start = self.operands[..name_index]
                        .iter()
                        .rposition(|o| o.as_number().is_none())
                        .map_or(0, |i| i + 1);

                    if start > 0 {
                        self.drop_stray(op, start);
                    }

                    Ok(self.operands.drain(..).collect())
                } else {
                    let n = self.num_components(op);
                    self.take_fixed_numbers(op, n)
                }
            }
        }
    }

    fn take_fixed_numbers(&mut self, op: Op, n: usize) -> Result<Operands> {
        const NUMBERS: [Arg; 32] = [Arg::Number; 32];

        self.take_fixed(op, &NUMBERS[..n.min(NUMBERS.len())])
    }

    fn take_fixed(&mut self, op: Op, args: &[Arg]) -> Result<Operands> {
        let expected = args.len();
        let found = self.operands.len();

        if found < expected {
            return Err(ParseError::StackUnderflow {
                op: op.mnemonic(),
                expected,
                found,
            }
            .into());
        }

        if found > expected {
            self.drop_stray(op, found - expected);
        }

        let operands = self.operands.drain(..).collect::<Operands>();

        for (index, (operand, arg)) in operands.iter().zip(args).enumerate() {
            let matches = match arg {
                Arg::Number => matches!(operand, Object::Number(_)),
                Arg::Name => matches!(operand, Object::Name(_)),
                Arg::String => matches!(operand, Object::String(_)),
                Arg::Array => matches!(operand, Object::Array(_)),
                Arg::Properties => matches!(operand, Object::Name(_) | Object::Dict(_)),
            };

            if !matches {
                return Err(ParseError::OperandType {
                    op: op.mnemonic(),
                    index,
                    expected: arg.kind(),
                }
                .into());
            }
        }

        Ok(operands)
    }

    fn drop_stray(&mut self, op: Op, count: usize) {
        self.operands.drain(..count);
        self.warn(InterpreterWarning::StrayOperands {
            op: op.mnemonic(),
            count,
        });
    }

    fn num_components(&self, op: Op) -> usize {
        let cs = match Self::paint_target(op) {
            PaintTarget::Fill => &self.state.get().fill_cs,
            PaintTarget::Stroke => &self.state.get().stroke_cs,
        };

        self.settings.paints.num_components(cs)
    }

    fn paint_target(op: Op) -> PaintTarget {
        match op {
            Op::StrokeColor
            | Op::StrokeColorNamed
            | Op::StrokeColorDeviceGray
            | Op::StrokeColorDeviceRgb
            | Op::StrokeColorCmyk
            | Op::ColorSpaceStroke => PaintTarget::Stroke,
            _ => PaintTarget::Fill,
        }
    }

    fn execute(&mut self, keyword: &Name, lexer: &mut Lexer<'_>) -> Result<()> {
        let Some(op) = Op::from_keyword(keyword) else {
            if self.compatibility > 0 {
                trace!("skipping unknown operator {keyword}");
                self.operands.clear();

                return Ok(());
            }

            return Err(ParseError::UnknownOperator(keyword.to_string()).into());
        };

        let args = self.take_operands(op)?;
        trace!("{} {args:?}", op.mnemonic());

        self.dispatch(op, &args, lexer)
    }

    fn dispatch(&mut self, op: Op, args: &[Object], lexer: &mut Lexer<'_>) -> Result<()> {
        match op {
            Op::SaveState => {
                self.state.save();
                self.emit(Command::Push);
            }
            Op::RestoreState => {
                if self.state.restore() {
                    self.emit(Command::Pop);
                } else {
                    self.warn(InterpreterWarning::UnbalancedRestore);
                }
            }
            Op::Transform => self.emit(Command::Transform(affine(args))),
            Op::LineWidth => self.emit(Command::SetStrokeWidth(num(args, 0))),
            Op::LineCap => {
                if let Some(cap) = LineCap::from_number(num(args, 0) as i64)
                    .warn_none("invalid line cap")
                {
                    self.emit(Command::SetStrokeCap(cap));
                }
            }
            Op::LineJoin => {
                if let Some(join) = LineJoin::from_number(num(args, 0) as i64)
                    .warn_none("invalid line join")
                {
                    self.emit(Command::SetStrokeJoin(join));
                }
            }
            Op::MiterLimit => self.emit(Command::SetStrokeMiter(num(args, 0))),
            Op::DashPattern => {
                let dash = dash_pattern(array(args, 0), num(args, 1));
                self.emit(Command::SetStrokeDash(dash));
            }
            Op::RenderingIntent | Op::Flatness => {}
            Op::SetGraphicsState => self.set_graphics_state(name(args, 0))?,
            Op::MoveTo => self.path.move_to(point(args, 0)),
            Op::LineTo => self.path.line_to(point(args, 0)),
            Op::CubicTo => self
                .path
                .cubic_to(point(args, 0), point(args, 2), point(args, 4)),
            Op::CubicStartTo => match self.path.current_point() {
                Some(p0) => self.path.cubic_to(p0, point(args, 0), point(args, 2)),
                None => warn!("v operator without current point"),
            },
            Op::CubicEndTo => {
                let p3 = point(args, 2);
                self.path.cubic_to(point(args, 0), p3, p3);
            }
            Op::ClosePath => self.path.close(),
            Op::RectPath => {
                self.path
                    .push_rect(num(args, 0), num(args, 1), num(args, 2), num(args, 3));
            }
            Op::StrokePath => self.paint_path(DrawMode::STROKE, FillRule::NonZero, false),
            Op::CloseAndStrokePath => self.paint_path(DrawMode::STROKE, FillRule::NonZero, true),
            Op::FillPathNonZero | Op::FillPathNonZeroCompatibility => {
                self.paint_path(DrawMode::FILL, FillRule::NonZero, false);
            }
            Op::FillPathEvenOdd => self.paint_path(DrawMode::FILL, FillRule::EvenOdd, false),
            Op::FillAndStrokeNonZero => {
                self.paint_path(DrawMode::FILL | DrawMode::STROKE, FillRule::NonZero, false);
            }
            Op::FillAndStrokeEvenOdd => {
                self.paint_path(DrawMode::FILL | DrawMode::STROKE, FillRule::EvenOdd, false);
            }
            Op::CloseFillAndStrokeNonZero => {
                self.paint_path(DrawMode::FILL | DrawMode::STROKE, FillRule::NonZero, true);
            }
            Op::CloseFillAndStrokeEvenOdd => {
                self.paint_path(DrawMode::FILL | DrawMode::STROKE, FillRule::EvenOdd, true);
            }
            Op::EndPath => self.paint_path(DrawMode::empty(), FillRule::NonZero, false),
            Op::ClipNonZero => self.clip = Some(FillRule::NonZero),
            Op::ClipEvenOdd => self.clip = Some(FillRule::EvenOdd),
            Op::Shading => self.shading(name(args, 0))?,
            Op::ColorSpaceStroke | Op::ColorSpaceNonStroke => {
                let cs = self.color_space(name(args, 0))?;
                self.set_color_space(Self::paint_target(op), cs);
            }
            Op::StrokeColor
            | Op::NonStrokeColor
            | Op::StrokeColorNamed
            | Op::NonStrokeColorNamed => self.set_color(Self::paint_target(op), args)?,
            Op::StrokeColorDeviceGray | Op::NonStrokeColorDeviceGray => {
                self.set_device_color(Self::paint_target(op), ColorSpace::DeviceGray, args);
            }
            Op::StrokeColorDeviceRgb | Op::NonStrokeColorDeviceRgb => {
                self.set_device_color(Self::paint_target(op), ColorSpace::DeviceRgb, args);
            }
            Op::StrokeColorCmyk | Op::NonStrokeColorCmyk => {
                self.set_device_color(Self::paint_target(op), ColorSpace::DeviceCmyk, args);
            }
            Op::XObject => self.x_object(name(args, 0))?,
            Op::BeginText => self.begin_text(),
            Op::EndText => self.end_text(),
            Op::CharacterSpacing => self.state.get_mut().text.char_space = num(args, 0),
            Op::WordSpacing => self.state.get_mut().text.word_space = num(args, 0),
            Op::HorizontalScaling => self.state.get_mut().text.horizontal_scaling = num(args, 0),
            Op::TextLeading => self.state.get_mut().text.leading = num(args, 0),
            Op::TextFont => self.set_font(name(args, 0), num(args, 1))?,
            Op::TextRenderingMode => {
                self.state.get_mut().text.render_mode =
                    TextRenderingMode::from_number(num(args, 0) as i64);
            }
            Op::TextRise => self.state.get_mut().text.rise = num(args, 0),
            Op::NextLine => self.next_line(num(args, 0), num(args, 1)),
            Op::NextLineAndSetLeading => {
                self.state.get_mut().text.leading = -num(args, 1);
                self.next_line(num(args, 0), num(args, 1));
            }
            Op::SetTextMatrix => self.set_text_matrix(affine(args)),
            Op::NextLineUsingLeading => self.next_line_using_leading(),
            Op::ShowText => self.show_text(string(args, 0)),
            Op::NextLineAndShowText => {
                self.next_line_using_leading();
                self.show_text(string(args, 0));
            }
            Op::NextLineAndShowTextWithSpacing => {
                self.state.get_mut().text.word_space = num(args, 0);
                self.state.get_mut().text.char_space = num(args, 1);
                self.next_line_using_leading();
                self.show_text(string(args, 2));
            }
            Op::ShowTexts => self.show_texts(array(args, 0)),
            Op::BeginInlineImage => self.inline_image(lexer)?,
            Op::InlineImageData | Op::EndInlineImage => {
                return Err(ParseError::InlineImage("image data outside of BI").into());
            }
            Op::BeginCompatibility => self.compatibility += 1,
            Op::EndCompatibility => {
                if self.compatibility == 0 {
                    warn!("EX without matching BX");
                }

                self.compatibility = self.compatibility.saturating_sub(1);
            }
            Op::MarkedContentPoint
            | Op::MarkedContentPointWithProperties
            | Op::BeginMarkedContent
            | Op::BeginMarkedContentWithProperties
            | Op::EndMarkedContent
            | Op::ColorGlyph
            | Op::ShapeGlyph => {}
        }

        Ok(())
    }

    /// Emit the current path with the given mode, combined with a pending
    /// clip, and start a new path.
    fn paint_path(&mut self, mode: DrawMode, fill_rule: FillRule, close: bool) {
        if close {
            self.path.close();
        }

        let mut path = core::mem::take(&mut self.path);
        let clip = self.clip.take();

        if path.is_empty() {
            return;
        }

        match clip {
            None => {
                if !mode.is_empty() {
                    path.set_fill_rule(fill_rule);
                    self.emit(Command::DrawPath(path, mode));
                }
            }
            // A path carries a single winding rule, so a fill and a clip with
            // different rules need two commands.
            Some(clip_rule) if mode.contains(DrawMode::FILL) && clip_rule != fill_rule => {
                let mut clip_path = path.clone();
                clip_path.set_fill_rule(clip_rule);
                path.set_fill_rule(fill_rule);

                self.emit(Command::DrawPath(path, mode));
                self.emit(Command::DrawPath(clip_path, DrawMode::CLIP));
            }
            Some(clip_rule) => {
                path.set_fill_rule(clip_rule);
                self.emit(Command::DrawPath(path, mode | DrawMode::CLIP));
            }
        }
    }

    fn set_graphics_state(&mut self, name: &Name) -> Result<()> {
        let gs = self.find_resource(name, ResourceCategory::ExtGState)?;
        let Some(dict) = gs.as_dict() else {
            warn!("graphics state {name} is not a dictionary");

            return Ok(());
        };

        let objects = self.objects.clone();
        let get = |key: &[u8]| dict.get(key).map(|v| objects.resolve_object(v));
        let number = |key: &[u8]| get(key).and_then(|v| v.as_number());

        if let Some(width) = number(b"LW") {
            self.emit(Command::SetStrokeWidth(width));
        }

        if let Some(cap) = number(b"LC").and_then(|c| LineCap::from_number(c as i64)) {
            self.emit(Command::SetStrokeCap(cap));
        }

        if let Some(join) = number(b"LJ").and_then(|j| LineJoin::from_number(j as i64)) {
            self.emit(Command::SetStrokeJoin(join));
        }

        if let Some(limit) = number(b"ML") {
            self.emit(Command::SetStrokeMiter(limit));
        }

        if let Some(d) = get(b"D").and_then(|d| objects.array(&d)) {
            match (d.first().and_then(Object::as_array), d.get(1).and_then(Object::as_number)) {
                (Some(array), Some(phase)) => {
                    self.emit(Command::SetStrokeDash(dash_pattern(array, phase)));
                }
                _ => warn!("invalid dash pattern in graphics state {name}"),
            }
        }

        if let Some(alpha) = number(b"CA") {
            self.emit(Command::SetStrokeAlpha(alpha.clamp(0.0, 1.0) as f32));
        }

        if let Some(alpha) = number(b"ca") {
            self.emit(Command::SetFillAlpha(alpha.clamp(0.0, 1.0) as f32));
        }

        if let Some(font) = get(b"Font").and_then(|f| objects.array(&f)) {
            let font_dict = font.first().map(|f| objects.resolve_object(f));

            match (
                font_dict.as_ref().and_then(Object::as_dict),
                font.get(1).and_then(Object::as_number),
            ) {
                (Some(dict), Some(size)) => {
                    let text = &mut self.state.get_mut().text;
                    text.font = Some(dict.clone());
                    text.font_size = size;
                }
                _ => warn!("invalid font in graphics state {name}"),
            }
        }

        Ok(())
    }

    fn color_space(&self, name: &Name) -> Result<ColorSpace> {
        if let Some(cs) = ColorSpace::from_name(name) {
            return Ok(cs);
        }

        let obj = self.find_resource(name, ResourceCategory::ColorSpace)?;

        Ok(ColorSpace::from_object(&obj, self.objects.as_ref()))
    }

    fn set_paint(&mut self, target: PaintTarget, paint: Paint) {
        match target {
            PaintTarget::Fill => self.emit(Command::SetFillPaint(paint)),
            PaintTarget::Stroke => self.emit(Command::SetStrokePaint(paint)),
        }
    }

    fn current_color_space(&self, target: PaintTarget) -> &ColorSpace {
        match target {
            PaintTarget::Fill => &self.state.get().fill_cs,
            PaintTarget::Stroke => &self.state.get().stroke_cs,
        }
    }

    fn set_color_space(&mut self, target: PaintTarget, cs: ColorSpace) {
        let paints = self.settings.paints.clone();
        let initial = (!cs.is_pattern()).then(|| paints.paint_for(&cs, &paints.initial_color(&cs)));

        match target {
            PaintTarget::Fill => self.state.get_mut().fill_cs = cs,
            PaintTarget::Stroke => self.state.get_mut().stroke_cs = cs,
        }

        if let Some(paint) = initial {
            self.set_paint(target, paint);
        }
    }

    fn set_device_color(&mut self, target: PaintTarget, cs: ColorSpace, args: &[Object]) {
        let components = components(args);
        let paint = self.settings.paints.paint_for(&cs, &components);

        match target {
            PaintTarget::Fill => self.state.get_mut().fill_cs = cs,
            PaintTarget::Stroke => self.state.get_mut().stroke_cs = cs,
        }

        self.set_paint(target, paint);
    }

    fn set_color(&mut self, target: PaintTarget, args: &[Object]) -> Result<()> {
        if let Some(Object::Name(pattern)) = args.last() {
            let obj = self.find_resource(pattern, ResourceCategory::Pattern)?;
            let paint = match self
                .settings
                .paints
                .paint_for_pattern(&obj, self.objects.as_ref())
            {
                Some(paint) => paint,
                None => {
                    self.warn(InterpreterWarning::UnsupportedPattern);

                    Paint::default()
                }
            };

            self.set_paint(target, paint);

            return Ok(());
        }

        let paint = self
            .settings
            .paints
            .paint_for(self.current_color_space(target), &components(args));
        self.set_paint(target, paint);

        Ok(())
    }

    fn finish_stream(&mut self) {
        if !self.operands.is_empty() {
            let count = self.operands.len();
            self.operands.clear();
            self.warn(InterpreterWarning::StrayOperands {
                op: "end of stream",
                count,
            });
        }

        if self.state.depth() > 0 {
            warn!("{} unbalanced saves at end of stream", self.state.depth());
        }

        while self.state.restore() {
            self.emit(Command::Pop);
        }
    }
}

impl Task for Interpreter {
    type Error = InterpretError;

    fn iterate(&mut self) -> Result<Step> {
        if !self.sink.is_alive() {
            return Ok(Step::Stopped);
        }

        let content = self.content.clone();
        let mut lexer = Lexer::new(&content);
        lexer.seek(self.pos);

        let token = lexer.next();
        let result = match token {
            Token::Eof => {
                self.finish_stream();

                return Ok(Step::Completed);
            }
            Token::Keyword(keyword) => match keyword_literal(&keyword) {
                Some(literal) => {
                    self.operands.push(literal);
                    Ok(())
                }
                None => self.execute(&keyword, &mut lexer),
            },
            Token::Number(_)
            | Token::Name(_)
            | Token::String(_)
            | Token::ArrayBegin
            | Token::DictBegin => match read_object(&mut lexer, token) {
                Ok(obj) => {
                    self.operands.push(obj);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            },
            Token::Unknown(anomaly) => Err(ParseError::Syntax(SyntaxError::Lex(anomaly)).into()),
            t @ (Token::ArrayEnd | Token::DictEnd | Token::ProcBegin | Token::ProcEnd) => {
                Err(ParseError::UnexpectedToken(format!("{t:?}")).into())
            }
        };

        self.pos = lexer.position();
        result?;

        if self.sink.is_alive() {
            Ok(Step::Running)
        } else {
            Ok(Step::Stopped)
        }
    }

    fn cleanup(&mut self) {
        if let Sink::Buffer(buffer) = &self.sink
            && let Some(buffer) = buffer.upgrade()
        {
            buffer.finish();
        }
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("pos", &self.pos)
            .field("len", &self.content.len())
            .field("operands", &self.operands.len())
            .field("form_depth", &self.form_depth)
            .finish_non_exhaustive()
    }
}

/// Interpret a content stream to completion and return its commands.
///
/// Useful for content that is not tied to a page, and for tests.
pub fn interpret_to_vec(
    content: impl Into<Arc<[u8]>>,
    resources: Arc<dyn ResourceLookup>,
    objects: Arc<dyn ObjectModel>,
    settings: InterpreterSettings,
) -> Result<Vec<Arc<Command>>> {
    let mut interpreter = Interpreter::with_sink(
        content.into(),
        resources,
        objects,
        settings,
        Sink::Local(vec![]),
        ParserState::default(),
        XObjectCache::default(),
        0,
    );

    interpreter.run_local()
}

impl Interpreter {
    /// Run an interpreter with a local sink to completion.
    fn run_local(&mut self) -> Result<Vec<Arc<Command>>> {
        while self.iterate()? == Step::Running {}

        match &mut self.sink {
            Sink::Local(commands) => Ok(core::mem::take(commands)),
            Sink::Buffer(_) => Ok(vec![]),
        }
    }
}

fn num(args: &[Object], index: usize) -> f64 {
    args.get(index).and_then(Object::as_number).unwrap_or(0.0)
}

fn point(args: &[Object], index: usize) -> Point {
    Point::new(num(args, index), num(args, index + 1))
}

fn name(args: &[Object], index: usize) -> &Name {
    static EMPTY: std::sync::LazyLock<Name> = std::sync::LazyLock::new(|| Name::new(b""));

    args.get(index).and_then(Object::as_name).unwrap_or(&EMPTY)
}

fn string(args: &[Object], index: usize) -> &[u8] {
    args.get(index).and_then(Object::as_string).unwrap_or_default()
}

fn array(args: &[Object], index: usize) -> &[Object] {
    args.get(index).and_then(Object::as_array).unwrap_or_default()
}

fn affine(args: &[Object]) -> Affine {
    affine_from_array(args).unwrap_or(Affine::IDENTITY)
}

fn components(args: &[Object]) -> SmallVec<[f32; 4]> {
    args.iter()
        .filter_map(Object::as_number)
        .map(|n| n as f32)
        .collect()
}

fn dash_pattern(array: &[Object], phase: f64) -> Option<Dash> {
    let array = array
        .iter()
        .filter_map(Object::as_number)
        .collect::<SmallVec<[f64; 4]>>();

    Dash::new(&array, phase)
}
