//! The state the interpreter saves and restores with `q` and `Q`.
//!
//! This is only the part of the graphics state that influences which
//! commands are emitted. Everything that influences how commands are drawn,
//! like the transform or the clip path, is tracked by the renderer.

use crate::color::ColorSpace;
use folio_syntax::Dict;
use log::warn;

/// How text is painted, set with `Tr`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub(crate) enum TextRenderingMode {
    #[default]
    Fill,
    Stroke,
    FillStroke,
    Invisible,
    FillAndClip,
    StrokeAndClip,
    FillAndStrokeAndClip,
    Clip,
}

impl TextRenderingMode {
    pub(crate) fn from_number(mode: i64) -> Self {
        match mode {
            0 => Self::Fill,
            1 => Self::Stroke,
            2 => Self::FillStroke,
            3 => Self::Invisible,
            4 => Self::FillAndClip,
            5 => Self::StrokeAndClip,
            6 => Self::FillAndStrokeAndClip,
            7 => Self::Clip,
            _ => {
                warn!("unknown text rendering mode {mode}");

                Self::Fill
            }
        }
    }

    pub(crate) fn fills(self) -> bool {
        matches!(
            self,
            Self::Fill | Self::FillStroke | Self::FillAndClip | Self::FillAndStrokeAndClip
        )
    }

    pub(crate) fn strokes(self) -> bool {
        matches!(
            self,
            Self::Stroke | Self::FillStroke | Self::StrokeAndClip | Self::FillAndStrokeAndClip
        )
    }

    pub(crate) fn clips(self) -> bool {
        matches!(
            self,
            Self::FillAndClip | Self::StrokeAndClip | Self::FillAndStrokeAndClip | Self::Clip
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextState {
    pub(crate) char_space: f64,
    pub(crate) word_space: f64,
    // In percent.
    pub(crate) horizontal_scaling: f64,
    pub(crate) leading: f64,
    pub(crate) font: Option<Dict>,
    pub(crate) font_size: f64,
    pub(crate) render_mode: TextRenderingMode,
    pub(crate) rise: f64,
}

impl TextState {
    pub(crate) fn horizontal_scaling(&self) -> f64 {
        self.horizontal_scaling / 100.0
    }
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            char_space: 0.0,
            word_space: 0.0,
            horizontal_scaling: 100.0,
            leading: 0.0,
            font: None,
            font_size: 1.0,
            render_mode: TextRenderingMode::default(),
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct ParserState {
    pub(crate) fill_cs: ColorSpace,
    pub(crate) stroke_cs: ColorSpace,
    pub(crate) text: TextState,
}

/// The current parser state together with the saved ones.
#[derive(Debug, Clone, Default)]
pub(crate) struct StateStack {
    current: ParserState,
    saved: Vec<ParserState>,
}

impl StateStack {
    pub(crate) fn new(initial: ParserState) -> Self {
        Self {
            current: initial,
            saved: vec![],
        }
    }

    pub(crate) fn get(&self) -> &ParserState {
        &self.current
    }

    pub(crate) fn get_mut(&mut self) -> &mut ParserState {
        &mut self.current
    }

    pub(crate) fn save(&mut self) {
        self.saved.push(self.current.clone());
    }

    /// Restore the most recently saved state. Returns `false` if there is
    /// none.
    pub(crate) fn restore(&mut self) -> bool {
        match self.saved.pop() {
            Some(state) => {
                self.current = state;
                true
            }
            None => false,
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.saved.len()
    }
}
