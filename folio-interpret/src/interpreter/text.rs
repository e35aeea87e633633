use super::{Interpreter, InterpreterWarning};
use crate::command::{Command, DrawMode};
use crate::error::Result;
use crate::font::UNITS_PER_EM;
use crate::resources::ResourceCategory;
use folio_path::{FillRule, Path};
use folio_syntax::{Name, Object};
use kurbo::Affine;
use log::warn;

/// The state of the current text object, between `BT` and `ET`.
#[derive(Debug, Clone, Default)]
pub(super) struct TextObject {
    matrix: Affine,
    line_matrix: Affine,
    // The union of glyph outlines shown with a clipping render mode.
    clip: Path,
}

impl Interpreter {
    pub(super) fn begin_text(&mut self) {
        self.text = TextObject::default();
    }

    pub(super) fn end_text(&mut self) {
        let text = core::mem::take(&mut self.text);

        if !text.clip.is_empty() {
            let mut clip = text.clip;
            clip.set_fill_rule(FillRule::NonZero);
            self.emit(Command::DrawPath(clip, DrawMode::CLIP));
        }
    }

    pub(super) fn set_font(&mut self, name: &Name, size: f64) -> Result<()> {
        let font = self.find_resource(name, ResourceCategory::Font)?;
        let text = &mut self.state.get_mut().text;
        text.font_size = size;

        match font.as_dict() {
            Some(dict) => text.font = Some(dict.clone()),
            None => {
                warn!("font {name} is not a dictionary");
                text.font = None;
            }
        }

        Ok(())
    }

    pub(super) fn next_line(&mut self, tx: f64, ty: f64) {
        let line_matrix = self.text.line_matrix * Affine::translate((tx, ty));
        self.set_text_matrix(line_matrix);
    }

    pub(super) fn next_line_using_leading(&mut self) {
        let leading = self.state.get().text.leading;
        self.next_line(0.0, -leading);
    }

    pub(super) fn set_text_matrix(&mut self, matrix: Affine) {
        self.text.matrix = matrix;
        self.text.line_matrix = matrix;
    }

    pub(super) fn show_texts(&mut self, elements: &[Object]) {
        for element in elements {
            match element {
                Object::String(s) => self.show_text(s),
                Object::Number(adjustment) => {
                    let text = &self.state.get().text;
                    let tx = -adjustment / UNITS_PER_EM * text.font_size * text.horizontal_scaling();
                    self.text.matrix = self.text.matrix * Affine::translate((tx, 0.0));
                }
                other => warn!("unexpected {} in TJ array", other.type_name()),
            }
        }
    }

    pub(super) fn show_text(&mut self, bytes: &[u8]) {
        let Some(font) = self.state.get().text.font.clone() else {
            warn!("tried to show text without a font");

            return;
        };

        let glyphs = match self
            .settings
            .fonts
            .glyphs_for(&font, bytes, self.objects.as_ref())
        {
            Ok(glyphs) => glyphs,
            Err(e) => {
                self.warn(InterpreterWarning::GlyphDecodeFailure(e));

                return;
            }
        };

        let text = self.state.get().text.clone();
        let scaling = text.horizontal_scaling();
        let mode = text.render_mode;

        let mut draw_mode = DrawMode::empty();
        draw_mode.set(DrawMode::FILL, mode.fills());
        draw_mode.set(DrawMode::STROKE, mode.strokes());

        for glyph in glyphs {
            if let Some(path) = &glyph.path {
                let rendering_matrix = self.text.matrix
                    * Affine::new([
                        text.font_size * scaling,
                        0.0,
                        0.0,
                        text.font_size,
                        0.0,
                        text.rise,
                    ]);
                let mut outline =
                    path.transform(rendering_matrix * Affine::scale(1.0 / UNITS_PER_EM));
                outline.set_fill_rule(FillRule::NonZero);

                if mode.clips() {
                    self.text.clip.extend(&outline);
                }

                if !draw_mode.is_empty() {
                    self.emit(Command::DrawPath(outline, draw_mode));
                }
            }

            let word_space = if glyph.is_word_space {
                text.word_space
            } else {
                0.0
            };
            let tx = (glyph.advance / UNITS_PER_EM * text.font_size + text.char_space + word_space)
                * scaling;
            self.text.matrix = self.text.matrix * Affine::translate((tx, 0.0));
        }
    }
}
