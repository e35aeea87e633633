//! Glyphs for text-showing operators.

use crate::error::DecodeError;
use folio_path::Path;
use folio_syntax::{Dict, Object, ObjectModel};

/// The number of glyph space units per text space unit.
pub const UNITS_PER_EM: f64 = 1000.0;

/// A single glyph of a shown string.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// The horizontal advance, in glyph space units.
    pub advance: f64,
    /// The outline of the glyph in glyph space, if it has one.
    pub path: Option<Path>,
    /// Whether word spacing applies after this glyph, i.e. whether it was
    /// encoded by the single byte 32.
    pub is_word_space: bool,
}

/// Provides glyphs for the strings shown with a font.
pub trait FontProvider: Send + Sync {
    /// Split `text` into glyphs of `font`.
    fn glyphs_for(
        &self,
        font: &Dict,
        text: &[u8],
        objects: &dyn ObjectModel,
    ) -> Result<Vec<Glyph>, DecodeError>;
}

/// A font provider that reads glyph advances from the `/Widths` array of
/// simple fonts, without any outlines.
///
/// Text shown with it moves the text position correctly but draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct WidthsOnly;

impl FontProvider for WidthsOnly {
    fn glyphs_for(
        &self,
        font: &Dict,
        text: &[u8],
        objects: &dyn ObjectModel,
    ) -> Result<Vec<Glyph>, DecodeError> {
        let first_char = font.get_number(b"FirstChar").unwrap_or(0.0) as i64;
        let widths = font
            .get(b"Widths")
            .and_then(|w| objects.array(w))
            .unwrap_or_default();
        let missing_width = font
            .get(b"FontDescriptor")
            .and_then(|d| objects.dict_get(d, b"MissingWidth"))
            .and_then(|w| w.as_number())
            .unwrap_or(0.0);

        let glyphs = text
            .iter()
            .map(|code| {
                let advance = usize::try_from(i64::from(*code) - first_char)
                    .ok()
                    .and_then(|idx| widths.get(idx))
                    .and_then(Object::as_number)
                    .unwrap_or(missing_width);

                Glyph {
                    advance,
                    path: None,
                    is_word_space: *code == b' ',
                }
            })
            .collect();

        Ok(glyphs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_syntax::MemoryObjects;

    #[test]
    fn widths_with_first_char() {
        let font = Object::from_bytes(
            b"<< /Type /Font /FirstChar 32 /Widths [250 500 600] \
              /FontDescriptor << /MissingWidth 100 >> >>",
        )
        .unwrap();
        let glyphs = WidthsOnly
            .glyphs_for(font.as_dict().unwrap(), b" !\"A", &MemoryObjects::new())
            .unwrap();

        let advances = glyphs.iter().map(|g| g.advance).collect::<Vec<_>>();
        assert_eq!(advances, vec![250.0, 500.0, 600.0, 100.0]);
        assert!(glyphs[0].is_word_space);
        assert!(!glyphs[1].is_word_space);
        assert!(glyphs.iter().all(|g| g.path.is_none()));
    }
}
