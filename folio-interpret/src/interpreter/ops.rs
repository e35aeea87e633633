//! The operators of content streams and the operands they take.

use crate::error::OperandKind;
use phf::phf_map;

/// A content stream operator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    SaveState,
    RestoreState,
    Transform,
    LineWidth,
    LineCap,
    LineJoin,
    MiterLimit,
    DashPattern,
    RenderingIntent,
    Flatness,
    SetGraphicsState,
    MoveTo,
    LineTo,
    CubicTo,
    CubicStartTo,
    CubicEndTo,
    ClosePath,
    RectPath,
    StrokePath,
    CloseAndStrokePath,
    FillPathNonZero,
    FillPathNonZeroCompatibility,
    FillPathEvenOdd,
    FillAndStrokeNonZero,
    FillAndStrokeEvenOdd,
    CloseFillAndStrokeNonZero,
    CloseFillAndStrokeEvenOdd,
    EndPath,
    ClipNonZero,
    ClipEvenOdd,
    Shading,
    ColorSpaceStroke,
    ColorSpaceNonStroke,
    StrokeColor,
    StrokeColorNamed,
    NonStrokeColor,
    NonStrokeColorNamed,
    StrokeColorDeviceGray,
    NonStrokeColorDeviceGray,
    StrokeColorDeviceRgb,
    NonStrokeColorDeviceRgb,
    StrokeColorCmyk,
    NonStrokeColorCmyk,
    XObject,
    BeginText,
    EndText,
    CharacterSpacing,
    WordSpacing,
    HorizontalScaling,
    TextLeading,
    TextFont,
    TextRenderingMode,
    TextRise,
    NextLine,
    NextLineAndSetLeading,
    SetTextMatrix,
    NextLineUsingLeading,
    ShowText,
    NextLineAndShowText,
    NextLineAndShowTextWithSpacing,
    ShowTexts,
    BeginInlineImage,
    InlineImageData,
    EndInlineImage,
    BeginCompatibility,
    EndCompatibility,
    MarkedContentPoint,
    MarkedContentPointWithProperties,
    BeginMarkedContent,
    BeginMarkedContentWithProperties,
    EndMarkedContent,
    ColorGlyph,
    ShapeGlyph,
}

static OPERATORS: phf::Map<&'static str, Op> = phf_map! {
    "q" => Op::SaveState,
    "Q" => Op::RestoreState,
    "cm" => Op::Transform,
    "w" => Op::LineWidth,
    "J" => Op::LineCap,
    "j" => Op::LineJoin,
    "M" => Op::MiterLimit,
    "d" => Op::DashPattern,
    "ri" => Op::RenderingIntent,
    "i" => Op::Flatness,
    "gs" => Op::SetGraphicsState,
    "m" => Op::MoveTo,
    "l" => Op::LineTo,
    "c" => Op::CubicTo,
    "v" => Op::CubicStartTo,
    "y" => Op::CubicEndTo,
    "h" => Op::ClosePath,
    "re" => Op::RectPath,
    "S" => Op::StrokePath,
    "s" => Op::CloseAndStrokePath,
    "f" => Op::FillPathNonZero,
    "F" => Op::FillPathNonZeroCompatibility,
    "f*" => Op::FillPathEvenOdd,
    "B" => Op::FillAndStrokeNonZero,
    "B*" => Op::FillAndStrokeEvenOdd,
    "b" => Op::CloseFillAndStrokeNonZero,
    "b*" => Op::CloseFillAndStrokeEvenOdd,
    "n" => Op::EndPath,
    "W" => Op::ClipNonZero,
    "W*" => Op::ClipEvenOdd,
    "sh" => Op::Shading,
    "CS" => Op::ColorSpaceStroke,
    "cs" => Op::ColorSpaceNonStroke,
    "SC" => Op::StrokeColor,
    "SCN" => Op::StrokeColorNamed,
    "sc" => Op::NonStrokeColor,
    "scn" => Op::NonStrokeColorNamed,
    "G" => Op::StrokeColorDeviceGray,
    "g" => Op::NonStrokeColorDeviceGray,
    "RG" => Op::StrokeColorDeviceRgb,
    "rg" => Op::NonStrokeColorDeviceRgb,
    "K" => Op::StrokeColorCmyk,
    "k" => Op::NonStrokeColorCmyk,
    "Do" => Op::XObject,
    "BT" => Op::BeginText,
    "ET" => Op::EndText,
    "Tc" => Op::CharacterSpacing,
    "Tw" => Op::WordSpacing,
    "Tz" => Op::HorizontalScaling,
    "TL" => Op::TextLeading,
    "Tf" => Op::TextFont,
    "Tr" => Op::TextRenderingMode,
    "Ts" => Op::TextRise,
    "Td" => Op::NextLine,
    "TD" => Op::NextLineAndSetLeading,
    "Tm" => Op::SetTextMatrix,
    "T*" => Op::NextLineUsingLeading,
    "Tj" => Op::ShowText,
    "'" => Op::NextLineAndShowText,
    "\"" => Op::NextLineAndShowTextWithSpacing,
    "TJ" => Op::ShowTexts,
    "BI" => Op::BeginInlineImage,
    "ID" => Op::InlineImageData,
    "EI" => Op::EndInlineImage,
    "BX" => Op::BeginCompatibility,
    "EX" => Op::EndCompatibility,
    "MP" => Op::MarkedContentPoint,
    "DP" => Op::MarkedContentPointWithProperties,
    "BMC" => Op::BeginMarkedContent,
    "BDC" => Op::BeginMarkedContentWithProperties,
    "EMC" => Op::EndMarkedContent,
    "d0" => Op::ColorGlyph,
    "d1" => Op::ShapeGlyph,
};

/// The type an operand must have.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Arg {
    Number,
    Name,
    String,
    Array,
    /// A property list, given inline or by name.
    Properties,
}

impl Arg {
    pub(crate) fn kind(self) -> OperandKind {
        match self {
            Self::Number => OperandKind::Number,
            Self::Name => OperandKind::Name,
            Self::String => OperandKind::String,
            Self::Array => OperandKind::Array,
            Self::Properties => OperandKind::Dict,
        }
    }
}

/// The operands an operator takes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Signature {
    Fixed(&'static [Arg]),
    /// Color components; the count depends on the current color space.
    Color,
    /// Color components, optionally followed by a pattern name.
    ColorOrPattern,
}

use Arg::{Array as A, Name as Nm, Number as N, Properties as P, String as S};

impl Op {
    pub(crate) fn from_keyword(kw: &[u8]) -> Option<Self> {
        core::str::from_utf8(kw)
            .ok()
            .and_then(|kw| OPERATORS.get(kw))
            .copied()
    }

    pub(crate) fn signature(self) -> Signature {
        let args: &'static [Arg] = match self {
            Self::SaveState
            | Self::RestoreState
            | Self::ClosePath
            | Self::StrokePath
            | Self::CloseAndStrokePath
            | Self::FillPathNonZero
            | Self::FillPathNonZeroCompatibility
            | Self::FillPathEvenOdd
            | Self::FillAndStrokeNonZero
            | Self::FillAndStrokeEvenOdd
            | Self::CloseFillAndStrokeNonZero
            | Self::CloseFillAndStrokeEvenOdd
            | Self::EndPath
            | Self::ClipNonZero
            | Self::ClipEvenOdd
            | Self::BeginText
            | Self::EndText
            | Self::NextLineUsingLeading
            | Self::BeginInlineImage
            | Self::InlineImageData
            | Self::EndInlineImage
            | Self::BeginCompatibility
            | Self::EndCompatibility
            | Self::EndMarkedContent => &[],
            Self::LineWidth
            | Self::LineCap
            | Self::LineJoin
            | Self::MiterLimit
            | Self::Flatness
            | Self::StrokeColorDeviceGray
            | Self::NonStrokeColorDeviceGray
            | Self::CharacterSpacing
            | Self::WordSpacing
            | Self::HorizontalScaling
            | Self::TextLeading
            | Self::TextRenderingMode
            | Self::TextRise => &[N],
            Self::RenderingIntent
            | Self::SetGraphicsState
            | Self::Shading
            | Self::ColorSpaceStroke
            | Self::ColorSpaceNonStroke
            | Self::XObject
            | Self::MarkedContentPoint
            | Self::BeginMarkedContent => &[Nm],
            Self::MoveTo
            | Self::LineTo
            | Self::NextLine
            | Self::NextLineAndSetLeading
            | Self::ColorGlyph => &[N, N],
            Self::StrokeColorDeviceRgb | Self::NonStrokeColorDeviceRgb => &[N, N, N],
            Self::CubicStartTo
            | Self::CubicEndTo
            | Self::RectPath
            | Self::StrokeColorCmyk
            | Self::NonStrokeColorCmyk => &[N, N, N, N],
            Self::Transform | Self::CubicTo | Self::SetTextMatrix | Self::ShapeGlyph => {
                &[N, N, N, N, N, N]
            }
            Self::DashPattern => &[A, N],
            Self::TextFont => &[Nm, N],
            Self::ShowText | Self::NextLineAndShowText => &[S],
            Self::NextLineAndShowTextWithSpacing => &[N, N, S],
            Self::ShowTexts => &[A],
            Self::MarkedContentPointWithProperties | Self::BeginMarkedContentWithProperties => {
                &[Nm, P]
            }
            Self::StrokeColor | Self::NonStrokeColor => return Signature::Color,
            Self::StrokeColorNamed | Self::NonStrokeColorNamed => {
                return Signature::ColorOrPattern;
            }
        };

        Signature::Fixed(args)
    }

    /// The operator as it appears in content streams.
    pub(crate) fn mnemonic(self) -> &'static str {
        OPERATORS
            .entries()
            .find(|(_, op)| **op == self)
            .map_or("?", |(k, _)| *k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup() {
        assert_eq!(Op::from_keyword(b"f*"), Some(Op::FillPathEvenOdd));
        assert_eq!(Op::from_keyword(b"\""), Some(Op::NextLineAndShowTextWithSpacing));
        assert_eq!(Op::from_keyword(b"ZZ"), None);
        assert_eq!(Op::XObject.mnemonic(), "Do");
    }

    #[test]
    fn signatures() {
        assert_eq!(Op::Transform.signature(), Signature::Fixed(&[N; 6]));
        assert_eq!(Op::NonStrokeColor.signature(), Signature::Color);
        assert_eq!(Op::SaveState.signature(), Signature::Fixed(&[]));
    }
}
