//! Errors that can occur while interpreting a content stream.

use crate::resources::ResourceCategory;
use folio_syntax::{Name, ObjRef, SyntaxError};
use core::fmt;

/// The kind of operand an operator expected.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OperandKind {
    /// A number.
    Number,
    /// A name.
    Name,
    /// A string.
    String,
    /// An array.
    Array,
    /// A dictionary or a name referring to one.
    Dict,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Number => "number",
            Self::Name => "name",
            Self::String => "string",
            Self::Array => "array",
            Self::Dict => "dictionary",
        };

        f.write_str(s)
    }
}

/// A malformed content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// An operator that is not known, outside of a `BX`/`EX` section.
    UnknownOperator(String),
    /// An operator was invoked with too few operands.
    StackUnderflow {
        /// The operator.
        op: &'static str,
        /// The number of operands it requires.
        expected: usize,
        /// The number of operands that were available.
        found: usize,
    },
    /// An operand of an operator had the wrong type.
    OperandType {
        /// The operator.
        op: &'static str,
        /// The index of the operand.
        index: usize,
        /// The type the operator expected.
        expected: OperandKind,
    },
    /// Tokens that could not be assembled into an object, including
    /// unterminated strings, arrays and dictionaries.
    Syntax(SyntaxError),
    /// A token that cannot appear at the top level of a content stream.
    UnexpectedToken(String),
    /// A malformed inline image.
    InlineImage(&'static str),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOperator(op) => write!(f, "unknown operator {op}"),
            Self::StackUnderflow {
                op,
                expected,
                found,
            } => write!(
                f,
                "operator {op} requires {expected} operands, but only {found} are available"
            ),
            Self::OperandType {
                op,
                index,
                expected,
            } => write!(f, "operand {index} of operator {op} must be a {expected}"),
            Self::Syntax(e) => write!(f, "{e}"),
            Self::UnexpectedToken(t) => write!(f, "unexpected token {t}"),
            Self::InlineImage(msg) => write!(f, "malformed inline image: {msg}"),
        }
    }
}

impl core::error::Error for ParseError {}

impl From<SyntaxError> for ParseError {
    fn from(e: SyntaxError) -> Self {
        Self::Syntax(e)
    }
}

/// A resource a content stream depends on is not available.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// A named resource does not exist.
    Missing {
        /// The category the resource was looked up in.
        category: ResourceCategory,
        /// The name of the resource.
        name: Name,
    },
    /// An indirect object could not be resolved.
    Unresolvable(ObjRef),
    /// A required dictionary entry is missing.
    MissingKey {
        /// The missing key.
        key: &'static str,
        /// The kind of dictionary it was expected in.
        owner: &'static str,
    },
    /// Form XObjects are nested deeper than allowed, which usually means
    /// they reference each other.
    FormTooDeep(usize),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { category, name } => write!(f, "missing {category} resource {name}"),
            Self::Unresolvable(r) => write!(f, "failed to resolve object {r}"),
            Self::MissingKey { key, owner } => write!(f, "{owner} is missing required key /{key}"),
            Self::FormTooDeep(depth) => write!(f, "form XObjects nested deeper than {depth}"),
        }
    }
}

impl core::error::Error for ResourceError {}

/// An image or glyph could not be decoded.
///
/// Decode errors never abort interpretation: the affected image or glyph is
/// skipped and a warning is emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The stream uses a filter that cannot be decoded.
    UnsupportedFilter(Vec<Name>),
    /// The color space of an image is not supported.
    UnsupportedColorSpace(String),
    /// The bit depth of an image is not supported.
    UnsupportedBitDepth(u8),
    /// The width or height of an image is missing or invalid.
    InvalidDimensions,
    /// The image data is shorter than its dimensions require.
    TruncatedData {
        /// The number of bytes required.
        expected: usize,
        /// The number of bytes available.
        found: usize,
    },
    /// A font could not provide glyphs for a string.
    Font(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFilter(filters) => write!(f, "unsupported filters {filters:?}"),
            Self::UnsupportedColorSpace(cs) => write!(f, "unsupported color space {cs}"),
            Self::UnsupportedBitDepth(bpc) => write!(f, "unsupported bit depth {bpc}"),
            Self::InvalidDimensions => write!(f, "invalid image dimensions"),
            Self::TruncatedData { expected, found } => {
                write!(f, "expected {expected} bytes of image data, found {found}")
            }
            Self::Font(msg) => write!(f, "failed to decode glyphs: {msg}"),
        }
    }
}

impl core::error::Error for DecodeError {}

/// An error that stops the interpretation of a content stream.
///
/// Commands that were emitted before the error remain valid.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpretError {
    /// The content stream is malformed.
    Parse(ParseError),
    /// A resource is missing.
    Resource(ResourceError),
}

impl fmt::Display for InterpretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "parse error: {e}"),
            Self::Resource(e) => write!(f, "resource error: {e}"),
        }
    }
}

impl core::error::Error for InterpretError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Resource(e) => Some(e),
        }
    }
}

impl From<ParseError> for InterpretError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<ResourceError> for InterpretError {
    fn from(e: ResourceError) -> Self {
        Self::Resource(e)
    }
}

impl From<SyntaxError> for InterpretError {
    fn from(e: SyntaxError) -> Self {
        Self::Parse(e.into())
    }
}

/// A result whose error is an [`InterpretError`].
pub type Result<T> = core::result::Result<T, InterpretError>;
