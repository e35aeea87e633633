//! Tokenizing content streams.

use crate::object::Name;
use crate::reader::Reader;
use crate::trivia::{hex_value, is_regular_character, is_white_space_character};
use core::fmt;

/// A token of a content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A numeric literal.
    Number(f64),
    /// A name, with `#xx` escapes already decoded.
    Name(Name),
    /// A literal or hexadecimal string, with escapes already decoded.
    String(Vec<u8>),
    /// A bare keyword, i.e. an operator, `true`, `false` or `null`.
    Keyword(Name),
    /// `[`
    ArrayBegin,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictBegin,
    /// `>>`
    DictEnd,
    /// `{`
    ProcBegin,
    /// `}`
    ProcEnd,
    /// Bytes that could not be tokenized.
    Unknown(LexAnomaly),
    /// The end of the data.
    Eof,
}

impl Token {
    /// Returns `true` if the token is the keyword `kw`.
    pub fn is_keyword(&self, kw: &[u8]) -> bool {
        matches!(self, Self::Keyword(k) if k.as_bytes() == kw)
    }
}

/// A sequence of bytes the lexer could not turn into a regular token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexAnomaly {
    /// A `(` without matching `)`.
    UnterminatedString,
    /// A `<` without matching `>`.
    UnterminatedHexString,
    /// A hexadecimal string containing a non-hex character.
    InvalidHexString,
    /// A sign or decimal point that is not followed by any digits.
    MalformedNumber,
    /// A delimiter that cannot start a token, like `)` or a single `>`.
    StrayByte(u8),
}

impl fmt::Display for LexAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedString => write!(f, "unterminated literal string"),
            Self::UnterminatedHexString => write!(f, "unterminated hex string"),
            Self::InvalidHexString => write!(f, "invalid character in hex string"),
            Self::MalformedNumber => write!(f, "malformed number"),
            Self::StrayByte(b) => write!(f, "unexpected byte 0x{b:02x}"),
        }
    }
}

/// Read the next token starting at `pos`.
///
/// Returns the token together with the offset right after it. White space and
/// comments preceding the token are skipped. This function never fails:
/// malformed input is reported through [`Token::Unknown`], and the returned
/// offset always lies past the offending bytes so that callers can continue.
pub fn next_token(buf: &[u8], pos: usize) -> (Token, usize) {
    let mut r = Reader::new_with(buf, pos);
    r.skip_white_spaces_and_comments();

    let token = read_token(&mut r);

    (token, r.offset())
}

fn read_token(r: &mut Reader<'_>) -> Token {
    let Some(b) = r.peek_byte() else {
        return Token::Eof;
    };

    match b {
        b'[' => {
            r.forward();
            Token::ArrayBegin
        }
        b']' => {
            r.forward();
            Token::ArrayEnd
        }
        b'{' => {
            r.forward();
            Token::ProcBegin
        }
        b'}' => {
            r.forward();
            Token::ProcEnd
        }
        b'<' => {
            if r.forward_tag(b"<<").is_some() {
                Token::DictBegin
            } else {
                r.forward();
                read_hex_string(r)
            }
        }
        b'>' => {
            if r.forward_tag(b">>").is_some() {
                Token::DictEnd
            } else {
                r.forward();
                Token::Unknown(LexAnomaly::StrayByte(b'>'))
            }
        }
        b'(' => {
            r.forward();
            read_literal_string(r)
        }
        b')' => {
            r.forward();
            Token::Unknown(LexAnomaly::StrayByte(b')'))
        }
        b'/' => {
            r.forward();
            Token::Name(Name::new(r.forward_while(is_regular_character)))
        }
        b'+' | b'-' | b'.' | b'0'..=b'9' => read_number(r),
        _ => Token::Keyword(Name::from_unescaped(r.forward_while(is_regular_character))),
    }
}

fn read_number(r: &mut Reader<'_>) -> Token {
    let mut negative = false;

    if let Some(sign) = r.eat(|b| b == b'+' || b == b'-') {
        negative = sign == b'-';
    }

    let int_part = r.forward_while(|b| b.is_ascii_digit());
    let frac_part = if r.eat(|b| b == b'.').is_some() {
        r.forward_while(|b| b.is_ascii_digit())
    } else {
        &b""[..]
    };

    if int_part.is_empty() && frac_part.is_empty() {
        // Consume the rest of the garbage so that the caller makes progress.
        r.forward_while(is_regular_character);
        return Token::Unknown(LexAnomaly::MalformedNumber);
    }

    let mut text = String::with_capacity(int_part.len() + frac_part.len() + 3);
    if negative {
        text.push('-');
    }
    push_digits(&mut text, int_part);
    text.push('.');
    push_digits(&mut text, frac_part);

    let value = text.parse::<f64>().unwrap_or(0.0);

    Token::Number(value)
}

fn push_digits(text: &mut String, digits: &[u8]) {
    if digits.is_empty() {
        text.push('0');
    } else {
        text.extend(digits.iter().map(|d| char::from(*d)));
    }
}

fn read_hex_string(r: &mut Reader<'_>) -> Token {
    let mut out = Vec::new();
    let mut pending: Option<u8> = None;

    loop {
        let Some(b) = r.read_byte() else {
            return Token::Unknown(LexAnomaly::UnterminatedHexString);
        };

        if b == b'>' {
            break;
        }

        if is_white_space_character(b) {
            continue;
        }

        let Some(nibble) = hex_value(b) else {
            // Skip to the end of the string so that lexing can continue after it.
            r.forward_while(|b| b != b'>');
            r.forward();
            return Token::Unknown(LexAnomaly::InvalidHexString);
        };

        match pending.take() {
            Some(high) => out.push(high << 4 | nibble),
            None => pending = Some(nibble),
        }
    }

    // An odd number of digits behaves as if a final 0 followed.
    if let Some(high) = pending {
        out.push(high << 4);
    }

    Token::String(out)
}

fn read_literal_string(r: &mut Reader<'_>) -> Token {
    let mut out = Vec::new();
    let mut depth = 1u32;

    loop {
        let Some(b) = r.read_byte() else {
            return Token::Unknown(LexAnomaly::UnterminatedString);
        };

        match b {
            b'(' => {
                depth += 1;
                out.push(b);
            }
            b')' => {
                depth -= 1;

                if depth == 0 {
                    break;
                }

                out.push(b);
            }
            b'\\' => {
                let Some(next) = r.peek_byte() else {
                    return Token::Unknown(LexAnomaly::UnterminatedString);
                };

                match next {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'0'..=b'7' => {
                        let mut value = 0u32;

                        for _ in 0..3 {
                            match r.peek_byte() {
                                Some(d @ b'0'..=b'7') => {
                                    value = value * 8 + u32::from(d - b'0');
                                    r.forward();
                                }
                                _ => break,
                            }
                        }

                        // High-order overflow is ignored.
                        out.push((value & 0xff) as u8);
                        continue;
                    }
                    b'\r' | b'\n' => {
                        // A backslash before an end-of-line continues the string.
                        r.skip_eol();
                        continue;
                    }
                    // Covers `\\`, `\(`, `\)` and unknown escapes, where the
                    // backslash is dropped.
                    other => out.push(other),
                }

                r.forward();
            }
            b'\r' => {
                // Any end-of-line marker in a literal string reads as `\n`.
                r.eat(|b| b == b'\n');
                out.push(b'\n');
            }
            _ => out.push(b),
        }
    }

    Token::String(out)
}

/// A stateful tokenizer with one token of lookahead.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
    last_start: usize,
    throwback: Option<(Token, usize)>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            last_start: 0,
            throwback: None,
        }
    }

    /// The offset of the next unread byte.
    pub fn position(&self) -> usize {
        match &self.throwback {
            Some((_, start)) => *start,
            None => self.pos,
        }
    }

    /// Move the lexer to an absolute position, dropping any unread token.
    pub fn seek(&mut self, pos: usize) {
        self.throwback = None;
        self.pos = pos.min(self.data.len());
    }

    /// Read the next token.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Token {
        if let Some((token, _)) = self.throwback.take() {
            return token;
        }

        let start = self.pos;
        let (token, pos) = next_token(self.data, self.pos);
        self.pos = pos;
        self.last_start = start;

        token
    }

    /// Push a token back so that the next call to [`Lexer::next`] returns it
    /// again.
    ///
    /// Only one token can be pushed back at a time; a second call replaces
    /// the first.
    pub fn unread(&mut self, token: Token) {
        self.throwback = Some((token, self.last_start));
    }

    /// Read the data of an inline image.
    ///
    /// Must be called right after the `ID` keyword was read. The data starts
    /// after the single white-space byte that follows `ID` and ends before the
    /// white space that precedes the terminating `EI` keyword. The lexer is
    /// positioned after `EI`. Returns `None` if no terminating `EI` exists.
    pub fn read_inline_image_data(&mut self) -> Option<&'a [u8]> {
        debug_assert!(self.throwback.is_none());

        let mut r = Reader::new_with(self.data, self.pos);
        // Exactly one white-space byte separates `ID` from the data, except for
        // `\r\n`.
        if r.skip_eol().is_none() {
            r.eat(is_white_space_character);
        }

        let start = r.offset();
        let data = self.data;
        let mut i = start;

        while i + 2 <= data.len() {
            let preceded_by_white_space = i > start && is_white_space_character(data[i - 1]);
            let followed_by_end = data
                .get(i + 2)
                .is_none_or(|b| !is_regular_character(*b));

            if preceded_by_white_space && &data[i..i + 2] == b"EI" && followed_by_end {
                self.pos = i + 2;
                self.last_start = i;
                return Some(&data[start..i - 1]);
            }

            i += 1;
        }

        None
    }
}
