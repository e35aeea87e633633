//! A byte reader.

use crate::trivia::{is_eol_character, is_white_space_character};

/// A cursor over an immutable byte buffer.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    /// Create a new reader at the start of `data`.
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Create a new reader at the given offset.
    #[inline]
    pub fn new_with(data: &'a [u8], offset: usize) -> Self {
        Self {
            data,
            offset: offset.min(data.len()),
        }
    }

    /// Returns `true` if the reader has reached the end of the data.
    #[inline]
    pub fn at_end(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Returns the current offset of the reader.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Moves the reader to the specified offset.
    #[inline]
    pub fn jump(&mut self, offset: usize) {
        self.offset = offset.min(self.data.len());
    }

    /// Returns the underlying data.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the remaining data from the current offset to the end.
    #[inline]
    pub fn tail(&self) -> &'a [u8] {
        &self.data[self.offset..]
    }

    /// Peeks a single byte.
    #[inline]
    pub fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    /// Peeks the byte `n` positions after the current one.
    #[inline]
    pub fn peek_nth(&self, n: usize) -> Option<u8> {
        self.data.get(self.offset + n).copied()
    }

    /// Reads a single byte and advances the offset.
    #[inline]
    pub fn read_byte(&mut self) -> Option<u8> {
        let v = self.peek_byte()?;
        self.offset += 1;

        Some(v)
    }

    /// Advances the offset by one byte.
    #[inline]
    pub fn forward(&mut self) {
        if !self.at_end() {
            self.offset += 1;
        }
    }

    /// Eat the next byte if it satisfies the condition.
    #[inline]
    pub fn eat(&mut self, f: impl Fn(u8) -> bool) -> Option<u8> {
        let val = self.peek_byte()?;
        if f(val) {
            self.forward();
            Some(val)
        } else {
            None
        }
    }

    /// Advances the offset while bytes satisfy the predicate and returns the
    /// bytes that were skipped.
    #[inline]
    pub fn forward_while(&mut self, f: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.offset;

        while let Some(b) = self.peek_byte() {
            if !f(b) {
                break;
            }

            self.offset += 1;
        }

        &self.data[start..self.offset]
    }

    /// Advances the offset if the next bytes match the specified tag.
    #[inline]
    pub fn forward_tag(&mut self, tag: &[u8]) -> Option<()> {
        if self.tail().starts_with(tag) {
            self.offset += tag.len();
            Some(())
        } else {
            None
        }
    }

    /// Skips an end-of-line marker (`\n`, `\r` or `\r\n`).
    #[inline]
    pub fn skip_eol(&mut self) -> Option<()> {
        match self.peek_byte()? {
            b'\n' => self.forward(),
            b'\r' => {
                self.forward();
                self.eat(|b| b == b'\n');
            }
            _ => return None,
        }

        Some(())
    }

    /// Skips white space and `%` comments.
    pub fn skip_white_spaces_and_comments(&mut self) {
        loop {
            self.forward_while(is_white_space_character);

            if self.peek_byte() == Some(b'%') {
                self.forward_while(|b| !is_eol_character(b));
            } else {
                break;
            }
        }
    }
}
