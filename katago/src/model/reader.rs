use std::str::FromStr;

use super::error::{ParseError, ParseResult};

const BINARY_MARKER: &[u8] = b"@BIN@";

/// Cursor over a KataGo model buffer: whitespace separated ASCII tokens
/// interleaved with `@BIN@`-prefixed runs of little-endian f32.
///
/// All reads go through this value; the offset only ever moves forward.
pub struct ModelReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ModelReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Byte offset of the next unread byte.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn skip_whitespace(&mut self) {
        while self.offset < self.data.len() && self.data[self.offset].is_ascii_whitespace() {
            self.offset += 1;
        }
    }

    /// Offset the next token will start at.
    pub fn peek_offset(&mut self) -> usize {
        self.skip_whitespace();
        self.offset
    }

    pub fn read_token(&mut self, context: &'static str) -> ParseResult<&'a str> {
        self.skip_whitespace();
        let start = self.offset;
        if start == self.data.len() {
            return Err(ParseError::Truncated {
                offset: start,
                context,
            });
        }

        while self.offset < self.data.len() && !self.data[self.offset].is_ascii_whitespace() {
            self.offset += 1;
        }

        std::str::from_utf8(&self.data[start..self.offset])
            .map_err(|_| ParseError::InvalidToken { offset: start })
    }

    /// Reads a token and requires it to equal `expected`.
    pub fn expect_token(&mut self, expected: &'static str) -> ParseResult<()> {
        let offset = self.peek_offset();
        let found = self.read_token(expected)?;
        if found != expected {
            return Err(ParseError::UnexpectedToken {
                expected,
                found: found.to_string(),
                offset,
            });
        }
        Ok(())
    }

    fn read_number<T: FromStr>(&mut self, context: &'static str) -> ParseResult<T> {
        let offset = self.peek_offset();
        let token = self.read_token(context)?;
        token.parse().map_err(|_| ParseError::InvalidNumber {
            token: token.to_string(),
            offset,
        })
    }

    pub fn read_int(&mut self, context: &'static str) -> ParseResult<i32> {
        self.read_number(context)
    }

    /// Reads a non-negative integer used as a size or count.
    pub fn read_usize(&mut self, context: &'static str) -> ParseResult<usize> {
        self.read_number(context)
    }

    pub fn read_float(&mut self, context: &'static str) -> ParseResult<f32> {
        self.read_number(context)
    }

    /// Reads a 0/1 flag token.
    pub fn read_bool(&mut self, context: &'static str) -> ParseResult<bool> {
        Ok(self.read_usize(context)? != 0)
    }

    /// Reads `count` floats written as `@BIN@` followed by raw little-endian
    /// bytes, with no separator after the marker.
    pub fn read_floats(&mut self, count: usize, context: &'static str) -> ParseResult<Vec<f32>> {
        self.skip_whitespace();
        let marker_end = self.offset + BINARY_MARKER.len();
        if marker_end > self.data.len() {
            return Err(ParseError::Truncated {
                offset: self.offset,
                context,
            });
        }
        if &self.data[self.offset..marker_end] != BINARY_MARKER {
            return Err(ParseError::MissingBinaryMarker {
                offset: self.offset,
            });
        }

        let byte_len = count
            .checked_mul(4)
            .filter(|len| marker_end + len <= self.data.len())
            .ok_or(ParseError::Truncated {
                offset: marker_end,
                context,
            })?;

        let bytes = &self.data[marker_end..marker_end + byte_len];
        let floats = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        self.offset = marker_end + byte_len;
        Ok(floats)
    }
}
