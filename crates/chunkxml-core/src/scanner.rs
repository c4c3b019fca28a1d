//! Byte-level scanning helpers for the tokenizer.
//!
//! Every helper works on the unread remainder of a single chunk and reports
//! positions relative to it. Nothing here keeps state between chunks; the
//! parser owns the continuation.
//!
//! # Performance
//!
//! - SIMD-accelerated delimiter search via `memchr`
//! - No allocation: callers copy the returned slice into their accumulator

use memchr::{memchr, memchr3};

/// XML whitespace: space, tab, CR, LF.
#[inline(always)]
pub fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

/// Check if every byte is whitespace.
#[inline]
pub fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| is_space(b))
}

/// Result of scanning a chunk for a terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// The terminator sits at this index; bytes before it belong to the token.
    Found(usize),
    /// No terminator in this chunk; the whole remainder belongs to the token.
    Exhausted,
}

impl Scan {
    /// Number of token bytes covered by this scan in a remainder of `len` bytes.
    #[inline(always)]
    pub fn token_len(self, len: usize) -> usize {
        match self {
            Scan::Found(i) => i,
            Scan::Exhausted => len,
        }
    }
}

/// Find a single delimiter byte.
#[inline]
pub fn until_byte(needle: u8, rest: &[u8]) -> Scan {
    match memchr(needle, rest) {
        Some(i) => Scan::Found(i),
        None => Scan::Exhausted,
    }
}

/// Find the first of three delimiter bytes.
#[inline]
pub fn until_any3(a: u8, b: u8, c: u8, rest: &[u8]) -> Scan {
    match memchr3(a, b, c, rest) {
        Some(i) => Scan::Found(i),
        None => Scan::Exhausted,
    }
}

/// Find the end of a tag or attribute name.
///
/// Names end at whitespace, `=`, `/`, `>`, `<`, and also at `?` inside a
/// processing instruction.
#[inline]
pub fn until_name_end(rest: &[u8], instruction: bool) -> Scan {
    match rest
        .iter()
        .position(|&b| is_name_delimiter(b) || (instruction && b == b'?'))
    {
        Some(i) => Scan::Found(i),
        None => Scan::Exhausted,
    }
}

/// Find the end of an unquoted attribute value (whitespace, `>` or `<`).
#[inline]
pub fn until_unquoted_end(rest: &[u8]) -> Scan {
    match rest
        .iter()
        .position(|&b| is_space(b) || b == b'>' || b == b'<')
    {
        Some(i) => Scan::Found(i),
        None => Scan::Exhausted,
    }
}

/// Length of the leading whitespace run.
#[inline]
pub fn skip_space(rest: &[u8]) -> usize {
    rest.iter().take_while(|&&b| is_space(b)).count()
}

#[inline(always)]
fn is_name_delimiter(b: u8) -> bool {
    is_space(b) || matches!(b, b'=' | b'/' | b'>' | b'<')
}

/// Strip leading and trailing whitespace from a byte slice.
#[inline]
pub fn trim(bytes: &[u8]) -> &[u8] {
    let start = skip_space(bytes);
    let end = bytes.len() - bytes[start..].iter().rev().take_while(|&&b| is_space(b)).count();
    &bytes[start..end]
}
