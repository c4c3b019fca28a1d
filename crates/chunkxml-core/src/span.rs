//! Stream positions for error reporting.
//!
//! Offsets count bytes from the start of the whole input stream, not from the
//! start of the chunk that happened to contain them, so an error reported
//! while feeding 1-byte chunks points at the same place as one reported by a
//! one-shot parse.

/// A byte range in the input stream.
///
/// Both ends are stream offsets: `[start, end)`.
///
/// # Example
///
/// ```rust
/// use chunkxml_core::span::Span;
///
/// let span = Span::new(4, 10);
/// assert_eq!(span.len(), 6);
/// assert!(span.contains(9));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Starting stream offset (inclusive).
    pub start: u64,
    /// Ending stream offset (exclusive).
    pub end: u64,
}

impl Span {
    /// Create a new span from stream offsets.
    #[inline]
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// A zero-width span at a single offset.
    #[inline]
    pub const fn at(offset: u64) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Get the length of this span in bytes.
    #[inline]
    pub const fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Check if this span is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Check if this span contains a stream offset.
    #[inline]
    pub const fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.end
    }
}
