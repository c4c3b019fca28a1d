use crate::span::Span;
use std::fmt;

/// Error kinds for categorizing parse failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Input ended inside a tag, attribute or declaration.
    UnexpectedEof,
    /// A quoted attribute value, comment, CDATA section or declaration was never closed.
    UnclosedDelimiter,
    /// A closing tag does not match the currently open element.
    MismatchedTag,
    /// A closing tag appeared with no element open.
    UnexpectedCloseTag,
    /// Markup that cannot be tokenized (empty tag name, stray `<` inside a tag, ...).
    InvalidSyntax,
    /// A tag name, attribute or text run is not valid UTF-8.
    InvalidUtf8,
    /// Input ended while elements were still open.
    UnclosedElement,
    /// Input contained data but never opened a tag.
    NoRootElement,
    /// Input was empty or whitespace only.
    EmptyInput,
    /// Nesting went deeper than the configured limit.
    DepthLimitExceeded,
    /// A node or buffer allocation failed.
    OutOfMemory,
}

/// Coarse failure classes a caller usually branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The document itself is not well formed.
    Malformed,
    /// The engine could not allocate.
    Allocation,
    /// The stream ended before any root element was produced.
    EmptyInput,
}

impl ParseErrorKind {
    /// Map this kind onto its failure class.
    pub fn class(self) -> ErrorClass {
        match self {
            ParseErrorKind::OutOfMemory => ErrorClass::Allocation,
            ParseErrorKind::EmptyInput => ErrorClass::EmptyInput,
            _ => ErrorClass::Malformed,
        }
    }
}

/// A parse failure with its stream location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Human-readable error message
    pub message: String,
    /// Stream location where the error occurred
    pub span: Option<Span>,
    /// Error categorization
    pub kind: ParseErrorKind,
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            span,
            kind,
        }
    }

    /// Input ended inside a token.
    pub fn unexpected_eof(context: &str, span: Option<Span>) -> Self {
        Self::new(
            ParseErrorKind::UnexpectedEof,
            format!("unexpected end of input in {}", context),
            span,
        )
    }

    /// A delimited construct was never closed.
    pub fn unclosed_delimiter(delimiter: &str, span: Option<Span>) -> Self {
        Self::new(
            ParseErrorKind::UnclosedDelimiter,
            format!("unclosed {}", delimiter),
            span,
        )
    }

    /// Closing tag name differs from the open element.
    pub fn mismatched_tag(expected: &str, found: &str, span: Option<Span>) -> Self {
        Self::new(
            ParseErrorKind::MismatchedTag,
            format!("expected </{}>, found </{}>", expected, found),
            span,
        )
    }

    /// Closing tag with nothing open.
    pub fn unexpected_close_tag(found: &str, span: Option<Span>) -> Self {
        Self::new(
            ParseErrorKind::UnexpectedCloseTag,
            format!("unexpected </{}> with no open element", found),
            span,
        )
    }

    /// Invalid markup.
    pub fn invalid_syntax(context: &str, span: Option<Span>) -> Self {
        Self::new(
            ParseErrorKind::InvalidSyntax,
            format!("invalid syntax in {}", context),
            span,
        )
    }

    /// Bytes that do not decode as UTF-8.
    pub fn invalid_utf8(context: &str, span: Option<Span>) -> Self {
        Self::new(
            ParseErrorKind::InvalidUtf8,
            format!("invalid UTF-8 in {}", context),
            span,
        )
    }

    /// Elements left open at end of input.
    pub fn unclosed_element(name: &str, span: Option<Span>) -> Self {
        Self::new(
            ParseErrorKind::UnclosedElement,
            format!("unclosed element <{}>", name),
            span,
        )
    }

    /// Nesting limit hit.
    pub fn depth_limit(limit: usize, span: Option<Span>) -> Self {
        Self::new(
            ParseErrorKind::DepthLimitExceeded,
            format!("nesting deeper than {} elements", limit),
            span,
        )
    }

    /// An allocation failed.
    pub fn out_of_memory(what: &str, span: Option<Span>) -> Self {
        Self::new(
            ParseErrorKind::OutOfMemory,
            format!("allocation failed for {}", what),
            span,
        )
    }

    /// Failure class of this error.
    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(span) = self.span {
            if span.is_empty() {
                write!(f, " at byte {}", span.start)?;
            } else {
                write!(f, " at bytes {}..{}", span.start, span.end)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}
