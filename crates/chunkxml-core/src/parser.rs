//! Resumable tokenizer and tree builder.
//!
//! [`Parser`] is the whole continuation: the tokenizer state, the partial
//! token, pending character data and the element currently receiving
//! children. Feeding a document in any number of chunks, split anywhere,
//! builds the same tree as feeding it at once.
//!
//! The tree is always fully linked. A tag element is appended to its parent
//! as soon as its name is complete, before its attributes are read, so a
//! failure at any point leaves a document that can be inspected or released.

use crate::error::{ParseError, ParseErrorKind};
use crate::scanner::{self, Scan};
use crate::span::Span;
use crate::tree::{Attribute, Document, NodeData, NodeId, Tag, TagForm};

const CDATA_OPEN: &[u8] = b"[CDATA[";
const COMMENT_OPEN: &[u8] = b"--";

/// Default nesting limit.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Where the tokenizer resumes on the next byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Character data until `<`.
    Text,
    /// Just read `<`.
    TagOpen,
    /// Reading an opening tag name.
    TagName,
    /// Reading a closing tag name up to `>`.
    CloseTagName,
    /// Inside a tag, between attributes.
    BeforeAttrName,
    /// Reading an attribute name.
    AttrName,
    /// Attribute name read, looking for `=`.
    AfterAttrName,
    /// Saw `=`, looking for the value.
    BeforeAttrValue,
    /// Quoted attribute value; holds the quote byte.
    AttrValue(u8),
    /// Unquoted attribute value.
    AttrValueUnquoted,
    /// Saw `/` (or `?` in an instruction), expecting `>`.
    SelfClosing,
    /// After `<!`, deciding between comment, CDATA and declaration.
    Bang,
    /// Comment body until `-->`.
    Comment,
    /// CDATA content until `]]>`.
    CData,
    /// `<!NAME ...>` body; `>` inside brackets does not end it.
    Declaration { brackets: u32 },
}

impl State {
    fn describe(self) -> &'static str {
        match self {
            State::Text => "text",
            State::TagOpen | State::TagName | State::SelfClosing => "tag",
            State::CloseTagName => "closing tag",
            State::BeforeAttrName | State::AttrName | State::AfterAttrName => "attribute",
            State::BeforeAttrValue | State::AttrValueUnquoted => "attribute value",
            State::AttrValue(_) => "quoted attribute value",
            State::Bang | State::Declaration { .. } => "declaration",
            State::Comment => "comment",
            State::CData => "CDATA section",
        }
    }
}

/// A finished parse that keeps the document even when parsing failed.
#[derive(Debug)]
pub struct ParseResult {
    /// The parsed document (partial if an error occurred).
    pub document: Document,
    /// The error that stopped parsing, if any.
    pub error: Option<ParseError>,
}

impl ParseResult {
    /// Check if parsing completed without error.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into a plain result, dropping the partial tree on error.
    pub fn into_result(self) -> Result<Document, ParseError> {
        match self.error {
            None => Ok(self.document),
            Some(error) => {
                self.document.free();
                Err(error)
            }
        }
    }
}

/// Incremental parser: feed chunks, then finish.
///
/// ```rust
/// use chunkxml_core::Parser;
///
/// let mut parser = Parser::new();
/// parser.feed(b"<greeting lang=\"e").unwrap();
/// parser.feed(b"n\">hel").unwrap();
/// parser.feed(b"lo</greeting>").unwrap();
/// let doc = parser.finish().unwrap();
///
/// let root = doc.root().unwrap();
/// assert_eq!(doc[root].attribute("lang"), Some("en"));
/// assert_eq!(doc.content(root).as_deref(), Some("hello"));
/// ```
#[derive(Debug)]
pub struct Parser {
    doc: Document,
    /// Element receiving children; `None` at the top level.
    current: Option<NodeId>,
    /// Tag whose attributes are being read.
    open: Option<NodeId>,
    state: State,
    /// Partial tag name, attribute name/value or declaration body.
    token: Vec<u8>,
    /// Character data not yet turned into a text element.
    text: Vec<u8>,
    /// Completed attribute name awaiting its value.
    attr_name: Option<String>,
    /// The tag being read is a `<?..?>` instruction.
    instruction: bool,
    /// Stream offset of the first byte of the next chunk.
    offset: u64,
    /// Stream offset of the `<` that started the current markup.
    markup_start: u64,
    depth: usize,
    /// Any non-whitespace byte was seen.
    saw_content: bool,
    error: Option<ParseError>,
    max_depth: usize,
    keep_whitespace: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Create a parser with default options.
    pub fn new() -> Self {
        Self {
            doc: Document::new(),
            current: None,
            open: None,
            state: State::Text,
            token: Vec::new(),
            text: Vec::new(),
            attr_name: None,
            instruction: false,
            offset: 0,
            markup_start: 0,
            depth: 0,
            saw_content: false,
            error: None,
            max_depth: DEFAULT_MAX_DEPTH,
            keep_whitespace: true,
        }
    }

    /// Limit element nesting depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Keep (default) or drop text runs made only of whitespace.
    pub fn with_whitespace_text(mut self, keep: bool) -> Self {
        self.keep_whitespace = keep;
        self
    }

    /// The tree built so far.
    #[inline]
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// The root element, once the first tag has been opened.
    #[inline]
    pub fn root(&self) -> Option<NodeId> {
        self.doc.root()
    }

    /// The element currently receiving children.
    #[inline]
    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    /// Number of bytes consumed so far.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The error that stopped this parser, if any.
    #[inline]
    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    /// Consume one chunk of input.
    ///
    /// After a failure the parser stays failed: every later call returns the
    /// same error without reading the chunk.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        tracing::trace!(
            offset = self.offset,
            len = chunk.len(),
            state = ?self.state,
            "feed chunk"
        );
        let mut pos = 0;
        while pos < chunk.len() {
            match self.step(chunk, pos) {
                Ok(next) => pos = next,
                Err(error) => return Err(self.fail(error)),
            }
        }
        self.offset += chunk.len() as u64;
        Ok(())
    }

    /// Signal end of input and return the finished document.
    pub fn finish(self) -> Result<Document, ParseError> {
        self.finish_with_recovery().into_result()
    }

    /// Signal end of input, keeping the document even on failure.
    pub fn finish_with_recovery(mut self) -> ParseResult {
        if self.error.is_none() {
            if let Err(error) = self.check_end() {
                self.fail(error);
            }
        }
        ParseResult {
            document: self.doc,
            error: self.error,
        }
    }

    fn fail(&mut self, error: ParseError) -> ParseError {
        tracing::warn!(kind = ?error.kind, "parse failed: {}", error);
        self.error = Some(error.clone());
        error
    }

    fn check_end(&mut self) -> Result<(), ParseError> {
        let at = Some(Span::at(self.offset));
        match self.state {
            State::Text => {}
            State::AttrValue(_) => {
                return Err(ParseError::unclosed_delimiter("attribute value", self.markup()))
            }
            State::Comment => return Err(ParseError::unclosed_delimiter("comment", self.markup())),
            State::CData => {
                return Err(ParseError::unclosed_delimiter("CDATA section", self.markup()))
            }
            State::Declaration { .. } => {
                return Err(ParseError::unclosed_delimiter("declaration", self.markup()))
            }
            state => return Err(ParseError::unexpected_eof(state.describe(), at)),
        }
        if let Some(current) = self.current {
            let name = self.doc[current].key().unwrap_or_default().to_string();
            self.flush_text()?;
            return Err(ParseError::unclosed_element(&name, at));
        }
        if self.doc.root().is_none() {
            if self.saw_content {
                return Err(ParseError::new(
                    ParseErrorKind::NoRootElement,
                    "document has no root element",
                    at,
                ));
            }
            return Err(ParseError::new(
                ParseErrorKind::EmptyInput,
                "empty document",
                at,
            ));
        }
        self.text.clear();
        Ok(())
    }

    /// Span from the start of the current markup to the end of input read.
    fn markup(&self) -> Option<Span> {
        Some(Span::new(self.markup_start, self.offset))
    }

    /// Advance from `pos`, returning the position of the first unread byte.
    fn step(&mut self, chunk: &[u8], pos: usize) -> Result<usize, ParseError> {
        let rest = &chunk[pos..];
        let at = self.offset + pos as u64;
        let b = rest[0];

        match self.state {
            State::Text => {
                let scan = scanner::until_byte(b'<', rest);
                let len = scan.token_len(rest.len());
                self.push_text(&rest[..len], at)?;
                match scan {
                    Scan::Found(i) => {
                        self.markup_start = at + i as u64;
                        self.saw_content = true;
                        self.state = State::TagOpen;
                        Ok(pos + i + 1)
                    }
                    Scan::Exhausted => Ok(chunk.len()),
                }
            }
            State::TagOpen => {
                match b {
                    b'/' => self.state = State::CloseTagName,
                    b'!' => self.state = State::Bang,
                    b'?' => {
                        self.instruction = true;
                        self.push_token(&[b'?'], at)?;
                        self.state = State::TagName;
                    }
                    _ if scanner::is_space(b) || matches!(b, b'>' | b'<' | b'=') => {
                        return Err(ParseError::invalid_syntax("tag name", Some(Span::at(at))));
                    }
                    _ => {
                        self.push_token(&[b], at)?;
                        self.state = State::TagName;
                    }
                }
                Ok(pos + 1)
            }
            State::TagName => {
                let scan = scanner::until_name_end(rest, self.instruction);
                let len = scan.token_len(rest.len());
                self.push_token(&rest[..len], at)?;
                match scan {
                    Scan::Found(i) => {
                        if rest[i] == b'=' || rest[i] == b'<' {
                            return Err(ParseError::invalid_syntax(
                                "tag name",
                                Some(Span::at(at + i as u64)),
                            ));
                        }
                        self.open_tag(at + i as u64)?;
                        self.state = State::BeforeAttrName;
                        Ok(pos + i)
                    }
                    Scan::Exhausted => Ok(chunk.len()),
                }
            }
            State::CloseTagName => {
                let scan = scanner::until_byte(b'>', rest);
                let len = scan.token_len(rest.len());
                self.push_token(&rest[..len], at)?;
                match scan {
                    Scan::Found(i) => {
                        self.close_tag(at + i as u64)?;
                        self.state = State::Text;
                        Ok(pos + i + 1)
                    }
                    Scan::Exhausted => Ok(chunk.len()),
                }
            }
            State::BeforeAttrName => {
                let skipped = scanner::skip_space(rest);
                if skipped > 0 {
                    return Ok(pos + skipped);
                }
                match b {
                    b'>' => self.end_open_tag(at)?,
                    b'/' => self.state = State::SelfClosing,
                    b'?' if self.instruction => self.state = State::SelfClosing,
                    b'<' | b'=' | b'"' | b'\'' => {
                        return Err(ParseError::invalid_syntax("attribute", Some(Span::at(at))));
                    }
                    _ => {
                        self.push_token(&[b], at)?;
                        self.state = State::AttrName;
                    }
                }
                Ok(pos + 1)
            }
            State::AttrName => {
                let scan = scanner::until_name_end(rest, self.instruction);
                let len = scan.token_len(rest.len());
                self.push_token(&rest[..len], at)?;
                match scan {
                    Scan::Found(i) => {
                        if rest[i] == b'<' {
                            return Err(ParseError::invalid_syntax(
                                "attribute name",
                                Some(Span::at(at + i as u64)),
                            ));
                        }
                        let name = self.take_token("attribute name")?;
                        self.attr_name = Some(name);
                        self.state = State::AfterAttrName;
                        Ok(pos + i)
                    }
                    Scan::Exhausted => Ok(chunk.len()),
                }
            }
            State::AfterAttrName => {
                let skipped = scanner::skip_space(rest);
                if skipped > 0 {
                    return Ok(pos + skipped);
                }
                match b {
                    b'=' => {
                        self.state = State::BeforeAttrValue;
                        Ok(pos + 1)
                    }
                    b'<' => Err(ParseError::invalid_syntax("attribute", Some(Span::at(at)))),
                    _ => {
                        // Bare attribute; the byte starts whatever follows it.
                        self.push_attribute(String::new(), at)?;
                        self.state = State::BeforeAttrName;
                        Ok(pos)
                    }
                }
            }
            State::BeforeAttrValue => {
                let skipped = scanner::skip_space(rest);
                if skipped > 0 {
                    return Ok(pos + skipped);
                }
                match b {
                    b'"' | b'\'' => self.state = State::AttrValue(b),
                    b'>' | b'<' => {
                        return Err(ParseError::invalid_syntax(
                            "attribute value",
                            Some(Span::at(at)),
                        ));
                    }
                    _ => {
                        self.push_token(&[b], at)?;
                        self.state = State::AttrValueUnquoted;
                    }
                }
                Ok(pos + 1)
            }
            State::AttrValue(quote) => {
                let scan = scanner::until_byte(quote, rest);
                let len = scan.token_len(rest.len());
                self.push_token(&rest[..len], at)?;
                match scan {
                    Scan::Found(i) => {
                        let value = self.take_token("attribute value")?;
                        self.push_attribute(value, at)?;
                        self.state = State::BeforeAttrName;
                        Ok(pos + i + 1)
                    }
                    Scan::Exhausted => Ok(chunk.len()),
                }
            }
            State::AttrValueUnquoted => {
                let scan = scanner::until_unquoted_end(rest);
                let len = scan.token_len(rest.len());
                self.push_token(&rest[..len], at)?;
                match scan {
                    Scan::Found(i) => {
                        if rest[i] == b'<' {
                            return Err(ParseError::invalid_syntax(
                                "attribute value",
                                Some(Span::at(at + i as u64)),
                            ));
                        }
                        let value = self.take_token("attribute value")?;
                        self.push_attribute(value, at)?;
                        self.state = State::BeforeAttrName;
                        Ok(pos + i)
                    }
                    Scan::Exhausted => Ok(chunk.len()),
                }
            }
            State::SelfClosing => {
                if b != b'>' {
                    return Err(ParseError::invalid_syntax(
                        "self-closing tag",
                        Some(Span::at(at)),
                    ));
                }
                self.end_empty_tag();
                Ok(pos + 1)
            }
            State::Bang => {
                self.push_token(&[b], at)?;
                if self.token == COMMENT_OPEN {
                    self.token.clear();
                    self.state = State::Comment;
                } else if self.token == CDATA_OPEN {
                    self.token.clear();
                    self.state = State::CData;
                } else if !COMMENT_OPEN.starts_with(&self.token)
                    && !CDATA_OPEN.starts_with(&self.token)
                {
                    // Plain declaration; reprocess this byte in its body.
                    self.token.pop();
                    let brackets = self.token.iter().filter(|&&c| c == b'[').count() as u32;
                    self.state = State::Declaration { brackets };
                    return Ok(pos);
                }
                Ok(pos + 1)
            }
            State::Comment | State::CData => {
                let (terminator, what) = if self.state == State::Comment {
                    (&b"-->"[..], "comment")
                } else {
                    (&b"]]>"[..], "CDATA section")
                };
                let scan = scanner::until_byte(b'>', rest);
                let len = match scan {
                    Scan::Found(i) => i + 1,
                    Scan::Exhausted => rest.len(),
                };
                self.push_token(&rest[..len], at)?;
                if matches!(scan, Scan::Found(_)) && self.token.ends_with(terminator) {
                    let body_len = self.token.len() - terminator.len();
                    self.token.truncate(body_len);
                    if self.state == State::Comment {
                        let body = self.take_token(what)?;
                        self.add_passthrough("!--".to_string(), Some(body), at)?;
                    } else {
                        let body = std::mem::take(&mut self.token);
                        self.push_text(&body, at)?;
                    }
                    self.state = State::Text;
                }
                Ok(pos + len)
            }
            State::Declaration { brackets } => {
                let scan = scanner::until_any3(b'[', b']', b'>', rest);
                match scan {
                    Scan::Found(i) => {
                        let delimiter = rest[i];
                        if delimiter == b'>' && brackets == 0 {
                            self.push_token(&rest[..i], at)?;
                            self.end_declaration(at + i as u64)?;
                            self.state = State::Text;
                        } else {
                            self.push_token(&rest[..=i], at)?;
                            self.state = State::Declaration {
                                brackets: match delimiter {
                                    b'[' => brackets + 1,
                                    b']' => brackets.saturating_sub(1),
                                    _ => brackets,
                                },
                            };
                        }
                        Ok(pos + i + 1)
                    }
                    Scan::Exhausted => {
                        self.push_token(rest, at)?;
                        Ok(chunk.len())
                    }
                }
            }
        }
    }

    fn push_token(&mut self, bytes: &[u8], at: u64) -> Result<(), ParseError> {
        self.token
            .try_reserve(bytes.len())
            .map_err(|_| ParseError::out_of_memory("token", Some(Span::at(at))))?;
        self.token.extend_from_slice(bytes);
        Ok(())
    }

    fn push_text(&mut self, bytes: &[u8], at: u64) -> Result<(), ParseError> {
        if bytes.is_empty() {
            return Ok(());
        }
        if !self.saw_content && !scanner::is_blank(bytes) {
            self.saw_content = true;
        }
        self.text
            .try_reserve(bytes.len())
            .map_err(|_| ParseError::out_of_memory("text", Some(Span::at(at))))?;
        self.text.extend_from_slice(bytes);
        Ok(())
    }

    fn take_token(&mut self, context: &str) -> Result<String, ParseError> {
        let bytes = std::mem::take(&mut self.token);
        String::from_utf8(bytes)
            .map_err(|_| ParseError::invalid_utf8(context, Some(Span::at(self.markup_start))))
    }

    fn append(&mut self, data: NodeData, at: u64) -> Result<NodeId, ParseError> {
        self.doc
            .append(self.current, data)
            .map_err(|_| ParseError::out_of_memory("element", Some(Span::at(at))))
    }

    /// Turn pending character data into a text element under `current`.
    fn flush_text(&mut self) -> Result<(), ParseError> {
        if self.text.is_empty() {
            return Ok(());
        }
        let at = self.markup_start;
        if self.current.is_none() {
            tracing::debug!(len = self.text.len(), "discarding top-level text");
            self.text.clear();
            return Ok(());
        }
        if !self.keep_whitespace && scanner::is_blank(&self.text) {
            self.text.clear();
            return Ok(());
        }
        let bytes = std::mem::take(&mut self.text);
        let text = String::from_utf8(bytes)
            .map_err(|_| ParseError::invalid_utf8("text", Some(Span::at(at))))?;
        self.append(NodeData::Text(text), at)?;
        Ok(())
    }

    /// Tag name complete: allocate the element and link it in.
    fn open_tag(&mut self, at: u64) -> Result<(), ParseError> {
        self.flush_text()?;
        let key = self.take_token("tag name")?;
        let form = if self.instruction {
            TagForm::Passthrough
        } else {
            TagForm::Open
        };
        tracing::debug!(key = %key, depth = self.depth, "open tag");
        let id = self.append(
            NodeData::Tag(Tag {
                key,
                attributes: Vec::new(),
                form,
                body: None,
            }),
            at,
        )?;
        self.open = Some(id);
        Ok(())
    }

    /// `>` of an opening tag: descend unless it was an instruction.
    fn end_open_tag(&mut self, at: u64) -> Result<(), ParseError> {
        let open = self.open.take();
        self.state = State::Text;
        if self.instruction {
            self.instruction = false;
            return Ok(());
        }
        if self.depth >= self.max_depth {
            return Err(ParseError::depth_limit(self.max_depth, Some(Span::at(at))));
        }
        self.depth += 1;
        self.current = open;
        Ok(())
    }

    /// `/>` or `?>`: the tag is complete and takes no children.
    fn end_empty_tag(&mut self) {
        if let Some(id) = self.open.take() {
            if let NodeData::Tag(tag) = &mut self.doc.get_mut(id).data {
                if tag.form == TagForm::Open {
                    tag.form = TagForm::SelfClosing;
                }
            }
        }
        self.instruction = false;
        self.state = State::Text;
    }

    fn push_attribute(&mut self, value: String, at: u64) -> Result<(), ParseError> {
        let key = self.attr_name.take().unwrap_or_default();
        let Some(id) = self.open else {
            return Ok(());
        };
        if let NodeData::Tag(tag) = &mut self.doc.get_mut(id).data {
            tag.attributes
                .try_reserve(1)
                .map_err(|_| ParseError::out_of_memory("attribute", Some(Span::at(at))))?;
            tag.attributes.push(Attribute { key, value });
        }
        Ok(())
    }

    /// `</name>` complete: pop back to the parent.
    fn close_tag(&mut self, at: u64) -> Result<(), ParseError> {
        let span = Some(Span::new(self.markup_start, at + 1));
        let raw = std::mem::take(&mut self.token);
        let name = String::from_utf8(scanner::trim(&raw).to_vec())
            .map_err(|_| ParseError::invalid_utf8("closing tag", span))?;
        if name.is_empty() {
            return Err(ParseError::invalid_syntax("closing tag", span));
        }
        let Some(current) = self.current else {
            return Err(ParseError::unexpected_close_tag(&name, span));
        };
        let expected = self.doc[current].key().unwrap_or_default();
        if expected != name {
            return Err(ParseError::mismatched_tag(expected, &name, span));
        }
        self.flush_text()?;
        tracing::debug!(key = %name, depth = self.depth, "close tag");
        self.current = self.doc[current].parent();
        self.depth -= 1;
        Ok(())
    }

    /// `<!NAME rest>` complete.
    fn end_declaration(&mut self, at: u64) -> Result<(), ParseError> {
        let raw = std::mem::take(&mut self.token);
        let split = raw
            .iter()
            .position(|&b| scanner::is_space(b))
            .unwrap_or(raw.len());
        if split == 0 {
            return Err(ParseError::invalid_syntax(
                "declaration",
                Some(Span::new(self.markup_start, at + 1)),
            ));
        }
        let to_string = |bytes: &[u8]| {
            String::from_utf8(bytes.to_vec()).map_err(|_| {
                ParseError::invalid_utf8("declaration", Some(Span::new(self.markup_start, at + 1)))
            })
        };
        let key = format!("!{}", to_string(&raw[..split])?);
        let rest = scanner::trim(&raw[split..]);
        let body = if rest.is_empty() {
            None
        } else {
            Some(to_string(rest)?)
        };
        self.add_passthrough(key, body, at)
    }

    fn add_passthrough(&mut self, key: String, body: Option<String>, at: u64) -> Result<(), ParseError> {
        self.flush_text()?;
        tracing::debug!(key = %key, "passthrough tag");
        self.append(
            NodeData::Tag(Tag {
                key,
                attributes: Vec::new(),
                form: TagForm::Passthrough,
                body,
            }),
            at,
        )?;
        Ok(())
    }
}

/// Parse a complete document in one call.
///
/// ```rust
/// let doc = chunkxml_core::parse(b"<a><b>hi</b><b>bye</b></a>").unwrap();
/// let root = doc.root().unwrap();
/// assert_eq!(doc.content(root).as_deref(), Some("hibye"));
/// ```
pub fn parse(input: &[u8]) -> Result<Document, ParseError> {
    parse_with_recovery(input).into_result()
}

/// Parse a complete document, keeping whatever was built on failure.
pub fn parse_with_recovery(input: &[u8]) -> ParseResult {
    let mut parser = Parser::new();
    // A failed feed poisons the parser; finish reports the stored error.
    let _ = parser.feed(input);
    parser.finish_with_recovery()
}
