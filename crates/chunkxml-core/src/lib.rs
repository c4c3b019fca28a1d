//! # chunkxml core
//!
//! A minimal parser that turns an XML-like byte stream into an in-memory
//! tree, plus tag search and flattened text extraction over that tree.
//!
//! Input may arrive in chunks of any size, split at any byte: the parser
//! carries partial tokens across calls and never re-reads earlier input.
//!
//! ## Quick Start
//!
//! ```rust
//! use chunkxml_core::parse;
//!
//! let doc = parse(b"<a><b>hi</b><b>bye</b></a>").unwrap();
//! let root = doc.root().unwrap();
//!
//! let first = doc.find(root, "b").unwrap();
//! let second = doc.find_next(first, "b").unwrap();
//! assert_eq!(doc.content(second).as_deref(), Some("bye"));
//! assert_eq!(doc.content(root).as_deref(), Some("hibye"));
//! ```
//!
//! ## Chunked Input
//!
//! ```rust
//! use chunkxml_core::Parser;
//!
//! let mut parser = Parser::new();
//! let chunks: [&[u8]; 3] = [b"<a x=\"1", b"\" y='2'", b"/>"];
//! for chunk in chunks {
//!     parser.feed(chunk).unwrap();
//! }
//! let doc = parser.finish().unwrap();
//! let root = doc.root().unwrap();
//! assert_eq!(doc[root].attribute("y"), Some("2"));
//! ```
//!
//! ## Failure
//!
//! A failed parse still yields a fully linked partial tree through
//! [`Parser::finish_with_recovery`]; releasing it is always safe.

pub mod content;
pub mod error;
pub mod parser;
pub mod scanner;
pub mod search;
pub mod span;
pub mod tree;

pub use error::{ErrorClass, ParseError, ParseErrorKind};
pub use parser::{parse, parse_with_recovery, ParseResult, Parser};
pub use search::{find_attribute, Matches, Pattern, Predicate};
pub use tree::{Attribute, Document, Element, NodeData, NodeId, Released, Tag, TagForm};
