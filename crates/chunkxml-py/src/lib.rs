//! Python bindings for the chunkxml parser.

use std::sync::Arc;

use chunkxml_core::{
    parse as core_parse, Document, NodeId, ParseError as CoreParseError, Parser as CoreParser,
};
use pyo3::exceptions::{PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyString};

fn to_py_err(e: CoreParseError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Borrow the raw bytes of a `bytes` or `str` argument.
fn input_bytes<'a>(input: &'a Bound<'_, PyAny>) -> PyResult<&'a [u8]> {
    if let Ok(bytes) = input.downcast::<PyBytes>() {
        return Ok(bytes.as_bytes());
    }
    if let Ok(text) = input.downcast::<PyString>() {
        return Ok(text.to_str()?.as_bytes());
    }
    Err(PyTypeError::new_err("expected bytes or str"))
}

// ============================================================================
// Element
// ============================================================================

/// A tag or text element of a parsed document.
///
/// Elements keep their document alive; they stay valid after the owning
/// Document object is dropped.
#[pyclass(frozen, name = "Element")]
#[derive(Clone)]
pub struct PyElement {
    doc: Arc<Document>,
    id: NodeId,
}

impl PyElement {
    fn at(&self, id: NodeId) -> PyElement {
        PyElement {
            doc: Arc::clone(&self.doc),
            id,
        }
    }
}

#[pymethods]
impl PyElement {
    /// Tag name, or None for a text element.
    #[getter]
    fn key(&self) -> Option<&str> {
        self.doc[self.id].key()
    }

    /// Text content, or None for a tag element.
    #[getter]
    fn value(&self) -> Option<&str> {
        self.doc[self.id].value()
    }

    /// Attributes as an ordered list of (key, value) tuples.
    #[getter]
    fn attributes(&self) -> Vec<(String, String)> {
        self.doc[self.id]
            .attributes()
            .iter()
            .map(|a| (a.key.clone(), a.value.clone()))
            .collect()
    }

    #[getter]
    fn children(&self) -> Vec<PyElement> {
        self.doc.children(self.id).map(|id| self.at(id)).collect()
    }

    #[getter]
    fn parent(&self) -> Option<PyElement> {
        self.doc[self.id].parent().map(|id| self.at(id))
    }

    /// Value of the first attribute named `key`.
    #[pyo3(text_signature = "(self, key)")]
    fn attribute(&self, key: &str) -> Option<&str> {
        self.doc[self.id].attribute(key)
    }

    /// First element in this subtree (including itself) whose key is `pattern`.
    #[pyo3(text_signature = "(self, pattern)")]
    fn find(&self, pattern: &str) -> Option<PyElement> {
        self.doc.find(self.id, pattern).map(|id| self.at(id))
    }

    /// Next element after this one, in document order, whose key is `pattern`.
    #[pyo3(text_signature = "(self, pattern)")]
    fn find_next(&self, pattern: &str) -> Option<PyElement> {
        self.doc.find_next(self.id, pattern).map(|id| self.at(id))
    }

    /// Concatenated text of this subtree, or None when it holds no text.
    #[pyo3(text_signature = "(self)")]
    fn content(&self) -> Option<String> {
        self.doc.content(self.id)
    }

    #[pyo3(text_signature = "(self, pattern)")]
    fn content_find(&self, pattern: &str) -> Option<String> {
        self.doc.content_find(self.id, pattern)
    }

    fn __eq__(&self, other: &PyElement) -> bool {
        Arc::ptr_eq(&self.doc, &other.doc) && self.id == other.id
    }

    fn __repr__(&self) -> String {
        let element = &self.doc[self.id];
        match (element.key(), element.value()) {
            (Some(key), _) => format!(
                "Element(key={:?}, attributes={}, children={})",
                key,
                element.attributes().len(),
                self.doc.children(self.id).count()
            ),
            (None, Some(value)) => format!("Element(value={:?})", value),
            (None, None) => "Element()".to_string(),
        }
    }
}

// ============================================================================
// Document
// ============================================================================

/// A parsed document.
#[pyclass(frozen, name = "Document")]
pub struct PyDocument {
    doc: Arc<Document>,
}

impl PyDocument {
    fn new(doc: Document) -> Self {
        PyDocument { doc: Arc::new(doc) }
    }
}

#[pymethods]
impl PyDocument {
    /// The first tag element of the document.
    #[getter]
    fn root(&self) -> Option<PyElement> {
        self.doc.root().map(|id| PyElement {
            doc: Arc::clone(&self.doc),
            id,
        })
    }

    /// Top-level elements: the root followed by its siblings.
    #[getter]
    fn top_level(&self) -> Vec<PyElement> {
        self.doc
            .top_level()
            .map(|id| PyElement {
                doc: Arc::clone(&self.doc),
                id,
            })
            .collect()
    }

    fn __len__(&self) -> usize {
        self.doc.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "Document(root={:?}, elements={})",
            self.doc.root().and_then(|id| self.doc[id].key()),
            self.doc.len()
        )
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Incremental parser. Feed chunks split at any byte, then call finish().
///
/// Args:
///     max_depth: Maximum element nesting (default 1024)
///     whitespace_text: Keep whitespace-only text runs (default True)
#[pyclass(name = "Parser")]
pub struct PyParser {
    inner: Option<CoreParser>,
}

impl PyParser {
    fn parser(&mut self) -> PyResult<&mut CoreParser> {
        self.inner
            .as_mut()
            .ok_or_else(|| PyRuntimeError::new_err("parser already finished"))
    }
}

#[pymethods]
impl PyParser {
    #[new]
    #[pyo3(
        signature = (max_depth=None, whitespace_text=true),
        text_signature = "(max_depth=None, whitespace_text=True)"
    )]
    fn new(max_depth: Option<usize>, whitespace_text: bool) -> Self {
        let mut parser = CoreParser::new().with_whitespace_text(whitespace_text);
        if let Some(depth) = max_depth {
            parser = parser.with_max_depth(depth);
        }
        PyParser {
            inner: Some(parser),
        }
    }

    /// Feed the next chunk (bytes or str). Raises ValueError on malformed input.
    #[pyo3(text_signature = "(self, chunk)")]
    fn feed(&mut self, chunk: &Bound<'_, PyAny>) -> PyResult<()> {
        let data = input_bytes(chunk)?;
        self.parser()?.feed(data).map_err(to_py_err)
    }

    /// Signal end of input and return the document. Raises ValueError on error.
    #[pyo3(text_signature = "(self)")]
    fn finish(&mut self) -> PyResult<PyDocument> {
        let parser = self
            .inner
            .take()
            .ok_or_else(|| PyRuntimeError::new_err("parser already finished"))?;
        parser.finish().map(PyDocument::new).map_err(to_py_err)
    }

    /// Bytes consumed so far.
    #[getter]
    fn offset(&self) -> u64 {
        self.inner.as_ref().map_or(0, |p| p.offset())
    }

    fn __repr__(&self) -> String {
        match &self.inner {
            Some(p) => format!("Parser(offset={})", p.offset()),
            None => "Parser(finished)".to_string(),
        }
    }
}

// ============================================================================
// Module functions
// ============================================================================

/// Parse a complete document.
///
/// Args:
///     input: Document as bytes or str
///
/// Returns:
///     Document: Parsed document
///
/// Raises:
///     ValueError: On malformed or empty input
#[pyfunction]
#[pyo3(text_signature = "(input)")]
fn parse(input: &Bound<'_, PyAny>) -> PyResult<PyDocument> {
    let data = input_bytes(input)?;
    core_parse(data).map(PyDocument::new).map_err(to_py_err)
}

// ============================================================================
// Module
// ============================================================================

/// chunkxml - Resumable XML-like parser with tag search.
#[pymodule]
fn pycx(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyParser>()?;
    m.add_class::<PyDocument>()?;
    m.add_class::<PyElement>()?;
    m.add_function(wrap_pyfunction!(parse, m)?)?;
    Ok(())
}
