//! Flattened text extraction.

use crate::search::Pattern;
use crate::tree::{Document, NodeId};

impl Document {
    /// Concatenate every text element at or below `id`, in document order.
    ///
    /// Tag names, attributes and passthrough bodies are not included.
    /// Returns `None` when the subtree holds no text, or when the result
    /// cannot be allocated.
    pub fn content(&self, id: NodeId) -> Option<String> {
        let mut values = self.descendants(id).filter_map(|d| self[d].value());
        let first = values.next()?;
        let mut out = String::new();
        out.try_reserve(first.len()).ok()?;
        out.push_str(first);
        for value in values {
            out.try_reserve(value.len()).ok()?;
            out.push_str(value);
        }
        Some(out)
    }

    /// [`find`](Self::find) followed by [`content`](Self::content).
    pub fn content_find<P: Pattern + ?Sized>(&self, start: NodeId, pattern: &P) -> Option<String> {
        self.find(start, pattern).and_then(|id| self.content(id))
    }
}
