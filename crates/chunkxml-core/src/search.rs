//! Tag search over a built tree.
//!
//! Searches walk the tree in pre-order using only the `parent`, `next` and
//! `first_child` links, so a match is enough to resume: [`Document::find_next`]
//! needs no iterator state besides the element it starts from.

use crate::tree::{Attribute, Document, NodeId};

/// Decides whether a tag key matches.
///
/// Patterns are flat: they see one key at a time, never a path. `str` and
/// `String` match exactly and case-sensitively; [`Predicate`] wraps any
/// closure for other rules.
pub trait Pattern {
    /// Check a tag key.
    fn matches(&self, key: &str) -> bool;
}

impl Pattern for str {
    #[inline]
    fn matches(&self, key: &str) -> bool {
        self == key
    }
}

impl Pattern for String {
    #[inline]
    fn matches(&self, key: &str) -> bool {
        self.as_str() == key
    }
}

impl<P: Pattern + ?Sized> Pattern for &P {
    #[inline]
    fn matches(&self, key: &str) -> bool {
        (**self).matches(key)
    }
}

/// A closure used as a pattern.
///
/// ```rust
/// use chunkxml_core::{parse, Predicate};
///
/// let doc = parse(b"<doc><h1/><p/><h2/></doc>").unwrap();
/// let heading = Predicate(|key: &str| key.starts_with('h'));
/// let keys: Vec<_> = doc
///     .find_all(doc.root().unwrap(), &heading)
///     .filter_map(|id| doc[id].key())
///     .collect();
/// assert_eq!(keys, ["h1", "h2"]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Predicate<F>(pub F);

impl<F: Fn(&str) -> bool> Pattern for Predicate<F> {
    #[inline]
    fn matches(&self, key: &str) -> bool {
        (self.0)(key)
    }
}

/// First attribute whose key equals `key`.
pub fn find_attribute<'a>(attributes: &'a [Attribute], key: &str) -> Option<&'a Attribute> {
    attributes.iter().find(|a| a.key == key)
}

impl Document {
    fn is_match<P: Pattern + ?Sized>(&self, id: NodeId, pattern: &P) -> bool {
        self[id].key().is_some_and(|key| pattern.matches(key))
    }

    /// Limit for a search starting at `start`: its subtree, or the whole
    /// top-level forest when `start` is a top-level element.
    fn search_bound(&self, start: NodeId) -> Option<NodeId> {
        self[start].parent().map(|_| start)
    }

    fn scan<P: Pattern + ?Sized>(
        &self,
        mut cursor: Option<NodeId>,
        pattern: &P,
        bound: Option<NodeId>,
    ) -> Option<NodeId> {
        while let Some(id) = cursor {
            if self.is_match(id, pattern) {
                return Some(id);
            }
            cursor = self.next_in_preorder(id, bound);
        }
        None
    }

    /// First tag at or below `start`, in pre-order, whose key matches.
    ///
    /// `start` itself is a candidate. From a top-level element (such as the
    /// root) the walk continues into the following top-level siblings.
    pub fn find<P: Pattern + ?Sized>(&self, start: NodeId, pattern: &P) -> Option<NodeId> {
        self.get(start)?;
        self.scan(Some(start), pattern, self.search_bound(start))
    }

    /// Next matching tag after `element` in document pre-order.
    ///
    /// Continues into `element`'s children first, then its siblings, then
    /// climbs through its ancestors. The whole document is searched, not
    /// just the subtree of `element`.
    pub fn find_next<P: Pattern + ?Sized>(&self, element: NodeId, pattern: &P) -> Option<NodeId> {
        self.get(element)?;
        let first = self.next_in_preorder(element, None);
        self.scan(first, pattern, None)
    }

    /// Every match reachable by [`find`](Self::find) from `start`, in
    /// document order.
    pub fn find_all<'a, P: Pattern + ?Sized>(&'a self, start: NodeId, pattern: &'a P) -> Matches<'a, P> {
        let bound = self.get(start).and_then(|_| self.search_bound(start));
        Matches {
            doc: self,
            pattern,
            next: self.find(start, pattern),
            bound,
        }
    }
}

/// Iterator returned by [`Document::find_all`].
pub struct Matches<'a, P: ?Sized> {
    doc: &'a Document,
    pattern: &'a P,
    next: Option<NodeId>,
    bound: Option<NodeId>,
}

impl<'a, P: Pattern + ?Sized> Iterator for Matches<'a, P> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        let after = self.doc.next_in_preorder(id, self.bound);
        self.next = self.doc.scan(after, self.pattern, self.bound);
        Some(id)
    }
}
