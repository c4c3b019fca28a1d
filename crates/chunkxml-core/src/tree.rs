//! In-memory document tree.
//!
//! Elements live in an arena owned by [`Document`] and refer to each other by
//! [`NodeId`]. The arena owns every node, so links are plain indices and can
//! never dangle:
//!
//! - `first_child` / `last_child` delimit a parent's child list
//! - `next` links siblings in document order
//! - `parent` points back up (absent for top-level elements)
//!
//! An element is either a tag (it has a key) or a run of character data (it
//! has a value), never both. Tags own an ordered attribute list.

use std::ops::Index;

/// Index of an element in its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Position of the element in the arena.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a tag was written, which decides whether it can hold children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagForm {
    /// `<a ...>` closed later by `</a>`.
    Open,
    /// `<a ... />`.
    SelfClosing,
    /// `<?..?>`, `<!..>` or `<!--..-->`: never has children or a closing tag.
    Passthrough,
}

/// A key/value pair attached to a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name.
    pub key: String,
    /// Attribute value with quotes stripped; empty for bare attributes.
    pub value: String,
}

/// Tag payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Tag name, including the leading `?` or `!` of passthrough forms.
    pub key: String,
    /// Attributes in source order. Duplicates are kept.
    pub attributes: Vec<Attribute>,
    /// How the tag was written.
    pub form: TagForm,
    /// Raw content of `<!` forms (comment text, DOCTYPE remainder).
    pub body: Option<String>,
}

/// Payload of an element: exactly one of tag or text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// A tag element.
    Tag(Tag),
    /// Character data.
    Text(String),
}

/// A node of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag or text payload.
    pub data: NodeData,
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
}

impl Element {
    fn new(data: NodeData, parent: Option<NodeId>) -> Self {
        Self {
            data,
            parent,
            first_child: None,
            last_child: None,
            next: None,
        }
    }

    /// Tag name, present only for tag elements.
    #[inline]
    pub fn key(&self) -> Option<&str> {
        match &self.data {
            NodeData::Tag(tag) => Some(&tag.key),
            NodeData::Text(_) => None,
        }
    }

    /// Character data, present only for text elements.
    #[inline]
    pub fn value(&self) -> Option<&str> {
        match &self.data {
            NodeData::Tag(_) => None,
            NodeData::Text(text) => Some(text),
        }
    }

    /// Tag payload, if this is a tag.
    #[inline]
    pub fn tag(&self) -> Option<&Tag> {
        match &self.data {
            NodeData::Tag(tag) => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    /// Attributes in source order; empty for text elements.
    #[inline]
    pub fn attributes(&self) -> &[Attribute] {
        match &self.data {
            NodeData::Tag(tag) => &tag.attributes,
            NodeData::Text(_) => &[],
        }
    }

    /// Value of the first attribute named `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        crate::search::find_attribute(self.attributes(), key).map(|a| a.value.as_str())
    }

    /// Check if this is a text element.
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    /// Parent element; `None` at the top level.
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// First child in document order.
    #[inline]
    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    /// Last child in document order.
    #[inline]
    pub fn last_child(&self) -> Option<NodeId> {
        self.last_child
    }

    /// Following sibling.
    #[inline]
    pub fn next(&self) -> Option<NodeId> {
        self.next
    }
}

/// Counts reported by [`Document::free`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Released {
    /// Elements released, tags and text alike.
    pub elements: usize,
    /// Attributes released.
    pub attributes: usize,
}

/// A parsed document: the element arena plus the top-level forest.
///
/// The root is the first tag ever opened. Tags that appear at the top level
/// after it (trailing comments, or the element following an `<?xml?>`
/// prolog) are linked as its following siblings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    nodes: Vec<Element>,
    root: Option<NodeId>,
    last_top: Option<NodeId>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// The first top-level tag, if any was produced.
    #[inline]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Number of elements in the arena.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if no element was ever allocated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up an element.
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Element> {
        self.nodes.get(id.index())
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Element {
        &mut self.nodes[id.index()]
    }

    /// Children of `id` in document order.
    pub fn children(&self, id: NodeId) -> Siblings<'_> {
        Siblings {
            doc: self,
            next: self.get(id).and_then(|e| e.first_child),
        }
    }

    /// The top-level forest, starting at the root.
    pub fn top_level(&self) -> Siblings<'_> {
        Siblings {
            doc: self,
            next: self.root,
        }
    }

    /// Pre-order walk of the subtree rooted at `id`, `id` included.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            next: self.get(id).map(|_| id),
            bound: id,
        }
    }

    /// Next element in pre-order after `id`, never leaving the subtree of
    /// `bound`. With no bound the walk covers the whole document, climbing
    /// through parents and into following top-level siblings.
    pub(crate) fn next_in_preorder(&self, id: NodeId, bound: Option<NodeId>) -> Option<NodeId> {
        let element = self.get(id)?;
        if let Some(child) = element.first_child {
            return Some(child);
        }
        let mut cursor = id;
        loop {
            if bound == Some(cursor) {
                return None;
            }
            let element = &self.nodes[cursor.index()];
            if let Some(next) = element.next {
                return Some(next);
            }
            cursor = element.parent?;
        }
    }

    /// Append a new element as the last child of `parent`, or to the
    /// top-level forest when `parent` is `None`.
    ///
    /// Fails only when the arena cannot grow; the tree is unchanged then.
    pub(crate) fn append(
        &mut self,
        parent: Option<NodeId>,
        data: NodeData,
    ) -> Result<NodeId, std::collections::TryReserveError> {
        self.nodes.try_reserve(1)?;
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Element::new(data, parent));

        let previous = match parent {
            Some(p) => {
                let parent = &mut self.nodes[p.index()];
                let previous = parent.last_child.replace(id);
                if previous.is_none() {
                    parent.first_child = Some(id);
                }
                previous
            }
            None => {
                let previous = self.last_top.replace(id);
                if self.root.is_none() {
                    self.root = Some(id);
                }
                previous
            }
        };
        if let Some(previous) = previous {
            self.nodes[previous.index()].next = Some(id);
        }
        Ok(id)
    }

    /// Release the whole tree.
    ///
    /// Walks the top-level forest post-order: each element's attributes
    /// first, then its children, then the element. Consuming `self` makes a
    /// second release impossible. Safe on partially built documents.
    pub fn free(mut self) -> Released {
        let mut released = Released::default();
        let mut stack: Vec<(NodeId, bool)> = Vec::new();
        let mut top = self.root;
        while let Some(id) = top {
            top = self.nodes[id.index()].next;
            stack.push((id, false));
            while let Some((id, expanded)) = stack.pop() {
                if expanded {
                    let element = &mut self.nodes[id.index()];
                    if let NodeData::Tag(tag) = &mut element.data {
                        released.attributes += tag.attributes.len();
                        tag.attributes = Vec::new();
                    }
                    element.data = NodeData::Text(String::new());
                    element.first_child = None;
                    element.last_child = None;
                    released.elements += 1;
                    continue;
                }
                stack.push((id, true));
                let mut children = Vec::new();
                let mut child = self.nodes[id.index()].first_child;
                while let Some(c) = child {
                    children.push(c);
                    child = self.nodes[c.index()].next;
                }
                // Reverse so the first child is released first.
                stack.extend(children.into_iter().rev().map(|c| (c, false)));
            }
        }
        tracing::debug!(
            elements = released.elements,
            attributes = released.attributes,
            "released document"
        );
        released
    }
}

impl Index<NodeId> for Document {
    type Output = Element;

    #[inline]
    fn index(&self, id: NodeId) -> &Element {
        &self.nodes[id.index()]
    }
}

/// Iterator over a sibling chain.
#[derive(Debug, Clone)]
pub struct Siblings<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl<'a> Iterator for Siblings<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.doc[id].next;
        Some(id)
    }
}

/// Pre-order iterator over a subtree.
#[derive(Debug, Clone)]
pub struct Descendants<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
    bound: NodeId,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.doc.next_in_preorder(id, Some(self.bound));
        Some(id)
    }
}
