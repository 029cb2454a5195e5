//! Boundary traits for the markup host and its event source.

use std::cell::Cell;
use std::fmt;

/// Opaque handle to a node owned by a [`MarkupHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The five structural insertion primitives, relative to an anchor node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Last child of the anchor.
    Append,
    /// First child of the anchor.
    Prepend,
    /// Previous sibling of the anchor.
    Before,
    /// Next sibling of the anchor.
    After,
    /// Takes the anchor's place; the anchor is detached.
    Replace,
}

/// A queryable, mutable markup tree.
///
/// Implemented by [`MemoryDocument`](crate::dom::MemoryDocument) for tests and
/// the CLI; a browser binding would implement it over the real DOM.
pub trait MarkupHost {
    /// The top of the tree; scope for whole-document queries.
    fn document(&self) -> NodeId;

    /// Descendants of `scope` (excluding `scope`) matching `selector`, in
    /// document order.
    fn query_all(&self, scope: NodeId, selector: &str) -> Vec<NodeId>;

    fn matches(&self, node: NodeId, selector: &str) -> bool;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Lowercase tag name, `None` for text nodes.
    fn tag_name(&self, node: NodeId) -> Option<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);

    fn attribute_names(&self, node: NodeId) -> Vec<String>;

    fn text_content(&self, node: NodeId) -> String;

    fn inner_html(&self, node: NodeId) -> String;

    fn outer_html(&self, node: NodeId) -> String;

    /// Replace the children of `node` with parsed `markup`.
    fn set_inner_html(&mut self, node: NodeId, markup: &str);

    /// Parse `markup` into detached nodes and return the top-level elements.
    fn parse_fragment(&mut self, markup: &str) -> Vec<NodeId>;

    /// Move `node` into the tree at `position` relative to `anchor`.
    fn insert(&mut self, anchor: NodeId, position: Position, node: NodeId);

    fn query(&self, scope: NodeId, selector: &str) -> Option<NodeId> {
        self.query_all(scope, selector).into_iter().next()
    }

    /// Nearest inclusive ancestor of `node` matching `selector`.
    fn closest(&self, node: NodeId, selector: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(id) = current {
            if self.tag_name(id).is_some() && self.matches(id, selector) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }
}

/// A DOM-style event delivered to [`Ripple::dispatch`](crate::Ripple::dispatch).
#[derive(Debug, Clone)]
pub struct Event {
    kind: String,
    target: NodeId,
    value: Option<String>,
    checked: Option<bool>,
    default_prevented: Cell<bool>,
}

impl Event {
    pub fn new(kind: impl Into<String>, target: NodeId) -> Self {
        Self {
            kind: kind.into(),
            target,
            value: None,
            checked: None,
            default_prevented: Cell::new(false),
        }
    }

    /// Current `value` of the target (inputs, selects, textareas).
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Current `checked` state of the target (checkboxes, radios).
    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = Some(checked);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn checked(&self) -> Option<bool> {
        self.checked
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}
