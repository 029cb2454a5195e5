//! Element handles: `data-*` metadata access and scan-aware mutations.

use serde_json::Value;

use crate::codec;
use crate::host::{NodeId, Position};
use crate::store::Ripple;

/// Content accepted by the mutation methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Markup parsed into a detached fragment.
    Markup(String),
    /// An existing node, copied through its outer markup.
    Node(NodeId),
}

impl From<&str> for Content {
    fn from(markup: &str) -> Self {
        Content::Markup(markup.to_string())
    }
}

impl From<String> for Content {
    fn from(markup: String) -> Self {
        Content::Markup(markup)
    }
}

impl From<NodeId> for Content {
    fn from(node: NodeId) -> Self {
        Content::Node(node)
    }
}

impl From<&Element> for Content {
    fn from(element: &Element) -> Self {
        Content::Node(element.node)
    }
}

/// Handle to one element of a mounted tree.
#[derive(Clone)]
pub struct Element {
    ripple: Ripple,
    node: NodeId,
}

impl Element {
    pub(crate) fn new(ripple: Ripple, node: NodeId) -> Self {
        Self { ripple, node }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn tag_name(&self) -> Option<String> {
        self.ripple.host().tag_name(self.node)
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.ripple.host().attribute(self.node, name)
    }

    /// Decoded value of `data-<field>`; `field` is camelCase
    /// (`localStorage` reads `data-local-storage`).
    pub fn data(&self, field: &str) -> Option<Value> {
        self.attribute(&dataset_attribute(field))
            .map(|raw| codec::decode(&raw))
    }

    /// Write `data-<field>`: strings verbatim, other values encoded.
    pub fn set_data(&self, field: &str, value: &Value) {
        self.ripple
            .host_mut()
            .set_attribute(self.node, &dataset_attribute(field), &codec::stringify(value));
    }

    /// camelCase names of every `data-*` attribute.
    pub fn fields(&self) -> Vec<String> {
        self.ripple
            .host()
            .attribute_names(self.node)
            .iter()
            .filter_map(|name| dataset_field(name))
            .collect()
    }

    pub fn text(&self) -> String {
        self.ripple.host().text_content(self.node)
    }

    pub fn inner_html(&self) -> String {
        self.ripple.host().inner_html(self.node)
    }

    pub fn outer_html(&self) -> String {
        self.ripple.host().outer_html(self.node)
    }

    pub fn append(&self, content: impl Into<Content>) -> Vec<Element> {
        self.insert(Position::Append, content.into())
    }

    pub fn prepend(&self, content: impl Into<Content>) -> Vec<Element> {
        self.insert(Position::Prepend, content.into())
    }

    pub fn insert_before(&self, content: impl Into<Content>) -> Vec<Element> {
        self.insert(Position::Before, content.into())
    }

    pub fn insert_after(&self, content: impl Into<Content>) -> Vec<Element> {
        self.insert(Position::After, content.into())
    }

    /// Replace this element; the handle then refers to a detached node.
    pub fn replace(&self, content: impl Into<Content>) -> Vec<Element> {
        self.insert(Position::Replace, content.into())
    }

    fn insert(&self, position: Position, content: Content) -> Vec<Element> {
        self.ripple
            .insert_content(self.node, position, content)
            .into_iter()
            .map(|node| self.ripple.element(node))
            .collect()
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element").field("node", &self.node).finish()
    }
}

impl Ripple {
    /// Insert `content` relative to `anchor`, preserving the fragment's order,
    /// and bind each inserted element like initially scanned markup.
    pub(crate) fn insert_content(&self, anchor: NodeId, position: Position, content: Content) -> Vec<NodeId> {
        let markup = match content {
            Content::Markup(markup) => markup,
            Content::Node(node) => self.host().outer_html(node),
        };
        let nodes = self.host_mut().parse_fragment(&markup);

        let mut previous: Option<NodeId> = None;
        for &node in &nodes {
            let (at, how) = match (position, previous) {
                (_, None) => (anchor, position),
                (Position::Append | Position::Before, Some(_)) => (anchor, position),
                (_, Some(prev)) => (prev, Position::After),
            };
            self.host_mut().insert(at, how, node);
            previous = Some(node);

            self.process_element(node);
            self.scan(node);
            self.bind_actions(node);
        }
        tracing::debug!(anchor = %anchor, ?position, inserted = nodes.len(), "Content inserted");
        nodes
    }
}

/// `localStorage` → `data-local-storage`.
pub fn dataset_attribute(field: &str) -> String {
    let mut name = String::from("data-");
    for c in field.chars() {
        if c.is_ascii_uppercase() {
            name.push('-');
            name.push(c.to_ascii_lowercase());
        } else {
            name.push(c);
        }
    }
    name
}

/// `data-local-storage` → `localStorage`; `None` for non-`data-*` names.
pub fn dataset_field(attribute: &str) -> Option<String> {
    let rest = attribute.strip_prefix("data-")?;
    let mut field = String::new();
    let mut upper = false;
    for c in rest.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            field.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            field.push(c);
        }
    }
    Some(field)
}
