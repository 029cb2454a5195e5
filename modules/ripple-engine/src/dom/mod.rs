//! In-memory markup host.
//!
//! `MemoryDocument` wraps a `scraper::Html` tree. Markup is parsed with
//! html5ever fragment parsing and grafted into the tree, selectors are matched
//! with `scraper::Selector`, and the mutation primitives the engine needs are
//! applied to the underlying `ego_tree`. Detached nodes stay in the tree as
//! orphans; handles are never reused.

mod serialize;

use std::collections::HashMap;

use ego_tree::NodeRef;
use html5ever::{LocalName, Namespace, QualName};
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector, StrTendril};
use tracing::warn;

use crate::host::{MarkupHost, NodeId, Position};

type TreeId = ego_tree::NodeId;

/// `scraper`-backed markup tree implementing [`MarkupHost`].
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    html: Html,
    /// Handle index → tree node, in tree allocation order.
    ids: Vec<TreeId>,
    handles: HashMap<TreeId, NodeId>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// An empty document containing only the document node.
    pub fn new() -> Self {
        let mut doc = Self {
            html: Html::new_document(),
            ids: Vec::new(),
            handles: HashMap::new(),
        };
        doc.sync();
        doc
    }

    /// Parse `markup` as the body of a new document.
    pub fn parse(markup: &str) -> Self {
        let mut doc = Self::new();
        let root = doc.html.tree.root().id();
        for id in doc.import(markup) {
            if let Some(mut document) = doc.html.tree.get_mut(root) {
                document.append_id(id);
            }
        }
        doc
    }

    pub fn document(&self) -> NodeId {
        NodeId(0)
    }

    /// Serialized markup of the whole document.
    pub fn html(&self) -> String {
        self.inner_html(self.document())
    }

    /// Register handles for tree nodes allocated since the last call.
    fn sync(&mut self) {
        let fresh: Vec<TreeId> = self
            .html
            .tree
            .nodes()
            .skip(self.ids.len())
            .map(|node| node.id())
            .collect();
        for tree_id in fresh {
            let handle = NodeId(self.ids.len());
            self.ids.push(tree_id);
            self.handles.insert(tree_id, handle);
        }
    }

    fn tree_id(&self, id: NodeId) -> Option<TreeId> {
        self.ids.get(id.0).copied()
    }

    fn handle(&self, tree_id: TreeId) -> Option<NodeId> {
        self.handles.get(&tree_id).copied()
    }

    fn node(&self, id: NodeId) -> Option<NodeRef<'_, Node>> {
        self.tree_id(id).and_then(|tree_id| self.html.tree.get(tree_id))
    }

    fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.node(id).and_then(ElementRef::wrap)
    }

    fn detach_tree(&mut self, tree_id: TreeId) {
        if let Some(mut node) = self.html.tree.get_mut(tree_id) {
            node.detach();
        }
    }

    /// Parse markup into detached nodes in source order.
    fn import(&mut self, markup: &str) -> Vec<TreeId> {
        let fragment = Html::parse_fragment(markup);
        let root = self.html.tree.extend_tree(fragment.tree).id();

        // fragment root → <html> wrapper → parsed content
        let children: Vec<TreeId> = self
            .html
            .tree
            .get(root)
            .and_then(|root| root.children().find(|child| child.value().is_element()))
            .map(|wrapper| wrapper.children().map(|child| child.id()).collect())
            .unwrap_or_default();
        for &child in &children {
            self.detach_tree(child);
        }
        self.sync();
        children
    }
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(%selector, error = %err, "invalid selector");
            None
        }
    }
}

impl MarkupHost for MemoryDocument {
    fn document(&self) -> NodeId {
        NodeId(0)
    }

    fn query_all(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        let (Some(scope), Some(selector)) = (self.node(scope), parse_selector(selector)) else {
            return Vec::new();
        };
        scope
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|element| selector.matches(element))
            .filter_map(|element| self.handle(element.id()))
            .collect()
    }

    fn matches(&self, node: NodeId, selector: &str) -> bool {
        let Some(element) = self.element(node) else {
            return false;
        };
        parse_selector(selector).is_some_and(|selector| selector.matches(&element))
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?
            .parent()
            .and_then(|parent| self.handle(parent.id()))
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.element(node)
            .map(|element| element.value().name().to_ascii_lowercase())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node)?.value().attr(name).map(str::to_string)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(mut node) = self
            .tree_id(node)
            .and_then(|tree_id| self.html.tree.get_mut(tree_id))
        else {
            return;
        };
        let Node::Element(element) = node.value() else {
            return;
        };

        let mut attrs = element.attrs.clone();
        match attrs.iter_mut().find(|(key, _)| &*key.local == name) {
            Some(slot) => slot.1 = StrTendril::from_slice(value),
            None => attrs.push((
                QualName::new(None, Namespace::from(""), LocalName::from(name)),
                StrTendril::from_slice(value),
            )),
        }

        // Rebuild so the cached id and class lists follow the new attributes.
        let mut updated = Element::new(element.name.clone(), Vec::new());
        updated.attrs = attrs;
        *element = updated;
    }

    fn attribute_names(&self, node: NodeId) -> Vec<String> {
        self.element(node)
            .map(|element| {
                element
                    .value()
                    .attrs()
                    .map(|(name, _)| name.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn text_content(&self, node: NodeId) -> String {
        self.node(node)
            .map(|node| {
                node.descendants()
                    .filter_map(|n| n.value().as_text())
                    .map(|text| &**text)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn inner_html(&self, node: NodeId) -> String {
        match self.node(node) {
            Some(node) => serialize::children(node),
            None => String::new(),
        }
    }

    fn outer_html(&self, node: NodeId) -> String {
        match self.node(node) {
            Some(node) => serialize::node(node),
            None => String::new(),
        }
    }

    fn set_inner_html(&mut self, node: NodeId, markup: &str) {
        let Some(tree_id) = self.tree_id(node) else {
            return;
        };
        let old: Vec<TreeId> = self
            .html
            .tree
            .get(tree_id)
            .map(|node| node.children().map(|child| child.id()).collect())
            .unwrap_or_default();
        for child in old {
            self.detach_tree(child);
        }
        for id in self.import(markup) {
            if let Some(mut parent) = self.html.tree.get_mut(tree_id) {
                parent.append_id(id);
            }
        }
    }

    fn parse_fragment(&mut self, markup: &str) -> Vec<NodeId> {
        self.import(markup)
            .into_iter()
            .filter(|id| {
                self.html
                    .tree
                    .get(*id)
                    .is_some_and(|node| node.value().is_element())
            })
            .filter_map(|id| self.handle(id))
            .collect()
    }

    fn insert(&mut self, anchor: NodeId, position: Position, node: NodeId) {
        let (Some(anchor_id), Some(node_id)) = (self.tree_id(anchor), self.tree_id(node)) else {
            return;
        };
        // A node cannot move into its own subtree.
        if self.contains(node, anchor) {
            return;
        }
        self.detach_tree(node_id);

        let Some(mut target) = self.html.tree.get_mut(anchor_id) else {
            return;
        };
        match position {
            Position::Append => {
                target.append_id(node_id);
            }
            Position::Prepend => {
                target.prepend_id(node_id);
            }
            sibling => {
                if target.parent().is_none() {
                    return;
                }
                match sibling {
                    Position::After => {
                        target.insert_id_after(node_id);
                    }
                    _ => {
                        target.insert_id_before(node_id);
                    }
                }
                if sibling == Position::Replace {
                    self.detach_tree(anchor_id);
                }
            }
        }
    }
}
