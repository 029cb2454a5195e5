//! The reactive store: state, bindings, and the mount sequence.
//!
//! A [`Ripple`] owns the markup host and every piece of engine state behind
//! one `Rc`. Handles are cheap to clone and are what handlers, computations
//! and templates receive. The engine is single-threaded; no `RefCell` borrow
//! is held while caller code runs.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;

use crate::actions::{Actions, Templates};
use crate::calc::{CalcDeclaration, CalcGraph};
use crate::codec;
use crate::config::RippleConfig;
use crate::dispatch::Delegation;
use crate::element::Element;
use crate::error::{Result, RippleError};
use crate::host::{MarkupHost, NodeId};
use crate::persist::{FileStorage, Persistence, Storage};
use crate::registry::BindingRegistry;
use crate::transport::Transport;

/// Elements the scanner initializes: reactions, two-way inputs, templates.
pub const REACTIVE_SELECTOR: &str = "[data-reaction],[data-bind],[data-template]";

/// Element lookup by selector within the mounted container.
pub trait Lookup {
    fn select(&self, selector: &str) -> Option<Selection>;
}

/// Keyed state access. Reads have no side effects; writes drive rendering,
/// persistence and computations.
pub trait Store {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
}

/// Result of a selector lookup: a single element, or every match in
/// document order when there are several.
#[derive(Clone)]
pub enum Selection {
    One(Element),
    Many(Vec<Element>),
}

impl Selection {
    fn from_nodes(ripple: &Ripple, mut nodes: Vec<NodeId>) -> Option<Self> {
        match nodes.len() {
            0 => None,
            1 => nodes.pop().map(|node| Selection::One(ripple.element(node))),
            _ => Some(Selection::Many(
                nodes.into_iter().map(|node| ripple.element(node)).collect(),
            )),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Selection::One(_) => 1,
            Selection::Many(all) => all.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn elements(&self) -> &[Element] {
        match self {
            Selection::One(one) => std::slice::from_ref(one),
            Selection::Many(all) => all,
        }
    }
}

impl IntoIterator for Selection {
    type Item = Element;
    type IntoIter = std::vec::IntoIter<Element>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            Selection::One(one) => vec![one].into_iter(),
            Selection::Many(all) => all.into_iter(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ripple
// ---------------------------------------------------------------------------

/// Handle to a mounted engine.
#[derive(Clone)]
pub struct Ripple {
    pub(crate) inner: Rc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) root: NodeId,
    pub(crate) host: RefCell<Box<dyn MarkupHost>>,
    pub(crate) state: RefCell<HashMap<String, Value>>,
    /// Selector → matched nodes. Never invalidated.
    pub(crate) selections: RefCell<HashMap<String, Vec<NodeId>>>,
    pub(crate) registry: RefCell<BindingRegistry>,
    pub(crate) calcs: CalcGraph,
    pub(crate) delegation: RefCell<Delegation>,
    pub(crate) processed: RefCell<HashSet<NodeId>>,
    pub(crate) actions: Actions,
    pub(crate) templates: Templates,
    pub(crate) persistence: Option<Persistence>,
    pub(crate) transport: Option<Rc<dyn Transport>>,
    pub(crate) pending: RefCell<Vec<LocalBoxFuture<'static, ()>>>,
}

impl Ripple {
    pub fn builder() -> RippleBuilder {
        RippleBuilder::default()
    }

    /// The mounted container.
    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    pub fn element(&self, node: NodeId) -> Element {
        Element::new(self.clone(), node)
    }

    /// First element matching `selector`.
    pub fn find(&self, selector: &str) -> Option<Element> {
        self.select(selector).and_then(|s| s.into_iter().next())
    }

    /// Read-only access to the markup host.
    pub fn with_host<R>(&self, f: impl FnOnce(&dyn MarkupHost) -> R) -> R {
        let host = self.host();
        f(&**host)
    }

    /// Serialized markup of the container.
    pub fn html(&self) -> String {
        self.host().outer_html(self.inner.root)
    }

    /// Copy of every state entry, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.inner
            .state
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Nodes currently bound to `key`, in registration order.
    pub fn bound_nodes(&self, key: &str) -> Vec<NodeId> {
        self.inner.registry.borrow().bound(key)
    }

    pub fn calculations(&self) -> &CalcGraph {
        &self.inner.calcs
    }

    pub fn persistence(&self) -> Option<&Persistence> {
        self.inner.persistence.as_ref()
    }

    /// Network actions issued but not yet settled.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Drive every outstanding network action to completion, including any
    /// queued while settling.
    pub async fn settle(&self) {
        loop {
            let queued = std::mem::take(&mut *self.inner.pending.borrow_mut());
            if queued.is_empty() {
                break;
            }
            let mut running: FuturesUnordered<_> = queued.into_iter().collect();
            while running.next().await.is_some() {}
        }
    }

    pub(crate) fn host(&self) -> Ref<'_, Box<dyn MarkupHost>> {
        self.inner.host.borrow()
    }

    pub(crate) fn host_mut(&self) -> RefMut<'_, Box<dyn MarkupHost>> {
        self.inner.host.borrow_mut()
    }

    pub(crate) fn enqueue(&self, task: LocalBoxFuture<'static, ()>) {
        self.inner.pending.borrow_mut().push(task);
    }

    /// Render `value` into a bound element: the template registered under the
    /// key wins, then the element's `data-template`, then plain text.
    pub(crate) fn render_binding(&self, node: NodeId, key: &str, value: &Value) {
        let template_name = self.host().attribute(node, "data-template");
        let markup = match self.inner.templates.resolve(Some(key), template_name.as_deref()) {
            Some(template) => template(value, self),
            None => codec::display(value),
        };
        self.host_mut().set_inner_html(node, &markup);
    }
}

impl Store for Ripple {
    fn get(&self, key: &str) -> Option<Value> {
        self.inner.state.borrow().get(key).cloned()
    }

    /// Equal values skip rendering and computations; persistence mirrors
    /// every write.
    fn set(&self, key: &str, value: Value) {
        let changed = self.inner.state.borrow().get(key) != Some(&value);
        let bound = if changed { self.bound_nodes(key) } else { Vec::new() };
        if changed {
            for &node in &bound {
                self.render_binding(node, key, &value);
            }
            self.inner
                .state
                .borrow_mut()
                .insert(key.to_string(), value.clone());
        }

        if let Some(persistence) = &self.inner.persistence {
            persistence.save(key, &value);
        }

        // Computations follow rendered keys only.
        if !changed {
            tracing::trace!(key, "State unchanged");
        } else if bound.is_empty() {
            tracing::trace!(key, "No bindings; computations not triggered");
        } else {
            self.inner.calcs.trigger(key, self);
        }
    }
}

impl Lookup for Ripple {
    fn select(&self, selector: &str) -> Option<Selection> {
        let cached = self.inner.selections.borrow().get(selector).cloned();
        let nodes = match cached {
            Some(nodes) => nodes,
            None => {
                let nodes = self.host().query_all(self.inner.root, selector);
                if nodes.is_empty() {
                    tracing::debug!(selector, "No elements matched");
                    return None;
                }
                self.inner
                    .selections
                    .borrow_mut()
                    .insert(selector.to_string(), nodes.clone());
                nodes
            }
        };
        Selection::from_nodes(self, nodes)
    }
}

impl std::fmt::Debug for Ripple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ripple")
            .field("root", &self.inner.root)
            .field("keys", &self.inner.state.borrow().len())
            .field("calculations", &self.inner.calcs)
            .field("persistence", &self.inner.persistence)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Builder and mount
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RippleBuilder {
    actions: Actions,
    templates: Templates,
    storage: Option<Rc<dyn Storage>>,
    transport: Option<Rc<dyn Transport>>,
    config: RippleConfig,
}

impl RippleBuilder {
    pub fn actions(mut self, actions: Actions) -> Self {
        self.actions = actions;
        self
    }

    pub fn templates(mut self, templates: Templates) -> Self {
        self.templates = templates;
        self
    }

    /// Durable storage for persistence. Without one, `config.storage_path`
    /// is opened as a [`FileStorage`] when set.
    pub fn storage(mut self, storage: impl Storage + 'static) -> Self {
        self.storage = Some(Rc::new(storage));
        self
    }

    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Rc::new(transport));
        self
    }

    pub fn config(mut self, config: RippleConfig) -> Self {
        self.config = config;
        self
    }

    /// Mount on the first element carrying the configured root marker.
    pub fn mount_marked(self, host: impl MarkupHost + 'static) -> Result<Ripple> {
        let selector = self.config.root_selector();
        let root = host
            .query(host.document(), &selector)
            .ok_or_else(|| RippleError::MissingRoot(selector.clone()))?;
        self.mount(host, root)
    }

    /// Mount on `root`: scan bindings and templates, attach delegated
    /// listeners, then run the `init` action.
    pub fn mount(self, host: impl MarkupHost + 'static, root: NodeId) -> Result<Ripple> {
        if host.tag_name(root).is_none() {
            return Err(RippleError::MissingRoot(format!("{root} is not an element")));
        }

        let persistence = self.persistence(&host, root)?;
        let calcs = CalcGraph::build(calc_declarations(&host, root), &self.actions);

        let ripple = Ripple {
            inner: Rc::new(Inner {
                root,
                host: RefCell::new(Box::new(host)),
                state: RefCell::default(),
                selections: RefCell::default(),
                registry: RefCell::default(),
                calcs,
                delegation: RefCell::default(),
                processed: RefCell::default(),
                actions: self.actions,
                templates: self.templates,
                persistence,
                transport: self.transport,
                pending: RefCell::default(),
            }),
        };

        ripple.scan(root);
        ripple.bind_actions(root);

        tracing::info!(
            root = %root,
            keys = ripple.inner.state.borrow().len(),
            calculations = ripple.inner.calcs.len(),
            listeners = ?ripple.listeners(),
            persistent = ripple.inner.persistence.is_some(),
            "Ripple mounted"
        );

        if let Some(init) = ripple.inner.actions.init_hook() {
            init(&ripple);
        }
        Ok(ripple)
    }

    fn persistence(&self, host: &dyn MarkupHost, root: NodeId) -> Result<Option<Persistence>> {
        let prefix = host
            .attribute(root, "data-local-storage")
            .filter(|p| !p.is_empty())
            .or_else(|| self.config.storage_prefix.clone());
        let Some(prefix) = prefix else {
            return Ok(None);
        };

        let storage = match (&self.storage, &self.config.storage_path) {
            (Some(storage), _) => storage.clone(),
            (None, Some(path)) => Rc::new(FileStorage::open(path)?) as Rc<dyn Storage>,
            (None, None) => {
                tracing::warn!(%prefix, "Persistence prefix set but no storage configured");
                return Ok(None);
            }
        };
        Ok(Some(Persistence::new(prefix, storage)))
    }
}

fn calc_declarations(host: &dyn MarkupHost, root: NodeId) -> Vec<CalcDeclaration> {
    let mut nodes = Vec::new();
    if host.matches(root, "[data-calculate]") {
        nodes.push(root);
    }
    nodes.extend(host.query_all(root, "[data-calculate]"));
    nodes
        .into_iter()
        .filter_map(|node| {
            Some(CalcDeclaration {
                names: host.attribute(node, "data-calculate")?,
                reaction: host.attribute(node, "data-reaction"),
            })
        })
        .collect()
}
