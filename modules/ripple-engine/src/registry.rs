//! Binding registry and per-element initialization.

use std::collections::HashMap;

use serde_json::Value;

use crate::codec;
use crate::host::NodeId;
use crate::store::{Ripple, REACTIVE_SELECTOR};

/// State key → elements rendering it, in registration order.
#[derive(Debug, Default)]
pub(crate) struct BindingRegistry {
    bindings: HashMap<String, Vec<NodeId>>,
}

impl BindingRegistry {
    /// Returns `false` when the pair was already registered.
    pub(crate) fn register(&mut self, key: &str, node: NodeId) -> bool {
        let nodes = self.bindings.entry(key.to_string()).or_default();
        if nodes.contains(&node) {
            return false;
        }
        nodes.push(node);
        true
    }

    pub(crate) fn bound(&self, key: &str) -> Vec<NodeId> {
        self.bindings.get(key).cloned().unwrap_or_default()
    }
}

impl Ripple {
    /// Initialize every reactive descendant of `scope`.
    pub(crate) fn scan(&self, scope: NodeId) {
        let nodes = self.host().query_all(scope, REACTIVE_SELECTOR);
        for node in nodes {
            self.process_element(node);
        }
    }

    /// Template first, then one-way binding, then two-way binding. Each node
    /// is processed once; nodes outside the container are skipped.
    pub(crate) fn process_element(&self, node: NodeId) {
        let (attached, template, reaction, bind) = {
            let host = self.host();
            (
                host.contains(self.inner.root, node),
                host.attribute(node, "data-template").filter(|t| !t.is_empty()),
                host.attribute(node, "data-reaction").filter(|k| !k.is_empty()),
                host.attribute(node, "data-bind").filter(|k| !k.is_empty()),
            )
        };
        if !attached {
            tracing::debug!(node = %node, "Skipping element outside the container");
            return;
        }
        if !self.inner.processed.borrow_mut().insert(node) {
            return;
        }

        if let Some(name) = template {
            self.initialize_template(node, &name);
        }
        if let Some(key) = reaction {
            self.initialize_binding(node, &key);
        }
        if let Some(key) = bind {
            self.bind_two_way(node, key);
        }
    }

    fn initialize_template(&self, node: NodeId, name: &str) {
        let target = {
            let host = self.host();
            host.attribute(node, "data-target")
                .and_then(|selector| host.query(self.inner.root, &selector))
                .unwrap_or(node)
        };

        match self.inner.templates.get(name) {
            Some(template) => {
                let markup = template(&Value::Null, self);
                self.host_mut().set_inner_html(target, &markup);
            }
            None => tracing::debug!(template = name, "No template registered"),
        }

        self.scan(node);
        if target != node {
            self.scan(target);
        }
    }

    /// Seed the key (persisted value, else the element's decoded text) unless
    /// it already holds a value, register the element, and render it.
    fn initialize_binding(&self, node: NodeId, key: &str) {
        let existing = self.inner.state.borrow().get(key).cloned();
        let value = match existing {
            Some(value) => value,
            None => {
                let seeded = self
                    .inner
                    .persistence
                    .as_ref()
                    .and_then(|p| p.load(key))
                    .unwrap_or_else(|| codec::decode(&self.host().text_content(node)));
                self.inner
                    .state
                    .borrow_mut()
                    .insert(key.to_string(), seeded.clone());
                seeded
            }
        };

        if self.inner.registry.borrow_mut().register(key, node) {
            tracing::debug!(key, node = %node, "Binding registered");
        }
        self.render_binding(node, key, &value);
    }

    fn bind_two_way(&self, node: NodeId, key: String) {
        tracing::debug!(%key, node = %node, "Two-way binding attached");
        self.inner.delegation.borrow_mut().bind_input(node, key);
    }
}
