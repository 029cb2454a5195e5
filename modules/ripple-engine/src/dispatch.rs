//! Delegated event handling: two-way inputs, local actions, network actions.

use std::collections::{BTreeSet, HashMap};

use serde_json::{json, Map, Value};

use crate::actions::{parse_action, Action, ActionDeclaration, ActionKind, ACTION_SELECTOR};
use crate::codec;
use crate::element::dataset_field;
use crate::expr::{self, Scope};
use crate::host::{Event, MarkupHost, NodeId};
use crate::store::{Ripple, Store};
use crate::transport::{HttpRequest, Verb};

/// Listeners attached at the container, plus two-way input bindings.
#[derive(Debug, Default)]
pub(crate) struct Delegation {
    listeners: BTreeSet<String>,
    two_way: HashMap<NodeId, String>,
}

impl Delegation {
    pub(crate) fn bind_input(&mut self, node: NodeId, key: String) {
        self.two_way.insert(node, key);
    }
}

impl Ripple {
    /// Event names with a delegated listener at the container.
    pub fn listeners(&self) -> Vec<String> {
        self.inner.delegation.borrow().listeners.iter().cloned().collect()
    }

    /// Attach a listener for every event declared by `scope` or its
    /// descendants that is not yet delegated.
    pub(crate) fn bind_actions(&self, scope: NodeId) {
        let events: Vec<String> = {
            let host = self.host();
            let mut nodes = Vec::new();
            if host.matches(scope, ACTION_SELECTOR) {
                nodes.push(scope);
            }
            nodes.extend(host.query_all(scope, ACTION_SELECTOR));
            nodes
                .into_iter()
                .filter_map(|node| ActionDeclaration::read(&**host, node))
                .map(|declaration| declaration.event)
                .collect()
        };

        let mut delegation = self.inner.delegation.borrow_mut();
        for event in events {
            if delegation.listeners.insert(event.clone()) {
                tracing::debug!(%event, "Delegated listener attached");
            }
        }
    }

    /// Deliver an event originating at `event.target()`.
    pub fn dispatch(&self, event: &Event) {
        let root = self.inner.root;
        if !self.host().contains(root, event.target()) {
            tracing::trace!(target = %event.target(), "Event outside the container ignored");
            return;
        }

        if event.kind() == "input" {
            self.sync_inputs(event);
        }

        let delegated = self.inner.delegation.borrow().listeners.contains(event.kind());
        if delegated {
            self.run_declared_action(event);
        }
    }

    fn sync_inputs(&self, event: &Event) {
        let keys: Vec<String> = {
            let host = self.host();
            let delegation = self.inner.delegation.borrow();
            let mut keys = Vec::new();
            let mut current = Some(event.target());
            while let Some(node) = current {
                if let Some(key) = delegation.two_way.get(&node) {
                    keys.push(key.clone());
                }
                if node == self.inner.root {
                    break;
                }
                current = host.parent(node);
            }
            keys
        };
        if keys.is_empty() {
            return;
        }

        let Some(raw) = event.value() else {
            tracing::debug!(target = %event.target(), "Input event without a value");
            return;
        };
        for key in keys {
            self.set(&key, codec::decode(raw));
        }
    }

    fn run_declared_action(&self, event: &Event) {
        let root = self.inner.root;
        let (element, declaration, keep_default) = {
            let host = self.host();
            let Some(element) = host.closest(event.target(), ACTION_SELECTOR) else {
                return;
            };
            if !host.contains(root, element) {
                return;
            }
            let Some(declaration) = ActionDeclaration::read(&**host, element) else {
                return;
            };
            let keep_default = host.attribute(element, "data-default").is_some();
            (element, declaration, keep_default)
        };

        if declaration.event != event.kind() {
            tracing::trace!(
                expected = %declaration.event,
                got = event.kind(),
                "Event does not match declaration"
            );
            return;
        }
        if !keep_default {
            event.prevent_default();
        }

        match declaration.kind {
            ActionKind::Local => self.run_local_action(element, &declaration.expr, event),
            ActionKind::Http(verb) => self.queue_request(verb, &declaration.expr, element, event),
        }
    }

    fn run_local_action(&self, element: NodeId, expr: &str, event: &Event) {
        let (name, args) = parse_action(expr);
        match self.inner.actions.get(&name).cloned() {
            Some(Action::Curried(factory)) => {
                let args = args.unwrap_or_default();
                factory(args.as_slice())(self, event)
            }
            Some(Action::Handler(handler)) => {
                if args.is_some() {
                    tracing::warn!(action = %name, "Arguments ignored for a plain handler");
                }
                handler(self, event)
            }
            Some(Action::Compute(computation)) => computation(self),
            None => {
                let scope = self.action_scope(element, event);
                if let Err(e) = expr::run(expr, &scope, self) {
                    tracing::error!(action = expr, error = %e, "Inline action failed");
                }
            }
        }
    }

    /// Names visible to inline actions.
    fn action_scope(&self, element: NodeId, event: &Event) -> Scope {
        let state = Value::Object(self.snapshot().into_iter().collect());
        let host = self.host();
        Scope::new()
            .with("$", state)
            .with("$el", node_object(&**host, element, None))
            .with("$event", event_object(event))
            .with("$target", node_object(&**host, event.target(), Some(event)))
            .with("$value", event.value().map(Value::from).unwrap_or(Value::Null))
            .with("$checked", event.checked().map(Value::Bool).unwrap_or(Value::Null))
    }

    fn queue_request(&self, verb: Verb, url: &str, element: NodeId, event: &Event) {
        let Some(transport) = self.inner.transport.clone() else {
            tracing::warn!(%verb, url, "No transport configured, network action dropped");
            return;
        };

        let (target, template, params, scope) = {
            let host = self.host();
            let target = match host.attribute(element, "data-target") {
                Some(selector) => {
                    let found = host.query(self.inner.root, &selector);
                    if found.is_none() {
                        tracing::debug!(%selector, "Network action target not found");
                    }
                    found
                }
                None => None,
            };
            let scope = Scope::new()
                .with("$event", event_object(event))
                .with("$el", node_object(&**host, event.target(), Some(event)));
            (
                target,
                host.attribute(element, "data-template"),
                host.attribute(element, "data-params"),
                scope,
            )
        };

        let body = params.and_then(|src| match expr::evaluate(&src, &scope, Some(self as &dyn Store)) {
            Ok(value) => Some(codec::encode(&value)),
            Err(e) => {
                tracing::error!(params = %src, error = %e, "Failed to evaluate request params");
                None
            }
        });

        let request = HttpRequest {
            url: url.to_string(),
            verb,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: if verb == Verb::Get { None } else { body },
        };
        tracing::debug!(%verb, url, "Network action queued");

        let ripple = self.clone();
        self.enqueue(Box::pin(async move {
            let url = request.url.clone();
            match transport.send(request).await {
                Ok(response) => match target {
                    Some(target) => ripple.render_response(target, template.as_deref(), &response.decode()),
                    None => tracing::debug!(%verb, url = %url, "Response has no target"),
                },
                Err(e) => tracing::error!(%verb, url = %url, error = %e, "Network action failed"),
            }
        }));
    }

    fn render_response(&self, target: NodeId, template: Option<&str>, data: &Value) {
        let markup = match template.and_then(|name| self.inner.templates.get(name)) {
            Some(template) => template(data, self),
            None => codec::display(data),
        };
        self.host_mut().set_inner_html(target, &markup);
        self.scan(target);
        self.bind_actions(target);
    }
}

fn event_object(event: &Event) -> Value {
    json!({
        "type": event.kind(),
        "defaultPrevented": event.is_default_prevented(),
    })
}

/// Plain-object view of an element: tag, id, text, dataset and, for the
/// event target, the current `value`/`checked`.
fn node_object(host: &dyn MarkupHost, node: NodeId, event: Option<&Event>) -> Value {
    let mut dataset = Map::new();
    for name in host.attribute_names(node) {
        if let (Some(field), Some(raw)) = (dataset_field(&name), host.attribute(node, &name)) {
            dataset.insert(field, codec::decode(&raw));
        }
    }

    let mut object = Map::new();
    object.insert(
        "tagName".into(),
        host.tag_name(node)
            .map(|t| Value::String(t.to_ascii_uppercase()))
            .unwrap_or(Value::Null),
    );
    object.insert("id".into(), host.attribute(node, "id").map(Value::from).unwrap_or(Value::Null));
    object.insert("textContent".into(), Value::String(host.text_content(node)));
    object.insert("dataset".into(), Value::Object(dataset));
    if let Some(event) = event.filter(|e| e.target() == node) {
        if let Some(value) = event.value() {
            object.insert("value".into(), Value::from(value));
        }
        if let Some(checked) = event.checked() {
            object.insert("checked".into(), Value::Bool(checked));
        }
    }
    Value::Object(object)
}
