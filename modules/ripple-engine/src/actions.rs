//! Caller-supplied handler and template tables, and the action declaration
//! grammar (`event->expr`, `name(arg, ...)`).

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::codec;
use crate::host::{Event, MarkupHost, NodeId};
use crate::store::Ripple;
use crate::transport::Verb;

/// Event handler invoked with the store handle and the triggering event.
pub type Handler = Rc<dyn Fn(&Ripple, &Event)>;

/// Computation (and `init`) invoked with the store handle only.
pub type Computation = Rc<dyn Fn(&Ripple)>;

/// Renders a value into markup.
pub type Template = Rc<dyn Fn(&Value, &Ripple) -> String>;

/// One entry of the action table.
#[derive(Clone)]
pub enum Action {
    /// Called as `handler(store, event)`.
    Handler(Handler),
    /// Called as `factory(args)(store, event)`; partial application of the
    /// arguments written in the declaration.
    Curried(Rc<dyn Fn(&[Value]) -> Handler>),
    /// Called as `computation(store)`; the only kind usable in
    /// `data-calculate`.
    Compute(Computation),
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Action::Handler(_) => "Action::Handler",
            Action::Curried(_) => "Action::Curried",
            Action::Compute(_) => "Action::Compute",
        })
    }
}

/// Action table: name → action, plus the optional `init` hook.
#[derive(Clone, Default)]
pub struct Actions {
    entries: HashMap<String, Action>,
    init: Option<Computation>,
}

impl Actions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, name: &str, handler: impl Fn(&Ripple, &Event) + 'static) -> Self {
        self.entries
            .insert(name.to_string(), Action::Handler(Rc::new(handler)));
        self
    }

    pub fn curried<F, H>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&[Value]) -> H + 'static,
        H: Fn(&Ripple, &Event) + 'static,
    {
        let curried: Rc<dyn Fn(&[Value]) -> Handler> =
            Rc::new(move |args: &[Value]| -> Handler { Rc::new(factory(args)) });
        self.entries
            .insert(name.to_string(), Action::Curried(curried));
        self
    }

    pub fn compute(mut self, name: &str, computation: impl Fn(&Ripple) + 'static) -> Self {
        self.entries
            .insert(name.to_string(), Action::Compute(Rc::new(computation)));
        self
    }

    /// Register an existing computation under another name. Both names share
    /// one calculation-graph entry.
    pub fn alias(mut self, name: &str, existing: &str) -> Self {
        if let Some(action) = self.entries.get(existing).cloned() {
            self.entries.insert(name.to_string(), action);
        }
        self
    }

    /// Hook run once after the mount scan.
    pub fn init(mut self, hook: impl Fn(&Ripple) + 'static) -> Self {
        self.init = Some(Rc::new(hook));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.entries.get(name)
    }

    pub(crate) fn init_hook(&self) -> Option<Computation> {
        self.init.clone()
    }
}

/// Template table, resolved by reaction key first, then by template name.
#[derive(Clone, Default)]
pub struct Templates {
    entries: HashMap<String, Template>,
}

impl Templates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, name: &str, template: impl Fn(&Value, &Ripple) -> String + 'static) -> Self {
        self.entries.insert(name.to_string(), Rc::new(template));
        self
    }

    pub fn get(&self, name: &str) -> Option<Template> {
        self.entries.get(name).cloned()
    }

    pub fn resolve(&self, key: Option<&str>, template_name: Option<&str>) -> Option<Template> {
        key.and_then(|k| self.get(k))
            .or_else(|| template_name.and_then(|t| self.get(t)))
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// Selector matching every element that declares an action.
pub const ACTION_SELECTOR: &str = "[data-action],[data-get],[data-post],[data-patch],[data-delete]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Local,
    Http(Verb),
}

/// A parsed action declaration on one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDeclaration {
    pub kind: ActionKind,
    pub event: String,
    pub expr: String,
}

impl ActionDeclaration {
    /// Read the first action marker present on `node` (`data-action`, then
    /// the HTTP verbs in order).
    pub fn read(host: &dyn MarkupHost, node: NodeId) -> Option<Self> {
        let (kind, raw) = host
            .attribute(node, "data-action")
            .map(|raw| (ActionKind::Local, raw))
            .or_else(|| {
                Verb::ALL.iter().find_map(|verb| {
                    host.attribute(node, verb.attribute())
                        .map(|raw| (ActionKind::Http(*verb), raw))
                })
            })?;

        let (event, expr) = match raw.split_once("->") {
            Some((event, expr)) => (event.trim().to_string(), expr.trim().to_string()),
            None => {
                let tag = host.tag_name(node).unwrap_or_default();
                (infer_event(&tag).to_string(), raw.trim().to_string())
            }
        };
        Some(Self { kind, event, expr })
    }
}

/// Default event for an element kind.
pub fn infer_event(tag: &str) -> &'static str {
    match tag.to_ascii_lowercase().as_str() {
        "form" => "submit",
        "input" | "textarea" => "input",
        "select" => "change",
        _ => "click",
    }
}

fn call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\w+)\((.*)\)$").expect("valid call pattern"))
}

/// Split an action expression into a name and, for call syntax, its decoded
/// arguments. `name()` yields an empty explicit argument list.
pub fn parse_action(expr: &str) -> (String, Option<Vec<Value>>) {
    let expr = expr.trim();
    let Some(caps) = call_pattern().captures(expr) else {
        return (expr.to_string(), None);
    };
    let name = caps[1].to_string();
    let inner = caps[2].trim();
    if inner.is_empty() {
        return (name, Some(Vec::new()));
    }
    let args = split_arguments(inner)
        .into_iter()
        .map(|arg| codec::decode(arg.trim()))
        .collect();
    (name, Some(args))
}

/// Split on commas that are not nested in brackets, braces or quotes.
fn split_arguments(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        if let Some(q) = quote {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                c if c == q => quote = None,
                _ => {}
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDocument;
    use serde_json::json;

    #[test]
    fn parses_bare_and_call_syntax() {
        assert_eq!(parse_action("increment"), ("increment".to_string(), None));
        assert_eq!(parse_action("reset()"), ("reset".to_string(), Some(vec![])));
        assert_eq!(
            parse_action(r#"add(5, "five", [1,2], {"a":1})"#),
            (
                "add".to_string(),
                Some(vec![json!(5), json!("five"), json!([1, 2]), json!({"a": 1})])
            )
        );
        assert_eq!(
            parse_action("greet(Ada)"),
            ("greet".to_string(), Some(vec![json!("Ada")]))
        );
    }

    #[test]
    fn non_call_expressions_stay_whole() {
        let (name, args) = parse_action("count = count + 1");
        assert_eq!(name, "count = count + 1");
        assert!(args.is_none());
    }

    #[test]
    fn infers_event_from_element_kind() {
        assert_eq!(infer_event("form"), "submit");
        assert_eq!(infer_event("INPUT"), "input");
        assert_eq!(infer_event("textarea"), "input");
        assert_eq!(infer_event("select"), "change");
        assert_eq!(infer_event("button"), "click");
    }

    #[test]
    fn reads_declarations() {
        let doc = MemoryDocument::parse(
            r#"<button id="a" data-action="increment"></button>
               <input id="b" data-action="keyup -> search">
               <div id="c" data-post="/items"></div>
               <div id="d" data-get="mouseover->/preview"></div>"#,
        );
        let root = doc.document();
        let read = |sel: &str| ActionDeclaration::read(&doc, doc.query(root, sel).unwrap()).unwrap();

        let a = read("#a");
        assert_eq!((a.kind, a.event.as_str(), a.expr.as_str()), (ActionKind::Local, "click", "increment"));
        let b = read("#b");
        assert_eq!((b.event.as_str(), b.expr.as_str()), ("keyup", "search"));
        let c = read("#c");
        assert_eq!((c.kind, c.event.as_str(), c.expr.as_str()), (ActionKind::Http(Verb::Post), "click", "/items"));
        let d = read("#d");
        assert_eq!((d.kind, d.event.as_str()), (ActionKind::Http(Verb::Get), "mouseover"));
    }

    #[test]
    fn templates_resolve_key_before_name() {
        let templates = Templates::new()
            .add("count", |_, _| "by-key".into())
            .add("badge", |_, _| "by-name".into());
        assert!(templates.resolve(Some("count"), Some("badge")).is_some());
        assert!(templates.resolve(Some("other"), Some("badge")).is_some());
        assert!(templates.resolve(Some("other"), None).is_none());
    }
}
