use ego_tree::NodeRef;
use scraper::{ElementRef, Node};

/// Markup of `node` itself; elements go through scraper's html5ever serializer.
pub(super) fn node(node: NodeRef<'_, Node>) -> String {
    if let Some(element) = ElementRef::wrap(node) {
        return element.html();
    }
    match node.value() {
        Node::Text(text) => escape_text(text),
        Node::Comment(comment) => format!("<!--{}-->", &**comment),
        Node::Document | Node::Fragment => children(node),
        _ => String::new(),
    }
}

/// Markup of the children of `node`.
pub(super) fn children(node: NodeRef<'_, Node>) -> String {
    if let Some(element) = ElementRef::wrap(node) {
        return element.inner_html();
    }
    node.children().map(self::node).collect()
}

// Same escaping html5ever applies to text outside elements.
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
    out
}
