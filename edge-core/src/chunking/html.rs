//! HTML splitting along top-level `<body>` children.

use scraper::{ElementRef, Html, Node};

/// Serialize each top-level child of the document body.
///
/// Elements are emitted as their outer HTML. Text nodes directly under
/// `<body>` are kept (escaped) unless they are whitespace-only. Comments are
/// dropped.
pub fn split_children(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let document = Html::parse_document(text);
    let Some(body) = document
        .root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "body")
    else {
        return Vec::new();
    };

    body.children()
        .filter_map(|child| match child.value() {
            Node::Element(_) => ElementRef::wrap(child).map(|el| el.html()),
            Node::Text(t) if !t.trim().is_empty() => Some(escape_text(t)),
            _ => None,
        })
        .collect()
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}
