//! HTML-to-text extraction
//!
//! The page is parsed into a DOM, so nesting and character references resolve
//! the way a browser would resolve them. Elements that carry no readable
//! content are dropped with their whole subtree; the body's remaining text is
//! joined and its whitespace collapsed.

use scraper::{ElementRef, Html, Node};

/// Elements removed together with everything inside them
const STRIPPED_ELEMENTS: &[&str] = &[
    "head", "script", "style", "noscript", "iframe", "img", "svg", "nav", "header", "footer",
];

/// Elements that flow within a line. Every other element breaks words apart.
const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "cite", "code", "data", "dfn", "em", "i", "kbd", "mark", "q",
    "s", "samp", "small", "span", "strong", "sub", "sup", "time", "u", "var",
];

/// Extract the visible text of an HTML document
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = document.root_element();
    // The parser always synthesizes a body, even for bare fragments
    let body = root
        .children()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "body")
        .unwrap_or(root);

    let mut text = String::new();
    // `None` marks the end of a block element
    let mut stack: Vec<_> = body.children().rev().map(Some).collect();
    while let Some(entry) = stack.pop() {
        let Some(node) = entry else {
            text.push(' ');
            continue;
        };
        match node.value() {
            Node::Text(content) => text.push_str(content),
            Node::Element(element) => {
                let name = element.name();
                if STRIPPED_ELEMENTS.contains(&name) {
                    text.push(' ');
                    continue;
                }
                if !INLINE_ELEMENTS.contains(&name) {
                    text.push(' ');
                    stack.push(None);
                }
                stack.extend(node.children().rev().map(Some));
            }
            _ => {}
        }
    }

    collapse_whitespace(&text)
}

/// Keep at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
