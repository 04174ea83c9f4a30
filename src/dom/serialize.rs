//! HTML serialization of the document tree.

use ego_tree::NodeRef;
use ego_tree::iter::Edge;

use super::{Element, Node};

/// Elements whose text children are emitted verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "noscript", "plaintext",
];

/// Elements whose first newline is dropped by the parser.
const LEADING_NEWLINE_ELEMENTS: &[&str] = &["pre", "textarea", "listing"];

/// Elements rendered without an end tag. `</br>` re-parses as a second
/// `<br>`, so it is the one element that is never emitted as a pair.
const START_TAG_ONLY: &[&str] = &["br"];

pub(super) fn serialize(root: NodeRef<'_, Node>) -> String {
    let mut out = String::new();
    for edge in root.traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Fragment => {}
                Node::Element(el) => {
                    push_start_tag(el, &mut out);
                    let leading_newline = LEADING_NEWLINE_ELEMENTS.contains(&el.name())
                        && node
                            .first_child()
                            .is_some_and(|c| matches!(c.value(), Node::Text(t) if t.starts_with('\n')));
                    if leading_newline {
                        out.push('\n');
                    }
                }
                Node::Text(text) => {
                    let raw = node
                        .parent()
                        .and_then(|p| p.value().as_element())
                        .is_some_and(|p| RAW_TEXT_ELEMENTS.contains(&p.name()));
                    if raw {
                        out.push_str(text);
                    } else {
                        escape_text(text, &mut out);
                    }
                }
                Node::Comment(comment) => {
                    out.push_str("<!--");
                    out.push_str(comment);
                    out.push_str("-->");
                }
            },
            Edge::Close(node) => {
                if let Node::Element(el) = node.value() {
                    push_end_tag(el, &mut out);
                }
            }
        }
    }
    out
}

/// Render a childless element as an open/close pair.
///
/// ```
/// use amp_content::dom::{Element, element_html};
///
/// let el = Element::new("amp-vine").with_attr("data-vineid", "abc");
/// assert_eq!(element_html(&el), r#"<amp-vine data-vineid="abc"></amp-vine>"#);
/// ```
pub fn element_html(el: &Element) -> String {
    let mut out = String::new();
    push_start_tag(el, &mut out);
    push_end_tag(el, &mut out);
    out
}

fn push_start_tag(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(el.name());
    for (name, value) in el.attrs.iter() {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attr(value, out);
        out.push('"');
    }
    out.push('>');
}

fn push_end_tag(el: &Element, out: &mut String) {
    if START_TAG_ONLY.contains(&el.name()) {
        return;
    }
    out.push_str("</");
    out.push_str(el.name());
    out.push('>');
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}
