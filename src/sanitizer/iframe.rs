//! `<iframe>` to `amp-iframe` conversion.

use super::{Sanitizer, SanitizerArgs, enforce_https, filter_attributes, normalize_dimensions};
use crate::dom::{Document, Element, Node, Visit};
use crate::embed::Layout;
use crate::error::Result;
use crate::scripts::Scripts;

/// Sandbox given to iframes that declare none.
pub const DEFAULT_SANDBOX: &str = "allow-scripts allow-same-origin";

const ALLOWED_ATTRIBUTES: &[&str] = &[
    "src",
    "width",
    "height",
    "frameborder",
    "allowfullscreen",
    "allowtransparency",
    "sandbox",
    "class",
    "id",
    "title",
];

/// Converts `<iframe>` elements to `amp-iframe`.
///
/// Attributes outside the iframe allow-list (`scrolling`, `style`, handlers)
/// are dropped and fallback children discarded. A missing `sandbox` gets
/// [`DEFAULT_SANDBOX`]; an existing one is kept verbatim. Iframes without a
/// `src` are removed.
pub struct IframeSanitizer {
    args: SanitizerArgs,
}

impl IframeSanitizer {
    pub fn new(args: SanitizerArgs) -> Self {
        Self { args }
    }

    fn convert(&self, iframe: &Element, scripts: &mut Scripts) -> Visit {
        if iframe.attr("src").is_none_or(|s| s.trim().is_empty()) {
            tracing::debug!("Removing <iframe> without src");
            return Visit::Remove;
        }

        let mut attrs = filter_attributes(&iframe.attrs, ALLOWED_ATTRIBUTES);
        if self.args.enforce_https {
            if let Some(src) = attrs.get("src").map(enforce_https) {
                attrs.set("src", src);
            }
        }
        normalize_dimensions(&mut attrs, &self.args);
        if !attrs.contains("sandbox") {
            attrs.set("sandbox", DEFAULT_SANDBOX);
        }
        if attrs.contains("width") && attrs.contains("height") {
            attrs.set("layout", Layout::Responsive.as_str());
        }

        let mut converted = Element::new("amp-iframe");
        converted.attrs = attrs;
        scripts.require("amp-iframe");
        tracing::debug!("Converted <iframe> to <amp-iframe>");
        Visit::Replace(Node::Element(converted))
    }
}

impl Sanitizer for IframeSanitizer {
    fn name(&self) -> &'static str {
        "iframe"
    }

    fn sanitize(&self, doc: &mut Document, scripts: &mut Scripts) -> Result<()> {
        doc.walk(self.name(), |doc, id| {
            Ok(match doc.element(id) {
                Some(el) if el.name() == "iframe" => self.convert(el, scripts),
                _ => Visit::Keep,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run_with(args: SanitizerArgs, html: &str) -> (String, Scripts) {
        let mut doc = Document::parse(html);
        let scripts = IframeSanitizer::new(args).sanitize_document(&mut doc).unwrap();
        (doc.to_html(), scripts)
    }

    fn run(html: &str) -> (String, Scripts) {
        run_with(SanitizerArgs::default(), html)
    }

    #[test]
    fn default_sandbox_is_injected() {
        let (html, scripts) = run(r#"<iframe src="https://x"></iframe>"#);
        assert_eq!(
            html,
            r#"<amp-iframe src="https://x" sandbox="allow-scripts allow-same-origin"></amp-iframe>"#
        );
        assert!(scripts.contains("amp-iframe"));
    }

    #[test]
    fn explicit_sandbox_is_preserved() {
        let (html, _) = run(r#"<iframe src="https://x" sandbox="allow-same-origin"></iframe>"#);
        assert_eq!(
            html,
            r#"<amp-iframe src="https://x" sandbox="allow-same-origin"></amp-iframe>"#
        );
    }

    #[test]
    fn scrolling_and_fallback_are_dropped() {
        let (html, _) = run(
            r#"<iframe src="https://x" scrolling="no" width="640" height="360" frameborder="0">no frames</iframe>"#,
        );
        assert_eq!(
            html,
            r#"<amp-iframe src="https://x" width="640" height="360" frameborder="0" sandbox="allow-scripts allow-same-origin" layout="responsive"></amp-iframe>"#
        );
    }

    #[test]
    fn http_src_is_upgraded() {
        let (html, _) = run(r#"<iframe src="http://x/embed"></iframe>"#);
        assert!(html.contains(r#"src="https://x/embed""#));

        let mut args = SanitizerArgs::default();
        args.enforce_https = false;
        let (html, _) = run_with(args, r#"<iframe src="http://x/embed"></iframe>"#);
        assert!(html.contains(r#"src="http://x/embed""#));
    }

    #[test]
    fn iframe_without_src_is_removed() {
        let (html, scripts) = run(r#"<p><iframe width="10"></iframe></p>"#);
        assert_eq!(html, "<p></p>");
        assert!(scripts.is_empty());
    }
}
