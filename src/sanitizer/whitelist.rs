//! Tag/attribute whitelist enforcement.

use std::sync::Arc;

use super::Sanitizer;
use super::rules::{AttrDecision, WhitelistRules};
use crate::dom::{Document, Node, NodeId, Visit};
use crate::error::Result;
use crate::scripts::Scripts;

/// Sanitizer that drops everything the [`WhitelistRules`] table does not allow.
///
/// Disallowed tags are removed with their whole subtree, except rescued
/// presentational wrappers which are replaced by their children. Comments
/// are removed. Surviving elements keep only allowed attributes, with
/// constrained values checked and stripped or rewritten per rule.
///
/// # Example
///
/// ```
/// use amp_content::{Sanitizer, WhitelistSanitizer};
/// use amp_content::dom::Document;
///
/// let mut doc = Document::parse(r#"<a href="javascript:alert('x')">Click</a><script>alert(1)</script>"#);
/// WhitelistSanitizer::default().sanitize_document(&mut doc).unwrap();
/// assert_eq!(doc.to_html(), "<a>Click</a>");
/// ```
pub struct WhitelistSanitizer {
    rules: Arc<WhitelistRules>,
}

impl WhitelistSanitizer {
    pub fn new(rules: Arc<WhitelistRules>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &WhitelistRules {
        &self.rules
    }

    fn visit(&self, doc: &mut Document, id: NodeId) -> Visit {
        let tag = match doc.get(id).map(|node| node.value()) {
            Some(Node::Element(el)) => el.name().to_string(),
            Some(Node::Comment(_)) => return Visit::Remove,
            _ => return Visit::Keep,
        };

        let Some(rule) = self.rules.tag(&tag) else {
            if self.rules.is_rescued(&tag) {
                tracing::debug!("Unwrapping disallowed <{tag}>");
                return Visit::Unwrap;
            }
            tracing::debug!("Stripping disallowed <{tag}>");
            return Visit::Remove;
        };

        doc.with_element_mut(id, |el| {
            el.attrs.retain(|name, value| match self.rules.check_attribute(&tag, name, value) {
                AttrDecision::Keep => true,
                AttrDecision::Drop => {
                    tracing::trace!("Stripping attribute {name} from <{tag}>");
                    false
                }
                AttrDecision::Rewrite(replacement) => {
                    tracing::trace!("Rewriting attribute {name} on <{tag}>");
                    *value = replacement;
                    true
                }
            });
        });

        if rule.is_self_closing() {
            for child in doc.children(id) {
                doc.remove(child);
            }
            return Visit::SkipChildren;
        }
        Visit::Keep
    }
}

impl Default for WhitelistSanitizer {
    fn default() -> Self {
        Self::new(WhitelistRules::amp())
    }
}

impl Sanitizer for WhitelistSanitizer {
    fn name(&self) -> &'static str {
        "whitelist"
    }

    fn sanitize(&self, doc: &mut Document, _scripts: &mut Scripts) -> Result<()> {
        doc.walk(self.name(), |doc, id| Ok(self.visit(doc, id)))
    }
}
