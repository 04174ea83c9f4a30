//! Tag and attribute predicates used to pick nodes out of a [`Document`].
//!
//! Matching is pure: nothing here mutates the tree.
//!
//! [`Document`]: crate::dom::Document

use regex::Regex;

use crate::dom::Element;

/// URL schemes that can execute script when followed or loaded.
pub const DANGEROUS_SCHEMES: &[&str] = &["javascript", "vbscript", "data"];

/// A single attribute test.
#[derive(Clone, Debug)]
pub enum AttrPredicate {
    /// The attribute is present, whatever its value.
    Present(String),
    /// The attribute equals the given value exactly.
    Equals(String, String),
    /// The attribute value starts with the given prefix.
    Prefix(String, String),
    /// The `class` attribute contains the given token.
    HasClass(String),
    /// The attribute is a URL whose scheme is one of the given schemes.
    Scheme(String, Vec<String>),
    /// The attribute value matches the pattern somewhere.
    Pattern(String, Regex),
}

impl AttrPredicate {
    pub fn test(&self, el: &Element) -> bool {
        match self {
            AttrPredicate::Present(name) => el.attrs.contains(name),
            AttrPredicate::Equals(name, value) => el.attr(name) == Some(value.as_str()),
            AttrPredicate::Prefix(name, prefix) => {
                el.attr(name).is_some_and(|v| v.starts_with(prefix.as_str()))
            }
            AttrPredicate::HasClass(class) => el.has_class(class),
            AttrPredicate::Scheme(name, schemes) => el
                .attr(name)
                .and_then(url_scheme)
                .is_some_and(|scheme| schemes.iter().any(|s| *s == scheme)),
            AttrPredicate::Pattern(name, re) => el.attr(name).is_some_and(|v| re.is_match(v)),
        }
    }
}

/// A tag name plus attribute predicates that must all hold.
///
/// ```
/// use amp_content::dom::Element;
/// use amp_content::matcher::NodeMatcher;
///
/// let matcher = NodeMatcher::tag("blockquote").class("instagram-media");
/// let el = Element::new("BLOCKQUOTE").with_attr("class", "instagram-media");
/// assert!(matcher.matches(&el));
/// ```
#[derive(Clone, Debug)]
pub struct NodeMatcher {
    tag: String,
    predicates: Vec<AttrPredicate>,
}

impl NodeMatcher {
    /// Match elements named `tag` (case-insensitive). `"*"` matches any tag.
    pub fn tag(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            predicates: Vec::new(),
        }
    }

    pub fn with(mut self, predicate: AttrPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn class(self, class: &str) -> Self {
        self.with(AttrPredicate::HasClass(class.to_string()))
    }

    pub fn has_attr(self, name: &str) -> Self {
        self.with(AttrPredicate::Present(name.to_string()))
    }

    pub fn attr_eq(self, name: &str, value: &str) -> Self {
        self.with(AttrPredicate::Equals(name.to_string(), value.to_string()))
    }

    pub fn matches(&self, el: &Element) -> bool {
        matches(el, &self.tag, &self.predicates)
    }
}

/// Test `el` against a tag name and a set of attribute predicates.
pub fn matches(el: &Element, tag: &str, predicates: &[AttrPredicate]) -> bool {
    (tag == "*" || el.name().eq_ignore_ascii_case(tag)) && predicates.iter().all(|p| p.test(el))
}

/// The lowercased scheme of a URL, or `None` for relative URLs.
///
/// Whitespace and control characters are ignored the way browsers ignore
/// them, so `" java\tscript:x"` yields `javascript`.
pub fn url_scheme(value: &str) -> Option<String> {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect();
    let end = cleaned.find([':', '/', '?', '#'])?;
    if cleaned[end..].starts_with(':') && end > 0 {
        let scheme = &cleaned[..end];
        let valid = scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        valid.then(|| scheme.to_ascii_lowercase())
    } else {
        None
    }
}

/// Whether a URL uses any of [`DANGEROUS_SCHEMES`].
pub fn is_dangerous_url(value: &str) -> bool {
    url_scheme(value).is_some_and(|scheme| DANGEROUS_SCHEMES.contains(&scheme.as_str()))
}

/// First capture group of `re` in `value` (or the whole match when the
/// pattern has no groups).
pub fn extract<'a>(re: &Regex, value: &'a str) -> Option<&'a str> {
    let caps = re.captures(value)?;
    caps.name("id")
        .or_else(|| caps.get(1))
        .or_else(|| caps.get(0))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
}
