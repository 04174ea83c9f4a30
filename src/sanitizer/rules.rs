//! The tag/attribute whitelist rule table.
//!
//! The built-in AMP table is built once, on first use, and shared read-only
//! through an [`Arc`]. Hosts that need a different table derive one with
//! [`WhitelistRules::amp_builder`] and hand it to the whitelist pass.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use crate::matcher::url_scheme;

/// Attributes that are never kept, whatever a table says.
const ALWAYS_DENIED: &[&str] = &["style"];

const HREF_SCHEMES: &[&str] = &[
    "http", "https", "mailto", "tel", "sms", "ftp", "fb-messenger", "whatsapp",
];
const SRC_SCHEMES: &[&str] = &["http", "https"];
const IMAGE_SRC_SCHEMES: &[&str] = &["http", "https", "data"];
const SECURE_SRC_SCHEMES: &[&str] = &["https"];

const LAYOUTS: &[&str] = &[
    "nodisplay",
    "fixed",
    "responsive",
    "fixed-height",
    "fill",
    "container",
    "flex-item",
    "intrinsic",
];

const GLOBAL_ATTRIBUTES: &[&str] = &[
    "id", "class", "title", "lang", "dir", "hidden", "tabindex", "role", "translate",
    "itemscope", "itemtype", "itemprop", "itemid", "itemref",
];

const FLOW_TAGS: &[&str] = &[
    "a", "abbr", "address", "article", "aside", "b", "bdi", "bdo", "blockquote", "caption",
    "cite", "code", "colgroup", "dd", "del", "dfn", "div", "dl", "dt", "em", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "i", "ins", "kbd", "li",
    "main", "mark", "nav", "ol", "p", "pre", "q", "rp", "rt", "ruby", "s", "samp", "section",
    "small", "span", "strong", "sub", "sup", "table", "tbody", "td", "tfoot", "th", "thead",
    "time", "tr", "u", "ul", "var",
];

const VOID_TAGS: &[&str] = &["br", "hr", "wbr", "col", "source", "track"];

const RESCUED_TAGS: &[&str] = &[
    "font", "center", "big", "tt", "strike", "nobr", "blink", "acronym",
];

const EMBED_COMPONENTS: &[&str] = &[
    "amp-youtube",
    "amp-vimeo",
    "amp-twitter",
    "amp-instagram",
    "amp-vine",
    "amp-facebook",
];

const LAYOUT_ATTRIBUTES: &[&str] = &["heights", "sizes"];

/// Constraint a kept attribute's value must satisfy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueConstraint {
    /// Relative URL, or absolute with one of these schemes.
    Url(Vec<String>),
    /// One of these keywords (ASCII case-insensitive).
    OneOf(Vec<String>),
    /// Pixel length or `auto`.
    Dimension,
}

impl ValueConstraint {
    pub fn url(schemes: &[&str]) -> Self {
        ValueConstraint::Url(schemes.iter().map(|s| s.to_string()).collect())
    }

    pub fn one_of(values: &[&str]) -> Self {
        ValueConstraint::OneOf(values.iter().map(|s| s.to_string()).collect())
    }

    pub fn allows(&self, value: &str) -> bool {
        match self {
            ValueConstraint::Url(schemes) => match url_scheme(value) {
                Some(scheme) => schemes.contains(&scheme),
                None => true,
            },
            ValueConstraint::OneOf(values) => {
                let value = value.trim();
                values.iter().any(|v| v.eq_ignore_ascii_case(value))
            }
            ValueConstraint::Dimension => {
                let value = value.trim();
                value.eq_ignore_ascii_case("auto")
                    || value
                        .strip_suffix("px")
                        .unwrap_or(value)
                        .parse::<f64>()
                        .is_ok_and(|px| px.is_finite() && px >= 0.0)
            }
        }
    }
}

/// What to do with an attribute whose value breaks its constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    /// Remove the attribute.
    Strip,
    /// Keep the attribute with this value instead.
    Replace(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum AttrName {
    Exact(String),
    Prefix(String),
}

/// One allowed attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttrRule {
    name: AttrName,
    constraint: Option<ValueConstraint>,
    on_violation: Violation,
}

impl AttrRule {
    pub fn named(name: &str) -> Self {
        Self {
            name: AttrName::Exact(name.to_ascii_lowercase()),
            constraint: None,
            on_violation: Violation::Strip,
        }
    }

    /// Any attribute whose name starts with `prefix`.
    pub fn prefixed(prefix: &str) -> Self {
        Self {
            name: AttrName::Prefix(prefix.to_ascii_lowercase()),
            constraint: None,
            on_violation: Violation::Strip,
        }
    }

    pub fn constrained(mut self, constraint: ValueConstraint, on_violation: Violation) -> Self {
        self.constraint = Some(constraint);
        self.on_violation = on_violation;
        self
    }

    fn applies_to(&self, name: &str) -> bool {
        match &self.name {
            AttrName::Exact(exact) => exact.eq_ignore_ascii_case(name),
            AttrName::Prefix(prefix) => name.to_ascii_lowercase().starts_with(prefix.as_str()),
        }
    }

    fn decide(&self, value: &str) -> AttrDecision {
        match &self.constraint {
            Some(constraint) if !constraint.allows(value) => match &self.on_violation {
                Violation::Strip => AttrDecision::Drop,
                Violation::Replace(replacement) => AttrDecision::Rewrite(replacement.clone()),
            },
            _ => AttrDecision::Keep,
        }
    }
}

/// Rule record for one allowed tag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagRule {
    attributes: Vec<AttrRule>,
    self_closing: bool,
}

impl TagRule {
    /// Void element: any children it acquires are dropped.
    pub fn is_self_closing(&self) -> bool {
        self.self_closing
    }
}

/// Verdict for one attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrDecision {
    Keep,
    Drop,
    Rewrite(String),
}

/// Which tags survive, and with which attributes.
#[derive(Clone, Debug, Default)]
pub struct WhitelistRules {
    tags: HashMap<String, TagRule>,
    global: Vec<AttrRule>,
    rescued: HashSet<String>,
}

static AMP_RULES: LazyLock<Arc<WhitelistRules>> = LazyLock::new(|| Arc::new(amp_rules()));

impl WhitelistRules {
    /// The shared AMP rule table.
    pub fn amp() -> Arc<WhitelistRules> {
        Arc::clone(&AMP_RULES)
    }

    /// An empty table.
    pub fn builder() -> WhitelistRulesBuilder {
        WhitelistRulesBuilder {
            rules: WhitelistRules::default(),
        }
    }

    /// A builder seeded with the AMP table.
    pub fn amp_builder() -> WhitelistRulesBuilder {
        WhitelistRulesBuilder {
            rules: WhitelistRules::clone(&AMP_RULES),
        }
    }

    pub fn tag(&self, name: &str) -> Option<&TagRule> {
        self.tags.get(&name.to_ascii_lowercase())
    }

    /// Disallowed tags whose children are kept in their place.
    pub fn is_rescued(&self, name: &str) -> bool {
        self.rescued.contains(&name.to_ascii_lowercase())
    }

    /// Decide the fate of attribute `name="value"` on `tag`.
    pub fn check_attribute(&self, tag: &str, name: &str, value: &str) -> AttrDecision {
        if is_event_handler(name) || ALWAYS_DENIED.iter().any(|d| d.eq_ignore_ascii_case(name)) {
            return AttrDecision::Drop;
        }
        let Some(rule) = self.tag(tag) else {
            return AttrDecision::Drop;
        };
        rule.attributes
            .iter()
            .chain(self.global.iter())
            .find(|r| r.applies_to(name))
            .map_or(AttrDecision::Drop, |r| r.decide(value))
    }
}

/// `onclick`, `onload`, ... (but not AMP's bare `on`).
fn is_event_handler(name: &str) -> bool {
    name.len() > 2 && name.get(..2).is_some_and(|p| p.eq_ignore_ascii_case("on"))
}

/// Fluent builder for [`WhitelistRules`].
pub struct WhitelistRulesBuilder {
    rules: WhitelistRules,
}

impl WhitelistRulesBuilder {
    pub fn allow_tag(mut self, tag: &str) -> Self {
        let tag = tag.to_ascii_lowercase();
        self.rules.rescued.remove(&tag);
        self.rules.tags.entry(tag).or_default();
        self
    }

    pub fn allow_void_tag(self, tag: &str) -> Self {
        let mut this = self.allow_tag(tag);
        if let Some(rule) = this.rules.tags.get_mut(&tag.to_ascii_lowercase()) {
            rule.self_closing = true;
        }
        this
    }

    pub fn allow_attribute(self, tag: &str, name: &str) -> Self {
        self.allow_attribute_rule(tag, AttrRule::named(name))
    }

    /// Allow an attribute on `tag`, adding `tag` if needed. A rule for the
    /// same name replaces the previous one.
    pub fn allow_attribute_rule(self, tag: &str, rule: AttrRule) -> Self {
        let mut this = self.allow_tag(tag);
        if let Some(tag_rule) = this.rules.tags.get_mut(&tag.to_ascii_lowercase()) {
            tag_rule.attributes.retain(|r| r.name != rule.name);
            tag_rule.attributes.push(rule);
        }
        this
    }

    pub fn allow_global_attribute(mut self, rule: AttrRule) -> Self {
        self.rules.global.retain(|r| r.name != rule.name);
        self.rules.global.push(rule);
        self
    }

    pub fn disallow_tag(mut self, tag: &str) -> Self {
        self.rules.tags.remove(&tag.to_ascii_lowercase());
        self
    }

    /// Strip `tag` itself but keep its children.
    pub fn rescue_tag(mut self, tag: &str) -> Self {
        let tag = tag.to_ascii_lowercase();
        self.rules.tags.remove(&tag);
        self.rules.rescued.insert(tag);
        self
    }

    pub fn build(self) -> WhitelistRules {
        self.rules
    }
}

fn url_attr(name: &str, schemes: &[&str]) -> AttrRule {
    AttrRule::named(name).constrained(ValueConstraint::url(schemes), Violation::Strip)
}

fn dimension_attr(name: &str) -> AttrRule {
    AttrRule::named(name).constrained(ValueConstraint::Dimension, Violation::Strip)
}

fn layout_attr() -> AttrRule {
    AttrRule::named("layout").constrained(ValueConstraint::one_of(LAYOUTS), Violation::Strip)
}

/// `width`, `height`, `layout`, `heights` and `sizes` for an AMP component.
fn component(builder: WhitelistRulesBuilder, tag: &str) -> WhitelistRulesBuilder {
    let mut b = builder
        .allow_attribute_rule(tag, dimension_attr("width"))
        .allow_attribute_rule(tag, dimension_attr("height"))
        .allow_attribute_rule(tag, layout_attr());
    for name in LAYOUT_ATTRIBUTES {
        b = b.allow_attribute(tag, name);
    }
    b
}

fn with_attributes(mut b: WhitelistRulesBuilder, tag: &str, names: &[&str]) -> WhitelistRulesBuilder {
    for name in names {
        b = b.allow_attribute(tag, name);
    }
    b
}

fn amp_rules() -> WhitelistRules {
    let mut b = WhitelistRules::builder();

    for name in GLOBAL_ATTRIBUTES {
        b = b.allow_global_attribute(AttrRule::named(name));
    }
    b = b
        .allow_global_attribute(AttrRule::prefixed("aria-"))
        .allow_global_attribute(AttrRule::prefixed("data-"));

    for tag in FLOW_TAGS {
        b = b.allow_tag(tag);
    }
    for tag in VOID_TAGS {
        b = b.allow_void_tag(tag);
    }
    for tag in RESCUED_TAGS {
        b = b.rescue_tag(tag);
    }

    b = b
        .allow_attribute_rule("a", url_attr("href", HREF_SCHEMES))
        .allow_attribute_rule(
            "a",
            AttrRule::named("target").constrained(
                ValueConstraint::one_of(&["_blank", "_self", "_top"]),
                Violation::Replace("_blank".into()),
            ),
        );
    b = with_attributes(b, "a", &["rel", "name", "hreflang", "type"]);

    for tag in ["blockquote", "q", "del", "ins"] {
        b = b.allow_attribute_rule(tag, url_attr("cite", SRC_SCHEMES));
    }
    for tag in ["del", "ins", "time"] {
        b = b.allow_attribute(tag, "datetime");
    }
    b = with_attributes(b, "ol", &["start", "reversed", "type"]);
    b = b.allow_attribute("li", "value");
    b = b.allow_attribute("table", "summary");
    for tag in ["td", "th"] {
        b = with_attributes(b, tag, &["colspan", "rowspan", "headers", "abbr"]);
    }
    b = b.allow_attribute("th", "scope");
    for tag in ["col", "colgroup"] {
        b = b.allow_attribute(tag, "span");
    }

    b = b.allow_attribute_rule("source", url_attr("src", SRC_SCHEMES));
    b = with_attributes(b, "source", &["type", "media", "srcset"]);
    b = b.allow_attribute_rule("track", url_attr("src", SRC_SCHEMES));
    b = with_attributes(b, "track", &["kind", "srclang", "label", "default"]);

    for tag in ["amp-img", "amp-anim"] {
        b = component(b, tag).allow_attribute_rule(tag, url_attr("src", IMAGE_SRC_SCHEMES));
        b = with_attributes(b, tag, &["srcset", "alt", "attribution", "noloading"]);
    }

    b = component(b, "amp-iframe").allow_attribute_rule("amp-iframe", url_attr("src", SECURE_SRC_SCHEMES));
    b = with_attributes(
        b,
        "amp-iframe",
        &[
            "sandbox",
            "frameborder",
            "allowfullscreen",
            "allowtransparency",
            "referrerpolicy",
            "resizable",
        ],
    );

    for tag in ["amp-video", "amp-audio"] {
        b = component(b, tag).allow_attribute_rule(tag, url_attr("src", SECURE_SRC_SCHEMES));
        b = with_attributes(b, tag, &["autoplay", "controls", "loop", "muted"]);
    }
    b = b.allow_attribute_rule("amp-video", url_attr("poster", SRC_SCHEMES));

    for tag in EMBED_COMPONENTS {
        b = component(b, tag);
    }

    b = component(b, "amp-carousel").allow_attribute_rule(
        "amp-carousel",
        AttrRule::named("type").constrained(
            ValueConstraint::one_of(&["carousel", "slides"]),
            Violation::Strip,
        ),
    );
    b = with_attributes(b, "amp-carousel", &["controls", "loop", "autoplay", "delay"]);

    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amp_table_is_shared() {
        let a = WhitelistRules::amp();
        let b = WhitelistRules::amp();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn disallowed_tags_have_no_rule() {
        let rules = WhitelistRules::amp();
        for tag in ["script", "style", "input", "form", "img", "iframe", "object", "embed"] {
            assert!(rules.tag(tag).is_none(), "{tag} should not be allowed");
        }
        assert!(rules.tag("P").is_some());
        assert!(rules.tag("amp-img").is_some());
    }

    #[test]
    fn void_tags_are_self_closing() {
        let rules = WhitelistRules::amp();
        assert!(rules.tag("br").is_some_and(TagRule::is_self_closing));
        assert!(rules.tag("p").is_some_and(|r| !r.is_self_closing()));
    }

    #[test]
    fn style_and_event_handlers_always_drop() {
        let rules = WhitelistRules::amp();
        assert_eq!(rules.check_attribute("div", "style", "color:red"), AttrDecision::Drop);
        assert_eq!(rules.check_attribute("a", "onclick", "x()"), AttrDecision::Drop);
        assert_eq!(rules.check_attribute("a", "ONLOAD", "x()"), AttrDecision::Drop);

        let permissive = WhitelistRules::builder()
            .allow_attribute("div", "style")
            .allow_global_attribute(AttrRule::prefixed("on"))
            .build();
        assert_eq!(permissive.check_attribute("div", "style", "x"), AttrDecision::Drop);
        assert_eq!(permissive.check_attribute("div", "onclick", "x"), AttrDecision::Drop);
    }

    #[test]
    fn global_and_prefixed_attributes() {
        let rules = WhitelistRules::amp();
        assert_eq!(rules.check_attribute("span", "class", "x"), AttrDecision::Keep);
        assert_eq!(rules.check_attribute("span", "data-foo", "x"), AttrDecision::Keep);
        assert_eq!(rules.check_attribute("span", "aria-label", "x"), AttrDecision::Keep);
        assert_eq!(rules.check_attribute("span", "href", "/x"), AttrDecision::Drop);
    }

    #[test]
    fn href_scheme_policy() {
        let rules = WhitelistRules::amp();
        assert_eq!(rules.check_attribute("a", "href", "javascript:alert(1)"), AttrDecision::Drop);
        assert_eq!(rules.check_attribute("a", "href", "vbscript:x"), AttrDecision::Drop);
        assert_eq!(rules.check_attribute("a", "href", "data:text/html,x"), AttrDecision::Drop);
        assert_eq!(rules.check_attribute("a", "href", "https://x"), AttrDecision::Keep);
        assert_eq!(rules.check_attribute("a", "href", "mailto:a@b"), AttrDecision::Keep);
        assert_eq!(rules.check_attribute("a", "href", "/about"), AttrDecision::Keep);
    }

    #[test]
    fn data_uris_only_for_images() {
        let rules = WhitelistRules::amp();
        let png = "data:image/png;base64,AAAA";
        assert_eq!(rules.check_attribute("amp-img", "src", png), AttrDecision::Keep);
        assert_eq!(rules.check_attribute("amp-iframe", "src", png), AttrDecision::Drop);
    }

    #[test]
    fn target_is_neutralized() {
        let rules = WhitelistRules::amp();
        assert_eq!(
            rules.check_attribute("a", "target", "_parent"),
            AttrDecision::Rewrite("_blank".into())
        );
        assert_eq!(rules.check_attribute("a", "target", "_self"), AttrDecision::Keep);
    }

    #[test]
    fn layout_and_dimension_constraints() {
        let rules = WhitelistRules::amp();
        assert_eq!(rules.check_attribute("amp-img", "layout", "responsive"), AttrDecision::Keep);
        assert_eq!(rules.check_attribute("amp-img", "layout", "bogus"), AttrDecision::Drop);
        assert_eq!(rules.check_attribute("amp-img", "width", "100"), AttrDecision::Keep);
        assert_eq!(rules.check_attribute("amp-img", "height", "auto"), AttrDecision::Keep);
        assert_eq!(rules.check_attribute("amp-img", "width", "wide"), AttrDecision::Drop);
    }

    #[test]
    fn builder_derives_custom_table() {
        let rules = WhitelistRules::amp_builder()
            .allow_attribute("p", "align")
            .disallow_tag("table")
            .rescue_tag("mark")
            .build();
        assert_eq!(rules.check_attribute("p", "align", "left"), AttrDecision::Keep);
        assert!(rules.tag("table").is_none());
        assert!(rules.is_rescued("mark"));
        assert!(WhitelistRules::amp().tag("table").is_some());
    }

    #[test]
    fn presentational_wrappers_are_rescued() {
        let rules = WhitelistRules::amp();
        assert!(rules.is_rescued("font"));
        assert!(rules.is_rescued("CENTER"));
        assert!(!rules.is_rescued("script"));
    }
}
