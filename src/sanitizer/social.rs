//! Provider embed markup (`blockquote.instagram-media`, ...) to AMP components.

use std::sync::LazyLock;

use regex::Regex;

use super::{Sanitizer, SanitizerArgs};
use crate::dom::{Document, Element, NodeId, Visit};
use crate::embed::Provider;
use crate::error::{AmpError, Result};
use crate::matcher::{NodeMatcher, extract};
use crate::scripts::Scripts;

/// Where the identifier of an embed lives.
#[derive(Clone, Copy)]
enum IdSource {
    /// An attribute of the wrapper element.
    Attribute(&'static str),
    /// The `href` of the first matching link inside the wrapper.
    Link,
}

struct SocialRule {
    provider: Provider,
    tag: &'static str,
    class: &'static str,
    source: IdSource,
    /// The `id` group yields the identifier.
    pattern: &'static str,
}

const SOCIAL_RULES: &[SocialRule] = &[
    SocialRule {
        provider: Provider::Instagram,
        tag: "blockquote",
        class: "instagram-media",
        source: IdSource::Attribute("data-instgrm-permalink"),
        pattern: r"^(?:https?:)?//(?:[\w-]+\.)?instagr(?:\.am|am\.com)/(?:p|reel|tv)/(?P<id>[\w-]+)(?:[/?#]|$)",
    },
    SocialRule {
        provider: Provider::Twitter,
        tag: "blockquote",
        class: "twitter-tweet",
        source: IdSource::Link,
        pattern: r"^(?:https?:)?//(?:[\w-]+\.)?(?:twitter|x)\.com/\w{1,15}/status(?:es)?/(?P<id>\d+)(?:[/?#]|$)",
    },
    SocialRule {
        provider: Provider::Facebook,
        tag: "div",
        class: "fb-post",
        source: IdSource::Attribute("data-href"),
        pattern: r"^(?P<id>https?://(?:www\.)?facebook\.com/\S+)$",
    },
];

struct CompiledRule {
    rule: &'static SocialRule,
    matcher: NodeMatcher,
    pattern: Regex,
}

static COMPILED_RULES: LazyLock<Vec<CompiledRule>> = LazyLock::new(|| {
    SOCIAL_RULES
        .iter()
        .map(|rule| CompiledRule {
            rule,
            matcher: NodeMatcher::tag(rule.tag).class(rule.class),
            pattern: Regex::new(rule.pattern).expect("social embed pattern is valid"),
        })
        .collect()
});

impl CompiledRule {
    fn identifier(&self, doc: &Document, id: NodeId) -> Result<String> {
        let provider = self.rule.provider.name();
        let found = match self.rule.source {
            IdSource::Attribute(name) => {
                let value = doc
                    .element(id)
                    .and_then(|el| el.attr(name))
                    .ok_or_else(|| AmpError::extraction(provider, format!("missing {name}")))?;
                extract(&self.pattern, value.trim()).map(str::to_string)
            }
            IdSource::Link => doc
                .descendant_elements(id)
                .into_iter()
                .filter_map(|d| doc.element(d))
                .filter(|el| el.name() == "a")
                .filter_map(|el| el.attr("href"))
                .find_map(|href| extract(&self.pattern, href.trim()))
                .map(str::to_string),
        };
        found.ok_or_else(|| AmpError::extraction(provider, "no identifier in embed markup"))
    }
}

/// Replaces provider embed markup with the provider's AMP component.
///
/// Recognized wrappers:
///
/// - `<blockquote class="instagram-media" data-instgrm-permalink="…">` → `amp-instagram`
/// - `<blockquote class="twitter-tweet">` with a status link → `amp-twitter`
/// - `<div class="fb-post" data-href="…">` → `amp-facebook`
///
/// The whole wrapper subtree is replaced. When no identifier can be
/// extracted the wrapper is left untouched and no script is registered.
pub struct SocialEmbedSanitizer {
    args: SanitizerArgs,
}

impl SocialEmbedSanitizer {
    pub fn new(args: SanitizerArgs) -> Self {
        Self { args }
    }

    fn visit(&self, doc: &Document, id: NodeId, scripts: &mut Scripts) -> Visit {
        let Some(el) = doc.element(id) else {
            return Visit::Keep;
        };
        let Some(compiled) = COMPILED_RULES.iter().find(|c| c.matcher.matches(el)) else {
            return Visit::Keep;
        };
        let provider = compiled.rule.provider;

        match compiled.identifier(doc, id) {
            Ok(identifier) => {
                let mut component =
                    provider.component(&identifier, self.args.embed_dimensions(provider));
                carry_options(provider, el, &mut component);
                scripts.require(provider.slug());
                tracing::debug!("Converted {provider} embed {identifier} to <{}>", provider.slug());
                Visit::Replace(component.into())
            }
            Err(e) => {
                tracing::debug!("Leaving {provider} embed untouched: {e}");
                Visit::SkipChildren
            }
        }
    }
}

/// Provider options expressed on the wrapper that the component also supports.
fn carry_options(provider: Provider, wrapper: &Element, component: &mut Element) {
    if provider == Provider::Instagram && wrapper.attrs.contains("data-instgrm-captioned") {
        component.attrs.set("data-captioned", "");
    }
}

impl Sanitizer for SocialEmbedSanitizer {
    fn name(&self) -> &'static str {
        "social-embed"
    }

    fn sanitize(&self, doc: &mut Document, scripts: &mut Scripts) -> Result<()> {
        doc.walk(self.name(), |doc, id| Ok(self.visit(doc, id, scripts)))
    }
}
