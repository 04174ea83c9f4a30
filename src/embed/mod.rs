//! String-level embed detection, run before the content is parsed.
//!
//! A detector recognizes a provider URL standing alone on its own line, or a
//! `[name …]` shortcode token, and substitutes the provider's AMP component.
//! Identifiers are matched strictly: a token whose identifier is missing or
//! malformed is left exactly as it was.
//!
//! Providers are described by one data record each (see [`Provider`] and the
//! pattern table below); [`ProviderDetector`] turns a record into a detector.

mod provider;

use std::sync::LazyLock;

use regex::{Captures, Regex};

pub use provider::{EmbedDimensions, Layout, Provider};

use crate::dom::element_html;
use crate::error::{AmpError, Result};
use crate::matcher::extract;
use crate::sanitizer::SanitizerArgs;
use crate::scripts::Scripts;

/// Replacement produced for one recognized token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbedMatch {
    pub markup: String,
    pub scripts: Scripts,
}

/// A pluggable, string-level embed recognizer.
pub trait EmbedDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Return `content` with every recognized token replaced, registering the
    /// scripts the replacements need.
    fn detect(&self, content: &str, scripts: &mut Scripts) -> String;
}

struct ProviderPatterns {
    /// Applied to a candidate URL; the `id` group yields the identifier.
    /// Each pattern requires the identifier to end at a URL delimiter.
    url: &'static str,
    shortcode: Option<&'static str>,
    /// Full-token format of a bare identifier passed to the shortcode.
    id: Option<&'static str>,
}

impl ProviderPatterns {
    fn of(provider: Provider) -> Self {
        match provider {
            Provider::Twitter => Self {
                url: r"^https?://(?:www\.|mobile\.)?(?:twitter|x)\.com/\w{1,15}/status(?:es)?/(?P<id>\d+)(?:[/?#]|$)",
                shortcode: Some("tweet"),
                id: Some(r"^\d+$"),
            },
            Provider::YouTube => Self {
                url: r"^https?://(?:www\.|m\.)?(?:youtube\.com/(?:watch\?(?:[^#\s]*&)?v=|embed/)|youtu\.be/)(?P<id>[\w-]{11})(?:[/?#&]|$)",
                shortcode: Some("youtube"),
                id: Some(r"^[\w-]{11}$"),
            },
            Provider::Vimeo => Self {
                url: r"^https?://(?:www\.)?vimeo\.com/(?:video/)?(?P<id>\d+)(?:[/?#]|$)",
                shortcode: Some("vimeo"),
                id: Some(r"^\d+$"),
            },
            Provider::Instagram => Self {
                url: r"^https?://(?:www\.)?instagr(?:\.am|am\.com)/(?:p|reel)/(?P<id>[\w-]+)(?:[/?#]|$)",
                shortcode: Some("instagram"),
                id: Some(r"^[\w-]+$"),
            },
            Provider::Vine => Self {
                url: r"^https?://(?:www\.)?vine\.co/v/(?P<id>[A-Za-z0-9]+)(?:[/?#]|$)",
                shortcode: Some("vine"),
                id: Some(r"^[A-Za-z0-9]+$"),
            },
            Provider::Facebook => Self {
                url: r"^(?P<id>https?://(?:www\.)?facebook\.com/[^/\s]+/(?:posts|videos)/\d+/?)(?:[?#]|$)",
                shortcode: None,
                id: None,
            },
        }
    }
}

/// A URL that is the only thing on its line.
static OWN_LINE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*(https?://[^\s<>"']+)[ \t]*\r?$"#)
        .expect("OWN_LINE_URL: hardcoded regex is valid")
});

/// First argument of a shortcode, optionally as `id=` or `url=`.
static SHORTCODE_ARG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:(?:id|url)\s*=\s*)?["']?([^"'\s\]]+)["']?"#)
        .expect("SHORTCODE_ARG: hardcoded regex is valid")
});

struct CompiledPatterns {
    url: Regex,
    shortcode: Option<Regex>,
    id: Option<Regex>,
}

impl CompiledPatterns {
    fn compile(p: &ProviderPatterns) -> Self {
        Self {
            url: Regex::new(p.url).expect("provider url pattern is valid"),
            shortcode: p.shortcode.map(|name| {
                Regex::new(&format!(r"\[{}(?P<args>\s[^\]]*)?\]", regex::escape(name)))
                    .expect("provider shortcode pattern is valid")
            }),
            id: p
                .id
                .map(|id| Regex::new(id).expect("provider id pattern is valid")),
        }
    }
}

/// Table-driven detector for one [`Provider`].
pub struct ProviderDetector {
    provider: Provider,
    dimensions: EmbedDimensions,
    patterns: CompiledPatterns,
}

impl ProviderDetector {
    /// Detector for `provider` using its built-in patterns.
    pub fn new(provider: Provider, dimensions: EmbedDimensions) -> Self {
        Self {
            provider,
            dimensions,
            patterns: CompiledPatterns::compile(&ProviderPatterns::of(provider)),
        }
    }

    /// Replace the URL pattern. The pattern must capture the identifier in a
    /// group named `id` (or the first group).
    pub fn try_with_url_pattern(mut self, pattern: &str) -> Result<Self> {
        self.patterns.url = Regex::new(pattern)?;
        Ok(self)
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    fn embed(&self, id: &str) -> EmbedMatch {
        let mut scripts = Scripts::new();
        scripts.require(self.provider.slug());
        EmbedMatch {
            markup: element_html(&self.provider.component(id, self.dimensions)),
            scripts,
        }
    }

    /// Convert a standalone URL, or `None` if it is not this provider's.
    pub fn match_url(&self, url: &str) -> Option<EmbedMatch> {
        extract(&self.patterns.url, url.trim()).map(|id| self.embed(id))
    }

    /// Convert the argument string of this provider's shortcode.
    pub fn match_shortcode(&self, args: Option<&str>) -> Result<EmbedMatch> {
        let provider = self.provider.name();
        let token = args
            .and_then(|args| SHORTCODE_ARG.captures(args))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| AmpError::extraction(provider, "shortcode has no identifier"))?;

        if self.patterns.id.as_ref().is_some_and(|re| re.is_match(token)) {
            return Ok(self.embed(token));
        }
        extract(&self.patterns.url, token)
            .map(|id| self.embed(id))
            .ok_or_else(|| AmpError::extraction(provider, format!("`{token}` is not a valid identifier")))
    }
}

impl EmbedDetector for ProviderDetector {
    fn name(&self) -> &'static str {
        self.provider.name()
    }

    fn detect(&self, content: &str, scripts: &mut Scripts) -> String {
        let content = OWN_LINE_URL.replace_all(content, |caps: &Captures| {
            if inside_tag(content, caps) {
                return caps[0].to_string();
            }
            match self.match_url(&caps[1]) {
                Some(found) => {
                    tracing::debug!("Detected {} embed from URL {}", self.provider, &caps[1]);
                    scripts.merge(found.scripts);
                    found.markup
                }
                None => caps[0].to_string(),
            }
        });

        let Some(shortcode) = &self.patterns.shortcode else {
            return content.into_owned();
        };

        shortcode
            .replace_all(&content, |caps: &Captures| {
                if inside_tag(&content, caps) {
                    return caps[0].to_string();
                }
                match self.match_shortcode(caps.name("args").map(|m| m.as_str())) {
                    Ok(found) => {
                        tracing::debug!("Detected {} embed from shortcode", self.provider);
                        scripts.merge(found.scripts);
                        found.markup
                    }
                    Err(e) => {
                        tracing::debug!("Leaving shortcode untouched: {e}");
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }
}

/// Whether a match starts inside a tag, such as in an attribute value.
fn inside_tag(content: &str, caps: &Captures) -> bool {
    let Some(start) = caps.get(0).map(|m| m.start()) else {
        return false;
    };
    let before = &content[..start];
    match (before.rfind('<'), before.rfind('>')) {
        (Some(open), Some(close)) => open > close,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// An ordered set of detectors applied one after another.
pub struct EmbedDetectors {
    detectors: Vec<Box<dyn EmbedDetector>>,
}

impl EmbedDetectors {
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// One [`ProviderDetector`] per built-in provider, sized from `args`.
    pub fn with_providers(args: &SanitizerArgs) -> Self {
        let mut detectors = Self::new();
        for provider in Provider::ALL {
            detectors.add(ProviderDetector::new(provider, args.embed_dimensions(provider)));
        }
        detectors
    }

    pub fn add(&mut self, detector: impl EmbedDetector + 'static) {
        self.detectors.push(Box::new(detector));
    }

    pub(crate) fn add_boxed(&mut self, detector: Box<dyn EmbedDetector>) {
        self.detectors.push(detector);
    }

    /// Run every detector over `content`, returning the rewritten content and
    /// the scripts the substituted components need.
    pub fn detect(&self, content: &str) -> (String, Scripts) {
        let mut scripts = Scripts::new();
        let content = self
            .detectors
            .iter()
            .fold(content.to_string(), |acc, d| d.detect(&acc, &mut scripts));
        (content, scripts)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

impl Default for EmbedDetectors {
    fn default() -> Self {
        Self::with_providers(&SanitizerArgs::default())
    }
}
