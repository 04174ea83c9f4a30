//! Sanitizer passes and the pipeline that runs them over one document.
//!
//! Sanitizers implement the [`Sanitizer`] trait and are composed into a
//! [`SanitizerPipeline`] that runs them sequentially over a shared
//! [`Document`]. Each pass sees the exact output of the pass before it.
//!
//! Built-in sanitizers:
//!
//! - [`SocialEmbedSanitizer`] -- provider blockquotes/divs to `amp-instagram`,
//!   `amp-twitter` and `amp-facebook`.
//! - [`ImageSanitizer`] -- `<img>` to `amp-img` / `amp-anim`.
//! - [`IframeSanitizer`] -- `<iframe>` to `amp-iframe`.
//! - [`VideoSanitizer`] / [`AudioSanitizer`] -- `<video>`/`<audio>` to
//!   `amp-video`/`amp-audio`.
//! - [`BlockSanitizer`] -- editor embed-block wrappers.
//! - [`GallerySanitizer`] -- gallery blocks to `amp-carousel`.
//! - [`WhitelistSanitizer`] -- tag/attribute whitelist enforcement; runs last.

mod block;
mod gallery;
mod iframe;
mod image;
mod media;
pub mod rules;
mod social;
mod whitelist;

use std::collections::HashMap;

pub use block::BlockSanitizer;
pub use gallery::GallerySanitizer;
pub use iframe::{DEFAULT_SANDBOX, IframeSanitizer};
pub use image::{FALLBACK_HEIGHT, ImageSanitizer, UNKNOWN_SIZE_CLASS};
pub use media::{AudioSanitizer, VideoSanitizer};
pub use rules::{
    AttrDecision, AttrRule, TagRule, ValueConstraint, Violation, WhitelistRules,
    WhitelistRulesBuilder,
};
pub use social::SocialEmbedSanitizer;
pub use whitelist::WhitelistSanitizer;

use crate::AmpOutput;
use crate::dom::{Attributes, Document};
use crate::embed::{EmbedDimensions, Provider};
use crate::error::{AmpError, Result};
use crate::scripts::Scripts;

/// Class appended to elements whose `sizes` attribute was generated.
pub const ENFORCED_SIZES_CLASS: &str = "amp-wp-enforced-sizes";

/// Default for [`SanitizerArgs::content_max_width`].
pub const DEFAULT_CONTENT_MAX_WIDTH: u32 = 600;

/// Options recognized by the built-in sanitizer passes.
#[derive(Clone, Debug)]
pub struct SanitizerArgs {
    /// Widest the content column gets, in pixels.
    pub content_max_width: u32,
    /// Upgrade `http://` sources of iframes and media to `https://`.
    pub enforce_https: bool,
    /// Generate `sizes` for converted images.
    pub enforce_sizes: bool,
    embed_dimensions: HashMap<Provider, EmbedDimensions>,
}

impl SanitizerArgs {
    pub fn new() -> Self {
        Self {
            content_max_width: DEFAULT_CONTENT_MAX_WIDTH,
            enforce_https: true,
            enforce_sizes: false,
            embed_dimensions: HashMap::new(),
        }
    }

    /// Override the default dimensions of one embed provider.
    pub fn set_embed_dimensions(&mut self, provider: Provider, dimensions: EmbedDimensions) {
        self.embed_dimensions.insert(provider, dimensions);
    }

    /// Configured dimensions for `provider`, falling back to its defaults.
    pub fn embed_dimensions(&self, provider: Provider) -> EmbedDimensions {
        self.embed_dimensions
            .get(&provider)
            .copied()
            .unwrap_or_else(|| provider.default_dimensions())
    }
}

impl Default for SanitizerArgs {
    fn default() -> Self {
        Self::new()
    }
}

/// One stage of the pipeline.
///
/// A pass is configured when it is constructed and holds no state between
/// runs. [`sanitize`](Sanitizer::sanitize) mutates the document in place and
/// registers, in `scripts`, the component scripts its output needs.
/// Implementations must be `Send + Sync` so one pipeline can serve any
/// number of content units.
pub trait Sanitizer: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Rewrite `doc` in place.
    fn sanitize(&self, doc: &mut Document, scripts: &mut Scripts) -> Result<()>;

    /// Run this pass alone, returning only the scripts it registered.
    fn sanitize_document(&self, doc: &mut Document) -> Result<Scripts> {
        let mut scripts = Scripts::new();
        self.sanitize(doc, &mut scripts)?;
        Ok(scripts)
    }
}

/// An ordered chain of [`Sanitizer`] passes sharing one document.
///
/// Passes run strictly in insertion order. A failing pass aborts the run.
pub struct SanitizerPipeline {
    sanitizers: Vec<Box<dyn Sanitizer>>,
}

impl SanitizerPipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self {
            sanitizers: Vec::new(),
        }
    }

    /// Append a sanitizer to the end of the pipeline.
    pub fn add(&mut self, sanitizer: impl Sanitizer + 'static) {
        self.sanitizers.push(Box::new(sanitizer));
    }

    pub(crate) fn add_boxed(&mut self, sanitizer: Box<dyn Sanitizer>) {
        self.sanitizers.push(sanitizer);
    }

    /// Run every pass over `doc` and return the merged scripts registry.
    pub fn run(&self, doc: &mut Document) -> Result<Scripts> {
        let mut scripts = Scripts::new();
        for sanitizer in &self.sanitizers {
            let name = sanitizer.name();
            tracing::debug!("Running sanitizer pass {name}");
            let pass_scripts = sanitizer.sanitize_document(doc).map_err(|e| match e {
                AmpError::Pass { .. } => e,
                other => AmpError::pass(name, other.to_string()),
            })?;
            tracing::debug!("Sanitizer pass {name} registered {} scripts", pass_scripts.len());
            scripts.merge(pass_scripts);
        }
        Ok(scripts)
    }

    /// Parse `html`, run the pipeline, and serialize the result.
    pub fn sanitize(&self, html: &str) -> Result<AmpOutput> {
        let mut doc = Document::parse(html);
        let scripts = self.run(&mut doc)?;
        Ok(AmpOutput {
            html: doc.to_html(),
            scripts,
        })
    }

    /// Names of the passes, in run order.
    pub fn names(&self) -> Vec<&'static str> {
        self.sanitizers.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.sanitizers.len()
    }

    /// Returns `true` if no sanitizers have been added.
    pub fn is_empty(&self) -> bool {
        self.sanitizers.is_empty()
    }
}

impl Default for SanitizerPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Which side of a box a dimension measures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dimension {
    Width,
    Height,
}

/// Normalize a `width`/`height` value to whole pixels.
///
/// `"100"` and `"100px"` give `100`; a percentage width resolves against
/// `content_max_width`; anything else is rejected.
pub fn sanitize_dimension(value: &str, dimension: Dimension, args: &SanitizerArgs) -> Option<u32> {
    let value = value.trim();
    if let Some(percent) = value.strip_suffix('%') {
        if dimension != Dimension::Width {
            return None;
        }
        let percent: f64 = percent.trim().parse().ok()?;
        if !(0.0..=100.0).contains(&percent) || percent == 0.0 {
            return None;
        }
        return Some((f64::from(args.content_max_width) * percent / 100.0).round() as u32);
    }
    let value = value.strip_suffix("px").unwrap_or(value).trim();
    let pixels: f64 = value.parse().ok()?;
    (pixels.is_finite() && pixels > 0.0).then(|| pixels.round() as u32)
}

/// Add a responsive `sizes` attribute when `width` and `height` are known.
///
/// `sizes` becomes `(min-width: {W}px) {W}px, 100vw` with
/// `W = min(width, content_max_width)`, and [`ENFORCED_SIZES_CLASS`] is
/// appended to the class list. Attributes that already carry `sizes`, or
/// lack a dimension, are returned unchanged.
pub fn enforce_sizes_attribute(mut attrs: Attributes, args: &SanitizerArgs) -> Attributes {
    if attrs.contains("sizes") {
        return attrs;
    }
    let width = attrs
        .get("width")
        .and_then(|w| sanitize_dimension(w, Dimension::Width, args));
    let height = attrs
        .get("height")
        .and_then(|h| sanitize_dimension(h, Dimension::Height, args));
    let (Some(width), Some(_)) = (width, height) else {
        return attrs;
    };

    let max_width = width.min(args.content_max_width);
    attrs.set("sizes", format!("(min-width: {max_width}px) {max_width}px, 100vw"));

    let class = match attrs.get("class").map(str::trim) {
        Some(existing) if !existing.is_empty() => format!("{existing} {ENFORCED_SIZES_CLASS}"),
        _ => ENFORCED_SIZES_CLASS.to_string(),
    };
    attrs.set("class", class);
    attrs
}

/// Upgrade a protocol-relative or `http://` URL to `https://`.
pub fn enforce_https(url: &str) -> String {
    let trimmed = url.trim();
    if let Some(rest) = trimmed.strip_prefix("//") {
        return format!("https://{rest}");
    }
    match trimmed.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("http://") => {
            format!("https://{}", &trimmed[7..])
        }
        _ => trimmed.to_string(),
    }
}

/// Copy only the attributes named in `allowed`, in source order.
pub(crate) fn filter_attributes(attrs: &Attributes, allowed: &[&str]) -> Attributes {
    attrs
        .iter()
        .filter(|(name, _)| allowed.contains(name))
        .collect()
}

/// Sanitize `width`/`height` in place, dropping values that do not parse.
pub(crate) fn normalize_dimensions(attrs: &mut Attributes, args: &SanitizerArgs) {
    attrs.retain(|name, value| {
        let dimension = match name {
            "width" => Dimension::Width,
            "height" => Dimension::Height,
            _ => return true,
        };
        match sanitize_dimension(value, dimension, args) {
            Some(px) => {
                *value = px.to_string();
                true
            }
            None => false,
        }
    });
}
