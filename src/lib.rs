//! # amp_content
//!
//! Converts HTML content fragments into valid AMP markup and reports the
//! AMP component scripts the result needs.
//!
//! ## Overview
//!
//! Conversion happens in two stages:
//!
//! 1. [`EmbedDetectors`] rewrite the raw string: a provider URL on its own
//!    line, or a `[tweet …]`-style shortcode, becomes the provider's AMP
//!    component.
//! 2. The content is parsed into a [`Document`] and run through a
//!    [`SanitizerPipeline`]: structural passes convert `<img>`, `<iframe>`,
//!    media, social embeds and editor blocks to AMP components, and the
//!    [`WhitelistSanitizer`] then strips every tag and attribute the AMP
//!    rule table does not allow.
//!
//! Every pass registers the component scripts its output depends on in a
//! [`Scripts`] registry, returned alongside the HTML in an [`AmpOutput`].
//!
//! ## Quick start
//!
//! ```rust
//! use amp_content::AmpContentBuilder;
//!
//! let amp = AmpContentBuilder::new().build().unwrap();
//!
//! let out = amp
//!     .transform(r#"<p style="color:red" onclick="x()">Hi <img src="a.jpg" width="10" height="10"></p>"#)
//!     .unwrap();
//! assert_eq!(
//!     out.html,
//!     r#"<p>Hi <amp-img src="a.jpg" width="10" height="10"></amp-img></p>"#
//! );
//!
//! let out = amp.transform(r#"<iframe src="https://example.com/embed"></iframe>"#).unwrap();
//! assert!(out.scripts.contains("amp-iframe"));
//! println!("{}", out.scripts.head_markup());
//! ```
//!
//! A converter holds no per-run state and is `Send + Sync`; one instance can
//! serve any number of threads.

pub mod config;
pub mod dom;
pub mod embed;
pub mod error;
pub mod matcher;
pub mod sanitizer;
pub mod scripts;

pub use config::AmpContentBuilder;
pub use dom::Document;
pub use embed::{
    EmbedDetector, EmbedDetectors, EmbedDimensions, EmbedMatch, Layout, Provider,
    ProviderDetector,
};
pub use error::{AmpError, Result};
pub use sanitizer::{
    AudioSanitizer, BlockSanitizer, GallerySanitizer, IframeSanitizer, ImageSanitizer, Sanitizer,
    SanitizerArgs, SanitizerPipeline, SocialEmbedSanitizer, VideoSanitizer, WhitelistRules,
    WhitelistSanitizer,
};
pub use scripts::{ScriptSource, Scripts};

/// Converted content and the component scripts it requires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AmpOutput {
    pub html: String,
    pub scripts: Scripts,
}

/// A configured converter: embed detectors followed by a sanitizer pipeline.
///
/// Build one with [`AmpContentBuilder`], or use [`AmpContent::default`] for
/// the standard AMP configuration.
pub struct AmpContent {
    detectors: EmbedDetectors,
    pipeline: SanitizerPipeline,
}

impl AmpContent {
    pub(crate) fn new(detectors: EmbedDetectors, pipeline: SanitizerPipeline) -> Self {
        Self {
            detectors,
            pipeline,
        }
    }

    pub fn builder() -> AmpContentBuilder {
        AmpContentBuilder::new()
    }

    /// Convert one content unit.
    ///
    /// A detector script is reported only while its component survives the
    /// pipeline. Scripts registered by the detectors take precedence over
    /// those registered by the pipeline for the same slug.
    pub fn transform(&self, content: &str) -> Result<AmpOutput> {
        let (content, mut scripts) = self.detectors.detect(content);
        let mut doc = Document::parse(&content);
        let pipeline_scripts = self.pipeline.run(&mut doc)?;
        scripts.retain(|slug, _| {
            let kept = doc.contains_element(slug);
            if !kept {
                tracing::debug!("Dropping script {slug}, its component was removed");
            }
            kept
        });
        scripts.merge(pipeline_scripts);
        Ok(AmpOutput {
            html: doc.to_html(),
            scripts,
        })
    }

    /// Convert raw bytes, which must be UTF-8.
    pub fn transform_bytes(&self, content: &[u8]) -> Result<AmpOutput> {
        let content = std::str::from_utf8(content).map_err(|e| AmpError::Parse(e.to_string()))?;
        self.transform(content)
    }

    /// Convert one content unit, falling back to the original content (and
    /// no scripts) if conversion fails.
    pub fn transform_or_original(&self, content: &str) -> AmpOutput {
        match self.transform(content) {
            Ok(output) => output,
            Err(e) => {
                tracing::error!("AMP conversion failed, keeping original content: {e}");
                AmpOutput {
                    html: content.to_string(),
                    scripts: Scripts::new(),
                }
            }
        }
    }

    pub fn pipeline(&self) -> &SanitizerPipeline {
        &self.pipeline
    }

    pub fn detectors(&self) -> &EmbedDetectors {
        &self.detectors
    }
}

impl Default for AmpContent {
    fn default() -> Self {
        AmpContentBuilder::new().assemble()
    }
}
