//! Builder for configuring an [`AmpContent`] converter.

use std::sync::Arc;

use crate::AmpContent;
use crate::embed::{EmbedDetector, EmbedDetectors, EmbedDimensions, Provider};
use crate::error::{AmpError, Result};
use crate::sanitizer::{
    AudioSanitizer, BlockSanitizer, GallerySanitizer, IframeSanitizer, ImageSanitizer, Sanitizer,
    SanitizerArgs, SanitizerPipeline, SocialEmbedSanitizer, VideoSanitizer, WhitelistRules,
    WhitelistSanitizer,
};

/// Builder for an [`AmpContent`] converter.
///
/// Provides a fluent API for the sanitizer options, the whitelist rule
/// table, extra sanitizer passes and extra embed detectors.
///
/// The assembled pipeline runs, in order: social embeds, images, iframes,
/// video, audio, embed blocks, galleries, then any passes added with
/// [`add_sanitizer`](Self::add_sanitizer), and finally the whitelist.
///
/// # Example
///
/// ```
/// use amp_content::{AmpContentBuilder, EmbedDimensions, Provider};
///
/// let amp = AmpContentBuilder::new()
///     .content_max_width(720)
///     .enforce_sizes(true)
///     .embed_dimensions(Provider::YouTube, EmbedDimensions::responsive(720, 405))
///     .build()
///     .unwrap();
///
/// let out = amp.transform("https://youtu.be/kfVsfOSbJY0").unwrap();
/// assert!(out.html.contains(r#"width="720""#));
/// assert!(out.scripts.contains("amp-youtube"));
/// ```
pub struct AmpContentBuilder {
    args: SanitizerArgs,
    rules: Arc<WhitelistRules>,
    sanitizers: Vec<Box<dyn Sanitizer>>,
    detectors: Vec<Box<dyn EmbedDetector>>,
    provider_embeds: bool,
}

impl AmpContentBuilder {
    /// Create a new builder with sensible defaults.
    ///
    /// Defaults: content width 600, https enforced, no generated `sizes`,
    /// the shared AMP whitelist, every built-in embed provider.
    pub fn new() -> Self {
        Self {
            args: SanitizerArgs::default(),
            rules: WhitelistRules::amp(),
            sanitizers: Vec::new(),
            detectors: Vec::new(),
            provider_embeds: true,
        }
    }

    /// Widest the content column gets, in pixels.
    pub fn content_max_width(mut self, width: u32) -> Self {
        self.args.content_max_width = width;
        self
    }

    /// Upgrade `http://` iframe and media sources to `https://`.
    pub fn enforce_https(mut self, enforce: bool) -> Self {
        self.args.enforce_https = enforce;
        self
    }

    /// Generate a responsive `sizes` attribute for converted images.
    pub fn enforce_sizes(mut self, enforce: bool) -> Self {
        self.args.enforce_sizes = enforce;
        self
    }

    /// Override the component size used for one embed provider.
    pub fn embed_dimensions(mut self, provider: Provider, dimensions: EmbedDimensions) -> Self {
        self.args.set_embed_dimensions(provider, dimensions);
        self
    }

    /// Use a custom whitelist rule table instead of the AMP one.
    pub fn whitelist_rules(mut self, rules: Arc<WhitelistRules>) -> Self {
        self.rules = rules;
        self
    }

    /// Append a [`Sanitizer`] after the built-in conversion passes.
    ///
    /// Custom passes run in the order they are added, each receiving the
    /// output of the previous one, and always before the whitelist.
    pub fn add_sanitizer(mut self, sanitizer: impl Sanitizer + 'static) -> Self {
        self.sanitizers.push(Box::new(sanitizer));
        self
    }

    /// Append an [`EmbedDetector`] after the built-in provider detectors.
    pub fn add_detector(mut self, detector: impl EmbedDetector + 'static) -> Self {
        self.detectors.push(Box::new(detector));
        self
    }

    /// Skip the built-in provider detectors. Detectors added with
    /// [`add_detector`](Self::add_detector) still run.
    pub fn without_embeds(mut self) -> Self {
        self.provider_embeds = false;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.args.content_max_width == 0 {
            return Err(AmpError::Config("content_max_width must be positive".into()));
        }
        for provider in Provider::ALL {
            let dims = self.args.embed_dimensions(provider);
            if dims.width == 0 || dims.height == 0 {
                return Err(AmpError::Config(format!(
                    "embed dimensions for {provider} must be positive, got {}x{}",
                    dims.width, dims.height
                )));
            }
        }
        Ok(())
    }

    /// Validate the configuration and assemble the converter.
    pub fn build(self) -> Result<AmpContent> {
        self.validate()?;
        Ok(self.assemble())
    }

    pub(crate) fn assemble(self) -> AmpContent {
        let args = self.args;

        let mut pipeline = SanitizerPipeline::new();
        pipeline.add(SocialEmbedSanitizer::new(args.clone()));
        pipeline.add(ImageSanitizer::new(args.clone()));
        pipeline.add(IframeSanitizer::new(args.clone()));
        pipeline.add(VideoSanitizer::new(args.clone()));
        pipeline.add(AudioSanitizer::new(args.clone()));
        pipeline.add(BlockSanitizer::new(args.clone()));
        pipeline.add(GallerySanitizer::new());
        for sanitizer in self.sanitizers {
            pipeline.add_boxed(sanitizer);
        }
        pipeline.add(WhitelistSanitizer::new(self.rules));

        let mut detectors = if self.provider_embeds {
            EmbedDetectors::with_providers(&args)
        } else {
            EmbedDetectors::new()
        };
        for detector in self.detectors {
            detectors.add_boxed(detector);
        }

        tracing::debug!(
            "Assembled AMP converter with passes {:?} and detectors {:?}",
            pipeline.names(),
            detectors.names()
        );
        AmpContent::new(detectors, pipeline)
    }
}

impl Default for AmpContentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::scripts::Scripts;
    use pretty_assertions::assert_eq;

    struct Marker;

    impl Sanitizer for Marker {
        fn name(&self) -> &'static str {
            "marker"
        }

        fn sanitize(&self, _doc: &mut Document, _scripts: &mut Scripts) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn default_pass_order() {
        let amp = AmpContentBuilder::new().add_sanitizer(Marker).build().unwrap();
        assert_eq!(
            amp.pipeline().names(),
            vec![
                "social-embed",
                "image",
                "iframe",
                "video",
                "audio",
                "block",
                "gallery",
                "marker",
                "whitelist"
            ]
        );
        assert_eq!(amp.detectors().len(), Provider::ALL.len());
    }

    #[test]
    fn without_embeds_drops_provider_detectors() {
        let amp = AmpContentBuilder::new().without_embeds().build().unwrap();
        assert!(amp.detectors().is_empty());
    }

    #[test]
    fn zero_width_is_rejected() {
        let err = AmpContentBuilder::new().content_max_width(0).build().err();
        assert!(matches!(err, Some(AmpError::Config(_))));
    }

    #[test]
    fn zero_embed_size_is_rejected() {
        let err = AmpContentBuilder::new()
            .embed_dimensions(Provider::Vine, EmbedDimensions::responsive(0, 400))
            .build()
            .err();
        assert!(matches!(err, Some(AmpError::Config(msg)) if msg.contains("vine")));
    }
}
