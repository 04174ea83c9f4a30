//! Embed providers and the AMP components they map to.

use std::fmt;

use crate::dom::Element;

/// AMP layout keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layout {
    Responsive,
    Fixed,
    FixedHeight,
    Fill,
    Intrinsic,
}

impl Layout {
    pub fn as_str(self) -> &'static str {
        match self {
            Layout::Responsive => "responsive",
            Layout::Fixed => "fixed",
            Layout::FixedHeight => "fixed-height",
            Layout::Fill => "fill",
            Layout::Intrinsic => "intrinsic",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size and layout given to a generated embed component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmbedDimensions {
    pub width: u32,
    pub height: u32,
    pub layout: Layout,
}

impl EmbedDimensions {
    pub const fn responsive(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layout: Layout::Responsive,
        }
    }
}

/// Third-party content with a dedicated AMP component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Provider {
    Twitter,
    YouTube,
    Vimeo,
    Instagram,
    Vine,
    Facebook,
}

impl Provider {
    pub const ALL: [Provider; 6] = [
        Provider::Twitter,
        Provider::YouTube,
        Provider::Vimeo,
        Provider::Instagram,
        Provider::Vine,
        Provider::Facebook,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Provider::Twitter => "twitter",
            Provider::YouTube => "youtube",
            Provider::Vimeo => "vimeo",
            Provider::Instagram => "instagram",
            Provider::Vine => "vine",
            Provider::Facebook => "facebook",
        }
    }

    /// Component slug, which doubles as the element name.
    pub fn slug(self) -> &'static str {
        match self {
            Provider::Twitter => "amp-twitter",
            Provider::YouTube => "amp-youtube",
            Provider::Vimeo => "amp-vimeo",
            Provider::Instagram => "amp-instagram",
            Provider::Vine => "amp-vine",
            Provider::Facebook => "amp-facebook",
        }
    }

    /// Attribute carrying the embedded item's identifier.
    pub fn id_attribute(self) -> &'static str {
        match self {
            Provider::Twitter => "data-tweetid",
            Provider::YouTube | Provider::Vimeo => "data-videoid",
            Provider::Instagram => "data-shortcode",
            Provider::Vine => "data-vineid",
            Provider::Facebook => "data-href",
        }
    }

    pub fn default_dimensions(self) -> EmbedDimensions {
        match self {
            Provider::Twitter => EmbedDimensions::responsive(600, 480),
            Provider::YouTube | Provider::Vimeo => EmbedDimensions::responsive(600, 338),
            Provider::Instagram => EmbedDimensions::responsive(600, 600),
            Provider::Vine => EmbedDimensions::responsive(400, 400),
            Provider::Facebook => EmbedDimensions::responsive(600, 400),
        }
    }

    /// The component element for item `id`.
    pub fn component(self, id: &str, dimensions: EmbedDimensions) -> Element {
        Element::new(self.slug())
            .with_attr(self.id_attribute(), id)
            .with_attr("width", dimensions.width.to_string())
            .with_attr("height", dimensions.height.to_string())
            .with_attr("layout", dimensions.layout.as_str())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
