//! `<img>` to `amp-img` / `amp-anim` conversion.

use super::{
    Sanitizer, SanitizerArgs, enforce_sizes_attribute, filter_attributes, normalize_dimensions,
};
use crate::dom::{Document, Element, Node, Visit};
use crate::error::Result;
use crate::scripts::Scripts;

/// Class given to images whose size had to be guessed.
pub const UNKNOWN_SIZE_CLASS: &str = "amp-wp-unknown-size";

/// Height used when an image does not declare one.
pub const FALLBACK_HEIGHT: u32 = 400;

const ALLOWED_ATTRIBUTES: &[&str] = &[
    "src", "srcset", "sizes", "width", "height", "alt", "title", "class", "id", "layout",
];

/// Converts `<img>` elements.
///
/// Only whitelisted attributes carry over. Width and height are normalized to
/// whole pixels; a missing dimension falls back to the content width (or
/// [`FALLBACK_HEIGHT`]) and marks the image [`UNKNOWN_SIZE_CLASS`]. GIFs become
/// `amp-anim`, which needs its component script. Images without `src` are
/// removed.
///
/// ```
/// use amp_content::{ImageSanitizer, Sanitizer, SanitizerArgs};
/// use amp_content::dom::Document;
///
/// let mut doc = Document::parse(r#"<img src="a.jpg" width="10" height="10" style="color:red">"#);
/// ImageSanitizer::new(SanitizerArgs::default()).sanitize_document(&mut doc).unwrap();
/// assert_eq!(doc.to_html(), r#"<amp-img src="a.jpg" width="10" height="10"></amp-img>"#);
/// ```
pub struct ImageSanitizer {
    args: SanitizerArgs,
}

impl ImageSanitizer {
    pub fn new(args: SanitizerArgs) -> Self {
        Self { args }
    }

    fn convert(&self, img: &Element, scripts: &mut Scripts) -> Visit {
        let Some(src) = img.attr("src").map(str::trim).filter(|s| !s.is_empty()) else {
            tracing::debug!("Removing <img> without src");
            return Visit::Remove;
        };
        let component = if is_gif(src) { "amp-anim" } else { "amp-img" };

        let mut attrs = filter_attributes(&img.attrs, ALLOWED_ATTRIBUTES);
        normalize_dimensions(&mut attrs, &self.args);
        let (has_width, has_height) = (attrs.contains("width"), attrs.contains("height"));
        if !has_width {
            attrs.set("width", self.args.content_max_width.to_string());
        }
        if !has_height {
            attrs.set("height", FALLBACK_HEIGHT.to_string());
        }
        if self.args.enforce_sizes {
            attrs = enforce_sizes_attribute(attrs, &self.args);
        }

        let mut converted = Element::new(component);
        converted.attrs = attrs;
        if !(has_width && has_height) {
            converted.add_class(UNKNOWN_SIZE_CLASS);
        }

        if component == "amp-anim" {
            scripts.require(component);
        }
        tracing::debug!("Converted <img> to <{component}>");
        Visit::Replace(Node::Element(converted))
    }
}

/// Whether the path of `src`, ignoring query and fragment, ends in `.gif`.
fn is_gif(src: &str) -> bool {
    let path = src.split(['?', '#']).next().unwrap_or(src);
    path.to_ascii_lowercase().ends_with(".gif")
}

impl Sanitizer for ImageSanitizer {
    fn name(&self) -> &'static str {
        "image"
    }

    fn sanitize(&self, doc: &mut Document, scripts: &mut Scripts) -> Result<()> {
        doc.walk(self.name(), |doc, id| {
            Ok(match doc.element(id) {
                Some(el) if el.name() == "img" => self.convert(el, scripts),
                _ => Visit::Keep,
            })
        })
    }
}
