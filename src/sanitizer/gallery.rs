//! Gallery blocks to `amp-carousel`.

use std::sync::LazyLock;

use super::Sanitizer;
use crate::dom::{Document, Element, NodeId, Visit};
use crate::embed::Layout;
use crate::error::{AmpError, Result};
use crate::matcher::NodeMatcher;
use crate::scripts::Scripts;

static CAROUSEL_GALLERY: LazyLock<NodeMatcher> = LazyLock::new(|| {
    NodeMatcher::tag("*")
        .class("wp-block-gallery")
        .attr_eq("data-amp-carousel", "true")
});

/// Turns carousel-enabled gallery blocks into an `amp-carousel` of slides.
///
/// A `.wp-block-gallery[data-amp-carousel="true"]` holding at least one
/// `amp-img` is replaced by `<amp-carousel type="slides" layout="responsive">`
/// containing those images, sized to the largest of them. Other galleries are
/// left alone. Runs after [`ImageSanitizer`](super::ImageSanitizer).
pub struct GallerySanitizer;

impl GallerySanitizer {
    pub fn new() -> Self {
        Self
    }

    /// The `amp-img` descendants of `gallery` and the size of the largest.
    fn slides(doc: &Document, gallery: NodeId) -> Option<(Vec<NodeId>, u32, u32)> {
        let images: Vec<_> = doc
            .descendant_elements(gallery)
            .into_iter()
            .filter(|&d| doc.element(d).is_some_and(|el| el.name() == "amp-img"))
            .collect();
        let (width, height) = images
            .iter()
            .filter_map(|&img| doc.element(img).and_then(size))
            .max_by_key(|&(w, h)| u64::from(w) * u64::from(h))?;
        Some((images, width, height))
    }

    fn convert(doc: &mut Document, gallery: NodeId, scripts: &mut Scripts) -> Result<Visit> {
        let Some((images, width, height)) = Self::slides(doc, gallery) else {
            return Ok(Visit::Keep);
        };
        let carousel = Element::new("amp-carousel")
            .with_attr("width", width.to_string())
            .with_attr("height", height.to_string())
            .with_attr("type", "slides")
            .with_attr("layout", Layout::Responsive.as_str());
        let carousel = doc
            .replace(gallery, carousel)
            .ok_or_else(|| AmpError::pass("gallery", "gallery has no parent"))?;
        for &img in &images {
            if !doc.move_into(img, carousel) {
                return Err(AmpError::pass("gallery", "could not move slide into carousel"));
            }
        }
        scripts.require("amp-carousel");
        tracing::debug!("Converted gallery of {} images to <amp-carousel>", images.len());
        Ok(Visit::Revisit(carousel))
    }
}

fn size(el: &Element) -> Option<(u32, u32)> {
    let width = el.attr("width")?.parse().ok()?;
    let height = el.attr("height")?.parse().ok()?;
    Some((width, height))
}

impl Default for GallerySanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer for GallerySanitizer {
    fn name(&self) -> &'static str {
        "gallery"
    }

    fn sanitize(&self, doc: &mut Document, scripts: &mut Scripts) -> Result<()> {
        doc.walk(self.name(), |doc, id| {
            if doc.element(id).is_some_and(|el| CAROUSEL_GALLERY.matches(el)) {
                Self::convert(doc, id, scripts)
            } else {
                Ok(Visit::Keep)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(html: &str) -> (String, Scripts) {
        let mut doc = Document::parse(html);
        let scripts = GallerySanitizer::new().sanitize_document(&mut doc).unwrap();
        (doc.to_html(), scripts)
    }

    #[test]
    fn carousel_gallery_becomes_amp_carousel() {
        let (html, scripts) = run(concat!(
            r#"<p>before</p><figure class="wp-block-gallery columns-2" data-amp-carousel="true"><ul>"#,
            r#"<li><figure><amp-img src="a.jpg" width="300" height="200"></amp-img><figcaption>A</figcaption></figure></li>"#,
            r#"<li><figure><amp-img src="b.jpg" width="800" height="600"></amp-img></figure></li>"#,
            r#"</ul></figure><p>after</p>"#
        ));
        assert_eq!(
            html,
            concat!(
                r#"<p>before</p><amp-carousel width="800" height="600" type="slides" layout="responsive">"#,
                r#"<amp-img src="a.jpg" width="300" height="200"></amp-img>"#,
                r#"<amp-img src="b.jpg" width="800" height="600"></amp-img>"#,
                r#"</amp-carousel><p>after</p>"#
            )
        );
        assert!(scripts.contains("amp-carousel"));
    }

    #[test]
    fn gallery_without_carousel_flag_is_unchanged() {
        let input = r#"<figure class="wp-block-gallery"><amp-img src="a.jpg" width="1" height="1"></amp-img></figure>"#;
        let (html, scripts) = run(input);
        assert_eq!(html, input);
        assert!(scripts.is_empty());
    }

    #[test]
    fn gallery_without_images_is_unchanged() {
        let input = r#"<ul class="wp-block-gallery" data-amp-carousel="true"><li>empty</li></ul>"#;
        let (html, scripts) = run(input);
        assert_eq!(html, input);
        assert!(scripts.is_empty());
    }
}
