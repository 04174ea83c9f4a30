//! Editor embed-block wrappers around AMP components.

use std::sync::LazyLock;

use regex::Regex;

use super::{Sanitizer, SanitizerArgs};
use crate::dom::{Document, NodeId, Visit};
use crate::embed::Layout;
use crate::error::Result;
use crate::matcher::NodeMatcher;
use crate::scripts::Scripts;

/// `wp-embed-aspect-16-9` and friends.
static ASPECT_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^wp-embed-aspect-(\d{1,4})-(\d{1,4})$")
        .expect("ASPECT_CLASS: hardcoded regex is valid")
});

static EMBED_BLOCK: LazyLock<NodeMatcher> =
    LazyLock::new(|| NodeMatcher::tag("figure").class("wp-block-embed"));

static EMBED_WRAPPER: LazyLock<NodeMatcher> =
    LazyLock::new(|| NodeMatcher::tag("div").class("wp-block-embed__wrapper"));

/// Makes the component inside an embed block responsive.
///
/// Applies to `<figure class="wp-block-embed">` with exactly one
/// `div.wp-block-embed__wrapper` child, which itself holds exactly one
/// element, an `amp-*` component. The component gets `layout="responsive"`;
/// missing dimensions are derived from the block's `wp-embed-aspect-W-H`
/// class. Blocks that do not fit this shape, or whose size cannot be
/// determined, pass through unchanged.
pub struct BlockSanitizer {
    args: SanitizerArgs,
}

impl BlockSanitizer {
    pub fn new(args: SanitizerArgs) -> Self {
        Self { args }
    }

    /// The component inside a qualifying block.
    fn component(doc: &Document, figure: NodeId) -> Option<NodeId> {
        let wrappers: Vec<_> = doc
            .element_children(figure)
            .into_iter()
            .filter(|&c| doc.element(c).is_some_and(|el| EMBED_WRAPPER.matches(el)))
            .collect();
        let &[wrapper] = wrappers.as_slice() else {
            return None;
        };
        let &[component] = doc.element_children(wrapper).as_slice() else {
            return None;
        };
        doc.element(component)
            .is_some_and(|el| el.name().starts_with("amp-"))
            .then_some(component)
    }

    /// Width and height for a component that declares neither.
    fn aspect_size(&self, doc: &Document, figure: NodeId) -> Option<(u32, u32)> {
        let (w, h) = doc.element(figure)?.classes().find_map(|class| {
            let caps = ASPECT_CLASS.captures(class)?;
            Some((caps[1].parse::<u32>().ok()?, caps[2].parse::<u32>().ok()?))
        })?;
        if w == 0 || h == 0 {
            return None;
        }
        let width = self.args.content_max_width;
        let height = (f64::from(width) * f64::from(h) / f64::from(w)).round() as u32;
        Some((width, height))
    }

    fn normalize(&self, doc: &mut Document, figure: NodeId) {
        let Some(component) = Self::component(doc, figure) else {
            return;
        };
        let sized = doc
            .element(component)
            .is_some_and(|el| el.attrs.contains("width") && el.attrs.contains("height"));
        let size = if sized { None } else { self.aspect_size(doc, figure) };
        if !sized && size.is_none() {
            tracing::debug!("Embed block without a known size left unchanged");
            return;
        }

        doc.with_element_mut(component, |el| {
            if let Some((width, height)) = size {
                el.attrs.set("width", width.to_string());
                el.attrs.set("height", height.to_string());
            }
            el.attrs.set("layout", Layout::Responsive.as_str());
            tracing::debug!("Made <{}> in embed block responsive", el.name());
        });
    }
}

impl Sanitizer for BlockSanitizer {
    fn name(&self) -> &'static str {
        "block"
    }

    fn sanitize(&self, doc: &mut Document, _scripts: &mut Scripts) -> Result<()> {
        doc.walk(self.name(), |doc, id| {
            if doc.element(id).is_some_and(|el| EMBED_BLOCK.matches(el)) {
                self.normalize(doc, id);
            }
            Ok(Visit::Keep)
        })
    }
}
