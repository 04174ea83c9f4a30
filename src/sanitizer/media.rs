//! `<video>` / `<audio>` to `amp-video` / `amp-audio` conversion.

use super::{Sanitizer, SanitizerArgs, enforce_https, filter_attributes, normalize_dimensions};
use crate::dom::{Attributes, Document, NodeId, Visit};
use crate::embed::Layout;
use crate::error::Result;
use crate::scripts::Scripts;

const SOURCE_ATTRIBUTES: &[&str] = &["src", "type", "media", "srcset"];
const TRACK_ATTRIBUTES: &[&str] = &["src", "kind", "srclang", "label", "default"];

/// What one media converter matches and keeps.
struct MediaKind {
    tag: &'static str,
    component: &'static str,
    attributes: &'static [&'static str],
    /// Gets `layout="responsive"` once both dimensions are known.
    responsive: bool,
}

const VIDEO: MediaKind = MediaKind {
    tag: "video",
    component: "amp-video",
    attributes: &[
        "src", "poster", "width", "height", "autoplay", "controls", "loop", "muted", "class", "id",
    ],
    responsive: true,
};

const AUDIO: MediaKind = MediaKind {
    tag: "audio",
    component: "amp-audio",
    attributes: &[
        "src", "width", "height", "autoplay", "controls", "loop", "muted", "class", "id",
    ],
    responsive: false,
};

fn upgrade_src(attrs: &mut Attributes, args: &SanitizerArgs) {
    if !args.enforce_https {
        return;
    }
    if let Some(src) = attrs.get("src").map(enforce_https) {
        attrs.set("src", src);
    }
}

/// Convert the media element at `id` in place. `<source>` and `<track>`
/// children are kept (with their own attributes filtered); fallback content
/// is dropped. Elements with no playable source are removed.
fn convert(
    kind: &MediaKind,
    doc: &mut Document,
    id: NodeId,
    args: &SanitizerArgs,
    scripts: &mut Scripts,
) -> Visit {
    let mut has_source = doc
        .element(id)
        .and_then(|el| el.attr("src"))
        .is_some_and(|src| !src.trim().is_empty());

    for child in doc.children(id) {
        let name = doc.element(child).map(|el| el.name().to_string());
        let allowed = match name.as_deref() {
            Some("source") => SOURCE_ATTRIBUTES,
            Some("track") => TRACK_ATTRIBUTES,
            _ => {
                doc.remove(child);
                continue;
            }
        };
        doc.with_element_mut(child, |el| {
            let mut attrs = filter_attributes(&el.attrs, allowed);
            upgrade_src(&mut attrs, args);
            el.attrs = attrs;
            if el.name() == "source" && el.attr("src").is_some() {
                has_source = true;
            }
        });
    }

    if !has_source {
        tracing::debug!("Removing <{}> without a source", kind.tag);
        return Visit::Remove;
    }

    doc.with_element_mut(id, |el| {
        let mut attrs = filter_attributes(&el.attrs, kind.attributes);
        upgrade_src(&mut attrs, args);
        normalize_dimensions(&mut attrs, args);
        if kind.responsive && attrs.contains("width") && attrs.contains("height") {
            attrs.set("layout", Layout::Responsive.as_str());
        }
        el.attrs = attrs;
        el.set_name(kind.component);
    });
    scripts.require(kind.component);
    tracing::debug!("Converted <{}> to <{}>", kind.tag, kind.component);
    Visit::SkipChildren
}

fn run(
    kind: &MediaKind,
    pass: &'static str,
    doc: &mut Document,
    args: &SanitizerArgs,
    scripts: &mut Scripts,
) -> Result<()> {
    doc.walk(pass, |doc, id| {
        let matched = doc.element(id).is_some_and(|el| el.name() == kind.tag);
        Ok(if matched {
            convert(kind, doc, id, args, scripts)
        } else {
            Visit::Keep
        })
    })
}

/// Converts `<video>` to `amp-video`.
pub struct VideoSanitizer {
    args: SanitizerArgs,
}

impl VideoSanitizer {
    pub fn new(args: SanitizerArgs) -> Self {
        Self { args }
    }
}

impl Sanitizer for VideoSanitizer {
    fn name(&self) -> &'static str {
        "video"
    }

    fn sanitize(&self, doc: &mut Document, scripts: &mut Scripts) -> Result<()> {
        run(&VIDEO, self.name(), doc, &self.args, scripts)
    }
}

/// Converts `<audio>` to `amp-audio`.
pub struct AudioSanitizer {
    args: SanitizerArgs,
}

impl AudioSanitizer {
    pub fn new(args: SanitizerArgs) -> Self {
        Self { args }
    }
}

impl Sanitizer for AudioSanitizer {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn sanitize(&self, doc: &mut Document, scripts: &mut Scripts) -> Result<()> {
        run(&AUDIO, self.name(), doc, &self.args, scripts)
    }
}
