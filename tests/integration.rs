use std::sync::Arc;

use amp_content::dom::{Document, Visit};
use amp_content::{
    AmpContent, AmpContentBuilder, AmpError, EmbedDetector, ImageSanitizer, Result, Sanitizer,
    SanitizerArgs, ScriptSource, Scripts, WhitelistRules, WhitelistSanitizer,
};
use pretty_assertions::assert_eq;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn amp() -> AmpContent {
    AmpContent::default()
}

fn html(input: &str) -> String {
    amp().transform(input).unwrap().html
}

/// Sets `style` on every paragraph, which the whitelist must strip again.
struct StyleInjector;

impl Sanitizer for StyleInjector {
    fn name(&self) -> &'static str {
        "style-injector"
    }

    fn sanitize(&self, doc: &mut Document, scripts: &mut Scripts) -> Result<()> {
        doc.walk(self.name(), |doc, id| {
            doc.with_element_mut(id, |el| {
                if el.name() == "p" {
                    el.attrs.set("style", "color:red");
                    el.attrs.set("data-seen", "1");
                }
            });
            Ok(Visit::Keep)
        })?;
        scripts.register("amp-custom-thing", ScriptSource::Required);
        Ok(())
    }
}

/// Fails on every document.
struct Broken;

impl Sanitizer for Broken {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn sanitize(&self, _doc: &mut Document, _scripts: &mut Scripts) -> Result<()> {
        Err(AmpError::Config("tree is inconsistent".into()))
    }
}

/// Turns `[[hr]]` into a horizontal rule.
struct RuleDetector;

impl EmbedDetector for RuleDetector {
    fn name(&self) -> &'static str {
        "rule"
    }

    fn detect(&self, content: &str, _scripts: &mut Scripts) -> String {
        content.replace("[[hr]]", "<hr>")
    }
}

// ---------------------------------------------------------------------------
// Whitelist enforcement
// ---------------------------------------------------------------------------

#[test]
fn script_content_is_removed() {
    assert_eq!(html("<script>alert(1)</script>"), "");
}

#[test]
fn disallowed_containers_leave_no_text() {
    let out = html(
        "<p>keep</p><style>p { color: red }</style><form><input value=secret>secret</form><object>obj</object>",
    );
    assert_eq!(out, "<p>keep</p>");
}

#[test]
fn javascript_href_is_removed_text_kept() {
    assert_eq!(html(r#"<a href="javascript:alert('x')">Click</a>"#), "<a>Click</a>");
}

#[test]
fn style_and_handlers_are_stripped_at_any_depth() {
    let out = html(concat!(
        r#"<div style="a" onmouseover="b()"><section style="c"><ul><li onclick="d()">"#,
        r#"<span style="e"><a href="/ok" onclick="f()" style="g">deep</a></span></li></ul></section></div>"#
    ));
    assert!(!out.contains("style"), "{out}");
    assert!(!out.contains("onclick"), "{out}");
    assert!(!out.contains("onmouseover"), "{out}");
    assert_eq!(
        out,
        r#"<div><section><ul><li><span><a href="/ok">deep</a></span></li></ul></section></div>"#
    );
}

#[test]
fn comments_are_dropped_and_wrappers_rescued() {
    assert_eq!(
        html(r#"<p><!-- hidden --><font face="Arial">old</font> <tt>school</tt></p>"#),
        "<p>old school</p>"
    );
}

#[test]
fn multibyte_text_round_trips() {
    let input = "<p>Iñtërnâtiônàlizætiøn</p>";
    assert_eq!(html(input), input);
}

#[test]
fn idempotent_on_converted_output() {
    let inputs = [
        r#"<p style="x">Hello <b>world</b><br>again</p>"#,
        r#"<img src="a.jpg" width="10" height="10" style="color:red">"#,
        r#"<img src="anim.gif">"#,
        r#"<iframe src="http://x/embed" width="640" height="360" scrolling="no"></iframe>"#,
        r#"<video src="http://x/v.mp4" controls>fallback</video>"#,
        r#"<a href="https://x" target="_parent">x</a><font>f</font>"#,
        "https://twitter.com/WordPress/status/987437752164737025",
        "[tweet abcd]",
        "<pre>\n\ncode</pre>",
        "<pre>\nline one\n  line two</pre>",
        "<table><tr><td>cell</td></tr>loose</table>",
        concat!(
            r#"<figure class="wp-block-gallery" data-amp-carousel="true"><ul>"#,
            r#"<li><figure><img src="a.jpg" width="300" height="200"></figure></li>"#,
            r#"<li><figure><img src="b.jpg" width="640" height="480" onload="x()"></figure></li>"#,
            r#"</ul></figure>"#
        ),
        concat!(
            r#"<figure class="wp-block-embed is-type-video wp-embed-aspect-16-9"><div class="wp-block-embed__wrapper">"#,
            "\nhttps://www.youtube.com/watch?v=kfVsfOSbJY0\n",
            "</div></figure>"
        ),
    ];
    let amp = amp();
    for input in inputs {
        let once = amp.transform(input).unwrap().html;
        let twice = amp.transform(&once).unwrap().html;
        assert_eq!(twice, once, "input: {input}");
    }
}

#[test]
fn whitelist_pass_twice_is_noop() {
    let mut doc = Document::parse(r#"<div class="a" style="b"><a href="vbscript:x">l</a><script>s</script></div>"#);
    let whitelist = WhitelistSanitizer::default();
    whitelist.sanitize_document(&mut doc).unwrap();
    let once = doc.to_html();
    whitelist.sanitize_document(&mut doc).unwrap();
    assert_eq!(doc.to_html(), once);
}

// ---------------------------------------------------------------------------
// Structural conversions
// ---------------------------------------------------------------------------

#[test]
fn image_conversion_drops_style() {
    assert_eq!(
        html(r#"<img src="a.jpg" width="10" height="10" style="color:red">"#),
        r#"<amp-img src="a.jpg" width="10" height="10"></amp-img>"#
    );
}

#[test]
fn iframe_gets_default_sandbox() {
    let out = amp().transform(r#"<iframe src="https://x"></iframe>"#).unwrap();
    assert_eq!(
        out.html,
        r#"<amp-iframe src="https://x" sandbox="allow-scripts allow-same-origin"></amp-iframe>"#
    );
    assert_eq!(
        out.scripts.get("amp-iframe"),
        Some(&ScriptSource::Url(
            "https://cdn.ampproject.org/v0/amp-iframe-0.1.js".into()
        ))
    );
}

#[test]
fn iframe_keeps_explicit_sandbox() {
    assert_eq!(
        html(r#"<iframe src="https://x" sandbox="allow-same-origin"></iframe>"#),
        r#"<amp-iframe src="https://x" sandbox="allow-same-origin"></amp-iframe>"#
    );
}

#[test]
fn enforce_sizes_through_builder() {
    let amp = AmpContentBuilder::new().enforce_sizes(true).build().unwrap();
    let out = amp
        .transform(r#"<img src="a.jpg" width="200" height="100">"#)
        .unwrap();
    assert_eq!(
        out.html,
        r#"<amp-img src="a.jpg" width="200" height="100" sizes="(min-width: 200px) 200px, 100vw" class="amp-wp-enforced-sizes"></amp-img>"#
    );

    let out = amp
        .transform(r#"<img src="a.jpg" width="200" height="100" sizes="50vw">"#)
        .unwrap();
    assert_eq!(
        out.html,
        r#"<amp-img src="a.jpg" width="200" height="100" sizes="50vw"></amp-img>"#
    );
}

#[test]
fn content_width_drives_fallback_size() {
    let amp = AmpContentBuilder::new().content_max_width(480).build().unwrap();
    let out = amp.transform(r#"<img src="a.png">"#).unwrap();
    assert_eq!(
        out.html,
        r#"<amp-img src="a.png" width="480" height="400" class="amp-wp-unknown-size"></amp-img>"#
    );
}

#[test]
fn instagram_embed_loses_its_script() {
    let out = amp()
        .transform(concat!(
            r#"<blockquote class="instagram-media" data-instgrm-permalink="https://www.instagram.com/p/BhsgU3jh6xE/">"#,
            r#"<a href="https://www.instagram.com/p/BhsgU3jh6xE/">A post</a></blockquote>"#,
            r#"<script async src="//www.instagram.com/embed.js"></script>"#
        ))
        .unwrap();
    assert_eq!(
        out.html,
        r#"<amp-instagram data-shortcode="BhsgU3jh6xE" width="600" height="600" layout="responsive"></amp-instagram>"#
    );
    assert_eq!(out.scripts.len(), 1);
    assert!(out.scripts.contains("amp-instagram"));
}

#[test]
fn gallery_block_becomes_carousel() {
    let out = amp()
        .transform(concat!(
            r#"<figure class="wp-block-gallery" data-amp-carousel="true"><ul>"#,
            r#"<li><figure><img src="a.jpg" width="300" height="200"></figure></li>"#,
            r#"<li><figure><img src="b.jpg" width="640" height="480" onload="x()"></figure></li>"#,
            r#"</ul></figure>"#
        ))
        .unwrap();
    assert_eq!(
        out.html,
        concat!(
            r#"<amp-carousel width="640" height="480" type="slides" layout="responsive">"#,
            r#"<amp-img src="a.jpg" width="300" height="200"></amp-img>"#,
            r#"<amp-img src="b.jpg" width="640" height="480"></amp-img></amp-carousel>"#
        )
    );
    assert!(out.scripts.contains("amp-carousel"));
}

#[test]
fn embed_block_url_becomes_responsive_component() {
    let out = amp()
        .transform(concat!(
            r#"<figure class="wp-block-embed is-type-video wp-embed-aspect-16-9"><div class="wp-block-embed__wrapper">"#,
            "\nhttps://www.youtube.com/watch?v=kfVsfOSbJY0\n",
            "</div></figure>"
        ))
        .unwrap();
    assert!(
        out.html.contains(
            r#"<amp-youtube data-videoid="kfVsfOSbJY0" width="600" height="338" layout="responsive"></amp-youtube>"#
        ),
        "{}",
        out.html
    );
    assert!(out.scripts.contains("amp-youtube"));
}

// ---------------------------------------------------------------------------
// Embed detection
// ---------------------------------------------------------------------------

#[test]
fn non_numeric_tweet_shortcode_is_unchanged() {
    let out = amp().transform("[tweet abcd]").unwrap();
    assert_eq!(out.html, "[tweet abcd]");
    assert!(out.scripts.is_empty());
}

#[test]
fn tweet_url_on_own_line_converts() {
    let out = amp()
        .transform("<p>Look:</p>\nhttps://twitter.com/WordPress/status/987437752164737025\n<p>Done</p>")
        .unwrap();
    assert_eq!(
        out.html,
        concat!(
            "<p>Look:</p>\n",
            r#"<amp-twitter data-tweetid="987437752164737025" width="600" height="480" layout="responsive"></amp-twitter>"#,
            "\n<p>Done</p>"
        )
    );
    assert!(out.scripts.contains("amp-twitter"));
}

#[test]
fn malformed_embed_urls_stay_text() {
    for input in [
        "https://vimeo.com/123abc",
        "https://twitter.com/a/status/123abc",
        "https://youtu.be/kfVsfOSbJY0EXTRA",
    ] {
        let out = amp().transform(input).unwrap();
        assert_eq!(out.html, input);
        assert!(out.scripts.is_empty(), "{input}: {:?}", out.scripts);
    }
}

#[test]
fn stripped_embed_does_not_report_its_script() {
    let out = amp().transform("<script>\nhttps://vimeo.com/123\n</script>").unwrap();
    assert_eq!(out.html, "");
    assert!(out.scripts.is_empty(), "{:?}", out.scripts);

    let out = amp()
        .transform("<object>\nhttps://vimeo.com/123\n</object>\nhttps://vine.co/v/MdKjXez002d\n")
        .unwrap();
    assert!(!out.scripts.contains("amp-vimeo"));
    assert!(out.scripts.contains("amp-vine"));
}

#[test]
fn shortcode_in_attribute_is_not_expanded() {
    let out = amp()
        .transform(r#"<img src="a.jpg" width="10" height="10" alt="[tweet 987437752164737025]">"#)
        .unwrap();
    assert_eq!(
        out.html,
        r#"<amp-img src="a.jpg" width="10" height="10" alt="[tweet 987437752164737025]"></amp-img>"#
    );
    assert!(!out.scripts.contains("amp-twitter"));
}

#[test]
fn without_embeds_leaves_urls_as_text() {
    let amp = AmpContentBuilder::new().without_embeds().build().unwrap();
    let input = "https://vimeo.com/172355597";
    let out = amp.transform(input).unwrap();
    assert_eq!(out.html, input);
    assert!(out.scripts.is_empty());
}

#[test]
fn custom_detector_runs_before_parsing() {
    let amp = AmpContentBuilder::new().add_detector(RuleDetector).build().unwrap();
    assert_eq!(amp.transform("<p>a</p>[[hr]]").unwrap().html, "<p>a</p><hr></hr>");
}

// ---------------------------------------------------------------------------
// Configuration and error handling
// ---------------------------------------------------------------------------

#[test]
fn custom_pass_runs_before_whitelist() {
    let amp = AmpContentBuilder::new().add_sanitizer(StyleInjector).build().unwrap();
    let out = amp.transform("<p>x</p>").unwrap();
    assert_eq!(out.html, r#"<p data-seen="1">x</p>"#);
    assert_eq!(out.scripts.get("amp-custom-thing"), Some(&ScriptSource::Required));
    assert_eq!(out.scripts.head_markup(), "");
}

#[test]
fn custom_whitelist_table() {
    let rules = WhitelistRules::amp_builder()
        .allow_attribute("p", "align")
        .disallow_tag("b")
        .build();
    let amp = AmpContentBuilder::new()
        .whitelist_rules(Arc::new(rules))
        .build()
        .unwrap();
    assert_eq!(
        amp.transform(r#"<p align="center" style="x">a<b>bold</b></p>"#).unwrap().html,
        r#"<p align="center">a</p>"#
    );
}

#[test]
fn failing_pass_aborts_with_pass_error() {
    let amp = AmpContentBuilder::new().add_sanitizer(Broken).build().unwrap();
    match amp.transform("<p>x</p>") {
        Err(AmpError::Pass { sanitizer, message }) => {
            assert_eq!(sanitizer, "broken");
            assert!(message.contains("inconsistent"));
        }
        other => panic!("expected a pass error, got {other:?}"),
    }
}

#[test]
fn transform_or_original_falls_back() {
    let amp = AmpContentBuilder::new().add_sanitizer(Broken).build().unwrap();
    let input = r#"<p style="x">raw</p>"#;
    let out = amp.transform_or_original(input);
    assert_eq!(out.html, input);
    assert!(out.scripts.is_empty());
}

#[test]
fn transform_bytes_rejects_invalid_utf8() {
    let err = amp().transform_bytes(b"<p>\xff\xfe</p>").unwrap_err();
    assert!(matches!(err, AmpError::Parse(_)));
    assert_eq!(
        amp().transform_bytes("<p>ok</p>".as_bytes()).unwrap().html,
        "<p>ok</p>"
    );
}

#[test]
fn head_markup_lists_every_component() {
    let out = amp()
        .transform(concat!(
            r#"<iframe src="https://x"></iframe><img src="a.gif" width="1" height="1">"#,
            "\nhttps://vine.co/v/MdKjXez002d\n"
        ))
        .unwrap();
    assert_eq!(
        out.scripts.head_markup(),
        [
            r#"<script async custom-element="amp-anim" src="https://cdn.ampproject.org/v0/amp-anim-0.1.js"></script>"#,
            r#"<script async custom-element="amp-iframe" src="https://cdn.ampproject.org/v0/amp-iframe-0.1.js"></script>"#,
            r#"<script async custom-element="amp-vine" src="https://cdn.ampproject.org/v0/amp-vine-0.1.js"></script>"#,
        ]
        .join("\n")
    );
}

#[test]
fn single_pass_reports_its_own_scripts() {
    let mut doc = Document::parse(r#"<img src="a.gif" width="1" height="1"><img src="b.jpg" width="1" height="1">"#);
    let scripts = ImageSanitizer::new(SanitizerArgs::default())
        .sanitize_document(&mut doc)
        .unwrap();
    assert_eq!(scripts.iter().map(|(slug, _)| slug).collect::<Vec<_>>(), vec!["amp-anim"]);
    assert!(doc.to_html().starts_with("<amp-anim "));
}

#[test]
fn one_converter_serves_many_threads() {
    let amp = amp();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let amp = &amp;
                scope.spawn(move || {
                    amp.transform(&format!(r#"<p onclick="x()">{i}</p><script>{i}</script>"#))
                        .unwrap()
                        .html
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), format!("<p>{i}</p>"));
        }
    });
}
