//! Registry of AMP component scripts required by converted markup.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Base URL of the AMP component CDN.
pub const AMP_CDN: &str = "https://cdn.ampproject.org/v0";

/// Where a component script comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptSource {
    /// The script URL is known.
    Url(String),
    /// The component is required; the caller resolves the URL.
    Required,
}

/// The standard CDN URL for a component, e.g. `amp-iframe` →
/// `https://cdn.ampproject.org/v0/amp-iframe-0.1.js`.
pub fn component_script_url(slug: &str) -> String {
    format!("{AMP_CDN}/{slug}-0.1.js")
}

/// Mapping from component slug to script source.
///
/// Duplicate registrations are resolved first-wins: registering a slug
/// again with the same source is a no-op, and registering it with a
/// different source keeps the original and logs a warning.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scripts {
    entries: BTreeMap<String, ScriptSource>,
}

impl Scripts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `slug` with its standard CDN URL.
    pub fn require(&mut self, slug: &str) -> bool {
        self.register(slug, ScriptSource::Url(component_script_url(slug)))
    }

    /// Register `slug`. Returns `true` if the slug was not yet present.
    pub fn register(&mut self, slug: &str, source: ScriptSource) -> bool {
        match self.entries.entry(slug.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(source);
                true
            }
            Entry::Occupied(entry) => {
                if *entry.get() != source {
                    tracing::warn!(
                        "Script for {slug} already registered as {:?}, ignoring {:?}",
                        entry.get(),
                        source
                    );
                }
                false
            }
        }
    }

    /// Fold `other` into `self` with the same first-wins policy.
    pub fn merge(&mut self, other: Scripts) {
        for (slug, source) in other.entries {
            self.register(&slug, source);
        }
    }

    /// Keep only the entries for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&str, &ScriptSource) -> bool) {
        self.entries.retain(|slug, source| f(slug, source));
    }

    pub fn get(&self, slug: &str) -> Option<&ScriptSource> {
        self.entries.get(slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.entries.contains_key(slug)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScriptSource)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One `<script async custom-element>` tag per entry with a known URL,
    /// sorted by slug. [`ScriptSource::Required`] entries are left to the caller.
    pub fn head_markup(&self) -> String {
        self.iter()
            .filter_map(|(slug, source)| match source {
                ScriptSource::Url(url) => Some(format!(
                    r#"<script async custom-element="{slug}" src="{url}"></script>"#
                )),
                ScriptSource::Required => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<'a> IntoIterator for &'a Scripts {
    type Item = (&'a String, &'a ScriptSource);
    type IntoIter = std::collections::btree_map::Iter<'a, String, ScriptSource>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
