//! Mutable document model shared by every sanitizer pass.
//!
//! Content is parsed with [`scraper`]'s HTML5 fragment parser and copied into
//! an arena ([`ego_tree::Tree`]) of [`Node`]s that passes can rewrite in place.
//! Nodes are addressed by [`NodeId`]; removing a node detaches it (and its
//! descendants) from the tree without invalidating any other id.

mod serialize;

use ego_tree::iter::Edge;
use ego_tree::{NodeRef, Tree};
use scraper::Html;

use crate::error::{AmpError, Result};
use crate::matcher::NodeMatcher;

pub use ego_tree::NodeId;
pub use serialize::element_html;

/// Ordered attribute list with ASCII case-insensitive names.
///
/// Names are stored lowercased. Setting an existing attribute keeps its
/// position; new attributes are appended.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set `name` to `value`, replacing an existing value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.0.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.0.remove(index).1)
    }

    /// Keep only the attributes for which `f` returns `true`. `f` may rewrite
    /// the value of an attribute it keeps.
    pub fn retain(&mut self, mut f: impl FnMut(&str, &mut String) -> bool) {
        self.0.retain_mut(|(k, v)| f(k, v));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.set(k, v);
        }
        attrs
    }
}

/// An element: lowercased tag name plus ordered attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    name: String,
    pub attrs: Attributes,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            attrs: Attributes::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.set(name, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_ascii_lowercase();
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Append `class` to the class list unless it is already present.
    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let joined = match self.attr("class").map(str::trim) {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.attrs.set("class", joined);
    }
}

/// A node of the document tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// The root of a parsed fragment. Never serialized itself.
    Fragment,
    Element(Element),
    Text(String),
    Comment(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, Node::Element(_))
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

/// What a [`Document::walk`] visitor wants done with the node it was given.
#[derive(Debug)]
pub enum Visit {
    /// Keep the node and descend into its children.
    Keep,
    /// Keep the node but do not visit its children.
    SkipChildren,
    /// Detach the node and its descendants.
    Remove,
    /// Replace the node by its children, which are visited next.
    Unwrap,
    /// Put a new node at the exact position of this one and visit it next.
    Replace(Node),
    /// The visitor already replaced the node; continue at the given node.
    Revisit(NodeId),
}

/// One parsed content unit.
#[derive(Clone, Debug)]
pub struct Document {
    tree: Tree<Node>,
}

impl Document {
    /// An empty fragment.
    pub fn new() -> Self {
        Self {
            tree: Tree::new(Node::Fragment),
        }
    }

    /// Parse an HTML fragment. Malformed markup is repaired following the
    /// HTML5 error-recovery rules; no `<html>`/`<body>` wrapper is kept.
    pub fn parse(html: &str) -> Self {
        let fragment = Html::parse_fragment(html);
        let context = *fragment.root_element();

        let mut tree = Tree::new(Node::Fragment);
        let mut stack: Vec<Option<NodeId>> = vec![Some(tree.root().id())];

        for edge in context.traverse() {
            match edge {
                Edge::Open(node) if node.id() == context.id() => {}
                Edge::Close(node) if node.id() == context.id() => {}
                Edge::Open(node) => {
                    let parent = stack.last().copied().flatten();
                    let id = match (parent, convert(node.value())) {
                        (Some(parent), Some(value)) => tree
                            .get_mut(parent)
                            .map(|mut parent| parent.append(value).id()),
                        _ => None,
                    };
                    stack.push(id);
                }
                Edge::Close(_) => {
                    stack.pop();
                }
            }
        }

        Self { tree }
    }

    /// Parse raw bytes, which must be UTF-8.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let html = std::str::from_utf8(bytes).map_err(|e| AmpError::Parse(e.to_string()))?;
        Ok(Self::parse(html))
    }

    /// Serialize the fragment back to HTML.
    pub fn to_html(&self) -> String {
        serialize::serialize(self.tree.root())
    }

    pub fn root(&self) -> NodeId {
        self.tree.root().id()
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_, Node>> {
        self.tree.get(id)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.tree.get(id).and_then(|node| node.value().as_element())
    }

    /// Run `f` on the element at `id`. Returns `None` for non-elements.
    pub fn with_element_mut<R>(&mut self, id: NodeId, f: impl FnOnce(&mut Element) -> R) -> Option<R> {
        let mut node = self.tree.get_mut(id)?;
        match node.value() {
            Node::Element(el) => Some(f(el)),
            _ => None,
        }
    }

    /// Whether `id` is still reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.tree
            .get(id)
            .is_some_and(|node| node.ancestors().any(|a| a.id() == self.root()) || id == self.root())
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id)?.first_child().map(|c| c.id())
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.tree
            .get(id)
            .map(|node| node.children().map(|c| c.id()).collect())
            .unwrap_or_default()
    }

    /// Element children of `id`, skipping text and comments.
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.tree
            .get(id)
            .map(|node| {
                node.children()
                    .filter(|c| c.value().is_element())
                    .map(|c| c.id())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Elements below `id` in document order, excluding `id` itself.
    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.tree
            .get(id)
            .map(|node| {
                node.descendants()
                    .skip(1)
                    .filter(|d| d.value().is_element())
                    .map(|d| d.id())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All attached elements matching `matcher`, in document order.
    pub fn select(&self, matcher: &NodeMatcher) -> Vec<NodeId> {
        self.tree
            .root()
            .descendants()
            .filter(|node| node.value().as_element().is_some_and(|el| matcher.matches(el)))
            .map(|node| node.id())
            .collect()
    }

    /// Whether any element named `name` is attached to the document.
    pub fn contains_element(&self, name: &str) -> bool {
        self.tree
            .root()
            .descendants()
            .any(|node| node.value().as_element().is_some_and(|el| el.name().eq_ignore_ascii_case(name)))
    }

    /// Concatenated text of `id` and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let Some(node) = self.tree.get(id) else {
            return String::new();
        };
        node.descendants()
            .filter_map(|d| match d.value() {
                Node::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Append `node` as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, node: impl Into<Node>) -> Option<NodeId> {
        let mut parent = self.tree.get_mut(parent)?;
        Some(parent.append(node.into()).id())
    }

    /// Detach `id` and its descendants. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root() {
            return false;
        }
        match self.tree.get_mut(id) {
            Some(mut node) => {
                node.detach();
                true
            }
            None => false,
        }
    }

    /// Put `node` at the tree position of `id` and detach `id`.
    ///
    /// Returns the id of the replacement, or `None` if `id` has no parent.
    pub fn replace(&mut self, id: NodeId, node: impl Into<Node>) -> Option<NodeId> {
        self.tree.get(id)?.parent()?;
        let new_id = self.tree.get_mut(id)?.insert_before(node.into()).id();
        self.tree.get_mut(id)?.detach();
        Some(new_id)
    }

    /// Replace `id` by its children. Returns the first hoisted child.
    pub fn unwrap(&mut self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id)?.parent()?;
        let children = self.children(id);
        for child in &children {
            self.tree.get_mut(*child)?.detach();
            self.tree.get_mut(id)?.insert_id_before(*child);
        }
        self.tree.get_mut(id)?.detach();
        children.first().copied()
    }

    /// Move `id` (with its subtree) to the end of `parent`'s children.
    pub fn move_into(&mut self, id: NodeId, parent: NodeId) -> bool {
        if id == self.root() || self.is_ancestor_or_self(id, parent) {
            return false;
        }
        if self.tree.get(parent).is_none() {
            return false;
        }
        match self.tree.get_mut(id) {
            Some(mut node) => node.detach(),
            None => return false,
        }
        match self.tree.get_mut(parent) {
            Some(mut parent) => {
                parent.append_id(id);
                true
            }
            None => false,
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.tree.get(id).is_some_and(|node| {
            node.id() == ancestor || node.ancestors().any(|a| a.id() == ancestor)
        })
    }

    /// Next node in pre-order after `id`'s whole subtree.
    pub fn next_after_subtree(&self, id: NodeId) -> Option<NodeId> {
        let root = self.root();
        let mut node = self.tree.get(id)?;
        loop {
            if let Some(sibling) = node.next_sibling() {
                return Some(sibling.id());
            }
            node = node.parent()?;
            if node.id() == root {
                return None;
            }
        }
    }

    /// Visit every node below the root in pre-order, letting `visit` decide
    /// each node's fate.
    ///
    /// The node to resume from after a removal is computed before the node is
    /// touched, so removals and replacements never disturb the walk. Visitors
    /// may only mutate the node they are given and its subtree.
    pub fn walk<F>(&mut self, pass: &'static str, mut visit: F) -> Result<()>
    where
        F: FnMut(&mut Document, NodeId) -> Result<Visit>,
    {
        let mut cursor = self.first_child(self.root());

        while let Some(id) = cursor {
            if !self.is_attached(id) {
                return Err(AmpError::pass(pass, "traversal reached a detached node"));
            }
            let after = self.next_after_subtree(id);

            cursor = match visit(self, id)? {
                Visit::Keep => self
                    .first_child(id)
                    .or_else(|| self.next_after_subtree(id)),
                Visit::SkipChildren => self.next_after_subtree(id),
                Visit::Remove => {
                    self.remove(id);
                    after
                }
                Visit::Unwrap => self.unwrap(id).or(after),
                Visit::Replace(node) => {
                    let new_id = self
                        .replace(id, node)
                        .ok_or_else(|| AmpError::pass(pass, "cannot replace a detached node"))?;
                    Some(new_id)
                }
                Visit::Revisit(new_id) => Some(new_id),
            };
        }

        Ok(())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn convert(node: &scraper::Node) -> Option<Node> {
    match node {
        scraper::Node::Element(el) => {
            let mut element = Element::new(el.name());
            for (name, value) in el.attrs() {
                element.attrs.set(name, value);
            }
            Some(Node::Element(element))
        }
        scraper::Node::Text(text) => Some(Node::Text(String::from(&**text))),
        scraper::Node::Comment(comment) => Some(Node::Comment(String::from(&**comment))),
        _ => None,
    }
}
