//! A small mutable document tree for the live page.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Ids are never reused: detaching a node
//! only unlinks it, so a `NodeId` stays a stable identity for as long as the [`Document`] lives.
//! Parsing goes through `roxmltree`; namespace declarations and prefixes are kept as plain
//! qualified attribute names so that serialization round-trips them.

use crate::{Error, Result};
use indexmap::IndexMap;
use std::fmt::Write as _;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attrs: IndexMap<String, String>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: IndexMap::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Local part of the tag name (`svg:rect` -> `rect`).
    pub fn local_name(&self) -> &str {
        self.name
            .rsplit_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(name.into(), value.into());
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        self.attrs.shift_remove(name)
    }

    pub fn class_tokens(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class_tokens().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if class.is_empty() || self.has_class(class) {
            return;
        }
        let next = match self.attr("class").map(str::trim) {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attr("class", next);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let xml = roxmltree::Document::parse_with_options(text, options)?;
        let mut doc = Self::new();
        let root = doc.root();
        for child in xml.root().children() {
            if let Some(id) = doc.build_from_xml(child) {
                doc.link_last(root, id);
            }
        }
        Ok(doc)
    }

    fn build_from_xml(&mut self, node: roxmltree::Node<'_, '_>) -> Option<NodeId> {
        if node.is_text() {
            return Some(self.create_text(node.text().unwrap_or_default()));
        }
        if node.is_comment() {
            let text = node.text().unwrap_or_default().to_string();
            return Some(self.push(NodeKind::Comment(text)));
        }
        if !node.is_element() {
            return None;
        }

        let mut el = Element::new(qualified_tag_name(node));
        let inherited: Vec<(Option<&str>, &str)> = node
            .parent_element()
            .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
            .unwrap_or_default();
        for ns in node.namespaces() {
            if ns.uri() == XML_NAMESPACE || inherited.contains(&(ns.name(), ns.uri())) {
                continue;
            }
            match ns.name() {
                Some(prefix) => el.set_attr(format!("xmlns:{prefix}"), ns.uri()),
                None => el.set_attr("xmlns", ns.uri()),
            }
        }
        for a in node.attributes() {
            let name = match a.namespace().and_then(|ns| node.lookup_prefix(ns)) {
                Some(prefix) if !prefix.is_empty() => format!("{prefix}:{}", a.name()),
                _ => a.name().to_string(),
            };
            el.set_attr(name, a.value());
        }

        let id = self.create_element(el);
        for child in node.children() {
            if let Some(c) = self.build_from_xml(child) {
                self.link_last(id, c);
            }
        }
        Some(id)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn link_last(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|&c| self.element(c).is_some())
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.get(id).map(|n| &n.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id)? {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Iterates the ancestors of `id`, nearest first. `id` itself is not included.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    /// Pre-order descendants of `id`, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(cur) = stack.pop() {
            out.push(cur);
            stack.extend(self.children(cur).iter().rev().copied());
        }
        out
    }

    /// All attached elements in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|&id| self.element(id).is_some())
            .collect()
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root() || self.ancestors(id).any(|a| a == self.root())
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for d in std::iter::once(id).chain(self.descendants(id)) {
            if let Some(NodeKind::Text(t)) = self.kind(d) {
                out.push_str(t);
            }
        }
        out
    }

    pub fn create_element(&mut self, el: Element) -> NodeId {
        self.push(NodeKind::Element(el))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    fn check_insertable(&self, child: NodeId, parent: NodeId) -> Result<()> {
        if self.get(child).is_none() || self.get(parent).is_none() {
            return Err(Error::tree("node does not belong to this document"));
        }
        if child == self.root() {
            return Err(Error::tree("the document root cannot be moved"));
        }
        if child == parent || self.ancestors(parent).any(|a| a == child) {
            return Err(Error::tree("cannot insert a node into its own subtree"));
        }
        if matches!(self.kind(parent), Some(NodeKind::Text(_) | NodeKind::Comment(_))) {
            return Err(Error::tree("text and comment nodes cannot have children"));
        }
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_insertable(child, parent)?;
        self.detach(child);
        self.link_last(parent, child);
        Ok(())
    }

    /// Inserts `child` as the previous sibling of `reference`.
    pub fn insert_before(&mut self, child: NodeId, reference: NodeId) -> Result<()> {
        let parent = self
            .parent(reference)
            .ok_or_else(|| Error::tree("reference node is detached"))?;
        self.check_insertable(child, parent)?;
        if child == reference {
            return Err(Error::tree("cannot insert a node before itself"));
        }
        self.detach(child);
        let siblings = &mut self.nodes[parent.0].children;
        let at = siblings
            .iter()
            .position(|&s| s == reference)
            .unwrap_or(siblings.len());
        siblings.insert(at, child);
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }

    /// Unlinks `id` from its parent. The node and its subtree stay addressable.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        self.nodes[parent.0].children.retain(|&c| c != id);
        self.nodes[id.0].parent = None;
    }

    /// Puts `new` at the position of `old`, then detaches `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        self.insert_before(new, old)?;
        self.detach(old);
        Ok(())
    }

    /// Deep-copies the subtree rooted at `id` in `other` into this document, detached.
    pub fn import_subtree(&mut self, other: &Document, id: NodeId) -> Result<NodeId> {
        let kind = match other.kind(id) {
            Some(NodeKind::Root) | None => {
                return Err(Error::tree("only elements, text and comments can be imported"));
            }
            Some(kind) => kind.clone(),
        };
        let copy = self.push(kind);
        for &child in other.children(id) {
            let c = self.import_subtree(other, child)?;
            self.link_last(copy, c);
        }
        Ok(copy)
    }

    pub fn to_xml(&self) -> String {
        self.subtree_to_xml(self.root())
    }

    pub fn subtree_to_xml(&self, id: NodeId) -> String {
        let mut out = String::new();
        let in_svg = self
            .ancestors(id)
            .filter_map(|a| self.element(a))
            .any(|el| el.local_name() == "svg");
        self.write_node(id, in_svg, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, in_svg: bool, out: &mut String) {
        let Some(kind) = self.kind(id) else {
            return;
        };
        match kind {
            NodeKind::Root => {
                for &c in self.children(id) {
                    self.write_node(c, in_svg, out);
                }
            }
            NodeKind::Text(t) => out.push_str(&escape_text(t)),
            NodeKind::Comment(c) => {
                let _ = write!(out, "<!--{c}-->");
            }
            NodeKind::Element(el) => {
                let in_svg = in_svg || el.local_name() == "svg";
                let _ = write!(out, "<{}", el.name);
                for (k, v) in &el.attrs {
                    let _ = write!(out, " {k}=\"{}\"", escape_attr(v));
                }
                let children = self.children(id);
                if children.is_empty() && (in_svg || is_void_html_element(el.local_name())) {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for &c in children {
                    self.write_node(c, in_svg, out);
                }
                let _ = write!(out, "</{}>", el.name);
            }
        }
    }
}

pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.next?;
        self.next = self.doc.parent(cur);
        Some(cur)
    }
}

fn qualified_tag_name(node: roxmltree::Node<'_, '_>) -> String {
    let tag = node.tag_name();
    let Some(ns) = tag.namespace() else {
        return tag.name().to_string();
    };
    if node.lookup_namespace_uri(None) == Some(ns) {
        return tag.name().to_string();
    }
    match node.lookup_prefix(ns) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{}", tag.name()),
        _ => tag.name().to_string(),
    }
}

fn is_void_html_element(name: &str) -> bool {
    matches!(
        name,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
            | "source" | "track" | "wbr"
    )
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_namespaces_and_prefixed_attributes() {
        let src = r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"><use xlink:href="#a"/></svg>"##;
        let doc = Document::parse(src).unwrap();
        let svg = doc.root_element().unwrap();
        let el = doc.element(svg).unwrap();
        assert_eq!(el.attr("xmlns"), Some("http://www.w3.org/2000/svg"));
        assert_eq!(el.attr("xmlns:xlink"), Some("http://www.w3.org/1999/xlink"));
        let use_el = doc.element(doc.children(svg)[0]).unwrap();
        assert_eq!(use_el.attr("xlink:href"), Some("#a"));
        assert!(doc.to_xml().contains(r##"<use xlink:href="#a"/></svg>"##));
    }

    #[test]
    fn insert_before_and_detach_keep_sibling_order() {
        let mut doc = Document::parse("<g><a/><b/></g>").unwrap();
        let g = doc.root_element().unwrap();
        let b = doc.children(g)[1];
        let c = doc.create_element(Element::new("c"));
        doc.insert_before(c, b).unwrap();
        assert_eq!(doc.to_xml(), "<g><a></a><c></c><b></b></g>");

        doc.detach(b);
        assert!(!doc.is_attached(b));
        assert_eq!(doc.to_xml(), "<g><a></a><c></c></g>");
    }

    #[test]
    fn cannot_insert_node_into_its_own_subtree() {
        let mut doc = Document::parse("<g><a><b/></a></g>").unwrap();
        let g = doc.root_element().unwrap();
        let a = doc.children(g)[0];
        let b = doc.children(a)[0];
        assert!(matches!(doc.insert_before(a, b), Err(Error::Tree { .. })));
    }

    #[test]
    fn class_helpers_dedupe_tokens() {
        let mut el = Element::new("rect").with_attr("class", "node  filled");
        el.add_class("filled");
        el.add_class("sketch");
        assert_eq!(el.attr("class"), Some("node  filled sketch"));
        assert!(el.has_class("node"));
    }

    #[test]
    fn text_is_escaped_on_output() {
        let doc = Document::parse("<p>a &amp; b &lt; c</p>").unwrap();
        assert_eq!(doc.to_xml(), "<p>a &amp; b &lt; c</p>");
    }
}
