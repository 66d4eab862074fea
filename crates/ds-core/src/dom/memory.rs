//! In-memory document
//!
//! A small element tree with block layout, enough to exercise the scanner and
//! scheduler without a browser. Trees are described with [`NodeSpec`], which
//! is also the JSON fixture format read by the CLI.
//!
//! The arena owns structure, attributes and geometry. Selectors are evaluated
//! by `scraper` against an HTML rendition of the arena, so they follow the
//! same CSS grammar and matching rules as the page. Each rendered element
//! carries its arena index in [`NODE_ATTR`].

use std::cell::OnceCell;
use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use super::{FeedDocument, Rect};

/// Height given to leaf nodes with no explicit height.
const DEFAULT_LEAF_HEIGHT: f64 = 40.0;

/// Attribute linking a rendered element back to its arena node.
pub const NODE_ATTR: &str = "data-ds-node";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Declarative description of a subtree.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
    pub tag: String,
    pub classes: Vec<String>,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub height: Option<f64>,
    pub children: Vec<NodeSpec>,
}

impl Default for NodeSpec {
    fn default() -> Self {
        Self {
            tag: "div".to_string(),
            classes: Vec::new(),
            attrs: BTreeMap::new(),
            text: String::new(),
            height: None,
            children: Vec::new(),
        }
    }
}

impl NodeSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    classes: Vec<String>,
    attrs: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    top: f64,
    height: f64,
}

/// Arena-backed element tree rooted at `<body>`.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<Node>,
    viewport_height: f64,
    scroll_y: f64,
    /// Parsed rendition, dropped on every mutation.
    html: OnceCell<Html>,
}

impl MemoryDocument {
    pub fn new(viewport_height: f64) -> Self {
        let body = Node {
            tag: "body".to_string(),
            classes: Vec::new(),
            attrs: BTreeMap::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
            top: 0.0,
            height: 0.0,
        };
        Self {
            nodes: vec![body],
            viewport_height,
            scroll_y: 0.0,
            html: OnceCell::new(),
        }
    }

    /// Build a document whose body children are `specs`.
    pub fn from_specs(viewport_height: f64, specs: Vec<NodeSpec>) -> Self {
        let mut doc = Self::new(viewport_height);
        let body = doc.root();
        for spec in specs {
            doc.append(body, spec);
        }
        doc
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append `spec` as the last child of `parent` and re-run layout.
    pub fn append(&mut self, parent: NodeId, spec: NodeSpec) -> NodeId {
        let id = self.insert(Some(parent), spec);
        self.nodes[parent.0].children.push(id);
        self.layout();
        self.html.take();
        id
    }

    fn insert(&mut self, parent: Option<NodeId>, spec: NodeSpec) -> NodeId {
        let id = NodeId(self.nodes.len());
        // HTML attribute names are case-insensitive.
        let mut attrs: BTreeMap<String, String> = spec
            .attrs
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        let mut classes = spec.classes;
        if let Some(class) = attrs.remove("class") {
            classes.extend(class.split_whitespace().map(str::to_string));
        }
        self.nodes.push(Node {
            tag: spec.tag.to_ascii_lowercase(),
            classes,
            attrs,
            text: spec.text,
            parent,
            children: Vec::new(),
            top: 0.0,
            height: spec.height.unwrap_or(0.0),
        });
        for child in spec.children {
            let child_id = self.insert(Some(id), child);
            self.nodes[id.0].children.push(child_id);
        }
        if spec.height.is_none() && self.nodes[id.0].children.is_empty() {
            self.nodes[id.0].height = DEFAULT_LEAF_HEIGHT;
        }
        id
    }

    /// Stack children vertically. Explicit heights act as minimums.
    fn layout(&mut self) {
        self.layout_node(self.root(), 0.0);
    }

    fn layout_node(&mut self, id: NodeId, top: f64) -> f64 {
        self.nodes[id.0].top = top;
        let children = self.nodes[id.0].children.clone();
        if children.is_empty() {
            return self.nodes[id.0].height;
        }
        let mut cursor = top;
        for child in children {
            cursor += self.layout_node(child, cursor);
        }
        let height = self.nodes[id.0].height.max(cursor - top);
        self.nodes[id.0].height = height;
        height
    }

    pub fn scroll_to(&mut self, y: f64) {
        self.scroll_y = y.max(0.0);
    }

    pub fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    /// Total laid-out height of the page.
    pub fn page_height(&self) -> f64 {
        self.nodes[0].height
    }

    /// The document as HTML, every element tagged with its arena index.
    pub fn to_html(&self) -> String {
        let mut out = String::from("<!DOCTYPE html><html><head></head>");
        self.render(self.root(), &mut out);
        out.push_str("</html>");
        out
    }

    fn render(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id.0];
        out.push('<');
        out.push_str(&node.tag);
        push_attr(out, NODE_ATTR, &id.0.to_string());
        if !node.classes.is_empty() {
            push_attr(out, "class", &node.classes.join(" "));
        }
        for (name, value) in &node.attrs {
            push_attr(out, name, value);
        }
        out.push('>');
        push_escaped(out, &node.text, false);
        for &child in &node.children {
            self.render(child, out);
        }
        out.push_str("</");
        out.push_str(&node.tag);
        out.push('>');
    }

    fn html(&self) -> &Html {
        self.html.get_or_init(|| Html::parse_document(&self.to_html()))
    }

    fn parse(selector: &str) -> Option<Selector> {
        match Selector::parse(selector) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                log::warn!("Ignoring selector '{}': {:?}", selector, e);
                None
            }
        }
    }

    /// The rendered element for `id`.
    fn element_ref(&self, id: NodeId) -> Option<ElementRef<'_>> {
        let lookup = Selector::parse(&format!("[{}=\"{}\"]", NODE_ATTR, id.0)).ok()?;
        self.html().select(&lookup).next()
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id.0];
        out.push_str(&node.text);
        for &child in &node.children {
            self.collect_text(child, out);
        }
    }
}

fn node_id(element: ElementRef<'_>) -> Option<NodeId> {
    element.value().attr(NODE_ATTR)?.parse().ok().map(NodeId)
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    push_escaped(out, value, true);
    out.push('"');
}

fn push_escaped(out: &mut String, text: &str, in_attr: bool) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attr => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

impl FeedDocument for MemoryDocument {
    type Element = NodeId;

    fn query_all(&self, selector: &str) -> Vec<NodeId> {
        let parsed = match Self::parse(selector) {
            Some(parsed) => parsed,
            None => return Vec::new(),
        };
        // <html> and <head> are not arena nodes.
        self.html().select(&parsed).filter_map(node_id).collect()
    }

    fn query_within(&self, root: &NodeId, selector: &str) -> Vec<NodeId> {
        let parsed = match Self::parse(selector) {
            Some(parsed) => parsed,
            None => return Vec::new(),
        };
        let scope = match self.element_ref(*root) {
            Some(scope) => scope,
            None => return Vec::new(),
        };
        scope
            .select(&parsed)
            .filter_map(node_id)
            .filter(|id| id != root)
            .collect()
    }

    fn matches(&self, element: &NodeId, selector: &str) -> bool {
        match (Self::parse(selector), self.element_ref(*element)) {
            (Some(parsed), Some(element)) => parsed.matches(&element),
            _ => false,
        }
    }

    fn closest(&self, element: &NodeId, selector: &str) -> Option<NodeId> {
        let parsed = Self::parse(selector)?;
        let mut current = Some(*element);
        while let Some(id) = current {
            if self.element_ref(id).map_or(false, |el| parsed.matches(&el)) {
                return Some(id);
            }
            current = self.nodes[id.0].parent;
        }
        None
    }

    fn parent(&self, element: &NodeId) -> Option<NodeId> {
        self.nodes[element.0].parent
    }

    fn body(&self) -> Option<NodeId> {
        Some(self.root())
    }

    fn text_content(&self, element: &NodeId) -> String {
        let mut out = String::new();
        self.collect_text(*element, &mut out);
        out
    }

    fn attribute(&self, element: &NodeId, name: &str) -> Option<String> {
        self.nodes[element.0].attrs.get(&name.to_ascii_lowercase()).cloned()
    }

    fn set_attribute(&mut self, element: &NodeId, name: &str, value: &str) {
        self.nodes[element.0]
            .attrs
            .insert(name.to_ascii_lowercase(), value.to_string());
        self.html.take();
    }

    fn has_class(&self, element: &NodeId, class: &str) -> bool {
        self.nodes[element.0].classes.iter().any(|c| c == class)
    }

    fn add_class(&mut self, element: &NodeId, class: &str) {
        if !self.has_class(element, class) {
            self.nodes[element.0].classes.push(class.to_string());
            self.html.take();
        }
    }

    fn remove_class(&mut self, element: &NodeId, class: &str) {
        self.nodes[element.0].classes.retain(|c| c != class);
        self.html.take();
    }

    fn bounding_rect(&self, element: &NodeId) -> Rect {
        let node = &self.nodes[element.0];
        let top = node.top - self.scroll_y;
        Rect::new(top, top + node.height)
    }

    fn viewport_height(&self) -> f64 {
        self.viewport_height
    }
}
