//! Document Abstraction
//!
//! The scanner never touches a browser API directly. Everything it needs from
//! the page goes through [`FeedDocument`], implemented by the wasm host over
//! `web-sys` and by [`MemoryDocument`] for tests and the CLI.
//!
//! Selectors are passed as strings. An implementation that cannot evaluate a
//! selector must treat it as matching nothing.

#[cfg(feature = "memory-dom")]
mod memory;

#[cfg(feature = "memory-dom")]
pub use memory::{MemoryDocument, NodeId, NodeSpec};

/// Vertical extent of an element relative to the top of the viewport, in CSS
/// pixels (as reported by `getBoundingClientRect`).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub top: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(top: f64, bottom: f64) -> Self {
        Self { top, bottom }
    }
}

/// Query and mutation surface over a page.
pub trait FeedDocument {
    /// Handle to one element. Equality is node identity.
    type Element: Clone + PartialEq;

    /// All elements in the document matching `selector`, in document order.
    fn query_all(&self, selector: &str) -> Vec<Self::Element>;

    /// Descendants of `root` matching `selector`, in document order.
    fn query_within(&self, root: &Self::Element, selector: &str) -> Vec<Self::Element>;

    /// First element matching `selector`, in document order.
    fn query_first(&self, selector: &str) -> Option<Self::Element> {
        self.query_all(selector).into_iter().next()
    }

    /// Does `element` itself match `selector`?
    fn matches(&self, element: &Self::Element, selector: &str) -> bool;

    /// Nearest inclusive ancestor of `element` matching `selector`.
    fn closest(&self, element: &Self::Element, selector: &str) -> Option<Self::Element>;

    fn parent(&self, element: &Self::Element) -> Option<Self::Element>;

    /// The document body, the last-resort observation root.
    fn body(&self) -> Option<Self::Element>;

    /// Concatenated text of the element's subtree.
    fn text_content(&self, element: &Self::Element) -> String;

    fn attribute(&self, element: &Self::Element, name: &str) -> Option<String>;
    fn set_attribute(&mut self, element: &Self::Element, name: &str, value: &str);

    fn has_class(&self, element: &Self::Element, class: &str) -> bool;
    fn add_class(&mut self, element: &Self::Element, class: &str);
    fn remove_class(&mut self, element: &Self::Element, class: &str);

    fn bounding_rect(&self, element: &Self::Element) -> Rect;
    fn viewport_height(&self) -> f64;

    /// Is `ancestor` a proper ancestor of `element`?
    fn is_ancestor(&self, ancestor: &Self::Element, element: &Self::Element) -> bool {
        let mut current = self.parent(element);
        while let Some(node) = current {
            if &node == ancestor {
                return true;
            }
            current = self.parent(&node);
        }
        false
    }
}
