//! `FeedDocument` over the live browser DOM.

use ds_core::dom::{FeedDocument, Rect};
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Node, NodeList, Window};

pub struct WebDocument {
    window: Window,
    document: Document,
}

impl WebDocument {
    pub fn new(window: Window, document: Document) -> Self {
        Self { window, document }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

fn collect_elements(list: &NodeList) -> Vec<Element> {
    let mut elements = Vec::with_capacity(list.length() as usize);
    for i in 0..list.length() {
        if let Some(node) = list.item(i) {
            if let Ok(element) = node.dyn_into::<Element>() {
                elements.push(element);
            }
        }
    }
    elements
}

impl FeedDocument for WebDocument {
    type Element = Element;

    fn query_all(&self, selector: &str) -> Vec<Element> {
        match self.document.query_selector_all(selector) {
            Ok(list) => collect_elements(&list),
            Err(e) => {
                log::warn!("Ignoring selector '{}': {:?}", selector, e);
                Vec::new()
            }
        }
    }

    fn query_within(&self, root: &Element, selector: &str) -> Vec<Element> {
        match root.query_selector_all(selector) {
            Ok(list) => collect_elements(&list),
            Err(e) => {
                log::warn!("Ignoring selector '{}': {:?}", selector, e);
                Vec::new()
            }
        }
    }

    fn query_first(&self, selector: &str) -> Option<Element> {
        self.document.query_selector(selector).ok().flatten()
    }

    fn matches(&self, element: &Element, selector: &str) -> bool {
        element.matches(selector).unwrap_or(false)
    }

    fn closest(&self, element: &Element, selector: &str) -> Option<Element> {
        element.closest(selector).ok().flatten()
    }

    fn parent(&self, element: &Element) -> Option<Element> {
        element.parent_element()
    }

    fn body(&self) -> Option<Element> {
        self.document
            .body()
            .map(Element::from)
            .or_else(|| self.document.document_element())
    }

    fn text_content(&self, element: &Element) -> String {
        element.text_content().unwrap_or_default()
    }

    fn attribute(&self, element: &Element, name: &str) -> Option<String> {
        element.get_attribute(name)
    }

    fn set_attribute(&mut self, element: &Element, name: &str, value: &str) {
        if let Err(e) = element.set_attribute(name, value) {
            log::warn!("Failed to set {}: {:?}", name, e);
        }
    }

    fn has_class(&self, element: &Element, class: &str) -> bool {
        element.class_list().contains(class)
    }

    fn add_class(&mut self, element: &Element, class: &str) {
        if let Err(e) = element.class_list().add_1(class) {
            log::warn!("Failed to add class {}: {:?}", class, e);
        }
    }

    fn remove_class(&mut self, element: &Element, class: &str) {
        if let Err(e) = element.class_list().remove_1(class) {
            log::warn!("Failed to remove class {}: {:?}", class, e);
        }
    }

    fn bounding_rect(&self, element: &Element) -> Rect {
        let rect = element.get_bounding_client_rect();
        Rect::new(rect.top(), rect.bottom())
    }

    fn viewport_height(&self) -> f64 {
        self.window
            .inner_height()
            .ok()
            .and_then(|height| height.as_f64())
            .unwrap_or(0.0)
    }

    fn is_ancestor(&self, ancestor: &Element, element: &Element) -> bool {
        let node: &Node = element.as_ref();
        ancestor != element && ancestor.contains(Some(node))
    }
}
