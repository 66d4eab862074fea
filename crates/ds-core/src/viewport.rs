//! Viewport proximity test used to prioritize scanning.

use crate::dom::{FeedDocument, Rect};

/// Default vertical buffer around the viewport, in CSS pixels.
pub const DEFAULT_VIEWPORT_BUFFER: f64 = 500.0;

/// True if `rect`, grown by `buffer` above and below, overlaps the viewport.
#[inline]
pub fn rect_near_viewport(rect: Rect, viewport_height: f64, buffer: f64) -> bool {
    rect.bottom >= -buffer && rect.top <= viewport_height + buffer
}

pub fn is_near_viewport<D: FeedDocument>(doc: &D, element: &D::Element, buffer: f64) -> bool {
    rect_near_viewport(doc.bounding_rect(element), doc.viewport_height(), buffer)
}
