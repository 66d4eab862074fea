//! Post text extraction.

use crate::dom::FeedDocument;

/// Collect the text a reader would see in `post`.
///
/// Every descendant matching each content selector contributes its text, in
/// selector order, each preceded by a single space. A selector matching
/// several descendants contributes all of them. When the selectors produce
/// nothing but whitespace the whole subtree's text is used instead.
pub fn extract_post_text<D: FeedDocument>(
    doc: &D,
    post: &D::Element,
    content_selectors: &[String],
) -> String {
    let mut text = String::new();
    for selector in content_selectors {
        for element in doc.query_within(post, selector) {
            text.push(' ');
            text.push_str(&doc.text_content(&element));
        }
    }

    if text.trim().is_empty() {
        return doc.text_content(post);
    }
    text
}
