//! Post Scanner
//!
//! Finds top-level feed posts, classifies the ones not seen before and marks
//! them in the DOM:
//!
//! - `data-deslopified="hidden"` plus the hide class for slop
//! - `data-deslopified="clean"` for everything else
//!
//! The marker attribute is the only record of classification, so a post is
//! examined at most once for the life of its node.

use crate::config::{Acceptance, ScannerConfig};
use crate::detect::contains_slop;
use crate::dom::FeedDocument;
use crate::extract::extract_post_text;
use crate::viewport::is_near_viewport;

/// Classification recorded on a post element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Clean,
    Hidden,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Hidden => "hidden",
        }
    }

    /// Parse a marker value. Unknown values are treated as unclassified.
    pub fn from_marker(value: &str) -> Option<Self> {
        match value {
            "clean" => Some(Self::Clean),
            "hidden" => Some(Self::Hidden),
            _ => None,
        }
    }
}

/// Outcome of one scan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Unclassified posts eligible for this pass
    pub eligible: usize,
    pub processed: usize,
    pub hidden: usize,
    pub clean: usize,
    /// Eligible posts left for a later pass
    pub remaining: usize,
}

pub struct PostScanner<'a> {
    config: &'a ScannerConfig,
}

impl<'a> PostScanner<'a> {
    pub fn new(config: &'a ScannerConfig) -> Self {
        Self { config }
    }

    /// Top-level posts in document order, each listed once.
    pub fn candidates<D: FeedDocument>(&self, doc: &D) -> Vec<D::Element> {
        let combined = self
            .config
            .post_selectors
            .iter()
            .map(|s| s.selector.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let mut matched = doc.query_all(&combined);
        if matched.is_empty() {
            // One bad selector sinks the whole list; query them one at a time.
            for post_selector in &self.config.post_selectors {
                for element in doc.query_all(&post_selector.selector) {
                    if !matched.contains(&element) {
                        matched.push(element);
                    }
                }
            }
        }

        matched.retain(|element| self.is_accepted(doc, element));

        let accepted = matched.clone();
        matched.retain(|element| !accepted.iter().any(|other| doc.is_ancestor(other, element)));
        matched
    }

    fn is_accepted<D: FeedDocument>(&self, doc: &D, element: &D::Element) -> bool {
        self.config.post_selectors.iter().any(|post_selector| {
            if !doc.matches(element, &post_selector.selector) {
                return false;
            }
            match &post_selector.accept {
                Acceptance::Always => true,
                Acceptance::SelfClosest => doc
                    .closest(element, &self.config.top_level_selector)
                    .map_or(false, |closest| &closest == element),
                Acceptance::AttributeContains { name, needle } => doc
                    .attribute(element, name)
                    .map_or(false, |value| value.contains(needle.as_str())),
            }
        })
    }

    /// Recorded classification, if any.
    pub fn classification<D: FeedDocument>(&self, doc: &D, element: &D::Element) -> Option<Classification> {
        doc.attribute(element, &self.config.marker_attribute)
            .and_then(|value| Classification::from_marker(&value))
    }

    /// Classify and mark `element`. Returns `None` if it was already marked.
    pub fn classify<D: FeedDocument>(&self, doc: &mut D, element: &D::Element) -> Option<Classification> {
        if self.classification(doc, element).is_some() {
            return None;
        }

        let text = extract_post_text(doc, element, &self.config.content_selectors);
        let result = if contains_slop(&text) {
            doc.add_class(element, &self.config.hidden_class);
            Classification::Hidden
        } else {
            Classification::Clean
        };
        doc.set_attribute(element, &self.config.marker_attribute, result.as_str());
        log::trace!("Classified post as {}", result.as_str());
        Some(result)
    }

    /// Unclassified posts eligible for scanning, in document order.
    pub fn eligible<D: FeedDocument>(&self, doc: &D) -> Vec<D::Element> {
        self.candidates(doc)
            .into_iter()
            .filter(|element| self.classification(doc, element).is_none())
            .filter(|element| {
                !self.config.viewport_only || is_near_viewport(doc, element, self.config.viewport_buffer)
            })
            .collect()
    }

    /// Run one bounded pass, adding newly hidden posts to `hidden_count`.
    pub fn scan<D: FeedDocument>(&self, doc: &mut D, hidden_count: &mut u32) -> ScanReport {
        let eligible = self.eligible(doc);
        let mut report = ScanReport {
            eligible: eligible.len(),
            ..ScanReport::default()
        };

        for element in eligible.iter().take(self.config.max_posts_per_batch) {
            match self.classify(doc, element) {
                Some(Classification::Hidden) => {
                    report.hidden += 1;
                    *hidden_count += 1;
                }
                Some(Classification::Clean) => report.clean += 1,
                None => continue,
            }
            report.processed += 1;
        }

        report.remaining = report.eligible - report.processed.min(report.eligible);
        report
    }

    /// Remove the hide class from every hidden post, keeping the markers.
    pub fn reveal_hidden<D: FeedDocument>(&self, doc: &mut D) -> usize {
        let hidden = doc.query_all(&self.config.marked_selector(Classification::Hidden.as_str()));
        for element in &hidden {
            doc.remove_class(element, &self.config.hidden_class);
        }
        hidden.len()
    }

    /// Re-apply the hide class to every post marked hidden.
    pub fn rehide<D: FeedDocument>(&self, doc: &mut D) -> usize {
        let hidden = doc.query_all(&self.config.marked_selector(Classification::Hidden.as_str()));
        for element in &hidden {
            doc.add_class(element, &self.config.hidden_class);
        }
        hidden.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MemoryDocument, NodeSpec};

    fn post(text: &str) -> NodeSpec {
        NodeSpec::new("div")
            .class("feed-shared-update-v2")
            .child(NodeSpec::new("span").class("break-words").text(text))
            .height(100.0)
    }

    fn feed(posts: Vec<NodeSpec>) -> MemoryDocument {
        let mut main = NodeSpec::new("main");
        for p in posts {
            main = main.child(p);
        }
        MemoryDocument::from_specs(800.0, vec![main])
    }

    #[test]
    fn test_classify_marks_and_hides() {
        let config = ScannerConfig::default();
        let scanner = PostScanner::new(&config);
        let mut doc = feed(vec![post("Thrilled to announce 🎉"), post("Quarterly update.")]);
        let mut count = 0;

        let report = scanner.scan(&mut doc, &mut count);
        assert_eq!(report, ScanReport { eligible: 2, processed: 2, hidden: 1, clean: 1, remaining: 0 });
        assert_eq!(count, 1);

        let posts = scanner.candidates(&doc);
        assert_eq!(doc.attribute(&posts[0], "data-deslopified").as_deref(), Some("hidden"));
        assert!(doc.has_class(&posts[0], "deslopify-hidden"));
        assert_eq!(doc.attribute(&posts[1], "data-deslopified").as_deref(), Some("clean"));
        assert!(!doc.has_class(&posts[1], "deslopify-hidden"));
    }

    #[test]
    fn test_classification_is_idempotent() {
        let config = ScannerConfig::default();
        let scanner = PostScanner::new(&config);
        let mut doc = feed(vec![post("New role — excited")]);
        let mut count = 0;
        scanner.scan(&mut doc, &mut count);

        let before = doc.clone();
        let element = scanner.candidates(&doc)[0];
        assert_eq!(scanner.classify(&mut doc, &element), None);
        let report = scanner.scan(&mut doc, &mut count);

        assert_eq!(report.processed, 0);
        assert_eq!(count, 1);
        assert_eq!(doc.attribute(&element, "data-deslopified"), before.attribute(&element, "data-deslopified"));
        assert!(doc.has_class(&element, "deslopify-hidden"));
    }

    #[test]
    fn test_count_grows_by_newly_hidden() {
        let config = ScannerConfig::default();
        let scanner = PostScanner::new(&config);
        let mut doc = feed(vec![post("a 🚀"), post("b"), post("c — d"), post("e ✅")]);
        let mut count = 5;
        let report = scanner.scan(&mut doc, &mut count);
        assert_eq!(report.hidden, 3);
        assert_eq!(count, 8);
    }

    #[test]
    fn test_batch_limit_and_remaining() {
        let config = ScannerConfig {
            max_posts_per_batch: 3,
            viewport_only: false,
            ..ScannerConfig::default()
        };
        let scanner = PostScanner::new(&config);
        let mut doc = feed((0..7).map(|i| post(&format!("post {i}"))).collect());
        let mut count = 0;

        let first = scanner.scan(&mut doc, &mut count);
        assert_eq!((first.processed, first.remaining), (3, 4));
        let second = scanner.scan(&mut doc, &mut count);
        assert_eq!((second.eligible, second.processed, second.remaining), (4, 3, 1));

        // Document order: the first three posts went first.
        let posts = scanner.candidates(&doc);
        assert!(scanner.classification(&doc, &posts[5]).is_some());
        assert!(scanner.classification(&doc, &posts[6]).is_none());
    }

    #[test]
    fn test_viewport_filter_defers_far_posts() {
        let config = ScannerConfig::default();
        let scanner = PostScanner::new(&config);
        // Viewport 800 + buffer 500: posts starting past 1300px wait.
        let mut doc = feed((0..20).map(|_| post("plain")).collect());
        let mut count = 0;
        let report = scanner.scan(&mut doc, &mut count);
        assert_eq!(report.eligible, 14);
        assert_eq!(report.processed, 10);

        doc.scroll_to(1500.0);
        let eligible = scanner.eligible(&doc);
        assert_eq!(eligible.len(), 10);
    }

    #[test]
    fn test_nested_posts_are_excluded() {
        let config = ScannerConfig::default();
        let scanner = PostScanner::new(&config);
        let reshare = NodeSpec::new("div")
            .class("feed-shared-update-v2")
            .attr("data-urn", "urn:li:activity:2")
            .child(NodeSpec::new("span").class("break-words").text("inner 🎉"));
        let outer = NodeSpec::new("div")
            .class("feed-shared-update-v2")
            .attr("data-urn", "urn:li:activity:1")
            .child(NodeSpec::new("span").class("break-words").text("outer"))
            .child(reshare);
        let doc = feed(vec![outer]);

        let candidates = scanner.candidates(&doc);
        assert_eq!(candidates.len(), 1);
        assert_eq!(doc.attribute(&candidates[0], "data-urn").as_deref(), Some("urn:li:activity:1"));
    }

    #[test]
    fn test_acceptance_rules() {
        let config = ScannerConfig::default();
        let scanner = PostScanner::new(&config);
        let doc = feed(vec![
            NodeSpec::new("div").class("occludable-update").text("x"),
            NodeSpec::new("div").attr("data-urn", "urn:li:activity:9").text("y"),
            NodeSpec::new("div").attr("data-urn", "urn:li:company:9").text("z"),
        ]);
        let candidates = scanner.candidates(&doc);
        assert_eq!(candidates.len(), 2);
        assert_eq!(doc.text_content(&candidates[0]), "x");
        assert_eq!(doc.text_content(&candidates[1]), "y");
    }

    #[test]
    fn test_matched_by_several_selectors_listed_once() {
        let config = ScannerConfig::default();
        let scanner = PostScanner::new(&config);
        let doc = feed(vec![NodeSpec::new("div")
            .class("feed-shared-update-v2")
            .class("occludable-update")
            .attr("data-urn", "urn:li:activity:1")]);
        assert_eq!(scanner.candidates(&doc).len(), 1);
    }

    #[test]
    fn test_bad_post_selector_degrades_per_selector() {
        let mut config = ScannerConfig::default();
        config.post_selectors.insert(
            0,
            crate::config::PostSelector::new("div >", Acceptance::Always),
        );
        let scanner = PostScanner::new(&config);
        let doc = feed(vec![post("one"), post("two")]);
        assert_eq!(scanner.candidates(&doc).len(), 2);
    }

    #[test]
    fn test_reveal_and_rehide() {
        let config = ScannerConfig::default();
        let scanner = PostScanner::new(&config);
        let mut doc = feed(vec![post("🎉"), post("ok"), post("—")]);
        let mut count = 0;
        scanner.scan(&mut doc, &mut count);

        assert_eq!(scanner.reveal_hidden(&mut doc), 2);
        assert!(doc.query_all(".deslopify-hidden").is_empty());
        assert_eq!(doc.query_all("[data-deslopified=\"hidden\"]").len(), 2);

        assert_eq!(scanner.rehide(&mut doc), 2);
        assert_eq!(doc.query_all(".deslopify-hidden").len(), 2);
        assert_eq!(count, 2);
    }
}
