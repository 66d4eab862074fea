//! Observation policy: which element to watch and which mutations count.

use crate::config::ScannerConfig;
use crate::dom::FeedDocument;

/// Where the observation root came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootSource {
    /// Matched the configured container selector
    Container(String),
    Body,
}

#[derive(Debug, Clone)]
pub struct ObservationRoot<E> {
    pub element: E,
    pub source: RootSource,
}

/// Pick the element to observe: the first configured feed container present
/// in the page, otherwise the body.
pub fn resolve_observation_root<D: FeedDocument>(
    doc: &D,
    config: &ScannerConfig,
) -> Option<ObservationRoot<D::Element>> {
    for selector in &config.feed_container_selectors {
        if let Some(element) = doc.query_first(selector) {
            log::debug!("Observing feed container '{}'", selector);
            return Some(ObservationRoot {
                element,
                source: RootSource::Container(selector.clone()),
            });
        }
    }

    log::debug!("No feed container found, observing body");
    doc.body().map(|element| ObservationRoot {
        element,
        source: RootSource::Body,
    })
}

/// Summary of one delivery of mutation records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationBatch {
    pub records: usize,
    /// Element nodes added across all records
    pub added_elements: usize,
}

impl MutationBatch {
    /// Only batches that add elements can bring in new posts.
    pub fn introduces_elements(&self) -> bool {
        self.added_elements > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MemoryDocument, NodeSpec};

    #[test]
    fn test_prefers_feed_container() {
        let doc = MemoryDocument::from_specs(
            800.0,
            vec![NodeSpec::new("main").child(NodeSpec::new("div").class("scaffold-finite-scroll__content"))],
        );
        let root = resolve_observation_root(&doc, &ScannerConfig::default()).unwrap();
        assert_eq!(root.source, RootSource::Container(".scaffold-finite-scroll__content".to_string()));
        assert!(doc.has_class(&root.element, "scaffold-finite-scroll__content"));
    }

    #[test]
    fn test_falls_back_to_broader_container() {
        let doc = MemoryDocument::from_specs(800.0, vec![NodeSpec::new("main")]);
        let root = resolve_observation_root(&doc, &ScannerConfig::default()).unwrap();
        assert_eq!(root.source, RootSource::Container("main".to_string()));
    }

    #[test]
    fn test_falls_back_to_body() {
        let doc = MemoryDocument::from_specs(800.0, vec![NodeSpec::new("section")]);
        let root = resolve_observation_root(&doc, &ScannerConfig::default()).unwrap();
        assert_eq!(root.source, RootSource::Body);
        assert_eq!(root.element, doc.root());
    }

    #[test]
    fn test_mutation_batch() {
        assert!(!MutationBatch { records: 3, added_elements: 0 }.introduces_elements());
        assert!(MutationBatch { records: 1, added_elements: 2 }.introduces_elements());
    }
}
