//! Scanner configuration and persisted settings.
//!
//! Selector lists are data: they track the host site's markup and change
//! without touching scanner logic. Defaults target the LinkedIn feed.

use serde::{Deserialize, Serialize};

use crate::viewport::DEFAULT_VIEWPORT_BUFFER;

/// Error type for configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_posts_per_batch must be at least 1")]
    ZeroBatch,
    #[error("min_time_between_runs must be greater than zero")]
    ZeroRunInterval,
    #[error("No post selectors configured")]
    NoPostSelectors,
    #[error("Empty {0}")]
    EmptyName(&'static str),
    #[error("Viewport buffer must be finite and non-negative, got {0}")]
    InvalidBuffer(String),
}

/// How a post selector match is confirmed as a top-level post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum Acceptance {
    /// The element must be its own closest ancestor matching the top-level
    /// post selector.
    SelfClosest,
    /// Any match is a post.
    Always,
    /// The named attribute must contain `needle`.
    AttributeContains { name: String, needle: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSelector {
    pub selector: String,
    #[serde(flatten)]
    pub accept: Acceptance,
}

impl PostSelector {
    pub fn new(selector: &str, accept: Acceptance) -> Self {
        Self {
            selector: selector.to_string(),
            accept,
        }
    }
}

/// Scanner, scheduler and observation configuration.
///
/// All durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub max_posts_per_batch: usize,
    pub batch_cooldown: u64,
    pub observer_debounce: u64,
    pub min_time_between_runs: u64,
    pub scroll_debounce: u64,
    /// Vertical buffer around the viewport, in CSS pixels
    pub viewport_buffer: f64,
    /// Only scan posts near the viewport. Off-screen posts wait for a scroll.
    pub viewport_only: bool,
    pub post_selectors: Vec<PostSelector>,
    pub top_level_selector: String,
    /// Ordered content selectors used for text extraction
    pub content_selectors: Vec<String>,
    /// Observation roots, tried in order before falling back to the body
    pub feed_container_selectors: Vec<String>,
    pub marker_attribute: String,
    pub hidden_class: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_posts_per_batch: 10,
            batch_cooldown: 1000,
            observer_debounce: 500,
            min_time_between_runs: 2000,
            scroll_debounce: 300,
            viewport_buffer: DEFAULT_VIEWPORT_BUFFER,
            viewport_only: true,
            post_selectors: vec![
                PostSelector::new(".feed-shared-update-v2", Acceptance::SelfClosest),
                PostSelector::new(".occludable-update", Acceptance::Always),
                PostSelector::new(
                    "[data-urn]",
                    Acceptance::AttributeContains {
                        name: "data-urn".to_string(),
                        needle: "activity".to_string(),
                    },
                ),
            ],
            top_level_selector: ".feed-shared-update-v2".to_string(),
            content_selectors: [
                ".feed-shared-update-v2__description",
                ".feed-shared-text",
                ".feed-shared-inline-show-more-text",
                ".update-components-text",
                "[data-ad-preview=\"message\"]",
                ".break-words",
                ".feed-shared-update-v2__commentary",
                ".feed-shared-text-view",
                "[dir=\"ltr\"]",
                "span[aria-hidden=\"true\"]",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            feed_container_selectors: vec![
                ".scaffold-finite-scroll__content".to_string(),
                "main".to_string(),
            ],
            marker_attribute: "data-deslopified".to_string(),
            hidden_class: "deslopify-hidden".to_string(),
        }
    }
}

impl ScannerConfig {
    /// Check values that would stall or break scanning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_posts_per_batch == 0 {
            return Err(ConfigError::ZeroBatch);
        }
        if self.min_time_between_runs == 0 {
            return Err(ConfigError::ZeroRunInterval);
        }
        if self.post_selectors.is_empty() {
            return Err(ConfigError::NoPostSelectors);
        }
        if self.marker_attribute.trim().is_empty() {
            return Err(ConfigError::EmptyName("marker attribute"));
        }
        if self.hidden_class.trim().is_empty() {
            return Err(ConfigError::EmptyName("hidden class"));
        }
        if !self.viewport_buffer.is_finite() || self.viewport_buffer < 0.0 {
            return Err(ConfigError::InvalidBuffer(self.viewport_buffer.to_string()));
        }
        Ok(())
    }

    /// Selector for posts carrying the given classification.
    pub fn marked_selector(&self, state: &str) -> String {
        format!("[{}=\"{}\"]", self.marker_attribute, state)
    }
}

/// Persisted user settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { enabled: true }
    }
}
