//! Message protocol between the popup, the content script and the badge.
//!
//! TypeScript declarations for these types are generated by `ts-rs` into
//! `bindings/` when the crate's tests run.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Popup -> content script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "camelCase")]
#[ts(export)]
pub enum ContentRequest {
    Toggle { enabled: bool },
    GetCount,
}

/// Content script -> popup, in reply to a [`ContentRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum ContentResponse {
    Toggled { success: bool },
    Count { count: u32 },
}

/// Content script -> extension badge and popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "camelCase")]
#[ts(export)]
pub enum CountUpdate {
    UpdateCount { count: u32 },
}

impl CountUpdate {
    pub fn count(self) -> u32 {
        match self {
            Self::UpdateCount { count } => count,
        }
    }
}
