//! De-Slopify Core Library
//!
//! Scans a social feed for posts containing emoji or em dashes and hides them.
//! The crate is host-agnostic: the page is reached through the
//! [`dom::FeedDocument`] trait and time through [`timer::TimerHost`], so the
//! whole pipeline runs the same against the browser DOM and in tests.
//!
//! # Modules
//!
//! - `detect`: emoji / em dash predicate
//! - `extract`: post text extraction with selector priority and fallback
//! - `dom`: document abstraction and in-memory implementation
//! - `viewport`: viewport proximity test
//! - `scanner`: post enumeration, classification and DOM marking
//! - `scheduler`: scan rate limiting
//! - `observer`: observation root and mutation filtering
//! - `timer`: timer slots and a virtual clock
//! - `controller`: event handling and runtime state ownership
//! - `messages`: popup / badge message protocol
//! - `config`: scanner configuration and persisted settings

pub mod config;
pub mod controller;
pub mod detect;
pub mod dom;
pub mod extract;
pub mod messages;
pub mod observer;
pub mod scanner;
pub mod scheduler;
pub mod state;
pub mod timer;
pub mod viewport;

// Re-export commonly used types
pub use config::{ConfigError, ScannerConfig, Settings};
pub use controller::{Controller, CountSink};
pub use detect::{contains_slop, find_slop, SlopKind, SlopMatch};
pub use dom::{FeedDocument, Rect};
#[cfg(feature = "memory-dom")]
pub use dom::MemoryDocument;
pub use messages::{ContentRequest, ContentResponse, CountUpdate};
pub use scanner::{Classification, PostScanner, ScanReport};
pub use state::{RuntimeState, ScanTrigger};
pub use timer::{TimerHost, TimerSlot, VirtualTimers};
