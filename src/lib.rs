//! # accessmatic
//!
//! Find the PDF links on a web page and serve an accessible HTML rendition
//! when a reader clicks one, from a remote processing API when it can be
//! reached and from a local degraded pipeline when it cannot.
//!
//! ## Why this crate?
//!
//! Public-sector sites publish agendas, minutes and budgets as PDFs that
//! screen readers handle poorly, often behind download endpoints with no
//! `.pdf` extension, on networks that block third-party APIs. This crate
//! models the embeddable widget that fixes that: heuristic discovery,
//! per-URL deduplicated processing, and graceful fallback.
//!
//! ## Flow Overview
//!
//! ```text
//! Page
//!  │
//!  ├─ 1. Probe      one bounded health check → NetworkStatus
//!  ├─ 2. Discover   classify links, enhance matches, observe DOM changes
//!  ├─ 3. Click      check-then-set per URL: replay │ ignore │ admit
//!  ├─ 4. Process    remote submit + poll, or local synthesis
//!  ├─ 5. Cache      Arc<AccessibleResult>, first result wins
//!  └─ 6. Present    Processing │ Document │ Error view, one surface at a time
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use accessmatic::{AccessMatic, NoopPresenter, Page, WidgetConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let page = Arc::new(Page::load("https://city.gov/council", None, 30).await?);
//!     let config = WidgetConfig::builder().api_key("am_live_123").build()?;
//!     let widget = AccessMatic::init_http(config, page, Arc::new(NoopPresenter)).await?;
//!
//!     for link in widget.discovered() {
//!         let outcome = widget.process_url(&link.normalized_url).await?;
//!         if let Some(result) = outcome.result() {
//!             println!("{} → score {}", result.source_url, result.accessibility_score);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `accessmatic` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! accessmatic = { version = "1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod cache;
pub mod classify;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod output;
pub mod page;
pub mod pipeline;
pub mod presentation;
pub mod render;
pub mod widget;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{BackendDocument, DocumentBackend, HttpBackend, Submission, TaskState};
pub use cache::ResultCache;
pub use classify::{classify_candidate, is_pdf_link};
pub use config::{DiscoveryMode, WidgetConfig, WidgetConfigBuilder, DEFAULT_API_URL};
pub use connectivity::NetworkStatus;
pub use coordinator::{ClickDisposition, ProcessOutcome, ProcessingState};
pub use discovery::DiscoveredLink;
pub use error::{AccessMaticError, ErrorKind, ProcessingError};
pub use output::{AccessibleResult, ComplianceLevel, ProcessingMethod};
pub use page::{ElementId, Page};
pub use presentation::{DismissReason, NoopPresenter, Presenter, View};
pub use render::render_view;
pub use widget::{AccessMatic, ClickResponse};
