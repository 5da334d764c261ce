//! Presentation boundary: a view-model per UI state and a rendering trait.
//!
//! The coordinator never builds markup. It hands a [`View`] to the
//! [`PresentationLayer`], which keeps at most one surface visible and
//! forwards to an injected [`Presenter`]. Markup for a view, when needed, is
//! produced by [`crate::render::render_view`].
//!
//! # Example
//!
//! ```rust
//! use accessmatic::{Presenter, View};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingPresenter {
//!     shown: AtomicUsize,
//! }
//!
//! impl Presenter for CountingPresenter {
//!     fn render(&self, view: &View) {
//!         self.shown.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("showing {}", view.label());
//!     }
//! }
//!
//! let presenter: Arc<dyn Presenter> = Arc::new(CountingPresenter {
//!     shown: AtomicUsize::new(0),
//! });
//! ```

use crate::output::AccessibleResult;
use crate::pipeline::local::display_name;
use reqwest::Url;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// One renderable UI state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    /// Work is in flight for `url`.
    Processing {
        url: String,
        file_name: String,
        /// Show the "secure network detected" notice.
        network_notice: bool,
    },
    /// A finished rendition. Shares the cached allocation.
    Document {
        result: Arc<AccessibleResult>,
        show_branding: bool,
    },
    /// Processing failed for `url`.
    Error {
        url: String,
        file_name: String,
        message: String,
        /// Raw error text, present only in debug mode.
        detail: Option<String>,
        retry_available: bool,
        network_blocked: bool,
    },
}

impl View {
    pub fn url(&self) -> &str {
        match self {
            View::Processing { url, .. } | View::Error { url, .. } => url,
            View::Document { result, .. } => &result.source_url,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            View::Processing { .. } => "processing",
            View::Document { .. } => "document",
            View::Error { .. } => "error",
        }
    }
}

/// Why a surface was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    Close,
    Overlay,
    Escape,
}

/// Rendering boundary implemented by the host.
///
/// Implementations must be `Send + Sync`; views can be shown from any task.
/// Both methods default to no-ops.
pub trait Presenter: Send + Sync {
    /// Make `view` the visible surface.
    fn render(&self, view: &View) {
        let _ = view;
    }

    /// Remove the visible surface, if any.
    fn retire(&self) {}
}

/// Presenter that draws nothing.
pub struct NoopPresenter;

impl Presenter for NoopPresenter {}

/// Owns the single visible surface.
pub struct PresentationLayer {
    presenter: Arc<dyn Presenter>,
    current: Mutex<Option<View>>,
}

impl PresentationLayer {
    pub fn new(presenter: Arc<dyn Presenter>) -> Self {
        Self {
            presenter,
            current: Mutex::new(None),
        }
    }

    /// Show `view`, retiring whatever was visible before.
    pub fn show(&self, view: View) {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        if current.take().is_some() {
            self.presenter.retire();
        }
        debug!("Presenting {} view for {}", view.label(), view.url());
        self.presenter.render(&view);
        *current = Some(view);
    }

    /// Close the visible surface. Processing state is not touched.
    ///
    /// Returns `false` when nothing was visible.
    pub fn dismiss(&self, reason: DismissReason) -> bool {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        match current.take() {
            Some(view) => {
                debug!("Dismissed {} view ({:?})", view.label(), reason);
                self.presenter.retire();
                true
            }
            None => false,
        }
    }

    /// The visible view, if any.
    pub fn current(&self) -> Option<View> {
        self.current
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

/// Bucket for the accessibility score badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreClass {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ScoreClass {
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => ScoreClass::Excellent,
            80..=89 => ScoreClass::Good,
            70..=79 => ScoreClass::Fair,
            _ => ScoreClass::Poor,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScoreClass::Excellent => "excellent",
            ScoreClass::Good => "good",
            ScoreClass::Fair => "fair",
            ScoreClass::Poor => "poor",
        }
    }
}

/// Display name for a URL, tolerating unparseable input.
pub fn file_name_for(url: &str) -> String {
    match Url::parse(url) {
        Ok(u) => display_name(&u),
        Err(_) => url
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or("Document")
            .to_string(),
    }
}
