//! The widget service: one instance per page session.
//!
//! [`AccessMatic`] owns the discovery engine, the coordinator, the result
//! cache and the presentation layer, and hands them to each other
//! explicitly. Construction probes the backend once; the verdict holds for
//! the lifetime of the instance.

use crate::backend::{DocumentBackend, HttpBackend};
use crate::cache::ResultCache;
use crate::config::WidgetConfig;
use crate::connectivity::{probe, NetworkStatus};
use crate::coordinator::{ClickDisposition, Coordinator, ProcessOutcome, ProcessingState};
use crate::discovery::{DiscoveredLink, DiscoveryEngine};
use crate::error::AccessMaticError;
use crate::page::{normalize_url, ClickOutcome, ElementId, Page};
use crate::presentation::{DismissReason, PresentationLayer, Presenter, View};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// What happened when a reader clicked an element.
#[derive(Debug)]
pub enum ClickResponse {
    /// A PDF link: navigation suspended, the coordinator took over.
    Intercepted(ClickDisposition),
    /// Not a PDF link; the browser follows `href`.
    Navigate { href: String },
    /// No such element.
    Missing,
}

pub struct AccessMatic {
    config: WidgetConfig,
    page: Arc<Page>,
    discovery: Arc<DiscoveryEngine>,
    coordinator: Arc<Coordinator>,
    presentation: Arc<PresentationLayer>,
    observer: Option<JoinHandle<()>>,
}

impl AccessMatic {
    /// Start the widget on `page`.
    ///
    /// `backend` is ignored when the configuration disables the remote
    /// pipeline (no API key, or local-only mode). With `auto_discover` the
    /// page is scanned and observed immediately.
    pub async fn init(
        config: WidgetConfig,
        page: Arc<Page>,
        backend: Option<Arc<dyn DocumentBackend>>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        info!("AccessMatic v{} initializing", env!("CARGO_PKG_VERSION"));

        let backend = if config.remote_enabled() {
            backend
        } else {
            debug!("Remote pipeline disabled by configuration");
            None
        };

        let reachable = probe(backend.as_deref(), &config).await;
        let network = NetworkStatus::new(!reachable);

        let presentation = Arc::new(PresentationLayer::new(presenter));
        let coordinator = Arc::new(Coordinator::new(
            config.clone(),
            backend,
            network,
            Arc::new(ResultCache::new()),
            Arc::clone(&presentation),
        ));
        let discovery = Arc::new(DiscoveryEngine::new(Arc::clone(&page), config.debug));

        let observer = if config.auto_discover {
            let handle = discovery.observe();
            discovery.scan();
            Some(handle)
        } else {
            None
        };

        info!(
            "AccessMatic ready: {} PDF links, network {}",
            discovery.discovered_count(),
            if network.blocked { "blocked" } else { "available" }
        );

        Self {
            config,
            page,
            discovery,
            coordinator,
            presentation,
            observer,
        }
    }

    /// Start the widget with the HTTP backend built from `config`.
    pub async fn init_http(
        config: WidgetConfig,
        page: Arc<Page>,
        presenter: Arc<dyn Presenter>,
    ) -> Result<Self, AccessMaticError> {
        let backend = HttpBackend::from_config(&config)?
            .map(|b| Arc::new(b) as Arc<dyn DocumentBackend>);
        Ok(Self::init(config, page, backend, presenter).await)
    }

    /// Start the widget from the page's own `<script data-accessmatic-key>`
    /// tag, the way an embedding page configures it.
    pub async fn from_page(
        page: Arc<Page>,
        presenter: Arc<dyn Presenter>,
    ) -> Result<Self, AccessMaticError> {
        let attrs = page.script_attributes().ok_or_else(|| {
            AccessMaticError::InvalidConfig(
                "page has no <script> tag carrying data-accessmatic-key".into(),
            )
        })?;
        let config = WidgetConfig::from_script_attributes(attrs)?;
        Self::init_http(config, page, presenter).await
    }

    /// Route a click on element `id`.
    pub fn click(&self, id: ElementId) -> ClickResponse {
        match self.page.click(id) {
            ClickOutcome::Intercepted { url } => {
                ClickResponse::Intercepted(self.coordinator.handle_click(&url))
            }
            ClickOutcome::Navigate { href } => ClickResponse::Navigate { href },
            ClickOutcome::Missing => ClickResponse::Missing,
        }
    }

    /// Process a PDF URL (absolute or relative to the page) and wait for
    /// the outcome.
    pub async fn process_url(&self, url: &str) -> Result<ProcessOutcome, AccessMaticError> {
        let url = self.normalize(url)?;
        Ok(self.coordinator.process_url(&url).await)
    }

    /// Retry a URL after a failure.
    pub fn retry(&self, url: &str) -> Result<ClickDisposition, AccessMaticError> {
        let url = self.normalize(url)?;
        Ok(self.coordinator.retry(&url))
    }

    /// Rescan the whole page; returns the number of new PDF URLs.
    pub fn discover_new_pdfs(&self) -> usize {
        self.discovery.scan()
    }

    /// Number of PDFs with a cached rendition.
    pub fn processed_count(&self) -> usize {
        self.coordinator.processed_count()
    }

    pub fn discovered_count(&self) -> usize {
        self.discovery.discovered_count()
    }

    pub fn discovered(&self) -> Vec<DiscoveredLink> {
        self.discovery.discovered()
    }

    pub fn is_network_blocked(&self) -> bool {
        self.coordinator.network().blocked
    }

    pub fn network_status(&self) -> NetworkStatus {
        self.coordinator.network()
    }

    /// Close the visible surface. In-flight work keeps running.
    pub fn dismiss(&self, reason: DismissReason) -> bool {
        self.presentation.dismiss(reason)
    }

    pub fn current_view(&self) -> Option<View> {
        self.presentation.current()
    }

    /// Processing state of `url`; unresolvable input reads as `Unprocessed`.
    pub fn state_of(&self, url: &str) -> ProcessingState {
        match self.normalize(url) {
            Ok(url) => self.coordinator.state(&url),
            Err(_) => ProcessingState::Unprocessed,
        }
    }

    /// Pipeline executions started so far.
    pub fn pipeline_runs(&self) -> usize {
        self.coordinator.pipeline_runs()
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }

    fn normalize(&self, url: &str) -> Result<String, AccessMaticError> {
        normalize_url(self.page.base_url(), url)
            .map(|u| u.to_string())
            .ok_or_else(|| AccessMaticError::InvalidUrl {
                input: url.to_string(),
                reason: "not an http, https or file URL".into(),
            })
    }
}

impl Drop for AccessMatic {
    fn drop(&mut self) {
        if let Some(handle) = self.observer.take() {
            handle.abort();
        }
    }
}
