//! Processing coordinator: the per-URL state machine.
//!
//! ```text
//!  Unprocessed ──click──▶ InFlight ──ok──▶ Completed(result)   (terminal)
//!                            │
//!                            └──err──▶ Failed(error) ──click/retry──▶ InFlight
//! ```
//!
//! ## Guarantees
//!
//! - **At most one run per URL.** [`Coordinator::admit`] checks and sets the
//!   state under one lock acquisition, before the first `.await`. A second
//!   click on an in-flight URL only re-presents the processing view.
//! - **Computed at most once.** A `Completed` URL replays the cached
//!   `Arc<AccessibleResult>`; no pipeline runs.
//! - **Never stuck in flight.** Every run settles to `Completed` or `Failed`.
//!   A run that is dropped before settling (task aborted or panicked) is
//!   recorded as `Failed`.
//!
//! ## Routing
//!
//! Remote when the session probe succeeded and a backend is configured,
//! local otherwise. Remote transport errors ([`ProcessingError::falls_back_to_local`])
//! fall back to local; a backend failure verdict or a poll timeout does not.

use crate::backend::DocumentBackend;
use crate::cache::ResultCache;
use crate::config::WidgetConfig;
use crate::connectivity::NetworkStatus;
use crate::error::ProcessingError;
use crate::output::AccessibleResult;
use crate::pipeline::{local::process_local, remote::process_remote};
use crate::presentation::{file_name_for, PresentationLayer, View};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Where one URL is in its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingState {
    Unprocessed,
    InFlight,
    Completed(Arc<AccessibleResult>),
    Failed(ProcessingError),
}

/// Result of the synchronous admission check.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Already completed; the cached result was presented.
    Cached(Arc<AccessibleResult>),
    /// A run is in flight; nothing new was started.
    Busy,
    /// The caller now owns the run and must call [`Coordinator::run`].
    Admitted,
}

/// What a click set in motion.
#[derive(Debug)]
pub enum ClickDisposition {
    Replayed(Arc<AccessibleResult>),
    AlreadyInFlight,
    Dispatched(JoinHandle<ProcessOutcome>),
}

/// Settled outcome of processing one URL.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Completed(Arc<AccessibleResult>),
    Failed(ProcessingError),
}

impl ProcessOutcome {
    pub fn result(&self) -> Option<&Arc<AccessibleResult>> {
        match self {
            ProcessOutcome::Completed(r) => Some(r),
            ProcessOutcome::Failed(_) => None,
        }
    }
}

pub struct Coordinator {
    config: WidgetConfig,
    backend: Option<Arc<dyn DocumentBackend>>,
    network: NetworkStatus,
    cache: Arc<ResultCache>,
    presentation: Arc<PresentationLayer>,
    states: Mutex<HashMap<String, ProcessingState>>,
    settled: Notify,
    pipeline_runs: AtomicUsize,
}

impl Coordinator {
    pub fn new(
        config: WidgetConfig,
        backend: Option<Arc<dyn DocumentBackend>>,
        network: NetworkStatus,
        cache: Arc<ResultCache>,
        presentation: Arc<PresentationLayer>,
    ) -> Self {
        Self {
            config,
            backend,
            network,
            cache,
            presentation,
            states: Mutex::new(HashMap::new()),
            settled: Notify::new(),
            pipeline_runs: AtomicUsize::new(0),
        }
    }

    pub fn network(&self) -> NetworkStatus {
        self.network
    }

    /// Current state of `url`.
    pub fn state(&self, url: &str) -> ProcessingState {
        self.lock()
            .get(url)
            .cloned()
            .unwrap_or(ProcessingState::Unprocessed)
    }

    /// Number of pipeline executions started so far (remote and local
    /// attempts of one run count once).
    pub fn pipeline_runs(&self) -> usize {
        self.pipeline_runs.load(Ordering::SeqCst)
    }

    pub fn processed_count(&self) -> usize {
        self.cache.len()
    }

    /// Check-then-set for `url`, then present the matching view.
    ///
    /// Does not suspend.
    pub fn admit(&self, url: &str) -> Admission {
        let admission = {
            let mut states = self.lock();
            match states.get(url) {
                Some(ProcessingState::Completed(result)) => Admission::Cached(Arc::clone(result)),
                Some(ProcessingState::InFlight) => Admission::Busy,
                _ => {
                    states.insert(url.to_string(), ProcessingState::InFlight);
                    Admission::Admitted
                }
            }
        };

        match &admission {
            Admission::Cached(result) => {
                if self.config.debug {
                    debug!("{}: replaying cached result", url);
                }
                self.presentation.show(self.document_view(Arc::clone(result)));
            }
            Admission::Busy => {
                if self.config.debug {
                    debug!("{}: already in flight", url);
                }
                self.presentation.show(self.processing_view(url));
            }
            Admission::Admitted => {
                info!("Processing PDF: {}", url);
                self.presentation.show(self.processing_view(url));
            }
        }
        admission
    }

    /// Execute the pipeline for an admitted `url` and settle its state.
    pub async fn run(&self, url: &str) -> ProcessOutcome {
        self.pipeline_runs.fetch_add(1, Ordering::SeqCst);
        let mut guard = InFlightGuard::new(self, url);

        let outcome = match self.execute(url).await {
            Ok(result) => {
                let result = self.cache.insert(result);
                info!(
                    "{}: completed ({:?}, score {})",
                    url, result.processing_method, result.accessibility_score
                );
                self.settle(url, ProcessingState::Completed(Arc::clone(&result)));
                self.presentation.show(self.document_view(Arc::clone(&result)));
                ProcessOutcome::Completed(result)
            }
            Err(e) => {
                error!("{}: processing failed: {}", url, e);
                self.settle(url, ProcessingState::Failed(e.clone()));
                self.presentation.show(self.error_view(url, &e));
                ProcessOutcome::Failed(e)
            }
        };
        guard.disarm();
        outcome
    }

    /// Click semantics: replay, ignore, or spawn a run.
    pub fn handle_click(self: &Arc<Self>, url: &str) -> ClickDisposition {
        match self.admit(url) {
            Admission::Cached(result) => ClickDisposition::Replayed(result),
            Admission::Busy => ClickDisposition::AlreadyInFlight,
            Admission::Admitted => {
                // Settles the URL even if the task is aborted before its first poll.
                let mut guard = InFlightGuard::new(Arc::clone(self), url);
                ClickDisposition::Dispatched(tokio::spawn(async move {
                    let outcome = guard.coordinator.run(&guard.url).await;
                    guard.disarm();
                    outcome
                }))
            }
        }
    }

    /// Process `url` and wait for it to settle.
    ///
    /// Joins an in-flight run instead of starting a second one.
    pub async fn process_url(&self, url: &str) -> ProcessOutcome {
        match self.admit(url) {
            Admission::Cached(result) => ProcessOutcome::Completed(result),
            Admission::Admitted => self.run(url).await,
            Admission::Busy => self.wait_settled(url).await,
        }
    }

    /// Explicit retry. A `Failed` URL goes back in flight; any other state
    /// behaves like a click.
    pub fn retry(self: &Arc<Self>, url: &str) -> ClickDisposition {
        if let ProcessingState::Failed(e) = self.state(url) {
            info!("{}: retrying after {:?}", url, e.kind());
        }
        self.handle_click(url)
    }

    async fn execute(&self, url: &str) -> Result<AccessibleResult, ProcessingError> {
        if !self.network.blocked {
            if let Some(backend) = &self.backend {
                match process_remote(backend.as_ref(), url, &self.config).await {
                    Ok(result) => return Ok(result),
                    Err(e) if e.falls_back_to_local() => {
                        warn!("{}: remote processing failed, using local: {}", url, e);
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        process_local(url, &self.config).await
    }

    async fn wait_settled(&self, url: &str) -> ProcessOutcome {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.state(url) {
                ProcessingState::Completed(result) => return ProcessOutcome::Completed(result),
                ProcessingState::Failed(e) => return ProcessOutcome::Failed(e),
                ProcessingState::InFlight | ProcessingState::Unprocessed => {}
            }
            notified.await;
        }
    }

    fn settle(&self, url: &str, state: ProcessingState) {
        self.lock().insert(url.to_string(), state);
        self.settled.notify_waiters();
    }

    /// Settle a run that ended without reaching `settle`.
    fn abandon(&self, url: &str) {
        let mut states = self.lock();
        if matches!(states.get(url), Some(ProcessingState::InFlight)) {
            warn!("{}: run dropped before settling", url);
            states.insert(
                url.to_string(),
                ProcessingState::Failed(ProcessingError::LocalPipeline {
                    detail: "processing was interrupted".into(),
                }),
            );
            drop(states);
            self.settled.notify_waiters();
        }
    }

    fn processing_view(&self, url: &str) -> View {
        View::Processing {
            url: url.to_string(),
            file_name: file_name_for(url),
            network_notice: self.network.blocked,
        }
    }

    fn document_view(&self, result: Arc<AccessibleResult>) -> View {
        View::Document {
            result,
            show_branding: self.config.show_branding,
        }
    }

    fn error_view(&self, url: &str, e: &ProcessingError) -> View {
        View::Error {
            url: url.to_string(),
            file_name: file_name_for(url),
            message: e.user_message(),
            detail: self.config.debug.then(|| e.to_string()),
            retry_available: true,
            network_blocked: self.network.blocked,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ProcessingState>> {
        self.states.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Marks a run `Failed` if it is dropped while still armed.
struct InFlightGuard<C: Borrow<Coordinator>> {
    coordinator: C,
    url: String,
    armed: bool,
}

impl<C: Borrow<Coordinator>> InFlightGuard<C> {
    fn new(coordinator: C, url: &str) -> Self {
        Self {
            coordinator,
            url: url.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<C: Borrow<Coordinator>> Drop for InFlightGuard<C> {
    fn drop(&mut self) {
        if self.armed {
            self.coordinator.borrow().abandon(&self.url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendDocument, Submission, TaskState};
    use crate::output::ProcessingMethod;
    use crate::presentation::NoopPresenter;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct Backend {
        submit_ok: bool,
        submits: AtomicUsize,
    }

    #[async_trait]
    impl DocumentBackend for Backend {
        async fn health(&self) -> Result<(), ProcessingError> {
            Ok(())
        }

        async fn submit(&self, _pdf_url: &str) -> Result<Submission, ProcessingError> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            if self.submit_ok {
                Ok(Submission::Task("t1".into()))
            } else {
                Err(ProcessingError::Submission {
                    status: Some(500),
                    detail: "API Error: 500".into(),
                })
            }
        }

        async fn status(&self, _task_id: &str) -> Result<BackendDocument, ProcessingError> {
            Ok(BackendDocument {
                status: Some(TaskState::Completed),
                accessibility_score: Some(92.0),
                wcag_compliance: Some("AA".into()),
                accessible_html: Some("<h1>Report</h1>".into()),
                ..Default::default()
            })
        }
    }

    fn coordinator(backend: Option<Arc<dyn DocumentBackend>>, blocked: bool) -> Arc<Coordinator> {
        let config = WidgetConfig::builder()
            .api_key("k")
            .local_delay_ms(0)
            .debug(true)
            .build()
            .unwrap();
        Arc::new(Coordinator::new(
            config,
            backend,
            NetworkStatus::new(blocked),
            Arc::new(ResultCache::new()),
            Arc::new(PresentationLayer::new(Arc::new(NoopPresenter))),
        ))
    }

    const URL: &str = "https://city.gov/files/report.pdf";

    #[test]
    fn admission_is_check_then_set() {
        let c = coordinator(None, true);
        assert_eq!(c.state(URL), ProcessingState::Unprocessed);
        assert_eq!(c.admit(URL), Admission::Admitted);
        assert_eq!(c.state(URL), ProcessingState::InFlight);
        assert_eq!(c.admit(URL), Admission::Busy);
    }

    #[tokio::test]
    async fn remote_success_is_cached() {
        let backend = Arc::new(Backend {
            submit_ok: true,
            submits: AtomicUsize::new(0),
        });
        let c = coordinator(Some(backend.clone()), false);

        let outcome = c.process_url(URL).await;
        let result = outcome.result().unwrap().clone();
        assert_eq!(result.processing_method, ProcessingMethod::Remote);
        assert_eq!(c.processed_count(), 1);

        let again = c.process_url(URL).await;
        assert!(Arc::ptr_eq(&result, again.result().unwrap()));
        assert_eq!(backend.submits.load(Ordering::SeqCst), 1);
        assert_eq!(c.pipeline_runs(), 1);
    }

    #[tokio::test]
    async fn submission_error_falls_back_to_local() {
        let backend = Arc::new(Backend {
            submit_ok: false,
            submits: AtomicUsize::new(0),
        });
        let c = coordinator(Some(backend), false);

        let outcome = c.process_url(URL).await;
        assert_eq!(
            outcome.result().unwrap().processing_method,
            ProcessingMethod::Local
        );
    }

    #[tokio::test]
    async fn blocked_network_never_touches_backend() {
        let backend = Arc::new(Backend {
            submit_ok: true,
            submits: AtomicUsize::new(0),
        });
        let c = coordinator(Some(backend.clone()), true);
        c.process_url(URL).await;
        assert_eq!(backend.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn local_pipeline_error_settles_failed() {
        let c = coordinator(None, true);
        let outcome = c.process_url("not a url").await;
        assert!(matches!(
            outcome,
            ProcessOutcome::Failed(ProcessingError::LocalPipeline { .. })
        ));
        assert!(matches!(c.state("not a url"), ProcessingState::Failed(_)));
    }

    #[tokio::test]
    async fn aborted_run_does_not_stay_in_flight() {
        let config = WidgetConfig::builder().local_delay_ms(60_000).build().unwrap();
        let c = Arc::new(Coordinator::new(
            config,
            None,
            NetworkStatus::new(true),
            Arc::new(ResultCache::new()),
            Arc::new(PresentationLayer::new(Arc::new(NoopPresenter))),
        ));

        let ClickDisposition::Dispatched(handle) = c.handle_click(URL) else {
            panic!("expected a dispatched run");
        };
        handle.abort();
        let _ = handle.await;

        assert!(matches!(c.state(URL), ProcessingState::Failed(_)));
    }
}
