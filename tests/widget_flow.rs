//! Integration tests for the widget service.
//!
//! The whole flow (probe, discovery, click, pipelines, cache, presentation)
//! runs against an in-process fake backend, so no network is needed.
//! Time-dependent tests run on tokio's paused clock: sleeps and timeouts
//! complete instantly and deterministically.
//!
//! Run with:
//!   cargo test --test widget_flow

use accessmatic::{
    is_pdf_link, AccessMatic, BackendDocument, ClickDisposition, ClickResponse, ComplianceLevel,
    DismissReason, DocumentBackend, ElementId, Page, ProcessOutcome, ProcessingError,
    ProcessingMethod, ProcessingState, Presenter, Submission, TaskState, View, WidgetConfig,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

// ── Test helpers ─────────────────────────────────────────────────────────────

const PAGE_URL: &str = "https://city.gov/council/";
const AGENDA: &str = "https://city.gov/files/agenda.pdf";
const MINUTES: &str = "https://city.gov/download?doc=minutes";

const PAGE_HTML: &str = r#"<html><body>
  <h1>City Council</h1>
  <ul>
    <li><a href="/files/agenda.pdf">Agenda</a></li>
    <li><a href="/download?doc=minutes">Meeting Minutes</a></li>
    <li><a href="/files/agenda.pdf#page=4">Agenda, item 4</a></li>
    <li><a href="/contact">Contact the clerk</a></li>
  </ul>
</body></html>"#;

#[derive(Clone, Copy)]
enum Health {
    Up,
    Down,
    Hang,
}

/// Scripted backend. The status queue pops until one entry is left, which
/// then repeats forever.
struct FakeBackend {
    health: Health,
    submit_fails: bool,
    /// Status calls that fail at the transport level before the queue is used.
    status_failures: AtomicUsize,
    statuses: Mutex<VecDeque<BackendDocument>>,
    health_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl FakeBackend {
    fn new(health: Health, statuses: Vec<BackendDocument>) -> Arc<Self> {
        Arc::new(Self {
            health,
            submit_fails: false,
            status_failures: AtomicUsize::new(0),
            statuses: Mutex::new(statuses.into()),
            health_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        })
    }

    fn failing_submit() -> Arc<Self> {
        Arc::new(Self {
            health: Health::Up,
            submit_fails: true,
            status_failures: AtomicUsize::new(0),
            statuses: Mutex::new(VecDeque::new()),
            health_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        })
    }

    fn failing_status(failures: usize, statuses: Vec<BackendDocument>) -> Arc<Self> {
        let backend = Self::new(Health::Up, statuses);
        backend.status_failures.store(failures, Ordering::SeqCst);
        backend
    }
}

#[async_trait]
impl DocumentBackend for FakeBackend {
    async fn health(&self) -> Result<(), ProcessingError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        match self.health {
            Health::Up => Ok(()),
            Health::Down => Err(ProcessingError::Connectivity {
                detail: "connection refused".into(),
            }),
            Health::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    async fn submit(&self, _pdf_url: &str) -> Result<Submission, ProcessingError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if self.submit_fails {
            return Err(ProcessingError::Submission {
                status: Some(503),
                detail: "API Error: 503".into(),
            });
        }
        Ok(Submission::Task("task-1".into()))
    }

    async fn status(&self, task_id: &str) -> Result<BackendDocument, ProcessingError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .status_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ProcessingError::PollTransport {
                task_id: task_id.to_string(),
                detail: "connection reset".into(),
            });
        }
        let mut q = self.statuses.lock().unwrap();
        let doc = if q.len() > 1 {
            q.pop_front()
        } else {
            q.front().cloned()
        };
        doc.ok_or_else(|| ProcessingError::PollTransport {
            task_id: task_id.to_string(),
            detail: "no scripted status".into(),
        })
    }
}

fn pending() -> BackendDocument {
    BackendDocument {
        status: Some(TaskState::Pending),
        ..Default::default()
    }
}

fn completed() -> BackendDocument {
    BackendDocument {
        status: Some(TaskState::Completed),
        accessibility_score: Some(95.0),
        wcag_compliance: Some("AA".into()),
        accessible_html: Some("<h1>Agenda</h1><p>Call to order</p>".into()),
        ..Default::default()
    }
}

fn failed(message: &str) -> BackendDocument {
    BackendDocument {
        status: Some(TaskState::Failed),
        error: Some(message.into()),
        ..Default::default()
    }
}

/// Records every view it is asked to show.
#[derive(Default)]
struct Recorder {
    views: Mutex<Vec<View>>,
    retires: AtomicUsize,
}

impl Recorder {
    fn labels(&self) -> Vec<&'static str> {
        self.views.lock().unwrap().iter().map(|v| v.label()).collect()
    }

    fn last(&self) -> Option<View> {
        self.views.lock().unwrap().last().cloned()
    }
}

impl Presenter for Recorder {
    fn render(&self, view: &View) {
        self.views.lock().unwrap().push(view.clone());
    }

    fn retire(&self) {
        self.retires.fetch_add(1, Ordering::SeqCst);
    }
}

fn config() -> WidgetConfig {
    WidgetConfig::builder()
        .api_key("am_test")
        .build()
        .unwrap()
}

async fn widget(
    backend: Option<Arc<FakeBackend>>,
    config: WidgetConfig,
) -> (AccessMatic, Arc<Recorder>) {
    let page = Arc::new(Page::from_html(PAGE_URL, PAGE_HTML).unwrap());
    let recorder = Arc::new(Recorder::default());
    let backend = backend.map(|b| b as Arc<dyn DocumentBackend>);
    let widget = AccessMatic::init(config, page, backend, recorder.clone()).await;
    (widget, recorder)
}

fn element(widget: &AccessMatic, href: &str) -> ElementId {
    widget
        .page()
        .find_by_href(href)
        .unwrap_or_else(|| panic!("no element with href {href}"))
}

fn dispatched(response: ClickResponse) -> JoinHandle<ProcessOutcome> {
    match response {
        ClickResponse::Intercepted(ClickDisposition::Dispatched(handle)) => handle,
        other => panic!("expected a dispatched run, got {other:?}"),
    }
}

// ── Discovery ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_discovery_is_idempotent() {
    let (widget, _) = widget(None, config()).await;

    assert_eq!(widget.discovered_count(), 2);
    let indicators = widget.page().indicator_count();
    assert_eq!(indicators, 3, "both agenda anchors and the minutes link");

    assert_eq!(widget.discover_new_pdfs(), 0);
    assert_eq!(widget.discover_new_pdfs(), 0);
    assert_eq!(widget.discovered_count(), 2);
    assert_eq!(widget.page().indicator_count(), indicators);
}

#[tokio::test]
async fn test_keyword_and_token_link_is_discovered() {
    assert!(is_pdf_link(MINUTES, "Meeting Minutes"));

    let (widget, _) = widget(None, config()).await;
    let urls: Vec<String> = widget
        .discovered()
        .into_iter()
        .map(|l| l.normalized_url)
        .collect();
    assert_eq!(urls, vec![AGENDA.to_string(), MINUTES.to_string()]);
}

#[tokio::test]
async fn test_observer_picks_up_added_links() {
    let (widget, _) = widget(None, config()).await;

    let ids = widget
        .page()
        .append_html(r#"<p>Late addition: <a href="/files/budget_2025.pdf">Budget</a></p>"#);
    assert_eq!(ids.len(), 1);

    tokio::time::timeout(Duration::from_secs(1), async {
        while widget.discovered_count() < 3 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("observer did not classify the new link");

    assert!(widget.page().is_enhanced(ids[0]));
    assert!(matches!(
        widget.click(ids[0]),
        ClickResponse::Intercepted(ClickDisposition::Dispatched(_))
    ));
}

#[tokio::test]
async fn test_non_pdf_link_is_not_intercepted() {
    let (widget, recorder) = widget(None, config()).await;
    let contact = element(&widget, "/contact");
    assert!(matches!(
        widget.click(contact),
        ClickResponse::Navigate { ref href } if href == "/contact"
    ));
    assert!(recorder.labels().is_empty());
}

// ── Click state machine ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_two_clicks_on_one_url_run_one_pipeline() {
    let (widget, recorder) = widget(None, config()).await;
    let first = element(&widget, "/files/agenda.pdf");
    let second = element(&widget, "/files/agenda.pdf#page=4");

    let handle = dispatched(widget.click(first));
    assert!(matches!(
        widget.click(second),
        ClickResponse::Intercepted(ClickDisposition::AlreadyInFlight)
    ));
    assert_eq!(widget.state_of(AGENDA), ProcessingState::InFlight);

    let outcome = handle.await.unwrap();
    assert!(outcome.result().is_some());
    assert_eq!(widget.pipeline_runs(), 1);
    assert_eq!(recorder.labels(), vec!["processing", "processing", "document"]);
}

#[tokio::test(start_paused = true)]
async fn test_completed_url_replays_cached_result() {
    let backend = FakeBackend::new(Health::Up, vec![completed()]);
    let (widget, recorder) = widget(Some(backend.clone()), config()).await;
    let agenda = element(&widget, "/files/agenda.pdf");

    let original = dispatched(widget.click(agenda)).await.unwrap();
    let original = original.result().unwrap().clone();

    let replay = match widget.click(agenda) {
        ClickResponse::Intercepted(ClickDisposition::Replayed(r)) => r,
        other => panic!("expected replay, got {other:?}"),
    };
    assert!(Arc::ptr_eq(&original, &replay));
    assert_eq!(*original, *replay);
    assert_eq!(widget.pipeline_runs(), 1);
    assert_eq!(backend.submit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(widget.processed_count(), 1);

    match recorder.last() {
        Some(View::Document { result, .. }) => assert!(Arc::ptr_eq(&result, &original)),
        other => panic!("expected document view, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_keeps_work_in_flight() {
    let (widget, recorder) = widget(None, config()).await;
    let agenda = element(&widget, "/files/agenda.pdf");

    let handle = dispatched(widget.click(agenda));
    assert!(widget.dismiss(DismissReason::Escape));
    assert_eq!(recorder.retires.load(Ordering::SeqCst), 1);
    assert!(widget.current_view().is_none());
    assert_eq!(widget.state_of(AGENDA), ProcessingState::InFlight);

    // reopening shows the current state without a second run
    assert!(matches!(
        widget.click(agenda),
        ClickResponse::Intercepted(ClickDisposition::AlreadyInFlight)
    ));
    assert_eq!(widget.current_view().map(|v| v.label()), Some("processing"));

    handle.await.unwrap();
    assert_eq!(widget.pipeline_runs(), 1);
    assert!(matches!(widget.state_of(AGENDA), ProcessingState::Completed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_process_url_joins_in_flight_run() {
    let (widget, _) = widget(None, config()).await;
    let agenda = element(&widget, "/files/agenda.pdf");

    let handle = dispatched(widget.click(agenda));
    let joined = widget.process_url(AGENDA).await.unwrap();
    let spawned = handle.await.unwrap();

    assert_eq!(joined, spawned);
    assert_eq!(widget.pipeline_runs(), 1);
}

// ── Routing and fallback ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_blocked_network_agenda_scenario() {
    assert!(is_pdf_link(AGENDA, ""));

    let (widget, _) = widget(None, config()).await;
    assert!(widget.is_network_blocked());

    let start = Instant::now();
    let outcome = widget.process_url(AGENDA).await.unwrap();
    let result = outcome.result().unwrap();

    assert_eq!(result.processing_method, ProcessingMethod::Local);
    assert_ne!(result.compliance_level, ComplianceLevel::AA);
    assert_eq!(result.accessibility_score, 75);
    assert!(result.message.as_deref().unwrap().contains("Processed locally"));
    assert_eq!(start.elapsed(), Duration::from_millis(2_000));
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_probe_routes_local() {
    let backend = FakeBackend::new(Health::Down, vec![completed()]);
    let (widget, recorder) = widget(Some(backend.clone()), config()).await;

    assert!(widget.is_network_blocked());
    let outcome = widget.process_url(AGENDA).await.unwrap();
    assert_eq!(
        outcome.result().unwrap().processing_method,
        ProcessingMethod::Local
    );
    assert_eq!(backend.health_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.submit_calls.load(Ordering::SeqCst), 0);

    let notice = recorder.views.lock().unwrap().iter().any(|v| {
        matches!(v, View::Processing { network_notice: true, .. })
    });
    assert!(notice, "processing view should carry the secure-network notice");
}

#[tokio::test(start_paused = true)]
async fn test_hanging_probe_times_out() {
    let backend = FakeBackend::new(Health::Hang, vec![completed()]);
    let start = Instant::now();
    let (widget, _) = widget(Some(backend), config()).await;

    assert!(widget.is_network_blocked());
    assert_eq!(start.elapsed(), Duration::from_millis(3_000));
}

#[tokio::test(start_paused = true)]
async fn test_submission_error_falls_back_to_local() {
    let backend = FakeBackend::failing_submit();
    let (widget, _) = widget(Some(backend.clone()), config()).await;
    assert!(!widget.is_network_blocked());

    let outcome = widget.process_url(AGENDA).await.unwrap();
    assert_eq!(
        outcome.result().unwrap().processing_method,
        ProcessingMethod::Local
    );
    assert_eq!(backend.submit_calls.load(Ordering::SeqCst), 1);
    assert!(matches!(widget.state_of(AGENDA), ProcessingState::Completed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_poll_transport_error_falls_back_to_local() {
    let backend = FakeBackend::failing_status(1, vec![completed()]);
    let (widget, recorder) = widget(Some(backend.clone()), config()).await;

    let outcome = widget.process_url(AGENDA).await.unwrap();

    let result = outcome.result().expect("local fallback completes");
    assert_eq!(result.processing_method, ProcessingMethod::Local);
    assert!(matches!(
        widget.state_of(AGENDA),
        ProcessingState::Completed(r) if r.processing_method == ProcessingMethod::Local
    ));
    assert_eq!(backend.submit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.status_calls.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.last().map(|v| v.label()), Some("document"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_api_key_disables_remote() {
    let backend = FakeBackend::new(Health::Up, vec![completed()]);
    let (widget, _) = widget(Some(backend.clone()), WidgetConfig::default()).await;

    assert!(widget.is_network_blocked());
    assert_eq!(backend.health_calls.load(Ordering::SeqCst), 0);
}

// ── Remote pipeline ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_completed_on_first_poll() {
    let backend = FakeBackend::new(Health::Up, vec![completed()]);
    let (widget, _) = widget(Some(backend.clone()), config()).await;

    let start = Instant::now();
    let outcome = widget.process_url(AGENDA).await.unwrap();
    let result = outcome.result().unwrap();

    assert_eq!(backend.status_calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(result.accessibility_score, 95);
    assert_eq!(result.compliance_level, ComplianceLevel::AA);
    assert_eq!(result.processing_method, ProcessingMethod::Remote);
}

#[tokio::test(start_paused = true)]
async fn test_pending_forever_fails_within_timeout() {
    let backend = FakeBackend::new(Health::Up, vec![pending()]);
    let (widget, recorder) = widget(Some(backend), config()).await;

    let start = Instant::now();
    let outcome = widget.process_url(AGENDA).await.unwrap();

    assert!(start.elapsed() <= Duration::from_millis(30_000));
    assert!(matches!(
        outcome,
        ProcessOutcome::Failed(ProcessingError::PollTimeout { .. })
    ));
    assert!(matches!(
        widget.state_of(AGENDA),
        ProcessingState::Failed(ProcessingError::PollTimeout { .. })
    ));

    match recorder.last() {
        Some(View::Error {
            message,
            detail,
            retry_available,
            ..
        }) => {
            assert_eq!(message, "Processing timeout - please try again.");
            assert!(detail.is_none(), "details stay hidden without debug");
            assert!(retry_available);
        }
        other => panic!("expected error view, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_short_script_timeout_still_bounds_polling() {
    let mut attrs = std::collections::HashMap::new();
    attrs.insert("data-accessmatic-key".to_string(), "am_test".to_string());
    attrs.insert("data-timeout".to_string(), "1000".to_string());
    let config = WidgetConfig::from_script_attributes(&attrs).unwrap();

    let backend = FakeBackend::new(Health::Up, vec![pending()]);
    let (widget, _recorder) = widget(Some(backend), config).await;

    let start = Instant::now();
    let outcome = widget.process_url(AGENDA).await.unwrap();

    assert!(start.elapsed() <= Duration::from_millis(1_000));
    assert!(matches!(
        outcome,
        ProcessOutcome::Failed(ProcessingError::PollTimeout { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_debug_mode_exposes_error_detail() {
    let backend = FakeBackend::new(Health::Up, vec![failed("Encrypted PDF")]);
    let config = WidgetConfig::builder()
        .api_key("am_test")
        .debug(true)
        .build()
        .unwrap();
    let (widget, recorder) = widget(Some(backend), config).await;

    widget.process_url(AGENDA).await.unwrap();
    match recorder.last() {
        Some(View::Error {
            message, detail, ..
        }) => {
            assert_eq!(message, "Encrypted PDF");
            assert!(detail.unwrap().contains("task-1"));
        }
        other => panic!("expected error view, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_backend_failure() {
    let backend = FakeBackend::new(Health::Up, vec![failed("Temporary failure"), completed()]);
    let (widget, _) = widget(Some(backend.clone()), config()).await;

    let first = widget.process_url(AGENDA).await.unwrap();
    assert!(matches!(
        first,
        ProcessOutcome::Failed(ProcessingError::PollFailure { ref message, .. })
            if message == "Temporary failure"
    ));

    let handle = match widget.retry(AGENDA).unwrap() {
        ClickDisposition::Dispatched(handle) => handle,
        other => panic!("expected a dispatched retry, got {other:?}"),
    };
    let second = handle.await.unwrap();

    assert_eq!(
        second.result().unwrap().processing_method,
        ProcessingMethod::Remote
    );
    assert_eq!(widget.pipeline_runs(), 2);
    assert_eq!(backend.submit_calls.load(Ordering::SeqCst), 2);
}

// ── Page loading ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_widget_from_saved_page_with_script_config() {
    let mut file = tempfile::Builder::new().suffix(".html").tempfile().unwrap();
    write!(
        file,
        r#"<script src="sdk.js" data-accessmatic-key="am_live" data-discovery-mode="local-only"
                   data-show-branding="false"></script>
           <a href="/files/agenda.pdf">Agenda</a>"#
    )
    .unwrap();

    let page = Page::load(file.path().to_str().unwrap(), Some("https://city.gov/"), 5)
        .await
        .unwrap();
    let recorder = Arc::new(Recorder::default());
    let widget = AccessMatic::from_page(Arc::new(page), recorder.clone())
        .await
        .unwrap();

    assert!(widget.is_network_blocked());
    assert_eq!(widget.discovered_count(), 1);

    widget.process_url(AGENDA).await.unwrap();
    match recorder.last() {
        Some(View::Document { show_branding, .. }) => assert!(!show_branding),
        other => panic!("expected document view, got {other:?}"),
    }
}
