//! Remote pipeline: submit the URL, then poll the task until it settles.
//!
//! ## Polling
//!
//! The first status request goes out immediately after submission; later
//! ones wait `poll_interval_ms`. The whole poll loop runs under a single
//! `tokio::time::timeout` of `timeout_ms`, so a task stuck in `pending`
//! yields [`ProcessingError::PollTimeout`] no later than that bound after
//! submission. There is no retry loop: `retry_attempts` is not consulted.

use crate::backend::{DocumentBackend, Submission, TaskState};
use crate::config::WidgetConfig;
use crate::error::ProcessingError;
use crate::output::AccessibleResult;
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::{debug, warn};

/// Run the submit-then-poll pipeline for one normalized PDF URL.
///
/// Transport failures come back as [`ProcessingError::Submission`] or
/// [`ProcessingError::PollTransport`]; the coordinator decides whether to
/// fall back.
pub async fn process_remote(
    backend: &dyn DocumentBackend,
    pdf_url: &str,
    config: &WidgetConfig,
) -> Result<AccessibleResult, ProcessingError> {
    let task_id = match backend.submit(pdf_url).await? {
        Submission::Inline(doc) => {
            debug!("{}: completed inline on submit", pdf_url);
            return Ok(doc.into_result(pdf_url));
        }
        Submission::Task(id) => id,
    };

    let started = Instant::now();
    let bound = Duration::from_millis(config.timeout_ms);

    match timeout(bound, poll_until_settled(backend, &task_id, pdf_url, config)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            warn!("Task {}: still pending after {}ms", task_id, elapsed_ms);
            Err(ProcessingError::PollTimeout {
                task_id,
                elapsed_ms,
            })
        }
    }
}

async fn poll_until_settled(
    backend: &dyn DocumentBackend,
    task_id: &str,
    pdf_url: &str,
    config: &WidgetConfig,
) -> Result<AccessibleResult, ProcessingError> {
    let interval = Duration::from_millis(config.poll_interval_ms);
    let mut tick: u32 = 0;

    loop {
        if tick > 0 {
            sleep(interval).await;
        }
        tick += 1;

        let doc = backend.status(task_id).await?;
        match doc.status {
            Some(TaskState::Completed) => {
                debug!("Task {}: completed after {} poll(s)", task_id, tick);
                return Ok(doc.into_result(pdf_url));
            }
            Some(TaskState::Failed) => {
                let message = doc
                    .error
                    .or(doc.message)
                    .unwrap_or_else(|| "Document processing failed".to_string());
                return Err(ProcessingError::PollFailure {
                    task_id: task_id.to_string(),
                    message,
                });
            }
            other if config.debug => debug!("Task {}: poll {} → {:?}", task_id, tick, other),
            _ => {}
        }
    }
}
