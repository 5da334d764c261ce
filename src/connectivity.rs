//! Connectivity prober: one bounded reachability check per session.
//!
//! Firewalled networks (municipal intranets, kiosks) often silently drop
//! requests to the processing API. The widget asks once, at start-up, and
//! routes every later click from that single verdict. Timeout, transport
//! error and non-success status are all treated as "unreachable".

use crate::backend::DocumentBackend;
use crate::config::{DiscoveryMode, WidgetConfig};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

/// Session-wide reachability verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkStatus {
    pub blocked: bool,
    pub last_checked_at: DateTime<Utc>,
}

impl NetworkStatus {
    pub fn new(blocked: bool) -> Self {
        Self {
            blocked,
            last_checked_at: Utc::now(),
        }
    }
}

/// Run the health check against `backend` and report whether it answered.
///
/// Never fails. Returns `false` without any I/O when there is no backend or
/// the configuration pins the widget to local processing.
pub async fn probe(backend: Option<&dyn DocumentBackend>, config: &WidgetConfig) -> bool {
    if config.discovery_mode == DiscoveryMode::LocalOnly {
        debug!("Connectivity probe skipped: local-only mode");
        return false;
    }
    let Some(backend) = backend else {
        debug!("Connectivity probe skipped: no backend configured");
        return false;
    };

    let bound = Duration::from_millis(config.probe_timeout_ms);
    match timeout(bound, backend.health()).await {
        Ok(Ok(())) => {
            debug!("Backend reachable");
            true
        }
        Ok(Err(e)) => {
            info!("Network restrictions detected, using local processing ({})", e);
            false
        }
        Err(_) => {
            info!(
                "Network restrictions detected, health check exceeded {}ms",
                config.probe_timeout_ms
            );
            false
        }
    }
}
