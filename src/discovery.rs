//! Discovery engine: find PDF links in a [`Page`] and wire them up.
//!
//! A scan resolves every link-like element against the page's base URL,
//! classifies it, and enhances each match (indicator plus click
//! interceptor). Enhancement is idempotent per element. The discovered set
//! is keyed by normalized URL, so several elements pointing at one PDF all
//! get intercepted but count as a single discovery.
//!
//! [`DiscoveryEngine::observe`] follows the page's mutation feed and only
//! classifies the elements each change added.

use crate::classify::classify_candidate;
use crate::page::{normalize_url, ElementId, LinkCandidate, Page};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// One PDF URL found on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredLink {
    pub normalized_url: String,
    /// First element found pointing at this URL.
    #[serde(skip)]
    pub element: ElementId,
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Discovered {
    links: Vec<DiscoveredLink>,
    seen: HashSet<String>,
}

#[derive(Debug)]
pub struct DiscoveryEngine {
    page: Arc<Page>,
    state: Mutex<Discovered>,
    /// Log every enhanced element.
    verbose: bool,
}

impl DiscoveryEngine {
    pub fn new(page: Arc<Page>, verbose: bool) -> Self {
        Self {
            page,
            state: Mutex::new(Discovered::default()),
            verbose,
        }
    }

    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }

    /// Classify every element currently in the page.
    ///
    /// Returns the number of URLs discovered by this pass.
    pub fn scan(&self) -> usize {
        let candidates = self.page.link_candidates();
        let found = self.process_candidates(&candidates);
        if found > 0 {
            info!("Found {} new PDF links", found);
        }
        found
    }

    /// Classify `candidates` and enhance the matches.
    ///
    /// Returns the number of previously unknown URLs among them.
    pub fn process_candidates(&self, candidates: &[LinkCandidate]) -> usize {
        let base = self.page.base_url();
        let mut state = self.lock();
        let mut found = 0;

        for candidate in candidates {
            let Some(url) = normalize_url(base, &candidate.href) else {
                continue;
            };
            let url = url.to_string();
            if !classify_candidate(candidate, &url) {
                continue;
            }

            if self.page.enhance(candidate.element, &url) && self.verbose {
                debug!("Enhanced element {:?} → {}", candidate.element, url);
            }

            if state.seen.insert(url.clone()) {
                state.links.push(DiscoveredLink {
                    normalized_url: url,
                    element: candidate.element,
                    discovered_at: Utc::now(),
                });
                found += 1;
            }
        }
        found
    }

    /// Follow the page's mutation feed until the page goes away.
    ///
    /// The subscription is registered before this returns, so no change made
    /// after the call is missed.
    pub fn observe(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.page.subscribe();
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let found = engine.process_candidates(&record.added);
                if found > 0 {
                    info!("Found {} new PDF links after DOM change", found);
                }
            }
            debug!("Mutation feed closed");
        })
    }

    pub fn discovered_count(&self) -> usize {
        self.lock().links.len()
    }

    /// Snapshot of the discovered links in discovery order.
    pub fn discovered(&self) -> Vec<DiscoveredLink> {
        self.lock().links.clone()
    }

    pub fn is_discovered(&self, url: &str) -> bool {
        self.lock().seen.contains(url)
    }

    fn lock(&self) -> MutexGuard<'_, Discovered> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}
