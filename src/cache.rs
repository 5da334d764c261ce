//! Page-lifetime cache of finished renditions, keyed by normalized PDF URL.
//!
//! There is no eviction: a page session only ever holds the documents its
//! reader opened.

use crate::output::AccessibleResult;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct ResultCache {
    entries: Mutex<HashMap<String, Arc<AccessibleResult>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<Arc<AccessibleResult>> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(url)
            .cloned()
    }

    /// Store `result` under its source URL and hand back the shared handle.
    ///
    /// A second insert for the same URL keeps the first result.
    pub fn insert(&self, result: AccessibleResult) -> Arc<AccessibleResult> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(
            entries
                .entry(result.source_url.clone())
                .or_insert_with(|| Arc::new(result)),
        )
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
