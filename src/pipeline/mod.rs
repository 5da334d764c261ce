//! Pipelines that turn a PDF URL into an [`crate::AccessibleResult`].
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ remote (submit ──▶ poll) ──▶ sanitize ──┐
//! PDF URL ───┤        │ transport error                    ├──▶ AccessibleResult
//!            └──▶ local (URL-only synthesis) ◀─────────────┘
//! ```
//!
//! 1. [`remote`]   — submit to the processing API and poll the task under a
//!    single timeout; the only stage with network I/O
//! 2. [`local`]    — deterministic degraded rendition built from the URL
//! 3. [`sanitize`] — regex rules that strip active content from backend HTML
//!
//! Routing between the two is decided by [`crate::coordinator`].

pub mod local;
pub mod remote;
pub mod sanitize;
