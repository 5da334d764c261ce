//! Link classification: does a hyperlink point at a PDF?
//!
//! Institutional sites often hide PDFs behind redirecting download endpoints
//! with no `.pdf` extension. [`is_pdf_link`] therefore uses two tiers:
//!
//! 1. an extension match (`.pdf` followed by `?`, `#` or end of string);
//! 2. a content keyword (in the URL or the visible text) **and** a delivery
//!    token in the URL.
//!
//! Matching is case-insensitive substring matching. [`classify_candidate`]
//! adds element-level hints (`download` / `type` attributes, explicit
//! "view pdf"-style indicators) on top of the URL rule.

use crate::page::LinkCandidate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Content keywords typical of public-sector documents.
///
/// "document" contains the delivery token "doc", so a URL containing
/// "document" satisfies both tiers on its own: `https://city.gov/documents`
/// classifies as a PDF link even when it is an index page.
pub const CONTENT_KEYWORDS: &[&str] = &[
    "agenda",
    "minutes",
    "budget",
    "report",
    "ordinance",
    "resolution",
    "notice",
    "document",
];

/// URL tokens indicating a file delivery endpoint.
pub const DELIVERY_TOKENS: &[&str] = &["download", "file", "doc"];

/// Phrases that announce a PDF outright.
const PDF_INDICATORS: &[&str] = &["download pdf", "view pdf", "pdf file", "pdf document"];

static RE_PDF_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.pdf(?:$|[?#])").unwrap());

static RE_PDF_ROUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:/pdf/|[?&]type=pdf(?:$|[&#]))").unwrap());

/// Decide whether `url` (with visible `text`) references a PDF.
pub fn is_pdf_link(url: &str, text: &str) -> bool {
    if RE_PDF_EXTENSION.is_match(url) {
        return true;
    }

    let url_lc = url.to_lowercase();
    let text_lc = text.to_lowercase();

    let has_keyword = CONTENT_KEYWORDS
        .iter()
        .any(|k| url_lc.contains(k) || text_lc.contains(k));
    let has_token = DELIVERY_TOKENS.iter().any(|t| url_lc.contains(t));

    has_keyword && has_token
}

/// Element-level hints that mark a link as a PDF regardless of the URL rule.
pub fn has_pdf_hint(candidate: &LinkCandidate, absolute_url: &str) -> bool {
    if candidate
        .download
        .as_deref()
        .is_some_and(|d| d.to_lowercase().contains(".pdf"))
    {
        return true;
    }
    if candidate
        .mime_type
        .as_deref()
        .is_some_and(|t| t.trim().eq_ignore_ascii_case("application/pdf"))
    {
        return true;
    }
    if RE_PDF_ROUTE.is_match(absolute_url) {
        return true;
    }

    let url_lc = absolute_url.to_lowercase();
    let text_lc = candidate.text.to_lowercase();
    PDF_INDICATORS
        .iter()
        .any(|i| text_lc.contains(i) || url_lc.contains(i))
}

/// Full decision for an element whose href already resolved to `absolute_url`.
pub fn classify_candidate(candidate: &LinkCandidate, absolute_url: &str) -> bool {
    is_pdf_link(absolute_url, &candidate.text) || has_pdf_hint(candidate, absolute_url)
}
