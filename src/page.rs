//! In-memory model of the hosting web page.
//!
//! The widget never touches a real browser. It sees the page through this
//! type: a base URL, the link-like elements (`<a href>` and `<link href>`),
//! per-element decoration (indicator marker, click interceptor) and a
//! mutation feed that reports only elements added after a change.
//!
//! HTML is scanned with a small tag regex, which is enough for link
//! discovery and keeps the crate free of a full HTML5 parser.

use crate::error::AccessMaticError;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Stable handle to one element of a [`Page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// `<a href=…>`
    Anchor,
    /// `<link href=…>`
    LinkTag,
}

/// What discovery needs to know about one link-like element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    pub element: ElementId,
    pub kind: ElementKind,
    /// Raw `href` attribute, not yet resolved.
    pub href: String,
    /// Visible text with tags stripped and whitespace collapsed.
    pub text: String,
    /// `download` attribute, if any.
    pub download: Option<String>,
    /// `type` attribute, if any.
    pub mime_type: Option<String>,
}

/// Elements created by one DOM change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub added: Vec<LinkCandidate>,
}

/// Outcome of a reader clicking an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Default navigation suspended; the bound URL goes to the coordinator.
    Intercepted { url: String },
    /// No interceptor: the browser would follow the link.
    Navigate { href: String },
    /// Unknown element id.
    Missing,
}

#[derive(Debug)]
struct Element {
    candidate: LinkCandidate,
    indicator: bool,
    interceptor: Option<String>,
}

#[derive(Debug)]
struct PageInner {
    elements: Vec<Element>,
    observers: Vec<mpsc::UnboundedSender<MutationRecord>>,
}

/// A parsed page plus the decoration state the widget adds to it.
#[derive(Debug)]
pub struct Page {
    base_url: Url,
    script_attributes: Option<HashMap<String, String>>,
    inner: Mutex<PageInner>,
}

static RE_LINK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>|<link\b([^>]*)/?>").unwrap()
});

static RE_SCRIPT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<script\b([^>]*)>").unwrap());

static RE_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*(?:=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .unwrap()
});

static RE_INNER_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static RE_ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|([a-zA-Z]+));").unwrap()
});

impl Page {
    /// Parse `html` as the document located at `base_url`.
    pub fn from_html(base_url: &str, html: &str) -> Result<Self, AccessMaticError> {
        let base_url = Url::parse(base_url).map_err(|e| AccessMaticError::InvalidUrl {
            input: base_url.to_string(),
            reason: e.to_string(),
        })?;

        let script_attributes = RE_SCRIPT_TAG
            .captures_iter(html)
            .map(|caps| parse_attributes(&caps[1]))
            .find(|attrs| attrs.contains_key("data-accessmatic-key"));

        let elements = scan_links(html, 0)
            .into_iter()
            .map(|candidate| Element {
                candidate,
                indicator: false,
                interceptor: None,
            })
            .collect::<Vec<_>>();

        debug!("Parsed {} link elements from {}", elements.len(), base_url);

        Ok(Self {
            base_url,
            script_attributes,
            inner: Mutex::new(PageInner {
                elements,
                observers: Vec::new(),
            }),
        })
    }

    /// Load a page from a local HTML file or an HTTP/HTTPS URL.
    ///
    /// Local files resolve relative links against `base_override` when
    /// given, otherwise against their own `file://` URL.
    pub async fn load(
        input: &str,
        base_override: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, AccessMaticError> {
        if is_url(input) {
            let html = fetch_html(input, timeout_secs).await?;
            Self::from_html(base_override.unwrap_or(input), &html)
        } else {
            let path = PathBuf::from(input);
            if !path.exists() {
                return Err(AccessMaticError::FileNotFound { path });
            }
            let html = tokio::fs::read_to_string(&path).await.map_err(|e| {
                AccessMaticError::PageLoadFailed {
                    input: input.to_string(),
                    reason: e.to_string(),
                }
            })?;
            let base = match base_override {
                Some(b) => b.to_string(),
                None => {
                    let absolute = std::fs::canonicalize(&path).unwrap_or(path);
                    Url::from_file_path(&absolute)
                        .map_err(|_| AccessMaticError::InvalidUrl {
                            input: absolute.display().to_string(),
                            reason: "cannot express path as a file:// URL".into(),
                        })?
                        .to_string()
                }
            };
            Self::from_html(&base, &html)
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Attributes of the `<script>` tag carrying `data-accessmatic-key`.
    pub fn script_attributes(&self) -> Option<&HashMap<String, String>> {
        self.script_attributes.as_ref()
    }

    /// Snapshot of every link-like element currently in the page.
    pub fn link_candidates(&self) -> Vec<LinkCandidate> {
        self.lock()
            .elements
            .iter()
            .map(|e| e.candidate.clone())
            .collect()
    }

    /// Insert an HTML fragment and notify observers of the new elements.
    pub fn append_html(&self, fragment: &str) -> Vec<ElementId> {
        let mut inner = self.lock();
        let added = scan_links(fragment, inner.elements.len());
        let ids = added.iter().map(|c| c.element).collect::<Vec<_>>();

        inner.elements.extend(added.iter().cloned().map(|candidate| Element {
            candidate,
            indicator: false,
            interceptor: None,
        }));

        if !added.is_empty() {
            let record = MutationRecord { added };
            inner
                .observers
                .retain(|tx| tx.send(record.clone()).is_ok());
        }
        ids
    }

    /// Subscribe to future DOM changes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<MutationRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().observers.push(tx);
        rx
    }

    /// Attach the indicator and bind a click interceptor to `url`.
    ///
    /// Returns `false` when the element was already enhanced (no-op).
    pub fn enhance(&self, id: ElementId, url: &str) -> bool {
        let mut inner = self.lock();
        match inner.elements.get_mut(id.0) {
            Some(el) if el.interceptor.is_none() => {
                el.indicator = true;
                el.interceptor = Some(url.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn is_enhanced(&self, id: ElementId) -> bool {
        self.lock()
            .elements
            .get(id.0)
            .is_some_and(|el| el.interceptor.is_some())
    }

    /// Number of indicator markers currently attached.
    pub fn indicator_count(&self) -> usize {
        self.lock().elements.iter().filter(|e| e.indicator).count()
    }

    /// Simulate a reader clicking element `id`.
    pub fn click(&self, id: ElementId) -> ClickOutcome {
        let inner = self.lock();
        match inner.elements.get(id.0) {
            Some(Element {
                interceptor: Some(url),
                ..
            }) => ClickOutcome::Intercepted { url: url.clone() },
            Some(el) => ClickOutcome::Navigate {
                href: el.candidate.href.clone(),
            },
            None => ClickOutcome::Missing,
        }
    }

    /// First element whose raw href equals `href`.
    pub fn find_by_href(&self, href: &str) -> Option<ElementId> {
        self.lock()
            .elements
            .iter()
            .find(|e| e.candidate.href == href)
            .map(|e| e.candidate.element)
    }

    fn lock(&self) -> MutexGuard<'_, PageInner> {
        // A panic while holding the lock cannot leave the element list
        // half-written, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `href` against `base`, dropping the fragment.
///
/// Returns `None` for empty, fragment-only and non-document schemes
/// (`javascript:`, `mailto:`, `tel:`, `data:`).
pub fn normalize_url(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https" | "file") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

fn scan_links(html: &str, first_id: usize) -> Vec<LinkCandidate> {
    RE_LINK_TAG
        .captures_iter(html)
        .filter_map(|caps| {
            let (kind, attrs, inner) = match (caps.get(1), caps.get(3)) {
                (Some(a), _) => (
                    ElementKind::Anchor,
                    parse_attributes(a.as_str()),
                    caps.get(2).map(|m| m.as_str()).unwrap_or(""),
                ),
                (None, Some(l)) => (ElementKind::LinkTag, parse_attributes(l.as_str()), ""),
                (None, None) => return None,
            };
            let href = attrs.get("href")?.clone();
            Some((kind, attrs, href, visible_text(inner)))
        })
        .enumerate()
        .map(|(i, (kind, attrs, href, text))| LinkCandidate {
            element: ElementId(first_id + i),
            kind,
            href,
            text,
            download: attrs.get("download").cloned(),
            mime_type: attrs.get("type").cloned(),
        })
        .collect()
}

fn parse_attributes(raw: &str) -> HashMap<String, String> {
    RE_ATTRIBUTE
        .captures_iter(raw)
        .map(|caps| {
            let name = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_default();
            (name, value)
        })
        .collect()
}

fn visible_text(inner_html: &str) -> String {
    let stripped = RE_INNER_TAG.replace_all(inner_html, " ");
    let decoded = decode_entities(&stripped);
    RE_WHITESPACE.replace_all(decoded.trim(), " ").to_string()
}

/// Decimal and hex character references plus the basic named entities.
/// Other named entities and invalid code points are left as written.
fn decode_entities(s: &str) -> String {
    RE_ENTITY
        .replace_all(s, |caps: &regex::Captures| {
            let code = if let Some(dec) = caps.get(1) {
                dec.as_str().parse().ok()
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16).ok()
            } else {
                None
            };
            if let Some(c) = code.and_then(char::from_u32) {
                return c.to_string();
            }
            let named = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
            match named {
                "nbsp" => " ".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                "amp" => "&".to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

async fn fetch_html(url: &str, timeout_secs: u64) -> Result<String, AccessMaticError> {
    info!("Fetching page: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AccessMaticError::HttpClient(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            AccessMaticError::PageLoadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            AccessMaticError::PageLoadFailed {
                input: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(AccessMaticError::PageLoadFailed {
            input: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    response
        .text()
        .await
        .map_err(|e| AccessMaticError::PageLoadFailed {
            input: url.to_string(),
            reason: e.to_string(),
        })
}
