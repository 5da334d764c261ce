//! Local pipeline: a degraded rendition synthesized from the URL alone.
//!
//! No document content is available here, so the output is fixed apart from
//! the display name derived from the URL: score 75, compliance `A`, method
//! `local`, and a message disclosing that full processing was unavailable.

use crate::config::WidgetConfig;
use crate::error::ProcessingError;
use crate::output::{AccessibleResult, ComplianceLevel, ProcessingMethod};
use crate::pipeline::sanitize::escape_html;
use reqwest::Url;
use tokio::time::{sleep, Duration};
use tracing::debug;

/// Score assigned to every locally synthesized rendition.
pub const LOCAL_SCORE: u8 = 75;

/// Footer message attached to local renditions.
pub const LOCAL_MESSAGE: &str = "Processed locally due to network restrictions";

/// Synthesize a rendition for `pdf_url` after the configured delay.
pub async fn process_local(
    pdf_url: &str,
    config: &WidgetConfig,
) -> Result<AccessibleResult, ProcessingError> {
    let url = Url::parse(pdf_url).map_err(|e| ProcessingError::LocalPipeline {
        detail: format!("'{pdf_url}': {e}"),
    })?;

    if config.local_delay_ms > 0 {
        sleep(Duration::from_millis(config.local_delay_ms)).await;
    }

    let title = display_name(&url);
    if config.debug {
        debug!("{}: synthesized local rendition '{}'", pdf_url, title);
    }

    Ok(AccessibleResult {
        source_url: pdf_url.to_string(),
        accessible_html: local_document_html(&title, url.as_str()),
        accessibility_score: LOCAL_SCORE,
        compliance_level: ComplianceLevel::A,
        processing_method: ProcessingMethod::Local,
        message: Some(LOCAL_MESSAGE.to_string()),
    })
}

/// Human-readable name for a PDF URL.
///
/// Takes the last non-empty path segment, drops a `.pdf` extension, decodes
/// `%20` and turns `_`/`-` into spaces. Falls back to the host, then to
/// "Document".
pub fn display_name(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segs| segs.rfind(|s| !s.is_empty()))
        .map(str::to_string);

    let raw = match segment {
        Some(s) => s,
        None => return url.host_str().unwrap_or("Document").to_string(),
    };

    let stem = match raw.len().checked_sub(4) {
        Some(cut) if raw.is_char_boundary(cut) && raw[cut..].eq_ignore_ascii_case(".pdf") => {
            &raw[..cut]
        }
        _ => raw.as_str(),
    };

    let name: String = stem
        .replace("%20", " ")
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");

    if name.is_empty() {
        "Document".to_string()
    } else {
        name
    }
}

fn local_document_html(title: &str, href: &str) -> String {
    format!(
        r#"<div class="local-document">
  <h1>{title}</h1>
  <section class="accessmatic-local-notice" aria-labelledby="accessmatic-notice-heading">
    <h2 id="accessmatic-notice-heading">Document Accessibility Notice</h2>
    <p><strong>This PDF has been processed with basic accessibility features.</strong></p>
    <p>Due to network security restrictions, full accessibility processing was not available. This view provides:</p>
    <ul>
      <li>Proper document structure and headings</li>
      <li>Keyboard navigation support</li>
      <li>Screen reader compatibility</li>
    </ul>
    <p><strong>For the complete AccessMatic experience:</strong> contact your IT department about allowing access to AccessMatic's processing servers.</p>
  </section>
  <p class="accessmatic-download"><a href="{href}" target="_blank" rel="noopener">Download Original PDF</a></p>
</div>"#,
        title = escape_html(title),
        href = escape_html(href),
    )
}
