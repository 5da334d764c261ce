//! Markup for each [`View`].
//!
//! Every string that did not come out of the sanitizer is escaped. The
//! `accessible_html` of a [`crate::AccessibleResult`] is inserted verbatim:
//! it is either sanitized backend output or locally built markup.

use crate::output::ProcessingMethod;
use crate::pipeline::sanitize::escape_html;
use crate::presentation::{ScoreClass, View};
use std::fmt::Write as _;

const PROCESSING_STEPS: &[(&str, &str)] = &[
    ("1", "Reading document"),
    ("2", "Accessibility enhancement"),
    ("3", "Accessibility validation"),
];

/// Render `view` as a self-contained modal fragment.
pub fn render_view(view: &View) -> String {
    match view {
        View::Processing {
            file_name,
            network_notice,
            ..
        } => modal("processing", &processing_body(file_name, *network_notice)),
        View::Document {
            result,
            show_branding,
        } => {
            let mut body = String::with_capacity(result.accessible_html.len() + 1024);
            let score_class = ScoreClass::from_score(result.accessibility_score);
            let _ = write!(
                body,
                r#"<div class="accessmatic-document-viewer">
<div class="document-header">
<div class="header-left">
<h2 id="accessmatic-modal-title">Accessible Document</h2>
<div class="accessibility-info">
<div class="score-badge score-{score_class}">Score: {score}%</div>
<div class="compliance-badge compliance-{level}">WCAG {level}</div>
"#,
                score_class = score_class.as_str(),
                score = result.accessibility_score,
                level = result.compliance_level,
            );
            if result.processing_method == ProcessingMethod::Local {
                body.push_str("<div class=\"method-badge\">Locally Processed</div>\n");
            }
            let _ = write!(
                body,
                r#"</div>
</div>
<div class="header-actions">
<a class="action-btn" href="{href}" target="_blank" rel="noopener">View Original</a>
<button class="close-btn" aria-label="Close document viewer">&times;</button>
</div>
</div>
<div class="document-body">
<div class="document-content" id="accessible-content" tabindex="-1">
{html}
</div>
</div>
<div class="document-footer">
<div class="footer-info">
"#,
                href = escape_html(&result.source_url),
                html = result.accessible_html,
            );
            if let Some(message) = &result.message {
                let _ = writeln!(
                    body,
                    "<div class=\"processing-note\">{}</div>",
                    escape_html(message)
                );
            }
            if *show_branding {
                body.push_str(
                    "<div class=\"powered-by\"><span>Powered by</span> \
                     <a href=\"https://accessmatic.us\" target=\"_blank\" rel=\"noopener\">AccessMatic</a></div>\n",
                );
            }
            body.push_str("</div>\n</div>\n</div>");
            modal("document", &body)
        }
        View::Error {
            url,
            file_name,
            message,
            detail,
            retry_available,
            network_blocked,
        } => {
            let mut body = String::with_capacity(2048);
            let _ = write!(
                body,
                r#"<div class="accessmatic-error-content">
<div class="error-header">
<h3 id="accessmatic-modal-title">Accessibility Processing Unavailable</h3>
<button class="close-btn" aria-label="Close">&times;</button>
</div>
<div class="error-body">
<div class="error-message">
<p class="file-name">{file_name}</p>
<p>{message}</p>
"#,
                file_name = escape_html(file_name),
                message = escape_html(message),
            );
            if *network_blocked {
                body.push_str(
                    "<p><strong>Network restrictions detected.</strong> Contact your IT department \
                     about AccessMatic access for full functionality.</p>\n",
                );
            } else {
                body.push_str(
                    "<p>This may be a temporary issue. Please try again in a few moments.</p>\n",
                );
            }
            let _ = write!(
                body,
                r#"</div>
<div class="error-actions">
<a href="{href}" target="_blank" rel="noopener" class="primary-btn">Open Original PDF</a>
<button class="secondary-btn close-btn">Close</button>
"#,
                href = escape_html(url),
            );
            if *retry_available {
                let _ = writeln!(
                    body,
                    "<button class=\"secondary-btn retry-btn\" data-accessmatic-retry=\"{}\">Try Again</button>",
                    escape_html(url)
                );
            }
            body.push_str("</div>\n");
            if let Some(detail) = detail {
                let _ = writeln!(
                    body,
                    "<details class=\"help-section\"><summary>Error details</summary>\
                     <p class=\"error-details\">Error: {}</p></details>",
                    escape_html(detail)
                );
            }
            body.push_str("</div>\n</div>");
            modal("error", &body)
        }
    }
}

fn processing_body(file_name: &str, network_notice: bool) -> String {
    let mut body = String::with_capacity(1024);
    let _ = write!(
        body,
        r#"<div class="accessmatic-processing-content">
<div class="processing-header">
<h3 id="accessmatic-modal-title">Making Document Accessible</h3>
<button class="close-btn" aria-label="Close">&times;</button>
</div>
<div class="processing-body">
<div class="document-info"><div class="file-name">{}</div></div>
<div class="progress-container" role="status" aria-live="polite">
<div class="progress-bar"><div class="progress-fill"></div></div>
<div class="progress-text">Processing document...</div>
</div>
<div class="processing-steps">
"#,
        escape_html(file_name)
    );
    for (i, (step, text)) in PROCESSING_STEPS.iter().enumerate() {
        let active = if i == 0 { " active" } else { "" };
        let _ = writeln!(
            body,
            "<div class=\"step{active}\" data-step=\"{step}\"><span class=\"step-text\">{text}</span></div>"
        );
    }
    body.push_str("</div>\n");
    if network_notice {
        body.push_str(
            "<div class=\"network-notice\"><div class=\"notice-text\">\
             <strong>Secure Network Detected</strong><br>\
             Processing locally with basic accessibility features</div></div>\n",
        );
    }
    body.push_str("</div>\n</div>");
    body
}

fn modal(kind: &str, body: &str) -> String {
    format!(
        "<div class=\"accessmatic-modal accessmatic-{kind}-modal\" role=\"dialog\" \
         aria-modal=\"true\" aria-labelledby=\"accessmatic-modal-title\">\n\
         <div class=\"accessmatic-overlay\"></div>\n{body}\n</div>\n"
    )
}
