//! Result types produced by the processing pipelines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// WCAG conformance reported for a rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplianceLevel {
    A,
    AA,
    Partial,
}

impl ComplianceLevel {
    /// Map a backend label onto the three levels the widget displays.
    /// `AAA` is shown as `AA`; anything unrecognised is `Partial`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().trim_start_matches("WCAG").trim() {
            "AA" | "AAA" | "2.1 AA" | "2.1 AAA" => ComplianceLevel::AA,
            "A" | "2.1 A" => ComplianceLevel::A,
            _ => ComplianceLevel::Partial,
        }
    }
}

impl fmt::Display for ComplianceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComplianceLevel::A => "A",
            ComplianceLevel::AA => "AA",
            ComplianceLevel::Partial => "Partial",
        })
    }
}

/// Which pipeline produced a rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMethod {
    Remote,
    Local,
}

/// An accessible HTML rendition of one PDF.
///
/// Immutable once created. The result cache owns it behind an `Arc`; views
/// hold clones of that `Arc`, never copies of the markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibleResult {
    /// Normalized URL of the source PDF.
    pub source_url: String,
    /// Sanitized markup fragment, ready to be placed inside the viewer.
    pub accessible_html: String,
    /// 0–100.
    pub accessibility_score: u8,
    pub compliance_level: ComplianceLevel,
    pub processing_method: ProcessingMethod,
    /// Optional note shown in the viewer footer.
    pub message: Option<String>,
}

/// Clamp a backend-supplied score into 0–100, rounding fractions.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}
