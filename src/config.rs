//! Configuration types for the AccessMatic widget.
//!
//! All widget behaviour is controlled through [`WidgetConfig`], built via its
//! [`WidgetConfigBuilder`] or read from the attributes of the embedding
//! `<script data-accessmatic-key=…>` tag with
//! [`WidgetConfig::from_script_attributes`].

use crate::error::AccessMaticError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Default processing API base URL.
pub const DEFAULT_API_URL: &str = "https://api.accessmatic.us/api/v1";

/// Configuration for one widget instance.
///
/// # Example
/// ```rust
/// use accessmatic::WidgetConfig;
///
/// let config = WidgetConfig::builder()
///     .api_key("am_live_123")
///     .timeout_ms(20_000)
///     .build()
///     .unwrap();
/// assert!(config.remote_enabled());
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Bearer token for the processing API. No default: without a key the
    /// remote pipeline is disabled and every document is processed locally.
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,

    /// Base URL of the processing API. Default: [`DEFAULT_API_URL`].
    pub api_url: String,

    /// Verbose per-link logging and raw error details in the error view. Default: false.
    pub debug: bool,

    /// Scan the page and observe mutations as part of initialisation. Default: true.
    pub auto_discover: bool,

    /// Show the "Powered by AccessMatic" footer in the document view. Default: true.
    pub show_branding: bool,

    /// Reserved for bounded submission retries. Default: 3.
    ///
    /// Read and validated but not yet used: submission is attempted once.
    pub retry_attempts: u32,

    /// Upper bound on polling, measured from a successful submission. Default: 30 000 ms.
    pub timeout_ms: u64,

    /// Delay between two status requests for the same task. Default: 2 000 ms.
    pub poll_interval_ms: u64,

    /// Hard timeout for the one-shot connectivity probe. Default: 3 000 ms.
    pub probe_timeout_ms: u64,

    /// Simulated latency of the local pipeline. Default: 2 000 ms.
    pub local_delay_ms: u64,

    /// Whether the backend may be contacted at all. Default: [`DiscoveryMode::Auto`].
    pub discovery_mode: DiscoveryMode,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            debug: false,
            auto_discover: true,
            show_branding: true,
            retry_attempts: 3,
            timeout_ms: 30_000,
            poll_interval_ms: 2_000,
            probe_timeout_ms: 3_000,
            local_delay_ms: 2_000,
            discovery_mode: DiscoveryMode::default(),
        }
    }
}

impl fmt::Debug for WidgetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("debug", &self.debug)
            .field("auto_discover", &self.auto_discover)
            .field("show_branding", &self.show_branding)
            .field("retry_attempts", &self.retry_attempts)
            .field("timeout_ms", &self.timeout_ms)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("probe_timeout_ms", &self.probe_timeout_ms)
            .field("local_delay_ms", &self.local_delay_ms)
            .field("discovery_mode", &self.discovery_mode)
            .finish()
    }
}

impl WidgetConfig {
    /// Create a new builder for `WidgetConfig`.
    pub fn builder() -> WidgetConfigBuilder {
        WidgetConfigBuilder {
            config: Self::default(),
        }
    }

    /// True when the remote pipeline may be used at all.
    pub fn remote_enabled(&self) -> bool {
        self.discovery_mode == DiscoveryMode::Auto
            && self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Build a configuration from the `data-*` attributes of the embedding
    /// script tag. Unknown attributes are ignored; malformed numbers are
    /// reported as [`AccessMaticError::InvalidConfig`].
    pub fn from_script_attributes(
        attrs: &HashMap<String, String>,
    ) -> Result<Self, AccessMaticError> {
        Self::builder().script_attributes(attrs)?.build()
    }
}

/// Builder for [`WidgetConfig`].
#[derive(Debug)]
pub struct WidgetConfigBuilder {
    config: WidgetConfig,
}

impl WidgetConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn debug(mut self, v: bool) -> Self {
        self.config.debug = v;
        self
    }

    pub fn auto_discover(mut self, v: bool) -> Self {
        self.config.auto_discover = v;
        self
    }

    pub fn show_branding(mut self, v: bool) -> Self {
        self.config.show_branding = v;
        self
    }

    pub fn retry_attempts(mut self, n: u32) -> Self {
        self.config.retry_attempts = n;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms.max(1);
        self
    }

    pub fn probe_timeout_ms(mut self, ms: u64) -> Self {
        self.config.probe_timeout_ms = ms.clamp(500, 10_000);
        self
    }

    pub fn local_delay_ms(mut self, ms: u64) -> Self {
        self.config.local_delay_ms = ms;
        self
    }

    pub fn discovery_mode(mut self, mode: DiscoveryMode) -> Self {
        self.config.discovery_mode = mode;
        self
    }

    /// Overlay the recognised `data-*` script attributes onto this builder.
    pub fn script_attributes(
        mut self,
        attrs: &HashMap<String, String>,
    ) -> Result<Self, AccessMaticError> {
        if let Some(key) = attrs.get("data-accessmatic-key") {
            if !key.trim().is_empty() {
                self = self.api_key(key.trim());
            }
        }
        if let Some(url) = attrs.get("data-api-url") {
            self = self.api_url(url.trim());
        }
        if let Some(v) = attrs.get("data-debug") {
            self = self.debug(parse_flag(v));
        }
        if let Some(v) = attrs.get("data-auto-discover") {
            self = self.auto_discover(parse_flag(v));
        }
        if let Some(v) = attrs.get("data-show-branding") {
            self = self.show_branding(parse_flag(v));
        }
        if let Some(v) = attrs.get("data-discovery-mode") {
            self = self.discovery_mode(v.parse()?);
        }
        if let Some(v) = attrs.get("data-timeout") {
            self = self.timeout_ms(parse_number("data-timeout", v)?);
        }
        if let Some(v) = attrs.get("data-retry-attempts") {
            let n = parse_number("data-retry-attempts", v)?;
            self = self.retry_attempts(u32::try_from(n).unwrap_or(u32::MAX));
        }
        Ok(self)
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<WidgetConfig, AccessMaticError> {
        let c = &self.config;
        let url = Url::parse(&c.api_url).map_err(|e| {
            AccessMaticError::InvalidConfig(format!("api_url '{}' is not a URL: {}", c.api_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AccessMaticError::InvalidConfig(format!(
                "api_url must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if c.timeout_ms == 0 {
            return Err(AccessMaticError::InvalidConfig(
                "timeout_ms must be ≥ 1".into(),
            ));
        }
        let mut config = self.config;
        // A poll interval longer than the timeout would never poll.
        config.poll_interval_ms = config.poll_interval_ms.min(config.timeout_ms);
        Ok(config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Whether the widget may talk to the processing API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryMode {
    /// Probe the backend once and use it when reachable. (default)
    #[default]
    Auto,
    /// Never contact the backend; every document goes through the local pipeline.
    LocalOnly,
}

impl std::str::FromStr for DiscoveryMode {
    type Err = AccessMaticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "proxy" => Ok(DiscoveryMode::Auto),
            "local-only" | "local" => Ok(DiscoveryMode::LocalOnly),
            other => Err(AccessMaticError::InvalidConfig(format!(
                "unknown discovery mode '{other}' (expected auto or local-only)"
            ))),
        }
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "")
}

fn parse_number(name: &str, v: &str) -> Result<u64, AccessMaticError> {
    v.trim()
        .parse()
        .map_err(|_| AccessMaticError::InvalidConfig(format!("{name} must be a number, got '{v}'")))
}
