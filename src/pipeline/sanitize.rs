//! Sanitization: deterministic cleanup of backend-supplied HTML.
//!
//! The backend's `accessible_html` is placed straight into the viewer, so
//! anything that can execute has to go first. This is a small, ordered regex
//! rule chain, not a full HTML sanitizer; the backend is trusted to emit
//! well-formed markup and these rules only remove active content.
//!
//! ## Rule Order
//!
//! Line endings are normalised before the block rules so `(?s)` spans behave
//! the same on every platform. Whole blocks are removed before attribute
//! rules, otherwise a handler inside a stripped `<script>` would be rewritten
//! for nothing.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all sanitization rules to a backend HTML fragment.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Remove `<script>`, `<style>`, `<iframe>`, `<object>` blocks
/// 3. Remove void or self-closing `<embed>` tags and stray openers
/// 4. Drop inline `on*=` event handler attributes
/// 5. Neutralise `javascript:` URLs in `href`/`src`/`action`
/// 6. Trim surrounding whitespace
pub fn sanitize_html(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_active_blocks(&s);
    let s = remove_embed_tags(&s);
    let s = remove_event_handlers(&s);
    let s = neutralise_javascript_urls(&s);
    s.trim().to_string()
}

/// Escape text for use inside HTML element content or a quoted attribute.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 16);
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove executable / embedded blocks ──────────────────────────────

static RE_ACTIVE_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["script", "style", "iframe", "object"]
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).unwrap())
        .collect()
});

static RE_UNCLOSED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(?:script|style|iframe|object)\b[^>]*>.*$").unwrap());

fn remove_active_blocks(input: &str) -> String {
    let mut s = input.to_string();
    for re in RE_ACTIVE_BLOCKS.iter() {
        s = re.replace_all(&s, "").into_owned();
    }
    // An opener with no closer swallows the rest of the fragment.
    RE_UNCLOSED_BLOCK.replace_all(&s, "").into_owned()
}

// ── Rule 3: Remove <embed> ───────────────────────────────────────────────────

static RE_EMBED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<embed\b[^>]*>(?:\s*</embed\s*>)?").unwrap());

fn remove_embed_tags(input: &str) -> String {
    RE_EMBED.replace_all(input, "").into_owned()
}

// ── Rule 4: Drop inline event handlers ───────────────────────────────────────

static RE_EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).unwrap()
});

fn remove_event_handlers(input: &str) -> String {
    RE_EVENT_HANDLER.replace_all(input, "").into_owned()
}

// ── Rule 5: Neutralise javascript: URLs ──────────────────────────────────────

static RE_JS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(href|src|action)\s*=\s*(["']?)\s*javascript:[^"'\s>]*(["']?)"#).unwrap()
});

fn neutralise_javascript_urls(input: &str) -> String {
    RE_JS_URL.replace_all(input, "$1=$2#$3").into_owned()
}
