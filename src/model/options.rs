//! Scrape/crawl request options and the feature-flag vocabulary (§3, §4.E).

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Output formats a scrape can be asked to produce (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Format {
    Markdown,
    Html,
    RawHtml,
    Links,
    Screenshot,
    /// `screenshot@fullPage` (§3): same capture, full-page rather than viewport.
    ScreenshotFullPage,
    Json,
}

/// A single named feature an engine may or may not support (§4.C/§4.E).
/// Kept as a string newtype (rather than a closed enum) because the
/// orchestrator's feature-negotiation loop treats feature names as opaque
/// tokens it adds/removes per `FeatureSignal` — new features an engine wants
/// to request should never require a central enum edit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureFlag(pub String);

impl FeatureFlag {
    pub const JS_RENDER: &'static str = "jsRender";
    pub const SCREENSHOT: &'static str = "screenshot";
    pub const SCREENSHOT_FULL_SCREEN: &'static str = "screenshot@fullScreen";
    pub const PDF: &'static str = "pdf";
    pub const ACTIONS: &'static str = "actions";
    pub const WAIT_FOR: &'static str = "waitFor";
    pub const ATSV: &'static str = "atsv";
    pub const LOCATION: &'static str = "location";
    pub const MOBILE: &'static str = "mobile";
    pub const SKIP_TLS_VERIFICATION: &'static str = "skipTlsVerification";
    pub const USE_FAST_MODE: &'static str = "useFastMode";
    pub const DISABLE_ADBLOCK: &'static str = "disableAdblock";
    pub const ATSLEAST_PROXY: &'static str = "atLeastProxy";
    pub const STEALTH_PROXY: &'static str = "stealthProxy";
    pub const JSON_EXTRACT: &'static str = "jsonExtract";

    pub fn new(name: impl Into<String>) -> Self {
        FeatureFlag(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FeatureFlag {
    fn from(s: &str) -> Self {
        FeatureFlag(s.to_string())
    }
}

/// A page interaction step (§3 `Action`), executed in order by any engine
/// that declares the `actions` feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Wait { milliseconds: u64 },
    Click { selector: String },
    Write { selector: String, text: String },
    PressKey { key: String },
    Scroll { direction: ScrollDirection },
    Screenshot { full_page: bool },
    ExecuteJs { script: String },
    Scrape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// A JSON-schema-driven extraction request (§4.J).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonExtractOptions {
    pub schema: Option<serde_json::Value>,
    pub prompt: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// §4.J "smart-scrape" variant: let the completion provider decide
    /// whether page interaction is needed before extracting, delegating to
    /// a browser engine with its action plan and re-extracting if so.
    #[serde(default)]
    pub smart_scrape: bool,
}

/// Cumulative LLM token spend for one scrape (§4.E `Meta.costTracking`,
/// §4.J "add token usage to costTracking"). A crawl could share one tracker
/// across its scrapes in the future; today every scrape starts at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostTracking {
    spent_tokens: u64,
}

impl CostTracking {
    pub fn record_tokens(&mut self, tokens: u64) {
        self.spent_tokens += tokens;
    }

    pub fn spent_tokens(&self) -> u64 {
        self.spent_tokens
    }
}

/// Per-scrape options (§3 `ScrapeOptions`), the caller-facing request shape
/// for `/v1/scrape` and the per-URL options used inside a crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOptions {
    #[serde(default = "default_formats")]
    pub formats: BTreeSet<Format>,
    #[serde(default = "default_true")]
    pub only_main_content: bool,
    #[serde(default)]
    pub include_tags: Vec<String>,
    #[serde(default)]
    pub exclude_tags: Vec<String>,
    /// Wire shape is a plain JSON object (§3 "map of request headers"), not
    /// an array of pairs — order doesn't matter for outbound request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub json_extract: Option<JsonExtractOptions>,
    #[serde(default)]
    pub mobile: bool,
    #[serde(default)]
    pub skip_tls_verification: bool,
    /// `None` means "no caller-supplied timeout" — distinct from any
    /// particular duration, since `waterfallInterval` (§4.E) falls back to
    /// a different formula when no timeout was given rather than treating
    /// absence as a fixed default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub wait_for_ms: Option<u64>,
    #[serde(default)]
    pub remove_base64_images: bool,
    #[serde(default)]
    pub zero_data_retention: bool,
    #[serde(default)]
    pub proxy: Option<ProxyTier>,
    #[serde(default)]
    pub location: Option<Location>,
    /// Trades fidelity for speed (skips JS rendering when the plain HTTP
    /// engine alone would do); widens, never narrows, the eligible engine set.
    #[serde(default)]
    pub fast_mode: bool,
    #[serde(default)]
    pub block_ads: bool,
    #[serde(default = "default_true")]
    pub parse_pdf: bool,
}

fn default_true() -> bool {
    true
}

fn default_formats() -> BTreeSet<Format> {
    BTreeSet::from([Format::Markdown])
}

impl ScrapeOptions {
    /// The caller's explicit timeout, or the §4.E waterfall-formula default
    /// (300s once `actions`/`jsonExtract` are in play, since those need more
    /// wall-clock than a plain fetch; 120s otherwise).
    pub fn timeout(&self) -> Duration {
        match self.timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => self.default_timeout(),
        }
    }

    fn default_timeout(&self) -> Duration {
        let hints_at_longer_work = !self.actions.is_empty() || self.json_extract.is_some();
        Duration::from_millis(if hints_at_longer_work { 300_000 } else { 120_000 })
    }

    /// The feature set this request implies, independent of what any
    /// particular engine supports (§4.C `requiredFeatures`).
    pub fn required_features(&self) -> BTreeSet<FeatureFlag> {
        let mut out = BTreeSet::new();
        if self.formats.contains(&Format::Screenshot) {
            out.insert(FeatureFlag::new(FeatureFlag::SCREENSHOT));
        }
        if self.formats.contains(&Format::ScreenshotFullPage) {
            out.insert(FeatureFlag::new(FeatureFlag::SCREENSHOT));
            out.insert(FeatureFlag::new(FeatureFlag::SCREENSHOT_FULL_SCREEN));
        }
        if !self.actions.is_empty() {
            out.insert(FeatureFlag::new(FeatureFlag::ACTIONS));
        }
        if self.json_extract.is_some() {
            out.insert(FeatureFlag::new(FeatureFlag::JSON_EXTRACT));
        }
        if self.wait_for_ms.is_some() {
            out.insert(FeatureFlag::new(FeatureFlag::WAIT_FOR));
        }
        if self.mobile {
            out.insert(FeatureFlag::new(FeatureFlag::MOBILE));
        }
        if self.skip_tls_verification {
            out.insert(FeatureFlag::new(FeatureFlag::ATSV));
        }
        if self.location.is_some() {
            out.insert(FeatureFlag::new(FeatureFlag::LOCATION));
        }
        match self.proxy {
            Some(ProxyTier::Stealth) => {
                out.insert(FeatureFlag::new(FeatureFlag::STEALTH_PROXY));
            }
            Some(ProxyTier::Basic) => {
                out.insert(FeatureFlag::new(FeatureFlag::ATSLEAST_PROXY));
            }
            // `auto` doesn't commit to a tier up front — the orchestrator
            // escalates through the ladder itself on a blocked response.
            Some(ProxyTier::Auto) | None => {}
        }
        out
    }
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        ScrapeOptions {
            formats: default_formats(),
            only_main_content: true,
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            headers: BTreeMap::new(),
            actions: Vec::new(),
            json_extract: None,
            mobile: false,
            skip_tls_verification: false,
            timeout_ms: None,
            wait_for_ms: None,
            remove_base64_images: false,
            zero_data_retention: false,
            proxy: None,
            location: None,
            fast_mode: false,
            block_ads: false,
            parse_pdf: true,
        }
    }
}

/// Proxy tier requested (or escalated to) for a scrape attempt (§4.E
/// "proxy-upgrade-on-401/403/429" logic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProxyTier {
    /// Caller doesn't commit to a tier: the orchestrator escalates through
    /// `Basic` then `Stealth` on a blocked (401/403/429) response. Outside
    /// of `auto`, a blocked response is left for the waterfall's normal
    /// next-engine fallback rather than retried with a stronger proxy.
    Auto,
    Basic,
    Stealth,
}

impl ProxyTier {
    /// The next tier up, or `None` if already at the top (used when an
    /// engine attempt comes back 401/403/429 and the orchestrator decides
    /// to retry with a stronger proxy before falling back to the next
    /// engine entirely).
    pub fn escalate(self) -> Option<ProxyTier> {
        match self {
            ProxyTier::Auto => Some(ProxyTier::Basic),
            ProxyTier::Basic => Some(ProxyTier::Stealth),
            ProxyTier::Stealth => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub country: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_formats_is_markdown_only() {
        let opts = ScrapeOptions::default();
        assert_eq!(opts.formats, BTreeSet::from([Format::Markdown]));
    }

    #[test]
    fn required_features_tracks_screenshot_format() {
        let mut opts = ScrapeOptions::default();
        opts.formats.insert(Format::Screenshot);
        let features = opts.required_features();
        assert!(features.contains(&FeatureFlag::new(FeatureFlag::SCREENSHOT)));
    }

    #[test]
    fn proxy_tier_escalates_through_the_ladder() {
        assert_eq!(ProxyTier::Auto.escalate(), Some(ProxyTier::Basic));
        assert_eq!(ProxyTier::Basic.escalate(), Some(ProxyTier::Stealth));
        assert_eq!(ProxyTier::Stealth.escalate(), None);
    }
}
