//! Error taxonomy (§7 of the spec).
//!
//! Kinds, not type names: callers match on the [`ScrapeError`] / [`CrawlError`]
//! variants rather than on concrete downstream error types. Engine-tier and
//! feature-negotiation errors are expected to be absorbed internally by the
//! orchestrator (§4.E) — they exist here so the orchestrator can pattern-match
//! on them, not so the HTTP layer ever sees them.

use thiserror::Error;

/// Abort tier a cancellation cause is interpreted at (§4.D / §9).
///
/// Ordering matters: `External > Scrape > Engine` governs whether the
/// orchestrator absorbs a cancellation (recoverable, try next engine) or lets
/// it propagate to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AbortTier {
    Engine,
    Scrape,
    External,
}

/// Errors raised while validating/normalizing a caller-supplied URL (§4.A).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),
    #[error("blocklisted URL: {0}")]
    BlocklistedUrl(String),
}

/// Feature-negotiation signals (§4.E, §7). Never surfaced to callers — the
/// orchestrator catches these and restarts the outer loop with adjusted
/// feature flags.
#[derive(Debug, Error, Clone)]
pub enum FeatureSignal {
    #[error("engine requests additional features: {0:?}")]
    AddFeature(Vec<String>, Option<bool>),
    #[error("engine requests removal of features: {0:?}")]
    RemoveFeature(Vec<String>),
}

/// Per-engine outcomes the waterfall reasons over (§4.E).
///
/// `EngineUnsuccessful` and `EngineError` are absorbed (try next engine).
/// Everything else here is terminal for the whole scrape once it surfaces
/// from an engine attempt, per the propagation table in §7.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// Output too short and status was 2xx/304 — plausibly a legitimate but
    /// uninteresting empty page; try the next engine rather than failing.
    #[error("engine produced an unacceptable (empty) result")]
    EngineUnsuccessful,
    #[error("engine internal error: {0}")]
    Internal(String),
    #[error("index cache miss")]
    IndexMiss,
    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),
    #[error("TLS/SSL error: {0}")]
    Ssl(String),
    #[error("browser failed to load page: {0}")]
    Site(String),
    #[error("page action failed: {0}")]
    Action(String),
    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),
    #[error("PDF blocked by antibot")]
    PdfAntibot,
    #[error("insufficient time budget to render PDF")]
    PdfInsufficientTime,
    #[error("PDF prefetch failed")]
    PdfPrefetchFailed,
    #[error("LLM refused the extraction request")]
    LlmRefusal,
    #[error("zero-data-retention policy forbids a requested feature: {0}")]
    ZdrViolation(String),
    #[error(transparent)]
    Feature(#[from] FeatureSignal),
    #[error("engine-tier abort: {0}")]
    Aborted(String),
}

/// Top-level error returned by the orchestrator for one scrape attempt (§7).
#[derive(Debug, Error, Clone)]
pub enum ScrapeError {
    #[error(transparent)]
    Url(#[from] UrlError),
    #[error("missing credentials")]
    MissingCredentials,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("robots.txt disallows this URL")]
    RobotsDisallow,
    #[error("request body was malformed: {0}")]
    BadRequest(String),
    #[error("LLM refused the extraction request")]
    LlmRefusal,
    #[error("extraction schema was invalid: {0}")]
    InvalidSchema(String),
    #[error("cost limit exceeded")]
    CostLimitExceeded,
    #[error("no engines produced an acceptable result")]
    NoEnginesLeft,
    #[error("scrape exceeded its time budget")]
    ScrapeTimeout,
    #[error("a single engine was sniped after another engine won")]
    EngineSniped,
    #[error("zero-data-retention policy forbids a requested feature: {0}")]
    ZdrViolation(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("caller cancelled the request")]
    ExternalCancel,
}

impl ScrapeError {
    /// HTTP status code per the mapping table in §7.
    pub fn status_code(&self) -> u16 {
        match self {
            ScrapeError::Url(UrlError::InvalidUrl(_)) => 400,
            ScrapeError::Url(UrlError::UnsupportedProtocol(_)) => 400,
            ScrapeError::Url(UrlError::BlocklistedUrl(_)) => 403,
            ScrapeError::BadRequest(_) => 400,
            ScrapeError::MissingCredentials | ScrapeError::InvalidCredentials => 401,
            ScrapeError::RobotsDisallow => 403,
            ScrapeError::ZdrViolation(_) => 400,
            ScrapeError::ScrapeTimeout => 408,
            ScrapeError::NoEnginesLeft => 500,
            ScrapeError::EngineSniped => 500,
            ScrapeError::ExternalCancel => 499,
            ScrapeError::LlmRefusal | ScrapeError::InvalidSchema(_) => 422,
            ScrapeError::CostLimitExceeded => 402,
            ScrapeError::Engine(_) => 500,
        }
    }
}

/// Errors a transformer stage in the pipeline (§4.F) can raise. Most stages
/// are pure functions over already-validated input and cannot fail; this
/// exists for the two stages that can: JSON extraction (talks to an external
/// completion provider) and screenshot upload (talks to an external blob
/// store).
#[derive(Debug, Error, Clone)]
pub enum TransformError {
    #[error("LLM refused the extraction request")]
    LlmRefusal,
    #[error("extraction schema was invalid: {0}")]
    InvalidSchema(String),
    #[error("blob upload failed: {0}")]
    BlobUpload(String),
    /// Reported by the completion provider itself (e.g. a hosted LLM billing
    /// cap), not a ceiling this crate enforces — see `CostTracking`.
    #[error("cost limit exceeded")]
    CostLimitExceeded,
}

impl From<TransformError> for ScrapeError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::LlmRefusal => ScrapeError::LlmRefusal,
            TransformError::InvalidSchema(s) => ScrapeError::InvalidSchema(s),
            TransformError::BlobUpload(s) => ScrapeError::Engine(EngineError::Internal(s)),
            TransformError::CostLimitExceeded => ScrapeError::CostLimitExceeded,
        }
    }
}

/// Errors a [`crate::crawl::Coordinator`] can record at the job or per-URL
/// level (§4.K, §7).
#[derive(Debug, Error, Clone)]
pub enum CrawlJobError {
    #[error(transparent)]
    Url(#[from] UrlError),
    #[error("seed URL is blocked by robots.txt")]
    SeedRobotsBlocked,
    #[error("seed URL is unreachable: {0}")]
    SeedUnreachable(String),
    #[error("job was cancelled")]
    Cancelled,
    #[error("job wait timed out")]
    JobWaitTimeout,
    #[error("crawl job not found")]
    NotFound,
}

impl CrawlJobError {
    /// HTTP status code per the §7 mapping table, extended with 404 for the
    /// job-lookup failures the HTTP API layer needs that a pure coordinator
    /// error never produces on its own.
    pub fn status_code(&self) -> u16 {
        match self {
            CrawlJobError::Url(UrlError::InvalidUrl(_)) => 400,
            CrawlJobError::Url(UrlError::UnsupportedProtocol(_)) => 400,
            CrawlJobError::Url(UrlError::BlocklistedUrl(_)) => 403,
            CrawlJobError::SeedRobotsBlocked => 403,
            CrawlJobError::SeedUnreachable(_) => 400,
            CrawlJobError::Cancelled => 499,
            CrawlJobError::JobWaitTimeout => 408,
            CrawlJobError::NotFound => 404,
        }
    }
}
