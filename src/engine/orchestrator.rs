//! Scrape Orchestrator (§4.E): builds per-scrape metadata, runs the engine
//! waterfall (lazy timer-driven launch, race-to-first-acceptable, snipe the
//! losers), renegotiates features when an engine asks for more/fewer of
//! them, and hands the winning fetch off to the transformer pipeline (§4.F).

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::blob::BlobStore;
use crate::completion::CompletionProvider;
use crate::engine::abort::AbortInstance;
use crate::engine::registry::{Engine, EngineRegistry};
use crate::engine::{FetchOutcome, Fetcher};
use crate::error::{AbortTier, EngineError, ScrapeError};
use crate::model::{Action, CostTracking, Document, FeatureFlag, ProxyTier, ScrapeOptions, ScrapeUrl};
use crate::robots::RobotsPolicy;
use crate::transform;

/// Per-scrape state threaded through the outer feature-renegotiation loop
/// and the waterfall (§4.E `Meta`).
pub struct Meta {
    pub url: ScrapeUrl,
    pub options: ScrapeOptions,
    pub required_features: BTreeSet<FeatureFlag>,
    pub proxy: Option<ProxyTier>,
    /// `true` once this scrape has widened into a PDF attempt (§4.E
    /// `Meta.pdfPrefetch`). Gates `PdfAntibot` handling: the first widen
    /// into PDF buys one retry after stripping the `pdf` requirement again;
    /// any `PdfAntibot` seen once this is already set is terminal.
    pub pdf_prefetch: bool,
    /// Set once at construction from whether the caller asked for `auto`
    /// proxy tiering — kept separate from `proxy` itself so escalation
    /// keeps firing even after `proxy` has moved off `Auto` and up the
    /// ladder (§4.E "proxy-upgrade-on-401/403/429").
    pub auto_proxy_escalation: bool,
    pub cost_tracking: CostTracking,
}

impl Meta {
    fn new(url: ScrapeUrl, options: ScrapeOptions) -> Self {
        let required_features = options.required_features();
        let proxy = options.proxy;
        let auto_proxy_escalation = matches!(proxy, Some(ProxyTier::Auto));
        Meta {
            url,
            options,
            required_features,
            proxy,
            pdf_prefetch: false,
            auto_proxy_escalation,
            cost_tracking: CostTracking::default(),
        }
    }
}

pub struct ScrapeOrchestrator {
    fetchers: BTreeMap<Engine, Arc<dyn Fetcher>>,
    robots: RobotsPolicy,
    blob_store: Option<Arc<dyn BlobStore>>,
    completion: Option<Arc<dyn CompletionProvider>>,
    max_renegotiations: u8,
    max_proxy_escalations: u8,
}

impl ScrapeOrchestrator {
    pub fn new(fetchers: BTreeMap<Engine, Arc<dyn Fetcher>>, robots: RobotsPolicy) -> Self {
        ScrapeOrchestrator {
            fetchers,
            robots,
            blob_store: None,
            completion: None,
            max_renegotiations: 3,
            max_proxy_escalations: 2,
        }
    }

    pub fn with_blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    pub fn with_completion(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion = Some(provider);
        self
    }

    pub async fn scrape(
        &self,
        raw_url: &str,
        options: ScrapeOptions,
        external_abort: &AbortInstance,
    ) -> Result<Document, ScrapeError> {
        let url = ScrapeUrl::validate(raw_url)?;
        // The caller-supplied URL, normalized but not yet rewritten — this is
        // what `metadata.sourceURL` must equal no matter what we actually
        // fetch (§8 invariant, §4.E "sourceURL=caller URL").
        let source_url = url.as_url().as_str().to_string();

        if options.zero_data_retention && options.json_extract.is_some() {
            // json extraction implies sending content to an external
            // completion provider (§1); incompatible with ZDR (§7).
            return Err(ScrapeError::ZdrViolation("jsonExtract".to_string()));
        }

        if !self.robots.is_allowed(url.as_url()).await {
            return Err(ScrapeError::RobotsDisallow);
        }

        // URL rewrites (§4.E): Google Docs/Slides share links fetch as their
        // direct-export form, but the caller-facing source URL is untouched.
        let rewritten = rewrite_url(&source_url);
        let fetch_url = if rewritten == source_url {
            url
        } else {
            ScrapeUrl::validate(&rewritten)?
        };

        let scrape_abort = external_abort.child(AbortTier::Scrape, Some(options.timeout()));
        let mut meta = Meta::new(fetch_url, options);

        let mut renegotiations = 0u8;
        let outcome = loop {
            match self.run_waterfall(&mut meta, &scrape_abort).await {
                Ok(outcome) => break outcome,
                Err(WaterfallError::Renegotiate) if renegotiations < self.max_renegotiations => {
                    renegotiations += 1;
                    continue;
                }
                Err(WaterfallError::Scrape(e)) => return Err(e),
                Err(WaterfallError::Renegotiate) => {
                    return Err(ScrapeError::NoEnginesLeft);
                }
            }
        };

        let mut scaffold = Document::scaffold(source_url, outcome.status_code);
        scaffold.metadata.url = Some(outcome.final_url.clone());
        scaffold.metadata.proxy_used = meta.proxy;
        scaffold.metadata.content_type = outcome
            .response_headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.clone());
        scaffold.screenshot = outcome.screenshot.clone();
        scaffold.actions = outcome.actions.clone();
        if !outcome.unsupported_features.is_empty() {
            let names: Vec<&str> = outcome.unsupported_features.iter().map(|f| f.as_str()).collect();
            scaffold.add_warning(format!("winning engine does not support: {}", names.join(", ")));
        }

        let html = self.maybe_smart_scrape(&meta, outcome.html, &scrape_abort).await;

        transform::run_pipeline_with(
            scaffold,
            &html,
            &meta.options,
            self.blob_store.as_deref(),
            self.completion.as_deref(),
            &mut meta.cost_tracking,
        )
        .await
        .map_err(ScrapeError::from)
    }

    /// §4.J "smart-scrape" variant: if `jsonExtract.smartScrape` asked the
    /// completion provider whether interacting with the page first would
    /// help, and it returned an action plan, replay that plan through the
    /// browser engine and use its resulting HTML instead of the winning
    /// waterfall attempt's. Any failure here (no completion provider wired,
    /// no browser engine registered, the replay itself erroring) falls back
    /// to the original HTML rather than failing the whole scrape — this is
    /// a quality improvement on top of a result we already have, not a
    /// required step.
    async fn maybe_smart_scrape(&self, meta: &Meta, html: String, scrape_abort: &AbortInstance) -> String {
        let Some(extract_opts) = &meta.options.json_extract else {
            return html;
        };
        if !extract_opts.smart_scrape {
            return html;
        }
        let Some(completion) = &self.completion else {
            return html;
        };

        let plan = completion
            .plan_interaction(&html, extract_opts.schema.as_ref(), extract_opts.prompt.as_deref())
            .await;
        let Ok(Some(actions)) = plan else {
            return html;
        };

        let Some(fetcher) = self.fetchers.get(&Engine::BrowserCdp).cloned() else {
            warn!("smart-scrape requested an action plan but no browser engine is registered");
            return html;
        };

        let mut replay_options = meta.options.clone();
        replay_options.actions = actions;

        let engine_abort = scrape_abort.child(AbortTier::Engine, None);
        match fetcher.fetch(&meta.url, &replay_options, meta.proxy, &engine_abort).await {
            Ok(outcome) => outcome.html,
            Err(e) => {
                warn!(error = %e, "smart-scrape interaction replay failed, keeping original fetch");
                html
            }
        }
    }

    async fn run_waterfall(
        &self,
        meta: &mut Meta,
        scrape_abort: &AbortInstance,
    ) -> Result<FetchOutcome, WaterfallError> {
        let candidates = EngineRegistry::build_fallback_list(&meta.required_features);
        let unsupported_by_engine: BTreeMap<Engine, BTreeSet<FeatureFlag>> = candidates
            .iter()
            .map(|c| (c.engine, c.unsupported_features.clone()))
            .collect();
        let mut fallback_list: VecDeque<Engine> = candidates.into_iter().map(|c| c.engine).collect();
        if fallback_list.is_empty() {
            return Err(WaterfallError::Scrape(ScrapeError::NoEnginesLeft));
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<(Engine, AbortInstance, Result<FetchOutcome, EngineError>)>();
        let mut engine_aborts: BTreeMap<Engine, AbortInstance> = BTreeMap::new();
        let mut in_flight = 0usize;
        let mut errors: Vec<(Engine, EngineError)> = Vec::new();

        // Fires immediately for the first engine, then gets reset to
        // `waterfall_interval` each time another engine is launched (§4.E
        // "waterfallInterval"): a fast/cheap engine gets to finish before a
        // slower one is even started, but nothing else is spawned eagerly.
        let timer = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = &mut timer, if !fallback_list.is_empty() => {
                    let engine = fallback_list.pop_front().expect("checked non-empty by the select guard");
                    if let Some(fetcher) = self.fetchers.get(&engine).cloned() {
                        let engine_abort = scrape_abort.child(AbortTier::Engine, None);
                        engine_aborts.insert(engine, engine_abort.clone());

                        let url = meta.url.clone();
                        let options = meta.options.clone();
                        let proxy = meta.proxy;
                        let tx = tx.clone();
                        in_flight += 1;

                        tokio::spawn(async move {
                            if engine_abort.is_aborted() {
                                return;
                            }
                            let result = fetcher.fetch(&url, &options, proxy, &engine_abort).await;
                            let _ = tx.send((engine, engine_abort, result));
                        });
                    }

                    let remaining_count = fallback_list.len() + 1;
                    timer.as_mut().reset(tokio::time::Instant::now() + waterfall_interval(&meta.options, remaining_count));
                }
                Some((engine, _engine_abort, result)) = rx.recv(), if in_flight > 0 => {
                    in_flight -= 1;
                    match result {
                        // Each fetcher already filters `EngineUnsuccessful` itself
                        // (empty body on a 2xx/304 status) before returning `Ok`, so
                        // every outcome reaching here is acceptable per §4.E's
                        // acceptance predicate: a non-2xx response with a short body
                        // is still a legitimate result, not a reason to try the next
                        // engine.
                        Ok(mut outcome) => {
                            if needs_proxy_escalation(meta, &outcome) {
                                if let Some(escalated) = meta.proxy.and_then(ProxyTier::escalate) {
                                    if self.max_proxy_escalations > 0 {
                                        meta.proxy = Some(escalated);
                                        info!(?engine, "escalating proxy tier after blocked response");
                                        snipe_others(&engine_aborts, engine);
                                        return Err(WaterfallError::Renegotiate);
                                    }
                                }
                            }
                            snipe_others(&engine_aborts, engine);
                            outcome.unsupported_features =
                                unsupported_by_engine.get(&engine).cloned().unwrap_or_default();
                            return Ok(outcome);
                        }
                        Err(EngineError::Feature(signal)) => {
                            apply_feature_signal(meta, signal);
                            snipe_others(&engine_aborts, engine);
                            return Err(WaterfallError::Renegotiate);
                        }
                        Err(EngineError::PdfAntibot) => {
                            snipe_others(&engine_aborts, engine);
                            if meta.pdf_prefetch {
                                return Err(WaterfallError::Scrape(ScrapeError::Engine(EngineError::PdfAntibot)));
                            }
                            meta.pdf_prefetch = true;
                            meta.required_features.remove(&FeatureFlag::new(FeatureFlag::PDF));
                            return Err(WaterfallError::Renegotiate);
                        }
                        // Terminal per §7's propagation table: these mean the
                        // engine definitively failed for a reason no other
                        // engine would resolve differently, so the waterfall
                        // must not silently try the next one.
                        Err(e @ (EngineError::Site(_)
                            | EngineError::Ssl(_)
                            | EngineError::DnsResolution(_)
                            | EngineError::Action(_)
                            | EngineError::UnsupportedFile(_)
                            | EngineError::PdfInsufficientTime
                            | EngineError::PdfPrefetchFailed
                            | EngineError::LlmRefusal
                            | EngineError::ZdrViolation(_))) => {
                            snipe_others(&engine_aborts, engine);
                            return Err(WaterfallError::Scrape(ScrapeError::from(e)));
                        }
                        Err(e) => {
                            warn!(?engine, error = %e, "engine attempt failed");
                            errors.push((engine, e));
                        }
                    }
                }
                else => break,
            }

            if fallback_list.is_empty() && in_flight == 0 {
                break;
            }
        }

        if scrape_abort.is_aborted() {
            return Err(WaterfallError::Scrape(ScrapeError::ScrapeTimeout));
        }

        warn!(attempted = errors.len(), "waterfall exhausted with no acceptable result");
        Err(WaterfallError::Scrape(ScrapeError::NoEnginesLeft))
    }
}

enum WaterfallError {
    Scrape(ScrapeError),
    Renegotiate,
}

fn snipe_others(aborts: &BTreeMap<Engine, AbortInstance>, winner: Engine) {
    for (engine, abort) in aborts {
        if *engine != winner {
            abort.abort("sniped: another engine already won");
        }
    }
}

fn apply_feature_signal(meta: &mut Meta, signal: crate::error::FeatureSignal) {
    match signal {
        crate::error::FeatureSignal::AddFeature(features, sticky) => {
            for f in &features {
                meta.required_features.insert(FeatureFlag::new(f.clone()));
            }
            // A sticky `pdf` add means an engine directly observed PDF
            // content (rather than us merely allowing the capability), so
            // it counts as the one PDF prefetch this scrape gets (§4.E
            // `Meta.pdfPrefetch`).
            if sticky == Some(true) && features.iter().any(|f| f.as_str() == FeatureFlag::PDF) {
                meta.pdf_prefetch = true;
            }
        }
        crate::error::FeatureSignal::RemoveFeature(features) => {
            for f in features {
                meta.required_features.remove(&FeatureFlag::new(f));
            }
        }
    }
}

fn needs_proxy_escalation(meta: &Meta, outcome: &FetchOutcome) -> bool {
    meta.auto_proxy_escalation && matches!(outcome.status_code, 401 | 403 | 429)
}

/// `waterfallInterval` (§4.E): how long the current engine attempt gets
/// before the next fallback is launched. Caller timeout (if any) or a
/// fixed default, divided across at most the next two remaining attempts
/// — so two slow engines near the end of the list still overlap instead of
/// each claiming the whole remaining budget serially.
fn waterfall_interval(options: &ScrapeOptions, remaining_count: usize) -> Duration {
    let denom = remaining_count.clamp(1, 2) as u64;
    let total_ms = match options.timeout_ms {
        Some(ms) => ms,
        None => {
            let hints_at_longer_work = !options.actions.is_empty() || options.json_extract.is_some();
            if hints_at_longer_work { 300_000 } else { 120_000 }
        }
    };
    Duration::from_millis(total_ms / denom)
}

/// Rewrites well-known document-viewer URLs to their direct-export form
/// (§4.E URL rewrites), e.g. a Google Docs/Slides share link to its
/// plain-export equivalent so engines receive renderable content instead of
/// the editor UI shell.
fn rewrite_url(url: &str) -> String {
    if let Some(doc_id) = google_docs_id(url, "/document/d/") {
        return format!("https://docs.google.com/document/d/{doc_id}/export?format=txt");
    }
    if let Some(doc_id) = google_docs_id(url, "/presentation/d/") {
        return format!("https://docs.google.com/presentation/d/{doc_id}/export/pdf");
    }
    url.to_string()
}

fn google_docs_id(url: &str, marker: &str) -> Option<String> {
    if !url.contains("docs.google.com") {
        return None;
    }
    let idx = url.find(marker)? + marker.len();
    let rest = &url[idx..];
    let end = rest.find('/').unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_leaves_unrelated_urls_untouched() {
        assert_eq!(rewrite_url("https://example.com/page"), "https://example.com/page");
    }

    #[test]
    fn rewrite_converts_google_doc_share_link() {
        let rewritten = rewrite_url("https://docs.google.com/document/d/abc123/edit?usp=sharing");
        assert_eq!(rewritten, "https://docs.google.com/document/d/abc123/export?format=txt");
    }

    #[test]
    fn rewrite_converts_google_slides_share_link() {
        let rewritten = rewrite_url("https://docs.google.com/presentation/d/xyz789/edit");
        assert_eq!(rewritten, "https://docs.google.com/presentation/d/xyz789/export/pdf");
    }

    fn meta_with_proxy(proxy: Option<ProxyTier>) -> Meta {
        let mut options = ScrapeOptions::default();
        options.proxy = proxy;
        Meta::new(ScrapeUrl::validate("https://example.com").unwrap(), options)
    }

    #[test]
    fn proxy_escalation_triggers_on_403_only_when_auto() {
        let outcome = FetchOutcome {
            status_code: 403,
            final_url: "https://example.com".to_string(),
            ..Default::default()
        };
        let auto_meta = meta_with_proxy(Some(ProxyTier::Auto));
        assert!(needs_proxy_escalation(&auto_meta, &outcome));

        let basic_meta = meta_with_proxy(Some(ProxyTier::Basic));
        assert!(!needs_proxy_escalation(&basic_meta, &outcome));

        let no_proxy_meta = meta_with_proxy(None);
        assert!(!needs_proxy_escalation(&no_proxy_meta, &outcome));
    }

    #[test]
    fn waterfall_interval_divides_explicit_timeout_by_remaining_count() {
        let mut options = ScrapeOptions::default();
        options.timeout_ms = Some(100_000);
        assert_eq!(waterfall_interval(&options, 3), Duration::from_millis(50_000));
        assert_eq!(waterfall_interval(&options, 1), Duration::from_millis(100_000));
    }

    #[test]
    fn waterfall_interval_uses_longer_default_when_actions_are_requested() {
        let mut options = ScrapeOptions::default();
        options.actions = vec![Action::Wait { milliseconds: 10 }];
        assert_eq!(waterfall_interval(&options, 2), Duration::from_millis(150_000));
    }

    #[test]
    fn apply_feature_signal_marks_pdf_prefetch_on_sticky_add() {
        let mut meta = meta_with_proxy(None);
        assert!(!meta.pdf_prefetch);
        apply_feature_signal(
            &mut meta,
            crate::error::FeatureSignal::AddFeature(vec![FeatureFlag::PDF.to_string()], Some(true)),
        );
        assert!(meta.pdf_prefetch);
        assert!(meta.required_features.contains(&FeatureFlag::new(FeatureFlag::PDF)));
    }
}
