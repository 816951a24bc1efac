//! Engine Registry (§4.C): the static capability/quality/cost table the
//! orchestrator consults to build a fallback list for a given request.

use std::collections::BTreeSet;

use crate::model::FeatureFlag;

/// The distinct fetch strategies available, ordered here only for
/// readability — actual ordering in a fallback list comes from
/// `build_fallback_list`, not declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Engine {
    /// Plain HTTP GET via `reqwest`, no JS execution.
    FetchHttp,
    /// HTTP GET through a basic rotating proxy pool.
    FetchProxy,
    /// Headless Chromium over CDP (`chromiumoxide`).
    BrowserCdp,
    /// Headless Chromium routed through a stealth-grade proxy, for sites
    /// that actively fingerprint and block plain CDP traffic.
    BrowserStealth,
    /// PDF-specialized fetch: downloads and extracts text without full
    /// page rendering.
    PdfFetch,
    /// Cached index lookup — nearly free, but only ever a hit for URLs
    /// this deployment has already indexed.
    Index,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineProfile {
    pub engine: Engine,
    pub quality: u8,
    pub cost: u8,
    pub supports_js: bool,
    pub supports_screenshot: bool,
    pub supports_actions: bool,
    pub supports_pdf: bool,
    pub supports_mobile: bool,
    pub supports_location: bool,
    pub supports_disable_adblock: bool,
    pub requires_network: bool,
}

/// One engine surviving `build_fallback_list`'s hard gate, carrying whatever
/// soft-degradable features it doesn't advertise (§4.C/§4.E "winning
/// engine's unsupportedFeatures").
#[derive(Debug, Clone)]
pub struct FallbackCandidate {
    pub engine: Engine,
    pub unsupported_features: BTreeSet<FeatureFlag>,
}

const PROFILES: &[EngineProfile] = &[
    EngineProfile {
        engine: Engine::Index,
        quality: 60,
        cost: 1,
        supports_js: false,
        supports_screenshot: false,
        supports_actions: false,
        supports_pdf: false,
        supports_mobile: false,
        supports_location: false,
        supports_disable_adblock: false,
        requires_network: false,
    },
    EngineProfile {
        engine: Engine::FetchHttp,
        quality: 70,
        cost: 5,
        supports_js: false,
        supports_screenshot: false,
        supports_actions: false,
        supports_pdf: false,
        supports_mobile: false,
        supports_location: false,
        supports_disable_adblock: false,
        requires_network: true,
    },
    EngineProfile {
        engine: Engine::PdfFetch,
        quality: 65,
        cost: 10,
        supports_js: false,
        supports_screenshot: false,
        supports_actions: false,
        supports_pdf: true,
        supports_mobile: false,
        supports_location: false,
        supports_disable_adblock: false,
        requires_network: true,
    },
    EngineProfile {
        engine: Engine::FetchProxy,
        quality: 68,
        cost: 15,
        supports_js: false,
        supports_screenshot: false,
        supports_actions: false,
        supports_pdf: false,
        supports_mobile: false,
        supports_location: false,
        supports_disable_adblock: false,
        requires_network: true,
    },
    EngineProfile {
        engine: Engine::BrowserCdp,
        quality: 90,
        cost: 40,
        supports_js: true,
        supports_screenshot: true,
        supports_actions: true,
        supports_pdf: false,
        supports_mobile: true,
        supports_location: true,
        supports_disable_adblock: true,
        requires_network: true,
    },
    EngineProfile {
        engine: Engine::BrowserStealth,
        quality: 92,
        cost: 80,
        supports_js: true,
        supports_screenshot: true,
        supports_actions: true,
        supports_pdf: false,
        supports_mobile: true,
        supports_location: true,
        supports_disable_adblock: true,
        requires_network: true,
    },
];

/// The static engine registry (§4.C). Stateless, so a single static slice
/// backs every lookup rather than a struct that needs constructing.
pub struct EngineRegistry;

impl EngineRegistry {
    pub fn profile(engine: Engine) -> EngineProfile {
        PROFILES
            .iter()
            .copied()
            .find(|p| p.engine == engine)
            .expect("every Engine variant has a PROFILES entry")
    }

    /// Features an engine either has or categorically lacks: an engine
    /// missing one of these is simply not a candidate at all, since there is
    /// no degraded way to serve the request (e.g. no screenshot engine can
    /// half-produce a screenshot).
    fn hard_gate(profile: &EngineProfile, feature: &str) -> Option<bool> {
        match feature {
            FeatureFlag::JS_RENDER => Some(profile.supports_js),
            FeatureFlag::SCREENSHOT | FeatureFlag::SCREENSHOT_FULL_SCREEN => Some(profile.supports_screenshot),
            FeatureFlag::ACTIONS => Some(profile.supports_actions),
            FeatureFlag::PDF => Some(profile.supports_pdf),
            FeatureFlag::ATSLEAST_PROXY => Some(matches!(
                profile.engine,
                Engine::FetchProxy | Engine::BrowserCdp | Engine::BrowserStealth
            )),
            FeatureFlag::STEALTH_PROXY => Some(matches!(profile.engine, Engine::BrowserStealth)),
            _ => None,
        }
    }

    /// Features an engine may quietly degrade on rather than being excluded
    /// outright — the waterfall still picks this engine, but the caller gets
    /// a warning that the feature wasn't actually honored.
    fn soft_supports(profile: &EngineProfile, feature: &str) -> bool {
        match feature {
            FeatureFlag::MOBILE => profile.supports_mobile,
            FeatureFlag::LOCATION => profile.supports_location,
            FeatureFlag::DISABLE_ADBLOCK => profile.supports_disable_adblock,
            // Unknown/negotiated features are assumed orthogonal to engine
            // choice (e.g. jsonExtract runs as a transformer stage after any
            // engine, so it imposes no engine-level requirement).
            _ => true,
        }
    }

    /// `buildFallbackList` (§4.C/§4.E): every engine whose hard-gated
    /// capability set covers `required_features`, ordered by descending
    /// quality so the waterfall tries the best-fit engine first, with cost
    /// as the tiebreaker (cheaper first). Soft-degradable features a
    /// surviving candidate doesn't support are carried along rather than
    /// used to exclude it, so the waterfall can warn about them instead.
    pub fn build_fallback_list(required_features: &BTreeSet<FeatureFlag>) -> Vec<FallbackCandidate> {
        let mut candidates: Vec<(EngineProfile, BTreeSet<FeatureFlag>)> = PROFILES
            .iter()
            .copied()
            .filter_map(|profile| {
                let mut unsupported = BTreeSet::new();
                for feature in required_features {
                    match Self::hard_gate(&profile, feature.as_str()) {
                        Some(false) => return None,
                        Some(true) => {}
                        None => {
                            if !Self::soft_supports(&profile, feature.as_str()) {
                                unsupported.insert(feature.clone());
                            }
                        }
                    }
                }
                Some((profile, unsupported))
            })
            .collect();

        candidates.sort_by(|(a, _), (b, _)| b.quality.cmp(&a.quality).then(a.cost.cmp(&b.cost)));
        candidates
            .into_iter()
            .map(|(profile, unsupported_features)| FallbackCandidate { engine: profile.engine, unsupported_features })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_list_excludes_engines_missing_required_features() {
        let mut required = BTreeSet::new();
        required.insert(FeatureFlag::new(FeatureFlag::SCREENSHOT));
        let list = EngineRegistry::build_fallback_list(&required);
        let engines: Vec<Engine> = list.iter().map(|c| c.engine).collect();
        assert!(engines.contains(&Engine::BrowserCdp));
        assert!(!engines.contains(&Engine::FetchHttp));
        assert!(!engines.contains(&Engine::Index));
    }

    #[test]
    fn fallback_list_with_no_requirements_includes_cheapest_first_among_ties() {
        let list = EngineRegistry::build_fallback_list(&BTreeSet::new());
        assert_eq!(list.first().map(|c| c.engine), Some(Engine::BrowserStealth));
        assert!(list.iter().any(|c| c.engine == Engine::Index));
    }

    #[test]
    fn pdf_feature_only_matched_by_pdf_capable_engines() {
        let mut required = BTreeSet::new();
        required.insert(FeatureFlag::new(FeatureFlag::PDF));
        let list = EngineRegistry::build_fallback_list(&required);
        let engines: Vec<Engine> = list.iter().map(|c| c.engine).collect();
        assert_eq!(engines, vec![Engine::PdfFetch]);
    }

    #[test]
    fn soft_degradable_feature_is_tracked_but_does_not_exclude_the_engine() {
        let mut required = BTreeSet::new();
        required.insert(FeatureFlag::new(FeatureFlag::MOBILE));
        let list = EngineRegistry::build_fallback_list(&required);
        let http = list.iter().find(|c| c.engine == Engine::FetchHttp).expect("FetchHttp still a candidate");
        assert!(http.unsupported_features.contains(&FeatureFlag::new(FeatureFlag::MOBILE)));
        let browser = list.iter().find(|c| c.engine == Engine::BrowserCdp).expect("BrowserCdp still a candidate");
        assert!(browser.unsupported_features.is_empty());
    }
}
