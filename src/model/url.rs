//! URL Validator (§4.A).
//!
//! Normalizes and validates a caller-supplied string into a [`ScrapeUrl`]:
//! scheme must be `http`/`https` (case-insensitive, normalized lowercase),
//! host must carry a recognizable TLD or be a valid IDN, and the host must
//! not appear on the blocklist.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::UrlError;

/// Regex detecting an existing `scheme://` prefix (any scheme, not just
/// http/https) so we only prepend `http://` when one is truly absent.
static SCHEME_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z][a-z0-9+.-]*://").unwrap());

/// A very small embedded TLD table. Real deployments would vendor the
/// Mozilla Public Suffix List; we ship a compact subset of common
/// gTLDs/ccTLDs (documented as a simplification in DESIGN.md) so the
/// validator and `isSameRegistrableDomain` have something to work against
/// without a network fetch or a multi-megabyte data file.
const KNOWN_TLDS: &[&str] = &[
    "com", "org", "net", "edu", "gov", "mil", "int", "io", "ai", "dev", "app",
    "co", "me", "info", "biz", "tv", "xyz", "so", "us", "uk", "de", "fr",
    "jp", "cn", "ca", "au", "nz", "in", "br", "ru", "es", "it", "nl", "se",
    "no", "fi", "dk", "pl", "ch", "at", "be", "ie", "pt", "gr", "cz", "hu",
    "tech", "online", "site", "store", "blog", "cloud", "gg", "to", "sh",
];

/// Hosts (or host suffixes) that are never scrapable regardless of protocol.
/// Mirrors the "social-media list + policy list" split called out in §4.A:
/// the first group is well-known social platforms, the second is a small
/// internal policy list (loopback/link-local hosts that would otherwise let
/// a caller pivot the scraper into internal infrastructure).
const SOCIAL_MEDIA_BLOCKLIST: &[&str] = &[
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "tiktok.com",
    "linkedin.com",
    "snapchat.com",
    "pinterest.com",
];

const POLICY_BLOCKLIST: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0", "::1"];

/// A validated absolute HTTP(S) URL (§3 Data Model).
///
/// Invariant: `scheme()` is always `http` or `https`, lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScrapeUrl(Url);

impl ScrapeUrl {
    /// Validate and normalize `input` per §4.A.
    ///
    /// `validate(validate(u).as_str()) == validate(u)` — re-validating an
    /// already-validated URL string is a no-op (idempotence, §8).
    pub fn validate(input: &str) -> Result<Self, UrlError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(UrlError::InvalidUrl("empty URL".to_string()));
        }

        let candidate = if SCHEME_PREFIX.is_match(trimmed) {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };

        let mut parsed = Url::parse(&candidate)
            .map_err(|e| UrlError::InvalidUrl(format!("{trimmed}: {e}")))?;

        let scheme = parsed.scheme().to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(UrlError::UnsupportedProtocol(scheme));
        }
        if scheme != parsed.scheme() {
            parsed
                .set_scheme(&scheme)
                .map_err(|_| UrlError::InvalidUrl(trimmed.to_string()))?;
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| UrlError::InvalidUrl(format!("{trimmed}: missing host")))?
            .to_ascii_lowercase();

        if !host_is_plausible(&host) {
            return Err(UrlError::InvalidUrl(format!(
                "{trimmed}: host '{host}' has no recognizable TLD and is not an IDN"
            )));
        }

        if is_blocklisted(&host) {
            return Err(UrlError::BlocklistedUrl(host));
        }

        Ok(ScrapeUrl(parsed))
    }

    /// Validate for `/v1/map`-style usage: like [`Self::validate`] but also
    /// strips a trailing slash and any query string, since map results are
    /// compared/deduped as bare page identities.
    pub fn validate_for_map(input: &str) -> Result<Self, UrlError> {
        let mut v = Self::validate(input)?;
        v.0.set_query(None);
        let path = v.0.path().to_string();
        if path.len() > 1 && path.ends_with('/') {
            v.0.set_path(path.trim_end_matches('/'));
        }
        Ok(v)
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    pub fn into_url(self) -> Url {
        self.0
    }
}

impl fmt::Display for ScrapeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ScrapeUrl {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

fn host_is_plausible(host: &str) -> bool {
    // IPv6/IPv4 literals are always acceptable hosts (no TLD to check).
    if host.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    // IDN punycode form, e.g. "xn--fsq.com" or a bare "xn--..." label.
    if host.split('.').any(|label| label.starts_with("xn--")) {
        return true;
    }

    match host.rsplit_once('.') {
        Some((_, tld)) => KNOWN_TLDS.contains(&tld) || tld.len() >= 2,
        None => false,
    }
}

fn is_blocklisted(host: &str) -> bool {
    if POLICY_BLOCKLIST.iter().any(|h| *h == host) {
        return true;
    }
    SOCIAL_MEDIA_BLOCKLIST
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")))
}

/// `isSameRegistrableDomain(a, b)` (§4.A): compares the registrable domain
/// (eTLD+1) of two hosts using [`KNOWN_TLDS`] as a stand-in public suffix
/// table.
pub fn is_same_registrable_domain(a: &str, b: &str) -> bool {
    registrable_domain(a) == registrable_domain(b)
}

fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return host;
    }
    let tld = labels[labels.len() - 1];
    if KNOWN_TLDS.contains(&tld) && labels.len() >= 2 {
        let start = labels.len().saturating_sub(2);
        labels[start..].join(".")
    } else {
        host
    }
}

/// `removeDuplicateUrls` (§4.A): collapses `http`↔`https` and `www.`
/// variants of the same page, preferring `https` and the non-`www` form.
/// Idempotent: running it twice yields the same result (§8).
pub fn remove_duplicate_urls(urls: &[String]) -> Vec<String> {
    use std::collections::HashMap;

    // canonical key -> best candidate seen so far
    let mut best: HashMap<String, String> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for raw in urls {
        let Ok(parsed) = Url::parse(raw) else {
            // Not a well-formed URL at all — keep it verbatim, deduped by
            // its literal string so we never silently drop caller input.
            if !best.contains_key(raw) {
                order.push(raw.clone());
            }
            best.entry(raw.clone()).or_insert_with(|| raw.clone());
            continue;
        };

        let host = parsed.host_str().unwrap_or_default();
        let bare_host = host.strip_prefix("www.").unwrap_or(host);
        let key = format!(
            "{}{}{}",
            bare_host,
            parsed.path().trim_end_matches('/'),
            parsed.query().map(|q| format!("?{q}")).unwrap_or_default()
        );

        let is_better = |candidate: &str| -> bool {
            match best.get(&key) {
                None => true,
                Some(existing) => {
                    let existing_url = Url::parse(existing).ok();
                    let candidate_url = Url::parse(candidate).ok();
                    score(candidate_url.as_ref()) > score(existing_url.as_ref())
                }
            }
        };

        if is_better(raw) {
            if !best.contains_key(&key) {
                order.push(key.clone());
            }
            best.insert(key, raw.clone());
        }
    }

    order.into_iter().filter_map(|k| best.get(&k).cloned()).collect()
}

/// Scoring used to pick the preferred form among duplicate URLs: https beats
/// http, non-www beats www.
fn score(url: Option<&Url>) -> u8 {
    let Some(url) = url else { return 0 };
    let mut s = 0u8;
    if url.scheme() == "https" {
        s += 2;
    }
    if !url.host_str().unwrap_or_default().starts_with("www.") {
        s += 1;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepends_http_when_scheme_missing() {
        let v = ScrapeUrl::validate("example.com/page").unwrap();
        assert_eq!(v.as_url().scheme(), "http");
    }

    #[test]
    fn lowercases_scheme() {
        let v = ScrapeUrl::validate("HTTPS://Example.com").unwrap();
        assert_eq!(v.as_url().scheme(), "https");
    }

    #[test]
    fn rejects_unsupported_protocol() {
        let err = ScrapeUrl::validate("ftp://example.com").unwrap_err();
        assert!(matches!(err, UrlError::UnsupportedProtocol(_)));
    }

    #[test]
    fn rejects_blocklisted_host() {
        let err = ScrapeUrl::validate("https://facebook.com/x").unwrap_err();
        assert!(matches!(err, UrlError::BlocklistedUrl(_)));
    }

    #[test]
    fn rejects_blocklisted_subdomain() {
        let err = ScrapeUrl::validate("https://m.facebook.com/x").unwrap_err();
        assert!(matches!(err, UrlError::BlocklistedUrl(_)));
    }

    #[test]
    fn rejects_host_without_tld() {
        let err = ScrapeUrl::validate("https://localhost-not-blocklisted-but-no-dot-gibberish-zzz").unwrap_err();
        // single label host, no dot -> no recognizable tld
        assert!(matches!(err, UrlError::InvalidUrl(_)));
    }

    #[test]
    fn accepts_idn_host() {
        let v = ScrapeUrl::validate("https://xn--fsq.com/").unwrap();
        assert_eq!(v.host(), "xn--fsq.com");
    }

    #[test]
    fn validate_is_idempotent() {
        let once = ScrapeUrl::validate("Example.com/Path").unwrap();
        let twice = ScrapeUrl::validate(once.as_ref()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn map_variant_strips_trailing_slash_and_query() {
        let v = ScrapeUrl::validate_for_map("https://example.com/path/?x=1").unwrap();
        assert_eq!(v.as_url().as_str(), "https://example.com/path");
    }

    #[test]
    fn same_registrable_domain_ignores_subdomain() {
        assert!(is_same_registrable_domain("docs.example.com", "example.com"));
        assert!(!is_same_registrable_domain("example.com", "example.org"));
    }

    #[test]
    fn remove_duplicate_urls_prefers_https_and_non_www() {
        let urls = vec![
            "http://www.example.com/a".to_string(),
            "https://example.com/a".to_string(),
            "http://example.com/a".to_string(),
        ];
        let deduped = remove_duplicate_urls(&urls);
        assert_eq!(deduped, vec!["https://example.com/a".to_string()]);
    }

    #[test]
    fn remove_duplicate_urls_is_idempotent() {
        let urls = vec![
            "http://www.example.com/a".to_string(),
            "https://example.com/b".to_string(),
        ];
        let once = remove_duplicate_urls(&urls);
        let twice = remove_duplicate_urls(&once);
        assert_eq!(once, twice);
    }
}
