//! Process configuration (§9 REDESIGN FLAG "Global process state"): every
//! environment variable this crate reads is collected here, once, at
//! startup, instead of scattered `env::var()` calls through the engine and
//! API layers. Mirrors the env-var-with-fallback pattern of the teacher's
//! `core::config::ShadowDeepResearchConfig`, minus its file-based layer —
//! this crate has no `shadowcrawl.json` equivalent to load first.

use std::time::Duration;

/// Built once in `main()` and handed around as `Arc<Config>`.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub max_concurrency: usize,
    pub robots_cache_ttl: Duration,
    pub webhook_signing_key: Option<String>,
    pub is_production: bool,
}

impl Config {
    /// Reads every field from its environment variable, falling back to a
    /// sane default for anything unset or unparseable.
    pub fn from_env() -> Self {
        Config {
            port: env_parsed("PORT").unwrap_or(3002),
            max_concurrency: env_parsed("MAX_CONCURRENCY").unwrap_or(8),
            robots_cache_ttl: Duration::from_secs(env_parsed("ROBOTS_CACHE_TTL_SECS").unwrap_or(3600)),
            webhook_signing_key: non_empty_env("WEBHOOK_SIGNING_KEY"),
            is_production: std::env::var("NODE_ENV").map(|v| v == "production").unwrap_or(false),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_unset() {
        // SAFETY in intent only, not thread safety: this test assumes no
        // other test in the binary sets these vars concurrently.
        std::env::remove_var("PORT");
        std::env::remove_var("MAX_CONCURRENCY");
        let config = Config::from_env();
        assert_eq!(config.port, 3002);
        assert_eq!(config.max_concurrency, 8);
        assert!(!config.is_production);
    }
}
