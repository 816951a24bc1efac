//! Frontier (§4.K, §5): the set of URLs pending visit during a crawl, plus
//! the per-crawl dedup set. Single-writer by construction — the coordinator
//! owns one [`Frontier`] per job and never shares it across tasks, so the
//! "stable against races because scope+dedup happens under a per-job lock"
//! guarantee in §5 falls out of ownership rather than needing its own lock.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use crate::model::FrontierEntry;

/// Ordering key: depth ascending, then FIFO (insertion sequence) ascending
/// within a depth level (§5 "breadth-first (depth asc) with FIFO
/// tie-break"). `BinaryHeap` is a max-heap, so entries are wrapped in
/// `Reverse` to get min-depth-first-out behavior.
#[derive(PartialEq, Eq)]
struct Ranked(FrontierEntry);

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.0.depth, self.0.sequence).cmp(&(other.0.depth, other.0.sequence))
    }
}

/// The pending-URL queue and the normalized-URL dedup set for one crawl job.
pub struct Frontier {
    queue: BinaryHeap<Reverse<Ranked>>,
    seen: HashSet<String>,
    next_sequence: u64,
}

impl Frontier {
    pub fn new() -> Self {
        Frontier { queue: BinaryHeap::new(), seen: HashSet::new(), next_sequence: 0 }
    }

    /// Normalizes a URL for dedup purposes (§3 "deduped by normalized
    /// form"): lowercased host, trailing-slash-insensitive path, optionally
    /// ignoring the query string per `ignoreQueryParameters`.
    pub fn normalize(url: &str, ignore_query: bool) -> String {
        let Ok(parsed) = url::Url::parse(url) else {
            return url.to_string();
        };
        let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
        let path = parsed.path().trim_end_matches('/');
        let query = if ignore_query { String::new() } else { parsed.query().map(|q| format!("?{q}")).unwrap_or_default() };
        format!("{}://{}{}{}", parsed.scheme(), host, path, query)
    }

    /// `true` if `url` has never been offered to this frontier before
    /// (under its normalized form), per `ignoreQueryParameters`.
    pub fn has_seen(&self, url: &str, ignore_query: bool) -> bool {
        self.seen.contains(&Self::normalize(url, ignore_query))
    }

    /// Marks `url` seen and enqueues it if it has not been seen before.
    /// Returns `true` if it was newly enqueued (§4.K "every discovered URL
    /// passes scope filtering before enqueue; each URL visited at most
    /// once").
    pub fn offer(&mut self, url: String, depth: u32, discovery_depth: u32, ignore_query: bool) -> bool {
        let key = Self::normalize(&url, ignore_query);
        if !self.seen.insert(key) {
            return false;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queue.push(Reverse(Ranked(FrontierEntry { url, depth, discovery_depth, sequence })));
        true
    }

    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.queue.pop().map(|Reverse(Ranked(entry))| entry)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn discovered_count(&self) -> u32 {
        self.seen.len() as u32
    }
}

impl Default for Frontier {
    fn default() -> Self {
        Frontier::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_breadth_first_fifo_order() {
        let mut frontier = Frontier::new();
        frontier.offer("https://example.com/b".to_string(), 1, 1, false);
        frontier.offer("https://example.com/a".to_string(), 0, 0, false);
        frontier.offer("https://example.com/c".to_string(), 1, 2, false);

        assert_eq!(frontier.pop().unwrap().url, "https://example.com/a");
        assert_eq!(frontier.pop().unwrap().url, "https://example.com/b");
        assert_eq!(frontier.pop().unwrap().url, "https://example.com/c");
        assert!(frontier.pop().is_none());
    }

    #[test]
    fn offer_rejects_duplicate_normalized_url() {
        let mut frontier = Frontier::new();
        assert!(frontier.offer("https://example.com/a".to_string(), 0, 0, false));
        assert!(!frontier.offer("https://example.com/a/".to_string(), 0, 0, false));
        assert!(!frontier.offer("https://EXAMPLE.com/a".to_string(), 0, 0, false));
    }

    #[test]
    fn ignore_query_parameters_collapses_query_variants() {
        let mut frontier = Frontier::new();
        assert!(frontier.offer("https://example.com/a?x=1".to_string(), 0, 0, true));
        assert!(!frontier.offer("https://example.com/a?x=2".to_string(), 0, 0, true));
    }
}
