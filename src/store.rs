//! Job store collaborator (§1 external dependencies, §4.L Job Adapter):
//! where [`CrawlJob`] state is persisted across poll/cancel calls.
//!
//! Persistent storage engine design is a Non-goal (§9); the trait and an
//! in-memory reference implementation are ambient test tooling needed to
//! run the crate standalone and exercise the crawl coordinator end to end
//! (DESIGN.md "Non-goals carried forward unchanged").

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{CrawlErrorEntry, CrawlJob, Document};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn put(&self, job: CrawlJob);
    async fn get(&self, id: Uuid) -> Option<CrawlJob>;
    async fn update<F>(&self, id: Uuid, f: F)
    where
        F: FnOnce(&mut CrawlJob) + Send;
    async fn record_error(&self, id: Uuid, entry: CrawlErrorEntry);
    async fn errors(&self, id: Uuid) -> Vec<CrawlErrorEntry>;
    /// Appends one page's result to a crawl job's materialized document list
    /// (§6 `GET /v1/crawl/{id}` → `data:Document[]`).
    async fn push_document(&self, id: Uuid, document: Document);
    async fn documents(&self, id: Uuid) -> Vec<Document>;
}

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<Uuid, CrawlJob>>,
    errors: Mutex<HashMap<Uuid, Vec<CrawlErrorEntry>>>,
    documents: Mutex<HashMap<Uuid, Vec<Document>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        InMemoryJobStore::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn put(&self, job: CrawlJob) {
        self.jobs.lock().unwrap().insert(job.id, job);
    }

    async fn get(&self, id: Uuid) -> Option<CrawlJob> {
        self.jobs.lock().unwrap().get(&id).cloned()
    }

    async fn update<F>(&self, id: Uuid, f: F)
    where
        F: FnOnce(&mut CrawlJob) + Send,
    {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&id) {
            f(job);
        }
    }

    async fn record_error(&self, id: Uuid, entry: CrawlErrorEntry) {
        self.errors.lock().unwrap().entry(id).or_default().push(entry);
    }

    async fn errors(&self, id: Uuid) -> Vec<CrawlErrorEntry> {
        self.errors.lock().unwrap().get(&id).cloned().unwrap_or_default()
    }

    async fn push_document(&self, id: Uuid, document: Document) {
        self.documents.lock().unwrap().entry(id).or_default().push(document);
    }

    async fn documents(&self, id: Uuid) -> Vec<Document> {
        self.documents.lock().unwrap().get(&id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CrawlStatus, CrawlerOptions};

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryJobStore::new();
        let job = CrawlJob::new(vec!["https://example.com".to_string()], CrawlerOptions::default());
        let id = job.id;
        store.put(job).await;
        let fetched = store.get(id).await.unwrap();
        assert_eq!(fetched.status, CrawlStatus::Scraping);
    }

    #[tokio::test]
    async fn update_mutates_stored_job() {
        let store = InMemoryJobStore::new();
        let job = CrawlJob::new(vec!["https://example.com".to_string()], CrawlerOptions::default());
        let id = job.id;
        store.put(job).await;
        store.update(id, |job| job.completed += 1).await;
        assert_eq!(store.get(id).await.unwrap().completed, 1);
    }

    #[tokio::test]
    async fn record_error_accumulates_per_job() {
        let store = InMemoryJobStore::new();
        let id = Uuid::new_v4();
        store
            .record_error(id, CrawlErrorEntry { id: "1".into(), url: "https://x".into(), error: "oops".into(), timestamp: None })
            .await;
        assert_eq!(store.errors(id).await.len(), 1);
    }

    #[tokio::test]
    async fn pushed_documents_accumulate_in_order() {
        let store = InMemoryJobStore::new();
        let id = Uuid::new_v4();
        store.push_document(id, crate::model::Document::scaffold("https://x/a", 200)).await;
        store.push_document(id, crate::model::Document::scaffold("https://x/b", 200)).await;
        let docs = store.documents(id).await;
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.source_url, "https://x/a");
        assert_eq!(docs[1].metadata.source_url, "https://x/b");
    }
}
