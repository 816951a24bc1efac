//! Blob storage collaborator (§1 external dependencies): where screenshots
//! (and, in a fuller deployment, PDFs/large payloads) are persisted so the
//! `Document` can carry a URL instead of an inline base64 blob.
//!
//! Persistent storage engine design is a Non-goal (§9 Non-goals), but a
//! trait plus an in-memory reference implementation is ambient test tooling
//! needed to exercise the pipeline end to end, so it is carried regardless
//! (DESIGN.md "Non-goals carried forward unchanged").

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persists `bytes` and returns a URL (or URI) the caller can dereference
    /// later. Implementations decide their own naming scheme.
    async fn put(&self, content_type: &str, bytes: Vec<u8>) -> Result<String, String>;
}

/// Reference implementation: keeps blobs in process memory, addressed by a
/// `mem://` URI. Suitable for tests and single-process deployments; never
/// intended to survive a restart.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<String, (String, Vec<u8>)>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        InMemoryBlobStore::default()
    }

    pub fn get(&self, uri: &str) -> Option<(String, Vec<u8>)> {
        self.blobs.lock().unwrap().get(uri).cloned()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, content_type: &str, bytes: Vec<u8>) -> Result<String, String> {
        let uri = format!("mem://{}", Uuid::new_v4());
        self.blobs
            .lock()
            .unwrap()
            .insert(uri.clone(), (content_type.to_string(), bytes));
        Ok(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips_bytes() {
        let store = InMemoryBlobStore::new();
        let uri = store.put("image/png", vec![1, 2, 3]).await.unwrap();
        let (content_type, bytes) = store.get(&uri).unwrap();
        assert_eq!(content_type, "image/png");
        assert_eq!(bytes, vec![1, 2, 3]);
    }
}
