use async_trait::async_trait;
use dop_types::{DigitalObject, Version};

use crate::error::{StoreError, StoreResult};
use crate::query::Query;

/// Capability required from a remote, versioned object store.
///
/// All implementations must satisfy these invariants:
/// - `retrieve` reports absence as `Ok(None)`; `Err` is reserved for genuine
///   transport or store failures.
/// - Search ordering is stable across pages, so paging through
///   [`search_page`](Self::search_page) never skips or repeats an object.
/// - `create` assigns the id and metadata and returns the stored object.
/// - Published versions are immutable snapshots retrievable by version id.
#[async_trait]
pub trait ObjectRepository: Send + Sync {
    /// Retrieve an object (or a published version snapshot) by id.
    async fn retrieve(&self, id: &str) -> StoreResult<Option<DigitalObject>>;

    /// Fetch one page of search results (`page` is zero-based).
    async fn search_page(
        &self,
        query: &Query,
        page: usize,
        page_size: usize,
    ) -> StoreResult<Vec<DigitalObject>>;

    /// Number of results requested per page by [`search_all`](Self::search_all).
    fn page_size(&self) -> usize;

    /// Persist a new object and return it with its assigned id and metadata.
    async fn create(&self, object: &DigitalObject) -> StoreResult<DigitalObject>;

    /// Publish an immutable version of the object's current state.
    async fn publish_version(&self, id: &str) -> StoreResult<Version>;

    /// List the object's versions, including the live object itself with no
    /// publish time. Order is unspecified.
    async fn list_versions(&self, id: &str) -> StoreResult<Vec<Version>>;

    /// Every object matching the query, in store order.
    ///
    /// Pages are requested until a short page signals the end.
    async fn search_all(&self, query: &Query) -> StoreResult<Vec<DigitalObject>> {
        let page_size = self.page_size().max(1);
        let mut results = Vec::new();
        let mut page = 0;
        loop {
            let batch = self.search_page(query, page, page_size).await?;
            let done = batch.len() < page_size;
            results.extend(batch);
            if done {
                return Ok(results);
            }
            page += 1;
        }
    }

    /// The single object matching the query.
    ///
    /// Zero matches is [`StoreError::NotFound`]; more than one is
    /// [`StoreError::AmbiguousMatch`].
    async fn search_one(&self, query: &Query) -> StoreResult<DigitalObject> {
        let mut results = self.search_all(query).await?;
        match results.len() {
            1 => Ok(results.remove(0)),
            0 => Err(StoreError::NotFound(query.to_string())),
            count => Err(StoreError::AmbiguousMatch {
                query: query.to_string(),
                count,
            }),
        }
    }
}
