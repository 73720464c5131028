use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use dop_types::{Clock, DigitalObject, ObjectMetadata, SystemClock, Version};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::config::RepositoryConfig;
use crate::error::{StoreError, StoreResult};
use crate::query::Query;
use crate::traits::ObjectRepository;

/// In-memory object store.
///
/// Intended for tests and embedding. It behaves like the remote store where
/// it matters to provenance capture:
/// - ids and metadata are assigned on write, stamped from the injected clock;
/// - search is eventually consistent: a write becomes visible to search only
///   after the configured indexing delay (until then the previous state, if
///   any, is what search sees), while `retrieve` is immediate;
/// - published versions are retrievable snapshots but are not searchable.
pub struct InMemoryRepository {
    prefix: String,
    page_size: usize,
    agent: String,
    indexing_delay_ms: i64,
    clock: Arc<dyn Clock>,
    calls: AtomicUsize,
    failing: AtomicBool,
    inner: RwLock<RepositoryState>,
}

#[derive(Default)]
struct RepositoryState {
    order: Vec<String>,
    objects: HashMap<String, DigitalObject>,
    index: HashMap<String, IndexEntry>,
    snapshots: HashMap<String, DigitalObject>,
    versions: HashMap<String, Vec<Version>>,
}

/// What search sees for one object.
struct IndexEntry {
    visible_from_ms: i64,
    previous: Option<DigitalObject>,
}

impl InMemoryRepository {
    /// Create an empty store on the wall clock.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_clock(prefix, Arc::new(SystemClock))
    }

    /// Create an empty store stamping times from the given clock.
    pub fn with_clock(prefix: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            prefix: prefix.into(),
            page_size: 100,
            agent: "admin".into(),
            indexing_delay_ms: 0,
            clock,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            inner: RwLock::new(RepositoryState::default()),
        }
    }

    /// Create an empty store from a connection descriptor.
    pub fn from_config(config: &RepositoryConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_clock(config.handle_prefix.clone(), clock).with_page_size(config.page_size)
    }

    /// Results per search page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The user recorded as creator for writes through [`ObjectRepository::create`].
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    /// Delay between a write and its visibility to search.
    pub fn with_indexing_delay(mut self, delay: Duration) -> Self {
        self.indexing_delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        self
    }

    /// Store an object exactly as given (id and metadata preserved), visible
    /// to search immediately. An object without an id gets one assigned.
    pub fn insert(&self, mut object: DigitalObject) -> String {
        let id = object.id.clone().unwrap_or_else(|| self.next_id());
        object.id = Some(id.clone());
        let mut state = self.inner.write().expect("lock poisoned");
        if !state.objects.contains_key(&id) {
            state.order.push(id.clone());
        }
        state.index.insert(
            id.clone(),
            IndexEntry {
                visible_from_ms: i64::MIN,
                previous: None,
            },
        );
        state.objects.insert(id.clone(), object);
        id
    }

    /// Create an object on behalf of `user`.
    pub fn create_as(&self, object: &DigitalObject, user: &str) -> DigitalObject {
        let now = self.clock.now_ms();
        let mut stored = object.clone();
        let id = stored.id.clone().unwrap_or_else(|| self.next_id());
        stored.id = Some(id.clone());
        stored.metadata = Some(ObjectMetadata {
            created_on: now,
            created_by: user.to_string(),
            modified_on: now,
            modified_by: user.to_string(),
        });

        let mut state = self.inner.write().expect("lock poisoned");
        if !state.objects.contains_key(&id) {
            state.order.push(id.clone());
        }
        state.index.insert(
            id.clone(),
            IndexEntry {
                visible_from_ms: now.saturating_add(self.indexing_delay_ms),
                previous: None,
            },
        );
        state.objects.insert(id.clone(), stored.clone());
        debug!(id = %id, object_type = %stored.object_type, "object created");
        stored
    }

    /// Replace an object's content on behalf of `user`.
    pub fn update_as(
        &self,
        id: &str,
        content: Map<String, Value>,
        user: &str,
    ) -> StoreResult<DigitalObject> {
        let now = self.clock.now_ms();
        let mut state = self.inner.write().expect("lock poisoned");
        let current = state
            .objects
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut updated = current.clone();
        updated.content = content;
        let metadata = updated.metadata.get_or_insert_with(ObjectMetadata::default);
        metadata.modified_on = now;
        metadata.modified_by = user.to_string();

        state.index.insert(
            id.to_string(),
            IndexEntry {
                visible_from_ms: now.saturating_add(self.indexing_delay_ms),
                previous: Some(current),
            },
        );
        state.objects.insert(id.to_string(), updated.clone());
        Ok(updated)
    }

    /// Remove a live object. Published versions are kept. Returns `true` if
    /// the object existed.
    pub fn delete(&self, id: &str) -> bool {
        let mut state = self.inner.write().expect("lock poisoned");
        state.order.retain(|existing| existing != id);
        state.index.remove(id);
        state.objects.remove(id).is_some()
    }

    /// Make every subsequent gateway call fail with a remote-store error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of gateway calls served (including failed ones).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").objects.len()
    }

    /// Returns `true` if no live objects are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live objects in insertion order, regardless of search visibility.
    pub fn all_objects(&self) -> Vec<DigitalObject> {
        let state = self.inner.read().expect("lock poisoned");
        state
            .order
            .iter()
            .filter_map(|id| state.objects.get(id).cloned())
            .collect()
    }

    fn next_id(&self) -> String {
        format!("{}/{}", self.prefix, Uuid::now_v7().simple())
    }

    fn enter(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Remote("store unavailable".into()));
        }
        Ok(())
    }

    fn searchable(state: &RepositoryState, id: &str, now_ms: i64) -> Option<DigitalObject> {
        let entry = state.index.get(id)?;
        if now_ms >= entry.visible_from_ms {
            state.objects.get(id).cloned()
        } else {
            entry.previous.clone()
        }
    }
}

impl std::fmt::Debug for InMemoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("prefix", &self.prefix)
            .field("object_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl ObjectRepository for InMemoryRepository {
    async fn retrieve(&self, id: &str) -> StoreResult<Option<DigitalObject>> {
        self.enter()?;
        let state = self.inner.read().expect("lock poisoned");
        Ok(state
            .objects
            .get(id)
            .or_else(|| state.snapshots.get(id))
            .cloned())
    }

    async fn search_page(
        &self,
        query: &Query,
        page: usize,
        page_size: usize,
    ) -> StoreResult<Vec<DigitalObject>> {
        self.enter()?;
        let now = self.clock.now_ms();
        let state = self.inner.read().expect("lock poisoned");
        Ok(state
            .order
            .iter()
            .filter_map(|id| Self::searchable(&state, id, now))
            .filter(|object| query.matches(object))
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .collect())
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    async fn create(&self, object: &DigitalObject) -> StoreResult<DigitalObject> {
        self.enter()?;
        let mut fresh = object.clone();
        fresh.id = None;
        Ok(self.create_as(&fresh, &self.agent))
    }

    async fn publish_version(&self, id: &str) -> StoreResult<Version> {
        self.enter()?;
        let now = self.clock.now_ms();
        let version_id = self.next_id();
        let mut state = self.inner.write().expect("lock poisoned");
        let mut snapshot = state
            .objects
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        snapshot.id = Some(version_id.clone());
        state.snapshots.insert(version_id.clone(), snapshot);

        let version = Version {
            object_id: id.to_string(),
            version_id,
            published_on_epoch_ms: Some(now),
        };
        state
            .versions
            .entry(id.to_string())
            .or_default()
            .push(version.clone());
        debug!(id = %id, version = %version.version_id, "version published");
        Ok(version)
    }

    async fn list_versions(&self, id: &str) -> StoreResult<Vec<Version>> {
        self.enter()?;
        let state = self.inner.read().expect("lock poisoned");
        let mut versions = state.versions.get(id).cloned().unwrap_or_default();
        if state.objects.contains_key(id) {
            versions.push(Version {
                object_id: id.to_string(),
                version_id: id.to_string(),
                published_on_epoch_ms: None,
            });
        }
        Ok(versions)
    }
}
