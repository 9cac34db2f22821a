//! Process-wide tag cache.
//!
//! Every lead card needs tag names and colors, so tags are fetched once and
//! shared. The cache is a single owned state behind a mutex plus a registry
//! of listeners; each committed state change notifies every listener
//! synchronously, after the lock is released.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;

use crate::backend::{BackendError, LeadBackend};
use crate::board::{LeadId, Tag, TagId};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagStatus {
    Cold,
    Fetching,
    Ready,
    /// Last fetch failed; previously fetched tags are still served.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct TagSnapshot {
    pub tags: Arc<Vec<Tag>>,
    pub status: TagStatus,
}

impl TagSnapshot {
    pub fn get(&self, id: &TagId) -> Option<&Tag> {
        self.tags.iter().find(|t| &t.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Listener = Arc<dyn Fn(&TagSnapshot) + Send + Sync>;

type FetchResult = Result<Arc<Vec<Tag>>, BackendError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct Inner {
    tags: Arc<Vec<Tag>>,
    fetched_at: Option<Instant>,
    status: TagStatus,
    in_flight: Option<SharedFetch>,
    /// Tags merged while a fetch was running; reapplied over its result.
    merged_during_fetch: Vec<Tag>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

/// Cloneable handle to the shared cache.
#[derive(Clone)]
pub struct TagCache {
    inner: Arc<Mutex<Inner>>,
    backend: Arc<dyn LeadBackend>,
    ttl: Duration,
}

impl std::fmt::Debug for TagCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("TagCache")
            .field("tags", &inner.tags.len())
            .field("status", &inner.status)
            .field("listeners", &inner.listeners.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TagCache {
    pub fn new(backend: Arc<dyn LeadBackend>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                tags: Arc::new(Vec::new()),
                fetched_at: None,
                status: TagStatus::Cold,
                in_flight: None,
                merged_during_fetch: Vec::new(),
                listeners: Vec::new(),
                next_subscription: 0,
            })),
            backend,
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self, listener: impl Fn(&TagSnapshot) + Send + Sync + 'static) -> SubscriptionId {
        let mut inner = self.lock();
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;
        inner.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(sid, _)| *sid != id);
        inner.listeners.len() != before
    }

    /// Current tags without triggering a fetch.
    pub fn snapshot(&self) -> TagSnapshot {
        let inner = self.lock();
        TagSnapshot { tags: inner.tags.clone(), status: inner.status.clone() }
    }

    pub fn is_fresh(&self) -> bool {
        let inner = self.lock();
        self.fresh(&inner)
    }

    fn fresh(&self, inner: &Inner) -> bool {
        inner.status == TagStatus::Ready
            && inner.fetched_at.is_some_and(|at| at.elapsed() < self.ttl)
    }

    /// Tags, fetching them first if the cache is cold or expired.
    ///
    /// Callers arriving while a fetch is running share its result; only one
    /// `list_tags` call is made per refresh.
    pub async fn tags(&self) -> FetchResult {
        let (fetch, started) = {
            let mut inner = self.lock();
            if self.fresh(&inner) {
                return Ok(inner.tags.clone());
            }
            if let Some(fetch) = inner.in_flight.clone() {
                (fetch, false)
            } else {
                let fetch = self.start_fetch();
                inner.in_flight = Some(fetch.clone());
                inner.merged_during_fetch.clear();
                inner.status = TagStatus::Fetching;
                (fetch, true)
            }
        };
        if started {
            tracing::debug!("fetching tags");
            self.notify();
        }
        fetch.await
    }

    /// Expire the cache so the next [`TagCache::tags`] call refetches.
    pub fn invalidate(&self) {
        self.lock().fetched_at = None;
    }

    /// Add or replace tags in place, without refetching.
    pub fn merge(&self, tags: impl IntoIterator<Item = Tag>) {
        {
            let mut inner = self.lock();
            let tags: Vec<Tag> = tags.into_iter().collect();
            if inner.in_flight.is_some() {
                upsert_all(&mut inner.merged_during_fetch, tags.iter().cloned());
            }
            let mut merged = inner.tags.as_ref().clone();
            upsert_all(&mut merged, tags);
            inner.tags = Arc::new(merged);
        }
        self.notify();
    }

    pub async fn create_tag(&self, name: &str, color: Option<&str>) -> Result<Tag, BackendError> {
        let tag = self.backend.create_tag(name, color).await?;
        self.merge([tag.clone()]);
        Ok(tag)
    }

    /// Replace a lead's tags on the backend and merge the definitions here.
    pub async fn set_lead_tags(&self, lead_id: &LeadId, tags: Vec<Tag>) -> Result<Vec<TagId>, BackendError> {
        let ids: Vec<TagId> = tags.iter().map(|t| t.id.clone()).collect();
        self.backend.set_lead_tags(lead_id, &ids).await?;
        self.merge(tags);
        Ok(ids)
    }

    fn start_fetch(&self) -> SharedFetch {
        let backend = self.backend.clone();
        let cache = self.clone();
        async move {
            let result = backend.list_tags().await.map(Arc::new);
            cache.finish(&result);
            result
        }
        .boxed()
        .shared()
    }

    fn finish(&self, result: &FetchResult) {
        {
            let mut inner = self.lock();
            inner.in_flight = None;
            let pending = std::mem::take(&mut inner.merged_during_fetch);
            match result {
                Ok(tags) => {
                    inner.tags = if pending.is_empty() {
                        tags.clone()
                    } else {
                        let mut merged = tags.as_ref().clone();
                        upsert_all(&mut merged, pending);
                        Arc::new(merged)
                    };
                    inner.fetched_at = Some(Instant::now());
                    inner.status = TagStatus::Ready;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "tag fetch failed, keeping cached tags");
                    inner.status = TagStatus::Failed(err.to_string());
                }
            }
        }
        self.notify();
    }

    fn notify(&self) {
        let (snapshot, listeners) = {
            let inner = self.lock();
            let snapshot = TagSnapshot { tags: inner.tags.clone(), status: inner.status.clone() };
            let listeners: Vec<Listener> = inner.listeners.iter().map(|(_, l)| l.clone()).collect();
            (snapshot, listeners)
        };
        for listener in listeners {
            listener(&snapshot);
        }
    }
}

/// Replace tags with a matching id, append the rest.
fn upsert_all(list: &mut Vec<Tag>, tags: impl IntoIterator<Item = Tag>) {
    for tag in tags {
        match list.iter_mut().find(|t| t.id == tag.id) {
            Some(existing) => *existing = tag,
            None => list.push(tag),
        }
    }
}
