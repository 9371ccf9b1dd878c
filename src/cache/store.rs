// Memoizing cache tables over "fetch one" / "fetch many" operations.
// One table exists per (container, kind) pair; entries are keyed by object
// identity and replaced wholesale, never partially mutated.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};

use crate::error::Result;

use super::identity::{ObjectArg, RemoteObject, resolve_id};
use super::params::FetchParams;
use super::staleness::StalenessPolicy;

/// Objects produced lazily by an underlying bulk fetch (e.g. one page at a
/// time over the network).
pub type ObjectStream<'f, T> = Box<dyn Iterator<Item = Result<T>> + 'f>;

/// The underlying fetch operations the cache wraps. Implementations perform
/// the actual API calls; the cache never constructs requests itself. Errors
/// pass through the cache unmodified.
pub trait Fetch<T: RemoteObject> {
    /// Fetch a single object by identity. Must fail distinguishably when the
    /// identity does not exist.
    fn fetch_one(&self, id: u64, params: &FetchParams) -> Result<T>;

    /// Fetch the full listing. Must support being called repeatedly with
    /// progressively broader parameter sets.
    fn fetch_many(&self, params: &FetchParams) -> Result<ObjectStream<'_, T>>;
}

/// A cached object together with the parameters it was fetched under and the
/// fetch timestamp.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub object: T,
    pub params: FetchParams,
    pub fetched_at: DateTime<Utc>,
}

/// Cache table for one kind of remote object within one container.
///
/// `all_fetched` records when a complete listing last succeeded; `None`
/// means the table must be treated as incomplete.
#[derive(Debug, Clone)]
pub struct ResourceCache<T> {
    entries: HashMap<u64, CacheEntry<T>>,
    all_fetched: Option<DateTime<Utc>>,
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            all_fetched: None,
        }
    }
}

impl<T> ResourceCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: u64) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn get(&self, key: u64) -> Option<&CacheEntry<T>> {
        self.entries.get(&key)
    }

    /// When a complete listing last succeeded, if still valid.
    pub fn all_fetched(&self) -> Option<DateTime<Utc>> {
        self.all_fetched
    }

    /// Mutable access to a cached object, for container types whose nested
    /// caches live on the objects themselves.
    pub(crate) fn object_mut(&mut self, key: u64) -> Option<&mut T> {
        self.entries.get_mut(&key).map(|entry| &mut entry.object)
    }

    /// Drop the all-fetched marker, forcing the next listing to go through
    /// the underlying bulk operation.
    pub fn invalidate_marker(&mut self) {
        self.all_fetched = None;
    }

    /// Drop the all-fetched marker once it is older than `window`.
    pub fn age_marker(&mut self, now: DateTime<Utc>, window: Duration) {
        if let Some(at) = self.all_fetched {
            if now - at > window {
                self.all_fetched = None;
            }
        }
    }
}

impl<T: RemoteObject + Clone> ResourceCache<T> {
    /// Insert an object directly, stamped with the current time. Used to
    /// seed a table with objects obtained out of band.
    pub fn insert(&mut self, object: T, params: FetchParams) {
        let key = object.cache_key();
        self.entries.insert(
            key,
            CacheEntry {
                object,
                params,
                fetched_at: Utc::now(),
            },
        );
    }

    /// Fetch one object through the cache.
    ///
    /// The identity argument may be a raw id or an object exposing one; the
    /// cache key is always the resolved identity. A hit requires the stored
    /// parameters to cover the request and the entry to be fresh; anything
    /// else calls through and replaces the entry. A stale-but-covered entry
    /// is re-fetched with its stored (broader) parameters, an uncovered
    /// request with the union of stored and requested, so accumulated
    /// breadth is never lost.
    pub fn fetch_one<F>(
        &mut self,
        operation: &'static str,
        fetcher: &F,
        policy: &StalenessPolicy,
        arg: Option<ObjectArg<'_, T>>,
        params: &FetchParams,
    ) -> Result<T>
    where
        F: Fetch<T>,
    {
        let key = resolve_id(operation, arg)?;
        self.fetch_by_key(fetcher, policy, key, params)
    }

    /// [`fetch_one`](Self::fetch_one) with a pre-resolved cache key, for
    /// callers whose identity argument is a different kind of object (a
    /// submission is looked up by user).
    pub fn fetch_by_key<F>(
        &mut self,
        fetcher: &F,
        policy: &StalenessPolicy,
        key: u64,
        params: &FetchParams,
    ) -> Result<T>
    where
        F: Fetch<T>,
    {
        let now = Utc::now();

        let mut fetch_params = params.clone();
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.object.age_nested_markers(now, &policy.marker_windows);
            let covered = entry.params.covers(params);
            if covered && !policy.is_stale(&entry.object, Some(entry.fetched_at), now) {
                debug!(kind = T::KIND.name(), id = key, "cache hit");
                return Ok(entry.object.clone());
            }
            // Parameters only ever broaden: a stale entry re-fetches with
            // its stored set, an uncovered request with the union of both.
            fetch_params = entry.params.clone();
            if !covered {
                fetch_params.merge_from(params)?;
            }
        }

        debug!(kind = T::KIND.name(), id = key, "cache miss");
        let object = fetcher.fetch_one(key, &fetch_params)?;
        let entry = CacheEntry {
            object,
            params: fetch_params,
            fetched_at: Utc::now(),
        };
        let result = entry.object.clone();
        self.entries.insert(key, entry);
        Ok(result)
    }

    /// Fetch the full listing through the cache, lazily.
    ///
    /// Returns an iterator that re-evaluates cache state when first polled.
    /// With a valid all-fetched marker, entries are served from the table and
    /// stale ones re-fetched individually. Otherwise the underlying bulk
    /// operation runs with the union of all previously recorded parameters
    /// and the request; the marker is only set once the underlying source is
    /// fully consumed, so an abandoned iterator leaves the table incomplete.
    pub fn fetch_all<'a, F>(
        &'a mut self,
        fetcher: &'a F,
        policy: &'a StalenessPolicy,
        request: FetchParams,
    ) -> ListIter<'a, T, F>
    where
        F: Fetch<T>,
    {
        ListIter {
            cache: self,
            fetcher,
            policy,
            request,
            merged: FetchParams::new(),
            state: IterState::Start,
        }
    }
}

enum IterState<'f, T> {
    /// Nothing decided yet; cache state is evaluated on first poll.
    Start,
    /// Driving the underlying bulk operation into the table.
    Refresh {
        source: ObjectStream<'f, T>,
        count: usize,
    },
    /// Bulk fetch complete; yielding every table entry once.
    Drain { ids: std::vec::IntoIter<u64> },
    /// Marker valid; serving from the table with per-entry staleness checks.
    Cached { ids: std::vec::IntoIter<u64> },
    Done,
}

/// Lazy listing produced by [`ResourceCache::fetch_all`].
pub struct ListIter<'a, T: RemoteObject, F: Fetch<T>> {
    cache: &'a mut ResourceCache<T>,
    fetcher: &'a F,
    policy: &'a StalenessPolicy,
    request: FetchParams,
    merged: FetchParams,
    state: IterState<'a, T>,
}

impl<'a, T, F> Iterator for ListIter<'a, T, F>
where
    T: RemoteObject + Clone,
    F: Fetch<T>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, IterState::Done) {
                IterState::Start => {
                    // Any cached entry whose parameters fail to cover the
                    // request invalidates the marker.
                    if self.cache.all_fetched.is_some()
                        && self
                            .cache
                            .entries
                            .values()
                            .any(|entry| !entry.params.covers(&self.request))
                    {
                        debug!(
                            kind = T::KIND.name(),
                            "listing marker invalidated by broader request"
                        );
                        self.cache.all_fetched = None;
                    }

                    if self.cache.all_fetched.is_some() {
                        let ids: Vec<u64> = self.cache.entries.keys().copied().collect();
                        self.state = IterState::Cached {
                            ids: ids.into_iter(),
                        };
                    } else {
                        let stored = self.cache.entries.values().map(|entry| &entry.params);
                        let merged =
                            match FetchParams::merge(stored.chain(std::iter::once(&self.request))) {
                                Ok(merged) => merged,
                                Err(err) => return Some(Err(err)),
                            };
                        let source = match self.fetcher.fetch_many(&merged) {
                            Ok(source) => source,
                            Err(err) => return Some(Err(err)),
                        };
                        self.merged = merged;
                        self.state = IterState::Refresh { source, count: 0 };
                    }
                }

                IterState::Refresh { mut source, count } => match source.next() {
                    Some(Ok(mut object)) => {
                        let key = object.cache_key();
                        if let Some(mut previous) = self.cache.entries.remove(&key) {
                            object.adopt_caches(&mut previous.object);
                        }
                        trace!(kind = T::KIND.name(), id = key, "stored from bulk fetch");
                        self.cache.entries.insert(
                            key,
                            CacheEntry {
                                object,
                                params: self.merged.clone(),
                                fetched_at: Utc::now(),
                            },
                        );
                        self.state = IterState::Refresh {
                            source,
                            count: count + 1,
                        };
                    }
                    Some(Err(err)) => return Some(Err(err)),
                    None => {
                        self.cache.all_fetched = Some(Utc::now());
                        debug!(kind = T::KIND.name(), count, "bulk refresh complete");
                        let ids: Vec<u64> = self.cache.entries.keys().copied().collect();
                        self.state = IterState::Drain {
                            ids: ids.into_iter(),
                        };
                    }
                },

                IterState::Drain { mut ids } => match ids.next() {
                    Some(id) => {
                        let item = self
                            .cache
                            .entries
                            .get(&id)
                            .map(|entry| entry.object.clone());
                        self.state = IterState::Drain { ids };
                        if let Some(object) = item {
                            return Some(Ok(object));
                        }
                    }
                    None => return None,
                },

                IterState::Cached { mut ids } => match ids.next() {
                    Some(id) => {
                        self.state = IterState::Cached { ids };
                        let now = Utc::now();

                        let (stale, stored) = match self.cache.entries.get_mut(&id) {
                            Some(entry) => {
                                entry
                                    .object
                                    .age_nested_markers(now, &self.policy.marker_windows);
                                (
                                    self.policy
                                        .is_stale(&entry.object, Some(entry.fetched_at), now),
                                    entry.params.clone(),
                                )
                            }
                            None => continue,
                        };

                        if stale {
                            trace!(kind = T::KIND.name(), id, "stale entry, re-fetching");
                            let mut object = match self.fetcher.fetch_one(id, &stored) {
                                Ok(object) => object,
                                Err(err) => return Some(Err(err)),
                            };
                            if let Some(mut previous) = self.cache.entries.remove(&id) {
                                object.adopt_caches(&mut previous.object);
                            }
                            let result = object.clone();
                            self.cache.entries.insert(
                                id,
                                CacheEntry {
                                    object,
                                    params: stored,
                                    fetched_at: Utc::now(),
                                },
                            );
                            return Some(Ok(result));
                        }

                        match self.cache.entries.get(&id) {
                            Some(entry) => return Some(Ok(entry.object.clone())),
                            None => continue,
                        }
                    }
                    None => return None,
                },

                IterState::Done => return None,
            }
        }
    }
}
