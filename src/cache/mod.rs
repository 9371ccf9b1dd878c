// Transparent caching layer between callers and the Canvas API transport.
// Memoizes fetch-one/fetch-many results by object identity, merges fetch
// parameters across overlapping requests, and re-fetches stale entries.

pub mod identity;
pub mod params;
pub mod staleness;
pub mod store;

pub use identity::{Kind, ObjectArg, ObjectRef, RemoteObject};
pub use params::{FetchParams, FilterValue, Ordering};
pub use staleness::{MarkerWindows, StalenessPolicy, TERMINAL_GRADES, freshness_window};
pub use store::{CacheEntry, Fetch, ListIter, ObjectStream, ResourceCache};
