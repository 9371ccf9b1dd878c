// Transparent in-memory caching for the Canvas LMS REST API.
// Wraps a plain transport client with per-collection cache tables that
// memoize fetches by object identity, merge fetch parameters across
// overlapping requests, and re-fetch entries once their grades go stale.

pub mod cache;
pub mod canvas;
pub mod cached;
pub mod config;
pub mod error;

pub use cache::{FetchParams, FilterValue, Kind, ObjectArg, RemoteObject, ResourceCache};
pub use cached::CachedClient;
pub use canvas::CanvasClient;
pub use config::CacheConfig;
pub use error::{CanvasError, Result};
