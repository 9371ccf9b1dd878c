// Identity and equality layer for Canvas remote objects.
// Objects are equal iff they share a kind and an id, and hash accordingly,
// so they can serve as cache keys and be deduplicated in sets and maps.

use chrono::{DateTime, Utc};

use crate::error::{CanvasError, Result};

use super::staleness::MarkerWindows;

/// Remote-object category. Combined with the id for equality and hashing:
/// two objects of different kinds are never equal, even with the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Course,
    Assignment,
    AssignmentGroup,
    Submission,
    User,
    Group,
    GroupCategory,
    Module,
}

impl Kind {
    /// Lowercase name used in log messages.
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Course => "course",
            Kind::Assignment => "assignment",
            Kind::AssignmentGroup => "assignment_group",
            Kind::Submission => "submission",
            Kind::User => "user",
            Kind::Group => "group",
            Kind::GroupCategory => "group_category",
            Kind::Module => "module",
        }
    }
}

/// A (kind, id) pair usable as a set or map key across kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub kind: Kind,
    pub id: u64,
}

/// Capability of objects managed by the caching layer.
///
/// Every remote object exposes a stable id. Gradable kinds additionally
/// expose the grade consulted by the staleness policy, and container kinds
/// override the nested-cache hooks to declare the caches they own.
pub trait RemoteObject {
    const KIND: Kind;

    fn id(&self) -> u64;

    fn object_ref(&self) -> ObjectRef {
        ObjectRef {
            kind: Self::KIND,
            id: self.id(),
        }
    }

    /// Key under which this object is stored in a cache table. Usually the
    /// object's own id; submissions override this with the user id, since
    /// they are looked up per user within an assignment.
    fn cache_key(&self) -> u64 {
        self.id()
    }

    /// Whether this kind carries a grade facet. Ungradable objects are never
    /// considered stale by age, only by parameter changes.
    fn is_gradable(&self) -> bool {
        false
    }

    /// The current grade, for gradable kinds.
    fn grade(&self) -> Option<&str> {
        None
    }

    /// Move every nested cache table and all-fetched marker from a previous
    /// copy of this object onto `self`, so sub-caches survive a refresh that
    /// replaces the parent. Container kinds override this with their declared
    /// cache fields; leaf kinds keep the no-op default.
    fn adopt_caches(&mut self, _previous: &mut Self) {}

    /// Expire nested all-fetched markers that have outlived their
    /// kind-specific windows. No-op for leaf kinds.
    fn age_nested_markers(&mut self, _now: DateTime<Utc>, _windows: &MarkerWindows) {}
}

/// Identity argument accepted by single-fetch operations: either a raw id or
/// a reference to an already-fetched object exposing one.
#[derive(Debug, Clone, Copy)]
pub enum ObjectArg<'a, T> {
    Id(u64),
    Object(&'a T),
}

impl<'a, T: RemoteObject> ObjectArg<'a, T> {
    /// Resolve the cache key. Always the identity, never the reference.
    pub fn id(&self) -> u64 {
        match self {
            ObjectArg::Id(id) => *id,
            ObjectArg::Object(obj) => obj.id(),
        }
    }

    /// Parse a user-supplied textual id, as passed on a command line.
    pub fn parse(raw: &str) -> Result<Self> {
        raw.trim()
            .parse::<u64>()
            .map(ObjectArg::Id)
            .map_err(|_| CanvasError::InvalidArgument {
                found: raw.to_string(),
            })
    }
}

impl<'a, T> From<u64> for ObjectArg<'a, T> {
    fn from(id: u64) -> Self {
        ObjectArg::Id(id)
    }
}

impl<'a, T> From<&'a T> for ObjectArg<'a, T> {
    fn from(obj: &'a T) -> Self {
        ObjectArg::Object(obj)
    }
}

/// Resolve an optional identity argument to a cache key.
/// `None` means the caller omitted the argument entirely.
pub fn resolve_id<T: RemoteObject>(
    operation: &'static str,
    arg: Option<ObjectArg<'_, T>>,
) -> Result<u64> {
    match arg {
        Some(arg) => Ok(arg.id()),
        None => Err(CanvasError::MissingArgument { operation }),
    }
}

/// Implements identity-based `PartialEq`, `Eq` and `Hash` for a Canvas model
/// type. Equality and hashing consider only (kind, id), so a refreshed copy
/// of an object compares equal to its stale predecessor.
macro_rules! impl_canvas_identity {
    ($($ty:ty),+ $(,)?) => {$(
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.object_ref() == other.object_ref()
            }
        }

        impl Eq for $ty {}

        impl std::hash::Hash for $ty {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.object_ref().hash(state);
            }
        }
    )+};
}

pub(crate) use impl_canvas_identity;
