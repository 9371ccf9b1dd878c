// Typed fetch parameters for Canvas list/get operations.
// Handles merging of parameter sets across overlapping fetches and
// compatibility checks that decide whether a cached entry can serve a request.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{CanvasError, Result};

/// Value of a non-ordering filter parameter.
///
/// Scalar values must agree exactly when parameter sets are merged; set
/// values are unioned. A scalar merged with a set coerces to a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    One(String),
    Many(BTreeSet<String>),
}

impl FilterValue {
    pub fn one(value: impl Into<String>) -> Self {
        FilterValue::One(value.into())
    }

    pub fn many<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterValue::Many(values.into_iter().map(Into::into).collect())
    }

    /// View the value as a set (a scalar becomes a singleton set).
    fn as_set(&self) -> BTreeSet<String> {
        match self {
            FilterValue::One(v) => BTreeSet::from([v.clone()]),
            FilterValue::Many(vs) => vs.clone(),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::One(v) => write!(f, "{}", v),
            FilterValue::Many(vs) => {
                let joined: Vec<&str> = vs.iter().map(String::as_str).collect();
                write!(f, "[{}]", joined.join(","))
            }
        }
    }
}

/// Ordering directives. Exempt from compatibility checks: they change the
/// order of results, not which objects are returned, so they never force a
/// refetch and never conflict on merge (last write wins).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ordering {
    pub sort: Option<String>,
    pub order: Option<String>,
    pub order_by: Option<String>,
}

impl Ordering {
    /// Merge another ordering over this one, last write wins per field.
    fn overwrite_with(&mut self, other: &Ordering) {
        if other.sort.is_some() {
            self.sort = other.sort.clone();
        }
        if other.order.is_some() {
            self.order = other.order.clone();
        }
        if other.order_by.is_some() {
            self.order_by = other.order_by.clone();
        }
    }
}

/// A typed parameter set for a fetch operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchParams {
    /// Canvas `include[]` directives. Unioned on merge; a request is served
    /// from cache only if its includes are a subset of the stored ones.
    pub include: BTreeSet<String>,
    /// Remaining filter parameters by name.
    pub filters: BTreeMap<String, FilterValue>,
    /// Sort/order directives, exempt from all compatibility checks.
    pub ordering: Ordering,
}

impl FetchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_include(mut self, directive: impl Into<String>) -> Self {
        self.include.insert(directive.into());
        self
    }

    pub fn with_includes<I, S>(mut self, directives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(directives.into_iter().map(Into::into));
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: FilterValue) -> Self {
        self.filters.insert(key.into(), value);
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.ordering.sort = Some(sort.into());
        self
    }

    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.ordering.order = Some(order.into());
        self
    }

    pub fn with_order_by(mut self, order_by: impl Into<String>) -> Self {
        self.ordering.order_by = Some(order_by.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
            && self.filters.is_empty()
            && self.ordering == Ordering::default()
    }

    /// Merge `other` into this set.
    ///
    /// Includes and set-valued filters are unioned. Scalar filters must be
    /// identical on both sides or the merge fails with `ParameterConflict`.
    /// Ordering directives are overwritten by `other`.
    pub fn merge_from(&mut self, other: &FetchParams) -> Result<()> {
        self.include.extend(other.include.iter().cloned());

        for (key, value) in &other.filters {
            let merged = match (self.filters.get(key), value) {
                (None, _) => value.clone(),
                (Some(FilterValue::One(prev)), FilterValue::One(incoming)) => {
                    if prev != incoming {
                        return Err(CanvasError::ParameterConflict {
                            key: key.clone(),
                            previous: prev.clone(),
                            incoming: incoming.clone(),
                        });
                    }
                    FilterValue::One(prev.clone())
                }
                (Some(prev), incoming) => {
                    // At least one side is set-valued: union as a set.
                    let mut union = prev.as_set();
                    union.extend(incoming.as_set());
                    FilterValue::Many(union)
                }
            };
            self.filters.insert(key.clone(), merged);
        }

        self.ordering.overwrite_with(&other.ordering);
        Ok(())
    }

    /// Merge a sequence of parameter sets into one superset.
    ///
    /// `merge([])` yields the empty set. Set membership in the result does
    /// not depend on iteration order; ordering directives are last-write-wins.
    pub fn merge<'a, I>(sets: I) -> Result<FetchParams>
    where
        I: IntoIterator<Item = &'a FetchParams>,
    {
        let mut merged = FetchParams::new();
        for params in sets {
            merged.merge_from(params)?;
        }
        Ok(merged)
    }

    /// Whether data fetched with `self` can serve a request for `requested`.
    ///
    /// True when every requested include/filter is already covered by the
    /// stored parameters. Ordering directives are ignored.
    pub fn covers(&self, requested: &FetchParams) -> bool {
        if !requested.include.is_subset(&self.include) {
            return false;
        }
        for (key, value) in &requested.filters {
            match self.filters.get(key) {
                None => return false,
                Some(stored) => match (stored, value) {
                    (FilterValue::One(prev), FilterValue::One(new)) => {
                        if prev != new {
                            return false;
                        }
                    }
                    _ => {
                        if !value.as_set().is_subset(&stored.as_set()) {
                            return false;
                        }
                    }
                },
            }
        }
        true
    }

    /// Render as query pairs in the Canvas REST convention: set-valued
    /// parameters repeat with a `[]` suffix.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        for directive in &self.include {
            query.push(("include[]".to_string(), directive.clone()));
        }
        for (key, value) in &self.filters {
            match value {
                FilterValue::One(v) => query.push((key.clone(), v.clone())),
                FilterValue::Many(vs) => {
                    for v in vs {
                        query.push((format!("{}[]", key), v.clone()));
                    }
                }
            }
        }
        if let Some(sort) = &self.ordering.sort {
            query.push(("sort".to_string(), sort.clone()));
        }
        if let Some(order) = &self.ordering.order {
            query.push(("order".to_string(), order.clone()));
        }
        if let Some(order_by) = &self.ordering.order_by {
            query.push(("order_by".to_string(), order_by.clone()));
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_of_nothing_is_empty() {
        let merged = FetchParams::merge([]).unwrap();
        assert!(merged.is_empty());
    }

    #[test]
    fn merge_unions_includes_commutatively() {
        let a = FetchParams::new().with_includes(["submission_history", "user"]);
        let b = FetchParams::new().with_includes(["user", "rubric_assessment"]);

        let ab = FetchParams::merge([&a, &b]).unwrap();
        let ba = FetchParams::merge([&b, &a]).unwrap();

        assert_eq!(ab.include, ba.include);
        assert_eq!(ab.include.len(), 3);
    }

    #[test]
    fn merge_unions_set_valued_filters() {
        let a = FetchParams::new().with_filter("state", FilterValue::many(["available"]));
        let b = FetchParams::new().with_filter("state", FilterValue::many(["completed"]));

        let merged = FetchParams::merge([&a, &b]).unwrap();
        assert_eq!(
            merged.filters["state"],
            FilterValue::many(["available", "completed"])
        );
    }

    #[test]
    fn merge_coerces_scalar_and_set_to_set() {
        let a = FetchParams::new().with_filter("enrollment_type", FilterValue::one("teacher"));
        let b = FetchParams::new()
            .with_filter("enrollment_type", FilterValue::many(["student", "ta"]));

        let merged = FetchParams::merge([&a, &b]).unwrap();
        assert_eq!(
            merged.filters["enrollment_type"],
            FilterValue::many(["teacher", "student", "ta"])
        );
    }

    #[test]
    fn merge_keeps_identical_scalars() {
        let a = FetchParams::new().with_filter("workflow_state", FilterValue::one("active"));
        let b = a.clone();

        let merged = FetchParams::merge([&a, &b]).unwrap();
        assert_eq!(
            merged.filters["workflow_state"],
            FilterValue::one("active")
        );
    }

    #[test]
    fn merge_rejects_conflicting_scalars() {
        let a = FetchParams::new().with_filter("enrollment_state", FilterValue::one("active"));
        let b = FetchParams::new().with_filter("enrollment_state", FilterValue::one("invited"));

        let err = FetchParams::merge([&a, &b]).unwrap_err();
        assert!(matches!(
            err,
            CanvasError::ParameterConflict { key, .. } if key == "enrollment_state"
        ));
    }

    #[test]
    fn merge_overwrites_ordering_without_conflict() {
        let a = FetchParams::new().with_sort("due_at");
        let b = FetchParams::new().with_sort("name");

        let merged = FetchParams::merge([&a, &b]).unwrap();
        assert_eq!(merged.ordering.sort.as_deref(), Some("name"));
    }

    #[test]
    fn covers_requires_include_subset() {
        let stored = FetchParams::new().with_includes(["user", "submission_history"]);

        assert!(stored.covers(&FetchParams::new().with_include("user")));
        assert!(stored.covers(&stored.clone()));
        assert!(!stored.covers(&FetchParams::new().with_include("rubric_assessment")));
    }

    #[test]
    fn covers_ignores_ordering() {
        let stored = FetchParams::new().with_include("user");
        let requested = FetchParams::new()
            .with_include("user")
            .with_sort("due_at")
            .with_order("desc");

        assert!(stored.covers(&requested));
    }

    #[test]
    fn covers_rejects_unknown_filter_key() {
        let stored = FetchParams::new();
        let requested =
            FetchParams::new().with_filter("enrollment_type", FilterValue::one("student"));

        assert!(!stored.covers(&requested));
    }

    #[test]
    fn covers_rejects_differing_scalar() {
        let stored =
            FetchParams::new().with_filter("enrollment_state", FilterValue::one("active"));
        let requested =
            FetchParams::new().with_filter("enrollment_state", FilterValue::one("invited"));

        assert!(!stored.covers(&requested));
    }

    #[test]
    fn covers_checks_set_containment() {
        let stored =
            FetchParams::new().with_filter("state", FilterValue::many(["available", "completed"]));

        assert!(stored.covers(
            &FetchParams::new().with_filter("state", FilterValue::many(["available"]))
        ));
        assert!(!stored.covers(
            &FetchParams::new().with_filter("state", FilterValue::many(["unpublished"]))
        ));
    }

    #[test]
    fn to_query_repeats_set_values() {
        let params = FetchParams::new()
            .with_includes(["user", "submission_history"])
            .with_filter("enrollment_type", FilterValue::many(["student"]))
            .with_filter("search_term", FilterValue::one("alice"))
            .with_sort("username");

        let query = params.to_query();
        assert!(query.contains(&("include[]".to_string(), "user".to_string())));
        assert!(query.contains(&("include[]".to_string(), "submission_history".to_string())));
        assert!(query.contains(&("enrollment_type[]".to_string(), "student".to_string())));
        assert!(query.contains(&("search_term".to_string(), "alice".to_string())));
        assert!(query.contains(&("sort".to_string(), "username".to_string())));
    }
}
