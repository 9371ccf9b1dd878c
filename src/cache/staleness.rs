// Staleness policy for cached Canvas objects.
// Decides when a cached entry must be re-fetched, based on its grade state
// and the time elapsed since it was last fetched.

use chrono::{DateTime, Duration, Utc};

use super::identity::{Kind, RemoteObject};

/// Grades that cannot be revised upward. A submission carrying one of these
/// is never considered stale, regardless of age.
pub const TERMINAL_GRADES: &[&str] = &["A", "P", "P+", "complete"];

/// How long a non-terminal grade stays trustworthy. Short, because such
/// grades may change at any time.
pub fn freshness_window() -> Duration {
    Duration::minutes(5)
}

/// Expiry windows for nested all-fetched markers.
/// Listing markers are cheaper to drop than graded submissions, so user
/// rosters expire fast and group structures a little slower.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerWindows {
    pub user: Duration,
    pub group: Duration,
    pub default: Duration,
}

impl Default for MarkerWindows {
    fn default() -> Self {
        Self {
            user: Duration::days(2),
            group: Duration::days(5),
            default: Duration::days(7),
        }
    }
}

impl MarkerWindows {
    /// The expiry window for all-fetched markers of the given kind.
    pub fn window_for(&self, kind: Kind) -> Duration {
        match kind {
            Kind::User => self.user,
            Kind::Group | Kind::GroupCategory => self.group,
            _ => self.default,
        }
    }
}

/// The freshness predicate, parameterized so the embedding application can
/// widen the windows or extend the terminal grade set.
#[derive(Debug, Clone)]
pub struct StalenessPolicy {
    pub freshness_window: Duration,
    pub terminal_grades: Vec<String>,
    pub marker_windows: MarkerWindows,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            freshness_window: freshness_window(),
            terminal_grades: TERMINAL_GRADES.iter().map(|g| g.to_string()).collect(),
            marker_windows: MarkerWindows::default(),
        }
    }
}

impl StalenessPolicy {
    /// Whether a cached object must be re-fetched.
    ///
    /// Ungradable kinds are never stale by age; their entries are only
    /// replaced when a request needs broader parameters. A terminal grade
    /// exempts the object permanently. Everything else goes stale once its
    /// fetch timestamp is missing or strictly older than the window.
    pub fn is_stale<T: RemoteObject>(
        &self,
        object: &T,
        fetched_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        if !object.is_gradable() {
            return false;
        }
        if let Some(grade) = object.grade() {
            if self.terminal_grades.iter().any(|t| t == grade) {
                return false;
            }
        }
        match fetched_at {
            None => true,
            Some(at) => now - at > self.freshness_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Graded {
        id: u64,
        grade: Option<String>,
    }

    impl RemoteObject for Graded {
        const KIND: Kind = Kind::Submission;

        fn id(&self) -> u64 {
            self.id
        }

        fn is_gradable(&self) -> bool {
            true
        }

        fn grade(&self) -> Option<&str> {
            self.grade.as_deref()
        }
    }

    struct Plain {
        id: u64,
    }

    impl RemoteObject for Plain {
        const KIND: Kind = Kind::Module;

        fn id(&self) -> u64 {
            self.id
        }
    }

    fn graded(grade: Option<&str>) -> Graded {
        Graded {
            id: 1,
            grade: grade.map(String::from),
        }
    }

    #[test]
    fn terminal_grade_is_never_stale() {
        let policy = StalenessPolicy::default();
        let now = Utc::now();
        let a_year_ago = now - Duration::days(365);

        assert!(!policy.is_stale(&graded(Some("A")), Some(a_year_ago), now));
        assert!(!policy.is_stale(&graded(Some("P+")), Some(a_year_ago), now));
        assert!(!policy.is_stale(&graded(Some("complete")), Some(a_year_ago), now));
    }

    #[test]
    fn revisable_grade_goes_stale_after_window() {
        let policy = StalenessPolicy::default();
        let now = Utc::now();

        assert!(policy.is_stale(&graded(Some("B")), Some(now - Duration::minutes(6)), now));
        assert!(!policy.is_stale(&graded(Some("B")), Some(now - Duration::minutes(4)), now));
    }

    #[test]
    fn exactly_at_the_boundary_is_still_fresh() {
        let policy = StalenessPolicy::default();
        let now = Utc::now();

        assert!(!policy.is_stale(&graded(Some("B")), Some(now - Duration::minutes(5)), now));
    }

    #[test]
    fn ungraded_submission_follows_the_window() {
        let policy = StalenessPolicy::default();
        let now = Utc::now();

        assert!(policy.is_stale(&graded(None), Some(now - Duration::minutes(6)), now));
        assert!(!policy.is_stale(&graded(None), Some(now - Duration::minutes(1)), now));
    }

    #[test]
    fn missing_timestamp_forces_fetch() {
        let policy = StalenessPolicy::default();
        assert!(policy.is_stale(&graded(Some("B")), None, Utc::now()));
    }

    #[test]
    fn ungradable_objects_never_age_out() {
        let policy = StalenessPolicy::default();
        let now = Utc::now();
        let plain = Plain { id: 1 };

        assert!(!policy.is_stale(&plain, Some(now - Duration::days(365)), now));
        assert!(!policy.is_stale(&plain, None, now));
    }

    #[test]
    fn marker_windows_by_kind() {
        let windows = MarkerWindows::default();
        assert_eq!(windows.window_for(Kind::User), Duration::days(2));
        assert_eq!(windows.window_for(Kind::Group), Duration::days(5));
        assert_eq!(windows.window_for(Kind::GroupCategory), Duration::days(5));
        assert_eq!(windows.window_for(Kind::Assignment), Duration::days(7));
    }
}
