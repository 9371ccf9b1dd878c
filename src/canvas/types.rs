// Canvas API response types.
// Defines structs for deserializing Canvas REST API responses, each carrying
// the nested cache tables its kind owns.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::identity::impl_canvas_identity;
use crate::cache::{Kind, MarkerWindows, RemoteObject, ResourceCache};

/// Course publication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseState {
    Unpublished,
    Available,
    Completed,
    Deleted,
    #[serde(other)]
    Unknown,
}

/// A Canvas course. The container for most other kinds: it owns one cache
/// table per nested collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: u64,
    pub name: Option<String>,
    pub course_code: Option<String>,
    pub workflow_state: CourseState,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub assignments: ResourceCache<Assignment>,
    #[serde(skip)]
    pub assignment_groups: ResourceCache<AssignmentGroup>,
    #[serde(skip)]
    pub users: ResourceCache<User>,
    #[serde(skip)]
    pub modules: ResourceCache<Module>,
    #[serde(skip)]
    pub group_categories: ResourceCache<GroupCategory>,
    #[serde(skip)]
    pub groups: ResourceCache<Group>,
}

impl RemoteObject for Course {
    const KIND: Kind = Kind::Course;

    fn id(&self) -> u64 {
        self.id
    }

    fn adopt_caches(&mut self, previous: &mut Self) {
        self.assignments = std::mem::take(&mut previous.assignments);
        self.assignment_groups = std::mem::take(&mut previous.assignment_groups);
        self.users = std::mem::take(&mut previous.users);
        self.modules = std::mem::take(&mut previous.modules);
        self.group_categories = std::mem::take(&mut previous.group_categories);
        self.groups = std::mem::take(&mut previous.groups);
    }

    fn age_nested_markers(&mut self, now: DateTime<Utc>, windows: &MarkerWindows) {
        self.assignments
            .age_marker(now, windows.window_for(Kind::Assignment));
        self.assignment_groups
            .age_marker(now, windows.window_for(Kind::AssignmentGroup));
        self.users.age_marker(now, windows.window_for(Kind::User));
        self.modules.age_marker(now, windows.window_for(Kind::Module));
        self.group_categories
            .age_marker(now, windows.window_for(Kind::GroupCategory));
        self.groups.age_marker(now, windows.window_for(Kind::Group));
    }
}

/// A Canvas assignment. Owns the per-user submission cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: u64,
    pub course_id: Option<u64>,
    pub name: String,
    pub due_at: Option<DateTime<Utc>>,
    pub points_possible: Option<f64>,
    #[serde(default)]
    pub published: bool,
    pub html_url: Option<String>,

    #[serde(skip)]
    pub submissions: ResourceCache<Submission>,
}

impl RemoteObject for Assignment {
    const KIND: Kind = Kind::Assignment;

    fn id(&self) -> u64 {
        self.id
    }

    fn adopt_caches(&mut self, previous: &mut Self) {
        self.submissions = std::mem::take(&mut previous.submissions);
    }

    fn age_nested_markers(&mut self, now: DateTime<Utc>, windows: &MarkerWindows) {
        self.submissions
            .age_marker(now, windows.window_for(Kind::Submission));
    }
}

/// Weighted grouping of assignments within a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentGroup {
    pub id: u64,
    pub name: String,
    pub position: Option<u32>,
    pub group_weight: Option<f64>,
}

impl RemoteObject for AssignmentGroup {
    const KIND: Kind = Kind::AssignmentGroup;

    fn id(&self) -> u64 {
        self.id
    }
}

/// Submission grading state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Submitted,
    Unsubmitted,
    Graded,
    PendingReview,
    #[serde(other)]
    Unknown,
}

/// A student's submission for one assignment. The only gradable kind: its
/// grade drives the staleness policy, and its cache key is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: u64,
    pub assignment_id: u64,
    pub user_id: u64,
    pub grade: Option<String>,
    pub score: Option<f64>,
    pub workflow_state: SubmissionState,
    pub submitted_at: Option<DateTime<Utc>>,
    pub graded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub late: bool,
    #[serde(default)]
    pub missing: bool,
    pub attempt: Option<u32>,
}

impl RemoteObject for Submission {
    const KIND: Kind = Kind::Submission;

    fn id(&self) -> u64 {
        self.id
    }

    // Submissions are looked up per user within an assignment.
    fn cache_key(&self) -> u64 {
        self.user_id
    }

    fn is_gradable(&self) -> bool {
        true
    }

    fn grade(&self) -> Option<&str> {
        self.grade.as_deref()
    }
}

/// A Canvas user (student, teacher, TA).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub sortable_name: Option<String>,
    pub login_id: Option<String>,
    pub email: Option<String>,
}

impl RemoteObject for User {
    const KIND: Kind = Kind::User;

    fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.login_id.as_deref().unwrap_or(""))
    }
}

/// A set of groups within a course (e.g. lab partners).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupCategory {
    pub id: u64,
    pub name: String,

    #[serde(skip)]
    pub groups: ResourceCache<Group>,
}

impl RemoteObject for GroupCategory {
    const KIND: Kind = Kind::GroupCategory;

    fn id(&self) -> u64 {
        self.id
    }

    fn adopt_caches(&mut self, previous: &mut Self) {
        self.groups = std::mem::take(&mut previous.groups);
    }

    fn age_nested_markers(&mut self, now: DateTime<Utc>, windows: &MarkerWindows) {
        self.groups.age_marker(now, windows.window_for(Kind::Group));
    }
}

/// A student group within a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    pub name: Option<String>,
    pub group_category_id: Option<u64>,
    pub members_count: Option<u32>,
}

impl RemoteObject for Group {
    const KIND: Kind = Kind::Group;

    fn id(&self) -> u64 {
        self.id
    }
}

/// A course module (ordered unit of course content).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: u64,
    pub name: String,
    pub position: Option<u32>,
    #[serde(default)]
    pub published: bool,
    pub items_count: Option<u32>,
}

impl RemoteObject for Module {
    const KIND: Kind = Kind::Module;

    fn id(&self) -> u64 {
        self.id
    }
}

impl_canvas_identity!(
    Course,
    Assignment,
    AssignmentGroup,
    Submission,
    User,
    GroupCategory,
    Group,
    Module,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ObjectRef;
    use std::collections::HashSet;

    fn course(id: u64) -> Course {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": "Program Construction",
            "course_code": "DD1337",
            "workflow_state": "available"
        }))
        .unwrap()
    }

    #[test]
    fn deserializes_course_with_empty_caches() {
        let course = course(17);
        assert_eq!(course.id, 17);
        assert_eq!(course.workflow_state, CourseState::Available);
        assert!(course.assignments.is_empty());
        assert!(course.users.all_fetched().is_none());
    }

    #[test]
    fn unknown_workflow_state_is_tolerated() {
        let course: Course = serde_json::from_value(serde_json::json!({
            "id": 1,
            "workflow_state": "claimed"
        }))
        .unwrap();
        assert_eq!(course.workflow_state, CourseState::Unknown);
    }

    #[test]
    fn refetched_course_compares_equal_to_its_predecessor() {
        let old = course(17);
        let mut new = course(17);
        new.name = Some("Renamed".into());
        assert_eq!(old, new);

        let mut seen = HashSet::new();
        seen.insert(old);
        seen.insert(new);
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn different_kinds_with_same_id_have_distinct_refs() {
        let user = User {
            id: 17,
            name: "Alice".into(),
            sortable_name: None,
            login_id: None,
            email: None,
        };
        assert_ne!(
            course(17).object_ref(),
            user.object_ref(),
        );
        assert_eq!(
            user.object_ref(),
            ObjectRef {
                kind: Kind::User,
                id: 17
            }
        );
    }

    #[test]
    fn submission_is_keyed_by_user() {
        let submission: Submission = serde_json::from_value(serde_json::json!({
            "id": 900,
            "assignment_id": 31,
            "user_id": 55,
            "grade": "B",
            "score": 82.5,
            "workflow_state": "graded"
        }))
        .unwrap();
        assert_eq!(submission.id(), 900);
        assert_eq!(submission.cache_key(), 55);
        assert!(submission.is_gradable());
        assert_eq!(submission.grade(), Some("B"));
    }

    #[test]
    fn course_adoption_moves_every_nested_cache() {
        use crate::cache::FetchParams;

        let mut previous = course(17);
        previous.users.insert(
            User {
                id: 55,
                name: "Alice".into(),
                sortable_name: None,
                login_id: None,
                email: None,
            },
            FetchParams::new(),
        );
        previous.modules.insert(
            Module {
                id: 3,
                name: "Week 1".into(),
                position: None,
                published: true,
                items_count: None,
            },
            FetchParams::new(),
        );
        let mut replacement = course(17);

        // Caches are moved, not cloned: the previous object is drained.
        replacement.adopt_caches(&mut previous);
        assert!(replacement.users.contains(55));
        assert!(replacement.modules.contains(3));
        assert!(previous.users.is_empty());
        assert!(previous.modules.is_empty());
    }

    #[test]
    fn user_display_includes_login() {
        let mut user = User {
            id: 1,
            name: "Alice".into(),
            sortable_name: None,
            login_id: Some("alice@kth.se".into()),
            email: None,
        };
        assert_eq!(user.to_string(), "Alice <alice@kth.se>");

        user.login_id = None;
        assert_eq!(user.to_string(), "Alice <>");
    }
}
