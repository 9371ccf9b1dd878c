// Canvas API endpoint functions.
// Provides typed methods for fetching data from the Canvas REST API. These
// are the underlying operations the caching layer wraps.

use crate::cache::FetchParams;
use crate::error::Result;

use super::client::{CanvasClient, Paginated};
use super::types::{
    Assignment, AssignmentGroup, Course, Group, GroupCategory, Module, Submission, User,
};

impl CanvasClient {
    /// Get a specific course.
    pub fn get_course(&self, id: u64, params: &FetchParams) -> Result<Course> {
        self.get_json(&format!("/courses/{}", id), &params.to_query())
    }

    /// Get the courses visible to the calling user.
    pub fn list_courses(&self, params: &FetchParams) -> Paginated<'_, Course> {
        self.get_paginated("/courses", &params.to_query())
    }

    /// Get a specific assignment in a course.
    pub fn get_assignment(
        &self,
        course_id: u64,
        id: u64,
        params: &FetchParams,
    ) -> Result<Assignment> {
        self.get_json(
            &format!("/courses/{}/assignments/{}", course_id, id),
            &params.to_query(),
        )
    }

    /// Get the assignments of a course.
    pub fn list_assignments(
        &self,
        course_id: u64,
        params: &FetchParams,
    ) -> Paginated<'_, Assignment> {
        self.get_paginated(&format!("/courses/{}/assignments", course_id), &params.to_query())
    }

    /// Get a specific assignment group in a course.
    pub fn get_assignment_group(
        &self,
        course_id: u64,
        id: u64,
        params: &FetchParams,
    ) -> Result<AssignmentGroup> {
        self.get_json(
            &format!("/courses/{}/assignment_groups/{}", course_id, id),
            &params.to_query(),
        )
    }

    /// Get the assignment groups of a course.
    pub fn list_assignment_groups(
        &self,
        course_id: u64,
        params: &FetchParams,
    ) -> Paginated<'_, AssignmentGroup> {
        self.get_paginated(
            &format!("/courses/{}/assignment_groups", course_id),
            &params.to_query(),
        )
    }

    /// Get a specific user through their enrollment in a course.
    pub fn get_user(&self, course_id: u64, id: u64, params: &FetchParams) -> Result<User> {
        self.get_json(
            &format!("/courses/{}/users/{}", course_id, id),
            &params.to_query(),
        )
    }

    /// Get the users enrolled in a course.
    pub fn list_users(&self, course_id: u64, params: &FetchParams) -> Paginated<'_, User> {
        self.get_paginated(&format!("/courses/{}/users", course_id), &params.to_query())
    }

    /// Get one user's submission for an assignment.
    pub fn get_submission(
        &self,
        course_id: u64,
        assignment_id: u64,
        user_id: u64,
        params: &FetchParams,
    ) -> Result<Submission> {
        self.get_json(
            &format!(
                "/courses/{}/assignments/{}/submissions/{}",
                course_id, assignment_id, user_id
            ),
            &params.to_query(),
        )
    }

    /// Get all submissions for an assignment.
    pub fn list_submissions(
        &self,
        course_id: u64,
        assignment_id: u64,
        params: &FetchParams,
    ) -> Paginated<'_, Submission> {
        self.get_paginated(
            &format!("/courses/{}/assignments/{}/submissions", course_id, assignment_id),
            &params.to_query(),
        )
    }

    /// Get a specific module in a course.
    pub fn get_module(&self, course_id: u64, id: u64, params: &FetchParams) -> Result<Module> {
        self.get_json(
            &format!("/courses/{}/modules/{}", course_id, id),
            &params.to_query(),
        )
    }

    /// Get the modules of a course.
    pub fn list_modules(&self, course_id: u64, params: &FetchParams) -> Paginated<'_, Module> {
        self.get_paginated(&format!("/courses/{}/modules", course_id), &params.to_query())
    }

    /// Get a specific group category.
    pub fn get_group_category(&self, id: u64, params: &FetchParams) -> Result<GroupCategory> {
        self.get_json(&format!("/group_categories/{}", id), &params.to_query())
    }

    /// Get a specific group.
    pub fn get_group(&self, id: u64, params: &FetchParams) -> Result<Group> {
        self.get_json(&format!("/groups/{}", id), &params.to_query())
    }

    /// Get the group categories of a course.
    pub fn list_group_categories(
        &self,
        course_id: u64,
        params: &FetchParams,
    ) -> Paginated<'_, GroupCategory> {
        self.get_paginated(
            &format!("/courses/{}/group_categories", course_id),
            &params.to_query(),
        )
    }

    /// Get all groups in a course.
    pub fn list_course_groups(
        &self,
        course_id: u64,
        params: &FetchParams,
    ) -> Paginated<'_, Group> {
        self.get_paginated(&format!("/courses/{}/groups", course_id), &params.to_query())
    }

    /// Get the groups of a group category.
    pub fn list_category_groups(
        &self,
        category_id: u64,
        params: &FetchParams,
    ) -> Paginated<'_, Group> {
        self.get_paginated(
            &format!("/group_categories/{}/groups", category_id),
            &params.to_query(),
        )
    }
}
