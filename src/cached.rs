// Cache-wrapped Canvas client.
// Composes the transport with one cache table per (container, kind) pair:
// the client owns the course table, each course owns its nested tables, and
// each assignment owns its submission table. This is the explicit setup the
// embedding application performs once, instead of any global registration.

use crate::cache::{
    Fetch, FetchParams, ObjectArg, ObjectStream, ResourceCache, StalenessPolicy,
    identity::resolve_id,
};
use crate::canvas::{
    Assignment, AssignmentGroup, CanvasClient, Course, Group, GroupCategory, Module, Submission,
    User,
};
use crate::config::CacheConfig;
use crate::error::{CanvasError, Result};

/// Canvas client with transparent caching on every fetch operation.
///
/// Wraps a plain [`CanvasClient`]; callers go through the cached operations
/// below and only hit the network on misses and staleness. Kinds the
/// original API only lists (assignment groups, modules, group categories,
/// groups) expose no cached singular fetch.
pub struct CachedClient {
    transport: CanvasClient,
    config: CacheConfig,
    policy: StalenessPolicy,
    courses: ResourceCache<Course>,
}

impl CachedClient {
    /// Wrap a transport client with caching.
    pub fn new(transport: CanvasClient, config: CacheConfig) -> Self {
        let policy = config.policy();
        Self {
            transport,
            config,
            policy,
            courses: ResourceCache::new(),
        }
    }

    /// Wrap a transport client using configuration from disk (or defaults).
    pub fn with_default_config(transport: CanvasClient) -> Result<Self> {
        Ok(Self::new(transport, CacheConfig::load()?))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Direct access to the underlying transport, bypassing all caches.
    pub fn transport(&self) -> &CanvasClient {
        &self.transport
    }

    /// The course cache table, for inspection.
    pub fn course_cache(&self) -> &ResourceCache<Course> {
        &self.courses
    }

    /// Fetch a course, from cache when possible.
    pub fn get_course(
        &mut self,
        course: Option<ObjectArg<'_, Course>>,
        params: &FetchParams,
    ) -> Result<Course> {
        self.courses.fetch_one(
            "get_course",
            &CourseFetcher {
                transport: &self.transport,
            },
            &self.policy,
            course,
            params,
        )
    }

    /// List all courses visible to the calling user, from cache when the
    /// full listing is already known.
    pub fn courses(&mut self, params: &FetchParams) -> Result<Vec<Course>> {
        let CachedClient {
            transport,
            courses,
            policy,
            ..
        } = self;
        let fetcher = CourseFetcher {
            transport: &*transport,
        };
        courses.fetch_all(&fetcher, &*policy, params.clone()).collect()
    }

    /// Fetch one assignment of a course.
    pub fn get_assignment(
        &mut self,
        course_id: u64,
        assignment: Option<ObjectArg<'_, Assignment>>,
        params: &FetchParams,
    ) -> Result<Assignment> {
        self.ensure_course(course_id)?;
        let CachedClient {
            transport,
            courses,
            policy,
            ..
        } = self;
        let course = Self::course_entry(courses, course_id)?;
        let fetcher = AssignmentFetcher {
            transport: &*transport,
            course_id,
        };
        course
            .assignments
            .fetch_one("get_assignment", &fetcher, &*policy, assignment, params)
    }

    /// List the assignments of a course.
    pub fn assignments(&mut self, course_id: u64, params: &FetchParams) -> Result<Vec<Assignment>> {
        self.ensure_course(course_id)?;
        let CachedClient {
            transport,
            courses,
            policy,
            ..
        } = self;
        let course = Self::course_entry(courses, course_id)?;
        let fetcher = AssignmentFetcher {
            transport: &*transport,
            course_id,
        };
        course
            .assignments
            .fetch_all(&fetcher, &*policy, params.clone())
            .collect()
    }

    /// List the assignment groups of a course.
    pub fn assignment_groups(
        &mut self,
        course_id: u64,
        params: &FetchParams,
    ) -> Result<Vec<AssignmentGroup>> {
        self.ensure_course(course_id)?;
        let CachedClient {
            transport,
            courses,
            policy,
            ..
        } = self;
        let course = Self::course_entry(courses, course_id)?;
        let fetcher = AssignmentGroupFetcher {
            transport: &*transport,
            course_id,
        };
        course
            .assignment_groups
            .fetch_all(&fetcher, &*policy, params.clone())
            .collect()
    }

    /// Fetch one user enrolled in a course.
    pub fn get_user(
        &mut self,
        course_id: u64,
        user: Option<ObjectArg<'_, User>>,
        params: &FetchParams,
    ) -> Result<User> {
        self.ensure_course(course_id)?;
        let CachedClient {
            transport,
            courses,
            policy,
            ..
        } = self;
        let course = Self::course_entry(courses, course_id)?;
        let fetcher = UserFetcher {
            transport: &*transport,
            course_id,
        };
        course
            .users
            .fetch_one("get_user", &fetcher, &*policy, user, params)
    }

    /// List the users enrolled in a course.
    pub fn users(&mut self, course_id: u64, params: &FetchParams) -> Result<Vec<User>> {
        self.ensure_course(course_id)?;
        let CachedClient {
            transport,
            courses,
            policy,
            ..
        } = self;
        let course = Self::course_entry(courses, course_id)?;
        let fetcher = UserFetcher {
            transport: &*transport,
            course_id,
        };
        course
            .users
            .fetch_all(&fetcher, &*policy, params.clone())
            .collect()
    }

    /// Fetch one user's submission for an assignment. Submissions are keyed
    /// by user, so the identity argument is the user.
    pub fn get_submission(
        &mut self,
        course_id: u64,
        assignment_id: u64,
        user: Option<ObjectArg<'_, User>>,
        params: &FetchParams,
    ) -> Result<Submission> {
        let user_id = resolve_id("get_submission", user)?;
        self.ensure_assignment(course_id, assignment_id)?;
        let CachedClient {
            transport,
            courses,
            policy,
            ..
        } = self;
        let course = Self::course_entry(courses, course_id)?;
        let assignment = Self::assignment_entry(course, assignment_id)?;
        let fetcher = SubmissionFetcher {
            transport: &*transport,
            course_id,
            assignment_id,
        };
        assignment
            .submissions
            .fetch_by_key(&fetcher, &*policy, user_id, params)
    }

    /// List all submissions for an assignment.
    pub fn submissions(
        &mut self,
        course_id: u64,
        assignment_id: u64,
        params: &FetchParams,
    ) -> Result<Vec<Submission>> {
        self.ensure_assignment(course_id, assignment_id)?;
        let CachedClient {
            transport,
            courses,
            policy,
            ..
        } = self;
        let course = Self::course_entry(courses, course_id)?;
        let assignment = Self::assignment_entry(course, assignment_id)?;
        let fetcher = SubmissionFetcher {
            transport: &*transport,
            course_id,
            assignment_id,
        };
        assignment
            .submissions
            .fetch_all(&fetcher, &*policy, params.clone())
            .collect()
    }

    /// List the modules of a course.
    pub fn modules(&mut self, course_id: u64, params: &FetchParams) -> Result<Vec<Module>> {
        self.ensure_course(course_id)?;
        let CachedClient {
            transport,
            courses,
            policy,
            ..
        } = self;
        let course = Self::course_entry(courses, course_id)?;
        let fetcher = ModuleFetcher {
            transport: &*transport,
            course_id,
        };
        course
            .modules
            .fetch_all(&fetcher, &*policy, params.clone())
            .collect()
    }

    /// List the group categories of a course.
    pub fn group_categories(
        &mut self,
        course_id: u64,
        params: &FetchParams,
    ) -> Result<Vec<GroupCategory>> {
        self.ensure_course(course_id)?;
        let CachedClient {
            transport,
            courses,
            policy,
            ..
        } = self;
        let course = Self::course_entry(courses, course_id)?;
        let fetcher = GroupCategoryFetcher {
            transport: &*transport,
            course_id,
        };
        course
            .group_categories
            .fetch_all(&fetcher, &*policy, params.clone())
            .collect()
    }

    /// List all groups of a course.
    pub fn groups(&mut self, course_id: u64, params: &FetchParams) -> Result<Vec<Group>> {
        self.ensure_course(course_id)?;
        let CachedClient {
            transport,
            courses,
            policy,
            ..
        } = self;
        let course = Self::course_entry(courses, course_id)?;
        let fetcher = CourseGroupFetcher {
            transport: &*transport,
            course_id,
        };
        course
            .groups
            .fetch_all(&fetcher, &*policy, params.clone())
            .collect()
    }

    /// List the groups of one group category within a course.
    pub fn category_groups(
        &mut self,
        course_id: u64,
        category_id: u64,
        params: &FetchParams,
    ) -> Result<Vec<Group>> {
        self.ensure_course(course_id)?;
        self.ensure_group_category(course_id, category_id)?;
        let CachedClient {
            transport,
            courses,
            policy,
            ..
        } = self;
        let course = Self::course_entry(courses, course_id)?;
        let category = course
            .group_categories
            .object_mut(category_id)
            .ok_or_else(|| CanvasError::NotFound(format!("group category {}", category_id)))?;
        let fetcher = CategoryGroupFetcher {
            transport: &*transport,
            category_id,
        };
        category
            .groups
            .fetch_all(&fetcher, &*policy, params.clone())
            .collect()
    }

    /// Make sure the course hosting a nested cache is itself cached.
    fn ensure_course(&mut self, course_id: u64) -> Result<()> {
        if !self.courses.contains(course_id) {
            self.courses.fetch_by_key(
                &CourseFetcher {
                    transport: &self.transport,
                },
                &self.policy,
                course_id,
                &FetchParams::new(),
            )?;
        }
        Ok(())
    }

    /// Make sure the assignment hosting a submission cache is cached.
    fn ensure_assignment(&mut self, course_id: u64, assignment_id: u64) -> Result<()> {
        self.ensure_course(course_id)?;
        let CachedClient {
            transport,
            courses,
            policy,
            ..
        } = self;
        let course = Self::course_entry(courses, course_id)?;
        if !course.assignments.contains(assignment_id) {
            course.assignments.fetch_by_key(
                &AssignmentFetcher {
                    transport: &*transport,
                    course_id,
                },
                &*policy,
                assignment_id,
                &FetchParams::new(),
            )?;
        }
        Ok(())
    }

    /// Make sure the group category hosting a group cache is cached.
    fn ensure_group_category(&mut self, course_id: u64, category_id: u64) -> Result<()> {
        let CachedClient {
            transport,
            courses,
            policy,
            ..
        } = self;
        let course = Self::course_entry(courses, course_id)?;
        if !course.group_categories.contains(category_id) {
            course.group_categories.fetch_by_key(
                &GroupCategoryFetcher {
                    transport: &*transport,
                    course_id,
                },
                &*policy,
                category_id,
                &FetchParams::new(),
            )?;
        }
        Ok(())
    }

    fn course_entry(
        courses: &mut ResourceCache<Course>,
        course_id: u64,
    ) -> Result<&mut Course> {
        courses
            .object_mut(course_id)
            .ok_or_else(|| CanvasError::NotFound(format!("course {}", course_id)))
    }

    fn assignment_entry(course: &mut Course, assignment_id: u64) -> Result<&mut Assignment> {
        course
            .assignments
            .object_mut(assignment_id)
            .ok_or_else(|| CanvasError::NotFound(format!("assignment {}", assignment_id)))
    }
}

// Adapters binding the Fetch capability to the typed transport endpoints.
// Each one scopes the underlying calls to its container.

struct CourseFetcher<'c> {
    transport: &'c CanvasClient,
}

impl Fetch<Course> for CourseFetcher<'_> {
    fn fetch_one(&self, id: u64, params: &FetchParams) -> Result<Course> {
        self.transport.get_course(id, params)
    }

    fn fetch_many(&self, params: &FetchParams) -> Result<ObjectStream<'_, Course>> {
        Ok(Box::new(self.transport.list_courses(params)))
    }
}

struct AssignmentFetcher<'c> {
    transport: &'c CanvasClient,
    course_id: u64,
}

impl Fetch<Assignment> for AssignmentFetcher<'_> {
    fn fetch_one(&self, id: u64, params: &FetchParams) -> Result<Assignment> {
        self.transport.get_assignment(self.course_id, id, params)
    }

    fn fetch_many(&self, params: &FetchParams) -> Result<ObjectStream<'_, Assignment>> {
        Ok(Box::new(self.transport.list_assignments(self.course_id, params)))
    }
}

struct AssignmentGroupFetcher<'c> {
    transport: &'c CanvasClient,
    course_id: u64,
}

impl Fetch<AssignmentGroup> for AssignmentGroupFetcher<'_> {
    fn fetch_one(&self, id: u64, params: &FetchParams) -> Result<AssignmentGroup> {
        self.transport.get_assignment_group(self.course_id, id, params)
    }

    fn fetch_many(&self, params: &FetchParams) -> Result<ObjectStream<'_, AssignmentGroup>> {
        Ok(Box::new(
            self.transport.list_assignment_groups(self.course_id, params),
        ))
    }
}

struct UserFetcher<'c> {
    transport: &'c CanvasClient,
    course_id: u64,
}

impl Fetch<User> for UserFetcher<'_> {
    fn fetch_one(&self, id: u64, params: &FetchParams) -> Result<User> {
        self.transport.get_user(self.course_id, id, params)
    }

    fn fetch_many(&self, params: &FetchParams) -> Result<ObjectStream<'_, User>> {
        Ok(Box::new(self.transport.list_users(self.course_id, params)))
    }
}

struct SubmissionFetcher<'c> {
    transport: &'c CanvasClient,
    course_id: u64,
    assignment_id: u64,
}

impl Fetch<Submission> for SubmissionFetcher<'_> {
    // The id here is a user id: submission tables are keyed per user.
    fn fetch_one(&self, id: u64, params: &FetchParams) -> Result<Submission> {
        self.transport
            .get_submission(self.course_id, self.assignment_id, id, params)
    }

    fn fetch_many(&self, params: &FetchParams) -> Result<ObjectStream<'_, Submission>> {
        Ok(Box::new(
            self.transport
                .list_submissions(self.course_id, self.assignment_id, params),
        ))
    }
}

struct ModuleFetcher<'c> {
    transport: &'c CanvasClient,
    course_id: u64,
}

impl Fetch<Module> for ModuleFetcher<'_> {
    fn fetch_one(&self, id: u64, params: &FetchParams) -> Result<Module> {
        self.transport.get_module(self.course_id, id, params)
    }

    fn fetch_many(&self, params: &FetchParams) -> Result<ObjectStream<'_, Module>> {
        Ok(Box::new(self.transport.list_modules(self.course_id, params)))
    }
}

struct GroupCategoryFetcher<'c> {
    transport: &'c CanvasClient,
    course_id: u64,
}

impl Fetch<GroupCategory> for GroupCategoryFetcher<'_> {
    fn fetch_one(&self, id: u64, params: &FetchParams) -> Result<GroupCategory> {
        self.transport.get_group_category(id, params)
    }

    fn fetch_many(&self, params: &FetchParams) -> Result<ObjectStream<'_, GroupCategory>> {
        Ok(Box::new(
            self.transport.list_group_categories(self.course_id, params),
        ))
    }
}

struct CourseGroupFetcher<'c> {
    transport: &'c CanvasClient,
    course_id: u64,
}

impl Fetch<Group> for CourseGroupFetcher<'_> {
    fn fetch_one(&self, id: u64, params: &FetchParams) -> Result<Group> {
        self.transport.get_group(id, params)
    }

    fn fetch_many(&self, params: &FetchParams) -> Result<ObjectStream<'_, Group>> {
        Ok(Box::new(self.transport.list_course_groups(self.course_id, params)))
    }
}

struct CategoryGroupFetcher<'c> {
    transport: &'c CanvasClient,
    category_id: u64,
}

impl Fetch<Group> for CategoryGroupFetcher<'_> {
    fn fetch_one(&self, id: u64, params: &FetchParams) -> Result<Group> {
        self.transport.get_group(id, params)
    }

    fn fetch_many(&self, params: &FetchParams) -> Result<ObjectStream<'_, Group>> {
        Ok(Box::new(
            self.transport.list_category_groups(self.category_id, params),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_starts_with_empty_caches() {
        let transport = CanvasClient::new("https://canvas.example.edu", "token").unwrap();
        let client = CachedClient::new(transport, CacheConfig::default());

        assert!(client.course_cache().is_empty());
        assert!(client.course_cache().all_fetched().is_none());
    }

    #[test]
    fn policy_follows_configuration() {
        let transport = CanvasClient::new("https://canvas.example.edu", "token").unwrap();
        let config = CacheConfig {
            freshness_window_secs: 60,
            ..CacheConfig::default()
        };
        let client = CachedClient::new(transport, config);

        assert_eq!(client.policy.freshness_window, chrono::Duration::seconds(60));
    }

    #[test]
    fn missing_user_argument_surfaces_before_any_fetch() {
        let transport = CanvasClient::new("https://canvas.example.edu", "token").unwrap();
        let mut client = CachedClient::new(transport, CacheConfig::default());

        // Argument validation happens before the course lookup would hit the
        // network.
        let err = client
            .get_submission(1, 2, None, &FetchParams::new())
            .unwrap_err();
        assert!(matches!(
            err,
            CanvasError::MissingArgument {
                operation: "get_submission"
            }
        ));
    }
}
