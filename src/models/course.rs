use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::entity::TeacherSummary;

/// Represents a course authored by a teacher.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    /// The unique identifier for the course.
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Path of the course image under the upload directory, if any.
    pub image: Option<String>,
    /// The owning teacher. Fixed at creation.
    pub teacher_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    /// Pre-persist hook: refreshes `updated_at` without letting it fall behind `created_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }
}

/// A partial course update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct CoursePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl CoursePatch {
    /// Applies the patch and runs the pre-persist hook.
    pub fn apply(self, course: &mut Course, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            course.title = title;
        }
        if let Some(description) = self.description {
            course.description = description;
        }
        if let Some(image) = self.image {
            course.image = Some(image);
        }
        course.touch(now);
    }
}

/// A course as returned by the API, with its teacher populated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub teacher_id: Uuid,
    pub teacher: Option<TeacherSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseView {
    pub fn new(course: Course, teacher: Option<TeacherSummary>) -> Self {
        Self {
            id: course.id,
            title: course.title,
            description: course.description,
            image: course.image,
            teacher_id: course.teacher_id,
            teacher,
            created_at: course.created_at,
            updated_at: course.updated_at,
        }
    }
}
