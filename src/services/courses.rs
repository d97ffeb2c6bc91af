use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    claims::Claims,
    course::{Course, CoursePatch, CourseView},
    entity::TeacherSummary,
};
use crate::policy::{self, Action, Denial};
use crate::state::AppState;
use crate::upload::{remove_stored, settle, Submission};
use crate::validation::course::{validate_course_changes, validate_new_course};

/// Which course operation a role check guards. Each has its own refusal message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseOperation {
    Create,
    ListOwn,
    Update,
    Delete,
}

impl CourseOperation {
    fn not_teacher(self) -> &'static str {
        match self {
            CourseOperation::Create => "Only teachers can create courses",
            CourseOperation::ListOwn => "Only teachers can access this endpoint",
            CourseOperation::Update => "Only teachers can update courses",
            CourseOperation::Delete => "Only teachers can delete courses",
        }
    }

    fn not_owner(self) -> &'static str {
        match self {
            CourseOperation::Delete => "You can only delete your own courses",
            _ => "You can only update your own courses",
        }
    }

    fn deny(self, denial: Denial) -> AppError {
        match denial {
            Denial::NotOwner => AppError::Forbidden(self.not_owner().to_string()),
            Denial::NotTeacher | Denial::NotSelf => {
                AppError::Forbidden(self.not_teacher().to_string())
            }
        }
    }
}

/// Role gate for course operations.
///
/// Handlers call this before reading the request body so nothing is
/// staged on disk for callers who could never succeed.
pub fn require_teacher(claims: &Claims, operation: CourseOperation) -> Result<()> {
    let action = match operation {
        CourseOperation::Create => Action::CreateCourse,
        CourseOperation::ListOwn => Action::ListOwnCourses,
        CourseOperation::Update | CourseOperation::Delete => Action::ManageCourses,
    };
    policy::authorize(claims, action).or_else(|d| operation.deny(d))
}

fn parse_course_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Course not found".to_string()))
}

async fn load_course(state: &AppState, id: Uuid) -> Result<Course> {
    state
        .courses
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))
}

/// Attaches teacher summaries, looking each teacher up once.
async fn with_teachers(state: &AppState, courses: Vec<Course>) -> Result<Vec<CourseView>> {
    let mut teachers: HashMap<Uuid, Option<TeacherSummary>> = HashMap::new();
    let mut views = Vec::with_capacity(courses.len());

    for course in courses {
        if !teachers.contains_key(&course.teacher_id) {
            let summary = state
                .entities
                .find_by_id(course.teacher_id)
                .await?
                .map(|teacher| TeacherSummary::from(&teacher));
            teachers.insert(course.teacher_id, summary);
        }
        let teacher = teachers.get(&course.teacher_id).cloned().flatten();
        views.push(CourseView::new(course, teacher));
    }

    Ok(views)
}

async fn with_teacher(state: &AppState, course: Course) -> Result<CourseView> {
    let mut views = with_teachers(state, vec![course]).await?;
    views
        .pop()
        .ok_or_else(|| AppError::Internal("course view missing".to_string()))
}

/// Creates a course owned by the caller.
///
/// The caller has already passed [`require_teacher`] for
/// [`CourseOperation::Create`]; the handler runs it before the body is read.
///
/// # Returns
///
/// The created course and the public URL of its image, if one was uploaded.
pub async fn create_course(
    state: &AppState,
    claims: &Claims,
    submission: Submission,
) -> Result<(CourseView, Option<String>)> {
    let Submission { fields, file } = submission;
    let image_url = file.as_ref().map(|f| f.public_url());
    if let Some(f) = file.as_ref() {
        tracing::debug!(
            "📎 Course image {} ({}, {} bytes)",
            f.file_name(),
            f.content_type(),
            f.size()
        );
    }

    let outcome: Result<Course> = async {
        let (title, description) =
            validate_new_course(fields.get("title"), fields.get("description"))?;

        let now = Utc::now();
        let course = Course {
            id: Uuid::new_v4(),
            title,
            description,
            image: file.as_ref().map(|f| f.stored_path()),
            teacher_id: claims.sub,
            created_at: now,
            updated_at: now,
        };

        Ok(state.courses.create(course).await?)
    }
    .await;

    let course = settle(file, outcome).await?;
    tracing::info!("✅ Course created: {} by {}", course.id, claims.sub);

    Ok((with_teacher(state, course).await?, image_url))
}

/// Lists every course, newest first. Public.
pub async fn list_courses(state: &AppState) -> Result<Vec<CourseView>> {
    let courses = state.courses.list_all().await?;
    with_teachers(state, courses).await
}

/// Lists the caller's own courses, newest first.
pub async fn list_my_courses(state: &AppState, claims: &Claims) -> Result<Vec<CourseView>> {
    require_teacher(claims, CourseOperation::ListOwn)?;

    let courses = state.courses.list_by_teacher(claims.sub).await?;
    with_teachers(state, courses).await
}

/// Applies a partial update to a course the caller owns.
///
/// Runs after the handler's [`require_teacher`] gate, then checks input,
/// existence (404), ownership (403) and persists, in that order. Blank
/// fields are ignored. A staged image replaces the previous one, which is
/// then removed from disk; on any failure the staged image is discarded.
pub async fn update_course(
    state: &AppState,
    claims: &Claims,
    course_id: &str,
    submission: Submission,
) -> Result<CourseView> {
    let Submission { fields, file } = submission;

    let outcome: Result<(Course, Option<String>)> = async {
        let (title, description) =
            validate_course_changes(fields.get("title"), fields.get("description"))?;

        let id = parse_course_id(course_id)?;
        let course = load_course(state, id).await?;
        policy::authorize(claims, Action::UpdateCourse(&course))
            .or_else(|d| CourseOperation::Update.deny(d))?;

        let patch = CoursePatch {
            title,
            description,
            image: file.as_ref().map(|f| f.stored_path()),
        };
        let replaced_image = match (&patch.image, &course.image) {
            (Some(new), Some(old)) if new != old => Some(old.clone()),
            _ => None,
        };

        let updated = state
            .courses
            .update(id, patch, Utc::now())
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

        Ok((updated, replaced_image))
    }
    .await;

    let (course, replaced_image) = settle(file, outcome).await?;

    if let Some(old) = replaced_image {
        remove_stored(&state.course_uploads.dir, &old).await;
    }

    tracing::info!("✅ Course updated: {}", course.id);
    with_teacher(state, course).await
}

/// Deletes a course the caller owns, then removes its image from disk.
pub async fn delete_course(state: &AppState, claims: &Claims, course_id: &str) -> Result<()> {
    require_teacher(claims, CourseOperation::Delete)?;

    let id = parse_course_id(course_id)?;
    let course = load_course(state, id).await?;
    policy::authorize(claims, Action::DeleteCourse(&course))
        .or_else(|d| CourseOperation::Delete.deny(d))?;

    if !state.courses.delete(id).await? {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    if let Some(image) = course.image.as_deref() {
        remove_stored(&state.course_uploads.dir, image).await;
    }

    tracing::info!("🗑️ Course deleted: {} by {}", id, claims.sub);
    Ok(())
}
