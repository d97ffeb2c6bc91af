use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

use super::{CourseRepository, StoreResult};
use crate::models::course::{Course, CoursePatch};

impl From<&Row> for Course {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            title: row.get("title"),
            description: row.get("description"),
            image: row.get("image"),
            teacher_id: row.get("teacher_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// Postgres-backed course store.
#[derive(Clone)]
pub struct PgCourseRepository {
    pool: Pool,
}

impl PgCourseRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CourseRepository for PgCourseRepository {
    async fn create(&self, course: Course) -> StoreResult<Course> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                r#"
                    INSERT INTO courses (id, title, description, image, teacher_id, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    RETURNING id, title, description, image, teacher_id, created_at, updated_at
                    "#,
                &[
                    &course.id,
                    &course.title,
                    &course.description,
                    &course.image,
                    &course.teacher_id,
                    &course.created_at,
                    &course.updated_at,
                ],
            )
            .await?;
        Ok(Course::from(&row))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Course>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, title, description, image, teacher_id, created_at, updated_at FROM courses WHERE id = $1",
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(Course::from))
    }

    async fn list_all(&self) -> StoreResult<Vec<Course>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, title, description, image, teacher_id, created_at, updated_at FROM courses ORDER BY created_at DESC",
                &[],
            )
            .await?;
        Ok(rows.iter().map(Course::from).collect())
    }

    async fn list_by_teacher(&self, teacher_id: Uuid) -> StoreResult<Vec<Course>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, title, description, image, teacher_id, created_at, updated_at FROM courses WHERE teacher_id = $1 ORDER BY created_at DESC",
                &[&teacher_id],
            )
            .await?;
        Ok(rows.iter().map(Course::from).collect())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: CoursePatch,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<Course>> {
        let client = self.pool.get().await?;
        // GREATEST keeps updated_at >= created_at even under clock skew.
        let row = client
            .query_opt(
                r#"
                    UPDATE courses
                    SET
                        title = COALESCE($2, title),
                        description = COALESCE($3, description),
                        image = COALESCE($4, image),
                        updated_at = GREATEST($5, created_at)
                    WHERE id = $1
                    RETURNING id, title, description, image, teacher_id, created_at, updated_at
                    "#,
                &[&id, &patch.title, &patch.description, &patch.image, &updated_at],
            )
            .await?;
        Ok(row.as_ref().map(Course::from))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM courses WHERE id = $1", &[&id])
            .await?;
        Ok(deleted > 0)
    }
}
