//! Storage ports for accounts and courses.
//!
//! The Postgres adapters live in [`entity`] and [`course`]; [`memory`]
//! holds in-process adapters with the same semantics.

use async_trait::async_trait;
use thiserror::Error;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

use crate::models::{
    course::{Course, CoursePatch},
    entity::{Entity, EntityPatch, NewEntity, Role},
};

pub mod course;
pub mod entity;
pub mod memory;

/// Typed failures returned by every storage adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique constraint was violated. Carries the constraint or field name.
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    /// A database error.
    #[error("database error: {0}")]
    Database(#[source] tokio_postgres::Error),

    /// No pooled connection could be obtained.
    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A row did not have the expected shape.
    #[error("missing column: {0}")]
    MissingData(String),

    /// The backing store is not reachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            let constraint = err
                .as_db_error()
                .and_then(|db| db.constraint())
                .unwrap_or("unique")
                .to_string();
            return StoreError::Conflict(constraint);
        }
        StoreError::Database(err)
    }
}

/// A `Result` type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The identity directory.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Inserts a new account. Duplicate emails fail with [`StoreError::Conflict`].
    async fn create(&self, entity: NewEntity) -> StoreResult<Entity>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Entity>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Entity>>;

    /// Applies a partial update atomically and returns the new row, or `None`
    /// when no account has this id.
    async fn update(&self, id: Uuid, patch: EntityPatch) -> StoreResult<Option<Entity>>;

    async fn list_by_role(&self, role: Role) -> StoreResult<Vec<Entity>>;
}

/// The course store.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn create(&self, course: Course) -> StoreResult<Course>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Course>>;

    /// All courses, newest first.
    async fn list_all(&self) -> StoreResult<Vec<Course>>;

    /// A teacher's courses, newest first.
    async fn list_by_teacher(&self, teacher_id: Uuid) -> StoreResult<Vec<Course>>;

    /// Applies a partial update atomically. `updated_at` is the value
    /// produced by the pre-persist hook.
    async fn update(
        &self,
        id: Uuid,
        patch: CoursePatch,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> StoreResult<Option<Course>>;

    /// Removes a course. Returns whether a row was deleted.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}
