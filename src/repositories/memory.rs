//! In-process adapters for the storage ports.
//!
//! Same observable semantics as the Postgres adapters (unique email,
//! newest-first listings, atomic partial updates). Used by the test suites
//! and by embedders that do not need durability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CourseRepository, EntityRepository, StoreError, StoreResult};
use crate::models::{
    course::{Course, CoursePatch},
    entity::{Entity, EntityPatch, NewEntity, Role, DEFAULT_PROFILE_IMAGE},
};

#[derive(Default)]
pub struct MemoryEntityRepository {
    entities: RwLock<HashMap<Uuid, Entity>>,
}

impl MemoryEntityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityRepository for MemoryEntityRepository {
    async fn create(&self, entity: NewEntity) -> StoreResult<Entity> {
        let mut entities = self.entities.write().await;
        if entities.values().any(|e| e.email == entity.email) {
            return Err(StoreError::Conflict("entities_email_key".to_string()));
        }

        let created = Entity {
            id: Uuid::new_v4(),
            first_name: entity.first_name,
            last_name: entity.last_name,
            email: entity.email,
            age: entity.age,
            password_hash: entity.password_hash,
            role: entity.role,
            profile_image: entity
                .profile_image
                .unwrap_or_else(|| DEFAULT_PROFILE_IMAGE.to_string()),
            created_at: Utc::now(),
        };
        entities.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Entity>> {
        let entities = self.entities.read().await;
        Ok(entities.values().find(|e| e.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Entity>> {
        Ok(self.entities.read().await.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, patch: EntityPatch) -> StoreResult<Option<Entity>> {
        let mut entities = self.entities.write().await;

        if let Some(email) = patch.email.as_deref() {
            if entities.values().any(|e| e.id != id && e.email == email) {
                return Err(StoreError::Conflict("entities_email_key".to_string()));
            }
        }

        Ok(entities.get_mut(&id).map(|entity| {
            patch.apply(entity);
            entity.clone()
        }))
    }

    async fn list_by_role(&self, role: Role) -> StoreResult<Vec<Entity>> {
        let entities = self.entities.read().await;
        let mut matching: Vec<Entity> = entities
            .values()
            .filter(|e| e.role == role)
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.created_at);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct MemoryCourseRepository {
    courses: RwLock<HashMap<Uuid, Course>>,
}

impl MemoryCourseRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut courses: Vec<Course>) -> Vec<Course> {
    courses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    courses
}

#[async_trait]
impl CourseRepository for MemoryCourseRepository {
    async fn create(&self, course: Course) -> StoreResult<Course> {
        let mut courses = self.courses.write().await;
        if courses.contains_key(&course.id) {
            return Err(StoreError::Conflict("courses_pkey".to_string()));
        }
        courses.insert(course.id, course.clone());
        Ok(course)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Course>> {
        Ok(self.courses.read().await.get(&id).cloned())
    }

    async fn list_all(&self) -> StoreResult<Vec<Course>> {
        let courses = self.courses.read().await;
        Ok(newest_first(courses.values().cloned().collect()))
    }

    async fn list_by_teacher(&self, teacher_id: Uuid) -> StoreResult<Vec<Course>> {
        let courses = self.courses.read().await;
        Ok(newest_first(
            courses
                .values()
                .filter(|c| c.teacher_id == teacher_id)
                .cloned()
                .collect(),
        ))
    }

    async fn update(
        &self,
        id: Uuid,
        patch: CoursePatch,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<Course>> {
        let mut courses = self.courses.write().await;
        Ok(courses.get_mut(&id).map(|course| {
            patch.apply(course, updated_at);
            course.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.courses.write().await.remove(&id).is_some())
    }
}
