use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

use super::{EntityRepository, StoreError, StoreResult};
use crate::models::entity::{Entity, EntityPatch, NewEntity, Role, DEFAULT_PROFILE_IMAGE};

/// A helper function to map a `tokio_postgres::Row` to an `Entity`.
fn row_to_entity(row: &Row) -> StoreResult<Entity> {
    Ok(Entity {
        id: row.try_get("id").map_err(|_| StoreError::MissingData("id".to_string()))?,
        first_name: row.try_get("first_name").map_err(|_| StoreError::MissingData("first_name".to_string()))?,
        last_name: row.try_get("last_name").map_err(|_| StoreError::MissingData("last_name".to_string()))?,
        email: row.try_get("email").map_err(|_| StoreError::MissingData("email".to_string()))?,
        age: row.try_get("age").map_err(|_| StoreError::MissingData("age".to_string()))?,
        password_hash: row.try_get("password").map_err(|_| StoreError::MissingData("password".to_string()))?,
        role: row.try_get("entity_type").map_err(|_| StoreError::MissingData("entity_type".to_string()))?,
        profile_image: row.try_get("profile_image").map_err(|_| StoreError::MissingData("profile_image".to_string()))?,
        created_at: row.try_get("created_at").map_err(|_| StoreError::MissingData("created_at".to_string()))?,
    })
}

/// Postgres-backed identity directory.
#[derive(Clone)]
pub struct PgEntityRepository {
    pool: Pool,
}

impl PgEntityRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityRepository for PgEntityRepository {
    async fn create(&self, entity: NewEntity) -> StoreResult<Entity> {
        let client = self.pool.get().await?;
        let id = Uuid::new_v4();
        let profile_image = entity
            .profile_image
            .unwrap_or_else(|| DEFAULT_PROFILE_IMAGE.to_string());
        let row = client
            .query_one(
                r#"
                    INSERT INTO entities
                        (id, first_name, last_name, email, age, password, entity_type, profile_image, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    RETURNING id, first_name, last_name, email, age, password, entity_type, profile_image, created_at
                    "#,
                &[
                    &id,
                    &entity.first_name,
                    &entity.last_name,
                    &entity.email,
                    &entity.age,
                    &entity.password_hash,
                    &entity.role,
                    &profile_image,
                    &Utc::now(),
                ],
            )
            .await?;
        row_to_entity(&row)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Entity>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, first_name, last_name, email, age, password, entity_type, profile_image, created_at FROM entities WHERE email = $1",
                &[&email],
            )
            .await?;
        row.map(|r| row_to_entity(&r)).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Entity>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, first_name, last_name, email, age, password, entity_type, profile_image, created_at FROM entities WHERE id = $1",
                &[&id],
            )
            .await?;
        row.map(|r| row_to_entity(&r)).transpose()
    }

    async fn update(&self, id: Uuid, patch: EntityPatch) -> StoreResult<Option<Entity>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                    UPDATE entities
                    SET
                        first_name = COALESCE($2, first_name),
                        last_name = COALESCE($3, last_name),
                        email = COALESCE($4, email),
                        age = COALESCE($5, age),
                        password = COALESCE($6, password),
                        profile_image = COALESCE($7, profile_image)
                    WHERE id = $1
                    RETURNING id, first_name, last_name, email, age, password, entity_type, profile_image, created_at
                    "#,
                &[
                    &id,
                    &patch.first_name,
                    &patch.last_name,
                    &patch.email,
                    &patch.age,
                    &patch.password_hash,
                    &patch.profile_image,
                ],
            )
            .await?;
        row.map(|r| row_to_entity(&r)).transpose()
    }

    async fn list_by_role(&self, role: Role) -> StoreResult<Vec<Entity>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, first_name, last_name, email, age, password, entity_type, profile_image, created_at FROM entities WHERE entity_type = $1 ORDER BY created_at ASC",
                &[&role],
            )
            .await?;
        rows.iter().map(row_to_entity).collect()
    }
}
