use crate::crypto::password::hash_password_async;
use crate::error::{AppError, Result};
use crate::models::{
    claims::Claims,
    entity::{Entity, EntityPatch, Role},
};
use crate::policy::{self, Action, Denial};
use crate::repositories::StoreError;
use crate::state::AppState;
use crate::upload::{remove_stored, settle, Submission};
use crate::validation::entity::validate_profile_changes;

fn profile_denial(_: Denial) -> AppError {
    AppError::Forbidden("You can only access your own profile".to_string())
}

fn entity_lookup(source: StoreError) -> AppError {
    AppError::AccountLookup {
        message: "Entity not found",
        source,
    }
}

/// Loads the caller's own profile.
pub async fn get_profile(state: &AppState, claims: &Claims) -> Result<Entity> {
    policy::authorize(claims, Action::ReadProfile(claims.sub)).or_else(profile_denial)?;

    state
        .entities
        .find_by_id(claims.sub)
        .await
        .map_err(entity_lookup)?
        .ok_or(AppError::EntityNotFound)
}

/// Applies a self-service profile update.
///
/// A new password is re-hashed, the role can never change, and a staged
/// profile image replaces the previous one (which is then removed from
/// disk unless it is the shared default). On failure the staged image is
/// discarded.
pub async fn update_profile(
    state: &AppState,
    claims: &Claims,
    submission: Submission,
) -> Result<Entity> {
    let Submission { fields, file } = submission;

    let outcome: Result<(Entity, Option<String>)> = async {
        policy::authorize(claims, Action::UpdateProfile(claims.sub))
            .or_else(profile_denial)?;

        let changes = validate_profile_changes(&fields)?;

        let password_hash = match changes.password {
            Some(password) => Some(hash_password_async(password).await?),
            None => None,
        };

        let patch = EntityPatch {
            first_name: changes.first_name,
            last_name: changes.last_name,
            email: changes.email,
            age: changes.age,
            password_hash,
            profile_image: file.as_ref().map(|f| f.stored_path()),
        };

        let current = state
            .entities
            .find_by_id(claims.sub)
            .await
            .map_err(entity_lookup)?
            .ok_or(AppError::EntityNotFound)?;

        if patch.is_empty() {
            return Ok((current, None));
        }

        let replaced_image = patch
            .profile_image
            .as_ref()
            .filter(|new| **new != current.profile_image)
            .map(|_| current.profile_image.clone());

        let updated = state
            .entities
            .update(claims.sub, patch)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AppError::Conflict("email already exists".to_string()),
                other => entity_lookup(other),
            })?
            .ok_or(AppError::EntityNotFound)?;

        Ok((updated, replaced_image))
    }
    .await;

    let (entity, replaced_image) = settle(file, outcome).await?;

    if let Some(old) = replaced_image {
        remove_stored(&state.profile_uploads.dir, &old).await;
    }

    tracing::info!("✅ Profile updated: {}", entity.id);
    Ok(entity)
}

/// Lists every student. Teachers only; anyone else gets a 401.
///
/// Store failures here and on the profile endpoints answer 400, not 500.
pub async fn list_students(state: &AppState, claims: &Claims) -> Result<Vec<Entity>> {
    policy::authorize(claims, Action::ListStudents)
        .or_else(|_| AppError::Unauthorized("unauthorized".to_string()))?;

    let students = state
        .entities
        .list_by_role(Role::Student)
        .await
        .map_err(|source| AppError::AccountLookup {
            message: "Students not found",
            source,
        })?;
    tracing::debug!("📋 Listed {} students for {}", students.len(), claims.sub);
    Ok(students)
}
