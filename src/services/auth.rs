use crate::crypto::password::{hash_password_async, verify_password_async};
use crate::error::{AppError, Result};
use crate::models::entity::{Entity, NewEntity};
use crate::repositories::StoreError;
use crate::state::AppState;
use crate::upload::{settle, Submission};
use crate::validation::entity::validate_registration;

/// Registers a new account.
///
/// The staged profile image, if any, becomes the account's profile image.
/// When registration fails for any reason the staged file is deleted.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `submission` - The parsed registration form.
///
/// # Returns
///
/// A `Result` containing the created `Entity`.
pub async fn register(state: &AppState, submission: Submission) -> Result<Entity> {
    let Submission { fields, file } = submission;

    let outcome: Result<Entity> = async {
        let registration = validate_registration(&fields)?;
        tracing::debug!("🔐 Creating entity: {}", registration.email);

        let password_hash = hash_password_async(registration.password).await?;

        state
            .entities
            .create(NewEntity {
                first_name: registration.first_name,
                last_name: registration.last_name,
                email: registration.email,
                age: registration.age,
                password_hash,
                role: registration.role,
                profile_image: file.as_ref().map(|f| f.stored_path()),
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AppError::Conflict("email already exists".to_string()),
                other => AppError::Store(other),
            })
    }
    .await;

    let entity = settle(file, outcome).await?;
    tracing::info!("✅ Entity registered: {} ({})", entity.id, entity.role.as_str());
    Ok(entity)
}

/// Checks credentials and issues a session token.
///
/// Unknown email and wrong password produce the same error.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `email` - The submitted email.
/// * `password` - The submitted password.
///
/// # Returns
///
/// A `Result` containing the token and the authenticated `Entity`.
pub async fn authenticate(
    state: &AppState,
    email: &str,
    password: String,
) -> Result<(String, Entity)> {
    let entity = state.entities.find_by_email(email).await?.ok_or_else(|| {
        tracing::debug!("Login for unknown email");
        AppError::InvalidCredentials
    })?;

    let valid = verify_password_async(password, entity.password_hash.clone())
        .await
        .map_err(|e| {
            tracing::error!("❌ Stored hash for {} is unusable: {}", entity.id, e);
            AppError::InvalidCredentials
        })?;

    if !valid {
        tracing::debug!("Wrong password for entity: {}", entity.id);
        return Err(AppError::InvalidCredentials);
    }

    let token = state
        .tokens
        .issue(&entity)
        .map_err(|e| AppError::Crypto(e.to_string()))?;

    tracing::info!("✅ Entity authenticated: {}", entity.id);
    Ok((token, entity))
}
