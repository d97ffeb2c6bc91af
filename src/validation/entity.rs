use garde::Validate;

use crate::error::{AppError, Result};
use crate::models::entity::Role;
use crate::upload::FormFields;

/// A registration form after parsing, before hashing.
#[derive(Debug, Validate)]
pub struct Registration {
    #[garde(length(chars, max = 100))]
    pub first_name: String,
    #[garde(length(chars, max = 100))]
    pub last_name: String,
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 8, max = 128))]
    pub password: String,
    #[garde(range(min = 0, max = 150))]
    pub age: Option<i32>,
    #[garde(skip)]
    pub role: Role,
}

/// The self-service profile changes a caller asked for.
#[derive(Debug, Default, Validate)]
pub struct ProfileChanges {
    #[garde(length(chars, min = 1, max = 100))]
    pub first_name: Option<String>,
    #[garde(length(chars, min = 1, max = 100))]
    pub last_name: Option<String>,
    #[garde(email)]
    pub email: Option<String>,
    #[garde(length(min = 8, max = 128))]
    pub password: Option<String>,
    #[garde(range(min = 0, max = 150))]
    pub age: Option<i32>,
}

/// Parses the role tag. Absent means student; anything but
/// `student`/`teacher` is an error, never coerced.
pub fn parse_role(value: Option<&str>) -> Result<Role> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(Role::default()),
        Some(tag) => {
            Role::parse(tag).ok_or_else(|| AppError::Validation("Invalid entity type".to_string()))
        }
    }
}

fn parse_age(value: Option<&str>) -> Result<Option<i32>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i32>()
            .map(Some)
            .map_err(|_| AppError::Validation("Invalid entity data".to_string())),
    }
}

fn invalid(report: garde::Report) -> AppError {
    tracing::debug!("Entity validation failed: {}", report);
    AppError::Validation("Invalid entity data".to_string())
}

/// Builds and validates a [`Registration`] from submitted fields.
///
/// Email and password are required; names and age are optional.
pub fn validate_registration(fields: &FormFields) -> Result<Registration> {
    let role = parse_role(fields.get("type"))?;

    let (Some(email), Some(password)) = (fields.non_blank("email"), fields.get("password")) else {
        return Err(AppError::Validation("Invalid entity data".to_string()));
    };

    let registration = Registration {
        first_name: fields.non_blank("firstName").unwrap_or_default().to_string(),
        last_name: fields.non_blank("lastName").unwrap_or_default().to_string(),
        email: email.to_string(),
        password: password.to_string(),
        age: parse_age(fields.get("age"))?,
        role,
    };

    registration.validate().map_err(invalid)?;
    Ok(registration)
}

/// Builds and validates [`ProfileChanges`] from submitted fields.
///
/// A `type` field is refused outright: the role is fixed at registration.
/// Blank values count as absent.
pub fn validate_profile_changes(fields: &FormFields) -> Result<ProfileChanges> {
    if fields.contains("type") {
        return Err(AppError::Validation(
            "Entity type cannot be changed".to_string(),
        ));
    }

    let changes = ProfileChanges {
        first_name: fields.non_blank("firstName").map(str::to_string),
        last_name: fields.non_blank("lastName").map(str::to_string),
        email: fields.non_blank("email").map(str::to_string),
        password: fields
            .get("password")
            .filter(|p| !p.is_empty())
            .map(str::to_string),
        age: parse_age(fields.get("age"))?,
    };

    changes.validate().map_err(invalid)?;
    Ok(changes)
}
