use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Profile image used when none was uploaded.
pub const DEFAULT_PROFILE_IMAGE: &str = "uploads/default_profile.jpeg";

/// The role tag of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSql, FromSql)]
#[postgres(name = "entity_type")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    #[postgres(name = "student")]
    Student,
    #[postgres(name = "teacher")]
    Teacher,
}

impl Role {
    /// Parses the wire representation. Anything but `student`/`teacher` is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }
}

/// Represents a registered account (student or teacher).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// The unique identifier for the account.
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    /// Unique across all accounts, compared case-sensitively.
    pub email: String,
    pub age: Option<i32>,
    /// Argon2 PHC string. Never serialised.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// The role tag.
    #[serde(rename = "type")]
    pub role: Role,
    /// `uploads/<file>`, served under the public `/uploads` route.
    pub profile_image: String,
    /// The timestamp when the account was created.
    pub created_at: DateTime<Utc>,
}

/// The fields needed to insert a new account.
#[derive(Debug, Clone)]
pub struct NewEntity {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: Option<i32>,
    pub password_hash: String,
    pub role: Role,
    pub profile_image: Option<String>,
}

/// A partial profile update. `None` leaves the stored value untouched.
///
/// Has no role field: the role is fixed at registration.
#[derive(Debug, Clone, Default)]
pub struct EntityPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub password_hash: Option<String>,
    pub profile_image: Option<String>,
}

impl EntityPatch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.age.is_none()
            && self.password_hash.is_none()
            && self.profile_image.is_none()
    }

    /// Applies the patch in place.
    pub fn apply(self, entity: &mut Entity) {
        if let Some(first_name) = self.first_name {
            entity.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            entity.last_name = last_name;
        }
        if let Some(email) = self.email {
            entity.email = email;
        }
        if let Some(age) = self.age {
            entity.age = Some(age);
        }
        if let Some(password_hash) = self.password_hash {
            entity.password_hash = password_hash;
        }
        if let Some(profile_image) = self.profile_image {
            entity.profile_image = profile_image;
        }
    }
}

/// The public subset returned after login and embedded in course listings.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub role: Role,
    pub email: String,
}

/// Teacher details attached to course responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<&Entity> for UserSummary {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            role: entity.role,
            email: entity.email.clone(),
        }
    }
}

impl From<&Entity> for TeacherSummary {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            first_name: entity.first_name.clone(),
            last_name: entity.last_name.clone(),
            email: entity.email.clone(),
        }
    }
}
