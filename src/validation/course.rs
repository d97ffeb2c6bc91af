use crate::error::{AppError, Result};

/// Minimum title length, counted after trimming.
pub const TITLE_MIN_CHARS: usize = 3;
/// Minimum description length, counted after trimming.
pub const DESCRIPTION_MIN_CHARS: usize = 10;

/// Validates a course title and returns it trimmed.
pub fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.chars().count() < TITLE_MIN_CHARS {
        return Err(AppError::Validation(
            "Title must be at least 3 characters long".to_string(),
        ));
    }
    Ok(title.to_string())
}

/// Validates a course description and returns it trimmed.
pub fn validate_description(description: &str) -> Result<String> {
    let description = description.trim();
    if description.chars().count() < DESCRIPTION_MIN_CHARS {
        return Err(AppError::Validation(
            "Description must be at least 10 characters long".to_string(),
        ));
    }
    Ok(description.to_string())
}

/// Validates the fields of a new course. Both are required.
///
/// # Returns
///
/// The trimmed `(title, description)` pair.
pub fn validate_new_course(
    title: Option<&str>,
    description: Option<&str>,
) -> Result<(String, String)> {
    let (Some(title), Some(description)) = (
        title.filter(|t| !t.is_empty()),
        description.filter(|d| !d.is_empty()),
    ) else {
        return Err(AppError::Validation(
            "Title and description are required".to_string(),
        ));
    };

    Ok((validate_title(title)?, validate_description(description)?))
}

/// Validates the fields of a course update. Blank values leave the stored
/// value untouched; present values obey the same rules as on creation.
pub fn validate_course_changes(
    title: Option<&str>,
    description: Option<&str>,
) -> Result<(Option<String>, Option<String>)> {
    let title = title
        .filter(|t| !t.trim().is_empty())
        .map(validate_title)
        .transpose()?;
    let description = description
        .filter(|d| !d.trim().is_empty())
        .map(validate_description)
        .transpose()?;
    Ok((title, description))
}
