//! Authorization rules for every protected action.
//!
//! `authorize` is a pure function of the caller's claims and the target;
//! it never touches storage. Orchestrators load the target first (so a
//! missing course is a 404, not a 403) and then ask for a decision.

use uuid::Uuid;

use crate::models::{claims::Claims, course::Course};

/// An action a caller wants to perform.
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    /// Read the profile of the given account.
    ReadProfile(Uuid),
    /// Update the profile of the given account.
    UpdateProfile(Uuid),
    ListStudents,
    CreateCourse,
    ListOwnCourses,
    /// Role gate for course mutation, checked before the course is loaded.
    ManageCourses,
    UpdateCourse(&'a Course),
    DeleteCourse(&'a Course),
}

/// Why an action was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// The target account is not the caller.
    NotSelf,
    /// The caller is not a teacher.
    NotTeacher,
    /// The caller is a teacher but does not own the course.
    NotOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    /// Turns a denial into the caller-chosen error.
    pub fn or_else<E>(self, on_deny: impl FnOnce(Denial) -> E) -> Result<(), E> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(denial) => Err(on_deny(denial)),
        }
    }
}

/// Decides whether `actor` may perform `action`.
///
/// Registration and the public course reads need no decision and never
/// reach this function.
pub fn authorize(actor: &Claims, action: Action<'_>) -> Decision {
    match action {
        Action::ReadProfile(target) | Action::UpdateProfile(target) => {
            if actor.sub == target {
                Decision::Allow
            } else {
                Decision::Deny(Denial::NotSelf)
            }
        }
        Action::ListStudents
        | Action::CreateCourse
        | Action::ListOwnCourses
        | Action::ManageCourses => teacher_only(actor),
        Action::UpdateCourse(course) | Action::DeleteCourse(course) => {
            if !actor.is_teacher() {
                Decision::Deny(Denial::NotTeacher)
            } else if course.teacher_id != actor.sub {
                Decision::Deny(Denial::NotOwner)
            } else {
                Decision::Allow
            }
        }
    }
}

fn teacher_only(actor: &Claims) -> Decision {
    if actor.is_teacher() {
        Decision::Allow
    } else {
        Decision::Deny(Denial::NotTeacher)
    }
}
