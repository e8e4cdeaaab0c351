//! Domain records for students, instructors and courses.
//!
//! # Responsibility
//! - Define the record shapes handed across the data-manager boundary.
//! - Normalize and validate user input before any backend stores it.
//!
//! # Invariants
//! - Person IDs are stored trimmed; course IDs trimmed and upper-cased.
//! - Relationship lists on records are derived views, never stored state.
//! - Records are owned values; mutating one never touches persisted data.

use crate::validate::{
    email_problem, validate_course_id, validate_course_name, validate_id, validate_name,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod course;
pub mod instructor;
pub mod person;
pub mod student;

/// Validation failure for a single record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    InvalidName(String),
    InvalidAge(i64),
    InvalidEmail {
        value: String,
        reason: Option<&'static str>,
    },
    InvalidPersonId(String),
    InvalidCourseId(String),
    InvalidCourseName(String),
    /// Course instructor reference is not shaped like an instructor ID.
    InvalidInstructorRef(String),
}

impl ValidationError {
    /// Returns the record field this error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidName(_) => "name",
            Self::InvalidAge(_) => "age",
            Self::InvalidEmail { .. } => "email",
            Self::InvalidPersonId(_) => "id",
            Self::InvalidCourseId(_) => "course_id",
            Self::InvalidCourseName(_) => "course_name",
            Self::InvalidInstructorRef(_) => "instructor_id",
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(value) => write!(f, "invalid name `{value}`"),
            Self::InvalidAge(value) => write!(f, "invalid age {value}; expected 0 to 120"),
            Self::InvalidEmail { value, reason } => match reason {
                Some(reason) => write!(f, "invalid email address `{value}`: {reason}"),
                None => write!(f, "invalid email address `{value}`"),
            },
            Self::InvalidPersonId(value) => {
                write!(f, "invalid ID `{value}`; expected exactly 9 digits")
            }
            Self::InvalidCourseId(value) => write!(
                f,
                "invalid course ID `{value}`; expected 4 letters, 3 digits and an optional letter"
            ),
            Self::InvalidCourseName(value) => write!(f, "invalid course name `{value}`"),
            Self::InvalidInstructorRef(value) => {
                write!(f, "invalid instructor reference `{value}`")
            }
        }
    }
}

impl Error for ValidationError {}

/// Lookup key for a student or instructor ID as typed by a user.
pub fn person_key(id: &str) -> String {
    id.trim().to_string()
}

/// Lookup key for a course ID as typed by a user.
pub fn course_key(id: &str) -> String {
    id.trim().to_ascii_uppercase()
}

pub(crate) fn normalize_person_id(id: &str) -> Result<String, ValidationError> {
    if !validate_id(id) {
        return Err(ValidationError::InvalidPersonId(id.to_string()));
    }
    Ok(person_key(id))
}

pub(crate) fn normalize_course_id(id: &str) -> Result<String, ValidationError> {
    if !validate_course_id(id) {
        return Err(ValidationError::InvalidCourseId(id.to_string()));
    }
    Ok(course_key(id))
}

pub(crate) fn normalize_name(name: &str) -> Result<String, ValidationError> {
    if !validate_name(name) {
        return Err(ValidationError::InvalidName(name.to_string()));
    }
    Ok(name.trim().to_string())
}

pub(crate) fn normalize_course_name(name: &str) -> Result<String, ValidationError> {
    if !validate_course_name(name) {
        return Err(ValidationError::InvalidCourseName(name.to_string()));
    }
    Ok(name.trim().to_string())
}

/// Blank input means "no email".
pub(crate) fn normalize_email(email: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(raw) = email else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Some(reason) = email_problem(trimmed) {
        return Err(ValidationError::InvalidEmail {
            value: raw.to_string(),
            reason: Some(reason),
        });
    }
    Ok(Some(trimmed.to_string()))
}

/// Blank input means "no instructor".
pub(crate) fn normalize_instructor_ref(
    instructor_id: Option<&str>,
) -> Result<Option<String>, ValidationError> {
    match instructor_id.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if validate_id(value) => Ok(Some(value.to_string())),
        Some(value) => Err(ValidationError::InvalidInstructorRef(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_ids_are_upper_cased() {
        assert_eq!(normalize_course_id(" eece435l ").unwrap(), "EECE435L");
        assert_eq!(course_key(" math201"), "MATH201");
    }

    #[test]
    fn blank_email_and_instructor_mean_none() {
        assert_eq!(normalize_email(Some("   ")).unwrap(), None);
        assert_eq!(normalize_email(None).unwrap(), None);
        assert_eq!(normalize_instructor_ref(Some("")).unwrap(), None);
    }

    #[test]
    fn invalid_email_carries_reason() {
        let err = normalize_email(Some("not-an-email")).unwrap_err();
        assert_eq!(err.field(), "email");
        assert!(err.to_string().contains("@-sign"));
    }

    #[test]
    fn instructor_ref_must_look_like_an_id() {
        let err = normalize_instructor_ref(Some("prof")).unwrap_err();
        assert_eq!(err, ValidationError::InvalidInstructorRef("prof".to_string()));
    }
}
