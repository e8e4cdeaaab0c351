//! Shared person attributes for students and instructors.
//!
//! `Person` is a capability trait, never a stored record. Students and
//! instructors carry the same validated fields and differ only in their ID
//! namespace and derived course list.

use super::{normalize_email, normalize_name, normalize_person_id, ValidationError};
use crate::validate::validate_age;
use serde::{Deserialize, Serialize};

/// Read access to the attributes every person record has.
pub trait Person {
    /// Entity-scoped identifier (`student_id` or `instructor_id`).
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn age(&self) -> u8;
    fn email(&self) -> Option<&str>;
}

/// Validated person attributes, as every backend stores them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonFields {
    pub name: String,
    pub age: u8,
    pub email: Option<String>,
}

/// Creation input for a student or an instructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDraft {
    pub id: String,
    pub name: String,
    pub age: i64,
    #[serde(default)]
    pub email: Option<String>,
}

impl PersonDraft {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        age: i64,
        email: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            age,
            email: email.map(str::to_string),
        }
    }

    /// Validates every field and returns the normalized ID and attributes.
    ///
    /// Fields are checked in `id, name, age, email` order; the first failure
    /// is returned.
    pub fn normalize(&self) -> Result<(String, PersonFields), ValidationError> {
        let id = normalize_person_id(&self.id)?;
        let name = normalize_name(&self.name)?;
        let age = normalize_age(self.age)?;
        let email = normalize_email(self.email.as_deref())?;
        Ok((id, PersonFields { name, age, email }))
    }
}

/// Field-level update for a student or an instructor.
///
/// `None` leaves a field unchanged. For `email`, `Some(None)` (or a blank
/// string) clears the address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonPatch {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub email: Option<Option<String>>,
}

impl PersonPatch {
    /// Builds a patch that replaces every field with the draft's values.
    pub fn replace_with(draft: &PersonDraft) -> Self {
        Self {
            name: Some(draft.name.clone()),
            age: Some(draft.age),
            email: Some(draft.email.clone()),
        }
    }

    /// Returns whether applying this patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.email.is_none()
    }

    /// Applies this patch over `current`, validating only touched fields.
    pub fn apply(&self, current: &PersonFields) -> Result<PersonFields, ValidationError> {
        let mut next = current.clone();
        if let Some(name) = &self.name {
            next.name = normalize_name(name)?;
        }
        if let Some(age) = self.age {
            next.age = normalize_age(age)?;
        }
        if let Some(email) = &self.email {
            next.email = normalize_email(email.as_deref())?;
        }
        Ok(next)
    }
}

fn normalize_age(age: i64) -> Result<u8, ValidationError> {
    if !validate_age(age) {
        return Err(ValidationError::InvalidAge(age));
    }
    u8::try_from(age).map_err(|_| ValidationError::InvalidAge(age))
}
