//! Instructor record.

use super::person::{Person, PersonDraft, PersonFields};
use serde::{Deserialize, Serialize};

/// An instructor with the courses currently assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructor {
    pub instructor_id: String,
    pub name: String,
    pub age: u8,
    #[serde(default)]
    pub email: Option<String>,
    /// Derived from `Course::instructor_id`, sorted by course ID.
    #[serde(default)]
    pub assigned_courses: Vec<String>,
}

impl Instructor {
    pub(crate) fn from_fields(
        instructor_id: String,
        fields: PersonFields,
        assigned_courses: Vec<String>,
    ) -> Self {
        Self {
            instructor_id,
            name: fields.name,
            age: fields.age,
            email: fields.email,
            assigned_courses,
        }
    }

    /// Returns the creation input that would reproduce this record.
    pub fn to_draft(&self) -> PersonDraft {
        PersonDraft {
            id: self.instructor_id.clone(),
            name: self.name.clone(),
            age: i64::from(self.age),
            email: self.email.clone(),
        }
    }
}

impl Person for Instructor {
    fn id(&self) -> &str {
        &self.instructor_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn age(&self) -> u8 {
        self.age
    }

    fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}
