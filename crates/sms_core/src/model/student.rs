//! Student record.

use super::person::{Person, PersonDraft, PersonFields};
use serde::{Deserialize, Serialize};

/// A student with the courses it is currently enrolled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: String,
    pub name: String,
    pub age: u8,
    #[serde(default)]
    pub email: Option<String>,
    /// Derived from the enrollment relation, sorted by course ID.
    #[serde(default)]
    pub registered_courses: Vec<String>,
}

impl Student {
    pub(crate) fn from_fields(
        student_id: String,
        fields: PersonFields,
        registered_courses: Vec<String>,
    ) -> Self {
        Self {
            student_id,
            name: fields.name,
            age: fields.age,
            email: fields.email,
            registered_courses,
        }
    }

    /// Returns the creation input that would reproduce this record.
    pub fn to_draft(&self) -> PersonDraft {
        PersonDraft {
            id: self.student_id.clone(),
            name: self.name.clone(),
            age: i64::from(self.age),
            email: self.email.clone(),
        }
    }

    /// Returns whether the student is enrolled in `course_id`.
    pub fn is_enrolled_in(&self, course_id: &str) -> bool {
        self.registered_courses.iter().any(|id| id == course_id)
    }
}

impl Person for Student {
    fn id(&self) -> &str {
        &self.student_id
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
