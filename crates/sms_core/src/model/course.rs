//! Course record, creation input and field-level patch.
//!
//! # Invariants
//! - `instructor_id`, when set, names an existing instructor (checked by the
//!   data manager, not here).
//! - `enrolled_students` is derived from the enrollment relation.

use super::{normalize_course_id, normalize_course_name, normalize_instructor_ref, ValidationError};
use serde::{Deserialize, Serialize};

/// A course with its optional instructor and enrolled students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub course_id: String,
    pub course_name: String,
    #[serde(default)]
    pub instructor_id: Option<String>,
    /// Derived from the enrollment relation, sorted by student ID.
    #[serde(default)]
    pub enrolled_students: Vec<String>,
}

impl Course {
    pub(crate) fn from_fields(
        course_id: String,
        fields: CourseFields,
        enrolled_students: Vec<String>,
    ) -> Self {
        Self {
            course_id,
            course_name: fields.course_name,
            instructor_id: fields.instructor_id,
            enrolled_students,
        }
    }

    /// Returns the creation input that would reproduce this record.
    pub fn to_draft(&self) -> CourseDraft {
        CourseDraft {
            course_id: self.course_id.clone(),
            course_name: self.course_name.clone(),
            instructor_id: self.instructor_id.clone(),
        }
    }
}

/// Validated course attributes, as every backend stores them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseFields {
    pub course_name: String,
    pub instructor_id: Option<String>,
}

/// Creation input for a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseDraft {
    pub course_id: String,
    pub course_name: String,
    #[serde(default)]
    pub instructor_id: Option<String>,
}

impl CourseDraft {
    pub fn new(
        course_id: impl Into<String>,
        course_name: impl Into<String>,
        instructor_id: Option<&str>,
    ) -> Self {
        Self {
            course_id: course_id.into(),
            course_name: course_name.into(),
            instructor_id: instructor_id.map(str::to_string),
        }
    }

    /// Validates every field and returns the normalized ID and attributes.
    pub fn normalize(&self) -> Result<(String, CourseFields), ValidationError> {
        let course_id = normalize_course_id(&self.course_id)?;
        let course_name = normalize_course_name(&self.course_name)?;
        let instructor_id = normalize_instructor_ref(self.instructor_id.as_deref())?;
        Ok((
            course_id,
            CourseFields {
                course_name,
                instructor_id,
            },
        ))
    }
}

/// Field-level update for a course.
///
/// For `instructor_id`, `Some(None)` (or a blank string) unassigns the course.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoursePatch {
    pub course_name: Option<String>,
    pub instructor_id: Option<Option<String>>,
}

impl CoursePatch {
    /// Builds a patch that replaces every field with the draft's values.
    pub fn replace_with(draft: &CourseDraft) -> Self {
        Self {
            course_name: Some(draft.course_name.clone()),
            instructor_id: Some(draft.instructor_id.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.course_name.is_none() && self.instructor_id.is_none()
    }

    /// Applies this patch over `current`, validating only touched fields.
    pub fn apply(&self, current: &CourseFields) -> Result<CourseFields, ValidationError> {
        let mut next = current.clone();
        if let Some(name) = &self.course_name {
            next.course_name = normalize_course_name(name)?;
        }
        if let Some(instructor_id) = &self.instructor_id {
            next.instructor_id = normalize_instructor_ref(instructor_id.as_deref())?;
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_normalize_upper_cases_id_and_trims_name() {
        let draft = CourseDraft::new("eece230", "  Software Engineering ", Some(" 199801234 "));
        let (id, fields) = draft.normalize().unwrap();
        assert_eq!(id, "EECE230");
        assert_eq!(fields.course_name, "Software Engineering");
        assert_eq!(fields.instructor_id.as_deref(), Some("199801234"));
    }

    #[test]
    fn draft_without_instructor_is_valid() {
        let (_, fields) = CourseDraft::new("MATH201", "Calculus III", None)
            .normalize()
            .unwrap();
        assert_eq!(fields.instructor_id, None);
    }

    #[test]
    fn patch_can_unassign_instructor() {
        let current = CourseFields {
            course_name: "Calculus III".to_string(),
            instructor_id: Some("199801234".to_string()),
        };
        let patch = CoursePatch {
            instructor_id: Some(None),
            ..CoursePatch::default()
        };
        let next = patch.apply(&current).unwrap();
        assert_eq!(next.instructor_id, None);
        assert_eq!(next.course_name, "Calculus III");
    }

    #[test]
    fn default_patch_is_empty() {
        assert!(CoursePatch::default().is_empty());
        let unassign = CoursePatch {
            instructor_id: Some(None),
            ..CoursePatch::default()
        };
        assert!(!unassign.is_empty());
    }

    #[test]
    fn patch_rejects_short_name() {
        let current = CourseFields {
            course_name: "Calculus III".to_string(),
            instructor_id: None,
        };
        let patch = CoursePatch {
            course_name: Some("abc".to_string()),
            ..CoursePatch::default()
        };
        assert!(matches!(
            patch.apply(&current),
            Err(ValidationError::InvalidCourseName(_))
        ));
    }
}
