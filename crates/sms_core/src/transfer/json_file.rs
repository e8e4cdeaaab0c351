//! Single-file JSON layout.
//!
//! ```json
//! { "students": [...], "instructors": [...], "courses": [...] }
//! ```
//!
//! Student and course objects carry their enrollment lists; both are read
//! back and merged. `assigned_courses` on instructors is derived and ignored
//! on import. Unknown keys (such as a `type` tag) are ignored.
//!
//! Identifiers may be JSON strings or unsigned integers; integers are read
//! as their decimal text and validated like any other ID.

use super::{
    enrollment_label, format_error, publish_staged, stage_beside, Dataset, EnrollmentPair,
    ImportBatch, Row,
};
use crate::manager::{DataError, DataResult};
use crate::model::course::CourseDraft;
use crate::model::person::PersonDraft;
use crate::model::{course_key, person_key};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct StudentRow {
    #[serde(deserialize_with = "id_text")]
    student_id: String,
    name: String,
    age: i64,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, deserialize_with = "id_list")]
    registered_courses: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct InstructorRow {
    #[serde(deserialize_with = "id_text")]
    instructor_id: String,
    name: String,
    age: i64,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CourseRow {
    #[serde(deserialize_with = "id_text")]
    course_id: String,
    course_name: String,
    #[serde(default, deserialize_with = "optional_id_text")]
    instructor_id: Option<String>,
    #[serde(default, deserialize_with = "id_list")]
    enrolled_students: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => text,
            RawId::Number(number) => number.to_string(),
        }
    }
}

fn id_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawId::deserialize(deserializer).map(String::from)
}

fn optional_id_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<RawId>::deserialize(deserializer).map(|raw| raw.map(String::from))
}

fn id_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Vec::<RawId>::deserialize(deserializer)
        .map(|raw| raw.into_iter().map(String::from).collect())
}

pub(super) fn write(path: &Path, dataset: &Dataset) -> DataResult<()> {
    let mut staged = stage_beside(path)?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, dataset)
            .map_err(|err| DataError::io(path, err.into()))?;
        writer
            .write_all(b"\n")
            .and_then(|()| writer.flush())
            .map_err(|err| DataError::io(path, err))?;
    }
    publish_staged(staged, path)
}

pub(super) fn read(path: &Path) -> DataResult<ImportBatch> {
    let file = File::open(path).map_err(|err| DataError::io(path, err))?;
    let document: Value = serde_json::from_reader(BufReader::new(file))
        .map_err(|err| format_error(path, None, err))?;
    let Value::Object(mut root) = document else {
        return Err(format_error(path, None, "top-level value must be an object"));
    };

    let instructors = take_array(&mut root, "instructors", path)?;
    let students = take_array(&mut root, "students", path)?;
    let courses = take_array(&mut root, "courses", path)?;

    let mut pairs = BTreeSet::new();

    let instructors = parse_rows::<InstructorRow>(path, instructors, "instructor_id")
        .into_iter()
        .map(|row| {
            row.map(|parsed| PersonDraft {
                id: parsed.instructor_id,
                name: parsed.name,
                age: parsed.age,
                email: parsed.email,
            })
        })
        .collect();

    let students = parse_rows::<StudentRow>(path, students, "student_id")
        .into_iter()
        .map(|row| {
            row.map(|parsed| {
                for course_id in &parsed.registered_courses {
                    pairs.insert((person_key(&parsed.student_id), course_key(course_id)));
                }
                PersonDraft {
                    id: parsed.student_id,
                    name: parsed.name,
                    age: parsed.age,
                    email: parsed.email,
                }
            })
        })
        .collect();

    let courses = parse_rows::<CourseRow>(path, courses, "course_id")
        .into_iter()
        .map(|row| {
            row.map(|parsed| {
                for student_id in &parsed.enrolled_students {
                    pairs.insert((person_key(student_id), course_key(&parsed.course_id)));
                }
                CourseDraft {
                    course_id: parsed.course_id,
                    course_name: parsed.course_name,
                    instructor_id: parsed.instructor_id,
                }
            })
        })
        .collect();

    let enrollments = pairs
        .into_iter()
        .enumerate()
        .map(|(index, (student_id, course_id))| Row {
            position: index + 1,
            id: Some(enrollment_label(&student_id, &course_id)),
            value: Ok(EnrollmentPair {
                student_id,
                course_id,
            }),
        })
        .collect();

    Ok(ImportBatch {
        instructors,
        students,
        courses,
        enrollments,
    })
}

/// Missing keys read as empty tables.
fn take_array(root: &mut Map<String, Value>, key: &str, path: &Path) -> DataResult<Vec<Value>> {
    match root.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(format_error(path, None, format!("`{key}` must be an array"))),
    }
}

fn parse_rows<T: DeserializeOwned>(path: &Path, items: Vec<Value>, id_key: &str) -> Vec<Row<T>> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let position = index + 1;
            let id = item.get(id_key).and_then(raw_id_label);
            let value =
                serde_json::from_value::<T>(item).map_err(|err| format_error(path, Some(position), err));
            Row {
                position,
                id,
                value,
            }
        })
        .collect()
}

fn raw_id_label(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) if number.is_u64() => Some(number.to_string()),
        _ => None,
    }
}
