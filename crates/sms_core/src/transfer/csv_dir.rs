//! Directory-of-CSV-files layout.
//!
//! One file per entity type plus a join file, each with a header row and
//! rows in identifier order. Empty `email`/`instructor_id` cells mean "none".

use super::{
    enrollment_label, format_error, publish_staged, stage_beside, Dataset, EnrollmentPair,
    ImportBatch, Row,
};
use crate::manager::{DataError, DataResult};
use crate::model::course::CourseDraft;
use crate::model::person::PersonDraft;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const STUDENTS_FILE: &str = "students.csv";
pub const INSTRUCTORS_FILE: &str = "instructors.csv";
pub const COURSES_FILE: &str = "courses.csv";
pub const ENROLLMENTS_FILE: &str = "enrollments.csv";

const STUDENT_HEADER: [&str; 4] = ["student_id", "name", "age", "email"];
const INSTRUCTOR_HEADER: [&str; 4] = ["instructor_id", "name", "age", "email"];
const COURSE_HEADER: [&str; 3] = ["course_id", "course_name", "instructor_id"];
const ENROLLMENT_HEADER: [&str; 2] = ["student_id", "course_id"];

#[derive(Debug, Deserialize)]
struct StudentRow {
    student_id: String,
    name: String,
    age: i64,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstructorRow {
    instructor_id: String,
    name: String,
    age: i64,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CourseRow {
    course_id: String,
    course_name: String,
    instructor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnrollmentRow {
    student_id: String,
    course_id: String,
}

/// Stages all four tables before renaming any of them into `dir`.
///
/// A table that cannot be written leaves every file in `dir` untouched.
pub(super) fn write(dir: &Path, dataset: &Dataset) -> DataResult<()> {
    fs::create_dir_all(dir).map_err(|err| DataError::io(dir, err))?;

    let mut staged = Vec::with_capacity(4);
    staged.push(stage_table(
        &dir.join(STUDENTS_FILE),
        &STUDENT_HEADER,
        dataset.students.iter().map(|student| {
            vec![
                student.student_id.clone(),
                student.name.clone(),
                student.age.to_string(),
                student.email.clone().unwrap_or_default(),
            ]
        }),
    )?);
    staged.push(stage_table(
        &dir.join(INSTRUCTORS_FILE),
        &INSTRUCTOR_HEADER,
        dataset.instructors.iter().map(|instructor| {
            vec![
                instructor.instructor_id.clone(),
                instructor.name.clone(),
                instructor.age.to_string(),
                instructor.email.clone().unwrap_or_default(),
            ]
        }),
    )?);
    staged.push(stage_table(
        &dir.join(COURSES_FILE),
        &COURSE_HEADER,
        dataset.courses.iter().map(|course| {
            vec![
                course.course_id.clone(),
                course.course_name.clone(),
                course.instructor_id.clone().unwrap_or_default(),
            ]
        }),
    )?);
    staged.push(stage_table(
        &dir.join(ENROLLMENTS_FILE),
        &ENROLLMENT_HEADER,
        dataset
            .enrollments()
            .into_iter()
            .map(|(student_id, course_id)| vec![student_id, course_id]),
    )?);

    for (target, _) in &staged {
        if target.is_dir() {
            return Err(DataError::io(
                target,
                io::Error::new(io::ErrorKind::InvalidInput, "target is a directory"),
            ));
        }
    }
    for (target, file) in staged {
        publish_staged(file, &target)?;
    }
    Ok(())
}

pub(super) fn read(dir: &Path) -> DataResult<ImportBatch> {
    if !dir.is_dir() {
        return Err(DataError::io(
            dir,
            io::Error::new(io::ErrorKind::NotFound, "CSV directory not found"),
        ));
    }

    // Parse every table before returning so a missing file fails the whole
    // import up front.
    let instructors = read_table::<InstructorRow>(&dir.join(INSTRUCTORS_FILE), "instructor_id")?;
    let students = read_table::<StudentRow>(&dir.join(STUDENTS_FILE), "student_id")?;
    let courses = read_table::<CourseRow>(&dir.join(COURSES_FILE), "course_id")?;
    let enrollments = read_table::<EnrollmentRow>(&dir.join(ENROLLMENTS_FILE), "student_id")?;

    Ok(ImportBatch {
        instructors: instructors
            .into_iter()
            .map(|row| {
                row.map(|parsed| PersonDraft {
                    id: parsed.instructor_id,
                    name: parsed.name,
                    age: parsed.age,
                    email: parsed.email,
                })
            })
            .collect(),
        students: students
            .into_iter()
            .map(|row| {
                row.map(|parsed| PersonDraft {
                    id: parsed.student_id,
                    name: parsed.name,
                    age: parsed.age,
                    email: parsed.email,
                })
            })
            .collect(),
        courses: courses
            .into_iter()
            .map(|row| {
                row.map(|parsed| CourseDraft {
                    course_id: parsed.course_id,
                    course_name: parsed.course_name,
                    instructor_id: parsed.instructor_id,
                })
            })
            .collect(),
        enrollments: enrollments
            .into_iter()
            .map(|row| {
                let mut row = row.map(|parsed| EnrollmentPair {
                    student_id: parsed.student_id,
                    course_id: parsed.course_id,
                });
                if let Ok(pair) = &row.value {
                    row.id = Some(enrollment_label(&pair.student_id, &pair.course_id));
                }
                row
            })
            .collect(),
    })
}

fn stage_table(
    path: &Path,
    header: &[&str],
    rows: impl IntoIterator<Item = Vec<String>>,
) -> DataResult<(PathBuf, NamedTempFile)> {
    let mut staged = stage_beside(path)?;
    {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(staged.as_file_mut());
        writer
            .write_record(header)
            .map_err(|err| csv_error(path, err))?;
        for row in rows {
            writer
                .write_record(&row)
                .map_err(|err| csv_error(path, err))?;
        }
        writer.flush().map_err(|err| DataError::io(path, err))?;
    }
    Ok((path.to_path_buf(), staged))
}

fn read_table<T: DeserializeOwned>(path: &Path, id_column: &str) -> DataResult<Vec<Row<T>>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .map_err(|err| csv_error(path, err))?;
    let headers = reader
        .headers()
        .map_err(|err| csv_error(path, err))?
        .clone();
    let id_index = headers.iter().position(|header| header == id_column);

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let position = index + 1;
        let row = match record {
            Ok(record) => Row {
                position,
                id: id_index
                    .and_then(|column| record.get(column))
                    .map(str::to_string),
                value: record
                    .deserialize::<T>(Some(&headers))
                    .map_err(|err| format_error(path, Some(position), err)),
            },
            Err(err) => Row {
                position,
                id: None,
                value: Err(format_error(path, Some(position), err)),
            },
        };
        rows.push(row);
    }
    Ok(rows)
}

fn csv_error(path: &Path, err: csv::Error) -> DataError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => DataError::io(path, source),
        _ => format_error(path, None, message),
    }
}
