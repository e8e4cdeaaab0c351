//! Whole-store export/import in JSON and CSV layouts.
//!
//! # Responsibility
//! - Serialize a [`Dataset`] snapshot to a JSON file or a CSV directory.
//! - Parse those layouts into per-row import candidates.
//! - Drive best-effort application of candidates into a backend.
//!
//! # Invariants
//! - A missing or unparsable container fails before any row is applied.
//! - A bad row is reported with its position and never aborts the import.
//! - Writes go to temp files beside their targets and are renamed into place
//!   once complete, so a failed write never truncates existing output.
//! - Rows are applied instructors, students, courses, then enrollments, so
//!   references resolve against rows imported earlier in the same batch.

use crate::manager::{DataError, DataResult, EntityKind, ExportFormat, ImportReport};
use crate::model::course::{Course, CourseDraft};
use crate::model::instructor::Instructor;
use crate::model::person::PersonDraft;
use crate::model::student::Student;
use serde::Serialize;
use std::path::Path;
use tempfile::NamedTempFile;

mod csv_dir;
mod json_file;

pub use csv_dir::{COURSES_FILE, ENROLLMENTS_FILE, INSTRUCTORS_FILE, STUDENTS_FILE};

/// Every record of a store, with derived relationship lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dataset {
    pub students: Vec<Student>,
    pub instructors: Vec<Instructor>,
    pub courses: Vec<Course>,
}

impl Dataset {
    /// Enrollment pairs as `(student_id, course_id)`, ordered by student then
    /// course.
    pub fn enrollments(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .students
            .iter()
            .flat_map(|student| {
                student
                    .registered_courses
                    .iter()
                    .map(move |course_id| (student.student_id.clone(), course_id.clone()))
            })
            .collect();
        pairs.sort();
        pairs.dedup();
        pairs
    }
}

/// One parsed import candidate.
#[derive(Debug)]
pub(crate) struct Row<T> {
    pub position: usize,
    pub id: Option<String>,
    pub value: DataResult<T>,
}

impl<T> Row<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Row<U> {
        Row {
            position: self.position,
            id: self.id,
            value: self.value.map(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EnrollmentPair {
    pub student_id: String,
    pub course_id: String,
}

/// Parsed import input, not yet applied.
#[derive(Debug, Default)]
pub(crate) struct ImportBatch {
    pub instructors: Vec<Row<PersonDraft>>,
    pub students: Vec<Row<PersonDraft>>,
    pub courses: Vec<Row<CourseDraft>>,
    pub enrollments: Vec<Row<EnrollmentPair>>,
}

/// Write target for [`apply_batch`]; one implementation per backend.
pub(crate) trait RecordSink {
    fn put_instructor(&mut self, draft: &PersonDraft) -> DataResult<String>;
    fn put_student(&mut self, draft: &PersonDraft) -> DataResult<String>;
    fn put_course(&mut self, draft: &CourseDraft) -> DataResult<String>;
    fn put_enrollment(&mut self, student_id: &str, course_id: &str) -> DataResult<()>;
}

/// Writes `dataset` to `path` in `format`.
///
/// JSON writes one file; CSV writes (and creates, if needed) a directory.
pub fn write_dataset(path: &Path, format: ExportFormat, dataset: &Dataset) -> DataResult<()> {
    match format {
        ExportFormat::Json => json_file::write(path, dataset),
        ExportFormat::Csv => csv_dir::write(path, dataset),
    }
}

pub(crate) fn read_batch(path: &Path, format: ExportFormat) -> DataResult<ImportBatch> {
    match format {
        ExportFormat::Json => json_file::read(path),
        ExportFormat::Csv => csv_dir::read(path),
    }
}

/// Applies every candidate, collecting failures instead of stopping.
pub(crate) fn apply_batch(batch: ImportBatch, sink: &mut dyn RecordSink) -> ImportReport {
    let mut report = ImportReport::default();

    for row in batch.instructors {
        match row.value.and_then(|draft| sink.put_instructor(&draft)) {
            Ok(_) => report.instructors += 1,
            Err(error) => report.reject(EntityKind::Instructor, row.position, row.id, error),
        }
    }
    for row in batch.students {
        match row.value.and_then(|draft| sink.put_student(&draft)) {
            Ok(_) => report.students += 1,
            Err(error) => report.reject(EntityKind::Student, row.position, row.id, error),
        }
    }
    for row in batch.courses {
        match row.value.and_then(|draft| sink.put_course(&draft)) {
            Ok(_) => report.courses += 1,
            Err(error) => report.reject(EntityKind::Course, row.position, row.id, error),
        }
    }
    for row in batch.enrollments {
        match row
            .value
            .and_then(|pair| sink.put_enrollment(&pair.student_id, &pair.course_id))
        {
            Ok(()) => report.enrollments += 1,
            Err(error) => report.reject(EntityKind::Enrollment, row.position, row.id, error),
        }
    }

    report
}

/// Opens a temp file in the directory that will hold `target`.
fn stage_beside(target: &Path) -> DataResult<NamedTempFile> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    NamedTempFile::new_in(dir).map_err(|err| DataError::io(target, err))
}

/// Syncs a fully written temp file and renames it over `target`.
fn publish_staged(staged: NamedTempFile, target: &Path) -> DataResult<()> {
    staged
        .as_file()
        .sync_all()
        .map_err(|err| DataError::io(target, err))?;
    staged
        .persist(target)
        .map(drop)
        .map_err(|err| DataError::io(target, err.error))
}

pub(crate) fn enrollment_label(student_id: &str, course_id: &str) -> String {
    format!("{student_id}/{course_id}")
}

fn format_error(path: &Path, position: Option<usize>, message: impl std::fmt::Display) -> DataError {
    match position {
        Some(position) => DataError::Format(format!("{} row {position}: {message}", path.display())),
        None => DataError::Format(format!("{}: {message}", path.display())),
    }
}
