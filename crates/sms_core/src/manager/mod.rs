//! Data manager contract shared by every storage backend.
//!
//! # Responsibility
//! - Define the single interface the presentation layer talks to.
//! - Own the error taxonomy, list/search options and import reporting.
//!
//! # Invariants
//! - Every backend validates through the model layer before storing.
//! - Lists and searches are ordered by identifier.
//! - Failed operations leave stored state unchanged.
//! - Relationship lists on returned records are derived on read.

use crate::db::DbError;
use crate::model::course::{Course, CourseDraft, CoursePatch};
use crate::model::instructor::Instructor;
use crate::model::person::{PersonDraft, PersonPatch};
use crate::model::student::Student;
use crate::model::ValidationError;
use crate::transfer::{self, Dataset};
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

pub mod file;
pub mod sqlite;

pub use file::FileDataManager;
pub use sqlite::SqliteDataManager;

pub type DataResult<T> = Result<T, DataError>;

/// Record namespace an error or import row refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Student,
    Instructor,
    Course,
    Enrollment,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Student => "student",
            Self::Instructor => "instructor",
            Self::Course => "course",
            Self::Enrollment => "enrollment",
        })
    }
}

/// Error returned by every data manager operation.
#[derive(Debug)]
pub enum DataError {
    /// Input failed field validation.
    Validation(ValidationError),
    /// Identifier already exists for this entity kind.
    Duplicate { kind: EntityKind, id: String },
    /// Identifier (or enrollment pair) does not exist.
    NotFound { kind: EntityKind, id: String },
    /// File access failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Database access failed.
    Db(DbError),
    /// Stored or imported data is not in the expected shape.
    Format(String),
    /// Operation is not offered by this backend.
    Unsupported(&'static str),
}

impl DataError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn duplicate(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::Duplicate {
            kind,
            id: id.into(),
        }
    }

    /// Returns whether this is a storage-medium failure (file, database or
    /// on-disk format) rather than a problem with caller input.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Db(_) | Self::Format(_))
    }

    /// Stable short code for logs. Carries no record content.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Duplicate { .. } => "duplicate",
            Self::NotFound { .. } => "not_found",
            Self::Io { .. } => "io",
            Self::Db(_) => "db",
            Self::Format(_) => "format",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

impl Display for DataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Duplicate { kind, id } => write!(f, "{kind} `{id}` already exists"),
            Self::NotFound { kind, id } => write!(f, "{kind} `{id}` not found"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Db(err) => write!(f, "{err}"),
            Self::Format(message) => write!(f, "invalid data: {message}"),
            Self::Unsupported(operation) => write!(f, "unsupported operation: {operation}"),
        }
    }
}

impl Error for DataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Db(err) => Some(err),
            Self::Duplicate { .. }
            | Self::NotFound { .. }
            | Self::Format(_)
            | Self::Unsupported(_) => None,
        }
    }
}

impl From<ValidationError> for DataError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for DataError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for DataError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// On-disk layout for export, import and the file-backed store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// One JSON file with a top-level array per entity type.
    Json,
    /// One directory with a CSV file per entity type plus `enrollments.csv`.
    Csv,
}

impl Display for ExportFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Csv => "csv",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unsupported format `{other}`; expected json|csv")),
        }
    }
}

/// Concrete storage behind a [`DataManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// File-backed manager without a backing path.
    Memory,
    File,
    Sqlite,
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Sqlite => "sqlite",
        })
    }
}

/// Restricts a listing to records related to one other record.
///
/// | listing     | `Student(s)`                    | `Instructor(i)`                | `Course(c)`          |
/// |-------------|---------------------------------|--------------------------------|----------------------|
/// | students    | `s` itself                      | enrolled in a course `i` teaches | enrolled in `c`    |
/// | instructors | teaching a course `s` takes     | `i` itself                     | the instructor of `c`|
/// | courses     | taken by `s`                    | taught by `i`                  | `c` itself           |
///
/// Unknown IDs yield an empty listing rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelatedTo {
    Student(String),
    Instructor(String),
    Course(String),
}

/// Options for `list_*` operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub related: Option<RelatedTo>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ListQuery {
    /// Lists everything, unpaginated.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn related_to(related: RelatedTo) -> Self {
        Self {
            related: Some(related),
            ..Self::default()
        }
    }

    /// Applies `offset`/`limit` to an already ordered listing.
    pub(crate) fn paginate<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let skipped = items.into_iter().skip(self.offset as usize);
        match self.limit {
            Some(limit) => skipped.take(limit as usize).collect(),
            None => skipped.collect(),
        }
    }
}

/// Import row that was not applied.
#[derive(Debug)]
pub struct RejectedRow {
    pub kind: EntityKind,
    /// 1-based row number within its table: JSON array index + 1, or the
    /// CSV data row counted after the header. JSON enrollment rows have no
    /// array of their own; they are numbered by their place in the sorted,
    /// deduplicated set of `(student_id, course_id)` pairs gathered from
    /// every `registered_courses` and `enrolled_students` list.
    pub position: usize,
    /// Identifier as found in the input, when one could be read.
    pub id: Option<String>,
    pub error: DataError,
}

/// Outcome of a best-effort import.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub instructors: usize,
    pub students: usize,
    pub courses: usize,
    pub enrollments: usize,
    pub rejected: Vec<RejectedRow>,
}

impl ImportReport {
    /// Total number of rows applied across every table.
    pub fn imported(&self) -> usize {
        self.instructors + self.students + self.courses + self.enrollments
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    pub(crate) fn reject(
        &mut self,
        kind: EntityKind,
        position: usize,
        id: Option<String>,
        error: DataError,
    ) {
        self.rejected.push(RejectedRow {
            kind,
            position,
            id,
            error,
        });
    }
}

/// Storage-agnostic record management API.
///
/// Reads borrow the manager shared; mutations borrow it exclusively and run
/// to completion before returning. Callers should hold a
/// `Box<dyn DataManager>` and never depend on the concrete backend.
pub trait DataManager {
    fn backend(&self) -> BackendKind;

    /// Backing file or directory, if the store is persisted.
    fn location(&self) -> Option<&Path>;

    /// Creates a student and returns its normalized ID.
    fn create_student(&mut self, draft: &PersonDraft) -> DataResult<String>;
    fn get_student(&self, student_id: &str) -> DataResult<Student>;
    fn update_student(&mut self, student_id: &str, patch: &PersonPatch) -> DataResult<Student>;
    /// Deletes a student together with its enrollments.
    fn delete_student(&mut self, student_id: &str) -> DataResult<()>;
    fn list_students(&self, query: &ListQuery) -> DataResult<Vec<Student>>;

    /// Creates an instructor and returns its normalized ID.
    fn create_instructor(&mut self, draft: &PersonDraft) -> DataResult<String>;
    fn get_instructor(&self, instructor_id: &str) -> DataResult<Instructor>;
    fn update_instructor(
        &mut self,
        instructor_id: &str,
        patch: &PersonPatch,
    ) -> DataResult<Instructor>;
    /// Deletes an instructor; courses it taught stay, unassigned.
    fn delete_instructor(&mut self, instructor_id: &str) -> DataResult<()>;
    fn list_instructors(&self, query: &ListQuery) -> DataResult<Vec<Instructor>>;

    /// Creates a course and returns its normalized ID.
    ///
    /// A set instructor reference must name an existing instructor.
    fn create_course(&mut self, draft: &CourseDraft) -> DataResult<String>;
    fn get_course(&self, course_id: &str) -> DataResult<Course>;
    fn update_course(&mut self, course_id: &str, patch: &CoursePatch) -> DataResult<Course>;
    /// Deletes a course together with its enrollments.
    fn delete_course(&mut self, course_id: &str) -> DataResult<()>;
    fn list_courses(&self, query: &ListQuery) -> DataResult<Vec<Course>>;

    /// Enrolls a student in a course. Enrolling twice is a `Duplicate`.
    fn enroll(&mut self, student_id: &str, course_id: &str) -> DataResult<()>;
    fn unenroll(&mut self, student_id: &str, course_id: &str) -> DataResult<()>;

    /// Removes every record.
    fn clear(&mut self) -> DataResult<()>;

    /// Merges records from `path` into this store, row by row.
    fn import(&mut self, path: &Path, format: ExportFormat) -> DataResult<ImportReport>;

    /// Copies the live database file to `destination`.
    fn backup(&self, destination: &Path) -> DataResult<()>;

    /// Case-insensitive substring search over student name and ID.
    fn search_students(&self, query: &str) -> DataResult<Vec<Student>> {
        let needle = fold_query(query);
        Ok(self
            .list_students(&ListQuery::all())?
            .into_iter()
            .filter(|student| {
                text_matches(
                    &needle,
                    &[student.name.as_str(), student.student_id.as_str()],
                )
            })
            .collect())
    }

    /// Case-insensitive substring search over instructor name and ID.
    fn search_instructors(&self, query: &str) -> DataResult<Vec<Instructor>> {
        let needle = fold_query(query);
        Ok(self
            .list_instructors(&ListQuery::all())?
            .into_iter()
            .filter(|instructor| {
                text_matches(
                    &needle,
                    &[instructor.name.as_str(), instructor.instructor_id.as_str()],
                )
            })
            .collect())
    }

    /// Case-insensitive substring search over course name and ID.
    fn search_courses(&self, query: &str) -> DataResult<Vec<Course>> {
        let needle = fold_query(query);
        Ok(self
            .list_courses(&ListQuery::all())?
            .into_iter()
            .filter(|course| {
                text_matches(
                    &needle,
                    &[course.course_name.as_str(), course.course_id.as_str()],
                )
            })
            .collect())
    }

    /// Returns every record with derived relationship lists filled in.
    fn snapshot(&self) -> DataResult<Dataset> {
        Ok(Dataset {
            students: self.list_students(&ListQuery::all())?,
            instructors: self.list_instructors(&ListQuery::all())?,
            courses: self.list_courses(&ListQuery::all())?,
        })
    }

    /// Writes every record to `path` in the requested layout.
    fn export(&self, path: &Path, format: ExportFormat) -> DataResult<()> {
        let started_at = Instant::now();
        let dataset = self.snapshot()?;
        transfer::write_dataset(path, format, &dataset)?;
        info!(
            "event=export module=manager status=ok backend={} format={} students={} instructors={} courses={} duration_ms={}",
            self.backend(),
            format,
            dataset.students.len(),
            dataset.instructors.len(),
            dataset.courses.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }
}

fn fold_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Blank needles match everything.
fn text_matches(needle: &str, haystacks: &[&str]) -> bool {
    needle.is_empty()
        || haystacks
            .iter()
            .any(|haystack| haystack.to_lowercase().contains(needle))
}

pub(crate) fn log_import(backend: BackendKind, format: ExportFormat, report: &ImportReport) {
    info!(
        "event=import module=manager status=ok backend={} format={} imported={} rejected={}",
        backend,
        format,
        report.imported(),
        report.rejected.len()
    );
}
