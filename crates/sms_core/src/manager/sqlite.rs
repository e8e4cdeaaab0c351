//! SQLite-backed data manager.
//!
//! # Responsibility
//! - Map data manager operations onto the normalized schema from
//!   `db/migrations`.
//! - Keep SQL details inside this module.
//!
//! # Invariants
//! - Write paths validate through the model layer before any SQL mutation.
//! - Read paths re-validate every persisted person and course row and
//!   reject invalid state instead of masking it.
//! - Every statement is parameterized; table names come from constants only.
//! - Multi-statement mutations (`clear`, `import`) run in one transaction.

use super::{
    log_import, BackendKind, DataError, DataManager, DataResult, EntityKind, ExportFormat,
    ImportReport, ListQuery, RelatedTo,
};
use crate::db::{open_db, open_db_in_memory};
use crate::model::course::{Course, CourseDraft, CourseFields, CoursePatch};
use crate::model::instructor::Instructor;
use crate::model::person::{PersonDraft, PersonFields, PersonPatch};
use crate::model::student::Student;
use crate::model::{course_key, person_key, ValidationError};
use crate::transfer::{self, enrollment_label, RecordSink};
use log::{info, warn};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Data manager over one SQLite connection.
pub struct SqliteDataManager {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteDataManager {
    /// Opens (creating if needed) and migrates the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> DataResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_db(&path)?;
        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Opens a private in-memory database. Contents vanish on drop.
    pub fn open_in_memory() -> DataResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
            path: None,
        })
    }

    /// Borrows the underlying connection, e.g. for schema inspection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Closes the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> DataResult<()> {
        self.conn.close().map_err(|(_, err)| DataError::from(err))
    }
}

impl DataManager for SqliteDataManager {
    fn backend(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn location(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn create_student(&mut self, draft: &PersonDraft) -> DataResult<String> {
        insert_person(&self.conn, PersonTable::Students, draft)
    }

    fn get_student(&self, student_id: &str) -> DataResult<Student> {
        load_student(&self.conn, &person_key(student_id))
    }

    fn update_student(&mut self, student_id: &str, patch: &PersonPatch) -> DataResult<Student> {
        let key = person_key(student_id);
        update_person(&self.conn, PersonTable::Students, &key, patch)?;
        load_student(&self.conn, &key)
    }

    fn delete_student(&mut self, student_id: &str) -> DataResult<()> {
        delete_person(&self.conn, PersonTable::Students, &person_key(student_id))
    }

    fn list_students(&self, query: &ListQuery) -> DataResult<Vec<Student>> {
        let filter = query.related.as_ref().map(|related| match related {
            RelatedTo::Student(id) => ("student_id = ?", person_key(id)),
            RelatedTo::Course(id) => (
                "student_id IN (SELECT student_id FROM enrollments WHERE course_id = ?)",
                course_key(id),
            ),
            RelatedTo::Instructor(id) => (
                "student_id IN (
                    SELECT e.student_id
                    FROM enrollments e
                    JOIN courses c ON c.course_id = e.course_id
                    WHERE c.instructor_id = ?
                )",
                person_key(id),
            ),
        });
        list_ids(&self.conn, "students", "student_id", filter, query)?
            .iter()
            .map(|id| load_student(&self.conn, id))
            .collect()
    }

    fn create_instructor(&mut self, draft: &PersonDraft) -> DataResult<String> {
        insert_person(&self.conn, PersonTable::Instructors, draft)
    }

    fn get_instructor(&self, instructor_id: &str) -> DataResult<Instructor> {
        load_instructor(&self.conn, &person_key(instructor_id))
    }

    fn update_instructor(
        &mut self,
        instructor_id: &str,
        patch: &PersonPatch,
    ) -> DataResult<Instructor> {
        let key = person_key(instructor_id);
        update_person(&self.conn, PersonTable::Instructors, &key, patch)?;
        load_instructor(&self.conn, &key)
    }

    fn delete_instructor(&mut self, instructor_id: &str) -> DataResult<()> {
        delete_person(
            &self.conn,
            PersonTable::Instructors,
            &person_key(instructor_id),
        )
    }

    fn list_instructors(&self, query: &ListQuery) -> DataResult<Vec<Instructor>> {
        let filter = query.related.as_ref().map(|related| match related {
            RelatedTo::Instructor(id) => ("instructor_id = ?", person_key(id)),
            RelatedTo::Course(id) => (
                "instructor_id IN (SELECT instructor_id FROM courses WHERE course_id = ?)",
                course_key(id),
            ),
            RelatedTo::Student(id) => (
                "instructor_id IN (
                    SELECT c.instructor_id
                    FROM courses c
                    JOIN enrollments e ON e.course_id = c.course_id
                    WHERE e.student_id = ?
                )",
                person_key(id),
            ),
        });
        list_ids(&self.conn, "instructors", "instructor_id", filter, query)?
            .iter()
            .map(|id| load_instructor(&self.conn, id))
            .collect()
    }

    fn create_course(&mut self, draft: &CourseDraft) -> DataResult<String> {
        insert_course(&self.conn, draft)
    }

    fn get_course(&self, course_id: &str) -> DataResult<Course> {
        load_course(&self.conn, &course_key(course_id))
    }

    fn update_course(&mut self, course_id: &str, patch: &CoursePatch) -> DataResult<Course> {
        let key = course_key(course_id);
        let current = load_course_fields(&self.conn, &key)?
            .ok_or_else(|| DataError::not_found(EntityKind::Course, key.as_str()))?;
        let next = patch.apply(&current)?;
        require_instructor(&self.conn, next.instructor_id.as_deref())?;

        self.conn.execute(
            "UPDATE courses
             SET course_name = ?1, instructor_id = ?2
             WHERE course_id = ?3;",
            params![next.course_name, next.instructor_id, key],
        )?;
        load_course(&self.conn, &key)
    }

    fn delete_course(&mut self, course_id: &str) -> DataResult<()> {
        let key = course_key(course_id);
        let changed = self
            .conn
            .execute("DELETE FROM courses WHERE course_id = ?1;", [key.as_str()])?;
        if changed == 0 {
            return Err(DataError::not_found(EntityKind::Course, key));
        }
        info!("event=record_delete module=sqlite status=ok kind=course");
        Ok(())
    }

    fn list_courses(&self, query: &ListQuery) -> DataResult<Vec<Course>> {
        let filter = query.related.as_ref().map(|related| match related {
            RelatedTo::Course(id) => ("course_id = ?", course_key(id)),
            RelatedTo::Instructor(id) => ("instructor_id = ?", person_key(id)),
            RelatedTo::Student(id) => (
                "course_id IN (SELECT course_id FROM enrollments WHERE student_id = ?)",
                person_key(id),
            ),
        });
        list_ids(&self.conn, "courses", "course_id", filter, query)?
            .iter()
            .map(|id| load_course(&self.conn, id))
            .collect()
    }

    fn enroll(&mut self, student_id: &str, course_id: &str) -> DataResult<()> {
        insert_enrollment(&self.conn, student_id, course_id)
    }

    fn unenroll(&mut self, student_id: &str, course_id: &str) -> DataResult<()> {
        let student_id = person_key(student_id);
        let course_id = course_key(course_id);
        let changed = self.conn.execute(
            "DELETE FROM enrollments WHERE student_id = ?1 AND course_id = ?2;",
            [student_id.as_str(), course_id.as_str()],
        )?;
        if changed == 0 {
            return Err(DataError::not_found(
                EntityKind::Enrollment,
                enrollment_label(&student_id, &course_id),
            ));
        }
        Ok(())
    }

    fn clear(&mut self) -> DataResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM enrollments;
             DELETE FROM courses;
             DELETE FROM students;
             DELETE FROM instructors;",
        )?;
        tx.commit()?;
        info!("event=store_clear module=sqlite status=ok");
        Ok(())
    }

    fn import(&mut self, path: &Path, format: ExportFormat) -> DataResult<ImportReport> {
        let batch = transfer::read_batch(path, format)?;

        let tx = self.conn.transaction()?;
        let report = transfer::apply_batch(batch, &mut SqlSink { conn: &tx });
        tx.commit()?;

        log_import(self.backend(), format, &report);
        Ok(report)
    }

    fn backup(&self, destination: &Path) -> DataResult<()> {
        let Some(source) = self.path.as_deref() else {
            return Err(DataError::Unsupported(
                "backup requires a file-backed SQLite database",
            ));
        };
        if same_file(source, destination) {
            return Err(DataError::io(
                destination,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "backup destination is the live database",
                ),
            ));
        }

        let started_at = Instant::now();
        match std::fs::copy(source, destination) {
            Ok(bytes) => {
                info!(
                    "event=backup module=sqlite status=ok bytes={} duration_ms={}",
                    bytes,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    "event=backup module=sqlite status=error error_kind={:?}",
                    err.kind()
                );
                Err(DataError::io(destination, err))
            }
        }
    }
}

fn same_file(left: &Path, right: &Path) -> bool {
    match (left.canonicalize(), right.canonicalize()) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

/// Students and instructors share one table shape.
#[derive(Debug, Clone, Copy)]
enum PersonTable {
    Students,
    Instructors,
}

impl PersonTable {
    fn kind(self) -> EntityKind {
        match self {
            Self::Students => EntityKind::Student,
            Self::Instructors => EntityKind::Instructor,
        }
    }

    fn table(self) -> &'static str {
        match self {
            Self::Students => "students",
            Self::Instructors => "instructors",
        }
    }

    fn id_column(self) -> &'static str {
        match self {
            Self::Students => "student_id",
            Self::Instructors => "instructor_id",
        }
    }
}

fn insert_person(conn: &Connection, table: PersonTable, draft: &PersonDraft) -> DataResult<String> {
    let (id, fields) = draft.normalize()?;
    if load_person_fields(conn, table, &id)?.is_some() {
        return Err(DataError::duplicate(table.kind(), id));
    }

    conn.execute(
        &format!(
            "INSERT INTO {} ({}, name, age, email) VALUES (?1, ?2, ?3, ?4);",
            table.table(),
            table.id_column()
        ),
        params![id, fields.name, fields.age, fields.email],
    )?;
    Ok(id)
}

fn update_person(
    conn: &Connection,
    table: PersonTable,
    id: &str,
    patch: &PersonPatch,
) -> DataResult<()> {
    let current = load_person_fields(conn, table, id)?
        .ok_or_else(|| DataError::not_found(table.kind(), id))?;
    let next = patch.apply(&current)?;

    conn.execute(
        &format!(
            "UPDATE {} SET name = ?1, age = ?2, email = ?3 WHERE {} = ?4;",
            table.table(),
            table.id_column()
        ),
        params![next.name, next.age, next.email, id],
    )?;
    Ok(())
}

fn delete_person(conn: &Connection, table: PersonTable, id: &str) -> DataResult<()> {
    let changed = conn.execute(
        &format!(
            "DELETE FROM {} WHERE {} = ?1;",
            table.table(),
            table.id_column()
        ),
        [id],
    )?;
    if changed == 0 {
        return Err(DataError::not_found(table.kind(), id));
    }
    info!(
        "event=record_delete module=sqlite status=ok kind={}",
        table.kind()
    );
    Ok(())
}

fn load_person_fields(
    conn: &Connection,
    table: PersonTable,
    id: &str,
) -> DataResult<Option<PersonFields>> {
    let raw = conn
        .prepare_cached(&format!(
            "SELECT name, age, email FROM {} WHERE {} = ?1;",
            table.table(),
            table.id_column()
        ))?
        .query_row([id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })
        .optional()?;

    let Some((name, age, email)) = raw else {
        return Ok(None);
    };
    let (_, fields) = PersonDraft {
        id: id.to_string(),
        name,
        age,
        email,
    }
    .normalize()
    .map_err(|err| invalid_persisted(table.table(), id, err))?;
    Ok(Some(fields))
}

fn invalid_persisted(table: &str, id: &str, err: ValidationError) -> DataError {
    DataError::Format(format!("invalid row in {table} for `{id}`: {err}"))
}

fn load_student(conn: &Connection, id: &str) -> DataResult<Student> {
    let fields = load_person_fields(conn, PersonTable::Students, id)?
        .ok_or_else(|| DataError::not_found(EntityKind::Student, id))?;
    let courses = related_ids(
        conn,
        "SELECT course_id FROM enrollments WHERE student_id = ?1 ORDER BY course_id;",
        id,
    )?;
    Ok(Student::from_fields(id.to_string(), fields, courses))
}

fn load_instructor(conn: &Connection, id: &str) -> DataResult<Instructor> {
    let fields = load_person_fields(conn, PersonTable::Instructors, id)?
        .ok_or_else(|| DataError::not_found(EntityKind::Instructor, id))?;
    let courses = related_ids(
        conn,
        "SELECT course_id FROM courses WHERE instructor_id = ?1 ORDER BY course_id;",
        id,
    )?;
    Ok(Instructor::from_fields(id.to_string(), fields, courses))
}

fn load_course_fields(conn: &Connection, id: &str) -> DataResult<Option<CourseFields>> {
    let raw = conn
        .prepare_cached("SELECT course_name, instructor_id FROM courses WHERE course_id = ?1;")?
        .query_row([id], |row| {
            Ok(CourseDraft {
                course_id: id.to_string(),
                course_name: row.get(0)?,
                instructor_id: row.get(1)?,
            })
        })
        .optional()?;

    let Some(draft) = raw else {
        return Ok(None);
    };
    let (_, fields) = draft
        .normalize()
        .map_err(|err| invalid_persisted("courses", id, err))?;
    Ok(Some(fields))
}

fn load_course(conn: &Connection, id: &str) -> DataResult<Course> {
    let fields = load_course_fields(conn, id)?
        .ok_or_else(|| DataError::not_found(EntityKind::Course, id))?;
    let students = related_ids(
        conn,
        "SELECT student_id FROM enrollments WHERE course_id = ?1 ORDER BY student_id;",
        id,
    )?;
    Ok(Course::from_fields(id.to_string(), fields, students))
}

fn insert_course(conn: &Connection, draft: &CourseDraft) -> DataResult<String> {
    let (id, fields) = draft.normalize()?;
    if load_course_fields(conn, &id)?.is_some() {
        return Err(DataError::duplicate(EntityKind::Course, id));
    }
    require_instructor(conn, fields.instructor_id.as_deref())?;

    conn.execute(
        "INSERT INTO courses (course_id, course_name, instructor_id) VALUES (?1, ?2, ?3);",
        params![id, fields.course_name, fields.instructor_id],
    )?;
    Ok(id)
}

fn require_instructor(conn: &Connection, instructor_id: Option<&str>) -> DataResult<()> {
    let Some(id) = instructor_id else {
        return Ok(());
    };
    if row_exists(
        conn,
        "SELECT 1 FROM instructors WHERE instructor_id = ?1;",
        &[id],
    )? {
        Ok(())
    } else {
        Err(DataError::not_found(EntityKind::Instructor, id))
    }
}

fn insert_enrollment(conn: &Connection, student_id: &str, course_id: &str) -> DataResult<()> {
    let student_id = person_key(student_id);
    let course_id = course_key(course_id);

    if !row_exists(
        conn,
        "SELECT 1 FROM students WHERE student_id = ?1;",
        &[student_id.as_str()],
    )? {
        return Err(DataError::not_found(EntityKind::Student, student_id));
    }
    if !row_exists(
        conn,
        "SELECT 1 FROM courses WHERE course_id = ?1;",
        &[course_id.as_str()],
    )? {
        return Err(DataError::not_found(EntityKind::Course, course_id));
    }
    if row_exists(
        conn,
        "SELECT 1 FROM enrollments WHERE student_id = ?1 AND course_id = ?2;",
        &[student_id.as_str(), course_id.as_str()],
    )? {
        return Err(DataError::duplicate(
            EntityKind::Enrollment,
            enrollment_label(&student_id, &course_id),
        ));
    }

    conn.execute(
        "INSERT INTO enrollments (student_id, course_id) VALUES (?1, ?2);",
        [student_id.as_str(), course_id.as_str()],
    )?;
    Ok(())
}

fn row_exists(conn: &Connection, sql: &str, keys: &[&str]) -> DataResult<bool> {
    Ok(conn
        .prepare_cached(sql)?
        .exists(params_from_iter(keys.iter()))?)
}

fn related_ids(conn: &Connection, sql: &str, key: &str) -> DataResult<Vec<String>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let ids = stmt
        .query_map([key], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

/// Lists primary keys of `table` in ID order, optionally restricted by one
/// bound `filter` clause, with `LIMIT`/`OFFSET` pushed into SQL.
fn list_ids(
    conn: &Connection,
    table: &str,
    id_column: &str,
    filter: Option<(&str, String)>,
    query: &ListQuery,
) -> DataResult<Vec<String>> {
    let mut sql = format!("SELECT {id_column} FROM {table}");
    let mut bind_values: Vec<Value> = Vec::new();

    if let Some((clause, key)) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
        bind_values.push(Value::Text(key));
    }

    sql.push_str(&format!(" ORDER BY {id_column} ASC"));

    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }
    } else if query.offset > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        bind_values.push(Value::Integer(i64::from(query.offset)));
    }

    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params_from_iter(bind_values), |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

/// Import target writing through an open transaction.
struct SqlSink<'c> {
    conn: &'c Connection,
}

impl RecordSink for SqlSink<'_> {
    fn put_instructor(&mut self, draft: &PersonDraft) -> DataResult<String> {
        insert_person(self.conn, PersonTable::Instructors, draft)
    }

    fn put_student(&mut self, draft: &PersonDraft) -> DataResult<String> {
        insert_person(self.conn, PersonTable::Students, draft)
    }

    fn put_course(&mut self, draft: &CourseDraft) -> DataResult<String> {
        insert_course(self.conn, draft)
    }

    fn put_enrollment(&mut self, student_id: &str, course_id: &str) -> DataResult<()> {
        insert_enrollment(self.conn, student_id, course_id)
    }
}
