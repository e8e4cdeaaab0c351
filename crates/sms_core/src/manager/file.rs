//! File-backed data manager.
//!
//! # Responsibility
//! - Keep the full record set resident and answer reads from memory.
//! - Rewrite the whole backing file (JSON) or directory (CSV) after every
//!   successful mutation.
//!
//! # Invariants
//! - Enrollment is stored once, as `(student_id, course_id)` pairs; student
//!   and course lists are derived from it on read.
//! - Mutations are staged on a copy and only become visible once the
//!   backing store has been written, so memory never runs ahead of disk.
//! - Cascades mirror the SQLite schema: deleting a student or course drops
//!   its enrollments, deleting an instructor unassigns its courses.
//! - Single writer; no locking against other processes.

use super::{
    log_import, BackendKind, DataError, DataManager, DataResult, EntityKind, ExportFormat,
    ImportReport, ListQuery, RelatedTo,
};
use crate::model::course::{Course, CourseDraft, CourseFields, CoursePatch};
use crate::model::instructor::Instructor;
use crate::model::person::{PersonDraft, PersonFields, PersonPatch};
use crate::model::student::Student;
use crate::model::{course_key, person_key};
use crate::transfer::{self, enrollment_label, Dataset, RecordSink};
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Where a file-backed store persists itself.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileBacking {
    /// JSON file, or CSV directory.
    path: PathBuf,
    format: ExportFormat,
}

/// Data manager holding every record in memory, optionally file-backed.
#[derive(Debug, Default)]
pub struct FileDataManager {
    store: Store,
    backing: Option<FileBacking>,
}

impl FileDataManager {
    /// Creates an empty store that is never written anywhere.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the store from `path`, or starts empty if nothing exists there
    /// yet. The file (or directory) is created on the first mutation.
    ///
    /// Rows that fail validation while loading are skipped with a warning.
    pub fn open(path: impl Into<PathBuf>, format: ExportFormat) -> DataResult<Self> {
        let backing = FileBacking {
            path: path.into(),
            format,
        };
        let store = if backing.path.exists() {
            load_store(&backing)?
        } else {
            info!(
                "event=store_load module=file status=empty format={}",
                backing.format
            );
            Store::default()
        };

        Ok(Self {
            store,
            backing: Some(backing),
        })
    }

    /// Applies `op` to a staged copy, persists it, then publishes it.
    fn commit<T>(&mut self, op: impl FnOnce(&mut Store) -> DataResult<T>) -> DataResult<T> {
        let mut staged = self.store.clone();
        let value = op(&mut staged)?;
        self.persist(&staged)?;
        self.store = staged;
        Ok(value)
    }

    fn persist(&self, store: &Store) -> DataResult<()> {
        let Some(backing) = &self.backing else {
            return Ok(());
        };

        let started_at = Instant::now();
        match transfer::write_dataset(&backing.path, backing.format, &store.dataset()) {
            Ok(()) => {
                info!(
                    "event=store_save module=file status=ok format={} duration_ms={}",
                    backing.format,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    "event=store_save module=file status=error format={} error_code={}",
                    backing.format,
                    err.code()
                );
                Err(err)
            }
        }
    }
}

fn load_store(backing: &FileBacking) -> DataResult<Store> {
    let started_at = Instant::now();
    let batch = transfer::read_batch(&backing.path, backing.format)?;
    let mut store = Store::default();
    let report = transfer::apply_batch(batch, &mut store);

    for rejected in &report.rejected {
        warn!(
            "event=store_load module=file status=skip kind={} position={} error_code={}",
            rejected.kind,
            rejected.position,
            rejected.error.code()
        );
    }
    info!(
        "event=store_load module=file status=ok format={} loaded={} skipped={} duration_ms={}",
        backing.format,
        report.imported(),
        report.rejected.len(),
        started_at.elapsed().as_millis()
    );

    Ok(store)
}

impl DataManager for FileDataManager {
    fn backend(&self) -> BackendKind {
        if self.backing.is_some() {
            BackendKind::File
        } else {
            BackendKind::Memory
        }
    }

    fn location(&self) -> Option<&Path> {
        self.backing.as_ref().map(|backing| backing.path.as_path())
    }

    fn create_student(&mut self, draft: &PersonDraft) -> DataResult<String> {
        self.commit(|store| store.insert_student(draft))
    }

    fn get_student(&self, student_id: &str) -> DataResult<Student> {
        self.store.student(&person_key(student_id))
    }

    fn update_student(&mut self, student_id: &str, patch: &PersonPatch) -> DataResult<Student> {
        let key = person_key(student_id);
        self.commit(|store| {
            let current = store
                .students
                .get(&key)
                .ok_or_else(|| DataError::not_found(EntityKind::Student, key.as_str()))?;
            let next = patch.apply(current)?;
            store.students.insert(key.clone(), next);
            store.student(&key)
        })
    }

    fn delete_student(&mut self, student_id: &str) -> DataResult<()> {
        let key = person_key(student_id);
        self.commit(|store| store.remove_student(&key))?;
        info!("event=record_delete module=file status=ok kind=student");
        Ok(())
    }

    fn list_students(&self, query: &ListQuery) -> DataResult<Vec<Student>> {
        let allowed = self.store.related_students(query.related.as_ref());
        let ids = self
            .store
            .students
            .keys()
            .filter(|id| allowed.as_ref().map_or(true, |set| set.contains(*id)));
        query
            .paginate(ids)
            .into_iter()
            .map(|id| self.store.student(id))
            .collect()
    }

    fn create_instructor(&mut self, draft: &PersonDraft) -> DataResult<String> {
        self.commit(|store| store.insert_instructor(draft))
    }

    fn get_instructor(&self, instructor_id: &str) -> DataResult<Instructor> {
        self.store.instructor(&person_key(instructor_id))
    }

    fn update_instructor(
        &mut self,
        instructor_id: &str,
        patch: &PersonPatch,
    ) -> DataResult<Instructor> {
        let key = person_key(instructor_id);
        self.commit(|store| {
            let current = store
                .instructors
                .get(&key)
                .ok_or_else(|| DataError::not_found(EntityKind::Instructor, key.as_str()))?;
            let next = patch.apply(current)?;
            store.instructors.insert(key.clone(), next);
            store.instructor(&key)
        })
    }

    fn delete_instructor(&mut self, instructor_id: &str) -> DataResult<()> {
        let key = person_key(instructor_id);
        self.commit(|store| store.remove_instructor(&key))?;
        info!("event=record_delete module=file status=ok kind=instructor");
        Ok(())
    }

    fn list_instructors(&self, query: &ListQuery) -> DataResult<Vec<Instructor>> {
        let allowed = self.store.related_instructors(query.related.as_ref());
        let ids = self
            .store
            .instructors
            .keys()
            .filter(|id| allowed.as_ref().map_or(true, |set| set.contains(*id)));
        query
            .paginate(ids)
            .into_iter()
            .map(|id| self.store.instructor(id))
            .collect()
    }

    fn create_course(&mut self, draft: &CourseDraft) -> DataResult<String> {
        self.commit(|store| store.insert_course(draft))
    }

    fn get_course(&self, course_id: &str) -> DataResult<Course> {
        self.store.course(&course_key(course_id))
    }

    fn update_course(&mut self, course_id: &str, patch: &CoursePatch) -> DataResult<Course> {
        let key = course_key(course_id);
        self.commit(|store| {
            let current = store
                .courses
                .get(&key)
                .ok_or_else(|| DataError::not_found(EntityKind::Course, key.as_str()))?;
            let next = patch.apply(current)?;
            store.require_instructor(next.instructor_id.as_deref())?;
            store.courses.insert(key.clone(), next);
            store.course(&key)
        })
    }

    fn delete_course(&mut self, course_id: &str) -> DataResult<()> {
        let key = course_key(course_id);
        self.commit(|store| store.remove_course(&key))?;
        info!("event=record_delete module=file status=ok kind=course");
        Ok(())
    }

    fn list_courses(&self, query: &ListQuery) -> DataResult<Vec<Course>> {
        let allowed = self.store.related_courses(query.related.as_ref());
        let ids = self
            .store
            .courses
            .keys()
            .filter(|id| allowed.as_ref().map_or(true, |set| set.contains(*id)));
        query
            .paginate(ids)
            .into_iter()
            .map(|id| self.store.course(id))
            .collect()
    }

    fn enroll(&mut self, student_id: &str, course_id: &str) -> DataResult<()> {
        self.commit(|store| store.insert_enrollment(student_id, course_id))
    }

    fn unenroll(&mut self, student_id: &str, course_id: &str) -> DataResult<()> {
        let pair = (person_key(student_id), course_key(course_id));
        self.commit(|store| {
            if store.enrollments.remove(&pair) {
                Ok(())
            } else {
                Err(DataError::not_found(
                    EntityKind::Enrollment,
                    enrollment_label(&pair.0, &pair.1),
                ))
            }
        })
    }

    fn clear(&mut self) -> DataResult<()> {
        self.commit(|store| {
            *store = Store::default();
            Ok(())
        })?;
        info!("event=store_clear module=file status=ok");
        Ok(())
    }

    fn import(&mut self, path: &Path, format: ExportFormat) -> DataResult<ImportReport> {
        let batch = transfer::read_batch(path, format)?;
        let report = self.commit(|store| Ok(transfer::apply_batch(batch, store)))?;
        log_import(self.backend(), format, &report);
        Ok(report)
    }

    fn backup(&self, _destination: &Path) -> DataResult<()> {
        Err(DataError::Unsupported(
            "backup is only available for SQLite storage",
        ))
    }

    fn snapshot(&self) -> DataResult<Dataset> {
        Ok(self.store.dataset())
    }
}

/// Resident record set. Keys are normalized IDs.
#[derive(Debug, Clone, Default)]
struct Store {
    students: BTreeMap<String, PersonFields>,
    instructors: BTreeMap<String, PersonFields>,
    courses: BTreeMap<String, CourseFields>,
    enrollments: BTreeSet<(String, String)>,
}

impl Store {
    fn student(&self, id: &str) -> DataResult<Student> {
        let fields = self
            .students
            .get(id)
            .ok_or_else(|| DataError::not_found(EntityKind::Student, id))?;
        let courses = self
            .enrollments
            .iter()
            .filter(|(student_id, _)| student_id == id)
            .map(|(_, course_id)| course_id.clone())
            .collect();
        Ok(Student::from_fields(id.to_string(), fields.clone(), courses))
    }

    fn instructor(&self, id: &str) -> DataResult<Instructor> {
        let fields = self
            .instructors
            .get(id)
            .ok_or_else(|| DataError::not_found(EntityKind::Instructor, id))?;
        let courses = self
            .courses
            .iter()
            .filter(|(_, course)| course.instructor_id.as_deref() == Some(id))
            .map(|(course_id, _)| course_id.clone())
            .collect();
        Ok(Instructor::from_fields(
            id.to_string(),
            fields.clone(),
            courses,
        ))
    }

    fn course(&self, id: &str) -> DataResult<Course> {
        let fields = self
            .courses
            .get(id)
            .ok_or_else(|| DataError::not_found(EntityKind::Course, id))?;
        let students = self
            .enrollments
            .iter()
            .filter(|(_, course_id)| course_id == id)
            .map(|(student_id, _)| student_id.clone())
            .collect();
        Ok(Course::from_fields(id.to_string(), fields.clone(), students))
    }

    fn insert_student(&mut self, draft: &PersonDraft) -> DataResult<String> {
        let (id, fields) = draft.normalize()?;
        if self.students.contains_key(&id) {
            return Err(DataError::duplicate(EntityKind::Student, id));
        }
        self.students.insert(id.clone(), fields);
        Ok(id)
    }

    fn insert_instructor(&mut self, draft: &PersonDraft) -> DataResult<String> {
        let (id, fields) = draft.normalize()?;
        if self.instructors.contains_key(&id) {
            return Err(DataError::duplicate(EntityKind::Instructor, id));
        }
        self.instructors.insert(id.clone(), fields);
        Ok(id)
    }

    fn insert_course(&mut self, draft: &CourseDraft) -> DataResult<String> {
        let (id, fields) = draft.normalize()?;
        if self.courses.contains_key(&id) {
            return Err(DataError::duplicate(EntityKind::Course, id));
        }
        self.require_instructor(fields.instructor_id.as_deref())?;
        self.courses.insert(id.clone(), fields);
        Ok(id)
    }

    fn insert_enrollment(&mut self, student_id: &str, course_id: &str) -> DataResult<()> {
        let student_id = person_key(student_id);
        let course_id = course_key(course_id);
        if !self.students.contains_key(&student_id) {
            return Err(DataError::not_found(EntityKind::Student, student_id));
        }
        if !self.courses.contains_key(&course_id) {
            return Err(DataError::not_found(EntityKind::Course, course_id));
        }
        let label = enrollment_label(&student_id, &course_id);
        if !self.enrollments.insert((student_id, course_id)) {
            return Err(DataError::duplicate(EntityKind::Enrollment, label));
        }
        Ok(())
    }

    fn require_instructor(&self, instructor_id: Option<&str>) -> DataResult<()> {
        match instructor_id {
            Some(id) if !self.instructors.contains_key(id) => {
                Err(DataError::not_found(EntityKind::Instructor, id))
            }
            _ => Ok(()),
        }
    }

    fn remove_student(&mut self, id: &str) -> DataResult<()> {
        if self.students.remove(id).is_none() {
            return Err(DataError::not_found(EntityKind::Student, id));
        }
        self.enrollments.retain(|(student_id, _)| student_id != id);
        Ok(())
    }

    fn remove_instructor(&mut self, id: &str) -> DataResult<()> {
        if self.instructors.remove(id).is_none() {
            return Err(DataError::not_found(EntityKind::Instructor, id));
        }
        for course in self.courses.values_mut() {
            if course.instructor_id.as_deref() == Some(id) {
                course.instructor_id = None;
            }
        }
        Ok(())
    }

    fn remove_course(&mut self, id: &str) -> DataResult<()> {
        if self.courses.remove(id).is_none() {
            return Err(DataError::not_found(EntityKind::Course, id));
        }
        self.enrollments.retain(|(_, course_id)| course_id != id);
        Ok(())
    }

    fn courses_taught_by(&self, instructor_id: &str) -> BTreeSet<String> {
        self.courses
            .iter()
            .filter(|(_, course)| course.instructor_id.as_deref() == Some(instructor_id))
            .map(|(course_id, _)| course_id.clone())
            .collect()
    }

    fn courses_taken_by(&self, student_id: &str) -> BTreeSet<String> {
        self.enrollments
            .iter()
            .filter(|(id, _)| id == student_id)
            .map(|(_, course_id)| course_id.clone())
            .collect()
    }

    /// `None` means "no restriction".
    fn related_students(&self, related: Option<&RelatedTo>) -> Option<BTreeSet<String>> {
        let courses = match related? {
            RelatedTo::Student(id) => return Some(BTreeSet::from([person_key(id)])),
            RelatedTo::Course(id) => BTreeSet::from([course_key(id)]),
            RelatedTo::Instructor(id) => self.courses_taught_by(&person_key(id)),
        };
        Some(
            self.enrollments
                .iter()
                .filter(|(_, course_id)| courses.contains(course_id))
                .map(|(student_id, _)| student_id.clone())
                .collect(),
        )
    }

    fn related_instructors(&self, related: Option<&RelatedTo>) -> Option<BTreeSet<String>> {
        let courses = match related? {
            RelatedTo::Instructor(id) => return Some(BTreeSet::from([person_key(id)])),
            RelatedTo::Course(id) => BTreeSet::from([course_key(id)]),
            RelatedTo::Student(id) => self.courses_taken_by(&person_key(id)),
        };
        Some(
            courses
                .iter()
                .filter_map(|course_id| self.courses.get(course_id))
                .filter_map(|course| course.instructor_id.clone())
                .collect(),
        )
    }

    fn related_courses(&self, related: Option<&RelatedTo>) -> Option<BTreeSet<String>> {
        Some(match related? {
            RelatedTo::Course(id) => BTreeSet::from([course_key(id)]),
            RelatedTo::Instructor(id) => self.courses_taught_by(&person_key(id)),
            RelatedTo::Student(id) => self.courses_taken_by(&person_key(id)),
        })
    }

    fn dataset(&self) -> Dataset {
        // Keys come straight from the maps, so the lookups cannot miss.
        Dataset {
            students: self
                .students
                .keys()
                .filter_map(|id| self.student(id).ok())
                .collect(),
            instructors: self
                .instructors
                .keys()
                .filter_map(|id| self.instructor(id).ok())
                .collect(),
            courses: self
                .courses
                .keys()
                .filter_map(|id| self.course(id).ok())
                .collect(),
        }
    }
}

impl RecordSink for Store {
    fn put_instructor(&mut self, draft: &PersonDraft) -> DataResult<String> {
        self.insert_instructor(draft)
    }

    fn put_student(&mut self, draft: &PersonDraft) -> DataResult<String> {
        self.insert_student(draft)
    }

    fn put_course(&mut self, draft: &CourseDraft) -> DataResult<String> {
        self.insert_course(draft)
    }

    fn put_enrollment(&mut self, student_id: &str, course_id: &str) -> DataResult<()> {
        self.insert_enrollment(student_id, course_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> FileDataManager {
        let mut manager = FileDataManager::in_memory();
        manager
            .create_instructor(&PersonDraft::new("199801234", "Emily Smith", 45, None))
            .unwrap();
        manager
            .create_student(&PersonDraft::new("202401111", "John Doe", 20, None))
            .unwrap();
        manager
            .create_course(&CourseDraft::new("EECE230", "Software Engineering", Some("199801234")))
            .unwrap();
        manager.enroll("202401111", "eece230").unwrap();
        manager
    }

    #[test]
    fn in_memory_store_reports_memory_backend_without_location() {
        let manager = FileDataManager::in_memory();
        assert_eq!(manager.backend(), BackendKind::Memory);
        assert!(manager.location().is_none());
    }

    #[test]
    fn failed_mutation_leaves_store_untouched() {
        let mut manager = seeded();
        let before = manager.snapshot().unwrap();

        let patch = CoursePatch {
            instructor_id: Some(Some("199800000".to_string())),
            ..CoursePatch::default()
        };
        let err = manager.update_course("EECE230", &patch).unwrap_err();
        assert!(matches!(
            err,
            DataError::NotFound {
                kind: EntityKind::Instructor,
                ..
            }
        ));
        assert_eq!(manager.snapshot().unwrap(), before);
    }

    #[test]
    fn unenroll_missing_pair_is_not_found() {
        let mut manager = seeded();
        manager.unenroll("202401111", "EECE230").unwrap();
        let err = manager.unenroll("202401111", "EECE230").unwrap_err();
        assert!(matches!(
            err,
            DataError::NotFound {
                kind: EntityKind::Enrollment,
                ..
            }
        ));
    }

    #[test]
    fn backup_is_unsupported() {
        let manager = seeded();
        let err = manager.backup(Path::new("/tmp/unused.db")).unwrap_err();
        assert!(matches!(err, DataError::Unsupported(_)));
    }
}
