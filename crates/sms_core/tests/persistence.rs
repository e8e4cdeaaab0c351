use sms_core::transfer::{COURSES_FILE, ENROLLMENTS_FILE, INSTRUCTORS_FILE, STUDENTS_FILE};
use sms_core::{
    CourseDraft, DataError, DataManager, ExportFormat, FileDataManager, PersonDraft,
    SqliteDataManager,
};
use std::path::Path;
use std::fs;
use tempfile::TempDir;

fn seed(manager: &mut dyn DataManager) {
    manager
        .create_instructor(&PersonDraft::new("199801234", "Emily Smith", 45, None))
        .unwrap();
    manager
        .create_student(&PersonDraft::new(
            "202401111",
            "John Doe",
            20,
            Some("john.doe@lau.edu"),
        ))
        .unwrap();
    manager
        .create_course(&CourseDraft::new(
            "EECE230",
            "Software Engineering",
            Some("199801234"),
        ))
        .unwrap();
    manager.enroll("202401111", "EECE230").unwrap();
}

#[test]
fn file_store_reloads_what_it_wrote() {
    let dir = TempDir::new().unwrap();

    for (name, format) in [
        ("records.json", ExportFormat::Json),
        ("records", ExportFormat::Csv),
    ] {
        let path = dir.path().join(name);
        let written = {
            let mut manager = FileDataManager::open(&path, format).unwrap();
            assert!(!path.exists(), "nothing is written before the first change");
            seed(&mut manager);
            manager.delete_student("202401111").unwrap();
            manager
                .create_student(&PersonDraft::new("202302222", "Jane Dane", 21, None))
                .unwrap();
            manager.enroll("202302222", "EECE230").unwrap();
            manager.snapshot().unwrap()
        };

        let reopened = FileDataManager::open(&path, format).unwrap();
        assert_eq!(reopened.location(), Some(path.as_path()));
        assert_eq!(reopened.snapshot().unwrap(), written);
    }
}

#[test]
fn file_store_skips_invalid_rows_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    fs::write(
        &path,
        r#"{
            "students": [
                { "student_id": "202401111", "name": "John Doe", "age": 20 },
                { "student_id": "12", "name": "Bad Id", "age": 20 }
            ]
        }"#,
    )
    .unwrap();

    let manager = FileDataManager::open(&path, ExportFormat::Json).unwrap();
    let snapshot = manager.snapshot().unwrap();
    assert_eq!(snapshot.students.len(), 1);
    assert!(snapshot.courses.is_empty());
}

#[test]
fn file_store_rejects_unreadable_backing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    fs::write(&path, "not json").unwrap();

    let err = FileDataManager::open(&path, ExportFormat::Json).unwrap_err();
    assert!(matches!(err, DataError::Format(_)));
}

#[test]
fn failed_write_keeps_memory_in_step_with_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    let mut manager = FileDataManager::open(&path, ExportFormat::Json).unwrap();
    seed(&mut manager);
    let before = manager.snapshot().unwrap();

    // A directory in place of the backing file makes every save fail.
    fs::remove_file(&path).unwrap();
    fs::create_dir(&path).unwrap();

    let err = manager
        .create_student(&PersonDraft::new("202302222", "Jane Dane", 21, None))
        .unwrap_err();
    assert!(err.is_io());
    assert_eq!(manager.snapshot().unwrap(), before);
}

#[test]
fn failed_csv_save_leaves_every_table_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records");
    let mut manager = FileDataManager::open(&path, ExportFormat::Csv).unwrap();
    manager
        .create_instructor(&PersonDraft::new("199801234", "Emily Smith", 45, None))
        .unwrap();
    let students_before = fs::read_to_string(path.join(STUDENTS_FILE)).unwrap();

    fs::remove_file(path.join(COURSES_FILE)).unwrap();
    fs::create_dir(path.join(COURSES_FILE)).unwrap();

    let err = manager
        .create_student(&PersonDraft::new("202401111", "John Doe", 20, None))
        .unwrap_err();
    assert!(err.is_io());
    assert!(matches!(
        manager.get_student("202401111"),
        Err(DataError::NotFound { .. })
    ));

    let students_after = fs::read_to_string(path.join(STUDENTS_FILE)).unwrap();
    assert_eq!(students_after, students_before);
    assert!(!students_after.contains("202401111"));
    assert_eq!(
        file_names(&path),
        vec![COURSES_FILE, ENROLLMENTS_FILE, INSTRUCTORS_FILE, STUDENTS_FILE]
    );
}

#[test]
fn saves_leave_no_staging_files_behind() {
    let dir = TempDir::new().unwrap();
    let json_path = dir.path().join("records.json");
    let csv_path = dir.path().join("records");

    let mut json_store = FileDataManager::open(&json_path, ExportFormat::Json).unwrap();
    seed(&mut json_store);
    let mut csv_store = FileDataManager::open(&csv_path, ExportFormat::Csv).unwrap();
    seed(&mut csv_store);

    assert_eq!(file_names(dir.path()), vec!["records", "records.json"]);
    assert_eq!(
        file_names(&csv_path),
        vec![COURSES_FILE, ENROLLMENTS_FILE, INSTRUCTORS_FILE, STUDENTS_FILE]
    );
}

#[test]
fn sqlite_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sms.db");

    let written = {
        let mut manager = SqliteDataManager::open(&path).unwrap();
        seed(&mut manager);
        let snapshot = manager.snapshot().unwrap();
        manager.close().unwrap();
        snapshot
    };

    let reopened = SqliteDataManager::open(&path).unwrap();
    assert_eq!(reopened.snapshot().unwrap(), written);
}

#[test]
fn sqlite_backup_is_a_usable_database() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sms.db");
    let backup_path = dir.path().join("sms-backup.db");

    let mut manager = SqliteDataManager::open(&path).unwrap();
    seed(&mut manager);
    manager.backup(&backup_path).unwrap();

    manager.delete_course("EECE230").unwrap();

    let restored = SqliteDataManager::open(&backup_path).unwrap();
    let course = restored.get_course("EECE230").unwrap();
    assert_eq!(course.enrolled_students, vec!["202401111"]);
}

#[test]
fn backup_into_missing_directory_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let mut manager = SqliteDataManager::open(dir.path().join("sms.db")).unwrap();
    seed(&mut manager);

    let err = manager
        .backup(&dir.path().join("missing").join("backup.db"))
        .unwrap_err();
    assert!(matches!(err, DataError::Io { .. }));
}

#[test]
fn file_backed_store_has_no_backup() {
    let dir = TempDir::new().unwrap();
    let manager =
        FileDataManager::open(dir.path().join("records.json"), ExportFormat::Json).unwrap();

    let err = manager.backup(&dir.path().join("copy.json")).unwrap_err();
    assert!(matches!(err, DataError::Unsupported(_)));
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
