use sms_core::transfer::{COURSES_FILE, ENROLLMENTS_FILE, INSTRUCTORS_FILE, STUDENTS_FILE};
use sms_core::{
    CourseDraft, DataError, DataManager, EntityKind, ExportFormat, FileDataManager, PersonDraft,
    SqliteDataManager, ValidationError,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn seeded(manager: &mut dyn DataManager) {
    manager
        .create_instructor(&PersonDraft::new(
            "199801234",
            "Emily Smith",
            45,
            Some("emily.smith@lau.edu"),
        ))
        .unwrap();
    manager
        .create_student(&PersonDraft::new("202401111", "John Doe", 20, None))
        .unwrap();
    manager
        .create_student(&PersonDraft::new(
            "202302222",
            "Jane O'Dane",
            21,
            Some("jane@lau.edu"),
        ))
        .unwrap();
    manager
        .create_course(&CourseDraft::new(
            "EECE230",
            "Software Engineering, Part (1)",
            Some("199801234"),
        ))
        .unwrap();
    manager
        .create_course(&CourseDraft::new("MATH201", "Calculus III", None))
        .unwrap();
    manager.enroll("202401111", "EECE230").unwrap();
    manager.enroll("202302222", "EECE230").unwrap();
    manager.enroll("202302222", "MATH201").unwrap();
}

fn roundtrip(
    source: &mut dyn DataManager,
    target: &mut dyn DataManager,
    path: &Path,
    format: ExportFormat,
) {
    seeded(source);
    source.export(path, format).unwrap();

    let report = target.import(path, format).unwrap();
    assert!(report.is_clean(), "rejected rows: {:?}", report.rejected);
    assert_eq!(report.instructors, 1);
    assert_eq!(report.students, 2);
    assert_eq!(report.courses, 2);
    assert_eq!(report.enrollments, 3);

    assert_eq!(target.snapshot().unwrap(), source.snapshot().unwrap());
}

#[test]
fn json_roundtrip_reproduces_records() {
    let dir = TempDir::new().unwrap();
    roundtrip(
        &mut FileDataManager::in_memory(),
        &mut FileDataManager::in_memory(),
        &dir.path().join("export.json"),
        ExportFormat::Json,
    );
}

#[test]
fn csv_roundtrip_reproduces_records() {
    let dir = TempDir::new().unwrap();
    roundtrip(
        &mut SqliteDataManager::open_in_memory().unwrap(),
        &mut SqliteDataManager::open_in_memory().unwrap(),
        &dir.path().join("export"),
        ExportFormat::Csv,
    );
}

#[test]
fn roundtrip_crosses_backends() {
    let dir = TempDir::new().unwrap();
    roundtrip(
        &mut SqliteDataManager::open_in_memory().unwrap(),
        &mut FileDataManager::in_memory(),
        &dir.path().join("from_sqlite.json"),
        ExportFormat::Json,
    );
    roundtrip(
        &mut FileDataManager::in_memory(),
        &mut SqliteDataManager::open_in_memory().unwrap(),
        &dir.path().join("from_memory"),
        ExportFormat::Csv,
    );
}

#[test]
fn csv_export_writes_one_file_per_table() {
    let dir = TempDir::new().unwrap();
    let export_dir = dir.path().join("export");
    let mut manager = FileDataManager::in_memory();
    seeded(&mut manager);
    manager.export(&export_dir, ExportFormat::Csv).unwrap();

    for name in [STUDENTS_FILE, INSTRUCTORS_FILE, COURSES_FILE, ENROLLMENTS_FILE] {
        assert!(export_dir.join(name).is_file(), "missing {name}");
    }

    let enrollments = fs::read_to_string(export_dir.join(ENROLLMENTS_FILE)).unwrap();
    assert_eq!(
        enrollments,
        "student_id,course_id\n202302222,EECE230\n202302222,MATH201\n202401111,EECE230\n"
    );

    let courses = fs::read_to_string(export_dir.join(COURSES_FILE)).unwrap();
    assert!(courses.contains("\"Software Engineering, Part (1)\""));
    assert!(courses.contains("MATH201,Calculus III,\n"));
}

#[test]
fn json_import_keeps_good_rows_and_reports_bad_ones() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mixed.json");
    fs::write(
        &path,
        r#"{
            "instructors": [
                { "instructor_id": "199801234", "name": "Emily Smith", "age": 45 }
            ],
            "students": [
                { "student_id": "202401111", "name": "John Doe", "age": 20,
                  "registered_courses": ["eece230", "PHYS210"] },
                { "student_id": "202302222", "name": "Jane Dane", "age": 130 },
                { "student_id": "202203333", "name": "Ali Hassan" },
                { "student_id": "202401111", "name": "John Again", "age": 20 }
            ],
            "courses": [
                { "course_id": "EECE230", "course_name": "Software Engineering",
                  "instructor_id": "199801234" },
                { "course_id": "MATH201", "course_name": "Calculus III",
                  "instructor_id": "199999999" }
            ]
        }"#,
    )
    .unwrap();

    for mut manager in [
        Box::new(FileDataManager::in_memory()) as Box<dyn DataManager>,
        Box::new(SqliteDataManager::open_in_memory().unwrap()),
    ] {
        let report = manager.import(&path, ExportFormat::Json).unwrap();
        assert_eq!(report.instructors, 1);
        assert_eq!(report.students, 1);
        assert_eq!(report.courses, 1);
        assert_eq!(report.enrollments, 1);
        assert_eq!(report.rejected.len(), 5);

        let bad_age = &report.rejected[0];
        assert_eq!(bad_age.kind, EntityKind::Student);
        assert_eq!(bad_age.position, 2);
        assert_eq!(bad_age.id.as_deref(), Some("202302222"));
        assert!(matches!(
            bad_age.error,
            DataError::Validation(ValidationError::InvalidAge(130))
        ));

        let missing_age = &report.rejected[1];
        assert_eq!(missing_age.position, 3);
        assert!(matches!(missing_age.error, DataError::Format(_)));

        let duplicate = &report.rejected[2];
        assert!(matches!(duplicate.error, DataError::Duplicate { .. }));

        let unknown_instructor = &report.rejected[3];
        assert_eq!(unknown_instructor.kind, EntityKind::Course);
        assert!(matches!(
            unknown_instructor.error,
            DataError::NotFound {
                kind: EntityKind::Instructor,
                ..
            }
        ));

        let unknown_course = &report.rejected[4];
        assert_eq!(unknown_course.kind, EntityKind::Enrollment);
        // Pairs are numbered in sorted order: EECE230 first, PHYS210 second.
        assert_eq!(unknown_course.position, 2);
        assert_eq!(unknown_course.id.as_deref(), Some("202401111/PHYS210"));

        let student = manager.get_student("202401111").unwrap();
        assert_eq!(student.name, "John Doe");
        assert_eq!(student.registered_courses, vec!["EECE230"]);
    }
}

#[test]
fn json_import_accepts_numeric_identifiers() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("numeric.json");
    fs::write(
        &path,
        r#"{
            "instructors": [
                { "instructor_id": 199801234, "name": "Emily Smith", "age": 45 }
            ],
            "students": [
                { "student_id": 202401111, "name": "John Doe", "age": 20 },
                { "student_id": 12, "name": "Short Id", "age": 20 },
                { "student_id": -202302222, "name": "Negative Id", "age": 20 }
            ],
            "courses": [
                { "course_id": "EECE230", "course_name": "Software Engineering",
                  "instructor_id": 199801234, "enrolled_students": [202401111] }
            ]
        }"#,
    )
    .unwrap();

    let mut manager = FileDataManager::in_memory();
    let report = manager.import(&path, ExportFormat::Json).unwrap();
    assert_eq!(report.instructors, 1);
    assert_eq!(report.students, 1);
    assert_eq!(report.courses, 1);
    assert_eq!(report.enrollments, 1);
    assert_eq!(report.rejected.len(), 2);

    let short_id = &report.rejected[0];
    assert_eq!(short_id.id.as_deref(), Some("12"));
    assert!(matches!(short_id.error, DataError::Validation(_)));
    let negative_id = &report.rejected[1];
    assert_eq!(negative_id.position, 3);
    assert!(matches!(negative_id.error, DataError::Format(_)));

    let student = manager.get_student("202401111").unwrap();
    assert_eq!(student.registered_courses, vec!["EECE230"]);
    let course = manager.get_course("EECE230").unwrap();
    assert_eq!(course.instructor_id.as_deref(), Some("199801234"));
}

#[test]
fn csv_import_reports_unparsable_cells_per_row() {
    let dir = TempDir::new().unwrap();
    let csv_dir = dir.path().join("input");
    fs::create_dir(&csv_dir).unwrap();
    fs::write(
        csv_dir.join(INSTRUCTORS_FILE),
        "instructor_id,name,age,email\n",
    )
    .unwrap();
    fs::write(
        csv_dir.join(STUDENTS_FILE),
        "student_id,name,age,email\n202401111, John Doe ,20,\n202302222,Jane Dane,old,\n",
    )
    .unwrap();
    fs::write(
        csv_dir.join(COURSES_FILE),
        "course_id,course_name,instructor_id\nmath201,Calculus III,\n",
    )
    .unwrap();
    fs::write(
        csv_dir.join(ENROLLMENTS_FILE),
        "student_id,course_id\n202401111,MATH201\n202302222,MATH201\n",
    )
    .unwrap();

    let mut manager = FileDataManager::in_memory();
    let report = manager.import(&csv_dir, ExportFormat::Csv).unwrap();
    assert_eq!(report.students, 1);
    assert_eq!(report.courses, 1);
    assert_eq!(report.enrollments, 1);
    assert_eq!(report.rejected.len(), 2);
    assert!(matches!(report.rejected[0].error, DataError::Format(_)));
    assert_eq!(report.rejected[0].id.as_deref(), Some("202302222"));
    assert!(matches!(
        report.rejected[1].error,
        DataError::NotFound {
            kind: EntityKind::Student,
            ..
        }
    ));

    let student = manager.get_student("202401111").unwrap();
    assert_eq!(student.name, "John Doe");
    assert_eq!(student.email, None);
    assert_eq!(student.registered_courses, vec!["MATH201"]);
}

#[test]
fn missing_or_malformed_container_fails_without_changes() {
    let dir = TempDir::new().unwrap();
    let mut manager = SqliteDataManager::open_in_memory().unwrap();
    seeded(&mut manager);
    let before = manager.snapshot().unwrap();

    let err = manager
        .import(&dir.path().join("absent.json"), ExportFormat::Json)
        .unwrap_err();
    assert!(matches!(err, DataError::Io { .. }));
    assert!(err.is_io());

    let err = manager
        .import(&dir.path().join("absent"), ExportFormat::Csv)
        .unwrap_err();
    assert!(matches!(err, DataError::Io { .. }));

    let partial = dir.path().join("partial");
    fs::create_dir(&partial).unwrap();
    fs::write(partial.join(STUDENTS_FILE), "student_id,name,age,email\n").unwrap();
    let err = manager.import(&partial, ExportFormat::Csv).unwrap_err();
    assert!(err.is_io());

    let garbage = dir.path().join("garbage.json");
    fs::write(&garbage, "[1, 2, 3]").unwrap();
    let err = manager.import(&garbage, ExportFormat::Json).unwrap_err();
    assert!(matches!(err, DataError::Format(_)));

    assert_eq!(manager.snapshot().unwrap(), before);
}

#[test]
fn clear_then_import_replaces_contents() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("export.json");

    let mut source = FileDataManager::in_memory();
    seeded(&mut source);
    source.export(&path, ExportFormat::Json).unwrap();

    let mut target = SqliteDataManager::open_in_memory().unwrap();
    target
        .create_student(&PersonDraft::new("209999999", "Old Record", 30, None))
        .unwrap();
    target.clear().unwrap();
    let report = target.import(&path, ExportFormat::Json).unwrap();

    assert!(report.is_clean());
    assert_eq!(target.snapshot().unwrap(), source.snapshot().unwrap());
}
