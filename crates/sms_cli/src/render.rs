//! Plain-text rendering of records and import reports.

use sms_core::{Course, ImportReport, Instructor, Person, RejectedRow, Student};

pub fn student(student: &Student) -> String {
    person_line(student, "courses", &student.registered_courses)
}

pub fn instructor(instructor: &Instructor) -> String {
    person_line(instructor, "teaches", &instructor.assigned_courses)
}

pub fn course(course: &Course) -> String {
    format!(
        "{}  {}  instructor={}  students={}",
        course.course_id,
        course.course_name,
        course.instructor_id.as_deref().unwrap_or("-"),
        joined(&course.enrolled_students)
    )
}

pub fn students(students: &[Student]) -> Vec<String> {
    students.iter().map(student).collect()
}

pub fn instructors(instructors: &[Instructor]) -> Vec<String> {
    instructors.iter().map(instructor).collect()
}

pub fn courses(courses: &[Course]) -> Vec<String> {
    courses.iter().map(course).collect()
}

pub fn import_summary(report: &ImportReport) -> String {
    format!(
        "imported {} rows (instructors={} students={} courses={} enrollments={}), rejected {}",
        report.imported(),
        report.instructors,
        report.students,
        report.courses,
        report.enrollments,
        report.rejected.len()
    )
}

pub fn rejected_row(row: &RejectedRow) -> String {
    match &row.id {
        Some(id) => format!("{} row {} ({id}): {}", row.kind, row.position, row.error),
        None => format!("{} row {}: {}", row.kind, row.position, row.error),
    }
}

fn person_line(person: &impl Person, courses_label: &str, courses: &[String]) -> String {
    format!(
        "{}  {}  age={}  email={}  {courses_label}={}",
        person.id(),
        person.name(),
        person.age(),
        person.email().unwrap_or("-"),
        joined(courses)
    )
}

fn joined(ids: &[String]) -> String {
    if ids.is_empty() {
        "-".to_string()
    } else {
        ids.join(",")
    }
}
