//! Field format predicates shared by models and import paths.
//!
//! # Responsibility
//! - Decide whether a raw user-entered value has an acceptable shape.
//! - Explain email rejections in a form the presentation layer can show.
//!
//! # Invariants
//! - Every predicate trims its input before checking.
//! - Empty input never passes.
//! - Predicates are pure and never panic.

use once_cell::sync::Lazy;
use regex::Regex;

/// Inclusive age bounds for any person record.
pub const MIN_AGE: i64 = 0;
pub const MAX_AGE: i64 = 120;

const COURSE_NAME_MIN_CHARS: usize = 4;
const COURSE_NAME_MAX_CHARS: usize = 100;
const EMAIL_MAX_CHARS: usize = 254;
const EMAIL_LOCAL_MAX_CHARS: usize = 64;

static PERSON_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}\p{M}' .\-]+$").expect("valid person name regex"));
static PERSON_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{9}$").expect("valid person id regex"));
static COURSE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{4}[0-9]{3}[A-Za-z]?$").expect("valid course id regex"));
static COURSE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9 '.,:&()/\-]+$").expect("valid course name regex"));
static EMAIL_LOCAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.+\-]+$").expect("valid email local regex"));
static EMAIL_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?$").expect("valid label regex"));

/// Returns whether `name` is an acceptable person name.
///
/// Letters from any script, combining marks, apostrophes, spaces, dots and
/// hyphens are accepted (`O'Neil`, `Jean-Luc`, `Zoë`).
pub fn validate_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty() && PERSON_NAME_RE.is_match(trimmed)
}

/// Returns whether `age` is inside [`MIN_AGE`]..=[`MAX_AGE`].
pub fn validate_age(age: i64) -> bool {
    (MIN_AGE..=MAX_AGE).contains(&age)
}

/// Returns whether `email` has a valid address shape.
pub fn validate_email(email: &str) -> bool {
    email_problem(email).is_none()
}

/// Explains why `email` is rejected, or `None` when it is acceptable.
pub fn email_problem(email: &str) -> Option<&'static str> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Some("the address is empty");
    }
    if trimmed.chars().count() > EMAIL_MAX_CHARS {
        return Some("the address is too long");
    }

    let Some((local, domain)) = trimmed.split_once('@') else {
        return Some("the address must contain an @-sign");
    };
    if domain.contains('@') {
        return Some("the address must contain exactly one @-sign");
    }

    if local.is_empty() {
        return Some("there must be something before the @-sign");
    }
    if local.chars().count() > EMAIL_LOCAL_MAX_CHARS {
        return Some("the part before the @-sign is too long");
    }
    if !EMAIL_LOCAL_RE.is_match(local) {
        return Some("the part before the @-sign contains invalid characters");
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return Some("the part before the @-sign has a misplaced period");
    }

    if domain.is_empty() {
        return Some("there must be something after the @-sign");
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Some("the domain name must contain a period");
    }
    if labels
        .iter()
        .any(|label| label.is_empty() || !EMAIL_LABEL_RE.is_match(label))
    {
        return Some("the domain name is not valid");
    }

    None
}

/// Returns whether `id` is a 9-digit student or instructor ID.
pub fn validate_id(id: &str) -> bool {
    PERSON_ID_RE.is_match(id.trim())
}

/// Returns whether `id` is a course code such as `EECE230` or `EECE435L`.
///
/// Case is not significant; stored codes are upper-cased by the model layer.
pub fn validate_course_id(id: &str) -> bool {
    COURSE_ID_RE.is_match(id.trim())
}

/// Returns whether `name` is an acceptable course title.
pub fn validate_course_name(name: &str) -> bool {
    let trimmed = name.trim();
    let length = trimmed.chars().count();
    (COURSE_NAME_MIN_CHARS..=COURSE_NAME_MAX_CHARS).contains(&length)
        && COURSE_NAME_RE.is_match(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_accept_unicode_and_punctuation() {
        assert!(validate_name("John Doe"));
        assert!(validate_name("  Zoë O'Neil-Smith  "));
        assert!(validate_name("Dr. Emily Smith"));
        assert!(!validate_name(""));
        assert!(!validate_name("   "));
        assert!(!validate_name("R2D2"));
        assert!(!validate_name("john@doe"));
    }

    #[test]
    fn age_bounds_are_inclusive() {
        assert!(validate_age(0));
        assert!(validate_age(120));
        assert!(!validate_age(-1));
        assert!(!validate_age(121));
    }

    #[test]
    fn email_shapes() {
        assert!(validate_email("a@b.com"));
        assert!(validate_email(" john.doe+sms@lau.edu.lb "));
        assert!(!validate_email("not-an-email"));
        assert!(!validate_email(""));
        assert!(!validate_email("a@b"));
        assert!(!validate_email("a@@b.com"));
        assert!(!validate_email(".a@b.com"));
        assert!(!validate_email("a@-b.com"));
        assert!(!validate_email("a@b..com"));
    }

    #[test]
    fn email_problem_explains_rejection() {
        assert_eq!(
            email_problem("not-an-email"),
            Some("the address must contain an @-sign")
        );
        assert_eq!(email_problem("a@b.com"), None);
    }

    #[test]
    fn person_ids_are_nine_digits_after_trim() {
        assert!(validate_id("202401111"));
        assert!(validate_id(" 202401111 "));
        assert!(!validate_id("123"));
        assert!(!validate_id("2024011110"));
        assert!(!validate_id("20240111a"));
        assert!(!validate_id(""));
    }

    #[test]
    fn course_ids_follow_code_shape() {
        assert!(validate_course_id("EECE230"));
        assert!(validate_course_id("eece435l"));
        assert!(!validate_course_id("EEC230"));
        assert!(!validate_course_id("EECE2300"));
        assert!(!validate_course_id(""));
    }

    #[test]
    fn course_names_have_length_and_charset_limits() {
        assert!(validate_course_name("Calculus III"));
        assert!(validate_course_name("Intro to C/Unix: Part (1)"));
        assert!(!validate_course_name("abc"));
        assert!(!validate_course_name(&"x".repeat(101)));
        assert!(!validate_course_name("Robotics #1"));
    }
}
