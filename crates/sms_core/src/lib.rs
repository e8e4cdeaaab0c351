//! Core record management for the school management system.
//! Validation, models and both storage backends live here; front ends talk
//! only to [`DataManager`].

pub mod config;
pub mod db;
pub mod logging;
pub mod manager;
pub mod model;
pub mod transfer;
pub mod validate;

pub use config::{open_data_manager, AppConfig, ConfigError, LogConfig, StorageConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use manager::{
    BackendKind, DataError, DataManager, DataResult, EntityKind, ExportFormat, FileDataManager,
    ImportReport, ListQuery, RejectedRow, RelatedTo, SqliteDataManager,
};
pub use model::course::{Course, CourseDraft, CoursePatch};
pub use model::instructor::Instructor;
pub use model::person::{Person, PersonDraft, PersonPatch};
pub use model::student::Student;
pub use model::ValidationError;
pub use transfer::Dataset;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
