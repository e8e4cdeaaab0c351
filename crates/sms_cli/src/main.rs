//! `sms` command-line front end.
//!
//! # Responsibility
//! - Parse arguments, pick a backend and drive the `DataManager` interface.
//! - Print results to stdout and failures to stderr.
//!
//! # Invariants
//! - Only interface operations are called; no backend-specific code here.
//! - Any error exits with status 1.

mod render;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use log::warn;
use sms_core::{
    default_log_level, init_logging, open_data_manager, AppConfig, CourseDraft, CoursePatch,
    DataManager, ExportFormat, FileDataManager, ListQuery, PersonDraft, PersonPatch, RelatedTo,
    StorageConfig,
};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;

const NOTHING_TO_UPDATE: &str = "nothing to update; pass at least one field flag";

#[derive(Parser, Debug)]
#[command(name = "sms")]
#[command(version)]
#[command(about = "Manage students, instructors and courses", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use this SQLite database instead of the configured storage
    #[arg(long, global = true, conflicts_with = "json")]
    sqlite: Option<PathBuf>,

    /// Use this JSON file store instead of the configured storage
    #[arg(long, global = true)]
    json: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Absolute directory for rolling log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add a student
    AddStudent(PersonArgs),
    /// Add an instructor
    AddInstructor(PersonArgs),
    /// Add a course
    AddCourse(CourseArgs),

    /// Change fields of an existing student
    UpdateStudent(PersonUpdateArgs),
    /// Change fields of an existing instructor
    UpdateInstructor(PersonUpdateArgs),
    /// Change fields of an existing course
    UpdateCourse(CourseUpdateArgs),

    /// Delete a record (enrollments and assignments follow)
    Remove { entity: Entity, id: String },

    /// Print one record
    Show { entity: Entity, id: String },

    /// List records in ID order
    List {
        entity: Entity,
        #[command(flatten)]
        related: RelatedArgs,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Case-insensitive search over names and IDs
    Search { entity: Entity, query: String },

    /// Enroll a student in a course
    Enroll { student_id: String, course_id: String },
    /// Drop a student from a course
    Unenroll { student_id: String, course_id: String },

    /// Write every record to a JSON file or CSV directory
    Export {
        path: PathBuf,
        #[arg(long, default_value = "json")]
        format: ExportFormat,
    },

    /// Merge records from a JSON file or CSV directory
    Import {
        path: PathBuf,
        #[arg(long, default_value = "json")]
        format: ExportFormat,
        /// Remove every existing record first
        #[arg(long)]
        replace: bool,
    },

    /// Copy the SQLite database file
    Backup { destination: PathBuf },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Entity {
    Student,
    Instructor,
    Course,
}

#[derive(ClapArgs, Debug)]
struct PersonArgs {
    /// 9-digit ID
    id: String,
    name: String,
    #[arg(allow_negative_numbers = true)]
    age: i64,
    #[arg(long)]
    email: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct PersonUpdateArgs {
    id: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    age: Option<i64>,
    #[arg(long)]
    email: Option<String>,
    /// Remove the stored email address
    #[arg(long, conflicts_with = "email")]
    clear_email: bool,
}

#[derive(ClapArgs, Debug)]
struct CourseArgs {
    /// Course code, e.g. EECE230
    id: String,
    name: String,
    /// Instructor ID
    #[arg(long)]
    instructor: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct CourseUpdateArgs {
    id: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    instructor: Option<String>,
    /// Leave the course without an instructor
    #[arg(long, conflicts_with = "instructor")]
    unassign: bool,
}

#[derive(ClapArgs, Debug)]
#[group(multiple = false)]
struct RelatedArgs {
    /// Only records related to this student
    #[arg(long)]
    student: Option<String>,
    /// Only records related to this instructor
    #[arg(long)]
    instructor: Option<String>,
    /// Only records related to this course
    #[arg(long)]
    course: Option<String>,
}

impl RelatedArgs {
    fn into_related(self) -> Option<RelatedTo> {
        self.student
            .map(RelatedTo::Student)
            .or(self.instructor.map(RelatedTo::Instructor))
            .or(self.course.map(RelatedTo::Course))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> CliResult<()> {
    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    start_logging(&args, &config);

    let storage = if let Some(path) = &args.sqlite {
        StorageConfig::Sqlite { path: path.clone() }
    } else if let Some(path) = &args.json {
        StorageConfig::File {
            path: path.clone(),
            format: ExportFormat::Json,
        }
    } else {
        config.storage
    };
    let mut manager = open_data_manager(&storage)?;

    execute(manager.as_mut(), args.command)
}

fn start_logging(args: &Args, config: &AppConfig) {
    let level = args
        .log_level
        .as_deref()
        .or(config.log.level.as_deref())
        .unwrap_or(default_log_level());
    let Some(log_dir) = args
        .log_dir
        .clone()
        .or_else(|| config.log.dir.clone())
        .or_else(default_log_dir)
    else {
        return;
    };

    if let Err(err) = init_logging(level, &log_dir) {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn default_log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("sms").join("logs"))
}

fn execute(manager: &mut dyn DataManager, command: Commands) -> CliResult<()> {
    match command {
        Commands::AddStudent(person) => {
            let id = manager.create_student(&person.into_draft())?;
            println!("added student {id}");
        }
        Commands::AddInstructor(person) => {
            let id = manager.create_instructor(&person.into_draft())?;
            println!("added instructor {id}");
        }
        Commands::AddCourse(course) => {
            let draft = CourseDraft::new(course.id, course.name, course.instructor.as_deref());
            let id = manager.create_course(&draft)?;
            println!("added course {id}");
        }
        Commands::UpdateStudent(update) => {
            let id = update.id.clone();
            let patch = update.into_patch();
            if patch.is_empty() {
                return Err(NOTHING_TO_UPDATE.into());
            }
            let student = manager.update_student(&id, &patch)?;
            println!("{}", render::student(&student));
        }
        Commands::UpdateInstructor(update) => {
            let id = update.id.clone();
            let patch = update.into_patch();
            if patch.is_empty() {
                return Err(NOTHING_TO_UPDATE.into());
            }
            let instructor = manager.update_instructor(&id, &patch)?;
            println!("{}", render::instructor(&instructor));
        }
        Commands::UpdateCourse(update) => {
            let patch = CoursePatch {
                course_name: update.name,
                instructor_id: if update.unassign {
                    Some(None)
                } else {
                    update.instructor.map(Some)
                },
            };
            if patch.is_empty() {
                return Err(NOTHING_TO_UPDATE.into());
            }
            let course = manager.update_course(&update.id, &patch)?;
            println!("{}", render::course(&course));
        }
        Commands::Remove { entity, id } => {
            match entity {
                Entity::Student => manager.delete_student(&id)?,
                Entity::Instructor => manager.delete_instructor(&id)?,
                Entity::Course => manager.delete_course(&id)?,
            }
            println!("removed {}", id.trim());
        }
        Commands::Show { entity, id } => match entity {
            Entity::Student => println!("{}", render::student(&manager.get_student(&id)?)),
            Entity::Instructor => {
                println!("{}", render::instructor(&manager.get_instructor(&id)?))
            }
            Entity::Course => println!("{}", render::course(&manager.get_course(&id)?)),
        },
        Commands::List {
            entity,
            related,
            limit,
            offset,
        } => {
            let query = ListQuery {
                related: related.into_related(),
                limit,
                offset,
            };
            print_listing(manager, entity, |manager, entity| match entity {
                Entity::Student => Ok(render::students(&manager.list_students(&query)?)),
                Entity::Instructor => Ok(render::instructors(&manager.list_instructors(&query)?)),
                Entity::Course => Ok(render::courses(&manager.list_courses(&query)?)),
            })?;
        }
        Commands::Search { entity, query } => {
            print_listing(manager, entity, |manager, entity| match entity {
                Entity::Student => Ok(render::students(&manager.search_students(&query)?)),
                Entity::Instructor => {
                    Ok(render::instructors(&manager.search_instructors(&query)?))
                }
                Entity::Course => Ok(render::courses(&manager.search_courses(&query)?)),
            })?;
        }
        Commands::Enroll {
            student_id,
            course_id,
        } => {
            manager.enroll(&student_id, &course_id)?;
            println!("enrolled {} in {}", student_id.trim(), course_id.trim());
        }
        Commands::Unenroll {
            student_id,
            course_id,
        } => {
            manager.unenroll(&student_id, &course_id)?;
            println!("unenrolled {} from {}", student_id.trim(), course_id.trim());
        }
        Commands::Export { path, format } => {
            manager.export(&path, format)?;
            println!("exported to {}", path.display());
        }
        Commands::Import {
            path,
            format,
            replace,
        } => import(manager, &path, format, replace)?,
        Commands::Backup { destination } => {
            manager.backup(&destination)?;
            println!("backed up to {}", destination.display());
        }
    }
    Ok(())
}

fn print_listing(
    manager: &dyn DataManager,
    entity: Entity,
    render_rows: impl FnOnce(&dyn DataManager, Entity) -> CliResult<Vec<String>>,
) -> CliResult<()> {
    let rows = render_rows(manager, entity)?;
    if rows.is_empty() {
        println!("no records");
    }
    for row in rows {
        println!("{row}");
    }
    Ok(())
}

fn import(
    manager: &mut dyn DataManager,
    path: &Path,
    format: ExportFormat,
    replace: bool,
) -> CliResult<()> {
    if replace {
        // Reject an unreadable container before wiping anything.
        FileDataManager::in_memory().import(path, format)?;
        manager.clear()?;
    }

    let report = manager.import(path, format)?;
    println!("{}", render::import_summary(&report));
    for rejected in &report.rejected {
        warn!(
            "event=import_row module=cli status=rejected kind={} position={}",
            rejected.kind, rejected.position
        );
        println!("  {}", render::rejected_row(rejected));
    }
    Ok(())
}

impl PersonArgs {
    fn into_draft(self) -> PersonDraft {
        PersonDraft::new(self.id, self.name, self.age, self.email.as_deref())
    }
}

impl PersonUpdateArgs {
    fn into_patch(self) -> PersonPatch {
        PersonPatch {
            name: self.name,
            age: self.age,
            email: if self.clear_email {
                Some(None)
            } else {
                self.email.map(Some)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_parse() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn related_flags_map_to_filter() {
        let args = Args::try_parse_from(["sms", "list", "course", "--student", "202401111"])
            .expect("list should parse");
        let Commands::List { related, .. } = args.command else {
            panic!("expected list command");
        };
        assert_eq!(
            related.into_related(),
            Some(RelatedTo::Student("202401111".to_string()))
        );
    }

    #[test]
    fn related_flags_are_mutually_exclusive() {
        let result = Args::try_parse_from([
            "sms",
            "list",
            "student",
            "--course",
            "EECE230",
            "--instructor",
            "199801234",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn clear_email_produces_explicit_removal() {
        let args = Args::try_parse_from(["sms", "update-student", "202401111", "--clear-email"])
            .expect("update should parse");
        let Commands::UpdateStudent(update) = args.command else {
            panic!("expected update-student command");
        };
        assert_eq!(update.into_patch().email, Some(None));
    }

    #[test]
    fn update_without_fields_is_rejected() {
        let mut manager = FileDataManager::in_memory();
        manager
            .create_student(&PersonDraft::new("202401111", "John Doe", 20, None))
            .unwrap();
        manager
            .create_course(&CourseDraft::new("EECE230", "Software Engineering", None))
            .unwrap();

        for argv in [
            ["sms", "update-student", "202401111"],
            ["sms", "update-course", "EECE230"],
        ] {
            let args = Args::try_parse_from(argv).expect("update should parse");
            let err = execute(&mut manager, args.command).unwrap_err();
            assert_eq!(err.to_string(), NOTHING_TO_UPDATE);
        }
        assert_eq!(manager.get_student("202401111").unwrap().name, "John Doe");
    }

    #[test]
    fn commands_run_against_in_memory_store() {
        let mut manager = FileDataManager::in_memory();
        let commands = [
            vec!["sms", "add-instructor", "199801234", "Emily Smith", "45"],
            vec!["sms", "add-student", "202401111", "John Doe", "20"],
            vec!["sms", "add-course", "eece230", "Software Engineering", "--instructor", "199801234"],
            vec!["sms", "enroll", "202401111", "EECE230"],
        ];
        for argv in commands {
            let args = Args::try_parse_from(argv).expect("command should parse");
            execute(&mut manager, args.command).expect("command should succeed");
        }

        let course = manager.get_course("EECE230").unwrap();
        assert_eq!(course.enrolled_students, vec!["202401111"]);
    }
}
