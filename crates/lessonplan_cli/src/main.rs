//! CLI probe for the planner core.
//!
//! # Responsibility
//! - Open a planner session over a database file (or an in-memory one).
//! - Print a deterministic summary for quick local sanity checks.
//!
//! Usage: `lessonplan_cli [DB_PATH]`
//!
//! Environment:
//! - `LESSONPLAN_LOG_DIR`: absolute directory; enables file logging.
//! - `LESSONPLAN_LOG_LEVEL`: log level, defaults to the build-mode level.
//! - `LESSONPLAN_CATALOG`: path to a lesson catalog JSON file.

use lessonplan_core::db::{open_db, open_db_in_memory};
use lessonplan_core::{
    core_version, default_log_level, init_logging, LessonCatalog, PlannerConfig, PlannerSession,
    SqliteStore,
};
use log::info;
use std::error::Error;
use std::process::ExitCode;

const LOG_DIR_ENV: &str = "LESSONPLAN_LOG_DIR";
const LOG_LEVEL_ENV: &str = "LESSONPLAN_LOG_LEVEL";
const CATALOG_ENV: &str = "LESSONPLAN_CATALOG";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("lessonplan_cli: {err}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    if let Ok(log_dir) = std::env::var(LOG_DIR_ENV) {
        let level =
            std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| default_log_level().to_string());
        init_logging(&level, &log_dir)?;
    }

    println!("lessonplan_core version={}", core_version());

    let conn = match std::env::args_os().nth(1) {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let catalog = match std::env::var_os(CATALOG_ENV) {
        Some(path) => LessonCatalog::from_json(&std::fs::read_to_string(path)?)?,
        None => LessonCatalog::default(),
    };

    let store = SqliteStore::try_new(&conn)?;
    let session = PlannerSession::open(store, catalog, PlannerConfig::default())?;

    for slot in session.half_terms().slots() {
        println!("half_term={} lessons={}", slot.id, slot.lessons.len());
    }
    println!("units={}", session.units().len());
    println!("catalog_lessons={}", session.catalog().len());

    info!(
        "event=cli_summary module=cli status=ok units={} assigned={}",
        session.units().len(),
        session.half_terms().assigned_count()
    );
    Ok(())
}
