//! Core planning logic for lesson units and half-term assignments.
//! Hosts drive everything through `PlannerSession`; nothing here holds
//! process-global planner state.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod session;
pub mod store;

pub use config::{ConfigError, PlannerConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::half_term::{HalfTermId, HalfTermSlot, HalfTermTable, ParseHalfTermError};
pub use model::lesson::{Activity, CatalogError, Lesson, LessonCatalog, LessonId};
pub use model::unit::{Unit, UnitDraft, UnitId, UnitPatch};
pub use repo::document_repo::{DocumentRepository, LoadSource, Loaded};
pub use service::half_term_service::{
    AssignmentDraft, CommitOutcome, ConflictPolicy, HalfTermOverview, MovedLesson,
};
pub use service::unit_service::{TermFilter, UnitFilter, UnitOverview, UnitRegistry};
pub use service::{PlannerError, PlannerResult, ResolvedLessons};
pub use session::{PlannerSession, RefreshOutcome, SessionRefresh};
pub use store::{KeyValueStore, MemoryStore, SqliteStore, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
