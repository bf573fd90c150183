//! Planning use-cases.
//!
//! # Responsibility
//! - Implement unit registry and half-term assignment rules over in-memory
//!   structures, independent of storage.
//! - Report rule violations as typed, recoverable errors.
//!
//! # Invariants
//! - No operation here performs I/O; `session` persists results.
//! - A failed operation leaves its input structure unchanged.

use crate::model::half_term::HalfTermId;
use crate::model::lesson::{Lesson, LessonCatalog, LessonId};
use crate::model::unit::UnitId;
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod half_term_service;
pub mod unit_service;

pub type PlannerResult<T> = Result<T, PlannerError>;

/// Errors from planner operations. None of them is fatal to a session.
#[derive(Debug)]
pub enum PlannerError {
    /// Referenced unit does not exist.
    UnitNotFound(UnitId),
    /// Reorder index outside `0..len`.
    InvalidIndex {
        slot: HalfTermId,
        index: usize,
        len: usize,
    },
    /// Lesson is already committed to another half-term.
    CrossSlotConflict {
        lesson_id: LessonId,
        held_by: HalfTermId,
    },
    /// Persisting the mutation failed; in-memory state was not changed.
    Store(StoreError),
}

impl Display for PlannerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnitNotFound(id) => write!(f, "unit not found: {id}"),
            Self::InvalidIndex { slot, index, len } => write!(
                f,
                "index {index} out of range for half-term {slot} with {len} lessons"
            ),
            Self::CrossSlotConflict { lesson_id, held_by } => write!(
                f,
                "lesson {lesson_id} is already assigned to half-term {held_by}"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PlannerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for PlannerError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Lesson references resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedLessons {
    /// Catalog lessons in reference order.
    pub lessons: Vec<Lesson>,
    /// References with no catalog entry, in reference order.
    pub dangling: Vec<LessonId>,
    /// Sum of resolved lesson durations, in minutes.
    pub total_duration: u32,
}

impl ResolvedLessons {
    pub fn resolve<'a>(ids: impl IntoIterator<Item = &'a LessonId>, catalog: &LessonCatalog) -> Self {
        let mut resolved = Self::default();
        for id in ids {
            match catalog.get(id) {
                Some(lesson) => {
                    resolved.total_duration =
                        resolved.total_duration.saturating_add(lesson.total_duration);
                    resolved.lessons.push(lesson.clone());
                }
                None => resolved.dangling.push(id.clone()),
            }
        }
        resolved
    }
}
