//! Unit domain model.
//!
//! # Responsibility
//! - Define the user-created grouping of lessons ("unit") and its partial
//!   create/update shapes.
//!
//! # Invariants
//! - `id` is assigned once at creation and never changes.
//! - `updated_at` is refreshed on every mutation and is never earlier than
//!   `created_at` for records created by this crate.
//! - `lesson_numbers` may reference lessons missing from the catalog; those
//!   entries are kept verbatim until the user removes them.

use crate::model::half_term::HalfTermId;
use crate::model::lesson::LessonId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable unit identifier.
///
/// Newly created units get a UUID v4 string; older stored records may carry
/// any non-blank string and keep it.
pub type UnitId = String;

/// Placeholder name for units created without one.
pub const DEFAULT_UNIT_NAME: &str = "New Unit";

/// Colors handed out to new units in rotation.
pub const UNIT_COLOR_PALETTE: [&str; 8] = [
    "#3B82F6", "#10B981", "#F59E0B", "#EF4444", "#8B5CF6", "#EC4899", "#06B6D4", "#84CC16",
];

/// Persisted unit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    /// Rich-text (HTML) body.
    pub description: String,
    /// Ordered lesson references; duplicates are tolerated.
    pub lesson_numbers: Vec<LessonId>,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<HalfTermId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Unit {
    /// Builds a unit from a draft, filling unspecified fields from defaults.
    pub(crate) fn from_draft(
        id: UnitId,
        draft: UnitDraft,
        default_name: &str,
        default_color: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: draft.name.unwrap_or_else(|| default_name.to_string()),
            description: draft.description.unwrap_or_default(),
            lesson_numbers: draft.lesson_numbers.unwrap_or_default(),
            color: draft.color.unwrap_or_else(|| default_color.to_string()),
            term: draft.term,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges `patch` into this record and stamps `updated_at`.
    pub fn apply_patch(&mut self, patch: UnitPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(lesson_numbers) = patch.lesson_numbers {
            self.lesson_numbers = lesson_numbers;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(term) = patch.term {
            self.term = term;
        }
        // Clock skew between sessions must not move updated_at backwards.
        self.updated_at = now.max(self.created_at);
    }

    pub fn contains_lesson(&self, lesson_id: &str) -> bool {
        self.lesson_numbers.iter().any(|id| id == lesson_id)
    }
}

/// Create request; `None` fields take defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitDraft {
    pub name: Option<String>,
    pub description: Option<String>,
    pub lesson_numbers: Option<Vec<LessonId>>,
    pub color: Option<String>,
    pub term: Option<HalfTermId>,
}

impl UnitDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_lessons<I, L>(mut self, lessons: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<LessonId>,
    {
        self.lesson_numbers = Some(lessons.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_term(mut self, term: HalfTermId) -> Self {
        self.term = Some(term);
        self
    }
}

/// Partial update. `term: Some(None)` clears the term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub lesson_numbers: Option<Vec<LessonId>>,
    pub color: Option<String>,
    pub term: Option<Option<HalfTermId>>,
}

#[cfg(test)]
mod tests {
    use super::{Unit, UnitDraft, UnitPatch, DEFAULT_UNIT_NAME};
    use crate::model::half_term::HalfTermId;
    use chrono::{Duration, TimeZone, Utc};

    fn sample() -> Unit {
        let now = Utc.with_ymd_and_hms(2024, 9, 2, 8, 30, 0).unwrap();
        Unit::from_draft(
            "u-1".to_string(),
            UnitDraft::named("Term 1 Songs")
                .with_lessons(["1", "2"])
                .with_term(HalfTermId::Autumn1),
            DEFAULT_UNIT_NAME,
            "#3B82F6",
            now,
        )
    }

    #[test]
    fn draft_defaults_fill_missing_fields() {
        let now = Utc::now();
        let unit = Unit::from_draft(
            "u-2".to_string(),
            UnitDraft::default(),
            DEFAULT_UNIT_NAME,
            "#10B981",
            now,
        );
        assert_eq!(unit.name, DEFAULT_UNIT_NAME);
        assert!(unit.description.is_empty());
        assert!(unit.lesson_numbers.is_empty());
        assert_eq!(unit.color, "#10B981");
        assert_eq!(unit.term, None);
        assert_eq!(unit.created_at, unit.updated_at);
    }

    #[test]
    fn patch_clears_term_and_refreshes_updated_at() {
        let mut unit = sample();
        let later = unit.created_at + Duration::minutes(5);
        unit.apply_patch(
            UnitPatch {
                name: Some("Renamed".to_string()),
                term: Some(None),
                ..UnitPatch::default()
            },
            later,
        );
        assert_eq!(unit.name, "Renamed");
        assert_eq!(unit.term, None);
        assert_eq!(unit.lesson_numbers, vec!["1", "2"]);
        assert_eq!(unit.updated_at, later);
    }

    #[test]
    fn serializes_camel_case_and_omits_unset_term() {
        let mut unit = sample();
        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["lessonNumbers"], serde_json::json!(["1", "2"]));
        assert_eq!(json["term"], "A1");
        assert!(json.get("createdAt").is_some());

        unit.term = None;
        let json = serde_json::to_value(&unit).unwrap();
        assert!(json.get("term").is_none());
    }
}
