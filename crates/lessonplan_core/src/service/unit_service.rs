//! Unit registry use-cases.
//!
//! # Responsibility
//! - Create, update, delete and query units in insertion order.
//! - Derive plain-text projections of rich-text descriptions for search.
//!
//! # Invariants
//! - Unit ids are unique among live units and every id issued or loaded
//!   during the session, including deleted ones.
//! - Deleting a unit never touches half-term assignments or the catalog.
//! - Query results keep registry insertion order.

use crate::config::PlannerConfig;
use crate::model::half_term::HalfTermId;
use crate::model::lesson::LessonCatalog;
use crate::model::unit::{Unit, UnitDraft, UnitId, UnitPatch};
use crate::service::{PlannerError, PlannerResult, ResolvedLessons};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

static HTML_BLOCK_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(p|div|br|li|ul|ol|h[1-6]|tr|td|th|blockquote)\b[^>]*>")
        .expect("valid block tag regex")
});
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static HTML_ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#x?[0-9a-fA-F]+|[a-zA-Z]+);").expect("valid entity regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Term constraint for `UnitRegistry::filter`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TermFilter {
    #[default]
    All,
    Term(HalfTermId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitFilter {
    /// Case-insensitive substring, matched as typed; blank matches everything.
    pub search_text: String,
    pub term: TermFilter,
}

/// In-memory unit collection owned by a session.
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    units: Vec<Unit>,
    issued_ids: HashSet<UnitId>,
}

impl UnitRegistry {
    pub fn new(units: Vec<Unit>) -> Self {
        let issued_ids = units.iter().map(|unit| unit.id.clone()).collect();
        Self { units, issued_ids }
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn get(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|unit| unit.id == id)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Replaces the live units, keeping every id seen so far reserved.
    pub(crate) fn replace_units(&mut self, units: Vec<Unit>) {
        self.issued_ids.extend(units.iter().map(|unit| unit.id.clone()));
        self.units = units;
    }

    /// Appends a unit built from `draft`; unspecified fields take defaults.
    pub fn create(
        &mut self,
        draft: UnitDraft,
        config: &PlannerConfig,
        now: DateTime<Utc>,
    ) -> Unit {
        let id = self.issue_id();
        let color = config.palette_color(self.units.len()).to_string();
        let unit = Unit::from_draft(id, draft, &config.default_unit_name, &color, now);
        self.units.push(unit.clone());
        unit
    }

    /// Merges `patch` into unit `id`.
    pub fn update(
        &mut self,
        id: &str,
        patch: UnitPatch,
        now: DateTime<Utc>,
    ) -> PlannerResult<Unit> {
        let unit = self
            .units
            .iter_mut()
            .find(|unit| unit.id == id)
            .ok_or_else(|| PlannerError::UnitNotFound(id.to_string()))?;
        unit.apply_patch(patch, now);
        Ok(unit.clone())
    }

    /// Removes unit `id` for good and returns it.
    pub fn delete(&mut self, id: &str) -> PlannerResult<Unit> {
        let position = self
            .units
            .iter()
            .position(|unit| unit.id == id)
            .ok_or_else(|| PlannerError::UnitNotFound(id.to_string()))?;
        Ok(self.units.remove(position))
    }

    pub fn filter(&self, filter: &UnitFilter) -> Vec<&Unit> {
        let blank = filter.search_text.trim().is_empty();
        let needle = filter.search_text.to_lowercase();
        self.units
            .iter()
            .filter(|unit| match filter.term {
                TermFilter::All => true,
                TermFilter::Term(term) => unit.term == Some(term),
            })
            .filter(|unit| {
                blank
                    || unit.name.to_lowercase().contains(&needle)
                    || html_to_text(&unit.description)
                        .to_lowercase()
                        .contains(&needle)
            })
            .collect()
    }

    /// Units per half-term; every term is present, unscheduled units go to
    /// `HalfTermId::UNSCHEDULED_BUCKET`.
    pub fn group_by_term(&self) -> BTreeMap<HalfTermId, Vec<Unit>> {
        let mut groups: BTreeMap<HalfTermId, Vec<Unit>> =
            HalfTermId::ALL.into_iter().map(|id| (id, Vec::new())).collect();
        for unit in &self.units {
            let key = unit.term.unwrap_or(HalfTermId::UNSCHEDULED_BUCKET);
            groups.entry(key).or_default().push(unit.clone());
        }
        groups
    }

    /// Units whose lesson list references `lesson_id`.
    pub fn units_containing(&self, lesson_id: &str) -> Vec<&Unit> {
        self.units
            .iter()
            .filter(|unit| unit.contains_lesson(lesson_id))
            .collect()
    }

    fn issue_id(&mut self) -> UnitId {
        loop {
            let candidate = Uuid::new_v4().to_string();
            if self.issued_ids.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// Read model for one unit against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitOverview {
    pub unit: Unit,
    pub resolved: ResolvedLessons,
}

pub fn unit_overview(unit: &Unit, catalog: &LessonCatalog) -> UnitOverview {
    UnitOverview {
        unit: unit.clone(),
        resolved: ResolvedLessons::resolve(&unit.lesson_numbers, catalog),
    }
}

/// Plain-text projection of an HTML fragment.
pub fn html_to_text(html: &str) -> String {
    let spaced = HTML_BLOCK_TAG_RE.replace_all(html, " ");
    let without_tags = HTML_TAG_RE.replace_all(&spaced, "");
    let decoded = HTML_ENTITY_RE.replace_all(&without_tags, |caps: &regex::Captures<'_>| {
        decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    });
    WHITESPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

fn decode_entity(entity: &str) -> Option<String> {
    let decoded = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        numeric => {
            let code = numeric.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)?
        }
    };
    Some(decoded.to_string())
}
