//! Load-time schema repair for persisted planner documents.
//!
//! # Responsibility
//! - Decode stored JSON defensively into current record shapes.
//! - Fill fields missing from older records instead of rejecting them.
//!
//! # Invariants
//! - The only hard failure is a document that is not a JSON array; callers
//!   fall back to defaults for that case.
//! - Lesson references are kept as opaque strings; only non-string,
//!   non-numeric entries are dropped.
//! - Repairing an already-canonical document reports `changed == false`, so
//!   a healed document is not rewritten on every load.

use crate::config::PlannerConfig;
use crate::model::half_term::{HalfTermId, HalfTermSlot, HalfTermTable};
use crate::model::lesson::LessonId;
use crate::model::unit::{Unit, UnitId};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Document could not be decoded at all.
#[derive(Debug)]
pub enum RepairError {
    NotJson(serde_json::Error),
    NotArray(&'static str),
}

impl Display for RepairError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotJson(err) => write!(f, "document is not valid json: {err}"),
            Self::NotArray(found) => write!(f, "document must be a json array, got {found}"),
        }
    }
}

impl Error for RepairError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotJson(err) => Some(err),
            Self::NotArray(_) => None,
        }
    }
}

/// Outcome of a successful repair pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Repaired<T> {
    pub value: T,
    /// Whether the canonical form differs from what was stored.
    pub changed: bool,
    /// Human-readable notes, one per repaired defect.
    pub notes: Vec<String>,
}

/// Decodes the `units` document, filling defaults per record.
pub fn repair_units(
    raw: &str,
    config: &PlannerConfig,
    now: DateTime<Utc>,
) -> Result<Repaired<Vec<Unit>>, RepairError> {
    let (original, items) = parse_array(raw)?;
    let mut notes = Vec::new();
    let mut seen_ids: HashSet<UnitId> = HashSet::new();
    let mut units = Vec::with_capacity(items.len());

    for (position, item) in items.iter().enumerate() {
        let Some(record) = item.as_object() else {
            notes.push(format!("units[{position}]: dropped non-object entry"));
            continue;
        };
        let unit = repair_unit_record(
            record,
            position,
            units.len(),
            config,
            now,
            &mut seen_ids,
            &mut notes,
        );
        units.push(unit);
    }

    let changed = serde_json::to_value(&units).map_or(true, |canonical| canonical != original);
    Ok(Repaired {
        value: units,
        changed,
        notes,
    })
}

fn repair_unit_record(
    record: &Map<String, Value>,
    position: usize,
    registry_len: usize,
    config: &PlannerConfig,
    now: DateTime<Utc>,
    seen_ids: &mut HashSet<UnitId>,
    notes: &mut Vec<String>,
) -> Unit {
    let stored_id = match record.get("id") {
        Some(Value::Number(number)) => Some(number.to_string()),
        other => non_blank_str(other).map(str::to_string),
    };
    let id = match stored_id.as_deref() {
        Some(id) if !seen_ids.contains(id) => id.to_string(),
        Some(id) => {
            notes.push(format!("units[{position}]: duplicate id `{id}` replaced"));
            fresh_id(seen_ids)
        }
        None => {
            notes.push(format!("units[{position}]: missing id generated"));
            fresh_id(seen_ids)
        }
    };
    seen_ids.insert(id.clone());

    let name = match record.get("name").and_then(Value::as_str) {
        Some(name) => name.to_string(),
        None => {
            notes.push(format!("units[{position}]: missing name"));
            config.default_unit_name.clone()
        }
    };
    let description = record
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let lesson_numbers = lesson_ids_from(
        record.get("lessonNumbers"),
        &format!("units[{position}].lessonNumbers"),
        notes,
    );
    let color = match non_blank_str(record.get("color")) {
        Some(color) => color.to_string(),
        None => config.palette_color(registry_len).to_string(),
    };
    let term = match record.get("term") {
        None | Some(Value::Null) => None,
        Some(Value::String(code)) if code.trim().is_empty() => None,
        Some(Value::String(code)) => match code.parse::<HalfTermId>() {
            Ok(term) => Some(term),
            Err(err) => {
                notes.push(format!("units[{position}].term: {err}; cleared"));
                None
            }
        },
        Some(_) => {
            notes.push(format!("units[{position}].term: non-string value cleared"));
            None
        }
    };
    let created_at = timestamp_from(record.get("createdAt")).unwrap_or_else(|| {
        notes.push(format!("units[{position}].createdAt: defaulted to now"));
        now
    });
    let updated_at = timestamp_from(record.get("updatedAt"))
        .unwrap_or(created_at)
        .max(created_at);

    Unit {
        id,
        name,
        description,
        lesson_numbers,
        color,
        term,
        created_at,
        updated_at,
    }
}

/// Decodes the `half-terms` document into a full six-slot table.
pub fn repair_half_terms(raw: &str) -> Result<Repaired<HalfTermTable>, RepairError> {
    let (original, items) = parse_array(raw)?;
    let mut notes = Vec::new();
    let mut found: [Option<&Map<String, Value>>; 6] = [None; 6];

    for (position, item) in items.iter().enumerate() {
        let Some(record) = item.as_object() else {
            notes.push(format!("half-terms[{position}]: dropped non-object entry"));
            continue;
        };
        let Some(code) = record.get("id").and_then(Value::as_str) else {
            notes.push(format!("half-terms[{position}]: dropped entry without id"));
            continue;
        };
        let Ok(id) = code.parse::<HalfTermId>() else {
            notes.push(format!("half-terms[{position}]: dropped unknown slot `{code}`"));
            continue;
        };
        let index = id.index();
        if found[index].is_some() {
            notes.push(format!("half-terms[{position}]: dropped repeated slot `{id}`"));
            continue;
        }
        found[index] = Some(record);
    }

    let mut table = HalfTermTable::default();
    let mut assigned: HashSet<LessonId> = HashSet::new();
    for (id, record) in HalfTermId::ALL.into_iter().zip(found) {
        let slot = table.slot_mut(id);
        let Some(record) = record else {
            notes.push(format!("half-terms: slot `{id}` missing, defaulted"));
            continue;
        };
        *slot = repair_slot_record(id, record, &mut notes);
        slot.lessons.retain(|lesson_id| {
            if assigned.insert(lesson_id.clone()) {
                return true;
            }
            notes.push(format!(
                "half-terms[{id}]: lesson `{lesson_id}` already assigned earlier, dropped"
            ));
            false
        });
    }

    let changed = serde_json::to_value(&table).map_or(true, |canonical| canonical != original);
    Ok(Repaired {
        value: table,
        changed,
        notes,
    })
}

fn repair_slot_record(
    id: HalfTermId,
    record: &Map<String, Value>,
    notes: &mut Vec<String>,
) -> HalfTermSlot {
    let defaults = HalfTermSlot::empty(id);
    let text_or = |key: &str, fallback: String| {
        non_blank_str(record.get(key)).map_or(fallback, str::to_string)
    };
    HalfTermSlot {
        id,
        name: text_or("name", defaults.name),
        months: text_or("months", defaults.months),
        color: text_or("color", defaults.color),
        lessons: lesson_ids_from(
            record.get("lessons"),
            &format!("half-terms[{id}].lessons"),
            notes,
        ),
    }
}

fn parse_array(raw: &str) -> Result<(Value, Vec<Value>), RepairError> {
    let value: Value = serde_json::from_str(raw).map_err(RepairError::NotJson)?;
    let items = match &value {
        Value::Array(items) => items.clone(),
        Value::Null => return Err(RepairError::NotArray("null")),
        Value::Bool(_) => return Err(RepairError::NotArray("boolean")),
        Value::Number(_) => return Err(RepairError::NotArray("number")),
        Value::String(_) => return Err(RepairError::NotArray("string")),
        Value::Object(_) => return Err(RepairError::NotArray("object")),
    };
    Ok((value, items))
}

/// Reads an id list, accepting strings and numbers. Within-list repeats are
/// kept here; slot-level dedupe happens in `repair_half_terms`.
fn lesson_ids_from(
    value: Option<&Value>,
    context: &str,
    notes: &mut Vec<String>,
) -> Vec<LessonId> {
    let Some(value) = value else {
        return Vec::new();
    };
    let Some(items) = value.as_array() else {
        if !value.is_null() {
            notes.push(format!("{context}: expected array, reset to empty"));
        }
        return Vec::new();
    };
    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(id) => ids.push(id.clone()),
            Value::Number(number) => ids.push(number.to_string()),
            other => notes.push(format!("{context}: dropped non-id entry {other}")),
        }
    }
    ids
}

fn timestamp_from(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)),
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

fn non_blank_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

fn fresh_id(taken: &HashSet<UnitId>) -> UnitId {
    loop {
        let candidate = Uuid::new_v4().to_string();
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
}
