//! Half-term calendar slots and the assignment table.
//!
//! # Responsibility
//! - Define the six fixed academic half-terms and their display metadata.
//! - Hold the ordered lesson list assigned to each half-term.
//!
//! # Invariants
//! - A table always holds exactly six slots in `HalfTermId::ALL` order.
//! - Slots are never created or destroyed at runtime.
//! - A lesson id appears in at most one slot. Deserialization rejects a
//!   table that breaks this; write paths enforce it through
//!   `service::half_term_service`.

use crate::model::lesson::LessonId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// One of the six fixed half-term periods of an academic year.
///
/// Variant order is academic-year order, which also drives `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HalfTermId {
    #[serde(rename = "A1")]
    Autumn1,
    #[serde(rename = "A2")]
    Autumn2,
    #[serde(rename = "SP1")]
    Spring1,
    #[serde(rename = "SP2")]
    Spring2,
    #[serde(rename = "SM1")]
    Summer1,
    #[serde(rename = "SM2")]
    Summer2,
}

impl HalfTermId {
    /// All half-terms in academic-year order.
    pub const ALL: [HalfTermId; 6] = [
        HalfTermId::Autumn1,
        HalfTermId::Autumn2,
        HalfTermId::Spring1,
        HalfTermId::Spring2,
        HalfTermId::Summer1,
        HalfTermId::Summer2,
    ];

    /// Slot used for units that carry no term.
    pub const UNSCHEDULED_BUCKET: HalfTermId = HalfTermId::Autumn1;

    /// Persisted short code (`A1`, `SP2`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Autumn1 => "A1",
            Self::Autumn2 => "A2",
            Self::Spring1 => "SP1",
            Self::Spring2 => "SP2",
            Self::Summer1 => "SM1",
            Self::Summer2 => "SM2",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Autumn1 => "Autumn 1",
            Self::Autumn2 => "Autumn 2",
            Self::Spring1 => "Spring 1",
            Self::Spring2 => "Spring 2",
            Self::Summer1 => "Summer 1",
            Self::Summer2 => "Summer 2",
        }
    }

    pub fn months(self) -> &'static str {
        match self {
            Self::Autumn1 => "September - October",
            Self::Autumn2 => "November - December",
            Self::Spring1 => "January - February",
            Self::Spring2 => "February - March",
            Self::Summer1 => "April - May",
            Self::Summer2 => "June - July",
        }
    }

    pub fn default_color(self) -> &'static str {
        match self {
            Self::Autumn1 => "#F59E0B",
            Self::Autumn2 => "#EA580C",
            Self::Spring1 => "#10B981",
            Self::Spring2 => "#059669",
            Self::Summer1 => "#3B82F6",
            Self::Summer2 => "#8B5CF6",
        }
    }

    /// Position in `HalfTermId::ALL`.
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl Display for HalfTermId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unknown half-term codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseHalfTermError(pub String);

impl Display for ParseHalfTermError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown half-term `{}`; expected A1|A2|SP1|SP2|SM1|SM2",
            self.0
        )
    }
}

impl Error for ParseHalfTermError {}

impl FromStr for HalfTermId {
    type Err = ParseHalfTermError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        HalfTermId::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| ParseHalfTermError(value.trim().to_string()))
    }
}

/// Persisted record for one half-term and its assigned lessons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalfTermSlot {
    pub id: HalfTermId,
    pub name: String,
    pub months: String,
    pub color: String,
    /// Assigned lesson ids in teaching order.
    pub lessons: Vec<LessonId>,
}

impl HalfTermSlot {
    /// Creates an empty slot with the fixed metadata for `id`.
    pub fn empty(id: HalfTermId) -> Self {
        Self {
            id,
            name: id.display_name().to_string(),
            months: id.months().to_string(),
            color: id.default_color().to_string(),
            lessons: Vec::new(),
        }
    }

    pub fn contains(&self, lesson_id: &str) -> bool {
        self.lessons.iter().any(|id| id == lesson_id)
    }
}

/// The six half-term slots of one academic year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<HalfTermSlot>", into = "Vec<HalfTermSlot>")]
pub struct HalfTermTable {
    slots: [HalfTermSlot; 6],
}

impl Default for HalfTermTable {
    fn default() -> Self {
        Self {
            slots: HalfTermId::ALL.map(HalfTermSlot::empty),
        }
    }
}

impl HalfTermTable {
    pub fn slot(&self, id: HalfTermId) -> &HalfTermSlot {
        &self.slots[id.index()]
    }

    pub(crate) fn slot_mut(&mut self, id: HalfTermId) -> &mut HalfTermSlot {
        &mut self.slots[id.index()]
    }

    /// All slots in academic-year order.
    pub fn slots(&self) -> &[HalfTermSlot] {
        &self.slots
    }

    /// Committed lessons of one slot.
    pub fn lessons(&self, id: HalfTermId) -> &[LessonId] {
        &self.slot(id).lessons
    }

    /// Returns the first slot holding `lesson_id`, if any.
    pub fn holder_of(&self, lesson_id: &str) -> Option<HalfTermId> {
        self.slots
            .iter()
            .find(|slot| slot.contains(lesson_id))
            .map(|slot| slot.id)
    }

    /// Total number of assigned lesson entries across all slots.
    pub fn assigned_count(&self) -> usize {
        self.slots.iter().map(|slot| slot.lessons.len()).sum()
    }
}

impl TryFrom<Vec<HalfTermSlot>> for HalfTermTable {
    type Error = String;

    /// Strict conversion used by serde: six distinct slots and no lesson in
    /// two slots. Lenient loading goes through
    /// `repo::repair::repair_half_terms`.
    fn try_from(value: Vec<HalfTermSlot>) -> Result<Self, Self::Error> {
        if value.len() != HalfTermId::ALL.len() {
            return Err(format!(
                "expected {} half-term slots, got {}",
                HalfTermId::ALL.len(),
                value.len()
            ));
        }
        let mut table = HalfTermTable::default();
        let mut seen = [false; 6];
        let mut holders: HashMap<&str, HalfTermId> = HashMap::new();
        for slot in &value {
            let index = slot.id.index();
            if seen[index] {
                return Err(format!("duplicate half-term slot `{}`", slot.id));
            }
            seen[index] = true;
            for lesson_id in &slot.lessons {
                match holders.insert(lesson_id.as_str(), slot.id) {
                    Some(held_by) if held_by != slot.id => {
                        return Err(format!(
                            "lesson `{lesson_id}` assigned to both `{held_by}` and `{}`",
                            slot.id
                        ));
                    }
                    _ => {}
                }
            }
        }
        for slot in value {
            let index = slot.id.index();
            table.slots[index] = slot;
        }
        Ok(table)
    }
}

impl From<HalfTermTable> for Vec<HalfTermSlot> {
    fn from(value: HalfTermTable) -> Self {
        value.slots.into()
    }
}

#[cfg(test)]
mod tests {
    use super::{HalfTermId, HalfTermSlot, HalfTermTable};

    #[test]
    fn codes_roundtrip_through_from_str() {
        for id in HalfTermId::ALL {
            assert_eq!(id.as_str().parse::<HalfTermId>().unwrap(), id);
        }
        assert_eq!(" sp2 ".parse::<HalfTermId>().unwrap(), HalfTermId::Spring2);
        assert!("W1".parse::<HalfTermId>().is_err());
    }

    #[test]
    fn serializes_as_short_codes() {
        let json = serde_json::to_string(&HalfTermId::Summer1).unwrap();
        assert_eq!(json, "\"SM1\"");
    }

    #[test]
    fn default_table_has_six_empty_slots_in_order() {
        let table = HalfTermTable::default();
        let ids: Vec<HalfTermId> = table.slots().iter().map(|slot| slot.id).collect();
        assert_eq!(ids, HalfTermId::ALL.to_vec());
        assert_eq!(table.assigned_count(), 0);
        assert_eq!(table.slot(HalfTermId::Spring1).name, "Spring 1");
    }

    #[test]
    fn strict_deserialize_rejects_missing_slots() {
        let slots = vec![HalfTermSlot::empty(HalfTermId::Autumn1)];
        let json = serde_json::to_string(&slots).unwrap();
        assert!(serde_json::from_str::<HalfTermTable>(&json).is_err());
    }

    #[test]
    fn strict_deserialize_rejects_lesson_held_by_two_slots() {
        let mut slots: Vec<HalfTermSlot> =
            HalfTermId::ALL.iter().map(|id| HalfTermSlot::empty(*id)).collect();
        slots[1].lessons = vec!["5".to_string()];
        slots[2].lessons = vec!["5".to_string(), "6".to_string()];
        let json = serde_json::to_string(&slots).unwrap();

        let err = serde_json::from_str::<HalfTermTable>(&json).unwrap_err();
        assert!(err.to_string().contains("lesson `5`"), "unexpected: {err}");

        slots[2].lessons = vec!["6".to_string()];
        let json = serde_json::to_string(&slots).unwrap();
        let table = serde_json::from_str::<HalfTermTable>(&json).unwrap();
        assert_eq!(table.holder_of("5"), Some(HalfTermId::Autumn2));
    }
}
