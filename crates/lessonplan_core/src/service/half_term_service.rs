//! Half-term assignment rules.
//!
//! # Responsibility
//! - Filter, stage, commit, reorder and remove lesson assignments per slot.
//!
//! # Invariants
//! - After any successful commit a lesson id appears in at most one slot.
//! - `reorder` shifts only the elements between the two indexes, each by one.
//! - Staged selections (`AssignmentDraft`) never touch committed state until
//!   they are committed.

use crate::model::half_term::{HalfTermId, HalfTermTable};
use crate::model::lesson::{LessonCatalog, LessonId};
use crate::service::{PlannerError, PlannerResult, ResolvedLessons};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Behavior when a committed lesson is already held by another slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Fail with `CrossSlotConflict` and change nothing.
    Reject,
    /// Unassign the lesson from its previous slot and report the move.
    #[default]
    Move,
}

/// A lesson taken from another slot during a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedLesson {
    pub lesson_id: LessonId,
    pub from: HalfTermId,
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub slot: HalfTermId,
    /// Committed list as stored.
    pub lessons: Vec<LessonId>,
    pub moved: Vec<MovedLesson>,
    /// Repeated ids removed from the input (first position kept).
    pub duplicates_dropped: Vec<LessonId>,
}

/// Lessons offerable for `slot`: already in it, or in no other slot.
///
/// Keeps `all_ids` order.
pub fn list_available_lessons(
    table: &HalfTermTable,
    slot: HalfTermId,
    all_ids: &[LessonId],
) -> Vec<LessonId> {
    let taken_elsewhere: HashSet<&str> = table
        .slots()
        .iter()
        .filter(|other| other.id != slot)
        .flat_map(|other| other.lessons.iter().map(String::as_str))
        .collect();
    all_ids
        .iter()
        .filter(|id| !taken_elsewhere.contains(id.as_str()))
        .cloned()
        .collect()
}

/// Removes `lesson_id` from `selection` if present, otherwise appends it.
pub fn toggle_assignment(selection: &[LessonId], lesson_id: &str) -> Vec<LessonId> {
    if selection.iter().any(|id| id == lesson_id) {
        return selection
            .iter()
            .filter(|id| *id != lesson_id)
            .cloned()
            .collect();
    }
    let mut next = selection.to_vec();
    next.push(lesson_id.to_string());
    next
}

/// Replaces the lessons of `slot` with `lessons`, in the given order.
///
/// Under `Move` a conflicting id is taken out of every other slot holding
/// it, with one `MovedLesson` per slot.
///
/// # Errors
/// - `CrossSlotConflict` for the first conflicting id when `policy` is
///   `Reject`; the table is unchanged in that case.
pub fn commit_assignment(
    table: &mut HalfTermTable,
    slot: HalfTermId,
    lessons: Vec<LessonId>,
    policy: ConflictPolicy,
) -> PlannerResult<CommitOutcome> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(lessons.len());
    let mut duplicates_dropped = Vec::new();
    for id in lessons {
        if seen.insert(id.clone()) {
            unique.push(id);
        } else {
            duplicates_dropped.push(id);
        }
    }

    let slots = table.slots();
    let conflicts: Vec<MovedLesson> = unique
        .iter()
        .flat_map(move |id| {
            slots
                .iter()
                .filter(move |other| other.id != slot && other.contains(id))
                .map(move |other| MovedLesson {
                    lesson_id: id.clone(),
                    from: other.id,
                })
        })
        .collect();

    if policy == ConflictPolicy::Reject {
        if let Some(conflict) = conflicts.into_iter().next() {
            return Err(PlannerError::CrossSlotConflict {
                lesson_id: conflict.lesson_id,
                held_by: conflict.from,
            });
        }
        return Ok(replace_lessons(table, slot, unique, Vec::new(), duplicates_dropped));
    }

    for conflict in &conflicts {
        table
            .slot_mut(conflict.from)
            .lessons
            .retain(|id| *id != conflict.lesson_id);
    }
    Ok(replace_lessons(table, slot, unique, conflicts, duplicates_dropped))
}

fn replace_lessons(
    table: &mut HalfTermTable,
    slot: HalfTermId,
    lessons: Vec<LessonId>,
    moved: Vec<MovedLesson>,
    duplicates_dropped: Vec<LessonId>,
) -> CommitOutcome {
    table.slot_mut(slot).lessons = lessons.clone();
    CommitOutcome {
        slot,
        lessons,
        moved,
        duplicates_dropped,
    }
}

/// Appends one lesson to `slot`; no-op when it is already there.
pub fn assign_lesson(
    table: &mut HalfTermTable,
    slot: HalfTermId,
    lesson_id: &str,
    policy: ConflictPolicy,
) -> PlannerResult<CommitOutcome> {
    let mut lessons = table.lessons(slot).to_vec();
    if !lessons.iter().any(|id| id == lesson_id) {
        lessons.push(lesson_id.to_string());
    }
    commit_assignment(table, slot, lessons, policy)
}

/// Moves the lesson at `from` to position `to` within `slot`.
pub fn reorder(
    table: &mut HalfTermTable,
    slot: HalfTermId,
    from: usize,
    to: usize,
) -> PlannerResult<()> {
    move_item(&mut table.slot_mut(slot).lessons, slot, from, to)
}

/// Removes every occurrence of `lesson_id` from `slot`; returns the count.
pub fn remove_lesson(table: &mut HalfTermTable, slot: HalfTermId, lesson_id: &str) -> usize {
    let lessons = &mut table.slot_mut(slot).lessons;
    let before = lessons.len();
    lessons.retain(|id| id != lesson_id);
    before - lessons.len()
}

fn move_item(
    list: &mut Vec<LessonId>,
    slot: HalfTermId,
    from: usize,
    to: usize,
) -> PlannerResult<()> {
    let len = list.len();
    for index in [from, to] {
        if index >= len {
            return Err(PlannerError::InvalidIndex { slot, index, len });
        }
    }
    let item = list.remove(from);
    list.insert(to, item);
    Ok(())
}

/// Staged selection for one slot during an edit session.
///
/// Dropping a draft discards it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentDraft {
    slot: HalfTermId,
    base: Vec<LessonId>,
    selection: Vec<LessonId>,
}

impl AssignmentDraft {
    /// Starts from the committed lessons of `slot`.
    pub fn begin(table: &HalfTermTable, slot: HalfTermId) -> Self {
        let base = table.lessons(slot).to_vec();
        Self {
            slot,
            selection: base.clone(),
            base,
        }
    }

    pub fn slot(&self) -> HalfTermId {
        self.slot
    }

    pub fn selection(&self) -> &[LessonId] {
        &self.selection
    }

    pub fn toggle(&mut self, lesson_id: &str) {
        self.selection = toggle_assignment(&self.selection, lesson_id);
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> PlannerResult<()> {
        move_item(&mut self.selection, self.slot, from, to)
    }

    /// Whether the selection differs from the list it started from.
    pub fn is_dirty(&self) -> bool {
        self.selection != self.base
    }

    pub fn into_selection(self) -> Vec<LessonId> {
        self.selection
    }
}

/// Read model for one half-term.
#[derive(Debug, Clone, PartialEq)]
pub struct HalfTermOverview {
    pub slot: HalfTermId,
    pub lesson_count: usize,
    pub resolved: ResolvedLessons,
}

pub fn half_term_overview(
    table: &HalfTermTable,
    slot: HalfTermId,
    catalog: &LessonCatalog,
) -> HalfTermOverview {
    let lessons = table.lessons(slot);
    HalfTermOverview {
        slot,
        lesson_count: lessons.len(),
        resolved: ResolvedLessons::resolve(lessons, catalog),
    }
}

#[cfg(test)]
mod tests {
    use super::{commit_assignment, move_item, toggle_assignment, ConflictPolicy, MovedLesson};
    use crate::model::half_term::{HalfTermId, HalfTermTable};
    use crate::service::PlannerError;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn move_item_shifts_only_the_span() {
        let mut list = ids(&["a", "b", "c", "d", "e"]);
        move_item(&mut list, HalfTermId::Autumn1, 3, 1).unwrap();
        assert_eq!(list, ids(&["a", "d", "b", "c", "e"]));
    }

    #[test]
    fn move_item_rejects_out_of_range() {
        let mut list = ids(&["a"]);
        let err = move_item(&mut list, HalfTermId::Spring2, 0, 1).unwrap_err();
        assert!(matches!(
            err,
            PlannerError::InvalidIndex {
                slot: HalfTermId::Spring2,
                index: 1,
                len: 1
            }
        ));
        assert_eq!(list, ids(&["a"]));
    }

    #[test]
    fn toggle_appends_then_removes() {
        let start = ids(&["1", "2"]);
        let added = toggle_assignment(&start, "3");
        assert_eq!(added, ids(&["1", "2", "3"]));
        assert_eq!(toggle_assignment(&added, "3"), start);
    }

    #[test]
    fn move_clears_every_other_slot_holding_the_lesson() {
        let mut table = HalfTermTable::default();
        table.slot_mut(HalfTermId::Autumn2).lessons = ids(&["5", "6"]);
        table.slot_mut(HalfTermId::Spring1).lessons = ids(&["5"]);

        let outcome =
            commit_assignment(&mut table, HalfTermId::Autumn1, ids(&["5"]), ConflictPolicy::Move)
                .unwrap();

        let holders: Vec<HalfTermId> = table
            .slots()
            .iter()
            .filter(|slot| slot.contains("5"))
            .map(|slot| slot.id)
            .collect();
        assert_eq!(holders, vec![HalfTermId::Autumn1]);
        assert_eq!(table.lessons(HalfTermId::Autumn2), ids(&["6"]).as_slice());
        assert_eq!(
            outcome.moved,
            vec![
                MovedLesson {
                    lesson_id: "5".to_string(),
                    from: HalfTermId::Autumn2,
                },
                MovedLesson {
                    lesson_id: "5".to_string(),
                    from: HalfTermId::Spring1,
                },
            ]
        );
    }
}
