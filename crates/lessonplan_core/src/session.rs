//! Session-scoped planner state.
//!
//! # Responsibility
//! - Own the unit registry and half-term table for one host session.
//! - Mirror every successful mutation to the document store.
//!
//! # Invariants
//! - Each mutation is computed on a copy, persisted as a full document and
//!   only then swapped in. A failed save leaves in-memory state unchanged.
//! - There is no process-global planner state; hosts hold a session value.

use crate::config::PlannerConfig;
use crate::model::half_term::{HalfTermId, HalfTermTable};
use crate::model::lesson::{LessonCatalog, LessonId};
use crate::model::unit::{Unit, UnitDraft, UnitPatch};
use crate::repo::document_repo::{DocumentRepository, LoadSource, Loaded};
use crate::service::half_term_service::{
    self, AssignmentDraft, CommitOutcome, HalfTermOverview,
};
use crate::service::unit_service::{self, UnitFilter, UnitOverview, UnitRegistry};
use crate::service::{PlannerError, PlannerResult};
use crate::store::{KeyValueStore, Revision};
use chrono::Utc;
use log::{info, warn};
use std::collections::BTreeMap;

/// What `refresh` did with one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Stored document replaced the in-memory one.
    Applied(LoadSource),
    /// Stored revision matches what the session already holds.
    Unchanged,
    /// Stored document predates this session's last write; ignored.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRefresh {
    pub units: RefreshOutcome,
    pub half_terms: RefreshOutcome,
}

/// Loaded planner documents plus the store they are mirrored to.
pub struct PlannerSession<S: KeyValueStore> {
    repo: DocumentRepository<S>,
    catalog: LessonCatalog,
    config: PlannerConfig,
    registry: UnitRegistry,
    table: HalfTermTable,
    units_revision: Revision,
    half_terms_revision: Revision,
}

impl<S: KeyValueStore> PlannerSession<S> {
    /// Loads both documents, self-healing absent or damaged ones.
    ///
    /// # Errors
    /// - `PlannerError::Store` when the store cannot be read or the healed
    ///   document cannot be written back.
    pub fn open(store: S, catalog: LessonCatalog, config: PlannerConfig) -> PlannerResult<Self> {
        let mut repo = DocumentRepository::new(store);
        let units = repo.load_units(&config, Utc::now())?;
        let half_terms = repo.load_half_terms()?;
        info!(
            "event=session_open module=session status=ok units={} units_source={:?} half_terms_source={:?} assigned={} catalog={}",
            units.value.len(),
            units.source,
            half_terms.source,
            half_terms.value.assigned_count(),
            catalog.len()
        );
        Ok(Self {
            repo,
            catalog,
            config,
            registry: UnitRegistry::new(units.value),
            table: half_terms.value,
            units_revision: units.revision,
            half_terms_revision: half_terms.revision,
        })
    }

    pub fn units(&self) -> &[Unit] {
        self.registry.units()
    }

    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.registry.get(id)
    }

    pub fn half_terms(&self) -> &HalfTermTable {
        &self.table
    }

    pub fn catalog(&self) -> &LessonCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Revisions of the units and half-terms documents this session holds.
    pub fn revisions(&self) -> (Revision, Revision) {
        (self.units_revision, self.half_terms_revision)
    }

    pub fn create_unit(&mut self, draft: UnitDraft) -> PlannerResult<Unit> {
        let mut next = self.registry.clone();
        let unit = next.create(draft, &self.config, Utc::now());
        self.persist_units(next)?;
        info!(
            "event=unit_create module=session status=ok unit_id={} lessons={}",
            unit.id,
            unit.lesson_numbers.len()
        );
        Ok(unit)
    }

    /// Merges `patch` into unit `id` and refreshes its `updated_at`.
    ///
    /// # Errors
    /// - `UnitNotFound` when `id` is not a live unit.
    pub fn update_unit(&mut self, id: &str, patch: UnitPatch) -> PlannerResult<Unit> {
        let mut next = self.registry.clone();
        let unit = next.update(id, patch, Utc::now())?;
        self.persist_units(next)?;
        info!("event=unit_update module=session status=ok unit_id={id}");
        Ok(unit)
    }

    /// Deletes unit `id`. Half-term assignments are left as they are.
    pub fn delete_unit(&mut self, id: &str) -> PlannerResult<Unit> {
        let mut next = self.registry.clone();
        let unit = next.delete(id)?;
        self.persist_units(next)?;
        info!("event=unit_delete module=session status=ok unit_id={id}");
        Ok(unit)
    }

    pub fn filter_units(&self, filter: &UnitFilter) -> Vec<&Unit> {
        self.registry.filter(filter)
    }

    pub fn group_units_by_term(&self) -> BTreeMap<HalfTermId, Vec<Unit>> {
        self.registry.group_by_term()
    }

    pub fn units_containing(&self, lesson_id: &str) -> Vec<&Unit> {
        self.registry.units_containing(lesson_id)
    }

    /// Catalog lessons offerable for `slot`, in catalog order.
    pub fn available_lessons(&self, slot: HalfTermId) -> Vec<LessonId> {
        half_term_service::list_available_lessons(&self.table, slot, &self.catalog.lesson_ids())
    }

    /// Replaces the lessons of `slot` using the configured conflict policy.
    pub fn commit_assignment(
        &mut self,
        slot: HalfTermId,
        lessons: Vec<LessonId>,
    ) -> PlannerResult<CommitOutcome> {
        let policy = self.config.conflict_policy;
        let outcome = self.mutate_table(|table| {
            half_term_service::commit_assignment(table, slot, lessons, policy)
        })?;
        self.log_commit(&outcome);
        Ok(outcome)
    }

    pub fn assign_lesson(&mut self, slot: HalfTermId, lesson_id: &str) -> PlannerResult<CommitOutcome> {
        let policy = self.config.conflict_policy;
        let outcome = self.mutate_table(|table| {
            half_term_service::assign_lesson(table, slot, lesson_id, policy)
        })?;
        self.log_commit(&outcome);
        Ok(outcome)
    }

    pub fn reorder(&mut self, slot: HalfTermId, from: usize, to: usize) -> PlannerResult<()> {
        self.mutate_table(|table| half_term_service::reorder(table, slot, from, to))?;
        info!("event=half_term_reorder module=session status=ok slot={slot} from={from} to={to}");
        Ok(())
    }

    /// Removes `lesson_id` from `slot`; returns how many entries went away.
    ///
    /// Nothing is written when the lesson was not assigned there.
    pub fn remove_lesson(&mut self, slot: HalfTermId, lesson_id: &str) -> PlannerResult<usize> {
        if !self.table.slot(slot).contains(lesson_id) {
            return Ok(0);
        }
        let removed =
            self.mutate_table(|table| Ok(half_term_service::remove_lesson(table, slot, lesson_id)))?;
        info!("event=half_term_remove module=session status=ok slot={slot} removed={removed}");
        Ok(removed)
    }

    /// Starts a staged selection for `slot` from its committed lessons.
    pub fn begin_assignment(&self, slot: HalfTermId) -> AssignmentDraft {
        AssignmentDraft::begin(&self.table, slot)
    }

    /// Commits a staged selection. Dropping the draft instead discards it.
    pub fn commit_draft(&mut self, draft: AssignmentDraft) -> PlannerResult<CommitOutcome> {
        let slot = draft.slot();
        self.commit_assignment(slot, draft.into_selection())
    }

    pub fn unit_overview(&self, id: &str) -> PlannerResult<UnitOverview> {
        let unit = self
            .registry
            .get(id)
            .ok_or_else(|| PlannerError::UnitNotFound(id.to_string()))?;
        Ok(unit_service::unit_overview(unit, &self.catalog))
    }

    pub fn half_term_overview(&self, slot: HalfTermId) -> HalfTermOverview {
        half_term_service::half_term_overview(&self.table, slot, &self.catalog)
    }

    /// Re-reads both documents from the store.
    ///
    /// # Contract
    /// - A document is applied whole (last writer wins per document).
    /// - A stored document older than this session's last write is ignored.
    pub fn refresh(&mut self) -> PlannerResult<SessionRefresh> {
        let units = match self.repo.reload_units(&self.config, Utc::now())? {
            None => RefreshOutcome::Stale,
            Some(loaded) => {
                let outcome = refresh_outcome(&loaded, self.units_revision);
                self.units_revision = loaded.revision;
                self.registry.replace_units(loaded.value);
                outcome
            }
        };
        let half_terms = match self.repo.reload_half_terms()? {
            None => RefreshOutcome::Stale,
            Some(loaded) => {
                let outcome = refresh_outcome(&loaded, self.half_terms_revision);
                self.half_terms_revision = loaded.revision;
                self.table = loaded.value;
                outcome
            }
        };
        info!(
            "event=session_refresh module=session status=ok units={units:?} half_terms={half_terms:?}"
        );
        Ok(SessionRefresh { units, half_terms })
    }

    fn persist_units(&mut self, next: UnitRegistry) -> PlannerResult<()> {
        let revision = self.repo.save_units(next.units()).map_err(|err| {
            warn!("event=unit_persist module=session status=error error={err}");
            PlannerError::Store(err)
        })?;
        self.units_revision = revision;
        self.registry = next;
        Ok(())
    }

    fn mutate_table<T, F>(&mut self, op: F) -> PlannerResult<T>
    where
        F: FnOnce(&mut HalfTermTable) -> PlannerResult<T>,
    {
        let mut next = self.table.clone();
        let output = op(&mut next)?;
        let revision = self.repo.save_half_terms(&next).map_err(|err| {
            warn!("event=half_term_persist module=session status=error error={err}");
            PlannerError::Store(err)
        })?;
        self.half_terms_revision = revision;
        self.table = next;
        Ok(output)
    }

    fn log_commit(&self, outcome: &CommitOutcome) {
        info!(
            "event=half_term_commit module=session status=ok slot={} lessons={} moved={} duplicates_dropped={}",
            outcome.slot,
            outcome.lessons.len(),
            outcome.moved.len(),
            outcome.duplicates_dropped.len()
        );
    }
}

fn refresh_outcome<T>(loaded: &Loaded<T>, held: Revision) -> RefreshOutcome {
    if loaded.source == LoadSource::Stored && loaded.revision == held {
        RefreshOutcome::Unchanged
    } else {
        RefreshOutcome::Applied(loaded.source)
    }
}
