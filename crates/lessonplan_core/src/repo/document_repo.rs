//! Whole-document persistence for the unit list and half-term table.
//!
//! # Responsibility
//! - Load both documents through schema repair, self-healing the store.
//! - Save both documents as full structures.
//!
//! # Invariants
//! - An absent or undecodable document is replaced by its default and the
//!   default is written back before the load returns.
//! - A repaired document is written back once; loading the healed form
//!   again reports `LoadSource::Stored` and performs no write.
//! - `reload_*` never returns a document older than the last one this
//!   repository wrote for the same key.

use crate::config::PlannerConfig;
use crate::model::half_term::HalfTermTable;
use crate::model::unit::Unit;
use crate::repo::repair::{repair_half_terms, repair_units, RepairError, Repaired};
use crate::store::{
    KeyValueStore, Revision, StoreError, StoreResult, HALF_TERMS_KEY, UNITS_KEY,
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;

/// Where a loaded value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Stored document was already canonical.
    Stored,
    /// Stored document was repaired and written back.
    Repaired,
    /// Document was absent or undecodable; the default was written.
    Defaulted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub value: T,
    pub source: LoadSource,
    /// Revision of the document the value now corresponds to.
    pub revision: Revision,
}

/// Document repository over any key/value store.
pub struct DocumentRepository<S: KeyValueStore> {
    store: S,
    last_written: HashMap<&'static str, Revision>,
}

impl<S: KeyValueStore> DocumentRepository<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            last_written: HashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Last revision this repository wrote under `key`, if any.
    pub fn last_written(&self, key: &str) -> Option<Revision> {
        self.last_written.get(key).copied()
    }

    pub fn load_units(
        &mut self,
        config: &PlannerConfig,
        now: DateTime<Utc>,
    ) -> StoreResult<Loaded<Vec<Unit>>> {
        self.load_document(UNITS_KEY, Vec::new, |raw| repair_units(raw, config, now))
    }

    pub fn load_half_terms(&mut self) -> StoreResult<Loaded<HalfTermTable>> {
        self.load_document(HALF_TERMS_KEY, HalfTermTable::default, repair_half_terms)
    }

    /// Like `load_units`, but `None` when the stored document is older than
    /// the last one written here.
    pub fn reload_units(
        &mut self,
        config: &PlannerConfig,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Loaded<Vec<Unit>>>> {
        if self.is_stale(UNITS_KEY)? {
            return Ok(None);
        }
        self.load_units(config, now).map(Some)
    }

    pub fn reload_half_terms(&mut self) -> StoreResult<Option<Loaded<HalfTermTable>>> {
        if self.is_stale(HALF_TERMS_KEY)? {
            return Ok(None);
        }
        self.load_half_terms().map(Some)
    }

    pub fn save_units(&mut self, units: &[Unit]) -> StoreResult<Revision> {
        self.save_document(UNITS_KEY, units)
    }

    pub fn save_half_terms(&mut self, table: &HalfTermTable) -> StoreResult<Revision> {
        self.save_document(HALF_TERMS_KEY, table)
    }

    fn load_document<T, D, R>(
        &mut self,
        key: &'static str,
        default: D,
        repair: R,
    ) -> StoreResult<Loaded<T>>
    where
        T: Serialize,
        D: FnOnce() -> T,
        R: FnOnce(&str) -> Result<Repaired<T>, RepairError>,
    {
        let Some(stored) = self.store.load(key)? else {
            info!("event=document_load module=repo status=defaulted key={key} reason=absent");
            return self.write_default(key, default());
        };

        match repair(&stored.value) {
            Ok(repaired) if !repaired.changed => {
                debug!(
                    "event=document_load module=repo status=ok key={key} revision={}",
                    stored.revision
                );
                Ok(Loaded {
                    value: repaired.value,
                    source: LoadSource::Stored,
                    revision: stored.revision,
                })
            }
            Ok(repaired) => {
                warn!(
                    "event=document_load module=repo status=repaired key={key} revision={} notes={}",
                    stored.revision,
                    repaired.notes.len()
                );
                for note in &repaired.notes {
                    debug!("event=document_repair module=repo key={key} note={note}");
                }
                let revision = self.save_document(key, &repaired.value)?;
                Ok(Loaded {
                    value: repaired.value,
                    source: LoadSource::Repaired,
                    revision,
                })
            }
            Err(err) => {
                warn!(
                    "event=document_load module=repo status=defaulted key={key} revision={} error={err}",
                    stored.revision
                );
                self.write_default(key, default())
            }
        }
    }

    fn write_default<T: Serialize>(&mut self, key: &'static str, value: T) -> StoreResult<Loaded<T>> {
        let revision = self.save_document(key, &value)?;
        Ok(Loaded {
            value,
            source: LoadSource::Defaulted,
            revision,
        })
    }

    fn save_document<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> StoreResult<Revision> {
        let body = serde_json::to_string(value).map_err(StoreError::Encode)?;
        let revision = self.store.save(key, &body).map_err(|err| {
            warn!("event=document_save module=repo status=error key={key} error={err}");
            err
        })?;
        debug!("event=document_save module=repo status=ok key={key} revision={revision}");
        self.last_written.insert(key, revision);
        Ok(revision)
    }

    fn is_stale(&self, key: &'static str) -> StoreResult<bool> {
        let Some(written) = self.last_written(key) else {
            return Ok(false);
        };
        let stored = self
            .store
            .load(key)?
            .map_or(0, |document| document.revision);
        if stored < written {
            info!(
                "event=document_reload module=repo status=stale key={key} stored={stored} written={written}"
            );
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentRepository, LoadSource};
    use crate::config::PlannerConfig;
    use crate::model::half_term::HalfTermId;
    use crate::store::{MemoryStore, HALF_TERMS_KEY, UNITS_KEY};
    use chrono::Utc;

    #[test]
    fn absent_documents_are_defaulted_and_written() {
        let store = MemoryStore::new();
        let mut repo = DocumentRepository::new(&store);

        let units = repo.load_units(&PlannerConfig::default(), Utc::now()).unwrap();
        assert_eq!(units.source, LoadSource::Defaulted);
        assert!(units.value.is_empty());
        assert_eq!(store.revision(UNITS_KEY).unwrap(), 1);

        let table = repo.load_half_terms().unwrap();
        assert_eq!(table.source, LoadSource::Defaulted);
        assert_eq!(table.value.assigned_count(), 0);
        assert_eq!(store.revision(HALF_TERMS_KEY).unwrap(), 1);
    }

    #[test]
    fn reload_ignores_document_older_than_last_write() {
        let store = MemoryStore::new();
        let mut repo = DocumentRepository::new(&store);
        let mut table = repo.load_half_terms().unwrap().value;
        table.slot_mut(HalfTermId::Spring1).lessons.push("7".to_string());
        repo.save_half_terms(&table).unwrap();

        let other = MemoryStore::new();
        other.seed(HALF_TERMS_KEY, "[]").unwrap();
        let mut behind = DocumentRepository::new(&other);
        behind.last_written.insert(HALF_TERMS_KEY, 5);
        assert!(behind.reload_half_terms().unwrap().is_none());

        let current = repo.reload_half_terms().unwrap().unwrap();
        assert_eq!(current.source, LoadSource::Stored);
        assert_eq!(current.value.lessons(HalfTermId::Spring1), ["7".to_string()]);
    }
}
