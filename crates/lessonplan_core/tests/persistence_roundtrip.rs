use lessonplan_core::db::{open_db, open_db_in_memory};
use lessonplan_core::store::{Revision, StoredDocument, HALF_TERMS_KEY, UNITS_KEY};
use lessonplan_core::{
    DocumentRepository, HalfTermId, KeyValueStore, LessonCatalog, LoadSource, MemoryStore,
    PlannerConfig, PlannerError, PlannerSession, RefreshOutcome, SqliteStore, StoreError,
    StoreResult, UnitDraft,
};
use std::cell::Cell;

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn open<S: KeyValueStore>(store: S) -> PlannerSession<S> {
    PlannerSession::open(store, LessonCatalog::default(), PlannerConfig::default()).unwrap()
}

#[test]
fn sqlite_file_round_trips_units_and_assignments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("planner.db");

    let unit_id = {
        let conn = open_db(&path).unwrap();
        let mut session = open(SqliteStore::try_new(&conn).unwrap());
        let unit = session
            .create_unit(
                UnitDraft::named("Term 1 Songs")
                    .with_term(HalfTermId::Autumn1)
                    .with_lessons(["1", "2"]),
            )
            .unwrap();
        session
            .commit_assignment(HalfTermId::Spring2, ids(&["4", "1"]))
            .unwrap();
        unit.id
    };

    let conn = open_db(&path).unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let mut repo = DocumentRepository::new(&store);
    let units = repo
        .load_units(&PlannerConfig::default(), chrono::Utc::now())
        .unwrap();
    let table = repo.load_half_terms().unwrap();

    assert_eq!(units.source, LoadSource::Stored);
    assert_eq!(units.value.len(), 1);
    assert_eq!(units.value[0].id, unit_id);
    assert_eq!(units.value[0].term, Some(HalfTermId::Autumn1));
    assert_eq!(units.value[0].lesson_numbers, ids(&["1", "2"]));
    assert_eq!(table.source, LoadSource::Stored);
    assert_eq!(
        table.value.lessons(HalfTermId::Spring2),
        ids(&["4", "1"]).as_slice()
    );
}

#[test]
fn memory_store_reopen_sees_identical_state() {
    let store = MemoryStore::new();
    let mut first = open(&store);
    first.create_unit(UnitDraft::named("Pulse")).unwrap();
    first
        .commit_assignment(HalfTermId::Summer1, ids(&["7"]))
        .unwrap();

    let second = open(&store);

    assert_eq!(second.units(), first.units());
    assert_eq!(second.half_terms(), first.half_terms());
    assert_eq!(second.revisions(), first.revisions());
}

#[test]
fn undecodable_documents_are_defaulted_once() {
    let store = MemoryStore::new();
    store.seed(UNITS_KEY, "{not json").unwrap();
    store.seed(HALF_TERMS_KEY, r#"{"A1": []}"#).unwrap();

    let session = open(&store);
    assert!(session.units().is_empty());
    assert_eq!(session.half_terms().assigned_count(), 0);
    assert_eq!(store.revision(UNITS_KEY).unwrap(), 2);
    assert_eq!(store.revision(HALF_TERMS_KEY).unwrap(), 2);

    let again = open(&store);
    assert_eq!(again.revisions(), (2, 2));
    assert_eq!(store.revision(UNITS_KEY).unwrap(), 2);
    assert_eq!(store.revision(HALF_TERMS_KEY).unwrap(), 2);
}

#[test]
fn legacy_unit_records_are_repaired_and_written_back_once() {
    let store = MemoryStore::new();
    store
        .seed(
            UNITS_KEY,
            r#"[{"name": "Old Unit", "lessonNumbers": [1, "2", null]}, 5]"#,
        )
        .unwrap();

    let mut repo = DocumentRepository::new(&store);
    let loaded = repo
        .load_units(&PlannerConfig::default(), chrono::Utc::now())
        .unwrap();

    assert_eq!(loaded.source, LoadSource::Repaired);
    assert_eq!(loaded.revision, 2);
    let unit = &loaded.value[0];
    assert_eq!(loaded.value.len(), 1);
    assert!(!unit.id.is_empty());
    assert_eq!(unit.name, "Old Unit");
    assert_eq!(unit.description, "");
    assert_eq!(unit.lesson_numbers, ids(&["1", "2"]));
    assert_eq!(unit.updated_at, unit.created_at);

    let reloaded = repo
        .load_units(&PlannerConfig::default(), chrono::Utc::now())
        .unwrap();
    assert_eq!(reloaded.source, LoadSource::Stored);
    assert_eq!(reloaded.value, loaded.value);
    assert_eq!(store.revision(UNITS_KEY).unwrap(), 2);
}

#[test]
fn half_term_document_restores_slots_and_uniqueness() {
    let store = MemoryStore::new();
    store
        .seed(
            HALF_TERMS_KEY,
            r#"[
                {"id": "A1", "name": "Autumn 1", "lessons": ["1", "2", "2"]},
                {"id": "A2", "lessons": ["2", 3]},
                {"id": "X9", "lessons": ["8"]},
                {"id": "A1", "lessons": ["9"]}
            ]"#,
        )
        .unwrap();

    let session = open(&store);
    let table = session.half_terms();

    assert_eq!(table.slots().len(), 6);
    assert_eq!(table.lessons(HalfTermId::Autumn1), ids(&["1", "2"]).as_slice());
    assert_eq!(table.lessons(HalfTermId::Autumn2), ids(&["3"]).as_slice());
    assert!(table.lessons(HalfTermId::Summer2).is_empty());
    assert_eq!(table.holder_of("8"), None);
    assert_eq!(table.holder_of("9"), None);
    assert_eq!(store.revision(HALF_TERMS_KEY).unwrap(), 2);
}

/// Memory store whose saves can be switched to fail.
struct FlakyStore {
    inner: MemoryStore,
    fail_saves: Cell<bool>,
}

impl KeyValueStore for FlakyStore {
    fn load(&self, key: &str) -> StoreResult<Option<StoredDocument>> {
        self.inner.load(key)
    }

    fn save(&self, key: &str, value: &str) -> StoreResult<Revision> {
        if self.fail_saves.get() {
            return Err(StoreError::InvalidData("disk full".to_string()));
        }
        self.inner.save(key, value)
    }
}

#[test]
fn failed_save_leaves_session_state_untouched() {
    let store = FlakyStore {
        inner: MemoryStore::new(),
        fail_saves: Cell::new(false),
    };
    let mut session = open(&store);
    let unit = session.create_unit(UnitDraft::named("Keep")).unwrap();
    session
        .commit_assignment(HalfTermId::Autumn1, ids(&["1", "2"]))
        .unwrap();
    let revisions = session.revisions();

    store.fail_saves.set(true);
    let create_err = session.create_unit(UnitDraft::named("Lost")).unwrap_err();
    let delete_err = session.delete_unit(&unit.id).unwrap_err();
    let reorder_err = session.reorder(HalfTermId::Autumn1, 0, 1).unwrap_err();
    let commit_err = session
        .commit_assignment(HalfTermId::Autumn2, ids(&["2"]))
        .unwrap_err();

    for err in [create_err, delete_err, reorder_err, commit_err] {
        assert!(matches!(err, PlannerError::Store(_)), "unexpected: {err}");
    }
    assert_eq!(session.units(), [unit]);
    assert_eq!(
        session.half_terms().lessons(HalfTermId::Autumn1),
        ids(&["1", "2"]).as_slice()
    );
    assert!(session.half_terms().lessons(HalfTermId::Autumn2).is_empty());
    assert_eq!(session.revisions(), revisions);
}

#[test]
fn refresh_applies_documents_written_by_another_session() {
    let store = MemoryStore::new();
    let mut reader = open(&store);
    let mut writer = open(&store);

    writer
        .commit_assignment(HalfTermId::Spring1, ids(&["3"]))
        .unwrap();
    let refreshed = reader.refresh().unwrap();

    assert_eq!(refreshed.units, RefreshOutcome::Unchanged);
    assert_eq!(
        refreshed.half_terms,
        RefreshOutcome::Applied(LoadSource::Stored)
    );
    assert_eq!(
        reader.half_terms().lessons(HalfTermId::Spring1),
        ids(&["3"]).as_slice()
    );
    assert_eq!(reader.revisions(), writer.revisions());
}

#[test]
fn refresh_ignores_store_older_than_own_writes() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let mut session = open(&store);
    session
        .commit_assignment(HalfTermId::Summer2, ids(&["1"]))
        .unwrap();

    conn.execute("DELETE FROM documents WHERE doc_key = ?1;", [HALF_TERMS_KEY])
        .unwrap();
    let refreshed = session.refresh().unwrap();

    assert_eq!(refreshed.half_terms, RefreshOutcome::Stale);
    assert_eq!(
        session.half_terms().lessons(HalfTermId::Summer2),
        ids(&["1"]).as_slice()
    );
    assert!(store.load(HALF_TERMS_KEY).unwrap().is_none());
}

#[test]
fn two_connections_share_one_revision_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let first_conn = open_db(&path).unwrap();
    let second_conn = open_db(&path).unwrap();
    let first = SqliteStore::try_new(&first_conn).unwrap();
    let second = SqliteStore::try_new(&second_conn).unwrap();

    assert_eq!(first.save(UNITS_KEY, "[]").unwrap(), 1);
    assert_eq!(second.save(UNITS_KEY, "[]").unwrap(), 2);
    assert_eq!(first.save(UNITS_KEY, "[]").unwrap(), 3);

    let stored = second.load(UNITS_KEY).unwrap().unwrap();
    assert_eq!(stored.revision, 3);
}
