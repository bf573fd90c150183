use super::{KeyValueStore, Revision, StoreError, StoreResult, StoredDocument};
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local store, used by tests and hosts without durable storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, StoredDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `value` verbatim, bypassing any shape checks. Mostly useful to
    /// seed corrupted or legacy documents.
    pub fn seed(&self, key: &str, value: &str) -> StoreResult<Revision> {
        self.save(key, value)
    }

    /// Current revision of `key`, `0` when absent.
    pub fn revision(&self, key: &str) -> StoreResult<Revision> {
        let documents = self.documents.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(documents.get(key).map_or(0, |doc| doc.revision))
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> StoreResult<Option<StoredDocument>> {
        let documents = self.documents.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(documents.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> StoreResult<Revision> {
        let mut documents = self.documents.lock().map_err(|_| StoreError::Poisoned)?;
        let revision = documents.get(key).map_or(0, |doc| doc.revision) + 1;
        documents.insert(
            key.to_string(),
            StoredDocument {
                value: value.to_string(),
                revision,
            },
        );
        Ok(revision)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::store::KeyValueStore;

    #[test]
    fn revisions_increase_per_key() {
        let store = MemoryStore::new();
        assert_eq!(store.load("a").unwrap(), None);
        assert_eq!(store.save("a", "[]").unwrap(), 1);
        assert_eq!(store.save("a", "[1]").unwrap(), 2);
        assert_eq!(store.save("b", "{}").unwrap(), 1);

        let doc = store.load("a").unwrap().unwrap();
        assert_eq!(doc.value, "[1]");
        assert_eq!(doc.revision, 2);
        assert_eq!(store.revision("missing").unwrap(), 0);
    }
}
