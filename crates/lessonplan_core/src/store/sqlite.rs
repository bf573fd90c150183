use super::{KeyValueStore, Revision, StoreError, StoreResult, StoredDocument};
use crate::db::migrations::{current_user_version, latest_version};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

/// SQLite-backed document store over a migrated connection.
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStore<'conn> {
    /// Wraps a connection returned by `db::open_db*`.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        let actual_version = current_user_version(conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(StoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore<'_> {
    fn load(&self, key: &str) -> StoreResult<Option<StoredDocument>> {
        let row = self
            .conn
            .query_row(
                "SELECT body, revision
                 FROM documents
                 WHERE doc_key = ?1;",
                [key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((value, revision)) => {
                let revision = Revision::try_from(revision).map_err(|_| {
                    StoreError::InvalidData(format!(
                        "negative revision `{revision}` for document `{key}`"
                    ))
                })?;
                Ok(Some(StoredDocument { value, revision }))
            }
        }
    }

    fn save(&self, key: &str, value: &str) -> StoreResult<Revision> {
        // IMMEDIATE takes the write lock up front so read-increment-write
        // cannot race another connection on the same file.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO documents (doc_key, body, revision)
             VALUES (?1, ?2, 1)
             ON CONFLICT(doc_key) DO UPDATE SET
                body = excluded.body,
                revision = documents.revision + 1,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        let revision: i64 = tx.query_row(
            "SELECT revision FROM documents WHERE doc_key = ?1;",
            [key],
            |row| row.get(0),
        )?;
        tx.commit()?;

        Revision::try_from(revision).map_err(|_| {
            StoreError::InvalidData(format!(
                "negative revision `{revision}` for document `{key}`"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteStore;
    use crate::db::open_db_in_memory;
    use crate::store::{KeyValueStore, StoreError};
    use rusqlite::Connection;

    #[test]
    fn save_upserts_and_bumps_revision() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteStore::try_new(&conn).unwrap();

        assert_eq!(store.load("units").unwrap(), None);
        assert_eq!(store.save("units", "[]").unwrap(), 1);
        assert_eq!(store.save("units", "[{}]").unwrap(), 2);

        let doc = store.load("units").unwrap().unwrap();
        assert_eq!(doc.value, "[{}]");
        assert_eq!(doc.revision, 2);
    }

    #[test]
    fn unmigrated_connection_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteStore::try_new(&conn).err().unwrap();
        assert!(matches!(
            err,
            StoreError::UninitializedConnection {
                actual_version: 0,
                ..
            }
        ));
    }
}
