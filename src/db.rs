//! Durable store — the only code that touches the databases.
//!
//! Two SQLite files live under the node's data directory:
//!
//! ```text
//! {data_dir}/
//! ├── wallet.db   NodeIdentity (PublicKey, PrivateKey, Dh512, Dh1024)
//! └── rpc.db      RPCData (Key PRIMARY KEY, Value BLOB)
//! ```
//!
//! Every call opens its own connection, runs parameterized statements and
//! closes it again. Concurrency control is left to SQLite (WAL + busy
//! timeout); nothing here holds a lock or a cache across calls.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::error::AppError;

/// An identity row as read back from the wallet database.
///
/// Columns are nullable in the schema, so both halves are optional here;
/// interpreting them is the identity manager's job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredIdentity {
    pub public_key: Option<String>,
    pub private_key: Option<String>,
}

/// Everything written when a node identity is first created.
#[derive(Debug, Clone)]
pub struct NewIdentity<'a> {
    pub public_key: &'a str,
    pub private_key: &'a str,
    pub dh512: &'a [u8],
    pub dh1024: &'a [u8],
}

/// Storage operations the identity manager and kv facade rely on.
///
/// Default methods fail with [`AppError::Storage`] so a backend only
/// implements what it supports.
pub trait DurableStore: Send + Sync {
    /// Short backend name used in log fields and error messages.
    fn backend(&self) -> &str;

    // ── Identity table ────────────────────────────────────────────────

    /// All identity rows in insertion order.
    fn identity_rows(&self) -> Result<Vec<StoredIdentity>, AppError> {
        Err(unsupported(self.backend(), "identity_rows"))
    }

    /// Insert `identity` unless a row already exists. Returns `true` if a row
    /// was written.
    fn insert_identity(&self, _identity: &NewIdentity<'_>) -> Result<bool, AppError> {
        Err(unsupported(self.backend(), "insert_identity"))
    }

    // ── Key-value table ───────────────────────────────────────────────

    fn kv_get(&self, _key: &str) -> Result<Option<Vec<u8>>, AppError> {
        Err(unsupported(self.backend(), "kv_get"))
    }

    /// Insert or fully replace the entry for `key`.
    fn kv_put(&self, _key: &str, _value: &[u8]) -> Result<(), AppError> {
        Err(unsupported(self.backend(), "kv_put"))
    }

    /// Remove the entry for `key`; absent keys are not an error.
    fn kv_delete(&self, _key: &str) -> Result<(), AppError> {
        Err(unsupported(self.backend(), "kv_delete"))
    }
}

fn unsupported(backend: &str, op: &str) -> AppError {
    AppError::Storage(format!("store '{backend}' does not support {op}"))
}

// ── SQLite backend ────────────────────────────────────────────────────────────

/// SQLite-backed [`DurableStore`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    wallet_path: PathBuf,
    rpc_path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) `wallet_path` and `rpc_path` and make sure
    /// both tables exist.
    pub fn open(wallet_path: &Path, rpc_path: &Path) -> Result<Self, AppError> {
        for path in [wallet_path, rpc_path] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::Storage(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        let store = Self {
            wallet_path: wallet_path.to_path_buf(),
            rpc_path: rpc_path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn wallet_path(&self) -> &Path {
        &self.wallet_path
    }

    pub fn rpc_path(&self) -> &Path {
        &self.rpc_path
    }

    fn init_schema(&self) -> Result<(), AppError> {
        open_conn(&self.wallet_path)?
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS NodeIdentity (
                    PublicKey  CHARACTER(53),
                    PrivateKey CHARACTER(52),
                    Dh512      TEXT,
                    Dh1024     TEXT
                );
                ",
            )
            .map_err(|e| AppError::Storage(format!("wallet: initialize schema: {e}")))?;

        open_conn(&self.rpc_path)?
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS RPCData (
                    Key   TEXT PRIMARY KEY,
                    Value BLOB
                );
                ",
            )
            .map_err(|e| AppError::Storage(format!("rpc: initialize schema: {e}")))
    }
}

impl DurableStore for SqliteStore {
    fn backend(&self) -> &str {
        "sqlite"
    }

    fn identity_rows(&self) -> Result<Vec<StoredIdentity>, AppError> {
        let conn = open_conn(&self.wallet_path)?;
        let mut stmt = conn
            .prepare("SELECT PublicKey, PrivateKey FROM NodeIdentity ORDER BY rowid")
            .map_err(|e| AppError::Storage(format!("wallet: prepare identity_rows: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(StoredIdentity {
                    public_key: row.get(0)?,
                    private_key: row.get(1)?,
                })
            })
            .map_err(|e| AppError::Storage(format!("wallet: query identity_rows: {e}")))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| AppError::Storage(format!("wallet: read identity row: {e}")))?);
        }
        Ok(out)
    }

    fn insert_identity(&self, identity: &NewIdentity<'_>) -> Result<bool, AppError> {
        let mut conn = open_conn(&self.wallet_path)?;
        // IMMEDIATE takes the write lock up front so the existence check and
        // the insert cannot interleave with another writer.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| AppError::Storage(format!("wallet: begin tx: {e}")))?;

        let inserted = tx
            .execute(
                "INSERT INTO NodeIdentity (PublicKey, PrivateKey, Dh512, Dh1024)
                 SELECT ?1, ?2, ?3, ?4
                 WHERE NOT EXISTS (SELECT 1 FROM NodeIdentity)",
                params![
                    identity.public_key,
                    identity.private_key,
                    identity.dh512,
                    identity.dh1024,
                ],
            )
            .map_err(|e| AppError::Storage(format!("wallet: insert identity: {e}")))?;

        tx.commit()
            .map_err(|e| AppError::Storage(format!("wallet: commit insert identity: {e}")))?;

        Ok(inserted == 1)
    }

    fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        let conn = open_conn(&self.rpc_path)?;
        // Older writers stored text literals; a NULL value counts as absent.
        conn.query_row(
            "SELECT Value FROM RPCData WHERE Key = ?1",
            params![key],
            |row| match row.get_ref(0)? {
                ValueRef::Null => Ok(None),
                ValueRef::Blob(b) | ValueRef::Text(b) => Ok(Some(b.to_vec())),
                other => Err(rusqlite::Error::InvalidColumnType(
                    0,
                    "Value".into(),
                    other.data_type(),
                )),
            },
        )
        .optional()
        .map(Option::flatten)
        .map_err(|e| AppError::Storage(format!("rpc: get {key:?}: {e}")))
    }

    fn kv_put(&self, key: &str, value: &[u8]) -> Result<(), AppError> {
        let conn = open_conn(&self.rpc_path)?;
        conn.execute(
            "INSERT INTO RPCData (Key, Value) VALUES (?1, ?2)
             ON CONFLICT(Key) DO UPDATE SET Value = excluded.Value",
            params![key, value],
        )
        .map_err(|e| AppError::Storage(format!("rpc: put {key:?}: {e}")))?;
        Ok(())
    }

    fn kv_delete(&self, key: &str) -> Result<(), AppError> {
        let conn = open_conn(&self.rpc_path)?;
        conn.execute("DELETE FROM RPCData WHERE Key = ?1", params![key])
            .map_err(|e| AppError::Storage(format!("rpc: delete {key:?}: {e}")))?;
        Ok(())
    }
}

/// Open a SQLite connection to `db_path` and apply the pragmas every
/// statement here assumes.
///
/// - `journal_mode = WAL` — readers do not block the writer.
/// - `busy_timeout = 5000` — wait up to 5 s before returning `SQLITE_BUSY`.
fn open_conn(db_path: &Path) -> Result<Connection, AppError> {
    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Storage(format!("open {}: {e}", db_path.display())))?;

    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| AppError::Storage(format!("set journal_mode WAL: {e}")))?;
    conn.pragma_update(None, "busy_timeout", 5000)
        .map_err(|e| AppError::Storage(format!("set busy_timeout: {e}")))?;

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(tmp: &TempDir) -> SqliteStore {
        SqliteStore::open(&tmp.path().join("wallet.db"), &tmp.path().join("rpc.db")).unwrap()
    }

    fn new_identity<'a>(public_key: &'a str, private_key: &'a str) -> NewIdentity<'a> {
        NewIdentity {
            public_key,
            private_key,
            dh512: &[1, 2, 3],
            dh1024: &[4, 5, 6],
        }
    }

    #[test]
    fn open_creates_both_databases() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        assert!(store.wallet_path().exists());
        assert!(store.rpc_path().exists());
    }

    #[test]
    fn open_creates_missing_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a").join("b");
        SqliteStore::open(&nested.join("wallet.db"), &nested.join("rpc.db")).unwrap();
        assert!(nested.join("wallet.db").exists());
    }

    #[test]
    fn identity_rows_empty_on_fresh_store() {
        let tmp = TempDir::new().unwrap();
        assert!(open_store(&tmp).identity_rows().unwrap().is_empty());
    }

    #[test]
    fn insert_identity_is_guarded() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);

        assert!(store.insert_identity(&new_identity("pub-a", "priv-a")).unwrap());
        assert!(!store.insert_identity(&new_identity("pub-b", "priv-b")).unwrap());

        let rows = store.identity_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].public_key.as_deref(), Some("pub-a"));
    }

    #[test]
    fn identity_rows_come_back_in_insertion_order() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let conn = Connection::open(store.wallet_path()).unwrap();
        for n in 1..=3 {
            conn.execute(
                "INSERT INTO NodeIdentity (PublicKey, PrivateKey) VALUES (?1, ?2)",
                params![format!("pub-{n}"), format!("priv-{n}")],
            )
            .unwrap();
        }

        let rows = store.identity_rows().unwrap();
        let publics: Vec<_> = rows.iter().filter_map(|r| r.public_key.as_deref()).collect();
        assert_eq!(publics, ["pub-1", "pub-2", "pub-3"]);
    }

    #[test]
    fn kv_put_get_delete() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);

        assert_eq!(store.kv_get("foo").unwrap(), None);

        store.kv_put("foo", b"bar").unwrap();
        assert_eq!(store.kv_get("foo").unwrap(), Some(b"bar".to_vec()));

        store.kv_put("foo", b"baz").unwrap();
        assert_eq!(store.kv_get("foo").unwrap(), Some(b"baz".to_vec()));

        store.kv_delete("foo").unwrap();
        assert_eq!(store.kv_get("foo").unwrap(), None);
        store.kv_delete("foo").unwrap();
    }

    #[test]
    fn kv_get_reads_text_values_written_by_older_nodes() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        Connection::open(store.rpc_path())
            .unwrap()
            .execute("INSERT INTO RPCData (Key, Value) VALUES ('legacy', 'plain text')", [])
            .unwrap();
        assert_eq!(store.kv_get("legacy").unwrap(), Some(b"plain text".to_vec()));
    }

    #[test]
    fn kv_get_null_value_is_absent() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        Connection::open(store.rpc_path())
            .unwrap()
            .execute("INSERT INTO RPCData (Key, Value) VALUES ('n', NULL)", [])
            .unwrap();
        assert_eq!(store.kv_get("n").unwrap(), None);

        store.kv_put("e", b"").unwrap();
        assert_eq!(store.kv_get("e").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn kv_put_twice_leaves_one_row() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        store.kv_put("k", b"v1").unwrap();
        store.kv_put("k", b"v2").unwrap();
        store.kv_put("k", b"v2").unwrap();

        let rows: i64 = Connection::open(store.rpc_path())
            .unwrap()
            .query_row("SELECT COUNT(*) FROM RPCData WHERE Key = 'k'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(store.kv_get("k").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn kv_values_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        open_store(&tmp).kv_put("k", &[0, 255, 7]).unwrap();
        assert_eq!(open_store(&tmp).kv_get("k").unwrap(), Some(vec![0, 255, 7]));
    }

    #[test]
    fn keys_with_quotes_are_stored_verbatim() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let key = "it's'; DROP TABLE RPCData; --";
        store.kv_put(key, b"v").unwrap();
        assert_eq!(store.kv_get(key).unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.kv_get("it").unwrap(), None);
    }

    struct NullStore;

    impl DurableStore for NullStore {
        fn backend(&self) -> &str {
            "null"
        }
    }

    #[test]
    fn default_methods_report_unsupported() {
        let err = NullStore.kv_get("k").unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert!(err.to_string().contains("'null' does not support kv_get"));
        assert!(NullStore.identity_rows().is_err());
    }
}
