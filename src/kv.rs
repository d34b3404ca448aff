//! Key-value facade over the rpc database's `RPCData` table.
//!
//! Thin by intent: every call is one round-trip to the [`DurableStore`] and
//! storage errors are returned as-is.

use std::sync::Arc;

use tracing::debug;

use crate::db::DurableStore;
use crate::error::AppError;

/// String-keyed store of opaque byte values.
#[derive(Clone)]
pub struct KvStore {
    store: Arc<dyn DurableStore>,
}

impl KvStore {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    /// Value stored under `key`, or `None` if absent. An explicitly stored
    /// empty value comes back as `Some(vec![])`.
    pub fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        let value = self.store.kv_get(key)?;
        debug!(key, found = value.is_some(), "kv fetch");
        Ok(value)
    }

    /// Like [`fetch`](Self::fetch) but requires the payload to be UTF-8.
    pub fn fetch_string(&self, key: &str) -> Result<Option<String>, AppError> {
        self.fetch(key)?
            .map(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|e| AppError::Storage(format!("value for {key:?} is not UTF-8: {e}")))
            })
            .transpose()
    }

    /// Insert `value` under `key`, replacing any existing entry.
    pub fn store(&self, key: &str, value: impl AsRef<[u8]>) -> Result<(), AppError> {
        let value = value.as_ref();
        self.store.kv_put(key, value)?;
        debug!(key, bytes = value.len(), "kv store");
        Ok(())
    }

    /// Remove the entry for `key`. Succeeds when there is none.
    pub fn delete(&self, key: &str) -> Result<(), AppError> {
        self.store.kv_delete(key)?;
        debug!(key, "kv delete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use tempfile::TempDir;

    fn kv(tmp: &TempDir) -> KvStore {
        let store =
            SqliteStore::open(&tmp.path().join("wallet.db"), &tmp.path().join("rpc.db")).unwrap();
        KvStore::new(Arc::new(store))
    }

    #[test]
    fn store_then_fetch_returns_value() {
        let tmp = TempDir::new().unwrap();
        let kv = kv(&tmp);
        kv.store("greeting", "hello").unwrap();
        assert_eq!(kv.fetch("greeting").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn fetch_absent_is_none() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(kv(&tmp).fetch("missing").unwrap(), None);
    }

    #[test]
    fn empty_value_is_distinct_from_absence() {
        let tmp = TempDir::new().unwrap();
        let kv = kv(&tmp);
        kv.store("a", "").unwrap();
        assert_eq!(kv.fetch("a").unwrap(), Some(Vec::new()));
        assert_eq!(kv.fetch_string("a").unwrap(), Some(String::new()));
    }

    #[test]
    fn store_replaces_existing_entry() {
        let tmp = TempDir::new().unwrap();
        let kv = kv(&tmp);
        kv.store("k", "v1").unwrap();
        kv.store("k", "v2").unwrap();
        kv.store("k", "v2").unwrap();
        assert_eq!(kv.fetch_string("k").unwrap().as_deref(), Some("v2"));

        kv.delete("k").unwrap();
        assert_eq!(kv.fetch("k").unwrap(), None);
    }

    #[test]
    fn delete_absent_key_succeeds() {
        let tmp = TempDir::new().unwrap();
        let kv = kv(&tmp);
        kv.delete("never-stored").unwrap();
        assert_eq!(kv.fetch("never-stored").unwrap(), None);
    }

    #[test]
    fn binary_and_large_values_round_trip() {
        let tmp = TempDir::new().unwrap();
        let kv = kv(&tmp);
        let blob: Vec<u8> = (0..=255u8).cycle().take(1 << 20).collect();
        kv.store("blob", &blob).unwrap();
        assert_eq!(kv.fetch("blob").unwrap(), Some(blob));
    }

    #[test]
    fn fetch_string_rejects_non_utf8() {
        let tmp = TempDir::new().unwrap();
        let kv = kv(&tmp);
        kv.store("bin", [0xffu8, 0xfe]).unwrap();
        assert!(matches!(kv.fetch_string("bin"), Err(AppError::Storage(_))));
    }

    struct BrokenStore;

    impl DurableStore for BrokenStore {
        fn backend(&self) -> &str {
            "broken"
        }
        fn kv_put(&self, _key: &str, _value: &[u8]) -> Result<(), AppError> {
            Err(AppError::Storage("database is locked".into()))
        }
    }

    #[test]
    fn storage_failures_surface_unchanged() {
        let kv = KvStore::new(Arc::new(BrokenStore));
        let err = kv.store("k", "v").unwrap_err();
        assert_eq!(err.to_string(), "storage error: database is locked");
        assert!(kv.fetch("k").is_err());
        assert!(kv.delete("k").is_err());
    }
}
