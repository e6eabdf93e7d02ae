use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{LedgerError, LedgerResult};

/// Key/value store private to one contract instance or native module.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct ContractStorage {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl ContractStorage {
    pub fn new() -> Self {
        ContractStorage::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        self.data.insert(key.to_vec(), value.to_vec());
    }

    pub fn remove(&mut self, key: &[u8]) {
        self.data.remove(key);
    }

    /// All entries whose key starts with `prefix`, in key order.
    pub fn prefixed(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reads a JSON value, `None` if the key is unset.
    pub fn may_load<T: DeserializeOwned>(&self, key: &[u8]) -> LedgerResult<Option<T>> {
        match self.data.get(key) {
            Some(value) => serde_json::from_slice(value).map(Some).map_err(|e| {
                LedgerError::unknown(format!(
                    "corrupted value at {}: {}",
                    String::from_utf8_lossy(key),
                    e
                ))
            }),
            None => Ok(None),
        }
    }

    pub fn load<T: DeserializeOwned>(&self, key: &[u8]) -> LedgerResult<T> {
        self.may_load(key)?
            .ok_or_else(|| LedgerError::not_found("storage key", String::from_utf8_lossy(key)))
    }

    pub fn save<T: Serialize>(&mut self, key: &[u8], value: &T) -> LedgerResult<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| LedgerError::unknown(e.to_string()))?;
        self.set(key, &bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_set() {
        let mut store = ContractStorage::new();
        assert_eq!(store.get(b"foo"), None);
        store.set(b"foo", b"bar");
        assert_eq!(store.get(b"foo"), Some(b"bar".to_vec()));
        store.remove(b"foo");
        assert_eq!(store.get(b"foo"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn prefixed_works() {
        let mut store = ContractStorage::new();
        store.set(b"a/1", b"x");
        store.set(b"a/2", b"y");
        store.set(b"b/1", b"z");
        let entries = store.prefixed(b"a/");
        assert_eq!(
            entries,
            vec![
                (b"a/1".to_vec(), b"x".to_vec()),
                (b"a/2".to_vec(), b"y".to_vec())
            ]
        );
        assert!(store.prefixed(b"c/").is_empty());
    }

    #[test]
    fn load_and_save() {
        let mut store = ContractStorage::new();
        assert_eq!(store.may_load::<u64>(b"count").unwrap(), None);
        match store.load::<u64>(b"count").unwrap_err() {
            LedgerError::NotFound { kind, id } => {
                assert_eq!(kind, "storage key");
                assert_eq!(id, "count");
            }
            e => panic!("Unexpected error: {:?}", e),
        }
        store.save(b"count", &7u64).unwrap();
        assert_eq!(store.load::<u64>(b"count").unwrap(), 7);

        store.set(b"count", b"not json");
        assert!(store.load::<u64>(b"count").is_err());
    }
}
