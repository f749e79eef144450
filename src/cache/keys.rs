//! Key derivation helpers.
//!
//! List caches are keyed by a hash of their filter set. The hash has to be
//! stable across processes and across the order in which filters were
//! supplied, so filters are normalized into a sorted map and digested with
//! SHA-256 rather than the process-seeded std hasher.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// Length of the hex digest suffix used in list keys.
const FILTER_HASH_LEN: usize = 32;

/// Normalized filter parameters for mission list queries.
///
/// Keys and values are trimmed; empty values are dropped, so `status=""` and
/// an absent `status` select the same cache entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissionFilters {
    params: BTreeMap<String, String>,
}

impl MissionFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        let key = key.as_ref().trim();
        let value = value.as_ref().trim();
        if key.is_empty() {
            return;
        }
        if value.is_empty() {
            self.params.remove(key);
        } else {
            self.params.insert(key.to_string(), value.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Stable digest of the normalized filters.
    pub fn stable_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for (key, value) in &self.params {
            // Length prefixes keep `a=bc` and `ab=c` apart.
            hasher.update((key.len() as u64).to_le_bytes());
            hasher.update(key.as_bytes());
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(FILTER_HASH_LEN);
        digest
    }
}

impl<K, V> FromIterator<(K, V)> for MissionFilters
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = Self::new();
        for (key, value) in iter {
            filters.insert(key, value);
        }
        filters
    }
}
