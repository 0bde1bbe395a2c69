use crate::levels::EnergyLevelTable;
use crate::lines::IsotopologueId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LevelCacheKey {
    pub database: String,
    pub isotope: IsotopologueId,
    pub content_hash: u64,
}

/// Shared store of derived energy-level tables. Entries are immutable once
/// inserted, so providers built from the same databank share one table.
#[derive(Debug, Default)]
pub struct LevelCache {
    entries: Mutex<HashMap<LevelCacheKey, Arc<EnergyLevelTable>>>,
    hits: AtomicUsize,
}

impl LevelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert_with(
        &self,
        key: LevelCacheKey,
        build: impl FnOnce() -> EnergyLevelTable,
    ) -> Arc<EnergyLevelTable> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(table) = entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(table);
        }

        tracing::debug!(
            database = %key.database,
            isotope = key.isotope.0,
            content_hash = key.content_hash,
            "caching energy level table"
        );
        let table = Arc::new(build());
        entries.insert(key, Arc::clone(&table));
        table
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{LevelCache, LevelCacheKey};
    use crate::levels::{EnergyLevel, EnergyLevelTable};
    use crate::lines::IsotopologueId;
    use std::sync::Arc;

    #[test]
    fn distinct_content_hashes_do_not_share_entries() {
        let cache = LevelCache::new();
        let key = |content_hash| LevelCacheKey {
            database: "bank".to_string(),
            isotope: IsotopologueId(1),
            content_hash,
        };
        let build = || EnergyLevelTable::new(vec![EnergyLevel::new(1.0, 0.0, 0.0)]);

        let first = cache.get_or_insert_with(key(7), build);
        let second = cache.get_or_insert_with(key(7), || unreachable!("cached"));
        let third = cache.get_or_insert_with(key(8), build);

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.hits(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
