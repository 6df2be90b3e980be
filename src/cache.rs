use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::slice::{Slice, SliceKey};

/// Decoded slices keyed by identity. Each key is written at most once and
/// the cached slice is never mutated; eviction drops it.
#[derive(Debug, Default)]
pub struct SliceCache {
    slices: Mutex<HashMap<SliceKey, Arc<Slice>>>,
}

impl SliceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SliceKey, Arc<Slice>>> {
        self.slices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &SliceKey) -> Option<Arc<Slice>> {
        self.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &SliceKey) -> bool {
        self.lock().contains_key(key)
    }

    /// Caches `slice` unless its key is already present, and returns the
    /// cached entry. The first insertion wins.
    pub fn insert(&self, slice: Slice) -> Arc<Slice> {
        let mut slices = self.lock();
        if let Some(existing) = slices.get(slice.key()) {
            return existing.clone();
        }
        let key = slice.key().clone();
        let slice = Arc::new(slice);
        slices.insert(key.clone(), slice.clone());
        log::debug!("Cached slice {key} ({} cached)", slices.len());
        slice
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn keys(&self) -> Vec<SliceKey> {
        self.lock().keys().cloned().collect()
    }

    /// Evicts every slice for which `keep` is false and returns how many
    /// were dropped.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&SliceKey) -> bool,
    {
        let mut slices = self.lock();
        let before = slices.len();
        slices.retain(|key, _| keep(key));
        let evicted = before - slices.len();
        if evicted > 0 {
            log::debug!("Evicted {evicted} slices from cache");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{SliceGeometry, Vec3};
    use ndarray::Array2;

    fn slice(key: &str, value: f32) -> Slice {
        Slice::new(
            key,
            Array2::from_elem((2, 2), value),
            SliceGeometry::axial(Vec3::default(), 1.0, 1.0),
        )
    }

    #[test]
    fn test_first_insert_wins() {
        let cache = SliceCache::new();
        let first = cache.insert(slice("a", 1.0));
        let second = cache.insert(slice("a", 2.0));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.get(&SliceKey::from("a")).unwrap().samples()[[0, 0]], 1.0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_retain_evicts() {
        let cache = SliceCache::new();
        for key in ["a", "b", "c"] {
            cache.insert(slice(key, 0.0));
        }
        let held = cache.get(&SliceKey::from("b")).unwrap();
        assert_eq!(cache.retain(|key| key.0 == "a"), 2);
        assert!(cache.contains(&SliceKey::from("a")));
        assert!(!cache.contains(&SliceKey::from("b")));
        // Readers keep their handle after eviction.
        assert_eq!(held.key().0, "b");
    }
}
