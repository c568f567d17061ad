/*!
Interns AS-path byte strings to compact 32-bit indices.

Paths dominate view size: interning keeps one representative per distinct path across
what can be tens of millions of (prefix, peer) cells. The store does not interpret the
byte string at all — segment decoding is out of scope (see SPEC_FULL.md §3) — it only
needs byte-for-byte equality to dedupe.
*/
use crate::error::CoreError;
use smallvec::SmallVec;
use std::collections::HashMap;

/// One interned AS path: its opaque bytes and whether the store considers it "core"
/// (shared across enough pfx-peers to warrant a dedicated representation). `is_core` is
/// a transport hint only; it never changes read-back semantics.
#[derive(Debug, Clone)]
pub struct PathEntry {
    pub bytes: SmallVec<[u8; 32]>,
    pub is_core: bool,
}

/// Result of [`AsPathStore::intern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternResult {
    pub idx: u32,
    pub inserted: bool,
}

/// Interning store for AS-path byte strings, keyed by a monotonically increasing 32-bit
/// index.
#[derive(Debug, Default)]
pub struct AsPathStore {
    paths: Vec<PathEntry>,
    index: HashMap<SmallVec<[u8; 32]>, u32>,
}

impl AsPathStore {
    pub fn new() -> Self {
        AsPathStore::default()
    }

    /// Intern `bytes`, returning the assigned index. Idempotent: interning the same
    /// bytes again returns the same index without inserting a second entry. The
    /// `is_core` flag recorded is from the *first* insertion; later calls with a
    /// different `is_core` value for already-interned bytes do not change it (the
    /// store's contract per spec.md §4.1 only requires idempotency of the index).
    pub fn intern(&mut self, bytes: &[u8], is_core: bool) -> Result<InternResult, CoreError> {
        let key: SmallVec<[u8; 32]> = SmallVec::from_slice(bytes);
        if let Some(&idx) = self.index.get(&key) {
            return Ok(InternResult {
                idx,
                inserted: false,
            });
        }
        let idx = self.paths.len() as u32;
        if idx == u32::MAX {
            return Err(CoreError::StoreFull);
        }
        self.paths.push(PathEntry {
            bytes: key.clone(),
            is_core,
        });
        self.index.insert(key, idx);
        Ok(InternResult {
            idx,
            inserted: true,
        })
    }

    pub fn get(&self, idx: u32) -> Option<&PathEntry> {
        self.paths.get(idx as usize)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Iterate over `{idx, is_core, bytes}` in a stable order for the lifetime of this
    /// snapshot (insertion order).
    pub fn iter(&self) -> impl Iterator<Item = (u32, &PathEntry)> {
        self.paths
            .iter()
            .enumerate()
            .map(|(idx, entry)| (idx as u32, entry))
    }

    pub fn clear(&mut self) {
        self.paths.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut store = AsPathStore::new();
        let a = store.intern(&[1, 2, 3], false).unwrap();
        let b = store.intern(&[1, 2, 3], false).unwrap();
        assert_eq!(a.idx, b.idx);
        assert!(a.inserted);
        assert!(!b.inserted);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn distinct_bytes_get_distinct_indices() {
        let mut store = AsPathStore::new();
        let a = store.intern(&[1, 2], false).unwrap().idx;
        let b = store.intern(&[1, 2, 3], false).unwrap().idx;
        assert_ne!(a, b);
        assert_eq!(store.get(a).unwrap().bytes.as_slice(), &[1, 2]);
        assert_eq!(store.get(b).unwrap().bytes.as_slice(), &[1, 2, 3]);
    }
}
