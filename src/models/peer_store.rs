/*!
Bidirectional mapping between compact peer ids and the peer signatures they name.
*/
use crate::error::CoreError;
use crate::models::network::{PeerId, PeerSignature};
use std::collections::HashMap;
use std::num::NonZeroU16;

/// Result of [`PeerStore::add`].
#[derive(Debug, Clone, Copy)]
pub struct AddResult {
    pub id: PeerId,
    pub existed: bool,
}

/// Peer signature store: ids are drawn from a monotonic counter starting at 1 and are
/// never reused within the store's lifetime, matching spec.md §4.2. Tracks activation
/// per id so that `iter_active` can be served directly by the store, the way a view's
/// peer iteration is ultimately backed by this table.
#[derive(Debug, Default)]
pub struct PeerStore {
    sigs: Vec<PeerSignature>,
    by_sig: HashMap<PeerSignature, PeerId>,
    active: Vec<bool>,
}

impl PeerStore {
    pub fn new() -> Self {
        PeerStore::default()
    }

    /// Register `sig`, returning its id. Idempotent: re-adding an already-known
    /// signature returns the existing id.
    pub fn add(&mut self, sig: PeerSignature) -> Result<AddResult, CoreError> {
        if let Some(&id) = self.by_sig.get(&sig) {
            return Ok(AddResult { id, existed: true });
        }
        let next = self.sigs.len() + 1;
        if next > u16::MAX as usize {
            return Err(CoreError::StoreFull);
        }
        let id = NonZeroU16::new(next as u16).expect("next is always >= 1");
        self.sigs.push(sig.clone());
        self.active.push(false);
        self.by_sig.insert(sig, id);
        Ok(AddResult {
            id,
            existed: false,
        })
    }

    pub fn lookup(&self, id: PeerId) -> Option<&PeerSignature> {
        self.sigs.get(id.get() as usize - 1)
    }

    pub fn activate(&mut self, id: PeerId) {
        if let Some(slot) = self.active.get_mut(id.get() as usize - 1) {
            *slot = true;
        }
    }

    pub fn deactivate(&mut self, id: PeerId) {
        if let Some(slot) = self.active.get_mut(id.get() as usize - 1) {
            *slot = false;
        }
    }

    pub fn is_active(&self, id: PeerId) -> bool {
        self.active
            .get(id.get() as usize - 1)
            .copied()
            .unwrap_or(false)
    }

    /// Ids of all currently active peers, in ascending id order.
    pub fn iter_active(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.active
            .iter()
            .enumerate()
            .filter(|(_, active)| **active)
            .map(|(idx, _)| NonZeroU16::new((idx + 1) as u16).expect("idx+1 >= 1"))
    }

    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn sig(collector: &str, asn: u32) -> PeerSignature {
        PeerSignature::new(collector, IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1)), asn)
    }

    #[test]
    fn add_is_idempotent_and_ids_are_stable() {
        let mut store = PeerStore::new();
        let a = store.add(sig("rrc00", 65001)).unwrap();
        let b = store.add(sig("rrc00", 65001)).unwrap();
        assert_eq!(a.id, b.id);
        assert!(!a.existed);
        assert!(b.existed);
    }

    #[test]
    fn distinct_sigs_get_distinct_ids_never_reused() {
        let mut store = PeerStore::new();
        let a = store.add(sig("rrc00", 1)).unwrap().id;
        let b = store.add(sig("rrc00", 2)).unwrap().id;
        assert_ne!(a, b);
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
    }

    #[test]
    fn activation_tracked_per_id() {
        let mut store = PeerStore::new();
        let a = store.add(sig("rrc00", 1)).unwrap().id;
        let b = store.add(sig("rrc00", 2)).unwrap().id;
        store.activate(a);
        assert!(store.is_active(a));
        assert!(!store.is_active(b));
        assert_eq!(store.iter_active().collect::<Vec<_>>(), vec![a]);
    }
}
