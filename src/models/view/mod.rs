/*!
The sparse (peer × prefix) view: the central data structure a producer serializes and a
consumer reassembles. A `View` itself stores only presence and activation state; peer
identity (`PeerSignature`) lives in a [`crate::models::peer_store::PeerStore`] and AS-path
bytes in a [`crate::models::aspath::AsPathStore`], both long-lived and shared across the
sequence of views one producer or consumer client handles. This keeps a view's footprint
proportional to the (peer, prefix) cells it actually holds instead of re-copying collector
names and path bytes into every view — see DESIGN.md for the full rationale.
*/
mod cursor;
mod filter;

pub use cursor::ViewCursor;
pub use filter::{FieldFilter, IpFamily};

use crate::error::CoreError;
use crate::models::network::{PeerId, Prefix};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default)]
struct PfxPeerEntry {
    path_idx: u32,
    active: bool,
}

#[derive(Debug, Clone, Default)]
struct PfxEntry {
    peers: BTreeMap<PeerId, PfxPeerEntry>,
    active_count: usize,
}

impl PfxEntry {
    fn is_active(&self) -> bool {
        self.active_count > 0
    }
}

/// A single BGP routing view at a point in time.
#[derive(Debug, Clone, Default)]
pub struct View {
    time: u32,
    peers: BTreeMap<PeerId, bool>,
    prefixes: BTreeMap<Prefix, PfxEntry>,
    path_endian_mismatch: bool,
}

impl View {
    pub fn new(time: u32) -> Self {
        View {
            time,
            peers: BTreeMap::new(),
            prefixes: BTreeMap::new(),
            path_endian_mismatch: false,
        }
    }

    pub fn time(&self) -> u32 {
        self.time
    }

    pub fn set_time(&mut self, time: u32) {
        self.time = time;
    }

    /// Whether the frame this view was decoded from declared an AS-path byte order
    /// different from this host's native order (spec.md §9's resolved host-byte-order
    /// Open Question). Path bytes are never byte-swapped; callers that care about path
    /// internals must check this before interpreting them.
    pub fn path_endian_mismatch(&self) -> bool {
        self.path_endian_mismatch
    }

    pub fn set_path_endian_mismatch(&mut self, mismatch: bool) {
        self.path_endian_mismatch = mismatch;
    }

    /// Empties the view entirely, clearing every peer and pfx-peer activation. Used both
    /// to reset a producer's parent view before re-populating it and to reset a
    /// consumer's scratch view between sync frames.
    pub fn clear(&mut self) {
        self.time = 0;
        self.peers.clear();
        self.prefixes.clear();
        self.path_endian_mismatch = false;
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn pfx_count(&self) -> usize {
        self.prefixes.len()
    }

    // -- peers ---------------------------------------------------------

    /// Records `id` as present in the view (inactive by default). Returns `true` if this
    /// is the first time `id` is seen by this view.
    pub fn add_peer(&mut self, id: PeerId) -> bool {
        self.peers.insert(id, false).is_none()
    }

    pub fn activate_peer(&mut self, id: PeerId) {
        self.peers.insert(id, true);
    }

    pub fn deactivate_peer(&mut self, id: PeerId) {
        if let Some(active) = self.peers.get_mut(&id) {
            *active = false;
        }
    }

    pub fn has_peer(&self, id: PeerId) -> bool {
        self.peers.contains_key(&id)
    }

    pub fn peer_is_active(&self, id: PeerId) -> bool {
        self.peers.get(&id).copied().unwrap_or(false)
    }

    pub fn iter_peers(&self, filter: FieldFilter) -> impl Iterator<Item = PeerId> + '_ {
        self.peers
            .iter()
            .filter(move |(_, active)| filter.matches(**active))
            .map(|(id, _)| *id)
    }

    // -- prefixes --------------------------------------------------------

    pub fn has_pfx(&self, prefix: Prefix) -> bool {
        self.prefixes.contains_key(&prefix)
    }

    pub fn pfx_is_active(&self, prefix: Prefix) -> bool {
        self.prefixes
            .get(&prefix)
            .map(PfxEntry::is_active)
            .unwrap_or(false)
    }

    pub fn iter_prefixes(
        &self,
        family: IpFamily,
        filter: FieldFilter,
    ) -> impl Iterator<Item = Prefix> + '_ {
        self.prefixes
            .iter()
            .filter(move |(pfx, _)| match family {
                IpFamily::Both => true,
                IpFamily::V4 => pfx.is_ipv4(),
                IpFamily::V6 => pfx.is_ipv6(),
            })
            .filter(move |(_, entry)| filter.matches(entry.is_active()))
            .map(|(pfx, _)| *pfx)
    }

    // -- pfx-peers -------------------------------------------------------

    /// Adds a `(peer_id, path_idx)` cell under `prefix`, creating the prefix entry if
    /// needed. `peer_id` must already be present in the view (invariant: every peer_id
    /// referenced from any pfx entry is present in `peers`).
    pub fn add_pfx_peer(
        &mut self,
        prefix: Prefix,
        peer_id: PeerId,
        path_idx: u32,
    ) -> Result<(), CoreError> {
        if !self.has_peer(peer_id) {
            return Err(CoreError::Corruption(format!(
                "pfx-peer references peer id {peer_id} not present in view"
            )));
        }
        let entry = self.prefixes.entry(prefix).or_default();
        entry.peers.insert(
            peer_id,
            PfxPeerEntry {
                path_idx,
                active: false,
            },
        );
        Ok(())
    }

    /// Marks the `(prefix, peer_id)` cell active. A pfx-peer may only be active if its
    /// peer is active; violating this is corruption, not a panic.
    pub fn pfx_activate_peer(&mut self, prefix: Prefix, peer_id: PeerId) -> Result<(), CoreError> {
        if !self.peer_is_active(peer_id) {
            return Err(CoreError::Corruption(format!(
                "cannot activate pfx-peer for inactive peer id {peer_id}"
            )));
        }
        let entry = self.prefixes.entry(prefix).or_default();
        let cell = entry.peers.entry(peer_id).or_insert(PfxPeerEntry {
            path_idx: 0,
            active: false,
        });
        if !cell.active {
            cell.active = true;
            entry.active_count += 1;
        }
        Ok(())
    }

    pub fn pfx_deactivate_peer(&mut self, prefix: Prefix, peer_id: PeerId) {
        if let Some(entry) = self.prefixes.get_mut(&prefix) {
            if let Some(cell) = entry.peers.get_mut(&peer_id) {
                if cell.active {
                    cell.active = false;
                    entry.active_count -= 1;
                }
            }
        }
    }

    pub fn get_pfx_peer(&self, prefix: Prefix, peer_id: PeerId) -> Option<(u32, bool)> {
        self.prefixes
            .get(&prefix)
            .and_then(|entry| entry.peers.get(&peer_id))
            .map(|cell| (cell.path_idx, cell.active))
    }

    pub fn iter_pfx_peers(
        &self,
        prefix: Prefix,
        filter: FieldFilter,
    ) -> impl Iterator<Item = (PeerId, u32)> + '_ {
        self.prefixes
            .get(&prefix)
            .into_iter()
            .flat_map(move |entry| {
                entry
                    .peers
                    .iter()
                    .filter(move |(_, cell)| filter.matches(cell.active))
                    .map(|(id, cell)| (*id, cell.path_idx))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::num::NonZeroU16;

    fn pfx(a: u8, b: u8, c: u8, d: u8, len: u8) -> Prefix {
        Prefix::new(IpAddr::V4(Ipv4Addr::new(a, b, c, d)), len).unwrap()
    }

    fn pid(n: u16) -> PeerId {
        NonZeroU16::new(n).unwrap()
    }

    #[test]
    fn add_pfx_peer_requires_known_peer() {
        let mut view = View::new(1);
        let err = view.add_pfx_peer(pfx(192, 0, 2, 0, 24), pid(1), 0);
        assert!(matches!(err, Err(CoreError::Corruption(_))));
    }

    #[test]
    fn activation_tracked_independently_at_peer_and_pfx_peer_level() {
        let mut view = View::new(1);
        view.add_peer(pid(1));
        view.activate_peer(pid(1));
        view.add_pfx_peer(pfx(192, 0, 2, 0, 24), pid(1), 7).unwrap();
        assert!(!view.pfx_is_active(pfx(192, 0, 2, 0, 24)));
        view.pfx_activate_peer(pfx(192, 0, 2, 0, 24), pid(1))
            .unwrap();
        assert!(view.pfx_is_active(pfx(192, 0, 2, 0, 24)));
        assert_eq!(
            view.get_pfx_peer(pfx(192, 0, 2, 0, 24), pid(1)),
            Some((7, true))
        );
    }

    #[test]
    fn pfx_activate_rejects_inactive_peer() {
        let mut view = View::new(1);
        view.add_peer(pid(1));
        view.add_pfx_peer(pfx(192, 0, 2, 0, 24), pid(1), 0).unwrap();
        let err = view.pfx_activate_peer(pfx(192, 0, 2, 0, 24), pid(1));
        assert!(matches!(err, Err(CoreError::Corruption(_))));
    }

    #[test]
    fn clear_resets_everything() {
        let mut view = View::new(5);
        view.add_peer(pid(1));
        view.activate_peer(pid(1));
        view.add_pfx_peer(pfx(192, 0, 2, 0, 24), pid(1), 0).unwrap();
        view.clear();
        assert_eq!(view.time(), 0);
        assert_eq!(view.peer_count(), 0);
        assert_eq!(view.pfx_count(), 0);
    }

    #[test]
    fn prefixes_iterate_ipv4_before_ipv6() {
        let mut view = View::new(1);
        view.add_peer(pid(1));
        view.activate_peer(pid(1));
        let v6 = Prefix::new("2001:db8::".parse().unwrap(), 32).unwrap();
        view.add_pfx_peer(pfx(192, 0, 2, 0, 24), pid(1), 0).unwrap();
        view.pfx_activate_peer(pfx(192, 0, 2, 0, 24), pid(1))
            .unwrap();
        view.add_pfx_peer(v6, pid(1), 1).unwrap();
        view.pfx_activate_peer(v6, pid(1)).unwrap();
        let order: Vec<Prefix> = view.iter_prefixes(IpFamily::Both, FieldFilter::Active).collect();
        assert_eq!(order, vec![pfx(192, 0, 2, 0, 24), v6]);
    }
}
