/*!
Reassembles a coherent [`View`] from a producer's frames. `DirectConsumer` subscribes to
one producer's topics (spec.md §4.6); [`global`] layers the multi-worker discovery mode
on top of it.
*/
pub mod global;

#[cfg(feature = "kafka-io")]
pub mod kafka;

mod transport;

pub use transport::{ConsumerTransport, MemberEvent, MembersTransport, PolledFrame};

use crate::codec::{self, CellFlag, DecodedFrame, DiffFrame, ViewFilter};
use crate::error::CoreError;
use crate::models::view::FieldFilter;
use crate::models::{AsPathStore, PeerId, PeerStore, View};
use log::warn;
use std::collections::HashSet;

/// Per-worker (or, for a direct consumer, per-pipeline) reassembly state, matching the
/// table in spec.md §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Bootstrap,
    AwaitingSync,
    Streaming,
    Draining,
}

/// Single-producer, single-threaded cooperative consumer.
pub struct DirectConsumer<T: ConsumerTransport> {
    identity: String,
    transport: T,
    peer_store: PeerStore,
    path_store: AsPathStore,
    parent: Option<View>,
    state: ConsumerState,
    last_time: Option<u32>,
}

impl<T: ConsumerTransport> DirectConsumer<T> {
    pub fn new(identity: impl Into<String>, transport: T) -> Self {
        DirectConsumer {
            identity: identity.into(),
            transport,
            peer_store: PeerStore::new(),
            path_store: AsPathStore::new(),
            parent: None,
            state: ConsumerState::Bootstrap,
            last_time: None,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn peer_store(&self) -> &PeerStore {
        &self.peer_store
    }

    pub fn path_store(&self) -> &AsPathStore {
        &self.path_store
    }

    /// Polls for and reassembles the next view, discarding corrupt or out-of-sequence
    /// frames and reverting to `AwaitingSync` rather than surfacing them, per spec.md
    /// §4.6 and §7 ("fail the current view, keep the pipeline alive"). Returns `Ok(None)`
    /// when the transport currently has nothing to offer.
    pub fn recv(&mut self, filter: &mut dyn ViewFilter) -> Result<Option<View>, CoreError> {
        if self.state == ConsumerState::Bootstrap {
            self.state = ConsumerState::AwaitingSync;
        }
        loop {
            let polled = match self.transport.poll_frame()? {
                Some(p) => p,
                None => return Ok(None),
            };
            let decoded = codec::read_frame(
                &mut polled.bytes.as_slice(),
                &mut self.peer_store,
                &mut self.path_store,
                filter,
                polled.is_diff,
            );
            match decoded {
                Ok(Some(DecodedFrame::Sync(view))) => {
                    if let Some(last) = self.last_time {
                        if view.time() < last {
                            warn!(
                                "consumer {}: discarding sync at t={} older than last accepted t={last}",
                                self.identity,
                                view.time()
                            );
                            continue;
                        }
                    }
                    self.last_time = Some(view.time());
                    self.parent = Some(view.clone());
                    self.state = ConsumerState::Streaming;
                    return Ok(Some(view));
                }
                Ok(Some(DecodedFrame::Diff(diff))) => {
                    if self.state != ConsumerState::Streaming {
                        warn!(
                            "consumer {}: diff received while not streaming, discarding",
                            self.identity
                        );
                        continue;
                    }
                    match self.apply_diff(diff) {
                        Ok(view) => {
                            self.last_time = Some(view.time());
                            self.parent = Some(view.clone());
                            return Ok(Some(view));
                        }
                        Err(e) => {
                            warn!(
                                "consumer {}: diff rejected ({e}), reverting to AwaitingSync",
                                self.identity
                            );
                            self.state = ConsumerState::AwaitingSync;
                            self.parent = None;
                            continue;
                        }
                    }
                }
                Ok(None) => return Ok(None),
                Err(CoreError::Corruption(msg)) => {
                    warn!(
                        "consumer {}: corruption ({msg}), discarding in-flight view",
                        self.identity
                    );
                    self.state = ConsumerState::AwaitingSync;
                    self.parent = None;
                    continue;
                }
                Err(other) => return Err(other),
            }
        }
    }

    fn apply_diff(&self, diff: DiffFrame) -> Result<View, CoreError> {
        let parent = self
            .parent
            .as_ref()
            .ok_or_else(|| CoreError::Corruption("diff received with no retained parent".into()))?;
        if let Some(last) = self.last_time {
            if diff.time <= last {
                return Err(CoreError::Corruption(format!(
                    "diff time {} does not advance past {last}",
                    diff.time
                )));
            }
        }

        let mut view = parent.clone();
        view.set_time(diff.time);
        view.set_path_endian_mismatch(diff.path_endian_mismatch);

        let new_active: HashSet<PeerId> = diff.active_peers.iter().copied().collect();
        let previously_known: Vec<PeerId> = view.iter_peers(FieldFilter::Any).collect();
        for peer_id in previously_known {
            if !new_active.contains(&peer_id) {
                view.deactivate_peer(peer_id);
            }
        }
        for peer_id in &diff.active_peers {
            view.add_peer(*peer_id);
            view.activate_peer(*peer_id);
        }

        for cell in diff.cells {
            match cell.flag {
                CellFlag::Added | CellFlag::Changed => {
                    view.add_pfx_peer(cell.prefix, cell.peer_id, cell.path_idx)?;
                    view.pfx_activate_peer(cell.prefix, cell.peer_id)?;
                }
                CellFlag::Removed => {
                    view.pfx_deactivate_peer(cell.prefix, cell.peer_id);
                }
            }
        }
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{write_diff, write_sync, HostEndian, NoFilter};
    use crate::consumer::transport::tests::QueueTransport;
    use crate::models::{PeerSignature, Prefix};
    use std::net::{IpAddr, Ipv4Addr};

    fn push_frame(transport: &mut QueueTransport, bytes: Vec<u8>, is_diff: bool) {
        transport.frames.push_back(PolledFrame { is_diff, bytes });
    }

    #[test]
    fn sync_then_diff_reassembles_added_cell() {
        let mut peers = PeerStore::new();
        let mut paths = AsPathStore::new();
        let peer_id = peers
            .add(PeerSignature::new(
                "rrc00",
                IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1)),
                65001,
            ))
            .unwrap()
            .id;
        let path_a = paths.intern(&[1, 2], false).unwrap().idx;
        let path_b = paths.intern(&[1, 2, 3], false).unwrap().idx;
        let pfx_a = Prefix::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 0)), 24).unwrap();
        let pfx_b = Prefix::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 0)), 24).unwrap();

        let mut sync_view = View::new(3600);
        sync_view.add_peer(peer_id);
        sync_view.activate_peer(peer_id);
        sync_view.add_pfx_peer(pfx_a, peer_id, path_a).unwrap();
        sync_view.pfx_activate_peer(pfx_a, peer_id).unwrap();

        let mut sync_bytes = Vec::new();
        write_sync(
            &mut sync_bytes,
            &sync_view,
            &peers,
            &paths,
            &mut NoFilter,
            HostEndian::native(),
        )
        .unwrap();

        let mut diff_view = sync_view.clone();
        diff_view.set_time(3601);
        diff_view.add_pfx_peer(pfx_b, peer_id, path_b).unwrap();
        diff_view.pfx_activate_peer(pfx_b, peer_id).unwrap();

        let mut diff_bytes = Vec::new();
        write_diff(
            &mut diff_bytes,
            &diff_view,
            &sync_view,
            &peers,
            &paths,
            &mut NoFilter,
            HostEndian::native(),
        )
        .unwrap();

        let mut transport = QueueTransport::default();
        push_frame(&mut transport, sync_bytes, false);
        push_frame(&mut transport, diff_bytes, true);

        let mut consumer = DirectConsumer::new("producer-a", transport);
        let first = consumer.recv(&mut NoFilter).unwrap().unwrap();
        assert_eq!(first.pfx_count(), 1);
        assert_eq!(consumer.state(), ConsumerState::Streaming);

        let second = consumer.recv(&mut NoFilter).unwrap().unwrap();
        assert_eq!(second.pfx_count(), 2);
        assert_eq!(second.time(), 3601);
    }

    #[test]
    fn diff_before_any_sync_is_discarded() {
        let mut peers = PeerStore::new();
        let mut paths = AsPathStore::new();
        let peer_id = peers
            .add(PeerSignature::new(
                "rrc00",
                IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1)),
                65001,
            ))
            .unwrap()
            .id;
        let path_idx = paths.intern(&[1], false).unwrap().idx;
        let pfx = Prefix::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 0)), 24).unwrap();
        let mut parent = View::new(1);
        parent.add_peer(peer_id);
        parent.activate_peer(peer_id);
        parent.add_pfx_peer(pfx, peer_id, path_idx).unwrap();
        parent.pfx_activate_peer(pfx, peer_id).unwrap();
        let mut view = parent.clone();
        view.set_time(2);

        let mut diff_bytes = Vec::new();
        write_diff(
            &mut diff_bytes,
            &view,
            &parent,
            &peers,
            &paths,
            &mut NoFilter,
            HostEndian::native(),
        )
        .unwrap();

        let mut transport = QueueTransport::default();
        push_frame(&mut transport, diff_bytes, true);
        let mut consumer = DirectConsumer::new("producer-a", transport);
        let result = consumer.recv(&mut NoFilter).unwrap();
        assert!(result.is_none());
        assert_eq!(consumer.state(), ConsumerState::AwaitingSync);
    }
}
