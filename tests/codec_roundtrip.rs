//! The six concrete end-to-end codec scenarios from spec.md §8, plus the collateral
//! checks (diff stats, id-map injectivity) those scenarios imply.
use bgpview::codec::{read_frame, write_diff, write_sync, Decision, DecodedFrame, HostEndian, NoFilter, ViewFilter};
use bgpview::error::CoreError;
use bgpview::models::{AsPathStore, PeerId, PeerSignature, PeerStore, Prefix, View};
use std::net::{IpAddr, Ipv4Addr};

fn decode_sync(bytes: &[u8]) -> (View, PeerStore, AsPathStore) {
    let mut peers = PeerStore::new();
    let mut paths = AsPathStore::new();
    let mut cursor = bytes;
    match read_frame(&mut cursor, &mut peers, &mut paths, &mut NoFilter, false).unwrap() {
        Some(DecodedFrame::Sync(view)) => (view, peers, paths),
        Some(DecodedFrame::Diff(_)) => panic!("expected a sync frame, got a diff"),
        None => panic!("expected a sync frame, got end of stream"),
    }
}

#[test]
fn scenario_1_empty_view() {
    let peers = PeerStore::new();
    let paths = AsPathStore::new();
    let view = View::new(1_500_000_000);

    let mut wire = Vec::new();
    write_sync(&mut wire, &view, &peers, &paths, &mut NoFilter, HostEndian::native()).unwrap();

    let (decoded, _, _) = decode_sync(&wire);
    assert_eq!(decoded.time(), 1_500_000_000);
    assert_eq!(decoded.peer_count(), 0);
    assert_eq!(decoded.pfx_count(), 0);
}

#[test]
fn scenario_2_single_ipv4_pfx_single_peer() {
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
    let path_idx = paths.intern(&[1, 2], false).unwrap().idx;
    let pfx = Prefix::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 0)), 24).unwrap();

    let mut view = View::new(1_500_000_000);
    view.add_peer(peer_id);
    view.activate_peer(peer_id);
    view.add_pfx_peer(pfx, peer_id, path_idx).unwrap();
    view.pfx_activate_peer(pfx, peer_id).unwrap();

    let mut wire = Vec::new();
    write_sync(&mut wire, &view, &peers, &paths, &mut NoFilter, HostEndian::native()).unwrap();

    let (decoded, read_peers, read_paths) = decode_sync(&wire);
    assert_eq!(decoded.peer_count(), 1);
    assert_eq!(decoded.pfx_count(), 1);
    let decoded_peer = decoded.iter_peers(bgpview::models::FieldFilter::Active).next().unwrap();
    assert_eq!(read_peers.lookup(decoded_peer).unwrap().collector, "rrc00");
    let (decoded_path_idx, active) = decoded.get_pfx_peer(pfx, decoded_peer).unwrap();
    assert!(active);
    assert_eq!(read_paths.get(decoded_path_idx).unwrap().bytes.as_slice(), &[1, 2]);
}

struct KeepOnly(PeerId);

impl ViewFilter for KeepOnly {
    fn filter_peer(&mut self, _sig: &PeerSignature) -> Decision {
        Decision::Keep
    }

    fn filter_pfx_peer(&mut self, _pfx: Prefix, peer_id: PeerId) -> Decision {
        if peer_id == self.0 {
            Decision::Keep
        } else {
            Decision::Drop
        }
    }
}

#[test]
fn scenario_3_filter_drops_one_peer() {
    let mut peers = PeerStore::new();
    let mut paths = AsPathStore::new();
    let peer_1 = peers
        .add(PeerSignature::new("rrc00", IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1)), 65001))
        .unwrap()
        .id;
    let peer_2 = peers
        .add(PeerSignature::new("rrc00", IpAddr::V4(Ipv4Addr::new(198, 51, 100, 2)), 65002))
        .unwrap()
        .id;
    let path_idx = paths.intern(&[1], false).unwrap().idx;
    let pfx = Prefix::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 0)), 24).unwrap();

    let mut view = View::new(1);
    view.add_peer(peer_1);
    view.activate_peer(peer_1);
    view.add_peer(peer_2);
    view.activate_peer(peer_2);
    view.add_pfx_peer(pfx, peer_1, path_idx).unwrap();
    view.pfx_activate_peer(pfx, peer_1).unwrap();
    view.add_pfx_peer(pfx, peer_2, path_idx).unwrap();
    view.pfx_activate_peer(pfx, peer_2).unwrap();

    // Writer-side: keep only peer_2's pfx-peer cells (peer_1's signature is still written,
    // since this filter only vetoes at the pfx-peer level).
    let mut wire = Vec::new();
    write_sync(
        &mut wire,
        &view,
        &peers,
        &paths,
        &mut KeepOnly(peer_2),
        HostEndian::native(),
    )
    .unwrap();

    let mut read_peers = PeerStore::new();
    let mut read_paths = AsPathStore::new();
    let decoded = match read_frame(&mut wire.as_slice(), &mut read_peers, &mut read_paths, &mut NoFilter, false)
        .unwrap()
        .unwrap()
    {
        DecodedFrame::Sync(view) => view,
        _ => unreachable!(),
    };
    // Both peer signatures were written (filter only vetoed pfx-peer cells), but only
    // one survives as a pfx-peer under the prefix.
    assert_eq!(decoded.peer_count(), 2);
    assert_eq!(
        decoded
            .iter_pfx_peers(pfx, bgpview::models::FieldFilter::Active)
            .count(),
        1
    );

    // Reader-side: a read-time filter_peer veto removes a peer from the decoded view
    // entirely, and its pfx-peer cell along with it.
    let mut wire2 = Vec::new();
    write_sync(&mut wire2, &view, &peers, &paths, &mut NoFilter, HostEndian::native()).unwrap();
    let mut rd_peers = PeerStore::new();
    let mut rd_paths = AsPathStore::new();
    let mut read_filter = DropSig("198.51.100.1".parse::<IpAddr>().unwrap());
    let decoded2 = match read_frame(&mut wire2.as_slice(), &mut rd_peers, &mut rd_paths, &mut read_filter, false)
        .unwrap()
        .unwrap()
    {
        DecodedFrame::Sync(view) => view,
        _ => unreachable!(),
    };
    assert_eq!(decoded2.peer_count(), 1);
    assert_eq!(
        decoded2
            .iter_pfx_peers(pfx, bgpview::models::FieldFilter::Active)
            .count(),
        1
    );
}

struct DropSig(IpAddr);

impl ViewFilter for DropSig {
    fn filter_peer(&mut self, sig: &PeerSignature) -> Decision {
        if sig.ip == self.0 {
            Decision::Drop
        } else {
            Decision::Keep
        }
    }
}

#[test]
fn scenario_4_diff_add_and_change() {
    let mut peers = PeerStore::new();
    let mut paths = AsPathStore::new();
    let peer_id = peers
        .add(PeerSignature::new("rrc00", IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1)), 65001))
        .unwrap()
        .id;
    let path_1 = paths.intern(&[1], false).unwrap().idx;
    let path_2 = paths.intern(&[2], false).unwrap().idx;
    let pfx_a = Prefix::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 0)), 24).unwrap();
    let pfx_b = Prefix::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 0)), 24).unwrap();

    let mut parent = View::new(1);
    parent.add_peer(peer_id);
    parent.activate_peer(peer_id);
    parent.add_pfx_peer(pfx_a, peer_id, path_1).unwrap();
    parent.pfx_activate_peer(pfx_a, peer_id).unwrap();

    let mut current = parent.clone();
    current.set_time(2);
    current.add_pfx_peer(pfx_a, peer_id, path_2).unwrap();
    current.pfx_activate_peer(pfx_a, peer_id).unwrap();
    current.add_pfx_peer(pfx_b, peer_id, path_1).unwrap();
    current.pfx_activate_peer(pfx_b, peer_id).unwrap();

    let stats = {
        let mut wire = Vec::new();
        write_diff(&mut wire, &current, &parent, &peers, &paths, &mut NoFilter, HostEndian::native())
            .unwrap()
    };
    assert_eq!(stats.changed_pfx_peer_cnt, 1);
    assert_eq!(stats.added_pfx_peer_cnt, 1);
    assert_eq!(stats.removed_pfx_peer_cnt, 0);
}

#[derive(Default)]
struct DiscardTransport;

impl bgpview::producer::ProducerTransport for DiscardTransport {
    fn publish_peers(&mut self, _identity: &str, _frame: &[u8]) -> Result<(), CoreError> {
        Ok(())
    }

    fn publish_pfxs(&mut self, _identity: &str, _frame: &[u8]) -> Result<(), CoreError> {
        Ok(())
    }

    fn publish_meta(&mut self, _identity: &str, _meta: &[u8]) -> Result<(), CoreError> {
        Ok(())
    }

    fn publish_members(
        &mut self,
        _heartbeat: &bgpview::producer::MembersHeartbeat,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), CoreError> {
        Ok(())
    }
}

#[test]
fn scenario_5_out_of_alignment_start_is_skipped() {
    use bgpview::producer::{Producer, SendOutcome};

    let mut producer = Producer::new("rrc00", 3600, DiscardTransport::default());
    let peers = PeerStore::new();
    let paths = AsPathStore::new();
    let outcome = producer
        .send(&View::new(1_500_000_001), &peers, &paths, &mut NoFilter)
        .unwrap();
    assert!(matches!(outcome, SendOutcome::Skipped));

    let outcome = producer
        .send(&View::new(1_500_003_600), &peers, &paths, &mut NoFilter)
        .unwrap();
    assert!(matches!(outcome, SendOutcome::Sync(_)));
}

#[test]
fn scenario_6_flipped_xend_byte_is_corruption() {
    let mut peers = PeerStore::new();
    let mut paths = AsPathStore::new();
    let peer_id = peers
        .add(PeerSignature::new("rrc00", IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1)), 65001))
        .unwrap()
        .id;
    let path_idx = paths.intern(&[1], false).unwrap().idx;
    let pfx = Prefix::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 0)), 24).unwrap();

    let mut view = View::new(1);
    view.add_peer(peer_id);
    view.activate_peer(peer_id);
    view.add_pfx_peer(pfx, peer_id, path_idx).unwrap();
    view.pfx_activate_peer(pfx, peer_id).unwrap();

    let mut wire = Vec::new();
    write_sync(&mut wire, &view, &peers, &paths, &mut NoFilter, HostEndian::native()).unwrap();

    let xend_composite = (bgpview::codec::VIEW_MAGIC as u64) << 32 | bgpview::codec::SECTION_XEND as u64;
    let xend_bytes = xend_composite.to_be_bytes();
    let pos = wire
        .windows(8)
        .position(|w| w == xend_bytes)
        .expect("XEND composite present in a non-empty-prefix sync frame");
    wire[pos] ^= 0xFF;

    let mut rd_peers = PeerStore::new();
    let mut rd_paths = AsPathStore::new();
    let err = read_frame(&mut wire.as_slice(), &mut rd_peers, &mut rd_paths, &mut NoFilter, false);
    assert!(matches!(err, Err(CoreError::Corruption(_))));
}

#[test]
fn truncating_between_two_views_reads_as_a_clean_end_of_stream() {
    let peers = PeerStore::new();
    let paths = AsPathStore::new();
    let mut wire = Vec::new();
    write_sync(&mut wire, &View::new(1), &peers, &paths, &mut NoFilter, HostEndian::native()).unwrap();

    let mut rd_peers = PeerStore::new();
    let mut rd_paths = AsPathStore::new();
    let mut cursor = wire.as_slice();
    assert!(read_frame(&mut cursor, &mut rd_peers, &mut rd_paths, &mut NoFilter, false)
        .unwrap()
        .is_some());
    assert!(read_frame(&mut cursor, &mut rd_peers, &mut rd_paths, &mut NoFilter, false)
        .unwrap()
        .is_none());
}

#[test]
fn truncating_mid_record_is_corruption_not_a_clean_eof() {
    let mut peers = PeerStore::new();
    let paths = AsPathStore::new();
    peers
        .add(PeerSignature::new("rrc00", IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1)), 65001))
        .unwrap();

    let mut view = View::new(1);
    view.add_peer(PeerId::new(1).unwrap());
    view.activate_peer(PeerId::new(1).unwrap());

    let mut wire = Vec::new();
    write_sync(&mut wire, &view, &peers, &paths, &mut NoFilter, HostEndian::native()).unwrap();

    // Cut the stream partway through the one peer record's IP field: the 14-byte frame
    // header plus peer id (2) + collector length (1) + "rrc00" (5) + ip-family tag (1) +
    // one of four IPv4 octets leaves the record's last 3 octets and the ASN unread.
    let truncated = &wire[..14 + 2 + 1 + 5 + 1 + 1];

    let mut rd_peers = PeerStore::new();
    let mut rd_paths = AsPathStore::new();
    let err = read_frame(&mut &truncated[..], &mut rd_peers, &mut rd_paths, &mut NoFilter, false);
    assert!(matches!(err, Err(CoreError::Corruption(_))));
}

struct DropPfx(Prefix);

impl ViewFilter for DropPfx {
    fn filter_pfx(&mut self, pfx: Prefix) -> Decision {
        if pfx == self.0 {
            Decision::Drop
        } else {
            Decision::Keep
        }
    }
}

#[test]
fn read_time_filter_pfx_drops_the_whole_prefix_and_its_cells() {
    let mut peers = PeerStore::new();
    let mut paths = AsPathStore::new();
    let peer_id = peers
        .add(PeerSignature::new("rrc00", IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1)), 65001))
        .unwrap()
        .id;
    let path_idx = paths.intern(&[1], false).unwrap().idx;
    let pfx_a = Prefix::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 0)), 24).unwrap();
    let pfx_b = Prefix::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 0)), 24).unwrap();

    let mut view = View::new(1);
    view.add_peer(peer_id);
    view.activate_peer(peer_id);
    view.add_pfx_peer(pfx_a, peer_id, path_idx).unwrap();
    view.pfx_activate_peer(pfx_a, peer_id).unwrap();
    view.add_pfx_peer(pfx_b, peer_id, path_idx).unwrap();
    view.pfx_activate_peer(pfx_b, peer_id).unwrap();

    let mut wire = Vec::new();
    write_sync(&mut wire, &view, &peers, &paths, &mut NoFilter, HostEndian::native()).unwrap();

    let mut rd_peers = PeerStore::new();
    let mut rd_paths = AsPathStore::new();
    let mut filter = DropPfx(pfx_a);
    let decoded = match read_frame(&mut wire.as_slice(), &mut rd_peers, &mut rd_paths, &mut filter, false)
        .unwrap()
        .unwrap()
    {
        DecodedFrame::Sync(view) => view,
        DecodedFrame::Diff(_) => unreachable!(),
    };
    assert!(!decoded.has_pfx(pfx_a));
    assert!(decoded.pfx_is_active(pfx_b));
}
