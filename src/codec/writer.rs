use super::{
    composite, decision_to_result, CellFlag, HostEndian, ViewFilter, FORMAT_VERSION, SECTION_PATH,
    SECTION_PEND, SECTION_STRT, SECTION_VEND, SECTION_XEND,
};
use crate::error::CoreError;
use crate::models::view::{FieldFilter, IpFamily};
use crate::models::{AsPathStore, PeerId, PeerStore, Prefix, View};
use bytes::{BufMut, BytesMut};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;

/// Delta statistics produced by one emit, matching the counter set spec.md §4.5 names.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffStats {
    pub common_pfx_cnt: u32,
    pub added_pfx_cnt: u32,
    pub removed_pfx_cnt: u32,
    pub changed_pfx_cnt: u32,
    pub added_pfx_peer_cnt: u32,
    pub changed_pfx_peer_cnt: u32,
    pub removed_pfx_peer_cnt: u32,
    pub sync_pfx_cnt: u32,
    pub pfx_cnt: u32,
}

fn write_prefix_addr(buf: &mut BytesMut, pfx: Prefix) {
    match pfx.address() {
        std::net::IpAddr::V4(v4) => {
            buf.put_u8(4);
            buf.put_slice(&v4.octets());
        }
        std::net::IpAddr::V6(v6) => {
            buf.put_u8(16);
            buf.put_slice(&v6.octets());
        }
    }
}

fn write_path_idx(buf: &mut BytesMut, idx: u32, host_endian: HostEndian) {
    match host_endian {
        HostEndian::Big => buf.put_u32(idx),
        HostEndian::Little => buf.put_u32_le(idx),
    }
}

/// Emits the peer and path sections shared by sync and diff frames; both refer to the
/// *current* active peer/path set, since a diff only changes the meaning of the pfx
/// section (spec.md §4.5). Returns the set of peer ids actually written, so the pfx
/// section can skip cells for any peer `filter_peer` dropped — otherwise the dropped
/// peer's cells would reference a wire id absent from the peer section and the whole
/// frame would fail to decode instead of just omitting that peer (spec.md §8 scenario 3).
fn write_peers_and_paths(
    buf: &mut BytesMut,
    view: &View,
    peers: &PeerStore,
    paths: &AsPathStore,
    filter: &mut dyn ViewFilter,
    host_endian: HostEndian,
) -> Result<HashSet<PeerId>, CoreError> {
    let mut peer_count: u16 = 0;
    let mut kept_peers = HashSet::new();
    for peer_id in view.iter_peers(FieldFilter::Active) {
        let sig = peers.lookup(peer_id).ok_or_else(|| {
            CoreError::Corruption(format!("active peer id {peer_id} missing from peer store"))
        })?;
        if !decision_to_result(filter.filter_peer(sig))? {
            continue;
        }
        kept_peers.insert(peer_id);
        buf.put_u16(peer_id.get());
        let collector_bytes = sig.collector.as_bytes();
        if collector_bytes.len() > u8::MAX as usize {
            return Err(CoreError::Corruption(format!(
                "collector name {:?} exceeds 255 bytes",
                sig.collector
            )));
        }
        buf.put_u8(collector_bytes.len() as u8);
        buf.put_slice(collector_bytes);
        match sig.ip {
            std::net::IpAddr::V4(v4) => {
                buf.put_u8(4);
                buf.put_slice(&v4.octets());
            }
            std::net::IpAddr::V6(v6) => {
                buf.put_u8(16);
                buf.put_slice(&v6.octets());
            }
        }
        buf.put_u32(sig.asn);
        peer_count += 1;
    }
    buf.put_u64(composite(SECTION_PEND));
    buf.put_u16(peer_count);

    let mut path_count: u32 = 0;
    for (idx, entry) in paths.iter() {
        write_path_idx(buf, idx, host_endian);
        buf.put_u8(entry.is_core as u8);
        if entry.bytes.len() > u16::MAX as usize {
            return Err(CoreError::Corruption(
                "path byte string exceeds 65535 bytes".into(),
            ));
        }
        buf.put_u16(entry.bytes.len() as u16);
        buf.put_slice(&entry.bytes);
        path_count += 1;
    }
    buf.put_u64(composite(SECTION_PATH));
    buf.put_u32(path_count);
    Ok(kept_peers)
}

/// Writes a full (sync) frame for `view` to `out`.
pub fn write_sync<W: Write>(
    out: &mut W,
    view: &View,
    peers: &PeerStore,
    paths: &AsPathStore,
    filter: &mut dyn ViewFilter,
    host_endian: HostEndian,
) -> Result<DiffStats, CoreError> {
    let mut buf = BytesMut::new();
    buf.put_u64(composite(SECTION_STRT));
    buf.put_u8(FORMAT_VERSION);
    buf.put_u8(host_endian.to_wire());
    buf.put_u32(view.time());

    let kept_peers = write_peers_and_paths(&mut buf, view, peers, paths, filter, host_endian)?;

    let mut stats = DiffStats::default();
    let mut pfx_count: u32 = 0;
    for pfx in view.iter_prefixes(IpFamily::Both, FieldFilter::Active) {
        if !decision_to_result(filter.filter_pfx(pfx))? {
            continue;
        }
        let mut cells: Vec<(u16, u32)> = Vec::new();
        for (peer_id, path_idx) in view.iter_pfx_peers(pfx, FieldFilter::Active) {
            if !kept_peers.contains(&peer_id) {
                continue;
            }
            if !decision_to_result(filter.filter_pfx_peer(pfx, peer_id))? {
                continue;
            }
            cells.push((peer_id.get(), path_idx));
        }
        if cells.is_empty() {
            continue;
        }
        write_prefix_addr(&mut buf, pfx);
        buf.put_u8(pfx.mask_len());
        for (peer_id, path_idx) in &cells {
            buf.put_u16(*peer_id);
            write_path_idx(&mut buf, *path_idx, host_endian);
        }
        buf.put_u64(composite(SECTION_PEND));
        buf.put_u16(cells.len() as u16);
        pfx_count += 1;
        stats.added_pfx_peer_cnt += cells.len() as u32;
    }
    stats.pfx_cnt = pfx_count;
    stats.sync_pfx_cnt = pfx_count;
    buf.put_u64(composite(SECTION_XEND));
    buf.put_u32(pfx_count);

    buf.put_u64(composite(SECTION_VEND));
    out.write_all(&buf)?;
    Ok(stats)
}

fn active_cells(view: &View, pfx: Prefix) -> BTreeMap<u16, u32> {
    view.iter_pfx_peers(pfx, FieldFilter::Active)
        .map(|(id, idx)| (id.get(), idx))
        .collect()
}

/// Writes a diff frame: peer and path sections are the current full active sets; the pfx
/// section carries only added/removed/changed cells relative to `parent`, each tagged
/// with a [`CellFlag`] byte.
pub fn write_diff<W: Write>(
    out: &mut W,
    view: &View,
    parent: &View,
    peers: &PeerStore,
    paths: &AsPathStore,
    filter: &mut dyn ViewFilter,
    host_endian: HostEndian,
) -> Result<DiffStats, CoreError> {
    let mut buf = BytesMut::new();
    buf.put_u64(composite(SECTION_STRT));
    buf.put_u8(FORMAT_VERSION);
    buf.put_u8(host_endian.to_wire());
    buf.put_u32(view.time());

    let kept_peers = write_peers_and_paths(&mut buf, view, peers, paths, filter, host_endian)?;

    let mut stats = DiffStats::default();
    let mut all_prefixes: BTreeMap<Prefix, ()> = BTreeMap::new();
    for pfx in view.iter_prefixes(IpFamily::Both, FieldFilter::Active) {
        all_prefixes.insert(pfx, ());
    }
    for pfx in parent.iter_prefixes(IpFamily::Both, FieldFilter::Active) {
        all_prefixes.insert(pfx, ());
    }

    let mut pfx_count: u32 = 0;
    for (pfx, ()) in &all_prefixes {
        let pfx = *pfx;
        if !decision_to_result(filter.filter_pfx(pfx))? {
            continue;
        }
        let view_cells = active_cells(view, pfx);
        let parent_cells = active_cells(parent, pfx);

        let mut deltas: Vec<(u16, u32, CellFlag)> = Vec::new();
        for (&peer_id, &path_idx) in &view_cells {
            match parent_cells.get(&peer_id) {
                Some(&parent_idx) if parent_idx == path_idx => {} // common
                Some(_) => deltas.push((peer_id, path_idx, CellFlag::Changed)),
                None => deltas.push((peer_id, path_idx, CellFlag::Added)),
            }
        }
        for (&peer_id, &parent_idx) in &parent_cells {
            if !view_cells.contains_key(&peer_id) {
                deltas.push((peer_id, parent_idx, CellFlag::Removed));
            }
        }

        if deltas.is_empty() {
            if !parent_cells.is_empty() && parent_cells == view_cells {
                stats.common_pfx_cnt += 1;
            }
            continue;
        }

        let any_peer_filtered_out = {
            let mut kept = Vec::with_capacity(deltas.len());
            for (peer_id, path_idx, flag) in deltas {
                let pid = PeerId::new(peer_id)
                    .ok_or_else(|| CoreError::Corruption("peer id 0 on wire".into()))?;
                if !kept_peers.contains(&pid) {
                    continue;
                }
                if decision_to_result(filter.filter_pfx_peer(pfx, pid))? {
                    kept.push((peer_id, path_idx, flag));
                }
            }
            kept
        };
        if any_peer_filtered_out.is_empty() {
            continue;
        }

        write_prefix_addr(&mut buf, pfx);
        buf.put_u8(pfx.mask_len());
        let mut added = 0u32;
        let mut changed = 0u32;
        let mut removed = 0u32;
        for (peer_id, path_idx, flag) in &any_peer_filtered_out {
            buf.put_u16(*peer_id);
            write_path_idx(&mut buf, *path_idx, host_endian);
            buf.put_u8(*flag as u8);
            match flag {
                CellFlag::Added => added += 1,
                CellFlag::Changed => changed += 1,
                CellFlag::Removed => removed += 1,
            }
        }
        buf.put_u64(composite(SECTION_PEND));
        buf.put_u16(any_peer_filtered_out.len() as u16);
        pfx_count += 1;
        stats.added_pfx_peer_cnt += added;
        stats.changed_pfx_peer_cnt += changed;
        stats.removed_pfx_peer_cnt += removed;
        if removed > 0 && added == 0 && changed == 0 {
            stats.removed_pfx_cnt += 1;
        } else if added > 0 && removed == 0 && changed == 0 && !parent_cells.is_empty() {
            stats.changed_pfx_cnt += 1;
        } else if parent_cells.is_empty() {
            stats.added_pfx_cnt += 1;
        } else {
            stats.changed_pfx_cnt += 1;
        }
    }
    stats.pfx_cnt = view.iter_prefixes(IpFamily::Both, FieldFilter::Active).count() as u32;
    buf.put_u64(composite(SECTION_XEND));
    buf.put_u32(pfx_count);

    buf.put_u64(composite(SECTION_VEND));
    out.write_all(&buf)?;
    Ok(stats)
}
