use super::{
    composite, CellFlag, HostEndian, ViewFilter, FORMAT_VERSION, SECTION_PATH, SECTION_PEND,
    SECTION_STRT, SECTION_VEND, SECTION_XEND,
};
use crate::error::CoreError;
use crate::models::network::{PeerId, PeerSignature, Prefix};
use crate::models::{AsPathStore, PeerStore, View};
use bytes::Buf;
use std::collections::HashMap;
use std::io::{BufRead, Read};
use std::net::IpAddr;

/// Reads exactly `n` bytes. Every call site is reached only after `peek_composite` has
/// already confirmed more data follows, so a clean end-of-stream can't legitimately occur
/// here — `UnexpectedEof` can only mean the stream was truncated partway through a record,
/// which is corruption, not an `EofError` (spec.md §8: never a silently accepted partial
/// view).
fn read_exact_n<R: Read>(input: &mut R, n: usize) -> Result<Vec<u8>, CoreError> {
    let mut buf = vec![0u8; n];
    input.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            CoreError::Corruption(format!(
                "stream truncated mid-record: expected {n} more bytes"
            ))
        } else {
            CoreError::from(e)
        }
    })?;
    Ok(buf)
}

fn read_u8<R: Read>(input: &mut R) -> Result<u8, CoreError> {
    Ok(read_exact_n(input, 1)?[0])
}

fn read_u16<R: Read>(input: &mut R) -> Result<u16, CoreError> {
    Ok(read_exact_n(input, 2)?.as_slice().get_u16())
}

fn read_u32<R: Read>(input: &mut R) -> Result<u32, CoreError> {
    Ok(read_exact_n(input, 4)?.as_slice().get_u32())
}

fn read_u32_endian<R: Read>(input: &mut R, endian: HostEndian) -> Result<u32, CoreError> {
    let bytes = read_exact_n(input, 4)?;
    Ok(match endian {
        HostEndian::Big => (&bytes[..]).get_u32(),
        HostEndian::Little => (&bytes[..]).get_u32_le(),
    })
}

fn read_u64<R: Read>(input: &mut R) -> Result<u64, CoreError> {
    Ok(read_exact_n(input, 8)?.as_slice().get_u64())
}

fn read_ip<R: Read>(input: &mut R) -> Result<IpAddr, CoreError> {
    let len = read_u8(input)?;
    match len {
        4 => {
            let bytes = read_exact_n(input, 4)?;
            Ok(IpAddr::from(<[u8; 4]>::try_from(bytes.as_slice()).unwrap()))
        }
        16 => {
            let bytes = read_exact_n(input, 16)?;
            Ok(IpAddr::from(
                <[u8; 16]>::try_from(bytes.as_slice()).unwrap(),
            ))
        }
        other => Err(CoreError::Corruption(format!(
            "invalid IP address length {other}"
        ))),
    }
}

/// Peeks the next 8 bytes without consuming them, relying on the `BufRead`'s internal
/// buffer holding at least 8 bytes whenever any data remains — true of any reasonably
/// sized `BufReader`. Returns `None` only at a genuine end of stream (no bytes left at
/// all), which is how a clean "no more views" boundary is distinguished from a truncated
/// frame (spec.md §8).
fn peek_composite<R: BufRead>(input: &mut R) -> Result<Option<u64>, CoreError> {
    let available = input.fill_buf()?;
    if available.is_empty() {
        return Ok(None);
    }
    if available.len() >= 8 {
        return Ok(Some((&available[..8]).get_u64()));
    }
    // Fewer than 8 bytes left in the buffer but not EOF: read them out (they're either a
    // truncated magic or a very short tail) and report corruption rather than guessing.
    Err(CoreError::Corruption(
        "stream ended mid composite-magic".into(),
    ))
}

fn expect_composite<R: Read>(input: &mut R, expected_section: u32) -> Result<(), CoreError> {
    let got = read_u64(input)?;
    if got != composite(expected_section) {
        return Err(CoreError::Corruption(format!(
            "expected composite magic for section {expected_section:#x}, got {got:#x}"
        )));
    }
    Ok(())
}

/// Outcome of decoding one frame: a full view, or a diff to be applied to a caller-held
/// parent.
pub enum DecodedFrame {
    Sync(View),
    Diff(DiffFrame),
}

/// A decoded diff: per-cell add/remove/change deltas, not yet applied to a parent view.
/// `active_peers` is the frame's full active-peer set (diffs still carry a complete peer
/// section, see `write_diff`) and must replace the parent's peer set wholesale before the
/// cells are applied, since peers can join or leave between views too.
pub struct DiffFrame {
    pub time: u32,
    pub path_endian_mismatch: bool,
    pub active_peers: Vec<PeerId>,
    pub cells: Vec<DiffCell>,
}

pub struct DiffCell {
    pub prefix: Prefix,
    pub peer_id: PeerId,
    pub path_idx: u32,
    pub flag: CellFlag,
}

struct PeerSection {
    id_map: HashMap<u16, PeerId>,
    kept: Vec<PeerId>,
}

fn read_peer_section<R: BufRead>(
    input: &mut R,
    peer_store: &mut PeerStore,
    filter: &mut dyn ViewFilter,
) -> Result<PeerSection, CoreError> {
    let mut id_map = HashMap::new();
    let mut kept = Vec::new();
    let mut parsed: u16 = 0;
    loop {
        match peek_composite(input)? {
            Some(magic) if magic == composite(SECTION_PEND) => {
                expect_composite(input, SECTION_PEND)?;
                let count = read_u16(input)?;
                if count != parsed {
                    return Err(CoreError::Corruption(format!(
                        "peer trailer count {count} does not match {parsed} records read"
                    )));
                }
                break;
            }
            Some(_) => {}
            None => {
                return Err(CoreError::Corruption(
                    "stream ended inside peer section".into(),
                ))
            }
        }
        let wire_peer_id = read_u16(input)?;
        let collector_len = read_u8(input)? as usize;
        let collector_bytes = read_exact_n(input, collector_len)?;
        let collector = String::from_utf8_lossy(&collector_bytes).into_owned();
        let ip = read_ip(input)?;
        let asn = read_u32(input)?;
        parsed += 1;

        let sig = PeerSignature::new(collector, ip, asn);
        let keep = super::decision_to_result(filter.filter_peer(&sig))?;
        let result = peer_store.add(sig)?;
        id_map.insert(wire_peer_id, result.id);
        if keep {
            kept.push(result.id);
        }
    }
    Ok(PeerSection { id_map, kept })
}

struct PathSection {
    idx_map: HashMap<u32, u32>,
}

fn read_path_section<R: BufRead>(
    input: &mut R,
    path_store: &mut AsPathStore,
    declared_endian: HostEndian,
) -> Result<PathSection, CoreError> {
    let mut idx_map = HashMap::new();
    let mut parsed: u32 = 0;
    loop {
        match peek_composite(input)? {
            Some(magic) if magic == composite(SECTION_PATH) => {
                expect_composite(input, SECTION_PATH)?;
                let count = read_u32(input)?;
                if count != parsed {
                    return Err(CoreError::Corruption(format!(
                        "path trailer count {count} does not match {parsed} records read"
                    )));
                }
                break;
            }
            Some(_) => {}
            None => {
                return Err(CoreError::Corruption(
                    "stream ended inside path section".into(),
                ))
            }
        }
        let wire_idx = read_u32_endian(input, declared_endian)?;
        let is_core = read_u8(input)? != 0;
        let path_len = read_u16(input)? as usize;
        let path_bytes = read_exact_n(input, path_len)?;
        parsed += 1;

        let result = path_store.intern(&path_bytes, is_core)?;
        idx_map.insert(wire_idx, result.idx);
    }
    Ok(PathSection { idx_map })
}

struct PfxPeerRecord {
    wire_peer_id: u16,
    path_idx: u32,
    flag: Option<CellFlag>,
}

fn read_pfx_section<R: BufRead>(
    input: &mut R,
    declared_endian: HostEndian,
    is_diff: bool,
) -> Result<Vec<(Prefix, Vec<PfxPeerRecord>)>, CoreError> {
    let mut prefixes = Vec::new();
    let mut parsed: u32 = 0;
    loop {
        match peek_composite(input)? {
            Some(magic) if magic == composite(SECTION_XEND) => {
                expect_composite(input, SECTION_XEND)?;
                let count = read_u32(input)?;
                if count != parsed {
                    return Err(CoreError::Corruption(format!(
                        "pfx trailer count {count} does not match {parsed} records read"
                    )));
                }
                break;
            }
            Some(_) => {}
            None => {
                return Err(CoreError::Corruption(
                    "stream ended inside pfx section".into(),
                ))
            }
        }
        let ip = read_ip(input)?;
        let mask_len = read_u8(input)?;
        let prefix = Prefix::new(ip, mask_len)
            .map_err(|e| CoreError::Corruption(format!("invalid prefix mask: {e}")))?;

        let mut cells = Vec::new();
        let mut peer_parsed: u16 = 0;
        loop {
            match peek_composite(input)? {
                Some(magic) if magic == composite(SECTION_PEND) => {
                    expect_composite(input, SECTION_PEND)?;
                    let count = read_u16(input)?;
                    if count != peer_parsed {
                        return Err(CoreError::Corruption(format!(
                            "pfx-peer trailer count {count} does not match {peer_parsed} records read"
                        )));
                    }
                    break;
                }
                Some(_) => {}
                None => {
                    return Err(CoreError::Corruption(
                        "stream ended inside pfx-peer section".into(),
                    ))
                }
            }
            let wire_peer_id = read_u16(input)?;
            let path_idx = read_u32_endian(input, declared_endian)?;
            let flag = if is_diff {
                Some(CellFlag::from_wire(read_u8(input)?)?)
            } else {
                None
            };
            peer_parsed += 1;
            cells.push(PfxPeerRecord {
                wire_peer_id,
                path_idx,
                flag,
            });
        }
        parsed += 1;
        prefixes.push((prefix, cells));
    }
    Ok(prefixes)
}

/// Reads one frame from `input`, interning any newly seen peers/paths into `peers` and
/// `paths`. `is_diff` must match how the frame was written; in this crate the
/// `meta.<identity>` message preceding a frame on the pub/sub transport (or, for a
/// standalone file, the caller's own bookkeeping) carries that decision — it is not
/// re-derived from the frame bytes themselves (spec.md §4.5, §4.6).
pub fn read_frame<R: BufRead>(
    input: &mut R,
    peer_store: &mut PeerStore,
    path_store: &mut AsPathStore,
    filter: &mut dyn ViewFilter,
    is_diff: bool,
) -> Result<Option<DecodedFrame>, CoreError> {
    match peek_composite(input)? {
        Some(magic) if magic == composite(SECTION_STRT) => {
            expect_composite(input, SECTION_STRT)?;
        }
        Some(_) => {
            return Err(CoreError::Corruption(
                "expected STRT composite magic".into(),
            ))
        }
        None => return Ok(None),
    }

    let format_version = read_u8(input)?;
    if format_version != FORMAT_VERSION {
        return Err(CoreError::Corruption(format!(
            "unsupported format version {format_version}"
        )));
    }
    let declared_endian = HostEndian::from_wire(read_u8(input)?);
    let path_endian_mismatch = declared_endian != HostEndian::native();
    let time = read_u32(input)?;

    let peer_section = read_peer_section(input, peer_store, filter)?;
    let path_section = read_path_section(input, path_store, declared_endian)?;
    let pfx_records = read_pfx_section(input, declared_endian, is_diff)?;

    expect_composite(input, SECTION_VEND)?;

    if is_diff {
        let mut cells = Vec::new();
        for (prefix, records) in pfx_records {
            if !super::decision_to_result(filter.filter_pfx(prefix))? {
                continue;
            }
            for record in records {
                let local_peer = *peer_section.id_map.get(&record.wire_peer_id).ok_or_else(|| {
                    CoreError::Corruption(format!(
                        "pfx-peer references unknown wire peer id {}",
                        record.wire_peer_id
                    ))
                })?;
                if !super::decision_to_result(filter.filter_pfx_peer(prefix, local_peer))? {
                    continue;
                }
                let local_idx = *path_section.idx_map.get(&record.path_idx).ok_or_else(|| {
                    CoreError::Corruption(format!(
                        "pfx-peer references unknown wire path index {}",
                        record.path_idx
                    ))
                })?;
                cells.push(DiffCell {
                    prefix,
                    peer_id: local_peer,
                    path_idx: local_idx,
                    flag: record.flag.expect("diff records always carry a flag"),
                });
            }
        }
        Ok(Some(DecodedFrame::Diff(DiffFrame {
            time,
            path_endian_mismatch,
            active_peers: peer_section.kept,
            cells,
        })))
    } else {
        let mut view = View::new(time);
        view.set_path_endian_mismatch(path_endian_mismatch);
        for peer_id in &peer_section.kept {
            view.add_peer(*peer_id);
            view.activate_peer(*peer_id);
        }
        for (prefix, records) in pfx_records {
            if !super::decision_to_result(filter.filter_pfx(prefix))? {
                continue;
            }
            for record in records {
                let local_peer = *peer_section.id_map.get(&record.wire_peer_id).ok_or_else(|| {
                    CoreError::Corruption(format!(
                        "pfx-peer references unknown wire peer id {}",
                        record.wire_peer_id
                    ))
                })?;
                if !view.has_peer(local_peer) {
                    // peer existed on the wire but was filtered out: drop its cells too.
                    continue;
                }
                if !super::decision_to_result(filter.filter_pfx_peer(prefix, local_peer))? {
                    continue;
                }
                let local_idx = *path_section.idx_map.get(&record.path_idx).ok_or_else(|| {
                    CoreError::Corruption(format!(
                        "pfx-peer references unknown wire path index {}",
                        record.path_idx
                    ))
                })?;
                view.add_pfx_peer(prefix, local_peer, local_idx)?;
                view.pfx_activate_peer(prefix, local_peer)?;
            }
        }
        Ok(Some(DecodedFrame::Sync(view)))
    }
}
