/*!
The framed binary wire codec (spec.md §4.4, §6): independent of transport, consumed by
the file adapter and by the producer/consumer's transport bindings alike.

Every section is guarded by a 64-bit composite magic, `0x42475056_<<32 | <section magic>`,
peeked before being consumed (`read_composite_magic` never advances the cursor on a
mismatch, so callers can distinguish "clean end of stream" from "corrupt frame"). This
mirrors `bgpview_io_file.c`'s `check_magic()`, which peeks 8 bytes and only
`bs_common_read_drain`s them once the expected value is confirmed.
*/
mod full_feed;
mod reader;
mod writer;

pub use full_feed::FullFeedFilter;
pub use reader::{read_frame, DecodedFrame, DiffCell, DiffFrame};
pub use writer::{write_diff, write_sync, DiffStats};

use crate::error::CoreError;
use crate::models::{PeerId, PeerSignature, Prefix};

/// `"BGPV"` as a big-endian u32; the high half of every composite magic.
pub const VIEW_MAGIC: u32 = 0x4247_5056;

pub const SECTION_STRT: u32 = 0x5354_5254; // "STRT"
pub const SECTION_PEND: u32 = 0x5045_4E44; // "PEND"
pub const SECTION_PATH: u32 = 0x5041_5448; // "PATH"
pub const SECTION_XEND: u32 = 0x5845_4E44; // "XEND"
pub const SECTION_VEND: u32 = 0x5645_4E44; // "VEND"

pub(crate) fn composite(section: u32) -> u64 {
    (VIEW_MAGIC as u64) << 32 | section as u64
}

/// Format version written immediately after the `STRT` composite magic, resolving
/// spec.md §9's host-byte-order Open Question: both ends declare their endianness and a
/// reader whose declared endianness doesn't match its own records a mismatch rather than
/// guessing. See `SPEC_FULL.md` §9.
pub const FORMAT_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEndian {
    Little,
    Big,
}

impl HostEndian {
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            HostEndian::Big
        } else {
            HostEndian::Little
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            HostEndian::Little => 0,
            HostEndian::Big => 1,
        }
    }

    fn from_wire(byte: u8) -> Self {
        if byte == 1 {
            HostEndian::Big
        } else {
            HostEndian::Little
        }
    }
}

/// Outcome of a filter callback; `Error` propagates as a fatal codec failure
/// (`CoreError::FilterError`) from the read or write call in progress.
#[derive(Debug, Clone)]
pub enum Decision {
    Keep,
    Drop,
    Error(String),
}

/// Per-cell flag distinguishing add/remove/change in a diff frame's pfx-peer records.
/// Common cells (same path on both sides) are never emitted, so this type has no variant
/// for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFlag {
    Added = 0,
    Removed = 1,
    Changed = 2,
}

impl CellFlag {
    fn from_wire(byte: u8) -> Result<Self, CoreError> {
        match byte {
            0 => Ok(CellFlag::Added),
            1 => Ok(CellFlag::Removed),
            2 => Ok(CellFlag::Changed),
            other => Err(CoreError::Corruption(format!(
                "unknown diff cell flag {other}"
            ))),
        }
    }
}

/// Capability abstraction for the three filter points the codec exposes, replacing the
/// C library's function-pointer-plus-`void *user` pattern with a plain trait object
/// (spec.md §9 Design Notes).
pub trait ViewFilter {
    fn filter_peer(&mut self, sig: &PeerSignature) -> Decision {
        let _ = sig;
        Decision::Keep
    }

    fn filter_pfx(&mut self, pfx: Prefix) -> Decision {
        let _ = pfx;
        Decision::Keep
    }

    fn filter_pfx_peer(&mut self, pfx: Prefix, peer_id: PeerId) -> Decision {
        let _ = (pfx, peer_id);
        Decision::Keep
    }
}

/// A filter that keeps everything; the default when the caller has no filtering needs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFilter;

impl ViewFilter for NoFilter {}

pub(crate) fn decision_to_result(decision: Decision) -> Result<bool, CoreError> {
    match decision {
        Decision::Keep => Ok(true),
        Decision::Drop => Ok(false),
        Decision::Error(msg) => Err(CoreError::FilterError(msg)),
    }
}
