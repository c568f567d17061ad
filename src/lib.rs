/*!
A view-exchange library for distributing BGP RIB snapshots between a producer and any
number of consumers, in the spirit of BGPStream's `bgpview` IO plugins but built around a
Rust-native framed binary codec and a pub/sub transport abstraction rather than a
Kafka-specific wire format.

A "view" is a sparse `(peer, prefix) -> AS path` matrix as seen by one route collector at
one point in time. Producers decide whether to emit a full synchronization frame or an
incremental diff against the last synchronization, and consumers reassemble a coherent
[`View`](models::View) from whichever frames they receive, tolerating corrupt or
out-of-sequence frames by discarding the in-flight view and waiting for the next sync
rather than failing the whole stream.

# Examples

Producing and consuming a view entirely in memory, with no transport at all:

```
use bgpview::codec::{write_sync, read_frame, DecodedFrame, NoFilter, HostEndian};
use bgpview::models::{AsPathStore, PeerStore, PeerSignature, Prefix, View};
use std::net::{IpAddr, Ipv4Addr};

let mut peers = PeerStore::new();
let mut paths = AsPathStore::new();
let peer = peers
    .add(PeerSignature::new("rrc00", IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 65001))
    .unwrap()
    .id;

let mut view = View::new(1_700_000_000);
view.add_peer(peer);
view.activate_peer(peer);
let pfx = Prefix::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 0)), 24).unwrap();
let path_idx = paths.intern(&[1, 2, 3], false).unwrap().idx;
view.add_pfx_peer(pfx, peer, path_idx).unwrap();
view.pfx_activate_peer(pfx, peer).unwrap();

let mut wire = Vec::new();
write_sync(&mut wire, &view, &peers, &paths, &mut NoFilter, HostEndian::native()).unwrap();

let mut cursor = std::io::Cursor::new(wire);
let mut rx_peers = PeerStore::new();
let mut rx_paths = AsPathStore::new();
match read_frame(&mut cursor, &mut rx_peers, &mut rx_paths, &mut NoFilter, false)
    .unwrap()
    .unwrap()
{
    DecodedFrame::Sync(decoded) => assert_eq!(decoded.time(), 1_700_000_000),
    DecodedFrame::Diff(_) => unreachable!("first frame is always a sync"),
}
```

# Feature flags

- `file` — compressed file/URL I/O via `oneio`, used by the archival sink and the crate's
  own round-trip tests.
- `kafka-io` — Kafka-backed [`producer::kafka`] and [`consumer::kafka`] transports.
- `archiver` — the [`consumers::archiver`] sink, which depends on `file` for its writer and
  on `chrono` for filename templating.
- `cli` — builds the `bgpview` binary (`src/bin/main.rs`).

All four are enabled by default; a caller embedding just the codec and in-memory
producer/consumer can disable default features and depend only on `log`.
*/

pub mod codec;
pub mod config;
pub mod consumer;
pub mod consumers;
pub mod error;
#[cfg(feature = "file")]
pub mod io;
pub mod models;
pub mod producer;

pub use config::Config;
pub use error::CoreError;
pub use models::View;
