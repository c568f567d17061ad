/*!
Core data model: interning stores for peer signatures and AS paths, network primitives,
and the sparse (peer × prefix) view itself.
*/
pub mod aspath;
pub mod network;
pub mod peer_store;
pub mod view;

pub use aspath::AsPathStore;
pub use network::{PeerId, PeerSignature, Prefix};
pub use peer_store::PeerStore;
pub use view::{FieldFilter, IpFamily, View, ViewCursor};
