/*!
Network-level building blocks shared by the view data model and the wire codec: peer
signatures and canonicalized prefixes.
*/
mod peer;
mod prefix;

pub use peer::{PeerId, PeerSignature};
pub use prefix::Prefix;
