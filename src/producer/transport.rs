/*!
Transport-facing capability the producer depends on; implemented for Kafka in
[`super::kafka`] and for an in-memory recorder in tests.
*/
use crate::error::CoreError;

/// One members-topic heartbeat record (spec.md §4.5). `last_seen_time = 0` is the
/// shutdown tombstone.
#[derive(Debug, Clone)]
pub struct MembersHeartbeat {
    pub identity: String,
    pub channel: String,
    pub first_seen_time: u32,
    pub last_seen_time: u32,
}

/// What a producer needs from its transport. Errors must already be classified as
/// [`CoreError::Transient`] or [`CoreError::Fatal`] by the implementation — the producer
/// itself only reacts to that classification (spec.md §4.5, §7).
pub trait ProducerTransport {
    fn publish_peers(&mut self, identity: &str, frame: &[u8]) -> Result<(), CoreError>;
    fn publish_pfxs(&mut self, identity: &str, frame: &[u8]) -> Result<(), CoreError>;
    fn publish_meta(&mut self, identity: &str, meta: &[u8]) -> Result<(), CoreError>;
    fn publish_members(&mut self, heartbeat: &MembersHeartbeat) -> Result<(), CoreError>;

    /// Re-establishes the transport connection after a transient failure.
    fn reconnect(&mut self) -> Result<(), CoreError>;
}
