/*!
Transport-facing capability a consumer pipeline depends on.
*/
use crate::error::CoreError;

/// One polled frame: whether it is a diff (vs. a sync) and its raw bytes. Producers in
/// this crate publish the complete, self-validating frame to both the `peers.<identity>`
/// and `pfxs.<identity>` topics (see `DESIGN.md`), so a direct-mode consumer only needs
/// one canonical stream to decode from; `is_diff` rides on the accompanying
/// `meta.<identity>` message the same way the producer decided it.
pub struct PolledFrame {
    pub is_diff: bool,
    pub bytes: Vec<u8>,
}

/// One observed `members` topic heartbeat.
#[derive(Debug, Clone)]
pub struct MemberEvent {
    pub identity: String,
    pub channel: String,
    pub first_seen_time: u32,
    pub last_seen_time: u32,
}

/// What a direct-mode consumer needs from its transport.
pub trait ConsumerTransport {
    /// Returns the next available frame, or `None` if none is currently available
    /// (callers should back off and retry, not treat this as end-of-stream).
    fn poll_frame(&mut self) -> Result<Option<PolledFrame>, CoreError>;
}

/// What the global consumer's coordinator needs to discover producer identities.
pub trait MembersTransport {
    fn poll_members(&mut self) -> Result<Vec<MemberEvent>, CoreError>;
}

impl<T: ConsumerTransport + ?Sized> ConsumerTransport for Box<T> {
    fn poll_frame(&mut self) -> Result<Option<PolledFrame>, CoreError> {
        (**self).poll_frame()
    }
}
