/*!
Thin binding of the codec to a compressed byte stream: the archival path and the crate's
own round-trip self-tests both go through here rather than the pub/sub transport.
*/
#[cfg(feature = "file")]
pub mod file;
