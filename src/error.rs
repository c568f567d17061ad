/*!
error module defines the error types used across the view-exchange pipeline.
*/
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::{error::Error, fmt, io};

/// Error kinds surfaced by the codec, producer, and consumer.
///
/// Maps onto the error kinds of the view-exchange design: `Corruption` is fatal to the
/// in-flight view only (the consumer discards it and returns to `AwaitingSync`);
/// `Transient` is recovered locally by the producer/consumer's backoff loop; `Fatal`
/// must propagate to the caller, who is expected to destroy the client; `StoreFull` is a
/// specific `Fatal` condition raised by the interning stores.
#[derive(Debug)]
pub enum CoreError {
    /// Magic mismatch, count mismatch, invalid IP length, or an AS-path index referenced
    /// by a pfx-peer record that is absent from the path table.
    Corruption(String),
    /// Transport disconnect, timeout, or broker unavailable; recoverable via backoff.
    Transient(String),
    /// Authentication failure, permanent broker refusal, or allocation failure.
    Fatal(String),
    /// An interning store (AS-path store or peer signature map) has exhausted its index
    /// space.
    StoreFull,
    /// Wrapped I/O error from the underlying reader/writer.
    IoError(io::Error),
    /// I/O error that represents a clean end-of-stream rather than a corrupt read.
    EofError(io::Error),
    /// The filter callback's `error` outcome, or a failure in the filter itself.
    FilterError(String),
}

impl Error for CoreError {}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Corruption(s) => write!(f, "corruption: {s}"),
            CoreError::Transient(s) => write!(f, "transient: {s}"),
            CoreError::Fatal(s) => write!(f, "fatal: {s}"),
            CoreError::StoreFull => write!(f, "interning store exhausted"),
            CoreError::IoError(e) => write!(f, "io error: {e}"),
            CoreError::EofError(e) => write!(f, "eof: {e}"),
            CoreError::FilterError(s) => write!(f, "filter error: {s}"),
        }
    }
}

impl From<io::Error> for CoreError {
    fn from(io_error: io::Error) -> Self {
        match io_error.kind() {
            ErrorKind::UnexpectedEof => CoreError::EofError(io_error),
            _ => CoreError::IoError(io_error),
        }
    }
}

#[cfg(feature = "file")]
impl From<oneio::OneIoError> for CoreError {
    fn from(error: oneio::OneIoError) -> Self {
        CoreError::Fatal(error.to_string())
    }
}
