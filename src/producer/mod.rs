/*!
Single-threaded cooperative producer: decides sync vs. diff per emission, maintains the
retained parent view, shards frames across topics, and classifies transport failures for
bounded exponential backoff (spec.md §4.5, §5).
*/
mod transport;

#[cfg(feature = "kafka-io")]
pub mod kafka;

pub use transport::{MembersHeartbeat, ProducerTransport};

use crate::codec::{write_diff, write_sync, DiffStats, HostEndian, ViewFilter};
use crate::error::CoreError;
use crate::models::{AsPathStore, PeerStore, View};
use log::{debug, info, warn};
use std::time::Duration;

const BACKOFF_START: Duration = Duration::from_secs(10);
const BACKOFF_FACTOR: u32 = 2;
const BACKOFF_CAP: Duration = Duration::from_secs(180);
const BACKOFF_MAX_RETRIES: u32 = 10;

/// Result of one [`Producer::send`] call.
#[derive(Debug)]
pub enum SendOutcome {
    /// A full view was emitted; the parent is now `view`.
    Sync(DiffStats),
    /// A diff against the retained parent was emitted; the parent is now `view`.
    Diff(DiffStats),
    /// The producer is out of alignment with `sync_interval` and has no parent yet; per
    /// spec.md §4.5 it emits nothing rather than a non-aligned sync.
    Skipped,
}

/// Tracks connection health across calls so failures can be classified and retried with
/// bounded exponential backoff, mirroring `bgpview_io_kafka.c`'s reconnect loop.
struct Backoff {
    attempt: u32,
    wait: Duration,
}

impl Backoff {
    fn new() -> Self {
        Backoff {
            attempt: 0,
            wait: BACKOFF_START,
        }
    }

    fn reset(&mut self) {
        self.attempt = 0;
        self.wait = BACKOFF_START;
    }

    fn next_wait(&mut self) -> Option<Duration> {
        if self.attempt >= BACKOFF_MAX_RETRIES {
            return None;
        }
        let wait = self.wait;
        self.attempt += 1;
        self.wait = std::cmp::min(self.wait * BACKOFF_FACTOR, BACKOFF_CAP);
        Some(wait)
    }
}

/// Maintains an optional parent view and emits sync/diff frames onto a
/// [`ProducerTransport`].
pub struct Producer<T: ProducerTransport> {
    identity: String,
    sync_interval: u32,
    transport: T,
    parent: Option<View>,
    host_endian: HostEndian,
    backoff: Backoff,
    connected: bool,
    last_view_time: Option<u32>,
}

impl<T: ProducerTransport> Producer<T> {
    pub fn new(identity: impl Into<String>, sync_interval: u32, transport: T) -> Self {
        Producer {
            identity: identity.into(),
            sync_interval: sync_interval.max(1),
            transport,
            parent: None,
            host_endian: HostEndian::native(),
            backoff: Backoff::new(),
            connected: true,
            last_view_time: None,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    fn is_aligned(&self, time: u32) -> bool {
        time % self.sync_interval == 0
    }

    /// Emits `view`, deciding sync vs. diff per spec.md §4.5, and updates the retained
    /// parent on success. Views must be handed to the producer in non-decreasing time
    /// order; an out-of-order call is rejected as corruption rather than silently
    /// accepted.
    pub fn send(
        &mut self,
        view: &View,
        peers: &PeerStore,
        paths: &AsPathStore,
        filter: &mut dyn ViewFilter,
    ) -> Result<SendOutcome, CoreError> {
        if let Some(last) = self.last_view_time {
            if view.time() < last {
                return Err(CoreError::Corruption(format!(
                    "view time {} precedes previously accepted time {last}",
                    view.time()
                )));
            }
        }

        let will_sync = self.parent.is_none() || self.is_aligned(view.time());

        if self.parent.is_none() && !self.is_aligned(view.time()) {
            info!(
                "producer {} skipping out-of-alignment view at t={} (sync_interval={})",
                self.identity,
                view.time(),
                self.sync_interval
            );
            return Ok(SendOutcome::Skipped);
        }

        let identity = self.identity.clone();
        let stats = if will_sync {
            self.emit_with_retry(|transport, endian| {
                let mut buf = Vec::new();
                let stats = write_sync(&mut buf, view, peers, paths, filter, endian)?;
                transport.publish_peers(&identity, &buf)?;
                transport.publish_pfxs(&identity, &buf)?;
                transport.publish_meta(&identity, &meta_bytes(view.time(), true, &stats))?;
                Ok(stats)
            })?
        } else {
            let parent = self.parent.clone().expect("will_sync false implies parent exists");
            self.emit_with_retry(|transport, endian| {
                let mut buf = Vec::new();
                let stats = write_diff(&mut buf, view, &parent, peers, paths, filter, endian)?;
                transport.publish_peers(&identity, &buf)?;
                transport.publish_pfxs(&identity, &buf)?;
                transport.publish_meta(&identity, &meta_bytes(view.time(), false, &stats))?;
                Ok(stats)
            })?
        };

        match &mut self.parent {
            Some(parent) => {
                parent.clear();
                *parent = view.clone();
            }
            None => self.parent = Some(view.clone()),
        }
        self.last_view_time = Some(view.time());

        if will_sync {
            Ok(SendOutcome::Sync(stats))
        } else {
            Ok(SendOutcome::Diff(stats))
        }
    }

    /// Runs `op` against the transport, classifying failures per spec.md §4.5: transient
    /// errors mark the client disconnected and retry with bounded exponential backoff;
    /// fatal errors propagate immediately so the caller destroys the producer. A failed
    /// emit leaves the retained parent unchanged.
    fn emit_with_retry(
        &mut self,
        mut op: impl FnMut(&mut T, HostEndian) -> Result<DiffStats, CoreError>,
    ) -> Result<DiffStats, CoreError> {
        loop {
            if !self.connected {
                match self.transport.reconnect() {
                    Ok(()) => {
                        self.connected = true;
                        self.backoff.reset();
                    }
                    Err(CoreError::Transient(msg)) => {
                        warn!("producer {} reconnect failed: {msg}", self.identity);
                        match self.backoff.next_wait() {
                            Some(wait) => {
                                debug!("producer {} backing off for {wait:?}", self.identity);
                                std::thread::sleep(wait);
                                continue;
                            }
                            None => {
                                return Err(CoreError::Fatal(format!(
                                    "producer {} exhausted {BACKOFF_MAX_RETRIES} reconnect retries: {msg}",
                                    self.identity
                                )))
                            }
                        }
                    }
                    Err(other) => return Err(other),
                }
            }
            match op(&mut self.transport, self.host_endian) {
                Ok(stats) => {
                    self.backoff.reset();
                    return Ok(stats);
                }
                Err(CoreError::Transient(msg)) => {
                    self.connected = false;
                    warn!("producer {} transient error: {msg}", self.identity);
                    match self.backoff.next_wait() {
                        Some(wait) => {
                            debug!("producer {} backing off for {wait:?}", self.identity);
                            std::thread::sleep(wait);
                        }
                        None => {
                            return Err(CoreError::Fatal(format!(
                                "producer {} exhausted {BACKOFF_MAX_RETRIES} retries: {msg}",
                                self.identity
                            )))
                        }
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Emits the periodic members heartbeat; shutdown should call this once more with
    /// `last_seen_time = 0` as a tombstone (spec.md §4.5).
    pub fn heartbeat(&mut self, channel: &str, first_seen: u32, last_seen: u32) -> Result<(), CoreError> {
        self.transport.publish_members(&MembersHeartbeat {
            identity: self.identity.clone(),
            channel: channel.to_string(),
            first_seen_time: first_seen,
            last_seen_time: last_seen,
        })
    }

    pub fn shutdown(&mut self, channel: &str, first_seen: u32) -> Result<(), CoreError> {
        self.heartbeat(channel, first_seen, 0)
    }
}

fn meta_bytes(time: u32, is_sync: bool, stats: &DiffStats) -> Vec<u8> {
    // A compact, line-oriented meta record: not part of the framed codec, carried on the
    // dedicated `meta.<identity>` topic so a consumer can decide sync-vs-diff before it
    // even looks at the pfxs topic.
    format!(
        "time={time} sync={is_sync} common_pfx={} added_pfx={} removed_pfx={} changed_pfx={} added_pfx_peer={} changed_pfx_peer={} removed_pfx_peer={} sync_pfx={} pfx={}",
        stats.common_pfx_cnt,
        stats.added_pfx_cnt,
        stats.removed_pfx_cnt,
        stats.changed_pfx_cnt,
        stats.added_pfx_peer_cnt,
        stats.changed_pfx_peer_cnt,
        stats.removed_pfx_peer_cnt,
        stats.sync_pfx_cnt,
        stats.pfx_cnt,
    )
    .into_bytes()
}
