/*!
Multi-producer discovery mode: a coordinator thread watches the `members` topic and spawns
one worker thread per producer identity it sees, each running its own [`DirectConsumer`].
A dedicated thread per identity owns that identity's blocking transport polling, reporting
decoded views back to the caller over a channel, so one slow or stalled producer can't hold
up the others — the worker-discovery and liveness-window model described in spec.md §4.6.
*/
use super::{ConsumerState, ConsumerTransport, DirectConsumer, MemberEvent, MembersTransport};
use crate::codec::{NoFilter, ViewFilter};
use crate::error::CoreError;
use crate::models::View;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A composite snapshot: one view per live producer identity, all nominally at the same
/// time. The global consumer never fuses these into a single `View` — peer ids are only
/// unique within one producer's store — so downstream code reasons about them per
/// identity, the same way the `globalmeta[.<channel>]` topic's consumers do.
#[derive(Debug, Default, Clone)]
pub struct GlobalView {
    pub time: u32,
    pub views: HashMap<String, View>,
}

/// Builds the per-identity [`ConsumerTransport`] a worker thread subscribes with.
pub trait ConsumerTransportFactory: Send + Sync {
    fn open(&self, identity: &str) -> Result<Box<dyn ConsumerTransport + Send>, CoreError>;
}

enum WorkerMsg {
    View { identity: String, view: View },
    Stopped { identity: String },
}

struct Worker {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
    last_heartbeat: Instant,
}

/// Liveness window: a worker is torn down if its identity's heartbeat has not refreshed
/// within `3 * heartbeat_interval` (spec.md §4.6).
const LIVENESS_MULTIPLIER: u32 = 3;
/// Bounded wait for in-flight work to drain before a forced teardown on shutdown.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DRAIN_MAX_POLLS: u32 = 12;

/// Coordinates discovery and per-identity worker threads; `recv()` yields one
/// [`GlobalView`] per distinct view time observed across all live workers.
pub struct GlobalConsumer<M: MembersTransport> {
    members: M,
    factory: Arc<dyn ConsumerTransportFactory>,
    heartbeat_interval: Duration,
    workers: HashMap<String, Worker>,
    tx: Sender<WorkerMsg>,
    rx: Receiver<WorkerMsg>,
    pending: HashMap<u32, HashMap<String, View>>,
    state: ConsumerState,
}

impl<M: MembersTransport> GlobalConsumer<M> {
    pub fn new(
        members: M,
        factory: Arc<dyn ConsumerTransportFactory>,
        heartbeat_interval: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        GlobalConsumer {
            members,
            factory,
            heartbeat_interval,
            workers: HashMap::new(),
            tx,
            rx,
            pending: HashMap::new(),
            state: ConsumerState::Bootstrap,
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Polls `members`, spawning a worker for any newly observed identity and tearing
    /// down any whose tombstone (`last_seen_time == 0`) or liveness window has expired.
    pub fn reconcile_workers(&mut self) -> Result<(), CoreError> {
        self.state = ConsumerState::AwaitingSync;
        let events = self.members.poll_members()?;
        for event in events {
            if event.last_seen_time == 0 {
                self.stop_worker(&event.identity);
                continue;
            }
            match self.workers.get_mut(&event.identity) {
                Some(worker) => worker.last_heartbeat = Instant::now(),
                None => self.spawn_worker(event)?,
            }
        }

        let stale: Vec<String> = self
            .workers
            .iter()
            .filter(|(_, w)| {
                w.last_heartbeat.elapsed()
                    > self.heartbeat_interval * LIVENESS_MULTIPLIER
            })
            .map(|(identity, _)| identity.clone())
            .collect();
        for identity in stale {
            warn!("identity {identity} missed its liveness window, tearing down worker");
            self.stop_worker(&identity);
        }
        Ok(())
    }

    fn spawn_worker(&mut self, event: MemberEvent) -> Result<(), CoreError> {
        let identity = event.identity.clone();
        let transport = self.factory.open(&identity)?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let tx = self.tx.clone();
        let worker_shutdown = shutdown.clone();
        let worker_identity = identity.clone();
        let handle = thread::Builder::new()
            .name(format!("global-consumer-{identity}"))
            .spawn(move || run_worker(worker_identity, transport, worker_shutdown, tx))
            .expect("spawning consumer worker thread");

        info!("spawned worker for identity {identity}");
        self.workers.insert(
            identity,
            Worker {
                handle,
                shutdown,
                last_heartbeat: Instant::now(),
            },
        );
        Ok(())
    }

    fn stop_worker(&mut self, identity: &str) {
        if let Some(worker) = self.workers.remove(identity) {
            worker.shutdown.store(true, Ordering::SeqCst);
            let _ = worker.handle.join();
            info!("stopped worker for identity {identity}");
        }
    }

    /// Blocks until a composite view is ready (every currently live identity has produced
    /// a view at the same time) or `timeout` elapses.
    pub fn recv(&mut self, timeout: Duration) -> Option<GlobalView> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match self.rx.recv_timeout(remaining) {
                Ok(WorkerMsg::View { identity, view }) => {
                    let time = view.time();
                    let bucket = self.pending.entry(time).or_default();
                    bucket.insert(identity, view);
                    if self.live_identities().all(|id| bucket.contains_key(&id)) {
                        let views = self.pending.remove(&time).unwrap();
                        self.state = ConsumerState::Streaming;
                        return Some(GlobalView { time, views });
                    }
                }
                Ok(WorkerMsg::Stopped { identity }) => {
                    warn!("worker for identity {identity} exited, pruning pending buckets");
                    for bucket in self.pending.values_mut() {
                        bucket.remove(&identity);
                    }
                }
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn live_identities(&self) -> impl Iterator<Item = String> + '_ {
        self.workers.keys().cloned()
    }

    /// Cooperative shutdown: signals every worker, waits up to
    /// `DRAIN_MAX_POLLS * DRAIN_POLL_INTERVAL` for them to exit on their own, then returns
    /// without blocking further (a thread that never notices its flag is abandoned rather
    /// than killed — there is no forced-kill primitive for a plain `JoinHandle`).
    pub fn shutdown(&mut self) {
        self.state = ConsumerState::Draining;
        for worker in self.workers.values() {
            worker.shutdown.store(true, Ordering::SeqCst);
        }
        for _ in 0..DRAIN_MAX_POLLS {
            if self.workers.values().all(|w| w.handle.is_finished()) {
                break;
            }
            thread::sleep(DRAIN_POLL_INTERVAL);
        }
        let identities: Vec<String> = self.workers.keys().cloned().collect();
        for identity in identities {
            self.stop_worker(&identity);
        }
    }
}

fn run_worker(
    identity: String,
    transport: Box<dyn ConsumerTransport + Send>,
    shutdown: Arc<AtomicBool>,
    tx: Sender<WorkerMsg>,
) {
    let mut consumer = DirectConsumer::new(identity.clone(), transport);
    let mut filter = NoFilter;
    while !shutdown.load(Ordering::SeqCst) {
        match consumer.recv(&mut filter as &mut dyn ViewFilter) {
            Ok(Some(view)) => {
                if tx
                    .send(WorkerMsg::View {
                        identity: identity.clone(),
                        view,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Ok(None) => thread::sleep(Duration::from_millis(200)),
            Err(e) => {
                warn!("worker {identity}: {e}, continuing from AwaitingSync");
            }
        }
    }
    let _ = tx.send(WorkerMsg::Stopped { identity });
}
