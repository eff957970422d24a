//! Pull path: a timer-driven watcher that re-reads one rule file and
//! publishes its decoded content.

use std::fs::File;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::property::Property;
use crate::schema::{RuleKind, RuleSet};

use super::error::{PollOutcome, RuleError};
use super::fingerprint::{Fingerprint, SyncSlot};
use super::layout::RuleFileDescriptor;

/// Shortest poll period accepted by [`FileWatcher::spawn`].
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls one rule file and feeds accepted content into its property.
///
/// Unchanged content (same fingerprint as the last accepted read, including
/// content the paired writer just wrote) is ignored without decoding.
/// Content that fails to decode is rejected and retried on the next tick;
/// the previous rules stay live.
#[derive(Debug)]
pub struct FileWatcher {
    descriptor: RuleFileDescriptor,
    property: Arc<Property<RuleSet>>,
    slot: Arc<SyncSlot>,
    max_file_size: u64,
    /// Set while a [`tick`](FileWatcher::tick) task runs on the blocking pool.
    in_flight: AtomicBool,
}

impl FileWatcher {
    pub(crate) fn new(
        descriptor: RuleFileDescriptor,
        property: Arc<Property<RuleSet>>,
        slot: Arc<SyncSlot>,
        max_file_size: u64,
    ) -> Self {
        Self {
            descriptor,
            property,
            slot,
            max_file_size,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> RuleKind {
        self.descriptor.kind()
    }

    pub fn descriptor(&self) -> &RuleFileDescriptor {
        &self.descriptor
    }

    pub fn property(&self) -> &Arc<Property<RuleSet>> {
        &self.property
    }

    /// Fingerprint of the content currently live in memory.
    pub fn accepted_fingerprint(&self) -> Option<Fingerprint> {
        self.slot.accepted()
    }

    /// Run a single read, compare, decode, publish cycle.
    pub fn poll_once(&self) -> PollOutcome {
        let kind = self.kind();
        let path = self.descriptor.path();
        let mut accepted = self.slot.lock();

        let bytes = match self.read_bounded() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(kind = %kind, path = %path.display(), error = %e, "failed to read rule file, will retry");
                return PollOutcome::ReadFailed {
                    error: e.to_string(),
                };
            }
        };

        let fingerprint = Fingerprint::of(&bytes);
        if *accepted == Some(fingerprint) {
            debug!(kind = %kind, fingerprint = %fingerprint, "rule file unchanged");
            return PollOutcome::Unchanged;
        }

        match self.descriptor.codec().decode(&bytes) {
            Ok(rules) => {
                let count = rules.len();
                *accepted = Some(fingerprint);
                let notified = self.property.update_value(rules);
                info!(
                    kind = %kind,
                    path = %path.display(),
                    rules = count,
                    fingerprint = %fingerprint,
                    bytes = fingerprint.byte_len(),
                    notified,
                    "reloaded rules from file"
                );
                PollOutcome::Reloaded {
                    rules: count,
                    notified,
                }
            }
            Err(source) => {
                let err = RuleError::Decode { kind, source };
                warn!(
                    kind = %kind,
                    path = %path.display(),
                    error = %err,
                    "rejected rule file content, keeping previous rules"
                );
                PollOutcome::Rejected {
                    error: err.to_string(),
                }
            }
        }
    }

    /// Read the whole file, refusing anything over `max_file_size`.
    fn read_bounded(&self) -> io::Result<Vec<u8>> {
        let file = File::open(self.descriptor.path())?;
        let mut bytes = Vec::new();
        file.take(self.max_file_size.saturating_add(1))
            .read_to_end(&mut bytes)?;
        if bytes.len() as u64 > self.max_file_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("rule file exceeds {} bytes", self.max_file_size),
            ));
        }
        Ok(bytes)
    }

    /// Run one tick on the blocking pool, bounded by `io_timeout`.
    ///
    /// A tick that times out keeps running in the background. Until it
    /// finishes, further ticks return [`PollOutcome::Busy`] without spawning
    /// anything, so a hung file system holds at most one blocking thread.
    pub async fn tick(self: &Arc<Self>, io_timeout: Duration) -> PollOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!(kind = %self.kind(), "previous rule poll still running, skipping tick");
            return PollOutcome::Busy;
        }
        let running = InFlight(Arc::clone(self));
        let work = tokio::task::spawn_blocking(move || running.watcher().poll_once());
        match tokio::time::timeout(io_timeout, work).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(kind = %self.kind(), error = %e, "rule poll task failed");
                PollOutcome::ReadFailed {
                    error: e.to_string(),
                }
            }
            Err(_) => {
                let err = RuleError::Timeout {
                    kind: self.kind(),
                    operation: "poll",
                    after: io_timeout,
                };
                warn!(kind = %self.kind(), error = %err, "rule poll timed out, will retry");
                PollOutcome::TimedOut
            }
        }
    }

    /// Start polling every `interval` on the current tokio runtime.
    ///
    /// The first tick fires one `interval` from now. Stopping the returned
    /// handle leaves the property at its last published value.
    pub fn spawn(self: &Arc<Self>, interval: Duration, io_timeout: Duration) -> WatchHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let watcher = Arc::clone(self);
        let period = interval.max(MIN_POLL_INTERVAL);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // skip immediate tick

            info!(
                kind = %watcher.kind(),
                path = %watcher.descriptor.path().display(),
                interval_ms = period.as_millis() as u64,
                "watching rule file"
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        watcher.tick(io_timeout).await;
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!(kind = %watcher.kind(), "rule file watcher stopped");
        });

        WatchHandle {
            kind: self.kind(),
            shutdown,
            task,
        }
    }
}

/// Clears the watcher's in-flight flag when the blocking poll is dropped,
/// whether it finished, panicked or never ran.
struct InFlight(Arc<FileWatcher>);

impl InFlight {
    fn watcher(&self) -> &FileWatcher {
        &self.0
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

/// Cancellation handle for a spawned [`FileWatcher`] loop.
#[derive(Debug)]
pub struct WatchHandle {
    kind: RuleKind,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the timer and wait for the loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(kind = %self.kind, error = %e, "rule file watcher ended abnormally");
        }
    }
}
