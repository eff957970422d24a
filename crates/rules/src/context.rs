//! Process-wide wiring: one property, watcher and writer per rule kind.

use std::sync::Arc;
use std::time::Duration;

use sentinel_sync_core::RulesConfig;
use tracing::{debug, info, warn};

use crate::datasource::{
    bind_file, ensure_layout, FileWatcher, PollOutcome, Result, RuleError, RuleLayout, WatchHandle,
    WritableSource, WriteTicket,
};
use crate::property::Property;
use crate::schema::{RuleKind, RuleSchema, RuleSet};

struct KindBinding {
    property: Arc<Property<RuleSet>>,
    watcher: Arc<FileWatcher>,
    writer: WritableSource,
}

/// Live rule state for the whole process.
///
/// Built once at startup and shared (behind an `Arc`) with the enforcement
/// engine, which reads [`current`](RuleContext::current) or subscribes to a
/// [`property`](RuleContext::property), and with the control channel, which
/// calls [`write`](RuleContext::write) or [`push`](RuleContext::push).
pub struct RuleContext {
    layout: RuleLayout,
    bindings: [KindBinding; 5],
    poll_interval: Duration,
    io_timeout: Duration,
}

impl RuleContext {
    /// Prepare the rule root, bind every kind and load what is on disk.
    ///
    /// Fails only if the layout cannot be created. Files that do not decode
    /// at startup leave their kind empty and are retried by the watchers.
    pub fn bootstrap(config: &RulesConfig) -> Result<Self> {
        let layout = ensure_layout(&config.root_dir)?;

        let bindings = RuleKind::ALL.map(|kind| {
            let property = Arc::new(Property::new(kind.to_string(), RuleSet::empty(kind)));
            let (watcher, writer) = bind_file(
                layout.descriptor(kind).clone(),
                Arc::clone(&property),
                config.max_file_size,
            );
            KindBinding {
                property,
                watcher,
                writer,
            }
        });

        let context = Self {
            layout,
            bindings,
            poll_interval: config.poll_interval,
            io_timeout: config.io_timeout,
        };
        for (kind, outcome) in context.poll_all() {
            if !outcome.is_reloaded() {
                warn!(kind = %kind, outcome = ?outcome, "initial rule load did not succeed");
            }
        }
        info!(root = %context.layout.root().display(), "rule context ready");
        Ok(context)
    }

    pub fn layout(&self) -> &RuleLayout {
        &self.layout
    }

    fn binding(&self, kind: RuleKind) -> &KindBinding {
        &self.bindings[kind.index()]
    }

    pub fn property(&self, kind: RuleKind) -> Arc<Property<RuleSet>> {
        Arc::clone(&self.binding(kind).property)
    }

    /// The live rule set for `kind`; never touches the filesystem.
    pub fn current(&self, kind: RuleKind) -> Arc<RuleSet> {
        self.binding(kind).property.current()
    }

    /// Owned copy of the live rules of one schema.
    pub fn rules<T: RuleSchema>(&self) -> Vec<T> {
        self.current(T::KIND)
            .rules::<T>()
            .map(<[T]>::to_vec)
            .unwrap_or_default()
    }

    pub fn watcher(&self, kind: RuleKind) -> Arc<FileWatcher> {
        Arc::clone(&self.binding(kind).watcher)
    }

    pub fn writer(&self, kind: RuleKind) -> WritableSource {
        self.binding(kind).writer.clone()
    }

    /// Persist and publish a pushed rule set.
    pub fn write(&self, kind: RuleKind, rules: RuleSet) -> Result<()> {
        self.binding(kind).writer.write(rules)
    }

    /// Like [`write`](RuleContext::write), on the blocking pool and bounded by
    /// the configured I/O timeout.
    ///
    /// A push that returns [`RuleError::Timeout`] never reaches the file or
    /// the property. If the deadline passes after the write has already
    /// started replacing the file, the push waits for it and reports its
    /// real outcome instead.
    pub async fn push(&self, kind: RuleKind, rules: RuleSet) -> Result<()> {
        let writer = self.writer(kind);
        let ticket = WriteTicket::new();
        let claim = ticket.clone();
        let mut work = tokio::task::spawn_blocking(move || writer.write_ticketed(rules, &claim));

        let joined = match tokio::time::timeout(self.io_timeout, &mut work).await {
            Ok(joined) => joined,
            Err(_) if ticket.cancel() => {
                let err = RuleError::Timeout {
                    kind,
                    operation: "write",
                    after: self.io_timeout,
                };
                warn!(kind = %kind, error = %err, "push abandoned");
                return Err(err);
            }
            Err(_) => {
                debug!(kind = %kind, "push passed its deadline mid-write, waiting for it");
                work.await
            }
        };
        joined.map_err(|e| RuleError::Io(std::io::Error::other(e)))?
    }

    /// Run one synchronous tick of every watcher.
    pub fn poll_all(&self) -> Vec<(RuleKind, PollOutcome)> {
        self.bindings
            .iter()
            .map(|b| (b.watcher.kind(), b.watcher.poll_once()))
            .collect()
    }

    /// Spawn the background poller of every kind on the current runtime.
    pub fn start(&self) -> SyncHandle {
        let watchers = self
            .bindings
            .iter()
            .map(|b| b.watcher.spawn(self.poll_interval, self.io_timeout))
            .collect();
        info!(
            kinds = self.bindings.len(),
            interval_ms = self.poll_interval.as_millis() as u64,
            "rule file watchers started"
        );
        SyncHandle { watchers }
    }
}

/// Running watchers started by [`RuleContext::start`].
#[derive(Debug)]
pub struct SyncHandle {
    watchers: Vec<WatchHandle>,
}

impl SyncHandle {
    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    /// Stop every watcher. Live rule values are left as they are.
    pub async fn shutdown(self) {
        for handle in self.watchers {
            handle.stop().await;
        }
        info!("rule file watchers stopped");
    }
}
