//! Observable in-memory cell holding the live rule set for one kind.
//!
//! Readers call [`Property::current`] on the request path; it only clones an
//! `Arc` and never waits on file I/O. Producers (the file watcher and the
//! writable source) call [`Property::update_value`]. Updates and subscriber
//! delivery are serialized per property, so every subscriber sees the same
//! ordered sequence of values. Different properties are fully independent.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Subscriber callback. An `Err` is logged and does not affect other subscribers.
pub type Callback<T> = Box<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;

struct Subscriber<T> {
    name: String,
    callback: Callback<T>,
}

pub struct Property<T> {
    name: String,
    value: RwLock<Arc<T>>,
    version: AtomicU64,
    updated_at: RwLock<Option<DateTime<Utc>>>,
    /// Held for the whole update-and-notify sequence.
    subscribers: Mutex<Vec<Subscriber<T>>>,
}

impl<T> Property<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, initial: T) -> Self {
        Self {
            name: name.into(),
            value: RwLock::new(Arc::new(initial)),
            version: AtomicU64::new(0),
            updated_at: RwLock::new(None),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latest accepted value.
    pub fn current(&self) -> Arc<T> {
        Arc::clone(&self.value.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of accepted updates since creation.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// When the last accepted update happened, if any.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        *self.updated_at.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the value and notify every subscriber in registration order.
    ///
    /// Returns `false` without notifying when `new` equals the current value.
    /// Callbacks run while the update is still serialized, so they must not
    /// publish a different value into this same property. Handing the value
    /// they received to the kind's `WritableSource` is fine: writing the
    /// live value is a no-op.
    pub fn update_value(&self, new: T) -> bool {
        let subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);

        let next = Arc::new(new);
        {
            let mut value = self.value.write().unwrap_or_else(PoisonError::into_inner);
            if **value == *next {
                debug!(property = %self.name, "update equals current value, skipped");
                return false;
            }
            *value = Arc::clone(&next);
        }
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        *self.updated_at.write().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        debug!(property = %self.name, version, subscribers = subscribers.len(), "property updated");

        for subscriber in subscribers.iter() {
            self.deliver(subscriber, &next);
        }
        true
    }

    /// Register a subscriber. It receives the current value immediately.
    pub fn add_subscriber<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let subscriber = Subscriber {
            name: name.into(),
            callback: Box::new(callback),
        };
        self.deliver(&subscriber, &self.current());
        subscribers.push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn deliver(&self, subscriber: &Subscriber<T>, value: &T) {
        match panic::catch_unwind(AssertUnwindSafe(|| (subscriber.callback)(value))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                property = %self.name,
                subscriber = %subscriber.name,
                error = %e,
                "subscriber failed to apply update"
            ),
            Err(_) => warn!(
                property = %self.name,
                subscriber = %subscriber.name,
                "subscriber panicked while applying update"
            ),
        }
    }
}

impl<T> std::fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("version", &self.version.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}
