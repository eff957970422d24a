//! File-backed rule datasources.
//!
//! Each rule kind gets a [`FileWatcher`] (pull path: file → memory) and a
//! [`WritableSource`] (push path: memory → file) bound to the same file,
//! the same [`Property`] and the same sync slot. The slot carries the
//! fingerprint of the last content accepted into memory, which is how a
//! write by the push path is recognised as an echo instead of an edit.

mod codec;
mod error;
mod fingerprint;
mod layout;
mod readable;
mod writable;

#[cfg(test)]
mod roundtrip;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use crate::property::Property;
use crate::schema::RuleSet;

pub use self::codec::{codec_for, Codec};
pub use self::error::{CodecError, PollOutcome, Result, RuleError};
pub use self::fingerprint::Fingerprint;
pub use self::layout::{ensure_layout, RuleFileDescriptor, RuleLayout};
pub use self::readable::{FileWatcher, WatchHandle};
pub use self::writable::WritableSource;
pub(crate) use self::writable::WriteTicket;

use self::fingerprint::SyncSlot;

/// Bind a watcher and a writer for `descriptor`, both publishing into `property`.
pub fn bind_file(
    descriptor: RuleFileDescriptor,
    property: Arc<Property<RuleSet>>,
    max_file_size: u64,
) -> (Arc<FileWatcher>, WritableSource) {
    let slot = Arc::new(SyncSlot::default());
    let watcher = FileWatcher::new(
        descriptor.clone(),
        Arc::clone(&property),
        Arc::clone(&slot),
        max_file_size,
    );
    let writer = WritableSource::new(descriptor, property, slot);
    (Arc::new(watcher), writer)
}
