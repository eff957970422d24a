//! Push path: persist a pushed rule set and publish it without waking the
//! watcher.

use std::fs;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::property::Property;
use crate::schema::{RuleKind, RuleSet};

use super::error::{Result, RuleError};
use super::fingerprint::{Fingerprint, SyncSlot};
use super::layout::RuleFileDescriptor;

/// Writes rule sets for one kind to its rule file.
///
/// Shares its [`SyncSlot`] with the kind's [`FileWatcher`](super::FileWatcher):
/// the fingerprint of the written bytes is recorded before the slot is
/// released, so the watcher's next read of that file is a no-op.
#[derive(Clone, Debug)]
pub struct WritableSource {
    descriptor: RuleFileDescriptor,
    property: Arc<Property<RuleSet>>,
    slot: Arc<SyncSlot>,
}

impl WritableSource {
    pub(crate) fn new(
        descriptor: RuleFileDescriptor,
        property: Arc<Property<RuleSet>>,
        slot: Arc<SyncSlot>,
    ) -> Self {
        Self {
            descriptor,
            property,
            slot,
        }
    }

    pub fn kind(&self) -> RuleKind {
        self.descriptor.kind()
    }

    pub fn descriptor(&self) -> &RuleFileDescriptor {
        &self.descriptor
    }

    /// Encode, persist and publish `rules`.
    ///
    /// Encoding happens before anything is touched. The file is replaced via
    /// a temporary sibling and a rename, so readers see either the old or
    /// the new content. On any error the file and the property keep their
    /// previous values and the error is returned.
    ///
    /// A set equal to the live value is accepted without touching the file,
    /// so the writer can itself be registered as a subscriber of its property.
    pub fn write(&self, rules: RuleSet) -> Result<()> {
        self.write_ticketed(rules, &WriteTicket::new())
    }

    /// [`write`](WritableSource::write) that gives up before touching the
    /// file if `ticket` was cancelled while waiting for the sync slot.
    pub(crate) fn write_ticketed(&self, rules: RuleSet, ticket: &WriteTicket) -> Result<()> {
        let kind = self.kind();
        if rules.kind() != kind {
            return Err(RuleError::KindMismatch {
                expected: kind,
                actual: rules.kind(),
            });
        }
        if rules == *self.property.current() {
            debug!(kind = %kind, rules = rules.len(), "pushed rules equal live rules, nothing to write");
            return Ok(());
        }

        let bytes = self
            .descriptor
            .codec()
            .encode(&rules)
            .map_err(|source| RuleError::Encode { kind, source })?;
        let fingerprint = Fingerprint::of(&bytes);
        let count = rules.len();

        let mut accepted = self.slot.lock();
        if !ticket.commit() {
            debug!(kind = %kind, "write cancelled before touching the rule file");
            return Err(RuleError::Cancelled { kind });
        }
        self.replace_file(&bytes)?;
        *accepted = Some(fingerprint);
        let notified = self.property.update_value(rules);
        drop(accepted);

        info!(
            kind = %kind,
            path = %self.descriptor.path().display(),
            rules = count,
            fingerprint = %fingerprint,
            bytes = fingerprint.byte_len(),
            notified,
            "wrote pushed rules to file"
        );
        Ok(())
    }

    fn replace_file(&self, bytes: &[u8]) -> Result<()> {
        let final_path = self.descriptor.path();
        let tmp_path = self.descriptor.tmp_path();

        let result = fs::write(&tmp_path, bytes).and_then(|()| fs::rename(&tmp_path, final_path));
        if let Err(e) = result {
            if tmp_path.exists() {
                if let Err(cleanup) = fs::remove_file(&tmp_path) {
                    warn!(path = %tmp_path.display(), error = %cleanup, "failed to remove temporary rule file");
                }
            }
            warn!(kind = %self.kind(), path = %final_path.display(), error = %e, "failed to write rule file");
            return Err(RuleError::Io(e));
        }
        Ok(())
    }
}

const PENDING: u8 = 0;
const COMMITTED: u8 = 1;
const CANCELLED: u8 = 2;

/// Decides, exactly once, whether a write goes ahead or is abandoned.
///
/// The writer commits after taking the sync slot and before replacing the
/// file; a caller that stopped waiting cancels. Whichever comes first wins.
#[derive(Clone, Debug, Default)]
pub(crate) struct WriteTicket(Arc<AtomicU8>);

impl WriteTicket {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Abandon the write. Returns `false` if it had already committed.
    pub(crate) fn cancel(&self) -> bool {
        match self
            .0
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(state) => state == CANCELLED,
        }
    }

    /// Claim the write. Returns `false` if it was cancelled.
    pub(crate) fn commit(&self) -> bool {
        match self
            .0
            .compare_exchange(PENDING, COMMITTED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(state) => state == COMMITTED,
        }
    }
}
