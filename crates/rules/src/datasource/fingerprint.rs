//! Content fingerprints used to tell real file changes from echoes.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use sha2::{Digest, Sha256};

/// Length plus SHA-256 of a rule file's raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    len: u64,
    digest: [u8; 32],
}

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Self {
            len: bytes.len() as u64,
            digest: Sha256::digest(bytes).into(),
        }
    }

    /// Size of the fingerprinted content in bytes.
    pub fn byte_len(&self) -> u64 {
        self.len
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.digest[..6] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "/{}", self.len)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

/// The per-kind sync region shared by a watcher and its writer.
///
/// Holds the fingerprint of the content last accepted into memory. Both the
/// pull path (read, compare, publish) and the push path (write, record,
/// publish) run entirely while holding this lock.
#[derive(Debug, Default)]
pub(crate) struct SyncSlot {
    accepted: Mutex<Option<Fingerprint>>,
}

impl SyncSlot {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Option<Fingerprint>> {
        // The guarded value is a plain Copy; a panic elsewhere cannot leave it torn.
        self.accepted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn accepted(&self) -> Option<Fingerprint> {
        *self.lock()
    }
}
