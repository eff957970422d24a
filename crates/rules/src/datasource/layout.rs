//! Rule root directory and the fixed set of rule files inside it.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::schema::RuleKind;

use super::codec::{codec_for, Codec};
use super::error::{Result, RuleError};

/// Where one kind's rules live and how they are encoded.
#[derive(Debug, Clone)]
pub struct RuleFileDescriptor {
    kind: RuleKind,
    path: PathBuf,
    codec: &'static Codec,
}

impl RuleFileDescriptor {
    pub fn new(kind: RuleKind, root: &Path) -> Self {
        Self {
            kind,
            path: root.join(kind.file_name()),
            codec: codec_for(kind),
        }
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn codec(&self) -> &'static Codec {
        self.codec
    }

    /// Dot-prefixed sibling used for write-then-rename.
    pub(crate) fn tmp_path(&self) -> PathBuf {
        self.path.with_file_name(format!(".{}.tmp", self.kind.file_name()))
    }
}

/// The prepared rule root: one descriptor per kind.
#[derive(Debug, Clone)]
pub struct RuleLayout {
    root: PathBuf,
    files: [RuleFileDescriptor; 5],
}

impl RuleLayout {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn descriptor(&self, kind: RuleKind) -> &RuleFileDescriptor {
        &self.files[kind.index()]
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &RuleFileDescriptor> {
        self.files.iter()
    }
}

/// Create the rule root and every missing rule file.
///
/// Idempotent: an existing directory is fine and existing files are never
/// truncated. Any failure here is fatal to startup.
pub fn ensure_layout(root: &Path) -> Result<RuleLayout> {
    fs::create_dir_all(root).map_err(|source| RuleError::Layout {
        path: root.to_path_buf(),
        source,
    })?;

    let files = RuleKind::ALL.map(|kind| RuleFileDescriptor::new(kind, root));
    for descriptor in &files {
        create_if_missing(descriptor.path())?;
    }

    info!(root = %root.display(), files = files.len(), "rule layout ready");
    Ok(RuleLayout {
        root: root.to_path_buf(),
        files,
    })
}

fn create_if_missing(path: &Path) -> Result<()> {
    let layout_err = |source| RuleError::Layout {
        path: path.to_path_buf(),
        source,
    };

    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => {
            debug!(path = %path.display(), "created empty rule file");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            if path.is_file() {
                Ok(())
            } else {
                Err(layout_err(std::io::Error::new(
                    ErrorKind::InvalidInput,
                    "path exists but is not a regular file",
                )))
            }
        }
        Err(e) => Err(layout_err(e)),
    }
}
