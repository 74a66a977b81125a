//! # artifact-store
//!
//! Storage collaborator for run artifacts (captured logs, screenshots, ...),
//! an in-memory [`ArtifactBuffer`] that holds payloads until they are flushed,
//! and [`ArtifactNamer`] which mints collision-free artifact names.
#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![deny(rustdoc::broken_intra_doc_links)]
use std::{fmt, io, path::PathBuf};

use thiserror::Error;

pub mod buffer;
pub mod fs;
pub mod memory;
pub mod naming;

pub use buffer::{ArtifactBuffer, BufferError, FlushReport};
pub use fs::FsStore;
pub use memory::MemoryStore;
pub use naming::{ArtifactNamer, NameToken, NamingConfig, NamingContext};

/// Somewhere artifacts can be written to
pub trait ArtifactStore: fmt::Debug + Send + Sync {
    /// write `bytes` under `name`, creating any missing parent directories
    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Why an artifact write failed. The classification is only used for
/// diagnostics, callers treat every variant as a failed write.
#[derive(Debug, Error)]
pub enum StoreError {
    /// the destination refused the write
    #[error("permission denied writing `{}`: {source}", path.display())]
    PermissionDenied {
        /// destination path
        path: PathBuf,
        /// underlying error
        #[source]
        source: io::Error,
    },
    /// the device or quota is full
    #[error("no space left writing `{}`: {source}", path.display())]
    NoSpace {
        /// destination path
        path: PathBuf,
        /// underlying error
        #[source]
        source: io::Error,
    },
    /// the path or one of its components is longer than the filesystem allows
    #[error("path too long ({len} bytes): `{}`", path.display())]
    PathTooLong {
        /// destination path
        path: PathBuf,
        /// length of the offending path or component
        len: usize,
    },
    /// the name is absolute or climbs out of the store's root
    #[error("artifact name `{}` escapes the store root", path.display())]
    OutsideRoot {
        /// offending name
        path: PathBuf,
    },
    /// any other I/O failure
    #[error("failed writing `{}`: {source}", path.display())]
    Other {
        /// destination path
        path: PathBuf,
        /// underlying error
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// Classify an `io::Error` raised while writing `path`
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => {
                StoreError::PermissionDenied { path, source }
            }
            io::ErrorKind::StorageFull | io::ErrorKind::QuotaExceeded => {
                StoreError::NoSpace { path, source }
            }
            _ if is_name_too_long(&source) => {
                let len = path.as_os_str().len();
                StoreError::PathTooLong { path, len }
            }
            _ => StoreError::Other { path, source },
        }
    }

    /// Short diagnostic tag for logs
    pub fn reason(&self) -> &'static str {
        match self {
            StoreError::PermissionDenied { .. } => "permission",
            StoreError::NoSpace { .. } => "space",
            StoreError::PathTooLong { .. } => "path_length",
            StoreError::OutsideRoot { .. } => "outside_root",
            StoreError::Other { .. } => "other",
        }
    }
}

#[cfg(target_os = "linux")]
const ENAMETOOLONG: i32 = 36;
#[cfg(all(unix, not(target_os = "linux")))]
const ENAMETOOLONG: i32 = 63;

#[cfg(unix)]
fn is_name_too_long(err: &io::Error) -> bool {
    err.raw_os_error() == Some(ENAMETOOLONG)
}

#[cfg(not(unix))]
fn is_name_too_long(_err: &io::Error) -> bool {
    false
}
