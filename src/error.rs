use std::path::PathBuf;

use thiserror::Error;

use crate::cache::FetchError;
use crate::git::GitError;

/// Errors raised by the engine's operations.
#[derive(Error, Debug)]
pub enum SymError {
    /// An expected path or cache entry is absent.
    #[error("cannot cache what does not exist: {}", .0.display())]
    NotFound(PathBuf),

    /// Only regular files and directories can be cached.
    #[error("we do not cache {kind}: {}", path.display())]
    UnsupportedEntryKind { path: PathBuf, kind: &'static str },

    /// A cache invariant does not hold. Never retried or masked.
    #[error("consistency fault: {0}")]
    ConsistencyFault(String),

    /// The fetcher exited unsuccessfully.
    #[error(transparent)]
    ExternalToolFailure(#[from] FetchError),

    /// `check` found a link that does not resolve.
    #[error("unresolved symlink: {}", .0.display())]
    Unresolved(PathBuf),

    /// The version-control collaborator failed.
    #[error(transparent)]
    Git(#[from] GitError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SymError {
    /// Whether this error only spoils the path being processed, so a
    /// multi-path `add` may carry on with the rest.
    pub fn is_per_path(&self) -> bool {
        matches!(
            self,
            SymError::NotFound(_) | SymError::UnsupportedEntryKind { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SymError>;
