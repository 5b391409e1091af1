//! Classify a symlink by how it resolves through an indirection point.

use std::fmt;
use std::path::Path;

use crate::links::is_link_through;

/// Derived, never persisted, state of a tracked path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    /// Not a symlink on disk at all. Not "fine".
    Unknown,
    /// An absolute link, or one that does not route through the point.
    Ignored,
    /// Routes through the point but its target does not exist.
    Unresolved,
    /// Routes through the point and reaches a regular file.
    ResolvedFile,
    /// Routes through the point and reaches a directory.
    ResolvedDir,
}

impl ResolutionState {
    /// One-character marker used by `show`.
    pub fn marker(self) -> char {
        match self {
            ResolutionState::Unknown => '?',
            ResolutionState::Ignored => 'O',
            ResolutionState::Unresolved => '+',
            ResolutionState::ResolvedFile => '.',
            ResolutionState::ResolvedDir => '/',
        }
    }
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.marker())
    }
}

/// Classify the absolute `symlink` relative to the absolute `via`.
pub fn classify(symlink: &Path, via: &Path) -> ResolutionState {
    if !symlink.is_symlink() {
        ResolutionState::Unknown
    } else if !is_link_through(via, symlink) {
        ResolutionState::Ignored
    } else if symlink.is_file() {
        ResolutionState::ResolvedFile
    } else if symlink.is_dir() {
        ResolutionState::ResolvedDir
    } else {
        ResolutionState::Unresolved
    }
}
