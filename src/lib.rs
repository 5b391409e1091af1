//! Keep large files outside a git repository behind committed symlinks.
//!
//! Each large file or directory is moved into a content-addressed cache and
//! replaced by a relative symlink through `.git_sym`, a link at the
//! repository root that git never sees. `.git_sym` points at a staging dir
//! inside the git dir whose entries point into the cache.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixup;
pub mod git;
pub mod links;
pub mod resolve;

pub use config::SymConfig;
pub use engine::GitSym;
pub use error::{Result, SymError};
pub use resolve::{ResolutionState, classify};
