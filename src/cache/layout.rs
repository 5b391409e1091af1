//! Cache topology: the cache dir, the staging dir and the primary link.

use std::fs;
use std::io;
use std::path::Path;

use super::SymPaths;
use crate::error::{Result, SymError};
use crate::git::{GitRepo, IgnoreStatus};
use crate::links::{create_symlink, relative_to};

/// Create a directory and its parents if missing, like `mkdir -p`.
pub fn make_dirs(dir: &Path) -> io::Result<()> {
    if !dir.is_dir() {
        log::info!("$ mkdir -p {}", dir.display());
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Make sure the cache dir and the staging dir exist.
pub fn ensure_dirs(paths: &SymPaths) -> Result<()> {
    make_dirs(paths.cache_dir())?;
    make_dirs(paths.sym_dir())?;
    Ok(())
}

/// (Re)create the primary link and keep it out of version control.
///
/// Safe to run on every invocation: `git clean -x` may delete the link at
/// any time, and losing it loses nothing because the staging dir and the
/// cache are untouched. Something other than a symlink squatting on the
/// link path is reported rather than removed.
pub fn ensure_primary_link(paths: &SymPaths, git: &GitRepo) -> Result<()> {
    let link = paths.sym_link();
    match fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            log::debug!("primary link {} present", link.display());
        }
        Ok(_) => {
            return Err(SymError::UnsupportedEntryKind {
                path: link.to_path_buf(),
                kind: "non-symlink entries in place of the primary link",
            });
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if let Some(parent) = link.parent() {
                make_dirs(parent)?;
            }
            create_symlink(paths.sym_dir(), link)?;
        }
        Err(e) => return Err(e.into()),
    }

    match git.check_ignore(link) {
        IgnoreStatus::Ignored => {}
        IgnoreStatus::NotIgnored => {
            let rule = format!("/{}", relative_to(link, git.root()).display());
            git.add_exclude(&rule)?;
        }
        IgnoreStatus::Indeterminate => {
            log::warn!(
                "could not tell whether {} is ignored; leaving exclude rules alone",
                link.display()
            );
        }
    }
    Ok(())
}
