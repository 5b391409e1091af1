//! Lexical path and symlink helpers.
//!
//! Everything here works on path text, never on `canonicalize`: the whole
//! point of the link chain is that the intermediate hops are symlinks, and
//! resolving them would erase the indirection point we are testing for.
//! Functions that take a `symlink` argument expect it to be absolute.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path, like `os.path.normpath`.
///
/// Removes `.` components, folds `name/..` pairs and drops `..` directly
/// beneath the root. Leading `..` on a relative path are kept. An empty
/// result becomes `.`.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Make `path` absolute against `base` and normalize it.
pub fn absolute(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Express absolute `path` relative to absolute directory `base`, like
/// `os.path.relpath`.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path = normalize(path);
    let base = normalize(base);
    let path_parts: Vec<Component<'_>> = path.components().collect();
    let base_parts: Vec<Component<'_>> = base.components().collect();

    let common = path_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base_parts.len() {
        out.push("..");
    }
    for part in &path_parts[common..] {
        out.push(part.as_os_str());
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Read the target of a symlink, returning None if it doesn't exist or is
/// not a symlink.
pub fn read_symlink_target(link_path: &Path) -> io::Result<Option<PathBuf>> {
    match std::fs::read_link(link_path) {
        Ok(target) => Ok(Some(target)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(None),
        Err(e) => Err(e),
    }
}

/// Join a link's raw target onto the link's own directory and normalize.
///
/// An absolute `raw_target` is returned normalized, unchanged otherwise.
pub fn join_relative_link(symlink: &Path, raw_target: &Path) -> PathBuf {
    let dir = symlink.parent().unwrap_or_else(|| Path::new(""));
    normalize(&dir.join(raw_target))
}

/// True iff `symlink` is a relative symlink whose joined target lies
/// beneath the absolute directory `via`.
///
/// Fails closed: anything that is not a symlink, or whose target is
/// absolute, is not "through" anything. The prefix test is per path
/// component, so `/a/bc/x` is not beneath `/a/b`.
pub fn is_link_through(via: &Path, symlink: &Path) -> bool {
    let raw_target = match read_symlink_target(symlink) {
        Ok(Some(target)) => target,
        _ => return false,
    };
    if raw_target.is_absolute() {
        return false;
    }
    let resolved = join_relative_link(symlink, &raw_target);
    resolved.starts_with(normalize(via))
}

/// The cache-entry path a symlink names, expressed relative to `via`.
///
/// This is independent of how many hops separate the link from the cache,
/// so it is what namespace flatness is checked against.
pub fn canonical_target_relative_to(symlink: &Path, via: &Path) -> io::Result<PathBuf> {
    let raw_target = std::fs::read_link(symlink)?;
    let resolved = join_relative_link(symlink, &raw_target);
    Ok(relative_to(&resolved, via))
}

/// Create a symlink at `link` pointing to `target`.
pub fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    log::info!("$ ln -s {} {}", target.display(), link.display());
    std::os::unix::fs::symlink(target, link)
}
