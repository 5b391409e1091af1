//! Re-point links when the indirection point moves.

use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::atomic_symlink_swap;
use crate::error::Result;
use crate::links::{join_relative_link, relative_to};

/// Rewrite the absolute `symlink` so the entry it reaches through
/// `via_old` is reached through `via_new` instead.
///
/// The logical entry path is recovered relative to `via_old`, re-rooted
/// under `via_new`, and stored relative to the link's own directory. The
/// cache itself is not touched. Returns the new raw target.
pub fn fix_link(symlink: &Path, via_old: &Path, via_new: &Path) -> Result<PathBuf> {
    let old_target = fs::read_link(symlink)?;
    let joined_old = join_relative_link(symlink, &old_target);
    let logical = relative_to(&joined_old, via_old);
    let joined_new = via_new.join(&logical);
    let link_dir = symlink.parent().unwrap_or_else(|| Path::new("/"));
    let new_target = relative_to(&joined_new, link_dir);

    log::debug!(
        "{}: {} becomes {}",
        symlink.display(),
        old_target.display(),
        new_target.display()
    );
    if new_target != old_target {
        atomic_symlink_swap(symlink, &new_target)?;
    }
    Ok(new_target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    #[test]
    fn fix_moves_link_to_new_indirection() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a").join("b")).unwrap();
        let link = root.join("a").join("b").join("data");
        symlink("../../.git/git_sym/sha1.ff.data", &link).unwrap();

        let new_target =
            fix_link(&link, &root.join(".git").join("git_sym"), &root.join(".git_sym")).unwrap();

        assert_eq!(new_target, PathBuf::from("../../.git_sym/sha1.ff.data"));
        assert_eq!(fs::read_link(&link).unwrap(), new_target);
    }

    #[test]
    fn fix_round_trip_restores_raw_target() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        let link = root.join("sub").join("big.iso");
        let original = PathBuf::from("../.git_sym/sha1.0123.big.iso");
        symlink(&original, &link).unwrap();
        let via_old = root.join(".git_sym");
        let via_new = root.join("elsewhere").join("deep").join("links");

        fix_link(&link, &via_old, &via_new).unwrap();
        assert_ne!(fs::read_link(&link).unwrap(), original);
        fix_link(&link, &via_new, &via_old).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), original);
    }

    #[test]
    fn fix_keeps_resolution() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let staging = root.join(".git").join("git_sym");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("sha1.aa.x"), b"payload").unwrap();
        symlink(".git/git_sym", root.join(".git_sym")).unwrap();
        let link = root.join("x");
        symlink(".git/git_sym/sha1.aa.x", &link).unwrap();

        fix_link(&link, &staging, &root.join(".git_sym")).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from(".git_sym/sha1.aa.x"));
        assert_eq!(fs::read(&link).unwrap(), b"payload");
    }
}
