//! Atomic symlink replacement.

use std::io;
use std::os::unix::fs::symlink;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for unique temp link names within a process
static SWAP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Atomically point `link_path` at `new_target`, replacing whatever symlink
/// is there.
///
/// Creates a temp symlink next to the link, then renames it over the
/// original. Readers see either the old target or the new one, never a
/// missing link. `new_target` is stored verbatim, so relative targets stay
/// relative.
pub fn atomic_symlink_swap(link_path: &Path, new_target: &Path) -> io::Result<()> {
    let file_name = link_path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "link path has no file name"))?;

    loop {
        // {link}.tmp.{pid}.{counter}; retry if a prior crash left one behind.
        let counter = SWAP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut temp_name = file_name.to_os_string();
        temp_name.push(format!(".tmp.{}.{}", std::process::id(), counter));
        let temp_path = link_path.with_file_name(temp_name);

        match symlink(new_target, &temp_path) {
            Ok(()) => {
                if let Err(e) = std::fs::rename(&temp_path, link_path) {
                    let _ = std::fs::remove_file(&temp_path);
                    return Err(e);
                }
                log::info!(
                    "$ ln -sfn {} {}",
                    new_target.display(),
                    link_path.display()
                );
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
}
