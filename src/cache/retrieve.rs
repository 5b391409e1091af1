//! Materialize cache entries and wire up first-level links.

use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use super::fetch::{Fetcher, batches};
use super::swap::atomic_symlink_swap;
use super::SymPaths;
use crate::error::{Result, SymError};
use crate::links::{create_symlink, read_symlink_target};

/// Make every entry in `names` exist in the cache and be reachable through
/// the staging dir.
///
/// Names already present in the cache are not requested again. The rest
/// go to `fetcher` in batches bounded by `max_arg_len`; the first failing
/// batch aborts the whole retrieval. Afterwards each name must exist in
/// the cache and its first-level link must reach the very same file. A
/// first-level link pointing elsewhere (the cache moved) is re-pointed.
pub fn retrieve(
    paths: &SymPaths,
    fetcher: &dyn Fetcher,
    max_arg_len: usize,
    names: &BTreeSet<String>,
) -> Result<()> {
    log::debug!("retrieve: {:?}", names);
    if names.is_empty() {
        return Ok(());
    }

    let wanted: Vec<String> = names
        .iter()
        .filter(|name| fs::symlink_metadata(paths.cache_entry(name)).is_err())
        .cloned()
        .collect();
    for batch in batches(&wanted, max_arg_len) {
        fetcher.fetch(paths.cache_dir(), batch)?;
    }

    for name in names {
        link_entry(paths, name)?;
    }
    Ok(())
}

fn link_entry(paths: &SymPaths, name: &str) -> Result<()> {
    let cached = paths.cache_entry(name);
    let first_level = paths.first_level_link(name);
    log::debug!("checking {} -> {}", first_level.display(), cached.display());

    let cached_meta = fs::metadata(&cached).map_err(|_| {
        SymError::ConsistencyFault(format!(
            "{} is still missing after retrieval",
            cached.display()
        ))
    })?;

    match read_symlink_target(&first_level)? {
        None => create_symlink(&cached, &first_level)?,
        Some(target) if target != cached => {
            log::info!(
                "re-pointing {} from {} to {}",
                first_level.display(),
                target.display(),
                cached.display()
            );
            atomic_symlink_swap(&first_level, &cached)?;
        }
        Some(_) => {}
    }

    let linked_meta = fs::metadata(&first_level).map_err(|_| {
        SymError::ConsistencyFault(format!("{} does not resolve", first_level.display()))
    })?;
    if !same_file(&linked_meta, &cached_meta) {
        return Err(SymError::ConsistencyFault(format!(
            "{} != {}",
            first_level.display(),
            cached.display()
        )));
    }
    Ok(())
}

fn same_file(a: &fs::Metadata, b: &fs::Metadata) -> bool {
    a.dev() == b.dev() && a.ino() == b.ino()
}

/// True iff `path` exists as a file or directory after following links.
pub fn is_resolved(path: &Path) -> bool {
    path.is_file() || path.is_dir()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::FetchError;
    use crate::config::SymConfig;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    /// In-process fetcher that writes `fetched:<name>` for each name and
    /// records every batch it was given.
    #[derive(Default)]
    pub(crate) struct FakeFetcher {
        pub(crate) calls: RefCell<Vec<Vec<String>>>,
        pub(crate) fail: bool,
        pub(crate) skip: Option<String>,
    }

    impl Fetcher for FakeFetcher {
        fn fetch(&self, dir: &Path, names: &[String]) -> std::result::Result<(), FetchError> {
            self.calls.borrow_mut().push(names.to_vec());
            if self.fail {
                return Err(FetchError::Failed {
                    program: "fake".to_string(),
                    dir: dir.to_path_buf(),
                    status: failed_status(),
                });
            }
            for name in names {
                if self.skip.as_deref() == Some(name.as_str()) {
                    continue;
                }
                fs::write(dir.join(name), format!("fetched:{}", name)).unwrap();
            }
            Ok(())
        }
    }

    fn failed_status() -> std::process::ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(1 << 8)
    }

    fn setup() -> (TempDir, SymPaths) {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let config = SymConfig::default()
            .with_cache_dir(root.join("cache"))
            .with_sym_dir(root.join("links"));
        let paths = SymPaths::resolve(&config, &root, &root.join(".git"), &root);
        fs::create_dir(paths.cache_dir()).unwrap();
        fs::create_dir(paths.sym_dir()).unwrap();
        (dir, paths)
    }

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn retrieve_nothing_does_not_call_fetcher() {
        let (_dir, paths) = setup();
        let fetcher = FakeFetcher::default();

        retrieve(&paths, &fetcher, 1000, &BTreeSet::new()).unwrap();
        assert!(fetcher.calls.borrow().is_empty());
    }

    #[test]
    fn retrieve_fetches_and_links() {
        let (_dir, paths) = setup();
        let fetcher = FakeFetcher::default();

        retrieve(&paths, &fetcher, 1000, &names(&["sha1.aa.x", "sha1.bb.y"])).unwrap();

        assert_eq!(fetcher.calls.borrow().len(), 1);
        let link = paths.first_level_link("sha1.aa.x");
        assert_eq!(fs::read_link(&link).unwrap(), paths.cache_entry("sha1.aa.x"));
        assert_eq!(fs::read_to_string(&link).unwrap(), "fetched:sha1.aa.x");
    }

    #[test]
    fn retrieve_batches_long_requests_without_dropping_names() {
        let (_dir, paths) = setup();
        let fetcher = FakeFetcher::default();
        let wanted: BTreeSet<String> = (0..5).map(|i| format!("{}{}", i, "n".repeat(60))).collect();

        retrieve(&paths, &fetcher, 150, &wanted).unwrap();

        let calls = fetcher.calls.borrow();
        assert!(calls.len() > 1);
        let requested: BTreeSet<String> = calls.iter().flatten().cloned().collect();
        assert_eq!(requested, wanted);
        for name in &wanted {
            assert!(is_resolved(&paths.first_level_link(name)));
        }
    }

    #[test]
    fn retrieve_skips_entries_already_cached() {
        let (_dir, paths) = setup();
        fs::write(paths.cache_entry("sha1.aa.x"), b"local").unwrap();
        let fetcher = FakeFetcher::default();

        retrieve(&paths, &fetcher, 1000, &names(&["sha1.aa.x", "sha1.bb.y"])).unwrap();

        assert_eq!(*fetcher.calls.borrow(), vec![vec!["sha1.bb.y".to_string()]]);
        assert_eq!(
            fs::read(paths.first_level_link("sha1.aa.x")).unwrap(),
            b"local"
        );
    }

    #[test]
    fn retrieve_stops_at_first_failed_batch() {
        let (_dir, paths) = setup();
        let fetcher = FakeFetcher {
            fail: true,
            ..Default::default()
        };
        let wanted: BTreeSet<String> = (0..5).map(|i| format!("{}{}", i, "n".repeat(60))).collect();

        let err = retrieve(&paths, &fetcher, 150, &wanted).unwrap_err();
        assert!(matches!(err, SymError::ExternalToolFailure(_)));
        assert_eq!(fetcher.calls.borrow().len(), 1);
    }

    #[test]
    fn retrieve_missing_entry_is_consistency_fault() {
        let (_dir, paths) = setup();
        let fetcher = FakeFetcher {
            skip: Some("sha1.bb.y".to_string()),
            ..Default::default()
        };

        let err = retrieve(&paths, &fetcher, 1000, &names(&["sha1.bb.y"])).unwrap_err();
        assert!(matches!(err, SymError::ConsistencyFault(_)));
    }

    #[test]
    fn retrieve_repoints_stale_first_level_link() {
        let (dir, paths) = setup();
        let old_cache: PathBuf = dir.path().join("old-cache");
        fs::create_dir(&old_cache).unwrap();
        std::os::unix::fs::symlink(old_cache.join("sha1.aa.x"), paths.first_level_link("sha1.aa.x"))
            .unwrap();
        fs::write(paths.cache_entry("sha1.aa.x"), b"moved").unwrap();

        retrieve(&paths, &FakeFetcher::default(), 1000, &names(&["sha1.aa.x"])).unwrap();
        assert_eq!(
            fs::read_link(paths.first_level_link("sha1.aa.x")).unwrap(),
            paths.cache_entry("sha1.aa.x")
        );
    }
}
