//! The six operations, composed from the cache, link and git layers.
//!
//! The engine owns its working directory: user paths are resolved against
//! it and printed relative to it, so nothing here ever calls `chdir`.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::cache::{
    Fetcher, MakeFetcher, SymPaths, ensure_dirs, ensure_primary_link, is_resolved,
    make_read_only, retrieve, unique_name,
};
use crate::config::SymConfig;
use crate::error::{Result, SymError};
use crate::fixup::fix_link;
use crate::git::GitRepo;
use crate::links::{
    absolute, canonical_target_relative_to, create_symlink, is_link_through, join_relative_link,
    relative_to,
};
use crate::resolve::{ResolutionState, classify};

/// A repository checkout wired to its cache.
pub struct GitSym<F = MakeFetcher> {
    git: GitRepo,
    paths: SymPaths,
    fetcher: F,
    max_arg_len: usize,
    cwd: PathBuf,
}

impl GitSym<MakeFetcher> {
    /// Open the repository containing `cwd`, fetching through the
    /// configured retriever and the repository's rule file.
    pub fn open(config: &SymConfig, cwd: &Path) -> Result<Self> {
        let cwd = fs::canonicalize(cwd)?;
        let git = GitRepo::discover(&cwd)?;
        let paths = SymPaths::resolve(config, git.root(), git.git_dir(), &cwd);
        let fetcher = MakeFetcher::new(config.retriever.clone(), paths.rule_file());
        Self::setup(config, cwd, git, paths, fetcher)
    }
}

impl<F: Fetcher> GitSym<F> {
    /// Open the repository containing `cwd` with a custom fetcher.
    pub fn with_fetcher(config: &SymConfig, cwd: &Path, fetcher: F) -> Result<Self> {
        let cwd = fs::canonicalize(cwd)?;
        let git = GitRepo::discover(&cwd)?;
        let paths = SymPaths::resolve(config, git.root(), git.git_dir(), &cwd);
        Self::setup(config, cwd, git, paths, fetcher)
    }

    fn setup(
        config: &SymConfig,
        cwd: PathBuf,
        git: GitRepo,
        paths: SymPaths,
        fetcher: F,
    ) -> Result<Self> {
        log::debug!("cache_dir={}", paths.cache_dir().display());
        log::debug!("sym_dir={}", paths.sym_dir().display());
        log::debug!("sym_link={}", paths.sym_link().display());
        ensure_dirs(&paths)?;
        ensure_primary_link(&paths, &git)?;
        Ok(Self {
            git,
            paths,
            fetcher,
            max_arg_len: config.max_arg_len,
            cwd,
        })
    }

    /// The resolved layout.
    pub fn paths(&self) -> &SymPaths {
        &self.paths
    }

    /// The fetcher used for retrieval.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    fn abs(&self, path: &Path) -> PathBuf {
        absolute(&self.cwd, path)
    }

    fn rel(&self, path: &Path) -> PathBuf {
        relative_to(path, &self.cwd)
    }

    /// Every symlink committed in HEAD beneath the working directory, as
    /// absolute paths. Collected up front; calling again walks HEAD afresh.
    pub fn find_all_symlinks(&self) -> Result<Vec<PathBuf>> {
        Ok(self.git.symlinks_in_head(&self.cwd)?)
    }

    fn symlinks_through(&self, via: &Path) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for symlink in self.find_all_symlinks()? {
            if is_link_through(via, &symlink) {
                log::info!("symlink: {}", self.rel(&symlink).display());
                found.push(symlink);
            }
        }
        Ok(found)
    }

    /// Committed symlinks that route through `via`, relative to the working
    /// directory.
    pub fn find_symlinks_through(&self, via: &Path) -> Result<Vec<PathBuf>> {
        Ok(self
            .symlinks_through(&self.abs(via))?
            .iter()
            .map(|s| self.rel(s))
            .collect())
    }

    /// The explicit paths made absolute, or every link through `via`.
    fn targets(&self, given: &[PathBuf], via: &Path) -> Result<Vec<PathBuf>> {
        if given.is_empty() {
            self.symlinks_through(via)
        } else {
            Ok(given.iter().map(|p| self.abs(p)).collect())
        }
    }

    fn check_link(&self, symlink: &Path) -> bool {
        if is_resolved(symlink) {
            return true;
        }
        let target = fs::read_link(symlink)
            .map(|t| t.display().to_string())
            .unwrap_or_else(|_| "?".to_string());
        log::info!("{} -> {} does not exist", self.rel(symlink).display(), target);
        false
    }

    /// Print one line per symlink: marker, path and joined target.
    ///
    /// With no paths, every committed symlink is shown.
    pub fn show(&self, symlinks: &[PathBuf], out: &mut dyn Write) -> Result<()> {
        let symlinks = if symlinks.is_empty() {
            self.find_all_symlinks()?
        } else {
            symlinks.iter().map(|p| self.abs(p)).collect()
        };
        for symlink in &symlinks {
            self.show_one(symlink, out)?;
        }
        Ok(())
    }

    fn show_one(&self, symlink: &Path, out: &mut dyn Write) -> Result<()> {
        let shown = self.rel(symlink);
        let state = classify(symlink, self.paths.sym_link());
        if state == ResolutionState::Unknown {
            writeln!(out, "{} {}", state, shown.display())?;
            return Ok(());
        }
        let raw_target = fs::read_link(symlink)?;
        let joined = if raw_target.is_absolute() {
            raw_target
        } else {
            join_relative_link(&shown, &raw_target)
        };
        writeln!(out, "{} {}\t{}", state, shown.display(), joined.display())?;
        Ok(())
    }

    /// Fail on the first symlink that does not resolve.
    pub fn check(&self, symlinks: &[PathBuf]) -> Result<()> {
        let symlinks = self.targets(symlinks, self.paths.sym_link())?;
        self.check_all(&symlinks)
    }

    fn check_all(&self, symlinks: &[PathBuf]) -> Result<()> {
        for symlink in symlinks {
            if !self.check_link(symlink) {
                return Err(SymError::Unresolved(self.rel(symlink)));
            }
        }
        Ok(())
    }

    /// Print every symlink that does not resolve. Returns how many.
    pub fn missing(&self, symlinks: &[PathBuf], out: &mut dyn Write) -> Result<usize> {
        let symlinks = self.targets(symlinks, self.paths.sym_link())?;
        let mut missing = 0;
        for symlink in &symlinks {
            if !self.check_link(symlink) {
                writeln!(out, "{}", self.rel(symlink).display())?;
                missing += 1;
            }
        }
        Ok(missing)
    }

    /// Retrieve whatever unresolved symlinks need, then check them all.
    pub fn update(&self, symlinks: &[PathBuf]) -> Result<()> {
        let symlinks = self.targets(symlinks, self.paths.sym_link())?;
        let mut needed = BTreeSet::new();
        for symlink in &symlinks {
            if !self.check_link(symlink) {
                needed.insert(self.needed_name(symlink)?);
            }
        }
        log::debug!("needed: {:?}", needed);
        retrieve(&self.paths, &self.fetcher, self.max_arg_len, &needed)?;
        self.check_all(&symlinks)
    }

    /// The cache entry an unresolved link asks for. The link's basename
    /// must be its whole path below the primary link: the namespace is
    /// flat.
    fn needed_name(&self, symlink: &Path) -> Result<String> {
        let raw_target = fs::read_link(symlink).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SymError::NotFound(self.rel(symlink)),
            _ => e.into(),
        })?;
        let basename = raw_target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                SymError::ConsistencyFault(format!(
                    "{} -> {} names no entry",
                    self.rel(symlink).display(),
                    raw_target.display()
                ))
            })?;
        let canonical = canonical_target_relative_to(symlink, self.paths.sym_link())?;
        if canonical != Path::new(&basename) {
            return Err(SymError::ConsistencyFault(format!(
                "{} -> {}: expected a flat name under {}, found {}",
                self.rel(symlink).display(),
                raw_target.display(),
                self.paths.sym_link().display(),
                canonical.display()
            )));
        }
        Ok(basename)
    }

    /// Move each path into the cache and leave a committed-to-be symlink
    /// in its place.
    ///
    /// A path that is missing or of an unsupported kind is skipped and the
    /// rest still proceed; the first such error is returned at the end.
    /// Each entry is made read-only as soon as it lands in the cache, and
    /// already-moved paths are never moved back.
    pub fn add(&self, paths: &[PathBuf], out: &mut dyn Write) -> Result<()> {
        let mut needed = BTreeSet::new();
        let mut added = Vec::new();
        let mut skipped = None;

        for path in paths {
            let abs = self.abs(path);
            match self.add_one(&abs) {
                Ok(name) => {
                    needed.insert(name);
                    added.push(abs);
                }
                Err(e) if e.is_per_path() => {
                    log::error!("skipping {}: {}", path.display(), e);
                    skipped.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }

        retrieve(&self.paths, &self.fetcher, self.max_arg_len, &needed)?;
        if !added.is_empty() {
            self.show(&added, out)?;
        }

        match skipped {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn add_one(&self, path: &Path) -> Result<String> {
        let name = unique_name(&self.git, path)?;
        let cached = self.paths.cache_entry(&name);

        if fs::symlink_metadata(&cached).is_ok() {
            if path.is_dir() {
                return Err(SymError::ConsistencyFault(format!(
                    "cache entry {} already exists for directory {}",
                    cached.display(),
                    self.rel(path).display()
                )));
            }
            log::info!("{} is already cached as {}", self.rel(path).display(), name);
            log::info!("$ rm {}", path.display());
            fs::remove_file(path)?;
        } else {
            move_path(path, &cached)?;
            make_read_only(&cached)?;
        }

        let link_dir = path.parent().unwrap_or_else(|| Path::new("/"));
        let link_to = relative_to(&self.paths.through_link(&name), link_dir);
        create_symlink(&link_to, path)?;
        self.git.stage(path)?;
        Ok(name)
    }

    /// Re-point links that go straight through the staging dir so they go
    /// through the primary link instead. Returns how many were rewritten.
    pub fn fix(&self, symlinks: &[PathBuf]) -> Result<usize> {
        let via_old = self.paths.sym_dir();
        let via_new = self.paths.sym_link();
        let symlinks = self.targets(symlinks, via_old)?;
        for symlink in &symlinks {
            fix_link(symlink, via_old, via_new)?;
        }
        Ok(symlinks.len())
    }
}

/// Rename `from` to `to`, falling back to `mv` across filesystems.
fn move_path(from: &Path, to: &Path) -> Result<()> {
    log::info!("$ mv {} {}", from.display(), to.display());
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            let status = Command::new("mv").arg(from).arg(to).status()?;
            if !status.success() {
                return Err(io::Error::other(format!(
                    "mv {} {} exited with {}",
                    from.display(),
                    to.display(),
                    status
                ))
                .into());
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
