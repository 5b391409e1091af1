//! Version-control collaborator, backed by libgit2.
//!
//! Everything the engine needs from git is local:
//! - `discover` - find the repository root and its private git dir
//! - `symlinks_in_head` - list mode-120000 entries of the HEAD tree
//! - `hash_object` - the `git hash-object` blob id of a file
//! - `check_ignore` - ask whether a path is excluded
//! - `add_exclude` - append a rule to `info/exclude`
//! - `stage` - the `git add` of a newly created path

use git2::{ErrorCode, ObjectType, Oid, Repository, TreeWalkMode, TreeWalkResult};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::links::normalize;

/// File mode git records for a symlink blob.
const SYMLINK_FILEMODE: i32 = 0o120000;

/// Errors returned by git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// libgit2 reported an error.
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
    /// No repository contains the given directory.
    #[error("repository not found at {0}")]
    NotFound(String),
    /// The repository has no working tree to put symlinks in.
    #[error("repository at {0} is bare")]
    Bare(String),
    /// A path is outside the working tree.
    #[error("path {0} is outside the repository")]
    OutsideRepo(String),
    /// Underlying IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of asking git whether a path is ignored.
///
/// A failing query is reported as `Indeterminate` rather than folded into
/// `NotIgnored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreStatus {
    Ignored,
    NotIgnored,
    Indeterminate,
}

/// A discovered repository with a working tree.
pub struct GitRepo {
    repo: Repository,
    root: PathBuf,
    git_dir: PathBuf,
}

impl GitRepo {
    /// Find the repository containing `dir`.
    pub fn discover(dir: &Path) -> Result<Self, GitError> {
        let repo = Repository::discover(dir).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                GitError::NotFound(dir.display().to_string())
            } else {
                GitError::Git(e)
            }
        })?;
        let root = repo
            .workdir()
            .map(normalize)
            .ok_or_else(|| GitError::Bare(repo.path().display().to_string()))?;
        let git_dir = normalize(repo.path());
        log::debug!("git root={} git_dir={}", root.display(), git_dir.display());
        Ok(Self {
            repo,
            root,
            git_dir,
        })
    }

    /// Top of the working tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Private metadata directory (`.git`, or `.git/modules/<x>` for a
    /// submodule).
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn repo_relative(&self, path: &Path) -> Result<PathBuf, GitError> {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .map_err(|_| GitError::OutsideRepo(path.display().to_string()))
    }

    /// Absolute paths of every symlink recorded in the HEAD commit beneath
    /// the absolute directory `subdir`.
    ///
    /// Reads the commit, not the index nor the working tree. Submodules are
    /// commit entries and are never descended into. An unborn HEAD or a
    /// `subdir` absent from the commit yields nothing.
    pub fn symlinks_in_head(&self, subdir: &Path) -> Result<Vec<PathBuf>, GitError> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                log::debug!("HEAD is unborn; no committed symlinks");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let commit_tree = head.peel_to_tree()?;

        let prefix = self.repo_relative(subdir)?;
        let subtree = if prefix.as_os_str().is_empty() {
            commit_tree
        } else {
            match commit_tree.get_path(&prefix) {
                Ok(entry) if entry.kind() == Some(ObjectType::Tree) => {
                    entry.to_object(&self.repo)?.peel_to_tree()?
                }
                Ok(_) => return Ok(Vec::new()),
                Err(e) if e.code() == ErrorCode::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            }
        };

        let base = self.root.join(&prefix);
        let mut found = Vec::new();
        subtree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if entry.filemode() == SYMLINK_FILEMODE {
                if let Some(name) = entry.name() {
                    found.push(base.join(dir).join(name));
                }
            }
            TreeWalkResult::Ok
        })?;
        Ok(found)
    }

    /// Blob id git would assign to the file's content, like
    /// `git hash-object <path>`.
    pub fn hash_object(&self, path: &Path) -> Result<String, GitError> {
        let oid = Oid::hash_file(ObjectType::Blob, path)?;
        Ok(oid.to_string())
    }

    /// Whether the absolute `path` is excluded by the repository's ignore
    /// rules.
    pub fn check_ignore(&self, path: &Path) -> IgnoreStatus {
        let relative = match self.repo_relative(path) {
            Ok(relative) => relative,
            Err(e) => {
                log::debug!("check-ignore {}: {}", path.display(), e);
                return IgnoreStatus::Indeterminate;
            }
        };
        match self.repo.is_path_ignored(&relative) {
            Ok(true) => IgnoreStatus::Ignored,
            Ok(false) => IgnoreStatus::NotIgnored,
            Err(e) => {
                log::debug!("check-ignore {}: {}", relative.display(), e);
                IgnoreStatus::Indeterminate
            }
        }
    }

    /// Append `rule` to `info/exclude`, which is private to this clone and
    /// never committed.
    pub fn add_exclude(&self, rule: &str) -> Result<(), GitError> {
        let info_dir = self.git_dir.join("info");
        std::fs::create_dir_all(&info_dir)?;
        let exclude = info_dir.join("exclude");
        let needs_newline = match std::fs::read(&exclude) {
            Ok(existing) => !existing.is_empty() && !existing.ends_with(b"\n"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        log::info!("$ echo '{}' >> {}", rule, exclude.display());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&exclude)?;
        if needs_newline {
            file.write_all(b"\n")?;
        }
        writeln!(file, "{}", rule)?;
        Ok(())
    }

    /// Stage the absolute `path` in the index, like `git add <path>`.
    pub fn stage(&self, path: &Path) -> Result<(), GitError> {
        let relative = self.repo_relative(path)?;
        log::info!("$ git add {}", relative.display());
        let mut index = self.repo.index()?;
        index.add_path(&relative)?;
        index.write()?;
        Ok(())
    }
}
