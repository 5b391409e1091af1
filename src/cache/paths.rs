//! Resolved filesystem layout
//!
//! ```text
//! <root>/
//! ├── .git_sym -> <git-dir>/git_sym      # primary link, excluded from git
//! ├── git_sym.makefile                  # fetcher rules
//! └── some/dir/big.bin -> ../../.git_sym/sha1.<hash>.big.bin
//!
//! <git-dir>/git_sym/                     # staging dir
//! └── sha1.<hash>.big.bin -> <cache-dir>/sha1.<hash>.big.bin
//!
//! <cache-dir>/                           # default ~/git_sym_cache
//! └── sha1.<hash>.big.bin                # read-only entry
//! ```

use std::path::{Path, PathBuf};

use crate::config::{
    DEFAULT_LINK_NAME, DEFAULT_RULE_FILE_NAME, DEFAULT_SYM_DIR_NAME, SymConfig, default_cache_dir,
};
use crate::links::absolute;

/// Every absolute path the engine works with.
#[derive(Debug, Clone)]
pub struct SymPaths {
    root: PathBuf,
    git_dir: PathBuf,
    cache_dir: PathBuf,
    sym_dir: PathBuf,
    sym_link: PathBuf,
    rule_file: PathBuf,
}

impl SymPaths {
    /// Resolve overrides from `config` against the repository, with
    /// relative overrides taken from `cwd`.
    pub fn resolve(config: &SymConfig, root: &Path, git_dir: &Path, cwd: &Path) -> Self {
        let cache_dir = config
            .cache_dir
            .clone()
            .unwrap_or_else(default_cache_dir);
        let sym_dir = config
            .sym_dir
            .clone()
            .unwrap_or_else(|| git_dir.join(DEFAULT_SYM_DIR_NAME));
        let sym_link = config
            .sym_link
            .clone()
            .unwrap_or_else(|| root.join(DEFAULT_LINK_NAME));

        Self {
            root: root.to_path_buf(),
            git_dir: git_dir.to_path_buf(),
            cache_dir: absolute(cwd, &cache_dir),
            sym_dir: absolute(cwd, &sym_dir),
            sym_link: absolute(cwd, &sym_link),
            rule_file: root.join(DEFAULT_RULE_FILE_NAME),
        }
    }

    /// Top of the working tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The repository's private metadata directory.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Content-addressed store: `{cache_dir}`
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Staging directory of first-level links: `{git_dir}/git_sym`
    pub fn sym_dir(&self) -> &Path {
        &self.sym_dir
    }

    /// Primary indirection link: `{root}/.git_sym`
    pub fn sym_link(&self) -> &Path {
        &self.sym_link
    }

    /// Fetcher rule file: `{root}/git_sym.makefile`
    pub fn rule_file(&self) -> &Path {
        &self.rule_file
    }

    /// Cache entry path: `{cache_dir}/{name}`
    pub fn cache_entry(&self, name: &str) -> PathBuf {
        self.cache_dir.join(name)
    }

    /// First-level link path: `{sym_dir}/{name}`
    pub fn first_level_link(&self, name: &str) -> PathBuf {
        self.sym_dir.join(name)
    }

    /// Entry path as seen through the primary link: `{sym_link}/{name}`
    pub fn through_link(&self, name: &str) -> PathBuf {
        self.sym_link.join(name)
    }
}
