//! User-facing configuration, built once at startup and passed down.

use std::path::PathBuf;

/// Name of the cache directory under `$HOME` when none is given.
pub const DEFAULT_CACHE_DIR_NAME: &str = "git_sym_cache";

/// Name of the staging directory inside the git dir.
pub const DEFAULT_SYM_DIR_NAME: &str = "git_sym";

/// Name of the primary indirection link at the repository root.
pub const DEFAULT_LINK_NAME: &str = ".git_sym";

/// Rule file handed to the fetcher, at the repository root.
pub const DEFAULT_RULE_FILE_NAME: &str = "git_sym.makefile";

/// Default fetcher program.
pub const DEFAULT_RETRIEVER: &str = "make";

/// Upper bound on the joined length of names passed to one fetcher run.
pub const DEFAULT_MAX_ARG_LEN: usize = 1000;

/// Overrides supplied on the command line or through the environment.
///
/// `None` means "use the default derived from the repository".
#[derive(Debug, Clone)]
pub struct SymConfig {
    /// Where content-addressed entries are stored.
    pub cache_dir: Option<PathBuf>,
    /// Directory of first-level symlinks into the cache.
    pub sym_dir: Option<PathBuf>,
    /// Primary indirection link; must stay out of version control.
    pub sym_link: Option<PathBuf>,
    /// Program run to materialize missing entries.
    pub retriever: String,
    /// Batch bound for fetcher invocations.
    pub max_arg_len: usize,
}

impl Default for SymConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            sym_dir: None,
            sym_link: None,
            retriever: DEFAULT_RETRIEVER.to_string(),
            max_arg_len: DEFAULT_MAX_ARG_LEN,
        }
    }
}

impl SymConfig {
    /// Set the cache directory override.
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    /// Set the staging directory override.
    pub fn with_sym_dir(mut self, sym_dir: impl Into<PathBuf>) -> Self {
        self.sym_dir = Some(sym_dir.into());
        self
    }

    /// Set the primary link override.
    pub fn with_sym_link(mut self, sym_link: impl Into<PathBuf>) -> Self {
        self.sym_link = Some(sym_link.into());
        self
    }
}

/// `$HOME/git_sym_cache`, or a relative `git_sym_cache` if there is no home.
pub fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_CACHE_DIR_NAME)
}
