//! External fetcher invocation.
//!
//! The fetcher is a batch process given a rule file and a list of entry
//! names. On success every name must exist directly inside its working
//! directory, the cache dir. Each invocation is one blocking,
//! all-or-nothing unit: no timeouts, no partial success.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;

/// Errors returned by the fetcher.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The fetcher could not be started.
    #[error("failed to run {program} in directory {}: {source}", dir.display())]
    Spawn {
        program: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The fetcher exited unsuccessfully.
    #[error("{program} exited with {status} in directory {}", dir.display())]
    Failed {
        program: String,
        dir: PathBuf,
        status: ExitStatus,
    },
}

/// Something that can materialize named entries into a directory.
pub trait Fetcher {
    /// Produce every entry in `names` directly inside `dir`.
    fn fetch(&self, dir: &Path, names: &[String]) -> Result<(), FetchError>;
}

/// Runs `<program> -j -f <rule_file> <names...>` in the target directory.
pub struct MakeFetcher {
    program: String,
    rule_file: PathBuf,
}

impl MakeFetcher {
    /// Create a fetcher running `program` against `rule_file`.
    pub fn new(program: impl Into<String>, rule_file: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            rule_file: rule_file.into(),
        }
    }

    /// Create the Command for one batch.
    ///
    /// stdin is closed so a prompting rule fails instead of hanging; stdout
    /// and stderr are inherited so the user sees the fetcher's progress.
    fn command(&self, dir: &Path, names: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-j").arg("-f").arg(&self.rule_file);
        cmd.args(names);
        cmd.current_dir(dir);
        cmd.stdin(Stdio::null());
        cmd
    }
}

impl Fetcher for MakeFetcher {
    fn fetch(&self, dir: &Path, names: &[String]) -> Result<(), FetchError> {
        log::info!("-> in dir {}", dir.display());
        log::info!(
            "$ {} -j -f {} {}",
            self.program,
            self.rule_file.display(),
            names.join(" ")
        );

        let status = self
            .command(dir, names)
            .status()
            .map_err(|source| FetchError::Spawn {
                program: self.program.clone(),
                dir: dir.to_path_buf(),
                source,
            })?;
        log::info!("<- left dir {}", dir.display());

        if !status.success() {
            return Err(FetchError::Failed {
                program: self.program.clone(),
                dir: dir.to_path_buf(),
                status,
            });
        }
        Ok(())
    }
}

/// Split `names` into consecutive batches whose space-joined length stays
/// within `max_len`.
///
/// Batches are filled greedily. A name longer than `max_len` on its own
/// still gets a batch of one; no name is ever dropped.
pub fn batches(names: &[String], max_len: usize) -> Vec<&[String]> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut joined_len = 0;

    for (i, name) in names.iter().enumerate() {
        if i > start && joined_len + 1 + name.len() > max_len {
            out.push(&names[start..i]);
            start = i;
            joined_len = 0;
        }
        if i > start {
            joined_len += 1;
        }
        joined_len += name.len();
    }
    if start < names.len() {
        out.push(&names[start..]);
    }
    out
}
