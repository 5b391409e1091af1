//! Cache entry names.
//!
//! A file is named by content: `sha1.<blob-id>.<basename>`. A directory is
//! named by position: `dir.<path-from-root>`, with path separators folded
//! to `.` so every name is a single component of the flat cache namespace.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path};

use crate::error::{Result, SymError};
use crate::git::GitRepo;

/// Prefix of content-addressed file entries.
pub const FILE_PREFIX: &str = "sha1.";

/// Prefix of position-named directory entries.
pub const DIR_PREFIX: &str = "dir.";

/// Derive the cache entry name for the absolute `path`.
///
/// Symlinks are never cached, and neither is anything that is not a
/// regular file or directory.
pub fn unique_name(git: &GitRepo, path: &Path) -> Result<String> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SymError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    let file_type = meta.file_type();

    if file_type.is_symlink() {
        return Err(SymError::UnsupportedEntryKind {
            path: path.to_path_buf(),
            kind: "symlinks",
        });
    }
    if file_type.is_dir() {
        return dir_name(git.root(), path);
    }
    if file_type.is_file() {
        let hash = git.hash_object(path)?;
        let basename = path
            .file_name()
            .ok_or_else(|| SymError::NotFound(path.to_path_buf()))?
            .to_string_lossy();
        let name = format!("{}{}.{}", FILE_PREFIX, hash, basename);
        log::debug!("{} is named {}", path.display(), name);
        return Ok(name);
    }
    Err(SymError::UnsupportedEntryKind {
        path: path.to_path_buf(),
        kind: "special files",
    })
}

fn dir_name(root: &Path, path: &Path) -> Result<String> {
    let unsupported = || SymError::UnsupportedEntryKind {
        path: path.to_path_buf(),
        kind: "directories outside the working tree",
    };
    let relative = path.strip_prefix(root).map_err(|_| unsupported())?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => return Err(unsupported()),
        }
    }
    if parts.is_empty() {
        return Err(unsupported());
    }
    Ok(format!("{}{}", DIR_PREFIX, parts.join(".")))
}

/// Drop every write bit, like `chmod -w`.
pub fn make_read_only(path: &Path) -> Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    let mode = perms.mode() & !0o222;
    log::info!("$ chmod -w {}", path.display());
    perms.set_mode(mode);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::tests::init_repo;
    use std::os::unix::fs::symlink;

    #[test]
    fn file_name_is_hash_and_basename() {
        let (_dir, root) = init_repo();
        let file = root.join("hello.txt");
        fs::write(&file, b"hello\n").unwrap();
        let git = GitRepo::discover(&root).unwrap();

        assert_eq!(
            unique_name(&git, &file).unwrap(),
            "sha1.ce013625030ba8dba906f756967f9e9ca394464a.hello.txt"
        );
    }

    #[test]
    fn file_name_depends_only_on_content_and_basename() {
        let (_dir, root) = init_repo();
        fs::create_dir(root.join("a")).unwrap();
        fs::create_dir(root.join("b")).unwrap();
        let first = root.join("a").join("data.bin");
        let second = root.join("b").join("data.bin");
        let renamed = root.join("b").join("other.bin");
        fs::write(&first, b"payload").unwrap();
        fs::write(&second, b"payload").unwrap();
        fs::write(&renamed, b"payload").unwrap();
        let git = GitRepo::discover(&root).unwrap();

        let name = unique_name(&git, &first).unwrap();
        assert_eq!(name, unique_name(&git, &first).unwrap());
        assert_eq!(name, unique_name(&git, &second).unwrap());
        assert_ne!(name, unique_name(&git, &renamed).unwrap());

        fs::write(&second, b"changed").unwrap();
        assert_ne!(name, unique_name(&git, &second).unwrap());
    }

    #[test]
    fn dir_name_is_positional() {
        let (_dir, root) = init_repo();
        fs::create_dir_all(root.join("data").join("images")).unwrap();
        let git = GitRepo::discover(&root).unwrap();

        assert_eq!(unique_name(&git, &root.join("data")).unwrap(), "dir.data");
        assert_eq!(
            unique_name(&git, &root.join("data").join("images")).unwrap(),
            "dir.data.images"
        );
    }

    #[test]
    fn root_dir_is_unsupported() {
        let (_dir, root) = init_repo();
        let git = GitRepo::discover(&root).unwrap();

        let err = unique_name(&git, &root).unwrap_err();
        assert!(matches!(err, SymError::UnsupportedEntryKind { .. }));
    }

    #[test]
    fn symlinks_are_rejected() {
        let (_dir, root) = init_repo();
        fs::create_dir(root.join("real")).unwrap();
        symlink("real", root.join("alias")).unwrap();
        let git = GitRepo::discover(&root).unwrap();

        let err = unique_name(&git, &root.join("alias")).unwrap_err();
        assert!(matches!(
            err,
            SymError::UnsupportedEntryKind { kind: "symlinks", .. }
        ));
    }

    #[test]
    fn missing_path_is_not_found() {
        let (_dir, root) = init_repo();
        let git = GitRepo::discover(&root).unwrap();

        let err = unique_name(&git, &root.join("ghost")).unwrap_err();
        assert!(matches!(err, SymError::NotFound(_)));
    }

    #[test]
    fn make_read_only_clears_write_bits() {
        let (_dir, root) = init_repo();
        let file = root.join("entry");
        fs::write(&file, b"x").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o664)).unwrap();

        make_read_only(&file).unwrap();
        let mode = fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o444);
    }
}
