use anyhow::{Context, Result};
use fn_error_context::context;
use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

/// Reads a file, treating a missing file as `None`. Every other failure is an error, a file we
/// cannot read is not the same thing as a file that isn't there.
#[context("reading {:?}", path)]
pub(crate) fn read_optional_file_to_string(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Replaces the file at `path` with `contents` such that concurrent readers see either the old or
/// the new contents, never a mix. Concurrent writers are last-writer-wins.
///
/// Symlinks are followed so that a symlinked file keeps being a symlink. The new file is created
/// with mode 0600 and any missing parent directories are created.
#[context("writing {:?}", path)]
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let path = resolve_symlinks(path)?;
    let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));

    std::fs::create_dir_all(dir).context("creating parent directory")?;

    let mut temp_file = tempfile::NamedTempFile::new_in(dir).context("creating temporary file")?;
    temp_file.write_all(contents).context("writing temporary file")?;
    temp_file.as_file().sync_all().context("syncing temporary file")?;
    temp_file.persist(&path).context("renaming temporary file into place")?;

    Ok(())
}

fn resolve_symlinks(path: &Path) -> Result<PathBuf> {
    match std::fs::canonicalize(path) {
        Ok(resolved) => Ok(resolved),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(err) => Err(err).context("resolving path"),
    }
}
