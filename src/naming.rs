use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Candidate output path for `source` with extension `ext` and collision index `n`.
/// `n == 0` is the bare `<stem>.<ext>`, otherwise `<stem>_<n>.<ext>`.
fn candidate(source: &Path, ext: &str, n: u32) -> PathBuf {
    let mut name = source.with_extension("").into_os_string();
    if n > 0 {
        name.push(format!("_{n}"));
    }
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Create a new, empty output file next to `source`, picking the first free name.
///
/// Uses create-new semantics so an existing file is never opened for writing.
pub(crate) fn claim(source: &Path, ext: &str) -> Result<(PathBuf, File), Error> {
    let mut n = 0;
    loop {
        let path = candidate(source, ext, n);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                log::debug!("claimed output path {}", path.display());
                return Ok((path, file));
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(Error::Write(path, e)),
        }
    }
}

/// Write `bytes` to a freshly claimed output path. The file is removed again if
/// writing fails.
pub(crate) fn write_new(source: &Path, ext: &str, bytes: &[u8]) -> Result<PathBuf, Error> {
    let (path, mut file) = claim(source, ext)?;
    if let Err(e) = file.write_all(bytes).and_then(|()| file.sync_all()) {
        drop(file);
        discard(&path);
        return Err(Error::Write(path, e));
    }
    Ok(path)
}

pub(crate) fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        log::warn!("could not remove {}: {e}", path.display());
    }
}
