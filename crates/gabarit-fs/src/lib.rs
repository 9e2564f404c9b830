//! Atomic file write helpers.
//!
//! Output documents and repaired archives must never be observable in a
//! half-written state, so every write goes through:
//! - a temp file in the destination directory (avoids cross-device renames)
//! - flush + `sync_all`
//! - rename into place with replace semantics

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

fn parent_dir_or_dot(path: &Path) -> &Path {
    // `Path::parent` returns `Some("")` for bare relative file names like
    // `out.docx`; treat that as the current directory.
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Atomically replace `dest` with `bytes`.
///
/// If any step fails, the destination file is left untouched.
pub fn atomic_write_bytes(dest: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    let dest = dest.as_ref();
    let dir = parent_dir_or_dot(dest);
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.as_file_mut().write_all(bytes)?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;

    let tmp_path = tmp.into_temp_path();
    replace_file(tmp_path.as_ref(), dest)?;

    // Best-effort directory metadata sync; the file is already in place.
    let _ = sync_parent_dir(dest);
    Ok(())
}

fn replace_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) if to.exists() => {
            // Windows cannot rename over an existing file.
            fs::remove_file(to)?;
            fs::rename(from, to)
        }
        Err(err) => Err(err),
    }
}

fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let dir = parent_dir_or_dot(path);
    File::open(dir)?.sync_all()
}
