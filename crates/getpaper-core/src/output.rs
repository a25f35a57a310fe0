//! Where results go on disk, and how they are written there.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{PaperError, Result};

const BIB_EXTENSION: &str = "bib";
/// Used when the output directory has no name of its own (`/`).
const FALLBACK_BIB_STEM: &str = "references";

/// Resolves `.` and `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Absolute, lexically normalized form of `path`.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    let abs = std::path::absolute(path).map_err(|e| PaperError::fs(path, e))?;
    Ok(normalize_lexically(&abs))
}

fn bib_stem(directory: &Path) -> String {
    directory
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| FALLBACK_BIB_STEM.to_string())
}

/// The bibliography file for an output `directory`:
/// `dest` itself when it names a `.bib` file, `dest/<name>.bib` when it is a
/// directory, `directory/<name>.bib` without `dest`. `<name>` is the last
/// component of `directory`.
pub fn bib_path(directory: &Path, dest: Option<&Path>) -> Result<PathBuf> {
    let directory = absolute(directory)?;
    let file_name = format!("{}.{BIB_EXTENSION}", bib_stem(&directory));

    let path = match dest {
        None => directory.join(file_name),
        Some(dest) => {
            let dest = absolute(dest)?;
            let names_bib_file = dest
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(BIB_EXTENSION));
            if names_bib_file && !dest.is_dir() {
                dest
            } else {
                dest.join(file_name)
            }
        }
    };
    debug!(path = %path.display(), "bibliography path");
    Ok(path)
}

/// Creates `dir` and its parents. An existing non-directory is an error.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.exists() && !dir.is_dir() {
        return Err(PaperError::fs(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
        ));
    }
    std::fs::create_dir_all(dir).map_err(|e| PaperError::fs(dir, e))
}

/// Writes `bytes` to `path` through a temporary file in the same directory,
/// renamed over `path` once complete. On error the temporary file is removed
/// and `path` keeps its previous contents.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| PaperError::fs(dir, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| PaperError::fs(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| PaperError::fs(path, e.error))?;
    Ok(())
}
