//! Write attachments to disk.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{AttacheError, Result};

use super::destination::{escape_path_component, fit_component, INCOMPLETE_MARKER};

/// Filename used when an attachment declares none.
pub const PLACEHOLDER_FILENAME: &str = "unknown";

/// Copy buffer size; attachments are streamed, never held whole.
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// An attachment that reached the disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedAttachment {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Stream one attachment into `dir`, creating the directory if needed.
///
/// The file name is normalized with [`normalize_filename`]. An existing file
/// is never overwritten: a counter is appended instead (`name_1.ext`).
/// On a copy failure the partially written file is removed.
pub fn write_attachment(dir: &Path, filename: &str, body: &mut impl Read) -> Result<SavedAttachment> {
    std::fs::create_dir_all(dir).map_err(|e| AttacheError::io(dir, e))?;

    let (path, file) = create_unique(&dir.join(normalize_filename(filename)))?;

    match copy_body(file, body) {
        Ok(bytes) => Ok(SavedAttachment { path, bytes }),
        Err(e) => {
            if let Err(rm) = std::fs::remove_file(&path) {
                tracing::debug!(path = %path.display(), error = %rm, "Could not remove partial file");
            }
            Err(AttacheError::io(path, e))
        }
    }
}

/// Blank names become [`PLACEHOLDER_FILENAME`]; anything else is escaped into
/// a single path component and shortened if needed.
///
/// An attachment named like [`INCOMPLETE_MARKER`] gets its leading dot
/// encoded so it cannot pass for the marker.
pub fn normalize_filename(filename: &str) -> String {
    if filename.trim().is_empty() {
        return PLACEHOLDER_FILENAME.to_string();
    }
    let escaped = escape_path_component(filename);
    if escaped == INCOMPLETE_MARKER {
        return format!("%2E{}", &escaped[1..]);
    }
    fit_component(&escaped)
}

fn copy_body(file: File, body: &mut impl Read) -> std::io::Result<u64> {
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, file);
    let bytes = std::io::copy(body, &mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(bytes)
}

/// Create `path`, or the first free `stem_N.ext` variant of it.
fn create_unique(path: &Path) -> Result<(PathBuf, File)> {
    let mut candidate = path.to_path_buf();
    for i in 1..1000 {
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                candidate = numbered(path, i);
            }
            Err(e) => return Err(AttacheError::io(candidate, e)),
        }
    }
    Err(AttacheError::io(
        path,
        std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "too many attachments with the same name",
        ),
    ))
}

fn numbered(path: &Path, i: u32) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let parent = path.parent().unwrap_or(Path::new("."));
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => parent.join(format!("{stem}_{i}.{ext}")),
        None => parent.join(format!("{stem}_{i}")),
    }
}
