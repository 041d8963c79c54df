//! Destination paths: where a message's attachments live, and whether the
//! message was already extracted.
//!
//! The output tree is the only record of progress. A message counts as
//! processed as soon as anything exists at its destination path.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{AttacheError, Result};
use crate::model::envelope::Envelope;

/// Name of the marker left in a destination whose extraction was cut short.
pub const INCOMPLETE_MARKER: &str = ".attache-incomplete";

/// Longest path component we produce, in bytes. Leaves room below the usual
/// 255-byte limit for collision counters.
pub const MAX_COMPONENT_BYTES: usize = 200;

/// Longest extension kept intact when a component is shortened.
const MAX_EXTENSION_BYTES: usize = 16;

/// The resolved output directory of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Absolute `root/sender/timestamp` path.
    pub dir: PathBuf,
    /// `true` if the path already existed.
    pub already_processed: bool,
}

impl Destination {
    /// Whether an earlier run stopped before all parts were read.
    pub fn is_incomplete(&self) -> bool {
        self.dir.join(INCOMPLETE_MARKER).exists()
    }
}

/// Compute the destination of a message and check whether it exists.
///
/// Nothing is created here; the directory appears with the first attachment.
pub fn resolve(root: &Path, envelope: &Envelope) -> Result<Destination> {
    let relative = root
        .join(fit_component(&escape_path_component(&envelope.sender)))
        .join(envelope.timestamp_dir());
    let dir = std::path::absolute(&relative).map_err(|e| AttacheError::io(&relative, e))?;

    // symlink_metadata so a dangling link still counts as present
    let already_processed = match std::fs::symlink_metadata(&dir) {
        Ok(_) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(AttacheError::io(&dir, e)),
    };
    debug!(path = %dir.display(), already_processed, "Resolved destination");

    Ok(Destination {
        dir,
        already_processed,
    })
}

/// Make `s` usable as a single path component without losing information.
///
/// Separators and `%` are percent-encoded, and the special names `.` and `..`
/// have their dots encoded. The mapping is injective, so distinct inputs never
/// share a directory.
pub fn escape_path_component(s: &str) -> String {
    if s == "." || s == ".." {
        return s.replace('.', "%2E");
    }
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '\\' => out.push_str("%5C"),
            '\0' => out.push_str("%00"),
            _ => out.push(c),
        }
    }
    out
}

/// Shorten `component` to at most [`MAX_COMPONENT_BYTES`].
///
/// A shortened component keeps its extension and gets `~` plus the first
/// eight hex digits of the SHA-256 of the full text, so two long names with
/// a common prefix still differ. Short components are returned unchanged.
pub fn fit_component(component: &str) -> String {
    if component.len() <= MAX_COMPONENT_BYTES {
        return component.to_string();
    }

    let digest = Sha256::digest(component.as_bytes());
    let tag: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();

    let (stem, ext) = match component.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() <= MAX_EXTENSION_BYTES => {
            (stem, Some(ext))
        }
        _ => (component, None),
    };
    let suffix_len = 1 + tag.len() + ext.map_or(0, |e| e.len() + 1);
    let stem = truncate_on_char_boundary(stem, MAX_COMPONENT_BYTES - suffix_len);

    match ext {
        Some(ext) => format!("{stem}~{tag}.{ext}"),
        None => format!("{stem}~{tag}"),
    }
}

fn truncate_on_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn envelope(sender: &str, date: &str) -> Envelope {
        Envelope::new(sender, DateTime::parse_from_rfc2822(date).unwrap())
    }

    #[test]
    fn test_resolve_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let env = envelope("a@example.com", "Tue, 02 Jan 2024 03:04:05 +0000");
        let dest = resolve(tmp.path(), &env).unwrap();
        assert!(dest.dir.is_absolute());
        assert!(dest.dir.ends_with("a@example.com/2024-01-02T03-04-05"));
        assert!(!dest.already_processed);
        assert!(!dest.dir.exists(), "resolve must not create anything");
    }

    #[test]
    fn test_resolve_relative_root_is_absolute() {
        let env = envelope("a@example.com", "Tue, 02 Jan 2024 03:04:05 +0000");
        let dest = resolve(Path::new("relative/out"), &env).unwrap();
        assert!(dest.dir.is_absolute());
    }

    #[test]
    fn test_existing_file_counts_as_processed() {
        let tmp = tempfile::tempdir().unwrap();
        let env = envelope("a@example.com", "Tue, 02 Jan 2024 03:04:05 +0000");
        let sender_dir = tmp.path().join("a@example.com");
        std::fs::create_dir_all(&sender_dir).unwrap();
        std::fs::write(sender_dir.join("2024-01-02T03-04-05"), b"").unwrap();

        let dest = resolve(tmp.path(), &env).unwrap();
        assert!(dest.already_processed);
    }

    #[test]
    fn test_distinct_pairs_never_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let d1 = "Tue, 02 Jan 2024 03:04:05 +0000";
        let d2 = "Tue, 02 Jan 2024 03:04:06 +0000";
        let pairs = [
            ("a@example.com", d1),
            ("a@example.com", d2),
            ("b@example.com", d1),
            ("a/b@example.com", d1),
            ("a%2Fb@example.com", d1),
            ("a_b@example.com", d1),
        ];
        let mut dirs: Vec<PathBuf> = pairs
            .iter()
            .map(|(s, d)| resolve(tmp.path(), &envelope(s, d)).unwrap().dir)
            .collect();
        dirs.sort();
        dirs.dedup();
        assert_eq!(dirs.len(), pairs.len());
    }

    #[test]
    fn test_escape_path_component() {
        assert_eq!(escape_path_component("a@example.com"), "a@example.com");
        assert_eq!(escape_path_component("../etc"), "..%2Fetc");
        assert_eq!(escape_path_component(".."), "%2E%2E");
        assert_eq!(escape_path_component("."), "%2E");
        assert_eq!(escape_path_component("50%"), "50%25");
        assert_eq!(escape_path_component("a\\b"), "a%5Cb");
    }

    #[test]
    fn test_fit_component_short_unchanged() {
        assert_eq!(fit_component("report.pdf"), "report.pdf");
        let exact = "x".repeat(MAX_COMPONENT_BYTES);
        assert_eq!(fit_component(&exact), exact);
    }

    #[test]
    fn test_fit_component_keeps_extension_and_char_boundary() {
        let long = format!("{}.pdf", "é".repeat(300));
        let fitted = fit_component(&long);
        assert!(fitted.len() <= MAX_COMPONENT_BYTES);
        assert!(fitted.ends_with(".pdf"));
        assert!(fitted.starts_with("éé"));
        assert!(fitted.contains('~'));
    }

    #[test]
    fn test_fit_component_distinguishes_common_prefix() {
        let base = "a".repeat(400);
        let one = fit_component(&format!("{base}1"));
        let two = fit_component(&format!("{base}2"));
        assert_ne!(one, two);
        assert_eq!(one, fit_component(&format!("{base}1")), "stable across calls");
    }

    #[test]
    fn test_long_sender_resolves_to_usable_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let sender = format!("{}@example.com", "x".repeat(300));
        let env = envelope(&sender, "Tue, 02 Jan 2024 03:04:05 +0000");
        let dest = resolve(tmp.path(), &env).unwrap();
        let component = dest.dir.parent().unwrap().file_name().unwrap();
        assert!(component.len() <= MAX_COMPONENT_BYTES);
        std::fs::create_dir_all(&dest.dir).unwrap();
    }

    #[test]
    fn test_incomplete_marker_detected() {
        let tmp = tempfile::tempdir().unwrap();
        let env = envelope("a@example.com", "Tue, 02 Jan 2024 03:04:05 +0000");
        let dest = resolve(tmp.path(), &env).unwrap();
        std::fs::create_dir_all(&dest.dir).unwrap();
        assert!(!dest.is_incomplete());
        std::fs::write(dest.dir.join(INCOMPLETE_MARKER), b"aborted").unwrap();
        assert!(dest.is_incomplete());
    }
}
