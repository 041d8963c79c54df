//! Folder descriptors and the exclusion filter.

use std::collections::BTreeSet;

/// Default folders that are never processed.
pub const DEFAULT_EXCLUDE: &str = "Spam,Trash,Deleted Messages";

/// A folder as reported by the server's folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderInfo {
    /// Full folder name, exactly as the server spells it.
    pub name: String,
}

impl FolderInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// State of a folder after it has been selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderMeta {
    /// Folder name.
    pub name: String,
    /// Number of messages in the folder (`EXISTS`).
    pub exists: u32,
    /// Flags defined for the folder, rendered as text.
    pub flags: Vec<String>,
}

/// Folder names that are skipped entirely.
///
/// Matching is exact and case-sensitive: `"spam"` does not exclude `"Spam"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    names: BTreeSet<String>,
}

impl ExclusionSet {
    /// Build a set from individual folder names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma-separated list such as `"Spam,Trash,Deleted Messages"`.
    ///
    /// Entries are trimmed and empty entries dropped, so `""` means
    /// "exclude nothing".
    pub fn parse(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty()),
        )
    }

    /// Whether `name` must not be processed.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
