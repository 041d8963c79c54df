//! Message sequence ranges and raw fetch results.

use std::fmt;

/// An inclusive range of message sequence numbers (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqRange {
    pub start: u32,
    pub end: u32,
}

impl SeqRange {
    /// The range covering every message of a folder holding `exists` messages.
    ///
    /// Returns `None` for an empty folder.
    pub fn all(exists: u32) -> Option<Self> {
        (exists > 0).then_some(Self { start: 1, end: exists })
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Split the range into consecutive batches of at most `size` messages.
    pub fn chunks(self, size: u32) -> impl Iterator<Item = SeqRange> {
        let size = size.max(1);
        let mut next = Some(self.start);
        std::iter::from_fn(move || {
            let start = next?;
            let end = start.saturating_add(size - 1).min(self.end);
            next = (end < self.end).then_some(end + 1);
            Some(SeqRange { start, end })
        })
    }
}

/// Renders in IMAP sequence-set syntax (`1:42`).
impl fmt::Display for SeqRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

/// One fetched message: its sequence number and full RFC 5322 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub seq: u32,
    /// `None` when the server answered without a body section.
    pub body: Option<Vec<u8>>,
}
