//! The header fields that decide where a message's attachments go.

use chrono::{DateTime, FixedOffset, Utc};

/// `strftime` layout of the per-message directory name.
///
/// Sortable, second precision, and free of `:` so it is valid on every
/// filesystem.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Sender and date of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Bare address of the first `From:` mailbox.
    pub sender: String,
    /// Value of the `Date:` header, with the offset it was written in.
    pub timestamp: DateTime<FixedOffset>,
}

impl Envelope {
    pub fn new(sender: impl Into<String>, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            sender: sender.into(),
            timestamp,
        }
    }

    /// Directory name for the timestamp, rendered in UTC.
    ///
    /// Two different instants never render the same (at second precision),
    /// whatever offsets their headers used.
    pub fn timestamp_dir(&self) -> String {
        self.timestamp
            .with_timezone(&Utc)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }
}
