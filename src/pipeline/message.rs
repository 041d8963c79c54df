//! Message processing: one raw message in, attachment files out.

use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::export::attachment::{write_attachment, SavedAttachment};
use crate::export::destination::{self, INCOMPLETE_MARKER};
use crate::parser::mime::{Attachment, MessageReader, Part, PartError};

/// Result of processing a message that had a usable envelope.
#[derive(Debug)]
pub enum MessageOutcome {
    /// The destination already existed; no part was read.
    Skipped {
        dir: PathBuf,
        /// An earlier run left the incompleteness marker behind.
        incomplete: bool,
    },
    /// Every part was read.
    Extracted(Extraction),
    /// The part walk stopped early. Attachments written so far stay on disk.
    Aborted {
        extraction: Extraction,
        reason: PartError,
    },
}

/// Attachments written for one message.
#[derive(Debug, Default)]
pub struct Extraction {
    pub dir: PathBuf,
    pub saved: Vec<SavedAttachment>,
    /// Attachments that could not be written.
    pub failed: usize,
}

impl Extraction {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            ..Self::default()
        }
    }

    /// Total bytes written.
    pub fn bytes(&self) -> u64 {
        self.saved.iter().map(|s| s.bytes).sum()
    }
}

/// Extracts attachments below a fixed output root.
#[derive(Debug, Clone)]
pub struct MessageProcessor {
    root: PathBuf,
}

impl MessageProcessor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Process one complete RFC 5322 message.
    ///
    /// `Err` means the message was abandoned before anything was written:
    /// unreadable MIME, no sender, no date, or an unresolvable destination.
    pub fn process(&self, raw: &[u8]) -> Result<MessageOutcome> {
        let reader = MessageReader::open(raw)?;
        let envelope = reader.envelope()?;
        let destination = destination::resolve(&self.root, &envelope)?;

        if destination.already_processed {
            let incomplete = destination.is_incomplete();
            if incomplete {
                warn!(
                    path = %destination.dir.display(),
                    "skip, exists (an earlier extraction was incomplete; remove the directory to retry)"
                );
            } else {
                info!(path = %destination.dir.display(), "skip, exists");
            }
            return Ok(MessageOutcome::Skipped {
                dir: destination.dir,
                incomplete,
            });
        }

        Ok(extract_parts(destination.dir, reader.parts()))
    }
}

/// Walk `parts` and write every attachment into `dir`.
///
/// Unknown charsets and failed writes cost one part; any other part error
/// ends the walk and, if `dir` exists by then, leaves [`INCOMPLETE_MARKER`] in it.
pub fn extract_parts<'a, I>(dir: PathBuf, parts: I) -> MessageOutcome
where
    I: IntoIterator<Item = std::result::Result<Part<'a>, PartError>>,
{
    let mut extraction = Extraction::new(dir);

    for part in parts {
        match part {
            Ok(Part::Inline { content_type }) => {
                trace!(content_type = %content_type, "Ignoring inline part");
            }
            Ok(Part::Attachment(attachment)) => save(&mut extraction, attachment),
            Err(e) if e.is_recoverable() => {
                warn!(path = %extraction.dir.display(), error = %e, "Skipping part");
            }
            Err(e) => {
                warn!(
                    path = %extraction.dir.display(),
                    saved = extraction.saved.len(),
                    error = %e,
                    "Abandoning rest of message"
                );
                mark_incomplete(&extraction.dir, &e);
                return MessageOutcome::Aborted {
                    extraction,
                    reason: e,
                };
            }
        }
    }

    debug!(
        path = %extraction.dir.display(),
        saved = extraction.saved.len(),
        failed = extraction.failed,
        "Message done"
    );
    MessageOutcome::Extracted(extraction)
}

fn save(extraction: &mut Extraction, attachment: Attachment<'_>) {
    debug!(filename = %attachment.filename, "Got attachment");
    let mut body: &[u8] = &attachment.body;
    match write_attachment(&extraction.dir, &attachment.filename, &mut body) {
        Ok(saved) => {
            info!(bytes = saved.bytes, path = %saved.path.display(), "Saved attachment");
            extraction.saved.push(saved);
        }
        Err(e) => {
            warn!(filename = %attachment.filename, error = %e, "Failed to save attachment");
            extraction.failed += 1;
        }
    }
}

/// Leave a note in a partially filled destination.
fn mark_incomplete(dir: &Path, reason: &PartError) {
    if !dir.is_dir() {
        return;
    }
    let marker = dir.join(INCOMPLETE_MARKER);
    if let Err(e) = std::fs::write(&marker, format!("{reason}\n")) {
        warn!(path = %marker.display(), error = %e, "Could not write incompleteness marker");
    }
}
