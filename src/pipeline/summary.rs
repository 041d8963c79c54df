//! Run counters, reported at the end of a run.

use serde::Serialize;

use super::message::MessageOutcome;

/// What a run did, folder by folder and message by message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub folders_listed: u64,
    pub folders_excluded: u64,
    pub folders_empty: u64,
    pub folders_processed: u64,
    pub messages_extracted: u64,
    pub messages_skipped: u64,
    /// Skipped messages whose destination still carries the incompleteness marker.
    pub messages_skipped_incomplete: u64,
    /// Messages whose part walk stopped on an unrecoverable error.
    pub messages_incomplete: u64,
    pub messages_abandoned: u64,
    pub attachments_saved: u64,
    pub attachments_failed: u64,
    pub bytes_written: u64,
}

impl RunSummary {
    /// Account for one processed message.
    pub fn record(&mut self, outcome: &MessageOutcome) {
        match outcome {
            MessageOutcome::Skipped { incomplete, .. } => {
                self.messages_skipped += 1;
                if *incomplete {
                    self.messages_skipped_incomplete += 1;
                }
            }
            MessageOutcome::Extracted(extraction) => {
                self.messages_extracted += 1;
                self.add_extraction(extraction);
            }
            MessageOutcome::Aborted { extraction, .. } => {
                self.messages_incomplete += 1;
                self.add_extraction(extraction);
            }
        }
    }

    /// Account for a message that could not be processed at all.
    pub fn record_abandoned(&mut self) {
        self.messages_abandoned += 1;
    }

    fn add_extraction(&mut self, extraction: &super::message::Extraction) {
        self.attachments_saved += extraction.saved.len() as u64;
        self.attachments_failed += extraction.failed as u64;
        self.bytes_written += extraction.bytes();
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::export::attachment::SavedAttachment;
    use crate::parser::mime::PartError;
    use crate::pipeline::message::Extraction;

    fn extraction(sizes: &[u64], failed: usize) -> Extraction {
        Extraction {
            dir: PathBuf::from("/out/a@example.com/2024-01-02T03-04-05"),
            saved: sizes
                .iter()
                .map(|&bytes| SavedAttachment {
                    path: PathBuf::from("/out/f"),
                    bytes,
                })
                .collect(),
            failed,
        }
    }

    #[test]
    fn test_record_outcomes() {
        let mut summary = RunSummary::default();
        summary.record(&MessageOutcome::Extracted(extraction(&[10, 5], 1)));
        summary.record(&MessageOutcome::Skipped {
            dir: PathBuf::from("/out/x"),
            incomplete: false,
        });
        summary.record(&MessageOutcome::Skipped {
            dir: PathBuf::from("/out/y"),
            incomplete: true,
        });
        summary.record(&MessageOutcome::Aborted {
            extraction: extraction(&[3], 0),
            reason: PartError::Malformed("eof".into()),
        });
        summary.record_abandoned();

        assert_eq!(summary.messages_extracted, 1);
        assert_eq!(summary.messages_skipped, 2);
        assert_eq!(summary.messages_skipped_incomplete, 1);
        assert_eq!(summary.messages_incomplete, 1);
        assert_eq!(summary.messages_abandoned, 1);
        assert_eq!(summary.attachments_saved, 3);
        assert_eq!(summary.attachments_failed, 1);
        assert_eq!(summary.bytes_written, 18);
    }
}
