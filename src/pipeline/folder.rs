//! Folder walking: select each folder, stream its messages, process them.

use std::sync::mpsc::{self, SyncSender};
use std::sync::Mutex;
use std::thread;

use tracing::{debug, info, warn};

use crate::config::ExtractConfig;
use crate::error::{AttacheError, Result};
use crate::model::fetch::{RawMessage, SeqRange};
use crate::model::folder::{ExclusionSet, FolderInfo};
use crate::service::{with_service, MailService};

use super::message::MessageProcessor;
use super::summary::RunSummary;

/// Capacity of the queue between the fetching thread and the processor.
pub const MESSAGE_QUEUE_CAPACITY: usize = 10;

/// Drives every folder through the message processor, one at a time.
pub struct FolderWalker<'a> {
    exclusions: &'a ExclusionSet,
    processor: MessageProcessor,
    fetch_batch: u32,
}

impl<'a> FolderWalker<'a> {
    pub fn new(config: &'a ExtractConfig) -> Self {
        Self {
            exclusions: &config.exclude,
            processor: MessageProcessor::new(config.output_root.clone()),
            fetch_batch: config.fetch_batch,
        }
    }

    /// Process every folder yielded by `folders`, in order.
    ///
    /// Returns at the first selection or fetch error; message-level problems
    /// are logged and counted in `summary` only.
    pub fn walk<S: MailService>(
        &self,
        service: &Mutex<S>,
        folders: impl IntoIterator<Item = FolderInfo>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        for folder in folders {
            summary.folders_listed += 1;
            self.walk_folder(service, &folder, summary)?;
        }
        Ok(())
    }

    fn walk_folder<S: MailService>(
        &self,
        service: &Mutex<S>,
        folder: &FolderInfo,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let name = folder.name.as_str();
        if self.exclusions.is_excluded(name) {
            debug!(folder = name, "Excluded, skipping");
            summary.folders_excluded += 1;
            return Ok(());
        }

        info!(folder = name, "Processing folder");
        let meta = with_service(service, |s| s.select_folder(name))?;
        let Some(range) = SeqRange::all(meta.exists) else {
            debug!(folder = name, "Folder is empty");
            summary.folders_empty += 1;
            return Ok(());
        };
        debug!(folder = name, messages = meta.exists, flags = ?meta.flags, "Selected folder");

        let (tx, rx) = mpsc::sync_channel(MESSAGE_QUEUE_CAPACITY);
        let batch = self.fetch_batch;
        thread::scope(|scope| {
            let producer = scope.spawn(move || fetch_range(service, name, range, batch, tx));
            for raw in rx {
                self.handle_message(name, raw, summary);
            }
            producer
                .join()
                .map_err(|_| AttacheError::Worker(format!("fetch thread for '{name}' panicked")))?
        })?;

        summary.folders_processed += 1;
        Ok(())
    }

    fn handle_message(&self, folder: &str, raw: RawMessage, summary: &mut RunSummary) {
        let seq = raw.seq;
        let Some(body) = raw.body else {
            warn!(folder, seq, error = %AttacheError::MissingBody(seq), "Abandoned message");
            summary.record_abandoned();
            return;
        };

        match self.processor.process(&body) {
            Ok(outcome) => summary.record(&outcome),
            Err(e) => {
                warn!(folder, seq, bytes = body.len(), error = %e, "Abandoned message");
                summary.record_abandoned();
            }
        }
    }
}

/// Producer side: fetch `range` batch by batch and queue each message.
///
/// Stops quietly if the consumer has gone away.
fn fetch_range<S: MailService>(
    service: &Mutex<S>,
    folder: &str,
    range: SeqRange,
    batch: u32,
    tx: SyncSender<RawMessage>,
) -> Result<()> {
    for chunk in range.chunks(batch) {
        let messages = with_service(service, |s| s.fetch_messages(folder, chunk))?;
        for message in messages {
            if tx.send(message).is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}
