//! Session orchestration: log in, enumerate folders, walk them, log out.

use std::sync::mpsc::{self, SyncSender};
use std::sync::Mutex;
use std::thread;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AttacheError, Result};
use crate::model::folder::FolderInfo;
use crate::service::{with_service, Connect, MailService};

use super::folder::FolderWalker;
use super::summary::RunSummary;

/// Capacity of the queue between folder enumeration and the walker.
pub const FOLDER_QUEUE_CAPACITY: usize = 100;

/// Run a complete extraction over `connector`.
///
/// Any error returned here is fatal for the run.
pub fn run<C: Connect>(connector: C, config: &Config) -> Result<RunSummary> {
    let account = &config.account;
    let service = connector.authenticate(&account.username, &account.password)?;
    let service = Mutex::new(service);

    let walker = FolderWalker::new(&config.extract);
    let mut summary = RunSummary::default();
    let result = extract_all(&service, &walker, &mut summary);

    let mut service = service
        .into_inner()
        .map_err(|_| AttacheError::Worker("mail connection lock poisoned".into()))?;
    if let Err(e) = service.logout() {
        warn!(error = %e, "Logout failed");
    }

    result?;
    info!(
        folders = summary.folders_processed,
        messages = summary.messages_extracted,
        attachments = summary.attachments_saved,
        "Run complete"
    );
    Ok(summary)
}

/// Enumerate folders on a producer thread while `walker` consumes them.
///
/// A walker error wins over an enumeration error; both are fatal.
pub fn extract_all<S: MailService>(
    service: &Mutex<S>,
    walker: &FolderWalker<'_>,
    summary: &mut RunSummary,
) -> Result<()> {
    let (tx, rx) = mpsc::sync_channel(FOLDER_QUEUE_CAPACITY);
    thread::scope(|scope| {
        let producer = scope.spawn(move || enumerate(service, tx));
        let walked = walker.walk(service, rx, summary);
        let listed = producer
            .join()
            .map_err(|_| AttacheError::Worker("folder enumeration thread panicked".into()))?;
        walked.and(listed)
    })
}

/// Producer side: list all folders and queue them.
fn enumerate<S: MailService>(service: &Mutex<S>, tx: SyncSender<FolderInfo>) -> Result<()> {
    let folders = with_service(service, |s| s.list_folders())?;
    info!(count = folders.len(), "Listed folders");
    for folder in folders {
        if tx.send(folder).is_err() {
            break;
        }
    }
    Ok(())
}
