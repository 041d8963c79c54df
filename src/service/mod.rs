//! The mail server seam.
//!
//! The pipeline only talks to the server through [`MailService`]; the IMAP
//! implementation lives in [`imap`]. Tests drive the pipeline with scripted
//! services instead.

pub mod imap;

use std::sync::Mutex;

use crate::error::{AttacheError, Result};
use crate::model::fetch::{RawMessage, SeqRange};
use crate::model::folder::{FolderInfo, FolderMeta};

/// An authenticated connection to a mail server.
///
/// Every call is one server round trip. A connection is never used by two
/// threads at once; callers share it through a `Mutex` (see [`with_service`]).
pub trait MailService: Send {
    /// List every folder of the account.
    fn list_folders(&mut self) -> Result<Vec<FolderInfo>>;

    /// Select `name` read-only and report its message count.
    fn select_folder(&mut self, name: &str) -> Result<FolderMeta>;

    /// Fetch the full content of the messages in `range` of the selected
    /// folder `folder`, in sequence order.
    fn fetch_messages(&mut self, folder: &str, range: SeqRange) -> Result<Vec<RawMessage>>;

    /// End the session.
    fn logout(&mut self) -> Result<()>;
}

/// An unauthenticated connection that can log in once.
pub trait Connect {
    type Service: MailService;

    fn authenticate(self, username: &str, password: &str) -> Result<Self::Service>;
}

/// Run one command against a shared connection, holding the lock only for
/// the duration of `f`.
pub fn with_service<S, T>(service: &Mutex<S>, f: impl FnOnce(&mut S) -> Result<T>) -> Result<T> {
    let mut guard = service
        .lock()
        .map_err(|_| AttacheError::Worker("mail connection lock poisoned".into()))?;
    f(&mut guard)
}
