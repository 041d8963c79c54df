//! IMAP implementation of [`MailService`], over TLS or plain TCP.

use std::io::{Read, Write};
use std::net::TcpStream;

use native_tls::{TlsConnector, TlsStream};
use tracing::{debug, info};

use crate::error::{AttacheError, Result};
use crate::model::fetch::{RawMessage, SeqRange};
use crate::model::folder::{FolderInfo, FolderMeta};

use super::{Connect, MailService};

/// Fetch the whole message without setting `\Seen`.
const FETCH_QUERY: &str = "BODY.PEEK[]";

/// A connected, not yet authenticated IMAP client.
pub struct ImapConnector<T: Read + Write> {
    client: imap::Client<T>,
}

impl ImapConnector<TlsStream<TcpStream>> {
    /// Open an implicit-TLS connection (usually port 993).
    pub fn dial_tls(server: &str, port: u16) -> Result<Self> {
        let tls = TlsConnector::builder()
            .build()
            .map_err(|e| connect_error(server, port, e))?;
        let client =
            imap::connect((server, port), server, &tls).map_err(|e| connect_error(server, port, e))?;
        info!(server, port, "Connected (TLS)");
        Ok(Self { client })
    }
}

impl ImapConnector<TcpStream> {
    /// Open an unencrypted connection (usually port 143).
    pub fn dial_plain(server: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((server, port)).map_err(|e| connect_error(server, port, e))?;
        let mut client = imap::Client::new(stream);
        client
            .read_greeting()
            .map_err(|e| connect_error(server, port, e))?;
        info!(server, port, "Connected (plain text)");
        Ok(Self { client })
    }
}

impl<T: Read + Write + Send> Connect for ImapConnector<T> {
    type Service = ImapService<T>;

    fn authenticate(self, username: &str, password: &str) -> Result<ImapService<T>> {
        let session = self
            .client
            .login(username, password)
            .map_err(|(e, _client)| AttacheError::Auth {
                username: username.to_string(),
                reason: e.to_string(),
            })?;
        info!(username, "Logged in");
        Ok(ImapService { session })
    }
}

/// An authenticated IMAP session.
pub struct ImapService<T: Read + Write> {
    session: imap::Session<T>,
}

impl<T: Read + Write + Send> MailService for ImapService<T> {
    fn list_folders(&mut self) -> Result<Vec<FolderInfo>> {
        let names = self
            .session
            .list(Some(""), Some("*"))
            .map_err(|e| AttacheError::Enumerate(e.to_string()))?;
        debug!(count = names.len(), "Listed folders");
        Ok(names.iter().map(|name| FolderInfo::new(name.name())).collect())
    }

    fn select_folder(&mut self, name: &str) -> Result<FolderMeta> {
        // EXAMINE: read-only, nothing in the folder is modified
        let mailbox = self
            .session
            .examine(name)
            .map_err(|e| AttacheError::Select {
                folder: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(FolderMeta {
            name: name.to_string(),
            exists: mailbox.exists,
            flags: mailbox.flags.iter().map(|f| format!("{f:?}")).collect(),
        })
    }

    fn fetch_messages(&mut self, folder: &str, range: SeqRange) -> Result<Vec<RawMessage>> {
        let fetches = self
            .session
            .fetch(range.to_string(), FETCH_QUERY)
            .map_err(|e| AttacheError::Fetch {
                folder: folder.to_string(),
                range: range.to_string(),
                reason: e.to_string(),
            })?;
        Ok(fetches
            .iter()
            .map(|fetch| RawMessage {
                seq: fetch.message,
                body: fetch.body().map(<[u8]>::to_vec),
            })
            .collect())
    }

    fn logout(&mut self) -> Result<()> {
        self.session
            .logout()
            .map_err(|e| AttacheError::Logout(e.to_string()))
    }
}

fn connect_error(server: &str, port: u16, e: impl std::fmt::Display) -> AttacheError {
    AttacheError::Connect {
        server: format!("{server}:{port}"),
        reason: e.to_string(),
    }
}
