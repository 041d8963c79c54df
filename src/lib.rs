//! `attache`: save every attachment of an IMAP mailbox to disk.
//!
//! Attachments land in `{root}/{sender}/{timestamp}/{filename}`. The output
//! tree doubles as the record of what was done: a message whose directory
//! exists is never touched again.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod service;
