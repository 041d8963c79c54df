//! Email parsing: MIME envelope and part extraction.

pub mod mime;
