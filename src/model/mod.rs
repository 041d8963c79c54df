//! Core data model types for folders, message envelopes, and fetch results.

pub mod envelope;
pub mod fetch;
pub mod folder;
