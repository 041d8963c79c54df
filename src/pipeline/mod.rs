//! The extraction pipeline: session, folders, messages.

pub mod folder;
pub mod message;
pub mod session;
pub mod summary;
