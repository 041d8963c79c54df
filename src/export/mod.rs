//! Output tree: destination resolution and attachment files.

pub mod attachment;
pub mod destination;
