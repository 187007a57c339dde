//! Core data model types for attachments and sample hashes.

pub mod attachment;
pub mod hash;
