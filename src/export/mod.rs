//! Export functionality: stored sample payloads.

pub mod payload;

pub use payload::{retrieve_payload, RetrievedSample};
