//! `attachscope`: email attachment enrichment and sample-store maintenance.
//!
//! This crate provides the processor registry and pipeline that annotate
//! parsed attachments with analysis results, the bounded-retry maintenance
//! operations for the Elasticsearch cluster holding them, and retrieval of
//! stored sample payloads by hash.

pub mod backends;
pub mod cluster;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod processors;
pub mod store;
