//! Search-index cluster maintenance with bounded retry.

pub mod maintenance;
pub mod retry;

pub use maintenance::{update_replicas, update_template};
pub use retry::{execute_with_retry, RetryOutcome, RetryPlan};
