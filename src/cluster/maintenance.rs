//! Cluster maintenance: replica counts and index templates.

use std::path::Path;
use std::time::Duration;

use serde_json::json;
use tracing::info;

use super::retry::{execute_with_retry, RetryOutcome, RetryPlan};
use crate::error::{Result, ScopeError};
use crate::store::{index_or_all, IndexStore};

/// Set `number_of_replicas` on a comma-separated list of indices
/// (empty or `_all` for every index).
pub fn update_replicas(
    store: &dyn IndexStore,
    index: &str,
    replicas: u32,
    plan: &RetryPlan,
    sleep: &mut dyn FnMut(Duration),
) -> Result<RetryOutcome<()>> {
    let index = index_or_all(index);
    let settings = json!({ "index": { "number_of_replicas": replicas } });

    let outcome = execute_with_retry("Updating replicas", plan, sleep, || {
        store.put_settings(index, &settings)
    })?;

    if outcome.is_done() {
        info!(index = %index, replicas, "Updating replicas done");
    }
    Ok(outcome)
}

/// Create or replace the template `name` with the contents of
/// `template_path`.
///
/// The file is read once, before the first attempt; a missing or
/// unreadable file is an error and nothing is sent to the cluster.
pub fn update_template(
    store: &dyn IndexStore,
    template_path: &Path,
    name: &str,
    plan: &RetryPlan,
    sleep: &mut dyn FnMut(Duration),
) -> Result<RetryOutcome<()>> {
    let body = std::fs::read_to_string(template_path)
        .map_err(|e| ScopeError::io(template_path, e))?;

    let label = format!("Updating template {name:?}");
    let outcome = execute_with_retry(&label, plan, sleep, || store.put_template(name, &body))?;

    if outcome.is_done() {
        info!(template = %name, path = %template_path.display(), "Updating template done");
    }
    Ok(outcome)
}
