//! Access to the search-index cluster that stores analysed samples.
//!
//! The rest of the crate only talks to the cluster through [`IndexStore`];
//! [`elastic::ElasticClient`] is the HTTP implementation used by the CLI.

pub mod elastic;

use serde_json::{json, Map, Value};

use crate::error::StoreError;

/// Index pattern meaning "every index".
pub const ALL_INDICES: &str = "_all";

/// The three cluster operations the crate needs.
pub trait IndexStore {
    /// Return the `_source` of at most `limit` records matching `query`,
    /// in the store's default order.
    fn search(
        &self,
        index: &str,
        query: &SampleQuery,
        limit: usize,
    ) -> Result<Vec<Value>, StoreError>;

    /// Update the settings of one or more comma-separated indices.
    fn put_settings(&self, index: &str, settings: &Value) -> Result<(), StoreError>;

    /// Create or replace an index template.
    fn put_template(&self, name: &str, body: &str) -> Result<(), StoreError>;
}

/// Field-equality lookup of a sample record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleQuery {
    pub field: String,
    pub value: String,
}

impl SampleQuery {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Render the query DSL request body.
    pub fn to_body(&self, limit: usize) -> Value {
        let mut term = Map::new();
        term.insert(self.field.clone(), Value::String(self.value.clone()));
        json!({
            "size": limit,
            "query": {
                "bool": {
                    "filter": [ { "term": term } ]
                }
            }
        })
    }
}

/// Treat an empty index pattern as "all indices".
pub fn index_or_all(index: &str) -> &str {
    let trimmed = index.trim();
    if trimmed.is_empty() {
        ALL_INDICES
    } else {
        trimmed
    }
}
