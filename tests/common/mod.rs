//! Shared test doubles: an in-memory store, scripted backends and a
//! tracing layer that counts events per level.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use attachscope::backends::{ContentExtractor, ReputationLookup, SandboxAnalyzer};
use attachscope::error::{BackendError, StoreError};
use attachscope::model::attachment::Attachment;
use attachscope::store::{IndexStore, SampleQuery};

// ─── Store ──────────────────────────────────────────────────────────

/// Records calls and replays scripted failures for `put_*` operations.
#[derive(Default)]
pub struct MemoryStore {
    pub records: Vec<Value>,
    pub failures: RefCell<VecDeque<StoreError>>,
    pub searches: RefCell<Vec<(String, SampleQuery, usize)>>,
    pub settings: RefCell<Vec<(String, Value)>>,
    pub templates: RefCell<Vec<(String, String)>>,
}

impl MemoryStore {
    pub fn with_records(records: Vec<Value>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn failing(failures: Vec<StoreError>) -> Self {
        Self {
            failures: RefCell::new(failures.into()),
            ..Default::default()
        }
    }

    fn next_failure(&self) -> Option<StoreError> {
        self.failures.borrow_mut().pop_front()
    }
}

impl IndexStore for MemoryStore {
    fn search(
        &self,
        index: &str,
        query: &SampleQuery,
        limit: usize,
    ) -> Result<Vec<Value>, StoreError> {
        self.searches
            .borrow_mut()
            .push((index.to_string(), query.clone(), limit));
        Ok(self
            .records
            .iter()
            .filter(|r| {
                r.get(&query.field).and_then(Value::as_str) == Some(query.value.as_str())
            })
            .take(limit)
            .cloned()
            .collect())
    }

    fn put_settings(&self, index: &str, settings: &Value) -> Result<(), StoreError> {
        if let Some(e) = self.next_failure() {
            return Err(e);
        }
        self.settings
            .borrow_mut()
            .push((index.to_string(), settings.clone()));
        Ok(())
    }

    fn put_template(&self, name: &str, body: &str) -> Result<(), StoreError> {
        if let Some(e) = self.next_failure() {
            return Err(e);
        }
        self.templates
            .borrow_mut()
            .push((name.to_string(), body.to_string()));
        Ok(())
    }
}

// ─── Backends ───────────────────────────────────────────────────────

/// Shared call log, one entry per backend call.
pub type Calls = Rc<RefCell<Vec<String>>>;

pub struct MockExtractor {
    pub calls: Calls,
}

impl ContentExtractor for MockExtractor {
    fn extract(&self, payload: &str) -> Result<Value, BackendError> {
        self.calls.borrow_mut().push(payload.to_string());
        Ok(serde_json::json!([{ "X-TIKA:content": "extracted" }]))
    }
}

/// Reports by sha1; unknown hashes get an empty object, hashes in
/// `failing` get an error.
pub struct MockLookup {
    pub reports: HashMap<String, Value>,
    pub failing: Vec<String>,
    pub calls: Calls,
}

impl ReputationLookup for MockLookup {
    fn file_report(&self, sha1: &str) -> Result<Value, BackendError> {
        self.calls.borrow_mut().push(sha1.to_string());
        if self.failing.iter().any(|f| f == sha1) {
            return Err(BackendError::Status(500));
        }
        Ok(self
            .reports
            .get(sha1)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({})))
    }
}

/// Echoes the extension it was given and the config keys it saw.
pub struct MockSandbox {
    pub calls: Calls,
    pub configs: Rc<RefCell<Vec<Value>>>,
}

impl SandboxAnalyzer for MockSandbox {
    fn analyze(&self, attachment: &Attachment, config: &Value) -> Result<Value, BackendError> {
        self.calls.borrow_mut().push(attachment.extension.clone());
        self.configs.borrow_mut().push(config.clone());
        Ok(serde_json::json!({ "verdict": "clean", "extension": attachment.extension }))
    }
}

/// A VirusTotal report for a known file.
pub fn known_report(positives: i64) -> Value {
    serde_json::json!({
        "response_code": 1,
        "positives": positives,
        "scans": { "EngineA": { "detected": positives > 0 } }
    })
}

// ─── Logging ────────────────────────────────────────────────────────

/// Counts tracing events by level.
#[derive(Clone, Default)]
pub struct LevelCounter {
    counts: Arc<Mutex<HashMap<&'static str, usize>>>,
}

impl LevelCounter {
    pub fn count(&self, level: tracing::Level) -> usize {
        self.counts
            .lock()
            .unwrap()
            .get(level.as_str())
            .copied()
            .unwrap_or(0)
    }
}

impl<S: Subscriber> Layer<S> for LevelCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        *self
            .counts
            .lock()
            .unwrap()
            .entry(event.metadata().level().as_str())
            .or_default() += 1;
    }
}

/// Run `f` with a subscriber that counts events, returning the counter.
pub fn with_level_counter<T>(f: impl FnOnce() -> T) -> (T, LevelCounter) {
    use tracing_subscriber::layer::SubscriberExt;

    let counter = LevelCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, counter)
}
