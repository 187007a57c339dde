//! Retrieve a stored sample by hash and write its payload to disk.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{Result, ScopeError};
use crate::model::attachment::Attachment;
use crate::model::hash::HashAlgorithm;
use crate::store::{index_or_all, IndexStore, SampleQuery};

/// What was written by [`retrieve_payload`].
#[derive(Debug, Clone)]
pub struct RetrievedSample {
    pub filename: Option<String>,
    pub content_type: String,
    pub sha256: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Look up the sample whose digest equals `hash_value` and write its
/// decoded payload to `output`, replacing any existing file.
///
/// The digest algorithm is chosen from the hash length alone. Nothing is
/// written unless a record is found and its payload decodes.
pub fn retrieve_payload(
    store: &dyn IndexStore,
    index: &str,
    hash_value: &str,
    output: &Path,
) -> Result<RetrievedSample> {
    let algorithm = HashAlgorithm::from_hex_len(hash_value)?;
    let query = SampleQuery::new(algorithm.field(), hash_value);

    let record = store
        .search(index, &query, 1)?
        .into_iter()
        .next()
        .ok_or_else(|| ScopeError::NotFound {
            index: index_or_all(index).to_string(),
            field: algorithm.field().to_string(),
            value: hash_value.to_string(),
        })?;

    if record.get("payload").is_none() {
        return Err(ScopeError::InvalidRecord(format!(
            "sample {hash_value} has no payload"
        )));
    }
    let sample: Attachment =
        serde_json::from_value(record).map_err(|e| ScopeError::InvalidRecord(e.to_string()))?;

    info!(
        filename = ?sample.filename,
        content_type = %sample.content_type,
        sha256 = %sample.sha256,
        "Sample found"
    );

    let data = sample.decoded_payload()?;
    check_digest(&sample, &data);

    std::fs::write(output, &data).map_err(|e| ScopeError::io(output, e))?;
    info!(hash = %hash_value, path = %output.display(), "Sample saved");

    Ok(RetrievedSample {
        filename: sample.filename,
        content_type: sample.content_type,
        sha256: sample.sha256,
        path: output.to_path_buf(),
        size: data.len() as u64,
    })
}

/// Warn when the written bytes do not hash to the recorded sha256.
fn check_digest(sample: &Attachment, data: &[u8]) {
    if sample.sha256.is_empty() {
        return;
    }
    let actual = format!("{:x}", Sha256::digest(data));
    if !actual.eq_ignore_ascii_case(&sample.sha256) {
        warn!(
            expected = %sample.sha256,
            actual = %actual,
            "Payload digest does not match the stored sha256"
        );
    }
}
