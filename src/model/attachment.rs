//! Parsed attachment records.
//!
//! Attachments arrive as JSON objects from the mail parser. The fields every
//! processor needs are typed; everything else (including the result slots
//! processors add) lives in a flattened map so nothing is lost on a
//! round-trip.

use std::borrow::Cow;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ScopeError};

/// Content-Transfer-Encoding of an attachment payload, as far as the
/// processors care about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// `base64`
    Base64,
    /// Anything else: the payload is the literal text.
    Plain,
}

impl TransferEncoding {
    /// Classify the value of a `content_transfer_encoding` field.
    pub fn from_field(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("base64") => Self::Base64,
            _ => Self::Plain,
        }
    }
}

/// A single attachment, possibly carrying nested attachments in `files`
/// (e.g. the members of an archive).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    /// Original filename, if the part had one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Raw payload, textually represented in `content_transfer_encoding`.
    pub payload: String,

    /// Transfer encoding of `payload` (`base64` or anything else for plain).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_transfer_encoding: Option<String>,

    /// MIME content type (e.g. `"application/pdf"`).
    #[serde(rename = "Content-Type")]
    pub content_type: String,

    /// Lower-case filename extension including the dot (e.g. `".js"`).
    pub extension: String,

    /// Decoded size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub md5: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sha1: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sha256: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sha512: String,

    /// Already judged out of scope by an earlier filtering stage.
    /// Filtered attachments are never handed to a backend.
    pub is_filtered: bool,

    /// Nested attachments.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<Attachment>,

    /// Processor results (`tika`, `virustotal`, `thug`, ...) and any other
    /// keys the parser emitted.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Attachment {
    /// Recorded transfer encoding of the payload.
    pub fn transfer_encoding(&self) -> TransferEncoding {
        TransferEncoding::from_field(self.content_transfer_encoding.as_deref())
    }

    /// The payload rendered in `wanted`, without touching the record.
    ///
    /// The attachment's own `content_transfer_encoding` is left as it is, so
    /// other processors keep seeing the encoding the parser stored.
    pub fn payload_as(&self, wanted: TransferEncoding) -> Result<Cow<'_, str>> {
        match (self.transfer_encoding(), wanted) {
            (TransferEncoding::Plain, TransferEncoding::Base64) => {
                Ok(Cow::Owned(STANDARD.encode(self.payload.as_bytes())))
            }
            (TransferEncoding::Base64, TransferEncoding::Plain) => {
                let raw = self.decoded_payload()?;
                Ok(Cow::Owned(String::from_utf8_lossy(&raw).into_owned()))
            }
            _ => Ok(Cow::Borrowed(&self.payload)),
        }
    }

    /// The payload as raw bytes.
    pub fn decoded_payload(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(&self.payload),
            TransferEncoding::Plain => Ok(self.payload.clone().into_bytes()),
        }
    }

    /// The result stored under a processor's key, if it ran.
    pub fn result(&self, processor: &str) -> Option<&Value> {
        self.extra.get(processor)
    }

    /// Store a processor's result under its own key.
    pub fn set_result(&mut self, processor: &str, value: Value) {
        self.extra.insert(processor.to_string(), value);
    }

    /// Record a backend failure under the processor's key.
    pub fn set_error(&mut self, processor: &str, message: impl Into<String>) {
        let mut marker = Map::new();
        marker.insert("error".to_string(), Value::String(message.into()));
        self.set_result(processor, Value::Object(marker));
    }
}

/// Decode a base64 payload as produced by MIME parsers.
///
/// Line breaks and other whitespace inside the text are ignored.
pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ScopeError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> Attachment {
        Attachment {
            payload: text.to_string(),
            content_transfer_encoding: Some("7bit".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_transfer_encoding_from_field() {
        assert_eq!(
            TransferEncoding::from_field(Some("base64")),
            TransferEncoding::Base64
        );
        assert_eq!(
            TransferEncoding::from_field(Some(" BASE64 ")),
            TransferEncoding::Base64
        );
        assert_eq!(
            TransferEncoding::from_field(Some("quoted-printable")),
            TransferEncoding::Plain
        );
        assert_eq!(TransferEncoding::from_field(None), TransferEncoding::Plain);
    }

    #[test]
    fn test_payload_as_base64_leaves_record_alone() {
        let att = plain("hello");
        let encoded = att.payload_as(TransferEncoding::Base64).unwrap();
        assert_eq!(encoded, "aGVsbG8=");
        assert_eq!(att.payload, "hello");
        assert_eq!(att.content_transfer_encoding.as_deref(), Some("7bit"));
    }

    #[test]
    fn test_payload_as_same_encoding_borrows() {
        let att = Attachment {
            payload: "aGVsbG8=".to_string(),
            content_transfer_encoding: Some("base64".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            att.payload_as(TransferEncoding::Base64).unwrap(),
            Cow::Borrowed(_)
        ));
        assert_eq!(att.payload_as(TransferEncoding::Plain).unwrap(), "hello");
    }

    #[test]
    fn test_decode_base64_ignores_line_breaks() {
        let decoded = decode_base64("aGVs\r\nbG8g\nd29y bGQ=").unwrap();
        assert_eq!(decoded, b"hello world");
        assert!(decode_base64("not base64!").is_err());
    }

    #[test]
    fn test_deserialize_parser_shape() {
        let json = r#"{
            "filename": "invoice.zip",
            "payload": "UEsDBA==",
            "content_transfer_encoding": "base64",
            "Content-Type": "application/zip",
            "extension": ".zip",
            "sha1": "abc123",
            "is_filtered": false,
            "mail_content_type": "multipart/mixed",
            "files": [{"filename": "a.js", "extension": ".js", "sha1": "def456"}]
        }"#;
        let att: Attachment = serde_json::from_str(json).unwrap();
        assert_eq!(att.content_type, "application/zip");
        assert_eq!(att.files.len(), 1);
        assert_eq!(att.files[0].extension, ".js");
        assert_eq!(
            att.extra.get("mail_content_type"),
            Some(&Value::String("multipart/mixed".into()))
        );

        let back = serde_json::to_value(&att).unwrap();
        assert_eq!(back["Content-Type"], "application/zip");
        assert_eq!(back["mail_content_type"], "multipart/mixed");
    }

    #[test]
    fn test_set_error_marker() {
        let mut att = plain("x");
        att.set_error("thug", "boom");
        assert_eq!(att.result("thug").unwrap()["error"], "boom");
    }
}
