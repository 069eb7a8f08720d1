use std::fmt;

use serde::{Deserialize, Serialize};

/// A source document as it appears in the records file.
///
/// The records collection is the system's source of truth: loaded once at
/// startup and immutable from then on. `region` and `kind` are optional
/// descriptive fields used only to enrich the indexed representation during
/// ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Record {
    /// A record is usable when both required fields are non-blank.
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty() && !self.text.trim().is_empty()
    }
}

/// Errors that can occur while loading the records collection.
#[derive(Debug)]
pub enum RecordError {
    /// The records file is not a JSON array of record objects.
    Parse(String),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "invalid records file: {msg}"),
        }
    }
}

impl std::error::Error for RecordError {}

/// Parse a JSON array of records.
///
/// Records missing a usable `id` or `text` are dropped rather than failing
/// the whole collection; the caller decides how loudly to report the count
/// of dropped entries.
pub fn parse_records(json: &str) -> Result<(Vec<Record>, usize), RecordError> {
    let raw: Vec<Record> = serde_json::from_str(json).map_err(|e| RecordError::Parse(e.to_string()))?;
    let total = raw.len();
    let valid: Vec<Record> = raw.into_iter().filter(Record::is_valid).collect();
    let dropped = total - valid.len();
    Ok((valid, dropped))
}
