//! Lightweight record summaries.

use crate::record::DocumentRecord;
use crate::tags::TagSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The metadata a node shares about a record without transferring the
/// archive. Notes are never part of a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSummary {
    /// Record id.
    pub uuid: Uuid,
    /// Citation text.
    pub bibtex: String,
    /// Tags, serialized as a sorted array.
    pub tags: TagSet,
    /// Import time.
    pub time_import: f64,
    /// Last modification time.
    pub time_modify: f64,
    /// Attached file extension, empty when none.
    pub doc_ext: String,
    /// Attached file size in MiB.
    pub doc_size: f64,
    /// Whether a file is attached.
    pub has_file: bool,
    /// Web link.
    #[serde(default)]
    pub url: String,
}

impl RecordSummary {
    /// Builds a summary from a full record and its measured file size.
    #[must_use]
    pub fn from_record(record: &DocumentRecord, doc_size: f64) -> Self {
        Self {
            uuid: record.id,
            bibtex: record.bibtex.clone(),
            tags: record.tags.clone(),
            time_import: record.time_imported,
            time_modify: record.time_modified,
            doc_ext: record.doc_extension.clone(),
            doc_size,
            has_file: record.has_file(),
            url: record.url.clone(),
        }
    }
}
