use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::Source;
use crate::key::AccessKey;

/// Longest raw payload kept with a record, in characters.
pub const RAW_DATA_CAP: usize = 500;

// Receipt record
//------------------------------------------------------------------------------

/// One accepted receipt. Field order is the column order of the persisted schema.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub access_key: AccessKey,
    pub raw_data: String,
    pub source: Source,
    pub timestamp: DateTime<Utc>,
}

impl ReceiptRecord {
    /// Builds a record, truncating `raw_data` to [`RAW_DATA_CAP`] characters.
    pub fn new(
        access_key: AccessKey,
        raw_data: &str,
        source: Source,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self { access_key, raw_data: truncate_chars(raw_data, RAW_DATA_CAP), source, timestamp }
    }
}

fn truncate_chars(s: &str, cap: usize) -> String {
    match s.char_indices().nth(cap) {
        Some((end, _)) => s[..end].to_owned(),
        None => s.to_owned(),
    }
}
