use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub type RecordId = i64;

/// A single temperature reading. The offset of `datetime` is kept exactly as
/// supplied, so calendar fields are read in the caller's own timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Temperature {
    pub id: RecordId,
    pub value: i64,
    pub city: String,
    pub datetime: DateTime<FixedOffset>,
}
