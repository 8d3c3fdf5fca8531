use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bookkeeping embedded in every stored record: identity plus the
/// optimistic-concurrency counter the Record Store guards `update` with.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct RecordMeta {
    pub id: Uuid,
    /// Bumped by the store on every successful `update`. A caller's
    /// `update` is rejected with `Error::Conflict` if the record has
    /// moved on since the caller last read it.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecordMeta {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self::new()
    }
}
