//! Identifier allocation for spans, events and the process instance.

use std::fmt;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdGenerationError;

/// Unique, time-ordered identifier of one span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpanId(Uuid);

impl SpanId {
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for SpanId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of unique identifiers.
///
/// Allocation may fail; callers that cannot proceed without an id (span entry)
/// propagate the error instead of running their work.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Result<Uuid, IdGenerationError>;
}

/// UUIDv7 generator: ids sort by creation time at millisecond granularity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeOrderedIds;

impl IdGenerator for TimeOrderedIds {
    fn next_id(&self) -> Result<Uuid, IdGenerationError> {
        // v7 embeds a unix timestamp; a clock before the epoch cannot be encoded.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| IdGenerationError::ClockBeforeEpoch)?;
        Ok(Uuid::now_v7())
    }
}

static INSTANCE_ID: OnceLock<Uuid> = OnceLock::new();

/// Random id distinguishing this process run, appended to every tag snapshot.
pub fn instance_id() -> Uuid {
    *INSTANCE_ID.get_or_init(|| TimeOrderedIds.next_id().unwrap_or_else(|_| Uuid::nil()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_ordered_ids_are_unique() {
        let ids: Vec<Uuid> = (0..1000).map(|_| TimeOrderedIds.next_id().unwrap()).collect();
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert!(ids.iter().all(|id| id.get_version_num() == 7));
    }

    #[test]
    fn test_ids_sort_by_creation_time() {
        let first = TimeOrderedIds.next_id().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(3));
        let second = TimeOrderedIds.next_id().unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_instance_id_is_stable() {
        assert_eq!(instance_id(), instance_id());
        assert!(!instance_id().is_nil());
    }
}
