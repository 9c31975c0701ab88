//! Pass results

use core_catalog::DatasetKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What one synchronization pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// The catalog was mutated during the pass
    pub refreshed: bool,
    /// Cancellation was observed before the listing was fully consumed
    pub interrupted: bool,
}

impl SyncOutcome {
    pub fn new(refreshed: bool, interrupted: bool) -> Self {
        Self {
            refreshed,
            interrupted,
        }
    }
}

/// A dataset that could not be synchronized this pass.
///
/// Failures do not abort the pass; the dataset is picked up again next time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub key: DatasetKey,
    pub message: String,
}

impl FailureEntry {
    pub fn new(key: DatasetKey, message: impl Into<String>) -> Self {
        Self {
            key,
            message: message.into(),
        }
    }
}

impl fmt::Display for FailureEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}
