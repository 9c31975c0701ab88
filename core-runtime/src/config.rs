//! # Synchronization Configuration
//!
//! Configuration consumed by the catalog synchronization engine.
//!
//! ## Overview
//!
//! A [`MetadataPolicy`] is the per-source refresh policy as it is persisted
//! alongside the source definition. A [`SyncConfig`] wraps the policy with the
//! engine's own knobs and is built through [`SyncConfigBuilder`], which
//! validates everything before a synchronizer ever sees it.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{SyncConfig, UpdateMode};
//!
//! let config = SyncConfig::builder()
//!     .update_mode(UpdateMode::Prefetch)
//!     .delete_unavailable_datasets(false)
//!     .retry_bound(3)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! `build()` fails with [`Error::Config`] when a value is out of range:
//!
//! ```should_panic
//! use core_runtime::config::SyncConfig;
//!
//! let config = SyncConfig::builder()
//!     .max_metadata_leaf_columns(0)
//!     .build()
//!     .expect("zero leaf columns is rejected");
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default number of retries after a concurrent modification
pub const DEFAULT_RETRY_BOUND: u32 = 1;

/// Largest retry bound the builder accepts
pub const MAX_RETRY_BOUND: u32 = 16;

/// Default cap on leaf columns stored per dataset
pub const DEFAULT_MAX_LEAF_COLUMNS: usize = 800;

// =============================================================================
// Update Mode
// =============================================================================

/// Policy governing whether and how newly discovered datasets are admitted.
///
/// Only [`Prefetch`](UpdateMode::Prefetch) and
/// [`PrefetchQueried`](UpdateMode::PrefetchQueried) are admission modes. The
/// other values exist because persisted policies can carry them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateMode {
    Unknown,
    /// Admit new datasets and refresh every existing one
    Prefetch,
    /// Admit new datasets shallow; refresh only datasets that were queried
    #[default]
    PrefetchQueried,
    /// Metadata is derived at query time only
    Inline,
}

impl UpdateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMode::Unknown => "UNKNOWN",
            UpdateMode::Prefetch => "PREFETCH",
            UpdateMode::PrefetchQueried => "PREFETCH_QUERIED",
            UpdateMode::Inline => "INLINE",
        }
    }

    /// True for the modes a synchronization pass can run under
    pub fn is_admission_mode(&self) -> bool {
        matches!(self, UpdateMode::Prefetch | UpdateMode::PrefetchQueried)
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(UpdateMode::Unknown),
            "PREFETCH" => Ok(UpdateMode::Prefetch),
            "PREFETCH_QUERIED" => Ok(UpdateMode::PrefetchQueried),
            "INLINE" => Ok(UpdateMode::Inline),
            other => Err(Error::Config(format!("Unknown update mode: {}", other))),
        }
    }
}

// =============================================================================
// Metadata Policy
// =============================================================================

/// Per-source metadata refresh policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataPolicy {
    pub dataset_update_mode: UpdateMode,
    /// Delete catalog datasets the source no longer reports
    pub delete_unavailable_datasets: bool,
    /// Datasets with more leaf columns than this are not stored
    pub max_metadata_leaf_columns: usize,
}

impl Default for MetadataPolicy {
    fn default() -> Self {
        Self {
            dataset_update_mode: UpdateMode::default(),
            delete_unavailable_datasets: true,
            max_metadata_leaf_columns: DEFAULT_MAX_LEAF_COLUMNS,
        }
    }
}

impl MetadataPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_metadata_leaf_columns == 0 {
            return Err(Error::Config(
                "max_metadata_leaf_columns must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Sync Config
// =============================================================================

/// Configuration for one synchronizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub policy: MetadataPolicy,
    /// Retries after a concurrent modification on an existing dataset; a
    /// dataset is attempted at most `retry_bound + 1` times
    pub retry_bound: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            policy: MetadataPolicy::default(),
            retry_bound: DEFAULT_RETRY_BOUND,
        }
    }
}

impl SyncConfig {
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    pub fn update_mode(&self) -> UpdateMode {
        self.policy.dataset_update_mode
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;

        if self.retry_bound > MAX_RETRY_BOUND {
            return Err(Error::Config(format!(
                "retry_bound {} exceeds maximum of {}",
                self.retry_bound, MAX_RETRY_BOUND
            )));
        }

        Ok(())
    }
}

/// Builder for [`SyncConfig`]
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    policy: Option<MetadataPolicy>,
    update_mode: Option<UpdateMode>,
    delete_unavailable_datasets: Option<bool>,
    max_metadata_leaf_columns: Option<usize>,
    retry_bound: Option<u32>,
}

impl SyncConfigBuilder {
    /// Start from a persisted policy; individual setters still override it
    pub fn policy(mut self, policy: MetadataPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn update_mode(mut self, mode: UpdateMode) -> Self {
        self.update_mode = Some(mode);
        self
    }

    pub fn delete_unavailable_datasets(mut self, enabled: bool) -> Self {
        self.delete_unavailable_datasets = Some(enabled);
        self
    }

    pub fn max_metadata_leaf_columns(mut self, max: usize) -> Self {
        self.max_metadata_leaf_columns = Some(max);
        self
    }

    pub fn retry_bound(mut self, retries: u32) -> Self {
        self.retry_bound = Some(retries);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<SyncConfig> {
        let mut policy = self.policy.unwrap_or_default();
        if let Some(mode) = self.update_mode {
            policy.dataset_update_mode = mode;
        }
        if let Some(enabled) = self.delete_unavailable_datasets {
            policy.delete_unavailable_datasets = enabled;
        }
        if let Some(max) = self.max_metadata_leaf_columns {
            policy.max_metadata_leaf_columns = max;
        }

        let config = SyncConfig {
            policy,
            retry_bound: self.retry_bound.unwrap_or(DEFAULT_RETRY_BOUND),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::builder().build().unwrap();
        assert_eq!(config.update_mode(), UpdateMode::PrefetchQueried);
        assert!(config.policy.delete_unavailable_datasets);
        assert_eq!(config.policy.max_metadata_leaf_columns, 800);
        assert_eq!(config.retry_bound, 1);
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_setters_override_policy() {
        let policy = MetadataPolicy {
            dataset_update_mode: UpdateMode::Inline,
            delete_unavailable_datasets: true,
            max_metadata_leaf_columns: 50,
        };
        let config = SyncConfig::builder()
            .policy(policy)
            .update_mode(UpdateMode::Prefetch)
            .delete_unavailable_datasets(false)
            .retry_bound(4)
            .build()
            .unwrap();

        assert_eq!(config.update_mode(), UpdateMode::Prefetch);
        assert!(!config.policy.delete_unavailable_datasets);
        assert_eq!(config.policy.max_metadata_leaf_columns, 50);
        assert_eq!(config.retry_bound, 4);
    }

    #[test]
    fn test_rejects_zero_leaf_columns() {
        let result = SyncConfig::builder().max_metadata_leaf_columns(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_excessive_retry_bound() {
        let result = SyncConfig::builder().retry_bound(MAX_RETRY_BOUND + 1).build();
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
        assert!(SyncConfig::builder()
            .retry_bound(MAX_RETRY_BOUND)
            .build()
            .is_ok());
    }

    #[test]
    fn test_update_mode_strings() {
        assert_eq!("prefetch_queried".parse::<UpdateMode>().unwrap(), UpdateMode::PrefetchQueried);
        assert_eq!(UpdateMode::Prefetch.to_string(), "PREFETCH");
        assert!("EAGER".parse::<UpdateMode>().is_err());
        assert!(UpdateMode::Prefetch.is_admission_mode());
        assert!(!UpdateMode::Inline.is_admission_mode());
        assert!(!UpdateMode::Unknown.is_admission_mode());
    }

    #[test]
    fn test_policy_serde() {
        let json = r#"{"dataset_update_mode":"PREFETCH","delete_unavailable_datasets":false}"#;
        let policy: MetadataPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.dataset_update_mode, UpdateMode::Prefetch);
        assert!(!policy.delete_unavailable_datasets);
        assert_eq!(policy.max_metadata_leaf_columns, DEFAULT_MAX_LEAF_COLUMNS);
    }
}
